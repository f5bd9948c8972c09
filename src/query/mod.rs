/// Query layer: read-only views over a `MonitorContext`.
///
/// - `map`       — one row per point for plotting.
/// - `series`    — a point's time series with its anomaly overlay.
/// - `selection` — the two-point click selection and distance.

pub mod map;
pub mod selection;
pub mod series;

use crate::context::MonitorContext;
use crate::geo::distance_km;

pub use map::{map_points, map_view, ColorKey, ColorMode, MapPoint, MapStyle, MapView, OrbitFilter};
pub use selection::{toggle_selection, QuerySession};
pub use series::{point_series, DateRange, PointSeries, SeriesRow};

/// Distance in kilometres between two registered points.
///
/// `None` if either id is missing from the registry.
pub fn distance(ctx: &MonitorContext, pid_a: &str, pid_b: &str) -> Option<f64> {
    let a = ctx.registry().lookup(pid_a)?;
    let b = ctx.registry().lookup(pid_b)?;
    Some(distance_km((a.latitude, a.longitude), (b.latitude, b.longitude)))
}
