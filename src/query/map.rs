/// Map view: one row per point, coloured by orbit, speed or anomaly state.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::debug;

use crate::anomaly::AnomalyStatus;
use crate::context::MonitorContext;
use crate::logging::Stage;
use crate::points::BoundingBox;

// ---------------------------------------------------------------------------
// Presentation enumerations
// ---------------------------------------------------------------------------

/// Base map style. Carried through to the presentation layer untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MapStyle {
    #[default]
    Satellite,
    Outdoors,
    Light,
    Dark,
    Streets,
}

impl MapStyle {
    pub const ALL: [MapStyle; 5] = [
        MapStyle::Satellite,
        MapStyle::Outdoors,
        MapStyle::Light,
        MapStyle::Dark,
        MapStyle::Streets,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MapStyle::Satellite => "satellite",
            MapStyle::Outdoors => "outdoors",
            MapStyle::Light => "light",
            MapStyle::Dark => "dark",
            MapStyle::Streets => "streets",
        }
    }
}

impl fmt::Display for MapStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MapStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MapStyle::ALL
            .into_iter()
            .find(|style| style.as_str() == s)
            .ok_or_else(|| format!("unknown map style '{}'", s))
    }
}

/// What the point colour encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    #[default]
    Orbit,
    Speed,
    AnomalyType,
}

impl FromStr for ColorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orbit" => Ok(ColorMode::Orbit),
            "speed" => Ok(ColorMode::Speed),
            "anomaly_type" => Ok(ColorMode::AnomalyType),
            other => Err(format!("unknown color mode '{}'", other)),
        }
    }
}

/// Which provenance labels are shown.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OrbitFilter {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl OrbitFilter {
    pub fn only<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        OrbitFilter::Only(labels.into_iter().map(Into::into).collect())
    }

    pub fn allows(&self, label: &str) -> bool {
        match self {
            OrbitFilter::All => true,
            OrbitFilter::Only(labels) => labels.contains(label),
        }
    }
}

// ---------------------------------------------------------------------------
// Output rows
// ---------------------------------------------------------------------------

/// Colour input for one map point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ColorKey {
    Orbit { label: String },
    /// `scaled` is the mean velocity clamped into the configured range and
    /// mapped onto `[0, 1]`.
    Speed { mean_velocity: Option<f64>, scaled: Option<f64> },
    AnomalyType { status: AnomalyStatus },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub pid: String,
    pub latitude: f64,
    pub longitude: f64,
    pub height: f64,
    pub mean_velocity: Option<f64>,
    pub label: String,
    pub color_key: ColorKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub center_lat: f64,
    pub center_lon: f64,
    /// Plotted points' bounding box grown by the configured padding.
    pub bounds: BoundingBox,
}

/// Everything the presentation layer needs to draw the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub style: MapStyle,
    pub color_mode: ColorMode,
    pub points: Vec<MapPoint>,
    /// Points that passed the filter but have no geolocation to plot.
    pub missing_geolocation: Vec<String>,
    pub viewport: Option<Viewport>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// One row per distinct point whose samples pass `orbit_filter`.
///
/// The row describes the point's earliest passing sample. Points without
/// geolocation are left out; `map_view` lists them separately.
pub fn map_points(
    ctx: &MonitorContext,
    orbit_filter: &OrbitFilter,
    color_mode: ColorMode,
) -> Vec<MapPoint> {
    collect_points(ctx, orbit_filter, color_mode).0
}

/// `map_points` plus style, viewport and the points that could not be placed.
pub fn map_view(
    ctx: &MonitorContext,
    style: MapStyle,
    orbit_filter: &OrbitFilter,
    color_mode: ColorMode,
) -> MapView {
    let (points, missing_geolocation) = collect_points(ctx, orbit_filter, color_mode);
    let viewport = BoundingBox::around(points.iter().map(|p| (p.latitude, p.longitude))).map(
        |bounds| {
            let (center_lat, center_lon) = bounds.center();
            Viewport {
                center_lat,
                center_lon,
                bounds: bounds.padded(ctx.settings().viewport_padding_deg),
            }
        },
    );

    debug!(
        stage = %Stage::Query,
        style = %style,
        points = points.len(),
        missing = missing_geolocation.len(),
        "map view built"
    );

    MapView {
        style,
        color_mode,
        points,
        missing_geolocation,
        viewport,
    }
}

fn collect_points(
    ctx: &MonitorContext,
    orbit_filter: &OrbitFilter,
    color_mode: ColorMode,
) -> (Vec<MapPoint>, Vec<String>) {
    let mut points = Vec::new();
    let mut missing = Vec::new();
    let mut last_pid: Option<&str> = None;

    // Rows are sorted by (pid, timestamp), so the first passing row of a pid
    // is the one kept.
    for row in ctx.fusion().rows() {
        if last_pid == Some(row.pid()) || !orbit_filter.allows(row.label()) {
            continue;
        }
        last_pid = Some(row.pid());

        let Some(geo) = row.geolocation else {
            missing.push(row.pid().to_string());
            continue;
        };

        let color_key = match color_mode {
            ColorMode::Orbit => ColorKey::Orbit {
                label: row.label().to_string(),
            },
            ColorMode::Speed => ColorKey::Speed {
                mean_velocity: row.mean_velocity,
                scaled: row
                    .mean_velocity
                    .map(|v| scale_into(v, ctx.settings().speed_color_range)),
            },
            ColorMode::AnomalyType => ColorKey::AnomalyType {
                status: ctx
                    .anomalies()
                    .status(row.pid(), ctx.fusion().for_point(row.pid())),
            },
        };

        points.push(MapPoint {
            pid: row.pid().to_string(),
            latitude: geo.latitude,
            longitude: geo.longitude,
            height: geo.height,
            mean_velocity: row.mean_velocity,
            label: row.label().to_string(),
            color_key,
        });
    }

    (points, missing)
}

/// Clamps `value` into `[lo, hi]` and maps it onto `[0, 1]`.
fn scale_into(value: f64, [lo, hi]: [f64; 2]) -> f64 {
    (value.clamp(lo, hi) - lo) / (hi - lo)
}
