/// Ground-displacement monitoring over InSAR time series.
///
/// Loading happens once: geolocation and wide displacement tables are read,
/// fused into a per-point table with velocities, and paired with the anomaly
/// sources. Everything after that is a read-only query over `MonitorContext`.

pub mod analysis;
pub mod anomaly;
pub mod config;
pub mod context;
pub mod geo;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod points;
pub mod query;

pub use context::{DatasetSummary, Inputs, MonitorContext};
pub use model::DefmonError;
