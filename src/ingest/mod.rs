/// Input materialization for the displacement monitoring service.
///
/// Submodules:
/// - `table`   — CSV text into header + string cells, plus cell conversions.
/// - `wide`    — wide displacement/prediction tables into long samples.
/// - `records` — long-format geolocation and anomaly tables.

pub mod records;
pub mod table;
pub mod wide;

pub use records::{load_anomaly_records, load_geolocation};
pub use table::Table;
pub use wide::{load_prediction_series, load_wide_series};
