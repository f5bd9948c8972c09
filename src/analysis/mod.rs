/// Displacement analysis for the monitoring service.
///
/// Submodules:
/// - `groupings` — organizes flat sample lists into per-point structures.
/// - `fusion`    — registry join, per-point ordering, first differences.
/// - `velocity`  — mean annualized speed per point.
/// - `stats`     — mean, sample standard deviation, Student-t quantiles.

pub mod fusion;
pub mod groupings;
pub mod stats;
pub mod velocity;

pub use fusion::{build_fusion, FusionTable};
