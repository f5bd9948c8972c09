/// Anomaly band engine.
///
/// Holds the forecast steps and precomputed anomaly records of every point
/// and produces, on demand, the overlay for one point's observed series
/// using the configured `BandMode`.
///
/// Submodules:
/// - `alignment` — right-aligned positional joins.
/// - `bands`     — precomputed and residual band strategies.
/// - `smoothing` — run-length confirmation of anomaly flags.

pub mod alignment;
pub mod bands;
pub mod smoothing;

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::analysis::groupings::index_by_pid;
use crate::config::AnalysisSettings;
use crate::logging::Stage;
use crate::model::{AnomalyRecord, DerivedSample, PredictionSample};

pub use bands::{BandMode, BandStrategy, BandValue, Overlay, OverlayPoint};

/// Anomaly state of a point as shown on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnomalyStatus {
    /// At least one flag survived run-length smoothing.
    Confirmed,
    /// Flags exist but every run was too short.
    Flagged,
    /// Bands exist and nothing falls outside them.
    Clear,
    /// No anomaly source covers this point.
    NoData,
}

/// Per-point anomaly sources plus the settings that drive alignment.
#[derive(Debug, Clone, Default)]
pub struct AnomalyEngine {
    settings: AnalysisSettings,
    predictions: HashMap<String, Vec<PredictionSample>>,
    records: HashMap<String, Vec<AnomalyRecord>>,
}

impl AnomalyEngine {
    /// Indexes sources by point. Rows of a point keep load order, so sets
    /// loaded later contribute the most recent tail.
    pub fn new(
        predictions: Vec<PredictionSample>,
        records: Vec<AnomalyRecord>,
        settings: AnalysisSettings,
    ) -> Self {
        AnomalyEngine {
            settings,
            predictions: index_by_pid(predictions, |p| p.pid.as_str()),
            records: index_by_pid(records, |r| r.pid.as_str()),
        }
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    pub fn mode(&self) -> BandMode {
        self.settings.band_mode
    }

    /// Points with a source usable by the configured mode.
    pub fn covered_points(&self) -> usize {
        match self.mode() {
            BandMode::Precomputed => self.records.len(),
            BandMode::Residual => self.predictions.len(),
        }
    }

    /// Whether the configured mode has anything to align for `pid`.
    pub fn has_source(&self, pid: &str) -> bool {
        match self.mode() {
            BandMode::Precomputed => self.records.contains_key(pid),
            BandMode::Residual => self.predictions.contains_key(pid),
        }
    }

    pub fn records_for(&self, pid: &str) -> &[AnomalyRecord] {
        self.records.get(pid).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn predictions_for(&self, pid: &str) -> &[PredictionSample] {
        self.predictions.get(pid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Overlay for the time-ordered samples of `pid`, or `None` when the
    /// point has no anomaly source.
    pub fn overlay(&self, pid: &str, observed: &[DerivedSample]) -> Option<Overlay> {
        let overlay = match self.mode() {
            BandMode::Precomputed => bands::PrecomputedBands {
                records: self.records_for(pid),
            }
            .overlay(observed, &self.settings),
            BandMode::Residual => bands::ResidualBands {
                predictions: self.predictions_for(pid),
            }
            .overlay(observed, &self.settings),
        };

        if overlay.is_none() {
            debug!(stage = %Stage::Anomaly, pid, "no anomaly source for point");
        }
        overlay
    }

    /// Map status of a point, judged on its primary band.
    pub fn status(&self, pid: &str, observed: &[DerivedSample]) -> AnomalyStatus {
        let Some(overlay) = self.overlay(pid, observed) else {
            return AnomalyStatus::NoData;
        };
        let primary = self.settings.primary_level();
        let bands: Vec<&BandValue> = overlay
            .entries()
            .filter_map(|p| p.band(primary))
            .collect();

        if bands.iter().any(|b| b.confirmed) {
            AnomalyStatus::Confirmed
        } else if bands.iter().any(|b| b.is_anomaly) {
            AnomalyStatus::Flagged
        } else if bands.is_empty() {
            AnomalyStatus::NoData
        } else {
            AnomalyStatus::Clear
        }
    }
}
