/// Anomaly band strategies.
///
/// Two ways of producing a confidence band for the tail of an observed
/// series:
///
/// - `PrecomputedBands` places anomaly records delivered with the dataset
///   onto the observed dates; bounds and flags are used as given.
/// - `ResidualBands` derives bounds from forecast steps: the residual
///   standard deviation over the aligned window times a Student-t critical
///   value gives the margin around each predicted value.
///
/// Both produce an `Overlay` with one band per significance level, then run
/// the run-length filter over each level independently.

use serde::{Deserialize, Serialize};

use crate::analysis::stats::{sample_std_dev, t_critical};
use crate::anomaly::alignment::{align_tail, step_slots};
use crate::anomaly::smoothing::confirm_runs;
use crate::config::AnalysisSettings;
use crate::model::{AnomalyRecord, DerivedSample, PredictionSample, SignificanceLevel};

/// Which strategy computes bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandMode {
    /// Bounds and flags come from anomaly files.
    #[default]
    Precomputed,
    /// Bounds are computed from forecast residuals at query time.
    Residual,
}

// ---------------------------------------------------------------------------
// Overlay types
// ---------------------------------------------------------------------------

/// One band at one observed sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandValue {
    pub level: SignificanceLevel,
    pub upper_bound: f64,
    pub lower_bound: f64,
    /// Raw flag: the observed value lies outside the band.
    pub is_anomaly: bool,
    /// Flag after run-length smoothing.
    pub confirmed: bool,
}

/// Overlay entry for one observed sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayPoint {
    pub predicted_value: f64,
    /// Narrowest band first. Empty when no band could be computed.
    pub bands: Vec<BandValue>,
}

impl OverlayPoint {
    pub fn band(&self, level: SignificanceLevel) -> Option<&BandValue> {
        self.bands.iter().find(|b| b.level == level)
    }
}

/// Overlay for the trailing window of one point's observed series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    /// Index of the first observed sample covered.
    pub start: usize,
    /// One slot per covered sample. `None` where the forecast has a gap.
    pub slots: Vec<Option<OverlayPoint>>,
}

impl Overlay {
    /// Overlay entry for observed sample `index`.
    pub fn at(&self, index: usize) -> Option<&OverlayPoint> {
        index
            .checked_sub(self.start)
            .and_then(|offset| self.slots.get(offset))
            .and_then(Option::as_ref)
    }

    /// Entries that are present, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &OverlayPoint> {
        self.slots.iter().flatten()
    }

    /// Significance levels present on any row, sorted.
    pub fn levels(&self) -> Vec<SignificanceLevel> {
        let mut levels: Vec<_> = self
            .entries()
            .flat_map(|p| p.bands.iter().map(|b| b.level))
            .collect();
        levels.sort();
        levels.dedup();
        levels
    }

    /// Marks `confirmed` on every band using the run-length filter.
    ///
    /// Each level is smoothed on its own; a row missing a level, or a gap
    /// slot, counts as not anomalous for that level.
    pub fn apply_run_length_filter(&mut self, pid: &str, threshold: usize) {
        for level in self.levels() {
            let flags: Vec<(&str, bool)> = self
                .slots
                .iter()
                .map(|slot| {
                    let flagged = slot
                        .as_ref()
                        .and_then(|p| p.band(level))
                        .is_some_and(|b| b.is_anomaly);
                    (pid, flagged)
                })
                .collect();
            let confirmed = confirm_runs(&flags, threshold);
            for (slot, confirmed) in self.slots.iter_mut().zip(confirmed) {
                if let Some(band) = slot
                    .as_mut()
                    .and_then(|p| p.bands.iter_mut().find(|b| b.level == level))
                {
                    band.confirmed = confirmed;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// A way of producing an anomaly overlay for one point.
pub trait BandStrategy {
    /// Overlay for `observed` (time-ordered samples of one point), or `None`
    /// when the strategy has nothing to align for this point.
    fn overlay(&self, observed: &[DerivedSample], settings: &AnalysisSettings) -> Option<Overlay>;
}

/// Bands delivered with the dataset.
pub struct PrecomputedBands<'a> {
    pub records: &'a [AnomalyRecord],
}

impl BandStrategy for PrecomputedBands<'_> {
    fn overlay(&self, observed: &[DerivedSample], settings: &AnalysisSettings) -> Option<Overlay> {
        let aligned = align_tail(observed.len(), self.records, settings.tail_window);
        if aligned.is_empty() {
            return None;
        }

        let slots = observed[aligned.observed_range()]
            .iter()
            .zip(aligned.overlay)
            .map(|(obs, record)| {
                Some(OverlayPoint {
                    predicted_value: record.predicted_value,
                    bands: record
                        .bands()
                        .map(|b| BandValue {
                            level: b.level,
                            upper_bound: b.upper_bound,
                            lower_bound: b.lower_bound,
                            // Sources without a flag column for this band are
                            // judged on the observed value.
                            is_anomaly: b
                                .is_anomaly
                                .unwrap_or_else(|| !b.contains(obs.displacement())),
                            confirmed: false,
                        })
                        .collect(),
                })
            })
            .collect();

        finish(aligned.start, slots, observed, settings)
    }
}

/// Bands computed from forecast residuals.
pub struct ResidualBands<'a> {
    /// Forecast steps of one point, in load order.
    pub predictions: &'a [PredictionSample],
}

impl BandStrategy for ResidualBands<'_> {
    fn overlay(&self, observed: &[DerivedSample], settings: &AnalysisSettings) -> Option<Overlay> {
        let steps = step_slots(self.predictions);
        let aligned = align_tail(observed.len(), &steps, settings.tail_window);
        if aligned.is_empty() {
            return None;
        }

        let window = &observed[aligned.observed_range()];
        let residuals: Vec<f64> = window
            .iter()
            .zip(aligned.overlay)
            .filter_map(|(obs, pred)| (*pred).map(|p| obs.displacement() - p.predicted_displacement))
            .collect();
        let residual_std = sample_std_dev(&residuals);

        let margins: Vec<(SignificanceLevel, f64)> = match residual_std {
            Some(sd) => settings
                .confidence_levels
                .iter()
                .filter_map(|&level| {
                    t_critical(level.confidence(), settings.degrees_of_freedom)
                        .map(|t| (level, t * sd))
                })
                .collect(),
            None => Vec::new(),
        };

        let slots = window
            .iter()
            .zip(aligned.overlay)
            .map(|(obs, pred)| {
                let predicted = (*pred)?.predicted_displacement;
                let value = obs.displacement();
                Some(OverlayPoint {
                    predicted_value: predicted,
                    bands: margins
                        .iter()
                        .map(|&(level, margin)| {
                            let upper_bound = predicted + margin;
                            let lower_bound = predicted - margin;
                            BandValue {
                                level,
                                upper_bound,
                                lower_bound,
                                is_anomaly: value > upper_bound || value < lower_bound,
                                confirmed: false,
                            }
                        })
                        .collect(),
                })
            })
            .collect();

        finish(aligned.start, slots, observed, settings)
    }
}

fn finish(
    start: usize,
    slots: Vec<Option<OverlayPoint>>,
    observed: &[DerivedSample],
    settings: &AnalysisSettings,
) -> Option<Overlay> {
    let mut overlay = Overlay { start, slots };
    let pid = observed.first().map(|s| s.pid()).unwrap_or_default();
    overlay.apply_run_length_filter(pid, settings.run_length_threshold);
    Some(overlay)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
