/// Core data types for the ground-displacement monitoring service.
///
/// This module defines the shared domain model imported by all other modules:
/// measurement points, displacement and prediction samples, anomaly records
/// and the crate error type. It contains no logic and no I/O.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Analysis defaults
// ---------------------------------------------------------------------------

/// Number of trailing observations an anomaly overlay is aligned onto.
pub const DEFAULT_TAIL_WINDOW: usize = 60;

/// A run of anomalous samples is confirmed only when its length exceeds this.
pub const DEFAULT_RUN_LENGTH_THRESHOLD: usize = 3;

/// Degrees of freedom used for the Student-t margin, independent of window size.
pub const DEFAULT_DEGREES_OF_FREEDOM: f64 = 60.0;

/// Scale factor turning a per-day rate into a per-year rate.
pub const DAYS_PER_YEAR: f64 = 365.0;

// ---------------------------------------------------------------------------
// Points
// ---------------------------------------------------------------------------

/// A single ground-surface measurement point with its static geolocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub pid: String,
    pub latitude: f64,
    pub longitude: f64,
    pub height: f64,
}

impl Point {
    pub fn geolocation(&self) -> Geolocation {
        Geolocation {
            latitude: self.latitude,
            longitude: self.longitude,
            height: self.height,
        }
    }
}

/// Geolocation attributes copied onto fused samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Geolocation {
    pub latitude: f64,
    pub longitude: f64,
    pub height: f64,
}

// ---------------------------------------------------------------------------
// Sample types
// ---------------------------------------------------------------------------

/// One observed displacement value, tagged with the orbit/dataset it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplacementSample {
    pub pid: String,
    pub timestamp: NaiveDate,
    pub displacement: f64, // mm
    pub label: String,     // provenance, e.g. "Ascending 124"
}

/// A displacement sample after the fusion pass.
///
/// Difference fields are `None` for the first sample of each point, and
/// `annualized_speed` is also `None` whenever the day gap is zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedSample {
    #[serde(flatten)]
    pub sample: DisplacementSample,
    pub geolocation: Option<Geolocation>,
    pub displacement_diff: Option<f64>,
    pub time_diff_days: Option<i64>,
    pub annualized_speed: Option<f64>,
    pub mean_velocity: Option<f64>,
}

impl DerivedSample {
    pub fn pid(&self) -> &str {
        &self.sample.pid
    }

    pub fn timestamp(&self) -> NaiveDate {
        self.sample.timestamp
    }

    pub fn displacement(&self) -> f64 {
        self.sample.displacement
    }

    pub fn label(&self) -> &str {
        &self.sample.label
    }
}

/// One forecast value. `step` is the row ordinal within the point's column,
/// a horizon counter rather than a calendar date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionSample {
    pub pid: String,
    pub step: usize,
    pub predicted_displacement: f64,
    pub label: String,
}

// ---------------------------------------------------------------------------
// Anomaly types
// ---------------------------------------------------------------------------

/// Confidence level of a band, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignificanceLevel(pub u8);

impl SignificanceLevel {
    pub const P95: SignificanceLevel = SignificanceLevel(95);
    pub const P99: SignificanceLevel = SignificanceLevel(99);

    /// Confidence as a probability, e.g. 0.95.
    pub fn confidence(self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

impl std::fmt::Display for SignificanceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Confidence interval around a predicted value at one significance level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Band {
    pub level: SignificanceLevel,
    pub upper_bound: f64,
    pub lower_bound: f64,
    /// Flag as delivered; `None` when the source has no flag column for
    /// this band and the flag must be judged against the observed value.
    pub is_anomaly: Option<bool>,
}

impl Band {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower_bound && value <= self.upper_bound
    }
}

/// A precomputed anomaly row as delivered by an anomaly source.
///
/// Records carry no timestamp; they are placed onto observed dates by
/// `anomaly::alignment`. The secondary band is present only when the
/// source supplied the wider (99%) bounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyRecord {
    pub pid: String,
    pub label: String,
    pub predicted_value: f64,
    pub primary: Band,
    pub secondary: Option<Band>,
}

impl AnomalyRecord {
    pub fn bands(&self) -> impl Iterator<Item = &Band> {
        std::iter::once(&self.primary).chain(self.secondary.iter())
    }
}

// ---------------------------------------------------------------------------
// Selection state
// ---------------------------------------------------------------------------

/// A point picked on the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedPoint {
    pub pid: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Up to two selected points. Owned by a query session, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SelectedPair {
    pub first: Option<SelectedPoint>,
    pub second: Option<SelectedPoint>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while loading or configuring the service.
///
/// Arithmetic that cannot be evaluated (zero day gaps, too few residuals)
/// is not an error: those sites yield `None`.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum DefmonError {
    /// An input table lacks an expected column or holds an unparseable cell.
    #[error("malformed input in {source_name}: {reason}")]
    MalformedInput { source_name: String, reason: String },

    /// A data or configuration file could not be read.
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },

    /// The configuration file is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// A query referenced a point id absent from the registry.
    #[error("point not found: {0}")]
    PointNotFound(String),
}

impl DefmonError {
    pub fn malformed(source_name: &str, reason: impl Into<String>) -> Self {
        DefmonError::MalformedInput {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
