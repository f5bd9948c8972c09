/// Structured logging for the displacement monitoring service
///
/// Every event carries the pipeline stage and, where relevant, the point id
/// it concerns. The subscriber is installed once at startup; library code
/// only emits `tracing` events and never prints directly.

use std::fmt;

use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::model::DefmonError;

// ---------------------------------------------------------------------------
// Pipeline stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Fusion,
    Velocity,
    Anomaly,
    Query,
    System,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Load => write!(f, "LOAD"),
            Stage::Fusion => write!(f, "FUSION"),
            Stage::Velocity => write!(f, "VELOCITY"),
            Stage::Anomaly => write!(f, "ANOMALY"),
            Stage::Query => write!(f, "QUERY"),
            Stage::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - an unknown point id or a point without data
    Expected,
    /// Unexpected failure - broken input files or configuration
    Unexpected,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
        }
    }
}

pub fn classify_failure(err: &DefmonError) -> FailureType {
    match err {
        DefmonError::PointNotFound(_) => FailureType::Expected,
        DefmonError::MalformedInput { .. } | DefmonError::Io { .. } | DefmonError::Config(_) => {
            FailureType::Unexpected
        }
    }
}

// ---------------------------------------------------------------------------
// Subscriber setup
// ---------------------------------------------------------------------------

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over the configured level when set. Calling this twice
/// is harmless; the second call leaves the first subscriber in place.
pub fn init_logging(config: &LoggingConfig) -> Result<(), DefmonError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.filter_directive())
            .map_err(|e| DefmonError::Config(format!("invalid log filter: {}", e)))?,
    };

    let installed = if config.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
    };

    if installed.is_err() {
        debug!(stage = %Stage::System, "logging subscriber already installed");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a failure with automatic classification
pub fn log_failure(stage: Stage, pid: Option<&str>, operation: &str, err: &DefmonError) {
    let failure_type = classify_failure(err);
    let pid = pid.unwrap_or("-");

    match failure_type {
        FailureType::Expected => {
            debug!(stage = %stage, pid, failure = %failure_type, "{} failed: {}", operation, err)
        }
        FailureType::Unexpected => {
            error!(stage = %stage, pid, failure = %failure_type, "{} failed: {}", operation, err)
        }
    }
}

// ---------------------------------------------------------------------------
// Load Summary Logging
// ---------------------------------------------------------------------------

/// Log how many rows one source contributed.
pub fn log_source_loaded(source: &str, label: Option<&str>, rows: usize) {
    info!(
        stage = %Stage::Load,
        source,
        label = label.unwrap_or("-"),
        rows,
        "loaded source"
    );
}

/// Log coverage of a join: how many points matched out of the total.
pub fn log_coverage_summary(stage: Stage, what: &str, total: usize, matched: usize) {
    let missing = total - matched.min(total);

    if missing == 0 {
        info!(stage = %stage, total, matched, "{}: all points covered", what);
    } else if matched == 0 && total > 0 {
        error!(stage = %stage, total, matched, missing, "{}: no points covered", what);
    } else {
        warn!(stage = %stage, total, matched, missing, "{}: partial coverage", what);
    }
}
