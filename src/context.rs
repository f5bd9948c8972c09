/// The immutable reference data every query runs against.
///
/// Built once at startup, either from configured files (`MonitorContext::load`)
/// or from already-materialized inputs (`MonitorContext::build`), and only
/// ever borrowed afterwards. Concurrent readers need no locking.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::FusionTable;
use crate::anomaly::{AnomalyEngine, BandMode};
use crate::config::{AnalysisSettings, Config};
use crate::ingest::{self, Table};
use crate::logging::{log_coverage_summary, log_failure, log_source_loaded, Stage};
use crate::model::{AnomalyRecord, DefmonError, DisplacementSample, Point, PredictionSample};
use crate::points::PointRegistry;

/// Materialized input tables, one inner vector per source file.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    pub geolocation: Vec<Vec<Point>>,
    pub displacement: Vec<Vec<DisplacementSample>>,
    pub predictions: Vec<Vec<PredictionSample>>,
    pub anomalies: Vec<Vec<AnomalyRecord>>,
}

/// Shared, read-only state: registry, fused samples and anomaly sources.
#[derive(Debug, Clone)]
pub struct MonitorContext {
    registry: PointRegistry,
    fusion: FusionTable,
    anomalies: AnomalyEngine,
}

/// Headline numbers about the loaded dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub registered_points: usize,
    pub observed_points: usize,
    pub samples: usize,
    pub labels: Vec<String>,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub points_with_mean_velocity: usize,
    pub band_mode: BandMode,
    pub points_with_anomaly_source: usize,
}

impl MonitorContext {
    /// Builds every derived table from materialized inputs.
    ///
    /// Fails only when the displacement inputs repeat a sample.
    pub fn build(inputs: Inputs, settings: AnalysisSettings) -> Result<Self, DefmonError> {
        let registry = PointRegistry::from_sources(inputs.geolocation);
        let fusion = FusionTable::build(inputs.displacement, &registry)?;
        let anomalies = AnomalyEngine::new(
            inputs.predictions.into_iter().flatten().collect(),
            inputs.anomalies.into_iter().flatten().collect(),
            settings,
        );

        if anomalies.covered_points() == 0 {
            warn!(
                stage = %Stage::Anomaly,
                mode = ?anomalies.mode(),
                "no anomaly source for the configured band mode"
            );
        } else {
            let covered = fusion.pids().filter(|pid| anomalies.has_source(pid)).count();
            log_coverage_summary(Stage::Anomaly, "anomaly sources", fusion.point_count(), covered);
        }

        Ok(MonitorContext {
            registry,
            fusion,
            anomalies,
        })
    }

    /// Reads every configured source and builds the context.
    ///
    /// Any load failure aborts: no partial dataset is ever served.
    pub fn load(config: &Config) -> Result<Self, DefmonError> {
        load_inputs(config)
            .and_then(|inputs| Self::build(inputs, config.analysis.clone()))
            .inspect_err(|e| log_failure(Stage::Load, None, "dataset load", e))
    }

    pub fn registry(&self) -> &PointRegistry {
        &self.registry
    }

    pub fn fusion(&self) -> &FusionTable {
        &self.fusion
    }

    pub fn anomalies(&self) -> &AnomalyEngine {
        &self.anomalies
    }

    pub fn settings(&self) -> &AnalysisSettings {
        self.anomalies.settings()
    }

    pub fn summary(&self) -> DatasetSummary {
        let span = self.fusion.date_span();
        DatasetSummary {
            registered_points: self.registry.len(),
            observed_points: self.fusion.point_count(),
            samples: self.fusion.rows().len(),
            labels: self.fusion.labels().iter().cloned().collect(),
            first_date: span.map(|s| s.0),
            last_date: span.map(|s| s.1),
            points_with_mean_velocity: self
                .fusion
                .pids()
                .filter(|pid| self.fusion.mean_velocity(pid).is_some())
                .count(),
            band_mode: self.anomalies.mode(),
            points_with_anomaly_source: self.anomalies.covered_points(),
        }
    }
}

/// Reads and reshapes every source named in `config`.
pub fn load_inputs(config: &Config) -> Result<Inputs, DefmonError> {
    let mut inputs = Inputs::default();
    let settings = &config.analysis;

    for source in &config.geolocation {
        let table = Table::read_csv_file(&config.resolve(&source.path))?;
        let points = ingest::load_geolocation(&table)?;
        log_source_loaded(&table.source, None, points.len());
        inputs.geolocation.push(points);
    }

    for source in &config.displacement {
        let table = Table::read_csv_file(&config.resolve(&source.path))?;
        let samples = ingest::load_wide_series(&table, &source.date_column, &source.label)?;
        log_source_loaded(&table.source, Some(&source.label), samples.len());
        inputs.displacement.push(samples);
    }

    for source in &config.prediction {
        let table = Table::read_csv_file(&config.resolve(&source.path))?;
        let predictions = ingest::load_prediction_series(&table, &source.label)?;
        log_source_loaded(&table.source, Some(&source.label), predictions.len());
        inputs.predictions.push(predictions);
    }

    for source in &config.anomaly {
        let table = Table::read_csv_file(&config.resolve(&source.path))?;
        let records = ingest::load_anomaly_records(
            &table,
            &source.label,
            settings.primary_level(),
            settings.secondary_level(),
        )?;
        log_source_loaded(&table.source, Some(&source.label), records.len());
        inputs.anomalies.push(records);
    }

    info!(
        stage = %Stage::Load,
        geolocation = inputs.geolocation.len(),
        displacement = inputs.displacement.len(),
        prediction = inputs.predictions.len(),
        anomaly = inputs.anomalies.len(),
        "all sources loaded"
    );
    Ok(inputs)
}
