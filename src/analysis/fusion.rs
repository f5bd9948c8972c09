/// Displacement fusion: join samples with the point registry, order them per
/// point and derive first differences and annualized speed.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::Range;

use chrono::NaiveDate;
use tracing::debug;

use crate::analysis::groupings::contiguous_partitions;
use crate::analysis::velocity;
use crate::logging::{log_coverage_summary, Stage};
use crate::model::{DefmonError, DerivedSample, DisplacementSample, DAYS_PER_YEAR};
use crate::points::PointRegistry;

/// Joins, sorts and differentiates displacement samples.
///
/// 1. Each sample is left-joined to the registry; unmatched samples keep
///    `geolocation: None` and are not dropped.
/// 2. All provenance partitions are concatenated in the given order.
/// 3. Rows are stable-sorted by `(pid, timestamp)`.
/// 4. Differences are taken against the previous row of the same point.
///
/// `mean_velocity` is left unset; see `analysis::velocity`.
///
/// A point may have one sample per date and label. Sources sharing a label
/// that both carry a point on the same date are `MalformedInput`.
pub fn build_fusion(
    series: impl IntoIterator<Item = Vec<DisplacementSample>>,
    registry: &PointRegistry,
) -> Result<Vec<DerivedSample>, DefmonError> {
    let mut rows: Vec<DerivedSample> = series
        .into_iter()
        .flatten()
        .map(|sample| {
            let geolocation = registry.lookup(&sample.pid).map(|p| p.geolocation());
            DerivedSample {
                sample,
                geolocation,
                displacement_diff: None,
                time_diff_days: None,
                annualized_speed: None,
                mean_velocity: None,
            }
        })
        .collect();
    check_unique_samples(&rows)?;

    rows.sort_by(|a, b| {
        a.pid()
            .cmp(b.pid())
            .then_with(|| a.timestamp().cmp(&b.timestamp()))
    });

    for range in contiguous_partitions(&rows, |r| r.pid()) {
        for i in (range.start + 1)..range.end {
            let (prev_value, prev_time) = (rows[i - 1].displacement(), rows[i - 1].timestamp());
            let row = &mut rows[i];
            let diff = row.displacement() - prev_value;
            let days = (row.timestamp() - prev_time).num_days();
            row.displacement_diff = diff.is_finite().then_some(diff);
            row.time_diff_days = Some(days);
            row.annualized_speed = annualized_speed(row.displacement_diff, days);
        }
    }

    Ok(rows)
}

fn check_unique_samples(rows: &[DerivedSample]) -> Result<(), DefmonError> {
    let mut seen = HashSet::with_capacity(rows.len());
    for row in rows {
        if !seen.insert((row.pid(), row.timestamp(), row.label())) {
            return Err(DefmonError::malformed(
                &format!("displacement sources labelled '{}'", row.label()),
                format!(
                    "point '{}' has more than one sample on {}",
                    row.pid(),
                    row.timestamp()
                ),
            ));
        }
    }
    Ok(())
}

/// `diff / days * 365`, undefined for a zero day gap.
pub fn annualized_speed(displacement_diff: Option<f64>, time_diff_days: i64) -> Option<f64> {
    if time_diff_days == 0 {
        return None;
    }
    let speed = displacement_diff? / time_diff_days as f64 * DAYS_PER_YEAR;
    speed.is_finite().then_some(speed)
}

// ---------------------------------------------------------------------------
// Fusion table
// ---------------------------------------------------------------------------

/// The fused, velocity-annotated sample table, indexed by point.
///
/// Built once at startup and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct FusionTable {
    rows: Vec<DerivedSample>,
    partitions: HashMap<String, Range<usize>>,
    labels: BTreeSet<String>,
}

impl FusionTable {
    /// Runs fusion and the velocity aggregator and indexes the result.
    pub fn build(
        series: impl IntoIterator<Item = Vec<DisplacementSample>>,
        registry: &PointRegistry,
    ) -> Result<Self, DefmonError> {
        let mut rows = build_fusion(series, registry)?;
        let means = velocity::mean_velocities(&rows);
        velocity::attach_mean_velocity(&mut rows, &means);

        let partitions: HashMap<String, Range<usize>> = contiguous_partitions(&rows, |r| r.pid())
            .into_iter()
            .map(|range| (rows[range.start].pid().to_string(), range))
            .collect();
        let labels = rows.iter().map(|r| r.label().to_string()).collect();

        let geolocated = partitions
            .values()
            .filter(|range| rows[range.start].geolocation.is_some())
            .count();
        log_coverage_summary(Stage::Fusion, "geolocation join", partitions.len(), geolocated);
        debug!(
            stage = %Stage::Fusion,
            rows = rows.len(),
            points = partitions.len(),
            "fusion table built"
        );

        Ok(FusionTable {
            rows,
            partitions,
            labels,
        })
    }

    /// All rows, sorted by `(pid, timestamp)`.
    pub fn rows(&self) -> &[DerivedSample] {
        &self.rows
    }

    /// Time-ordered rows of one point; empty for an unknown pid.
    pub fn for_point(&self, pid: &str) -> &[DerivedSample] {
        self.partitions
            .get(pid)
            .map(|range| &self.rows[range.clone()])
            .unwrap_or(&[])
    }

    pub fn contains(&self, pid: &str) -> bool {
        self.partitions.contains_key(pid)
    }

    /// Distinct point ids, in no particular order.
    pub fn pids(&self) -> impl Iterator<Item = &str> {
        self.partitions.keys().map(String::as_str)
    }

    pub fn mean_velocity(&self, pid: &str) -> Option<f64> {
        self.for_point(pid).first().and_then(|r| r.mean_velocity)
    }

    /// Distinct provenance labels present in the table.
    pub fn labels(&self) -> &BTreeSet<String> {
        &self.labels
    }

    pub fn point_count(&self) -> usize {
        self.partitions.len()
    }

    /// Earliest and latest timestamp across all points.
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.rows.iter().map(|r| r.timestamp()).min()?;
        let max = self.rows.iter().map(|r| r.timestamp()).max()?;
        Some((min, max))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
