/// Velocity aggregation: one mean annualized speed per point.

use std::collections::HashMap;

use crate::analysis::groupings::contiguous_partitions;
use crate::analysis::stats::mean;
use crate::logging::{log_coverage_summary, Stage};
use crate::model::DerivedSample;

/// Mean of the defined `annualized_speed` values of every point.
///
/// A point whose rows carry no defined speed (a single observation, or
/// only zero-day gaps) maps to `None`. `rows` must be grouped by pid.
pub fn mean_velocities(rows: &[DerivedSample]) -> HashMap<String, Option<f64>> {
    let means: HashMap<String, Option<f64>> = contiguous_partitions(rows, |r| r.pid())
        .into_iter()
        .map(|range| {
            let speeds: Vec<f64> = rows[range.clone()]
                .iter()
                .filter_map(|r| r.annualized_speed)
                .collect();
            (rows[range.start].pid().to_string(), mean(&speeds))
        })
        .collect();

    let defined = means.values().filter(|m| m.is_some()).count();
    log_coverage_summary(Stage::Velocity, "mean velocity", means.len(), defined);
    means
}

/// Copies each point's mean velocity onto all of its rows.
pub fn attach_mean_velocity(rows: &mut [DerivedSample], means: &HashMap<String, Option<f64>>) {
    for row in rows.iter_mut() {
        row.mean_velocity = means.get(row.pid()).copied().flatten();
    }
}
