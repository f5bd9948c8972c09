/// Per-point time series with the anomaly overlay attached.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::anomaly::OverlayPoint;
use crate::context::MonitorContext;
use crate::logging::Stage;
use crate::model::{DerivedSample, Point, SignificanceLevel};

/// Inclusive date filter; an open end is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn all() -> Self {
        DateRange::default()
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|s| date >= s) && self.end.is_none_or(|e| date <= e)
    }
}

/// One observed sample and, inside the aligned tail, its overlay entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesRow {
    #[serde(flatten)]
    pub sample: DerivedSample,
    pub overlay: Option<OverlayPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointSeries {
    pub pid: String,
    pub point: Option<Point>,
    pub rows: Vec<SeriesRow>,
    /// Band levels present anywhere in the overlay.
    pub levels: Vec<SignificanceLevel>,
}

impl PointSeries {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows that carry an overlay entry.
    pub fn overlaid(&self) -> impl Iterator<Item = &SeriesRow> {
        self.rows.iter().filter(|r| r.overlay.is_some())
    }
}

/// Time-ordered samples of `pid` within `range`, each with its overlay.
///
/// The overlay is aligned against the full history before the date filter
/// is applied, so narrowing the range never shifts which samples carry
/// bands. An unknown pid yields an empty series.
pub fn point_series(ctx: &MonitorContext, pid: &str, range: &DateRange) -> PointSeries {
    let observed = ctx.fusion().for_point(pid);
    if observed.is_empty() {
        debug!(stage = %Stage::Query, pid, "no samples for point");
    }

    let overlay = ctx.anomalies().overlay(pid, observed);
    let levels = overlay.as_ref().map(|o| o.levels()).unwrap_or_default();

    let rows = observed
        .iter()
        .enumerate()
        .filter(|(_, sample)| range.contains(sample.timestamp()))
        .map(|(i, sample)| SeriesRow {
            sample: sample.clone(),
            overlay: overlay.as_ref().and_then(|o| o.at(i)).cloned(),
        })
        .collect();

    PointSeries {
        pid: pid.to_string(),
        point: ctx.registry().lookup(pid).cloned(),
        rows,
        levels,
    }
}
