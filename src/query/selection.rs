/// Two-point selection driven by map clicks.

use crate::context::MonitorContext;
use crate::geo::distance_km;
use crate::logging::{log_failure, Stage};
use crate::model::{SelectedPair, SelectedPoint};

impl SelectedPair {
    pub fn is_empty(&self) -> bool {
        self.first.is_none() && self.second.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.first.is_some() && self.second.is_some()
    }
}

/// Next selection after a click on `pid` at `(latitude, longitude)`.
///
/// - both slots filled: the selection is cleared and the click is dropped;
/// - only the first filled: the click fills the second;
/// - otherwise: the click fills the first.
///
/// Clicking the same point twice selects it in both slots.
pub fn toggle_selection(
    pid: &str,
    latitude: f64,
    longitude: f64,
    current: &SelectedPair,
) -> SelectedPair {
    let clicked = SelectedPoint {
        pid: pid.to_string(),
        latitude,
        longitude,
    };
    match (&current.first, &current.second) {
        (Some(_), Some(_)) => SelectedPair::default(),
        (Some(first), None) => SelectedPair {
            first: Some(first.clone()),
            second: Some(clicked),
        },
        _ => SelectedPair {
            first: Some(clicked),
            second: None,
        },
    }
}

/// Selection state of one client.
#[derive(Debug, Clone, Default)]
pub struct QuerySession {
    selection: SelectedPair,
}

impl QuerySession {
    pub fn new() -> Self {
        QuerySession::default()
    }

    /// Applies a click at the registered location of `pid`.
    ///
    /// Clicks on ids the registry does not know are ignored.
    pub fn click(&mut self, ctx: &MonitorContext, pid: &str) -> &SelectedPair {
        match ctx.registry().require(pid) {
            Ok(point) => {
                self.selection =
                    toggle_selection(pid, point.latitude, point.longitude, &self.selection);
            }
            Err(err) => log_failure(Stage::Query, Some(pid), "selection click", &err),
        }
        &self.selection
    }

    /// Applies a click at explicit coordinates.
    pub fn click_at(&mut self, pid: &str, latitude: f64, longitude: f64) -> &SelectedPair {
        self.selection = toggle_selection(pid, latitude, longitude, &self.selection);
        &self.selection
    }

    pub fn selection(&self) -> &SelectedPair {
        &self.selection
    }

    pub fn clear(&mut self) {
        self.selection = SelectedPair::default();
    }

    /// Distance between the two selected points, once both are chosen.
    pub fn selection_distance(&self) -> Option<f64> {
        let (a, b) = (self.selection.first.as_ref()?, self.selection.second.as_ref()?);
        Some(distance_km((a.latitude, a.longitude), (b.latitude, b.longitude)))
    }
}
