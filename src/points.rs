/// Point registry for the displacement monitoring service.
///
/// Canonical mapping of point id to static geolocation, built once from
/// every geolocation source and never mutated afterwards. This is the single
/// join target for displacement samples; other modules look points up here
/// rather than scanning the raw geolocation tables.

use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::logging::Stage;
use crate::model::{DefmonError, Point};

/// Immutable point id → geolocation lookup.
#[derive(Debug, Clone, Default)]
pub struct PointRegistry {
    points: Vec<Point>,
    index: HashMap<String, usize>,
}

/// Latitude/longitude bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    /// Grows the box by `degrees` on every side.
    pub fn padded(&self, degrees: f64) -> BoundingBox {
        BoundingBox {
            min_lat: self.min_lat - degrees,
            max_lat: self.max_lat + degrees,
            min_lon: self.min_lon - degrees,
            max_lon: self.max_lon + degrees,
        }
    }

    /// Smallest box around `coords`, or `None` when empty.
    pub fn around(coords: impl IntoIterator<Item = (f64, f64)>) -> Option<BoundingBox> {
        coords.into_iter().fold(None, |acc, (lat, lon)| {
            Some(match acc {
                None => BoundingBox {
                    min_lat: lat,
                    max_lat: lat,
                    min_lon: lon,
                    max_lon: lon,
                },
                Some(b) => BoundingBox {
                    min_lat: b.min_lat.min(lat),
                    max_lat: b.max_lat.max(lat),
                    min_lon: b.min_lon.min(lon),
                    max_lon: b.max_lon.max(lon),
                },
            })
        })
    }
}

impl PointRegistry {
    /// Concatenates geolocation sources in order.
    ///
    /// Point ids are unique after construction: when a pid appears more
    /// than once the last occurrence wins, so joins never fan out.
    pub fn from_sources(sources: impl IntoIterator<Item = Vec<Point>>) -> Self {
        let mut registry = PointRegistry::default();
        let mut duplicates = 0usize;

        for point in sources.into_iter().flatten() {
            match registry.index.get(&point.pid) {
                Some(&slot) => {
                    duplicates += 1;
                    registry.points[slot] = point;
                }
                None => {
                    registry.index.insert(point.pid.clone(), registry.points.len());
                    registry.points.push(point);
                }
            }
        }

        if duplicates > 0 {
            warn!(
                stage = %Stage::Load,
                duplicates,
                "duplicate point ids in geolocation sources; kept the last occurrence"
            );
        }
        registry
    }

    /// Looks up a point by id. Returns `None` if not found.
    pub fn lookup(&self, pid: &str) -> Option<&Point> {
        self.index.get(pid).map(|&i| &self.points[i])
    }

    /// Like `lookup`, for callers that treat an unknown id as an error.
    pub fn require(&self, pid: &str) -> Result<&Point, DefmonError> {
        self.lookup(pid)
            .ok_or_else(|| DefmonError::PointNotFound(pid.to_string()))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
