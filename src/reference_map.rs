//! Reference map: the intended path and actuator setpoints of a work area.
//!
//! The map document carries a geodetic datum, an ordered waypoint list with a
//! treatment-area flag per waypoint, and an optional list of actuator
//! reference positions. Waypoints are already expressed in meters relative
//! to the datum.
//!
//! The contiguous runs of `treatment_area` split the waypoint sequence into
//! four path categories:
//! - rows: every treatment-area waypoint, flattened in order
//! - turns: the waypoints strictly between consecutive treatment runs
//! - start path: index 0 up to and including the first treatment waypoint
//! - end path: everything after the last treatment waypoint
//!
//! A map without any treatment-area waypoint has no defined start or end
//! path and is rejected at load time.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EngineError, Result};
use crate::types::{ActuatorPositions, ActuatorReference, GeoPoint, PlanarPoint, ReferencePoint};

/// The four canonical path categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathCategory {
    StartPath,
    Row,
    Turn,
    EndPath,
}

impl PathCategory {
    pub const ALL: [PathCategory; 4] = [
        PathCategory::Row,
        PathCategory::Turn,
        PathCategory::StartPath,
        PathCategory::EndPath,
    ];
}

impl fmt::Display for PathCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PathCategory::StartPath => "start_path",
            PathCategory::Row => "rows",
            PathCategory::Turn => "turns",
            PathCategory::EndPath => "end_path",
        };
        f.write_str(name)
    }
}

// Wire shape of the map document. Required fields are `Option` so that a
// missing one is reported by name instead of as a generic parse error.
#[derive(Debug, Deserialize)]
struct MapDocument {
    datum: Option<GeoPoint>,
    points: Option<Vec<WaypointDoc>>,
    #[serde(default)]
    wing_boom_position: Vec<ActuatorPointDoc>,
}

#[derive(Debug, Deserialize)]
struct PoseDoc {
    position: PlanarPoint,
}

#[derive(Debug, Deserialize)]
struct WaypointDoc {
    head: PoseDoc,
    #[serde(default)]
    treatment_area: bool,
}

#[derive(Debug, Deserialize)]
struct ActuatorPointDoc {
    point: PoseDoc,
    #[serde(flatten)]
    setpoint: ActuatorPositions,
}

/// Validated reference map. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceMap {
    datum: GeoPoint,
    points: Vec<ReferencePoint>,
    actuators: Vec<ActuatorReference>,
    first_treatment: usize,
    last_treatment: usize,
}

impl ReferenceMap {
    /// Build a map from already-decoded geometry.
    ///
    /// Fails with `InvalidMap` on an empty waypoint list and with
    /// `UnmatchedCategory` when no waypoint is in the treatment area.
    pub fn new(
        datum: GeoPoint,
        points: Vec<ReferencePoint>,
        actuators: Vec<ActuatorReference>,
    ) -> Result<Self> {
        if points.is_empty() {
            return Err(EngineError::InvalidMap("'points' is empty".to_string()));
        }
        let first_treatment = points
            .iter()
            .position(|p| p.treatment_area)
            .ok_or(EngineError::UnmatchedCategory)?;
        let last_treatment = points
            .iter()
            .rposition(|p| p.treatment_area)
            .ok_or(EngineError::UnmatchedCategory)?;

        Ok(Self {
            datum,
            points,
            actuators,
            first_treatment,
            last_treatment,
        })
    }

    /// Parse and validate a map document.
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let doc: MapDocument = serde_json::from_str(contents)
            .map_err(|e| EngineError::InvalidMap(e.to_string()))?;

        let datum = doc
            .datum
            .ok_or_else(|| EngineError::InvalidMap("missing 'datum'".to_string()))?;
        let waypoints = doc
            .points
            .ok_or_else(|| EngineError::InvalidMap("missing 'points'".to_string()))?;

        let points = waypoints
            .into_iter()
            .map(|w| ReferencePoint::new(w.head.position.x, w.head.position.y, w.treatment_area))
            .collect();
        let actuators = doc
            .wing_boom_position
            .into_iter()
            .map(|a| ActuatorReference {
                x: a.point.position.x,
                y: a.point.position.y,
                setpoint: a.setpoint,
            })
            .collect();

        let map = Self::new(datum, points, actuators)?;
        info!(
            points = map.points.len(),
            actuator_points = map.actuators.len(),
            first_treatment = map.first_treatment,
            last_treatment = map.last_treatment,
            "loaded reference map"
        );
        Ok(map)
    }

    /// Load and validate a map file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    pub fn datum(&self) -> GeoPoint {
        self.datum
    }

    /// The full waypoint sequence in map order.
    pub fn points(&self) -> &[ReferencePoint] {
        &self.points
    }

    pub fn actuator_references(&self) -> &[ActuatorReference] {
        &self.actuators
    }

    /// The single category a waypoint index belongs to.
    ///
    /// Unlike [`points_in`](Self::points_in), this is a strict partition: the
    /// first treatment waypoint is a row, not part of the start path.
    pub fn category_of(&self, index: usize) -> Option<PathCategory> {
        let point = self.points.get(index)?;
        let category = if index < self.first_treatment {
            PathCategory::StartPath
        } else if index > self.last_treatment {
            PathCategory::EndPath
        } else if point.treatment_area {
            PathCategory::Row
        } else {
            PathCategory::Turn
        };
        Some(category)
    }

    /// Waypoints of a category, in map order.
    ///
    /// The start path includes the first treatment waypoint so its length
    /// covers the leg into the first row.
    pub fn points_in(&self, category: PathCategory) -> Vec<ReferencePoint> {
        match category {
            PathCategory::Row => self
                .points
                .iter()
                .filter(|p| p.treatment_area)
                .copied()
                .collect(),
            PathCategory::Turn => self.points[self.first_treatment..=self.last_treatment]
                .iter()
                .filter(|p| !p.treatment_area)
                .copied()
                .collect(),
            PathCategory::StartPath => self.points[..=self.first_treatment].to_vec(),
            PathCategory::EndPath => self.points[self.last_treatment + 1..].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags_map(flags: &[bool]) -> ReferenceMap {
        let points = flags
            .iter()
            .enumerate()
            .map(|(i, &t)| ReferencePoint::new(i as f64, 0.0, t))
            .collect();
        ReferenceMap::new(GeoPoint::new(0.0, 0.0), points, Vec::new()).unwrap()
    }

    fn xs(points: &[ReferencePoint]) -> Vec<f64> {
        points.iter().map(|p| p.x).collect()
    }

    const DOC: &str = r#"{
        "datum": {"longitude": -84.0, "latitude": 33.0},
        "points": [
            {"head": {"position": {"x": 0.0, "y": 0.0}}, "treatment_area": false},
            {"head": {"position": {"x": 1.0, "y": 0.0}}, "treatment_area": true},
            {"head": {"position": {"x": 2.0, "y": 0.0}}, "treatment_area": true},
            {"head": {"position": {"x": 3.0, "y": 0.0}}}
        ],
        "wing_boom_position": [
            {"point": {"position": {"x": 1.5, "y": 0.0}},
             "boom_position": 0.5, "left_wing_position": 0.25, "right_wing_position": 0.75}
        ]
    }"#;

    #[test]
    fn test_parse_document() {
        let map = ReferenceMap::from_json_str(DOC).unwrap();
        assert_eq!(map.datum(), GeoPoint::new(-84.0, 33.0));
        assert_eq!(map.points().len(), 4);
        assert!(!map.points()[3].treatment_area, "missing flag defaults to false");
        assert_eq!(map.actuator_references().len(), 1);
        assert_eq!(
            map.actuator_references()[0].setpoint,
            ActuatorPositions::new(0.5, 0.25, 0.75)
        );
    }

    #[test]
    fn test_short_datum_keys() {
        let doc = r#"{
            "datum": {"lon": 1.0, "lat": 2.0},
            "points": [{"head": {"position": {"x": 0, "y": 0}}, "treatment_area": true}]
        }"#;
        let map = ReferenceMap::from_json_str(doc).unwrap();
        assert_eq!(map.datum(), GeoPoint::new(1.0, 2.0));
        assert!(map.actuator_references().is_empty());
    }

    #[test]
    fn test_missing_required_fields() {
        let no_points = r#"{"datum": {"longitude": 0, "latitude": 0}}"#;
        let err = ReferenceMap::from_json_str(no_points).unwrap_err();
        assert!(matches!(err, EngineError::InvalidMap(ref m) if m.contains("points")));

        let no_datum = r#"{"points": []}"#;
        let err = ReferenceMap::from_json_str(no_datum).unwrap_err();
        assert!(matches!(err, EngineError::InvalidMap(ref m) if m.contains("datum")));

        let err = ReferenceMap::from_json_str("not json").unwrap_err();
        assert!(matches!(err, EngineError::InvalidMap(_)));
    }

    #[test]
    fn test_no_treatment_area_is_unmatched() {
        let points = vec![ReferencePoint::new(0.0, 0.0, false)];
        let err = ReferenceMap::new(GeoPoint::new(0.0, 0.0), points, Vec::new()).unwrap_err();
        assert!(matches!(err, EngineError::UnmatchedCategory));
    }

    #[test]
    fn test_category_point_lists() {
        let map = flags_map(&[false, false, true, true, false, false, true, false]);
        assert_eq!(xs(&map.points_in(PathCategory::Row)), vec![2.0, 3.0, 6.0]);
        assert_eq!(xs(&map.points_in(PathCategory::Turn)), vec![4.0, 5.0]);
        assert_eq!(xs(&map.points_in(PathCategory::StartPath)), vec![0.0, 1.0, 2.0]);
        assert_eq!(xs(&map.points_in(PathCategory::EndPath)), vec![7.0]);
    }

    #[test]
    fn test_turns_concatenate_across_rows() {
        let map = flags_map(&[true, false, true, false, false, true]);
        assert_eq!(xs(&map.points_in(PathCategory::Turn)), vec![1.0, 3.0, 4.0]);
        assert!(map.points_in(PathCategory::EndPath).is_empty());
        assert_eq!(xs(&map.points_in(PathCategory::StartPath)), vec![0.0]);
    }

    #[test]
    fn test_partition_reconstructs_sequence() {
        let flags = [false, true, false, true, true, false, false];
        let map = flags_map(&flags);

        let indices: Vec<usize> = (0..flags.len())
            .filter(|&i| map.category_of(i).is_some())
            .collect();
        assert_eq!(indices, (0..flags.len()).collect::<Vec<_>>());
        assert_eq!(map.category_of(0), Some(PathCategory::StartPath));
        assert_eq!(map.category_of(1), Some(PathCategory::Row));
        assert_eq!(map.category_of(2), Some(PathCategory::Turn));
        assert_eq!(map.category_of(5), Some(PathCategory::EndPath));
        assert_eq!(map.category_of(7), None);

        let total: usize = PathCategory::ALL
            .iter()
            .map(|&c| (0..flags.len()).filter(|&i| map.category_of(i) == Some(c)).count())
            .sum();
        assert_eq!(total, flags.len());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.json");
        fs::write(&path, DOC).unwrap();
        let map = ReferenceMap::load(&path).unwrap();
        assert_eq!(map.points().len(), 4);

        let missing = ReferenceMap::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(missing, EngineError::Io(_)));
    }
}
