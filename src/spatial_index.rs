//! Nearest-neighbor lookup against reference geometry.
//!
//! Two R-trees are built once from the reference map: one over the waypoint
//! sequence and one over the actuator reference positions. Each query is
//! O(log n) after O(n log n) bulk loading.
//!
//! Classification is winner-take-all with no distance threshold: a point
//! far from every waypoint still takes the attributes of the nearest one.
//! Equidistant candidates resolve to the lowest map index so results never
//! depend on tree layout.

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::reference_map::ReferenceMap;
use crate::types::{
    ActuatorReference, ClassifiedRecord, FusedRecord, Planar, ReferenceAttributes, ReferencePoint,
};

/// A map index stored in the tree alongside its coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
struct IndexedPoint {
    idx: usize,
    x: f64,
    y: f64,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.x, self.y])
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.x - point[0];
        let dy = self.y - point[1];
        dx * dx + dy * dy
    }
}

fn build_rtree<P: Planar>(points: &[P]) -> RTree<IndexedPoint> {
    let indexed = points
        .iter()
        .enumerate()
        .map(|(idx, p)| {
            let [x, y] = p.xy();
            IndexedPoint { idx, x, y }
        })
        .collect();
    RTree::bulk_load(indexed)
}

/// Lowest map index among the nearest candidates.
fn nearest_index(tree: &RTree<IndexedPoint>, query: [f64; 2]) -> Option<usize> {
    let mut candidates = tree.nearest_neighbor_iter(&query);
    let first = candidates.next()?;
    let best = first.distance_2(&query);
    let tied = candidates.take_while(|c| c.distance_2(&query) == best);
    std::iter::once(first).chain(tied).map(|c| c.idx).min()
}

/// Immutable nearest-neighbor index over a reference map.
#[derive(Clone)]
pub struct SpatialIndex {
    waypoints: Vec<ReferencePoint>,
    waypoint_tree: RTree<IndexedPoint>,
    actuators: Vec<ActuatorReference>,
    actuator_tree: RTree<IndexedPoint>,
}

impl SpatialIndex {
    pub fn new(map: &ReferenceMap) -> Self {
        let waypoints = map.points().to_vec();
        let actuators = map.actuator_references().to_vec();
        debug!(
            waypoints = waypoints.len(),
            actuators = actuators.len(),
            "building spatial index"
        );
        Self {
            waypoint_tree: build_rtree(&waypoints),
            actuator_tree: build_rtree(&actuators),
            waypoints,
            actuators,
        }
    }

    /// Nearest waypoint and its map index.
    pub fn nearest_waypoint<P: Planar + ?Sized>(
        &self,
        point: &P,
    ) -> Option<(usize, &ReferencePoint)> {
        let idx = nearest_index(&self.waypoint_tree, point.xy())?;
        Some((idx, &self.waypoints[idx]))
    }

    /// Nearest actuator reference, if the map has any.
    pub fn nearest_actuator<P: Planar + ?Sized>(&self, point: &P) -> Option<&ActuatorReference> {
        let idx = nearest_index(&self.actuator_tree, point.xy())?;
        Some(&self.actuators[idx])
    }

    /// Attributes of the nearest reference geometry for one point.
    ///
    /// `None` only when the index holds no waypoints.
    pub fn classify<P: Planar + ?Sized>(&self, point: &P) -> Option<ReferenceAttributes> {
        let (_, waypoint) = self.nearest_waypoint(point)?;
        Some(ReferenceAttributes {
            treatment_area: waypoint.treatment_area,
            setpoint: self.nearest_actuator(point).map(|a| a.setpoint),
        })
    }

    /// Attach reference attributes to every record, preserving order.
    pub fn classify_all(&self, records: &[FusedRecord]) -> Result<Vec<ClassifiedRecord>> {
        records
            .iter()
            .map(|record| {
                let reference = self.classify(record).ok_or_else(|| {
                    EngineError::InvalidMap("no waypoints to classify against".to_string())
                })?;
                Ok(ClassifiedRecord {
                    record: *record,
                    reference,
                })
            })
            .collect()
    }
}

/// Classify one point against an index.
pub fn classify<P: Planar + ?Sized>(
    point: &P,
    index: &SpatialIndex,
) -> Option<ReferenceAttributes> {
    index.classify(point)
}
