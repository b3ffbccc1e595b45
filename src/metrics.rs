//! Derived analytics over the fused trajectory.
//!
//! Distances are Euclidean in the local planar frame, durations are
//! timestamp differences in seconds. Masked quantities (payload on, payload
//! off) only count consecutive pairs where both samples satisfy the mask, so
//! time and distance spent in the opposite state never leak in.
//!
//! Zero denominators are reported as `DegenerateComputation`, never as 0,
//! NaN or infinity.

use serde::Serialize;
use tracing::debug;

use crate::config::{SpeedConfig, StationaryPolicy};
use crate::error::{EngineError, Result};
use crate::reference_map::{PathCategory, ReferenceMap};
use crate::types::{Channel, FusedRecord, PayloadState, Planar, Position};

// ============================================================================
// DISTANCE AND DURATION
// ============================================================================

/// Summed distance between consecutive points.
pub fn path_length<P: Planar>(points: &[P]) -> f64 {
    points.windows(2).map(|w| w[0].distance_to(&w[1])).sum()
}

/// Summed distance between consecutive points that both satisfy `mask`.
pub fn masked_path_length<P, F>(points: &[P], mask: F) -> f64
where
    P: Planar,
    F: Fn(&P) -> bool,
{
    points
        .windows(2)
        .filter(|w| mask(&w[0]) && mask(&w[1]))
        .map(|w| w[0].distance_to(&w[1]))
        .sum()
}

/// Summed timestamp differences between consecutive items that both satisfy
/// `mask`.
pub fn masked_duration<T, F>(items: &[T], timestamp: impl Fn(&T) -> f64, mask: F) -> f64
where
    F: Fn(&T) -> bool,
{
    items
        .windows(2)
        .filter(|w| mask(&w[0]) && mask(&w[1]))
        .map(|w| timestamp(&w[1]) - timestamp(&w[0]))
        .sum()
}

/// Time between the first and last position fix.
pub fn runtime(positions: &[Position]) -> Result<f64> {
    match (positions.first(), positions.last()) {
        (Some(first), Some(last)) => Ok(last.timestamp - first.timestamp),
        _ => Err(EngineError::EmptyInput(Channel::Position)),
    }
}

// ============================================================================
// MODE DWELL
// ============================================================================

/// Time and distance spent under manual and autonomous control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ModeDwell {
    pub manual_time_s: f64,
    pub auto_time_s: f64,
    pub manual_distance_m: f64,
    pub auto_distance_m: f64,
}

/// Share of time in each mode, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModePercentages {
    pub manual: f64,
    pub auto: f64,
}

impl ModeDwell {
    /// Accumulate consecutive pairs into the bucket of the earlier sample's
    /// control flag. Records without a manual-control payload are skipped.
    pub fn from_records(records: &[FusedRecord]) -> Self {
        let flagged: Vec<(&FusedRecord, bool)> = records
            .iter()
            .filter_map(|r| r.manual_control().map(|m| (r, m)))
            .collect();

        let mut dwell = ModeDwell::default();
        for pair in flagged.windows(2) {
            let (prev, manual) = pair[0];
            let (next, _) = pair[1];
            let elapsed = next.timestamp - prev.timestamp;
            let distance = prev.distance_to(next);
            if manual {
                dwell.manual_time_s += elapsed;
                dwell.manual_distance_m += distance;
            } else {
                dwell.auto_time_s += elapsed;
                dwell.auto_distance_m += distance;
            }
        }
        dwell
    }

    pub fn total_time_s(&self) -> f64 {
        self.manual_time_s + self.auto_time_s
    }

    pub fn total_distance_m(&self) -> f64 {
        self.manual_distance_m + self.auto_distance_m
    }

    /// Percent of time in each mode. Fails when no time elapsed.
    pub fn percentages(&self) -> Result<ModePercentages> {
        let total = self.total_time_s();
        if total <= 0.0 {
            return Err(EngineError::DegenerateComputation("total mode time is zero"));
        }
        let auto = self.auto_time_s / total * 100.0;
        Ok(ModePercentages {
            manual: 100.0 - auto,
            auto,
        })
    }
}

// ============================================================================
// STOPS AND ASSISTS
// ============================================================================

/// A fix that did not move relative to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stop {
    /// Index into the position stream.
    pub index: usize,
    pub x: f64,
    pub y: f64,
    /// Time since the preceding fix.
    pub duration_s: f64,
}

/// Every fix that is stationary relative to its immediate predecessor.
pub fn find_stops(positions: &[Position], policy: StationaryPolicy) -> Vec<Stop> {
    positions
        .windows(2)
        .enumerate()
        .filter(|(_, w)| policy.is_stationary(w[0].xy(), w[1].xy()))
        .map(|(i, w)| Stop {
            index: i + 1,
            x: w[1].x,
            y: w[1].y,
            duration_s: w[1].timestamp - w[0].timestamp,
        })
        .collect()
}

/// A contiguous stretch of manual control.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Assist {
    /// 1-based, in order of occurrence.
    pub number: u32,
    pub start_index: usize,
    pub end_index: usize,
    pub duration_s: f64,
}

/// Runs of manual control in a mode stream.
pub fn find_assists(records: &[FusedRecord]) -> Vec<Assist> {
    let mut assists = Vec::new();
    let mut open: Option<usize> = None;

    let close = |start: usize, end: usize, assists: &mut Vec<Assist>| {
        assists.push(Assist {
            number: assists.len() as u32 + 1,
            start_index: start,
            end_index: end,
            duration_s: records[end].timestamp - records[start].timestamp,
        });
    };

    for (i, record) in records.iter().enumerate() {
        let manual = record.manual_control().unwrap_or(false);
        match (open, manual) {
            (None, true) => open = Some(i),
            (Some(start), false) => {
                close(start, i - 1, &mut assists);
                open = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        close(start, records.len() - 1, &mut assists);
    }
    assists
}

/// Time from the end of each assist to the start of the next.
pub fn assist_gaps(assists: &[Assist], records: &[FusedRecord]) -> Vec<f64> {
    assists
        .windows(2)
        .map(|w| records[w[1].start_index].timestamp - records[w[0].end_index].timestamp)
        .collect()
}

// ============================================================================
// PAYLOAD
// ============================================================================

/// Payload activation time and distance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PayloadSummary {
    pub on_duration_s: f64,
    pub off_duration_s: f64,
    pub on_distance_m: f64,
    pub off_distance_m: f64,
}

impl PayloadSummary {
    /// Mixed states count toward neither on nor off.
    pub fn from_records(records: &[FusedRecord]) -> Self {
        let is = |state: PayloadState| move |r: &FusedRecord| r.payload_state() == Some(state);
        Self {
            on_duration_s: masked_duration(records, |r| r.timestamp, is(PayloadState::On)),
            off_duration_s: masked_duration(records, |r| r.timestamp, is(PayloadState::Off)),
            on_distance_m: masked_path_length(records, is(PayloadState::On)),
            off_distance_m: masked_path_length(records, is(PayloadState::Off)),
        }
    }
}

// ============================================================================
// REFERENCE PATH ESTIMATES
// ============================================================================

/// Expected traversal time of a point list at a constant speed.
pub fn ideal_time<P: Planar>(points: &[P], speed_mps: f64) -> Result<f64> {
    if speed_mps <= 0.0 {
        return Err(EngineError::DegenerateComputation("assumed speed is zero"));
    }
    Ok(path_length(points) / speed_mps)
}

/// Length and ideal traversal time of one reference path category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategoryMetrics {
    pub category: PathCategory,
    pub distance_m: f64,
    pub ideal_time_s: f64,
}

// ============================================================================
// ENGINE
// ============================================================================

/// Computes metrics with a fixed stationary policy and speed assumptions.
#[derive(Debug, Clone)]
pub struct MetricsEngine {
    policy: StationaryPolicy,
    speeds: SpeedConfig,
}

impl MetricsEngine {
    pub fn new(policy: StationaryPolicy, speeds: SpeedConfig) -> Self {
        Self { policy, speeds }
    }

    pub fn stops(&self, positions: &[Position]) -> Vec<Stop> {
        find_stops(positions, self.policy)
    }

    /// Speed assumed for a category: rows at treatment speed, the rest at
    /// transit speed.
    pub fn speed_for(&self, category: PathCategory) -> f64 {
        match category {
            PathCategory::Row => self.speeds.treatment_mps,
            _ => self.speeds.transit_mps,
        }
    }

    /// Distance and ideal time for one category of the reference map.
    pub fn category_metrics(
        &self,
        map: &ReferenceMap,
        category: PathCategory,
    ) -> Result<CategoryMetrics> {
        let points = map.points_in(category);
        let metrics = CategoryMetrics {
            category,
            distance_m: path_length(&points),
            ideal_time_s: ideal_time(&points, self.speed_for(category))?,
        };
        debug!(
            category = %category,
            distance_m = metrics.distance_m,
            ideal_time_s = metrics.ideal_time_s,
            "reference category"
        );
        Ok(metrics)
    }

    /// Metrics for all four categories, rows first.
    pub fn reference_metrics(&self, map: &ReferenceMap) -> Result<Vec<CategoryMetrics>> {
        PathCategory::ALL
            .iter()
            .map(|&category| self.category_metrics(map, category))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelPayload, GeoPoint, ReferencePoint};

    fn mode_record(t: f64, x: f64, manual: bool) -> FusedRecord {
        FusedRecord {
            timestamp: t,
            x,
            y: 0.0,
            payload: ChannelPayload::ManualControl(manual),
        }
    }

    fn payload_record(t: f64, x: f64, state: PayloadState) -> FusedRecord {
        FusedRecord {
            timestamp: t,
            x,
            y: 0.0,
            payload: ChannelPayload::PayloadState(state),
        }
    }

    #[test]
    fn test_path_length() {
        let points = vec![
            Position::new(0.0, 0.0, 0.0),
            Position::new(1.0, 3.0, 4.0),
            Position::new(2.0, 3.0, 10.0),
        ];
        assert_eq!(path_length(&points), 11.0);
        assert_eq!(path_length(&points[..1]), 0.0);
        assert_eq!(path_length::<Position>(&[]), 0.0);
    }

    #[test]
    fn test_runtime() {
        let positions = vec![Position::new(2.0, 0.0, 0.0), Position::new(9.5, 1.0, 0.0)];
        assert_eq!(runtime(&positions).unwrap(), 7.5);
        assert!(matches!(
            runtime(&[]),
            Err(EngineError::EmptyInput(Channel::Position))
        ));
    }

    #[test]
    fn test_mode_dwell_uses_earlier_flag() {
        let records = vec![
            mode_record(0.0, 0.0, true),
            mode_record(2.0, 2.0, false), // manual: 2s, 2m
            mode_record(5.0, 5.0, false), // auto: 3s, 3m
            mode_record(6.0, 9.0, true),  // auto: 1s, 4m
        ];
        let dwell = ModeDwell::from_records(&records);
        assert_eq!(dwell.manual_time_s, 2.0);
        assert_eq!(dwell.manual_distance_m, 2.0);
        assert_eq!(dwell.auto_time_s, 4.0);
        assert_eq!(dwell.auto_distance_m, 7.0);

        let pct = dwell.percentages().unwrap();
        assert!((pct.manual + pct.auto - 100.0).abs() < 1e-9);
        assert!((pct.auto - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_mode_time_is_degenerate() {
        let dwell = ModeDwell::from_records(&[mode_record(0.0, 0.0, true)]);
        assert_eq!(dwell.total_time_s(), 0.0);
        assert!(matches!(
            dwell.percentages(),
            Err(EngineError::DegenerateComputation(_))
        ));
    }

    #[test]
    fn test_stops_exact_and_epsilon() {
        let positions = vec![
            Position::new(0.0, 0.0, 0.0),
            Position::new(0.5, 0.0, 0.0),
            Position::new(1.5, 0.0, 0.002),
            Position::new(2.0, 1.0, 0.0),
        ];
        let exact = find_stops(&positions, StationaryPolicy::Exact);
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].index, 1);
        assert_eq!(exact[0].duration_s, 0.5);

        let eps = find_stops(&positions, StationaryPolicy::Epsilon { epsilon_m: 0.01 });
        let indices: Vec<usize> = eps.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 2]);
        assert_eq!(eps[1].duration_s, 1.0);
    }

    #[test]
    fn test_assists_and_gaps() {
        let records = vec![
            mode_record(0.0, 0.0, false),
            mode_record(1.0, 1.0, true),
            mode_record(2.0, 2.0, true),
            mode_record(4.0, 3.0, false),
            mode_record(7.0, 4.0, true),
        ];
        let assists = find_assists(&records);
        assert_eq!(assists.len(), 2);
        assert_eq!((assists[0].start_index, assists[0].end_index), (1, 2));
        assert_eq!(assists[0].duration_s, 1.0);
        assert_eq!(assists[1].number, 2);
        assert_eq!((assists[1].start_index, assists[1].end_index), (4, 4));
        assert_eq!(assists[1].duration_s, 0.0);

        assert_eq!(assist_gaps(&assists, &records), vec![5.0]);
    }

    #[test]
    fn test_payload_counts_within_runs_only() {
        let records = vec![
            payload_record(0.0, 0.0, PayloadState::On),
            payload_record(1.0, 1.0, PayloadState::On),
            payload_record(2.0, 2.0, PayloadState::Off),
            payload_record(5.0, 5.0, PayloadState::Off),
            payload_record(6.0, 6.0, PayloadState::On),
            payload_record(6.5, 8.0, PayloadState::On),
            payload_record(7.0, 9.0, PayloadState::Mixed),
        ];
        let summary = PayloadSummary::from_records(&records);
        assert_eq!(summary.on_duration_s, 1.5);
        assert_eq!(summary.off_duration_s, 3.0);
        assert_eq!(summary.on_distance_m, 3.0);
        // The 5 -> 6 hop crosses from off to on and belongs to neither side.
        assert_eq!(summary.off_distance_m, 3.0);
    }

    #[test]
    fn test_ideal_time() {
        let points = vec![PlanarPointFixture(0.0), PlanarPointFixture(4.0)];
        assert_eq!(ideal_time(&points, 0.8).unwrap(), 5.0);
        assert!(matches!(
            ideal_time(&points, 0.0),
            Err(EngineError::DegenerateComputation(_))
        ));
    }

    struct PlanarPointFixture(f64);

    impl Planar for PlanarPointFixture {
        fn xy(&self) -> [f64; 2] {
            [self.0, 0.0]
        }
    }

    #[test]
    fn test_reference_metrics() {
        let points = vec![
            ReferencePoint::new(0.0, 0.0, false),
            ReferencePoint::new(1.0, 0.0, true),
            ReferencePoint::new(2.0, 0.0, true),
            ReferencePoint::new(2.0, 2.0, false),
            ReferencePoint::new(2.0, 4.0, true),
            ReferencePoint::new(5.0, 4.0, false),
        ];
        let map = ReferenceMap::new(GeoPoint::new(0.0, 0.0), points, Vec::new()).unwrap();
        let speeds = SpeedConfig {
            treatment_mps: 2.0,
            transit_mps: 1.0,
        };
        let engine = MetricsEngine::new(StationaryPolicy::Exact, speeds);
        let metrics = engine.reference_metrics(&map).unwrap();

        let by = |c: PathCategory| *metrics.iter().find(|m| m.category == c).unwrap();
        // Rows: (1,0) (2,0) (2,4) -> 1 + 4
        assert_eq!(by(PathCategory::Row).distance_m, 5.0);
        assert_eq!(by(PathCategory::Row).ideal_time_s, 2.5);
        // Single turn point has no length.
        assert_eq!(by(PathCategory::Turn).distance_m, 0.0);
        // Start path includes the first row point.
        assert_eq!(by(PathCategory::StartPath).distance_m, 1.0);
        assert_eq!(by(PathCategory::StartPath).ideal_time_s, 1.0);
        assert_eq!(by(PathCategory::EndPath).distance_m, 0.0);
    }

    #[test]
    fn test_zero_speed_fails_reference_metrics() {
        let points = vec![ReferencePoint::new(0.0, 0.0, true)];
        let map = ReferenceMap::new(GeoPoint::new(0.0, 0.0), points, Vec::new()).unwrap();
        let engine = MetricsEngine::new(
            StationaryPolicy::Exact,
            SpeedConfig {
                treatment_mps: 0.0,
                transit_mps: 1.0,
            },
        );
        assert!(matches!(
            engine.reference_metrics(&map),
            Err(EngineError::DegenerateComputation(_))
        ));
    }
}
