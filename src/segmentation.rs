//! Operational segmentation of a classified trajectory.
//!
//! Splits the trajectory into start path, rows, turns and end path using the
//! treatment-area flag attached by the spatial index.
//!
//! Design: forward scan state machine
//! - Two states, outside and inside the treatment area
//! - Outside -> inside closes the start path (first time) or the open turn,
//!   and opens a row
//! - Inside -> outside closes the row and opens a turn
//! - At the end an open row is closed; a trailing outside run is the end
//!   path, found by scanning backward from the last record
//!
//! The two ends are not symmetric. A trajectory that never enters the
//! treatment area is all start path and has no end path, because the
//! forward scan claims it first. A trajectory that starts inside has no
//! start path.
//!
//! Every record lands in exactly one segment, so segment lengths sum to the
//! trajectory length.

use tracing::debug;

use crate::types::{ActuatorError, ClassifiedRecord, Segment, SegmentKind};

/// Scan state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    OutsideTreatment,
    InsideTreatment,
}

/// Emits segment boundaries for a classified trajectory.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentClassifier;

impl SegmentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Segment a classified trajectory and attach per-segment actuator
    /// tracking error.
    ///
    /// Segments are returned in index order. An empty trajectory has none.
    pub fn classify(&self, records: &[ClassifiedRecord]) -> Vec<Segment> {
        let flags: Vec<bool> = records.iter().map(ClassifiedRecord::treatment_area).collect();
        let segments: Vec<Segment> = segment_flags(&flags)
            .into_iter()
            .map(|mut segment| {
                segment.actuator_error =
                    actuator_error(&records[segment.start_index..=segment.end_index]);
                segment
            })
            .collect();

        debug!(
            records = records.len(),
            rows = segments.iter().filter(|s| matches!(s.kind, SegmentKind::Row(_))).count(),
            turns = segments.iter().filter(|s| matches!(s.kind, SegmentKind::Turn(_))).count(),
            "segmented trajectory"
        );
        segments
    }
}

/// Segment boundaries for a sequence of treatment-area flags.
pub fn segment_flags(flags: &[bool]) -> Vec<Segment> {
    let n = flags.len();
    let mut segments = Vec::new();
    if n == 0 {
        return segments;
    }

    let mut state = ScanState::OutsideTreatment;
    let mut run_start = 0;
    let mut seen_row = false;
    let mut rows = 0;
    let mut turns = 0;

    for (i, &inside) in flags.iter().enumerate() {
        match (state, inside) {
            (ScanState::OutsideTreatment, true) => {
                if i > 0 {
                    if seen_row {
                        turns += 1;
                        segments.push(Segment::new(SegmentKind::Turn(turns), run_start, i - 1));
                    } else {
                        segments.push(Segment::new(SegmentKind::StartPath, 0, i - 1));
                    }
                }
                seen_row = true;
                run_start = i;
                state = ScanState::InsideTreatment;
            }
            (ScanState::InsideTreatment, false) => {
                rows += 1;
                segments.push(Segment::new(SegmentKind::Row(rows), run_start, i - 1));
                run_start = i;
                state = ScanState::OutsideTreatment;
            }
            _ => {}
        }
    }

    match state {
        ScanState::InsideTreatment => {
            rows += 1;
            segments.push(Segment::new(SegmentKind::Row(rows), run_start, n - 1));
        }
        ScanState::OutsideTreatment if !seen_row => {
            segments.push(Segment::new(SegmentKind::StartPath, 0, n - 1));
        }
        ScanState::OutsideTreatment => {
            // The open turn never closed: it is the end path.
            let start = end_path_start(flags);
            segments.push(Segment::new(SegmentKind::EndPath, start, n - 1));
        }
    }

    segments
}

/// First index of the trailing outside run, scanning backward from the end.
fn end_path_start(flags: &[bool]) -> usize {
    flags.iter().rposition(|&inside| inside).map_or(0, |last| last + 1)
}

/// Mean absolute difference between reported and intended actuator
/// positions over `records`.
///
/// Records without actuator feedback or without a setpoint are skipped;
/// `None` when nothing contributes.
pub fn actuator_error(records: &[ClassifiedRecord]) -> Option<ActuatorError> {
    let mut sum = [0.0_f64; 3];
    let mut samples = 0_usize;
    for diff in records.iter().filter_map(ClassifiedRecord::tracking_error) {
        sum[0] += diff.boom;
        sum[1] += diff.left_wing;
        sum[2] += diff.right_wing;
        samples += 1;
    }
    if samples == 0 {
        return None;
    }
    let n = samples as f64;
    Some(ActuatorError {
        boom: sum[0] / n,
        left_wing: sum[1] / n,
        right_wing: sum[2] / n,
        samples,
    })
}
