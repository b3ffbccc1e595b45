//! Run report handed to the external report and plot renderers.
//!
//! The report is self-contained: the fused tables, the segment list with
//! actuator error, the scalar metrics and every diagnostic raised on the
//! way. It serializes to JSON; rendering it into text, PDF or plots is the
//! consumer's concern.

use serde::Serialize;

use crate::error::Result;
use crate::metrics::{Assist, CategoryMetrics, ModeDwell, ModePercentages, PayloadSummary, Stop};
use crate::types::{Channel, ClassifiedRecord, FusedRecord, Position, Segment};

/// Something the caller should know about that did not abort the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A channel had no messages; everything derived from it is empty.
    EmptyChannel { channel: Channel },
    /// A metric could not be computed because its denominator was zero.
    DegenerateMetric { metric: String, reason: String },
}

/// Mode dwell with its percentage split, when one exists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModeSummary {
    #[serde(flatten)]
    pub dwell: ModeDwell,
    /// `None` when no time elapsed in the mode stream.
    pub percentages: Option<ModePercentages>,
}

/// Scalar and aggregate metrics of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    /// `None` when there are no position fixes.
    pub runtime_s: Option<f64>,
    pub total_distance_m: f64,
    pub stops: Vec<Stop>,
    pub mode: Option<ModeSummary>,
    pub assists: Vec<Assist>,
    pub assist_gaps_s: Vec<f64>,
    pub payload: Option<PayloadSummary>,
    pub reference: Vec<CategoryMetrics>,
}

/// Time-aligned tables, one per channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FusedTables {
    pub positions: Vec<Position>,
    pub mode: Vec<FusedRecord>,
    pub payload: Vec<FusedRecord>,
    /// Actuator feedback, classified against the reference map.
    pub actuator: Vec<ClassifiedRecord>,
}

/// Everything the engine derives from one recorded run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub tables: FusedTables,
    pub segments: Vec<Segment>,
    pub summary: RunSummary,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunReport {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SegmentKind;

    #[test]
    fn test_report_serializes() {
        let report = RunReport {
            segments: vec![Segment::new(SegmentKind::Row(1), 0, 4)],
            diagnostics: vec![Diagnostic::EmptyChannel {
                channel: Channel::PayloadState,
            }],
            ..Default::default()
        };
        let json = report.to_json_pretty().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["segments"][0]["kind"]["type"], "row");
        assert_eq!(value["segments"][0]["kind"]["number"], 1);
        assert_eq!(value["segments"][0]["end_index"], 4);
        assert_eq!(value["diagnostics"][0]["type"], "empty_channel");
        assert_eq!(value["diagnostics"][0]["channel"], "payload_state");
        assert!(value["summary"]["runtime_s"].is_null());
        assert!(report.has_diagnostics());
    }

    #[test]
    fn test_mode_summary_flattens_dwell() {
        let summary = ModeSummary {
            dwell: ModeDwell {
                manual_time_s: 1.0,
                auto_time_s: 3.0,
                manual_distance_m: 0.5,
                auto_distance_m: 2.0,
            },
            percentages: None,
        };
        let value = serde_json::to_value(summary).unwrap();
        assert_eq!(value["auto_time_s"], 3.0);
        assert!(value["percentages"].is_null());
    }
}
