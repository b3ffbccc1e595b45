//! End-to-end fusion pipeline for one recorded run.
//!
//! This module wires the stages together and collects their outputs into a
//! [`RunReport`].
//!
//! # Architecture
//!
//! 1. **Projection**: position fixes to local meters around the map datum
//! 2. **Alignment**: every other channel joined onto the position stream by
//!    nearest timestamp, stationary records dropped
//! 3. **Classification**: actuator records labeled from the nearest
//!    reference geometry
//! 4. **Segmentation**: start path, rows, turns and end path
//! 5. **Metrics**: runtime, stops, mode dwell, assists, payload and
//!    reference-map figures
//!
//! All run-wide state lives in an [`EngineContext`] built once from the map
//! and configuration. The pipeline borrows it and keeps nothing between
//! runs, so one context can serve any number of recordings.
//!
//! Empty channels and zero denominators do not abort a run. They produce
//! empty results plus a [`Diagnostic`] in the report.

use tracing::{debug, info, warn};

use crate::alignment::TemporalAligner;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::export::{Diagnostic, FusedTables, ModeSummary, RunReport, RunSummary};
use crate::metrics::{
    assist_gaps, find_assists, path_length, runtime, CategoryMetrics, MetricsEngine, ModeDwell,
    PayloadSummary,
};
use crate::projection::CoordinateProjector;
use crate::recording::Recording;
use crate::reference_map::{PathCategory, ReferenceMap};
use crate::segmentation::SegmentClassifier;
use crate::spatial_index::SpatialIndex;
use crate::types::{Channel, FusedRecord, Position, SensorSample};

/// Everything a run needs that does not come from the recording.
///
/// Built once per map and configuration; the projector and spatial index are
/// derived here and shared read-only by every run.
#[derive(Clone)]
pub struct EngineContext {
    config: EngineConfig,
    map: ReferenceMap,
    projector: CoordinateProjector,
    index: SpatialIndex,
}

impl EngineContext {
    /// Validate the configuration and derive the projector and index.
    pub fn new(config: EngineConfig, map: ReferenceMap) -> Result<Self> {
        config.validate()?;
        let projector = CoordinateProjector::new(map.datum(), config.projection.earth_radius_km);
        let index = SpatialIndex::new(&map);
        info!(
            datum_lat = map.datum().latitude,
            datum_lon = map.datum().longitude,
            waypoints = map.points().len(),
            "engine context ready"
        );
        Ok(Self {
            config,
            map,
            projector,
            index,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn map(&self) -> &ReferenceMap {
        &self.map
    }

    pub fn projector(&self) -> &CoordinateProjector {
        &self.projector
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }
}

/// Runs recordings through every stage against a shared context.
pub struct FusionPipeline<'a> {
    context: &'a EngineContext,
    aligner: TemporalAligner,
    segmenter: SegmentClassifier,
    metrics: MetricsEngine,
}

impl<'a> FusionPipeline<'a> {
    pub fn new(context: &'a EngineContext) -> Self {
        let config = context.config();
        Self {
            context,
            aligner: TemporalAligner::new(config.stationary),
            segmenter: SegmentClassifier::new(),
            metrics: MetricsEngine::new(config.stationary, config.speeds.clone()),
        }
    }

    pub fn context(&self) -> &EngineContext {
        self.context
    }

    /// Process one recording end to end.
    ///
    /// Fails only on malformed input, such as an unrecognized payload-state
    /// code. Missing data is reported through diagnostics instead.
    pub fn run(&self, recording: &Recording) -> Result<RunReport> {
        let mut diagnostics = Vec::new();

        // Stages 1-3
        let tables = self.fuse(recording, &mut diagnostics)?;

        // Stage 4
        let segments = self.segmenter.classify(&tables.actuator);

        // Stage 5
        let summary = self.summarize(&tables, &mut diagnostics)?;

        info!(
            positions = tables.positions.len(),
            segments = segments.len(),
            stops = summary.stops.len(),
            assists = summary.assists.len(),
            diagnostics = diagnostics.len(),
            "run processed"
        );

        Ok(RunReport {
            tables,
            segments,
            summary,
            diagnostics,
        })
    }

    /// Project, align and classify every channel.
    pub fn fuse(
        &self,
        recording: &Recording,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<FusedTables> {
        let rates = &self.context.config().channels;

        let positions = recording.positions(self.context.projector());
        if positions.is_empty() {
            warn!("no position fixes; every fused table will be empty");
            diagnostics.push(Diagnostic::EmptyChannel {
                channel: Channel::Position,
            });
        }

        let mode = self.align_channel(
            &positions,
            &recording.manual_control_samples(rates),
            Channel::ManualControl,
            diagnostics,
        );
        let payload = self.align_channel(
            &positions,
            &recording.payload_state_samples(rates)?,
            Channel::PayloadState,
            diagnostics,
        );
        let actuator = self.align_channel(
            &positions,
            &recording.actuator_feedback_samples(rates),
            Channel::ActuatorFeedback,
            diagnostics,
        );
        let actuator = self.context.index().classify_all(&actuator)?;

        debug!(
            mode = mode.len(),
            payload = payload.len(),
            actuator = actuator.len(),
            "fused channels"
        );

        Ok(FusedTables {
            positions,
            mode,
            payload,
            actuator,
        })
    }

    fn align_channel(
        &self,
        positions: &[Position],
        samples: &[SensorSample],
        channel: Channel,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<FusedRecord> {
        if samples.is_empty() {
            warn!(%channel, "channel has no messages");
            diagnostics.push(Diagnostic::EmptyChannel { channel });
        }
        self.aligner.align(positions, samples)
    }

    /// Compute every run metric from the fused tables.
    pub fn summarize(
        &self,
        tables: &FusedTables,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<RunSummary> {
        let runtime_s = if tables.positions.is_empty() {
            None
        } else {
            Some(runtime(&tables.positions)?)
        };

        let mode = if tables.mode.is_empty() {
            None
        } else {
            Some(self.mode_summary(&tables.mode, diagnostics)?)
        };

        let assists = find_assists(&tables.mode);
        let assist_gaps_s = assist_gaps(&assists, &tables.mode);

        let payload =
            (!tables.payload.is_empty()).then(|| PayloadSummary::from_records(&tables.payload));

        Ok(RunSummary {
            runtime_s,
            total_distance_m: path_length(&tables.positions),
            stops: self.metrics.stops(&tables.positions),
            mode,
            assists,
            assist_gaps_s,
            payload,
            reference: self.reference_metrics(diagnostics)?,
        })
    }

    fn mode_summary(
        &self,
        records: &[FusedRecord],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<ModeSummary> {
        let dwell = ModeDwell::from_records(records);
        let percentages = match dwell.percentages() {
            Ok(p) => Some(p),
            Err(EngineError::DegenerateComputation(reason)) => {
                warn!(reason, "mode percentages undefined");
                diagnostics.push(Diagnostic::DegenerateMetric {
                    metric: "mode_percentages".to_string(),
                    reason: reason.to_string(),
                });
                None
            }
            Err(e) => return Err(e),
        };
        Ok(ModeSummary { dwell, percentages })
    }

    /// Reference-map metrics per category. A category whose ideal time is
    /// undefined is left out and reported.
    fn reference_metrics(&self, diagnostics: &mut Vec<Diagnostic>) -> Result<Vec<CategoryMetrics>> {
        let mut metrics = Vec::with_capacity(PathCategory::ALL.len());
        for category in PathCategory::ALL {
            match self.metrics.category_metrics(self.context.map(), category) {
                Ok(m) => metrics.push(m),
                Err(EngineError::DegenerateComputation(reason)) => {
                    warn!(%category, reason, "ideal time undefined");
                    diagnostics.push(Diagnostic::DegenerateMetric {
                        metric: format!("{category}_ideal_time"),
                        reason: reason.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpeedConfig;
    use crate::recording::GpsFix;
    use crate::types::{ActuatorPositions, GeoPoint, ReferencePoint};

    fn context(config: EngineConfig) -> EngineContext {
        let points = vec![
            ReferencePoint::new(0.0, 0.0, false),
            ReferencePoint::new(10.0, 0.0, true),
            ReferencePoint::new(20.0, 0.0, false),
        ];
        let map = ReferenceMap::new(GeoPoint::new(0.0, 0.0), points, Vec::new()).unwrap();
        EngineContext::new(config, map).unwrap()
    }

    fn fix(stamp: f64, x_m: f64) -> GpsFix {
        let projector = CoordinateProjector::new(GeoPoint::new(0.0, 0.0), 6371.0);
        let point = projector.unproject(crate::types::PlanarPoint::new(x_m, 0.0));
        GpsFix { stamp, point }
    }

    #[test]
    fn test_context_rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.channels.payload_state_hz = 0.0;
        let map = ReferenceMap::new(
            GeoPoint::new(0.0, 0.0),
            vec![ReferencePoint::new(0.0, 0.0, true)],
            Vec::new(),
        )
        .unwrap();
        assert!(matches!(
            EngineContext::new(config, map),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_empty_recording_reports_every_channel() {
        let ctx = context(EngineConfig::default());
        let report = FusionPipeline::new(&ctx).run(&Recording::default()).unwrap();

        assert!(report.tables.positions.is_empty());
        assert!(report.segments.is_empty());
        assert_eq!(report.summary.runtime_s, None);
        assert_eq!(report.summary.mode, None);
        assert_eq!(report.summary.payload, None);
        let empty: Vec<Channel> = report
            .diagnostics
            .iter()
            .filter_map(|d| match d {
                Diagnostic::EmptyChannel { channel } => Some(*channel),
                _ => None,
            })
            .collect();
        assert_eq!(
            empty,
            vec![
                Channel::Position,
                Channel::ManualControl,
                Channel::PayloadState,
                Channel::ActuatorFeedback,
            ]
        );
        // Reference metrics come from the map alone.
        assert_eq!(report.summary.reference.len(), 4);
    }

    #[test]
    fn test_bad_payload_code_fails_the_run() {
        let ctx = context(EngineConfig::default());
        let recording = Recording {
            position: vec![fix(0.0, 0.0)],
            payload_state: vec!["1x1".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            FusionPipeline::new(&ctx).run(&recording),
            Err(EngineError::InvalidRecording(_))
        ));
    }

    #[test]
    fn test_zero_speed_is_a_diagnostic() {
        let config = EngineConfig {
            speeds: SpeedConfig {
                treatment_mps: 0.0,
                transit_mps: 1.0,
            },
            ..Default::default()
        };
        let ctx = context(config);
        let report = FusionPipeline::new(&ctx).run(&Recording::default()).unwrap();

        let categories: Vec<PathCategory> =
            report.summary.reference.iter().map(|m| m.category).collect();
        assert_eq!(
            categories,
            vec![PathCategory::Turn, PathCategory::StartPath, PathCategory::EndPath]
        );
        assert!(report.diagnostics.iter().any(|d| matches!(
            d,
            Diagnostic::DegenerateMetric { metric, .. } if metric == "rows_ideal_time"
        )));
    }

    #[test]
    fn test_motionless_mode_stream_has_no_percentages() {
        let ctx = context(EngineConfig::default());
        let recording = Recording {
            position: vec![fix(0.0, 0.0)],
            manual_control: vec![true, true, false],
            ..Default::default()
        };
        let report = FusionPipeline::new(&ctx).run(&recording).unwrap();

        let mode = report.summary.mode.unwrap();
        assert_eq!(mode.dwell.total_time_s(), 0.0);
        assert_eq!(mode.percentages, None);
        assert!(report.diagnostics.iter().any(|d| matches!(
            d,
            Diagnostic::DegenerateMetric { metric, .. } if metric == "mode_percentages"
        )));
    }

    #[test]
    fn test_actuator_stream_drives_segmentation() {
        let ctx = context(EngineConfig::default());
        let recording = Recording {
            position: vec![fix(100.0, 0.0), fix(101.0, 10.0), fix(102.0, 20.0)],
            actuator_feedback: vec![ActuatorPositions::new(0.0, 0.0, 0.0); 22],
            ..Default::default()
        };
        let report = FusionPipeline::new(&ctx).run(&recording).unwrap();

        assert_eq!(report.tables.positions[0].timestamp, 0.0);
        assert_eq!(report.tables.actuator.len(), 3);
        let kinds: Vec<String> = report.segments.iter().map(|s| s.kind.to_string()).collect();
        assert_eq!(kinds, vec!["start path", "row 1", "end path"]);
        let runtime = report.summary.runtime_s.unwrap();
        assert!((runtime - 2.0).abs() < 1e-9);
        assert!((report.summary.total_distance_m - 20.0).abs() < 1e-6);
    }
}
