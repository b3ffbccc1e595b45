//! Field Robot Trajectory Fusion Engine
//!
//! Fuses the decoded channels of one recorded field-robot run into
//! time-aligned tables, labels the trajectory against a reference path map,
//! splits it into operational segments and computes run metrics.
//!
//! # Data Flow
//!
//! - **Recording**: per-channel message lists; position fixes carry
//!   hardware stamps, the other channels are stamped at nominal rates
//! - **Projection**: fixes to local meters around the map datum
//! - **Alignment**: nearest-timestamp join onto the position stream
//! - **Spatial index**: treatment-area flag and actuator setpoint from the
//!   nearest reference geometry
//! - **Segmentation**: start path, rows, turns, end path
//! - **Metrics**: runtime, stops, mode dwell, assists, payload and
//!   reference-map figures
//!
//! The log reader and the report renderers are outside this crate.
//!
//! # Example
//!
//! ```ignore
//! use fieldtrace::{EngineConfig, EngineContext, FusionPipeline, Recording, ReferenceMap};
//!
//! let map = ReferenceMap::load("map.json")?;
//! let context = EngineContext::new(EngineConfig::default(), map)?;
//! let report = FusionPipeline::new(&context).run(&Recording::load("run.json")?)?;
//! println!("{}", report.to_json_pretty()?);
//! ```

pub mod alignment;
pub mod config;
pub mod error;
pub mod export;
pub mod metrics;
pub mod pipeline;
pub mod projection;
pub mod recording;
pub mod reference_map;
pub mod segmentation;
pub mod spatial_index;
pub mod types;


// Re-export commonly used types
pub use config::{EngineConfig, StationaryPolicy};
pub use error::{EngineError, Result};
pub use export::{Diagnostic, RunReport};
pub use pipeline::{EngineContext, FusionPipeline};
pub use recording::Recording;
pub use reference_map::{PathCategory, ReferenceMap};
pub use types::{
    ClassifiedRecord, FusedRecord, GeoPoint, PlanarPoint, Position, Segment, SegmentKind,
};
