//! Core data types for the fusion and segmentation engine.
//!
//! This module defines the records that flow between pipeline stages. Every
//! stage takes its inputs by shared reference and returns freshly built
//! values, so nothing here is mutated after the stage that produced it
//! returns.
//!
//! Design principle: each channel carries its own payload variant. Stages
//! that need a specific channel ask for it through an accessor returning
//! `Option`, never by probing an open-ended record.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Anything with a location in the local planar frame (meters).
pub trait Planar {
    /// `[x, y]` in meters relative to the datum.
    fn xy(&self) -> [f64; 2];

    /// Euclidean distance to another planar item.
    fn distance_to<P: Planar + ?Sized>(&self, other: &P) -> f64 {
        let [ax, ay] = self.xy();
        let [bx, by] = other.xy();
        let dx = bx - ax;
        let dy = by - ay;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A geodetic coordinate in degrees.
///
/// Recorded maps spell the fields out (`longitude`/`latitude`); the short
/// forms are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(alias = "lon")]
    pub longitude: f64,
    #[serde(alias = "lat")]
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }
}

/// A point in the local planar frame, meters from the datum.
///
/// `x` grows with latitude (north), `y` with longitude (east).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanarPoint {
    pub x: f64,
    pub y: f64,
}

impl PlanarPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Planar for PlanarPoint {
    fn xy(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

/// A projected position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    /// Seconds since the first fix of the run.
    pub timestamp: f64,
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(timestamp: f64, x: f64, y: f64) -> Self {
        Self { timestamp, x, y }
    }
}

impl Planar for Position {
    fn xy(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

// ============================================================================
// CHANNELS AND PAYLOADS
// ============================================================================

/// The independently sampled input channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Position,
    ManualControl,
    PayloadState,
    ActuatorFeedback,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Position => "position",
            Channel::ManualControl => "manual-control",
            Channel::PayloadState => "payload-state",
            Channel::ActuatorFeedback => "actuator-feedback",
        };
        f.write_str(name)
    }
}

/// Activation state of the payload, decoded from its per-lamp status code.
///
/// The code has one character per lamp: `'1'` lit, `'0'` dark. Only the
/// fully lit and fully dark states count toward on/off accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadState {
    Off,
    On,
    /// Some lamps lit, some dark.
    Mixed,
}

impl PayloadState {
    /// Decode a status code such as `"111"` or `"000"`.
    ///
    /// Returns `None` for an empty code or any character other than `0`/`1`.
    pub fn from_code(code: &str) -> Option<Self> {
        if code.is_empty() || !code.chars().all(|c| c == '0' || c == '1') {
            return None;
        }
        if code.chars().all(|c| c == '1') {
            Some(PayloadState::On)
        } else if code.chars().all(|c| c == '0') {
            Some(PayloadState::Off)
        } else {
            Some(PayloadState::Mixed)
        }
    }
}

/// Boom and wing positions, either reported by the actuators or intended by
/// the reference map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActuatorPositions {
    #[serde(rename = "boom_position")]
    pub boom: f64,
    #[serde(rename = "left_wing_position")]
    pub left_wing: f64,
    #[serde(rename = "right_wing_position")]
    pub right_wing: f64,
}

impl ActuatorPositions {
    pub fn new(boom: f64, left_wing: f64, right_wing: f64) -> Self {
        Self {
            boom,
            left_wing,
            right_wing,
        }
    }

    /// Per-actuator absolute difference to another set of positions.
    pub fn abs_diff(&self, other: &ActuatorPositions) -> ActuatorPositions {
        ActuatorPositions {
            boom: (self.boom - other.boom).abs(),
            left_wing: (self.left_wing - other.left_wing).abs(),
            right_wing: (self.right_wing - other.right_wing).abs(),
        }
    }
}

/// Channel-specific payload of one sample.
///
/// Position fixes are the join base and travel as [`Position`], so only the
/// channels joined onto them have a payload variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "channel", content = "value", rename_all = "snake_case")]
pub enum ChannelPayload {
    ManualControl(bool),
    PayloadState(PayloadState),
    ActuatorFeedback(ActuatorPositions),
}

impl ChannelPayload {
    pub fn channel(&self) -> Channel {
        match self {
            ChannelPayload::ManualControl(_) => Channel::ManualControl,
            ChannelPayload::PayloadState(_) => Channel::PayloadState,
            ChannelPayload::ActuatorFeedback(_) => Channel::ActuatorFeedback,
        }
    }
}

/// One timestamped sample of a single channel.
///
/// Sequences of samples are kept in ascending timestamp order; the engine
/// assumes this and never re-sorts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorSample {
    /// Seconds since the start of the run.
    pub timestamp: f64,
    pub payload: ChannelPayload,
}

impl SensorSample {
    pub fn new(timestamp: f64, payload: ChannelPayload) -> Self {
        Self { timestamp, payload }
    }

    pub fn channel(&self) -> Channel {
        self.payload.channel()
    }
}

// ============================================================================
// REFERENCE GEOMETRY
// ============================================================================

/// One waypoint of the intended path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferencePoint {
    pub x: f64,
    pub y: f64,
    pub treatment_area: bool,
}

impl ReferencePoint {
    pub fn new(x: f64, y: f64, treatment_area: bool) -> Self {
        Self {
            x,
            y,
            treatment_area,
        }
    }
}

impl Planar for ReferencePoint {
    fn xy(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

/// Intended actuator setpoints at a location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActuatorReference {
    pub x: f64,
    pub y: f64,
    pub setpoint: ActuatorPositions,
}

impl Planar for ActuatorReference {
    fn xy(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

/// Attributes copied from the nearest reference geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferenceAttributes {
    pub treatment_area: bool,
    /// `None` when the map carries no actuator reference points.
    pub setpoint: Option<ActuatorPositions>,
}

// ============================================================================
// FUSED TRAJECTORY
// ============================================================================

/// One sample of a channel joined to the nearest-in-time position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FusedRecord {
    /// Timestamp of the channel sample, not of the matched fix.
    pub timestamp: f64,
    pub x: f64,
    pub y: f64,
    pub payload: ChannelPayload,
}

impl FusedRecord {
    pub fn manual_control(&self) -> Option<bool> {
        match self.payload {
            ChannelPayload::ManualControl(manual) => Some(manual),
            _ => None,
        }
    }

    pub fn payload_state(&self) -> Option<PayloadState> {
        match self.payload {
            ChannelPayload::PayloadState(state) => Some(state),
            _ => None,
        }
    }

    pub fn actuator_feedback(&self) -> Option<ActuatorPositions> {
        match self.payload {
            ChannelPayload::ActuatorFeedback(positions) => Some(positions),
            _ => None,
        }
    }
}

impl Planar for FusedRecord {
    fn xy(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

/// A fused record with the attributes of its nearest reference geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassifiedRecord {
    #[serde(flatten)]
    pub record: FusedRecord,
    #[serde(flatten)]
    pub reference: ReferenceAttributes,
}

impl ClassifiedRecord {
    pub fn treatment_area(&self) -> bool {
        self.reference.treatment_area
    }

    /// Absolute difference between reported and intended actuator positions.
    ///
    /// `None` unless the record carries actuator feedback and a setpoint was
    /// found for its location.
    pub fn tracking_error(&self) -> Option<ActuatorPositions> {
        let reported = self.record.actuator_feedback()?;
        let setpoint = self.reference.setpoint?;
        Some(reported.abs_diff(&setpoint))
    }
}

impl Planar for ClassifiedRecord {
    fn xy(&self) -> [f64; 2] {
        self.record.xy()
    }
}

// ============================================================================
// SEGMENTS
// ============================================================================

/// Operational category of a stretch of trajectory.
///
/// Rows and turns are numbered from 1 in the order they occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "number", rename_all = "snake_case")]
pub enum SegmentKind {
    StartPath,
    Row(u32),
    Turn(u32),
    EndPath,
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentKind::StartPath => f.write_str("start path"),
            SegmentKind::Row(n) => write!(f, "row {n}"),
            SegmentKind::Turn(n) => write!(f, "turn {n}"),
            SegmentKind::EndPath => f.write_str("end path"),
        }
    }
}

/// Mean absolute actuator tracking error over a segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActuatorError {
    pub boom: f64,
    pub left_wing: f64,
    pub right_wing: f64,
    /// Number of records that contributed.
    pub samples: usize,
}

/// A contiguous, inclusive index range of a classified trajectory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub start_index: usize,
    pub end_index: usize,
    pub actuator_error: Option<ActuatorError>,
}

impl Segment {
    pub fn new(kind: SegmentKind, start_index: usize, end_index: usize) -> Self {
        Self {
            kind,
            start_index,
            end_index,
            actuator_error: None,
        }
    }

    /// Number of records covered (the range is inclusive).
    pub fn len(&self) -> usize {
        self.end_index - self.start_index + 1
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.start_index..=self.end_index).contains(&index)
    }
}
