//! Recorded run: the decoded per-channel messages of one log.
//!
//! The log reader itself lives outside this crate. What reaches the engine is
//! a plain document with one ordered message list per channel. Position
//! fixes carry hardware stamps; the other channels carry none and are
//! stamped here at their nominal rate (`i / rate` for the i-th message).

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::config::ChannelRates;
use crate::error::{EngineError, Result};
use crate::projection::CoordinateProjector;
use crate::types::{
    ActuatorPositions, Channel, ChannelPayload, GeoPoint, PayloadState, Position, SensorSample,
};

/// One position fix as recorded.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GpsFix {
    /// Hardware stamp in seconds (any epoch).
    pub stamp: f64,
    #[serde(flatten)]
    pub point: GeoPoint,
}

/// All messages of one recorded run, in arrival order per channel.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Recording {
    pub position: Vec<GpsFix>,
    pub manual_control: Vec<bool>,
    /// Per-lamp status codes such as `"111"`.
    pub payload_state: Vec<String>,
    pub actuator_feedback: Vec<ActuatorPositions>,
}

impl Recording {
    pub fn from_json_str(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    /// Project the position fixes, with timestamps relative to the first fix.
    pub fn positions(&self, projector: &CoordinateProjector) -> Vec<Position> {
        let Some(first) = self.position.first() else {
            return Vec::new();
        };
        let start = first.stamp;
        let positions: Vec<Position> = self
            .position
            .iter()
            .map(|fix| {
                let p = projector.project(fix.point);
                Position::new(fix.stamp - start, p.x, p.y)
            })
            .collect();
        debug!(count = positions.len(), "projected position fixes");
        positions
    }

    /// Manual-control samples with synthesized timestamps.
    pub fn manual_control_samples(&self, rates: &ChannelRates) -> Vec<SensorSample> {
        synthesize(
            self.manual_control.iter().map(|&m| ChannelPayload::ManualControl(m)),
            rates.manual_control_hz,
        )
    }

    /// Payload-state samples with synthesized timestamps.
    ///
    /// Fails on the first code that is not made of `0`/`1` characters.
    pub fn payload_state_samples(&self, rates: &ChannelRates) -> Result<Vec<SensorSample>> {
        let states = self
            .payload_state
            .iter()
            .enumerate()
            .map(|(i, code)| {
                PayloadState::from_code(code).map(ChannelPayload::PayloadState).ok_or_else(|| {
                    EngineError::InvalidRecording(format!(
                        "payload-state message {i} has unrecognized code {code:?}"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(synthesize(states, rates.payload_state_hz))
    }

    /// Actuator-feedback samples with synthesized timestamps.
    pub fn actuator_feedback_samples(&self, rates: &ChannelRates) -> Vec<SensorSample> {
        synthesize(
            self.actuator_feedback.iter().map(|&a| ChannelPayload::ActuatorFeedback(a)),
            rates.actuator_feedback_hz,
        )
    }

    /// Number of messages recorded on a channel.
    pub fn message_count(&self, channel: Channel) -> usize {
        match channel {
            Channel::Position => self.position.len(),
            Channel::ManualControl => self.manual_control.len(),
            Channel::PayloadState => self.payload_state.len(),
            Channel::ActuatorFeedback => self.actuator_feedback.len(),
        }
    }
}

/// Stamp the i-th payload at `i / rate_hz` seconds.
pub fn synthesize<I>(payloads: I, rate_hz: f64) -> Vec<SensorSample>
where
    I: IntoIterator<Item = ChannelPayload>,
{
    payloads
        .into_iter()
        .enumerate()
        .map(|(i, payload)| SensorSample::new(i as f64 / rate_hz, payload))
        .collect()
}
