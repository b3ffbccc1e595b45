//! Engine configuration.
//!
//! Bundles the constants the engine runs with: earth radius for the local
//! projection, the nominal rates used to synthesize timestamps for channels
//! that carry none, the stationary-sample policy, and the speeds used for
//! ideal traversal times. Every table and field is optional in TOML and
//! falls back to the defaults below.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub projection: ProjectionConfig,
    pub channels: ChannelRates,
    pub stationary: StationaryPolicy,
    pub speeds: SpeedConfig,
}

/// Local planar projection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Mean earth radius (km).
    pub earth_radius_km: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            earth_radius_km: 6371.0,
        }
    }
}

/// Nominal message rates (Hz) of channels without hardware timestamps.
///
/// The i-th message of a channel is stamped `i / rate`. These are documented
/// nominal rates, not measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelRates {
    pub manual_control_hz: f64,
    pub payload_state_hz: f64,
    pub actuator_feedback_hz: f64,
}

impl Default for ChannelRates {
    fn default() -> Self {
        Self {
            manual_control_hz: 12.3,
            payload_state_hz: 12.3,
            actuator_feedback_hz: 10.6,
        }
    }
}

/// How "no movement" between consecutive samples is decided.
///
/// Used both by the stationary filter after alignment and by stop detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StationaryPolicy {
    /// Bit-exact coordinate equality. Reproduces recorded reports.
    Exact,
    /// Planar distance at or below `epsilon_m` meters.
    Epsilon {
        #[serde(default = "default_epsilon_m")]
        epsilon_m: f64,
    },
}

fn default_epsilon_m() -> f64 {
    0.01
}

impl Default for StationaryPolicy {
    fn default() -> Self {
        StationaryPolicy::Epsilon {
            epsilon_m: default_epsilon_m(),
        }
    }
}

impl StationaryPolicy {
    /// True when `b` counts as not having moved from `a`.
    pub fn is_stationary(&self, a: [f64; 2], b: [f64; 2]) -> bool {
        match *self {
            StationaryPolicy::Exact => a[0] == b[0] && a[1] == b[1],
            StationaryPolicy::Epsilon { epsilon_m } => {
                let dx = b[0] - a[0];
                let dy = b[1] - a[1];
                (dx * dx + dy * dy).sqrt() <= epsilon_m
            }
        }
    }
}

/// Assumed traversal speeds (m/s) for ideal-time estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    /// Speed along rows.
    pub treatment_mps: f64,
    /// Speed along turns and the start and end paths.
    pub transit_mps: f64,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            treatment_mps: 0.8,
            transit_mps: 0.8,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("projection.earth_radius_km", self.projection.earth_radius_km),
            ("channels.manual_control_hz", self.channels.manual_control_hz),
            ("channels.payload_state_hz", self.channels.payload_state_hz),
            ("channels.actuator_feedback_hz", self.channels.actuator_feedback_hz),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }

        // Zero speeds are allowed here and surface as degenerate ideal times.
        for (name, value) in [
            ("speeds.treatment_mps", self.speeds.treatment_mps),
            ("speeds.transit_mps", self.speeds.transit_mps),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} must be zero or positive, got {value}"
                )));
            }
        }

        if let StationaryPolicy::Epsilon { epsilon_m } = self.stationary {
            if !(epsilon_m.is_finite() && epsilon_m >= 0.0) {
                return Err(EngineError::InvalidConfig(format!(
                    "stationary.epsilon_m must be zero or positive, got {epsilon_m}"
                )));
            }
        }

        Ok(())
    }
}
