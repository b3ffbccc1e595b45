//! Error taxonomy for the fusion and segmentation engine.
//!
//! Validation and degenerate-computation failures abort the enclosing
//! computation. Empty channels are checked at stage boundaries and turned
//! into empty results plus a diagnostic; `EmptyInput` is only returned by
//! operations that cannot produce an empty answer (a runtime of nothing).

use std::io;

use crate::types::Channel;

/// Errors raised by the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid reference map: {0}")]
    InvalidMap(String),

    #[error("reference map has no treatment-area point; start and end paths are undefined")]
    UnmatchedCategory,

    #[error("{0} channel is empty")]
    EmptyInput(Channel),

    #[error("degenerate computation: {0}")]
    DegenerateComputation(&'static str),

    #[error("invalid recording: {0}")]
    InvalidRecording(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = core::result::Result<T, EngineError>;
