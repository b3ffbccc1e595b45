//! Temporal alignment of asynchronous channels against the position stream.
//!
//! Design: nearest-timestamp join followed by a stationary filter.
//! - Every channel sample is paired with the position fix whose timestamp is
//!   closest in absolute value, looking both backward and forward
//! - Equidistant candidates resolve to the earlier fix
//! - Both inputs are already time-ordered, so a single forward cursor over
//!   the positions suffices: O(n + m)
//! - Records that did not move relative to the last kept record are dropped
//!
//! The filter is meant to drop repeated fixes while the robot idles. Under
//! `StationaryPolicy::Exact` any coordinate jitter defeats it.

use tracing::{debug, warn};

use crate::config::StationaryPolicy;
use crate::types::{FusedRecord, Planar, Position, SensorSample};

/// Joins channel samples to the nearest position fix.
#[derive(Debug, Clone, Copy)]
pub struct TemporalAligner {
    policy: StationaryPolicy,
}

impl TemporalAligner {
    pub fn new(policy: StationaryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> StationaryPolicy {
        self.policy
    }

    /// Join `other` onto `base` and drop stationary records.
    ///
    /// An empty input on either side yields an empty table.
    pub fn align(&self, base: &[Position], other: &[SensorSample]) -> Vec<FusedRecord> {
        if base.is_empty() || other.is_empty() {
            warn!(
                positions = base.len(),
                samples = other.len(),
                "nothing to align, returning empty table"
            );
            return Vec::new();
        }

        let joined = nearest_join(base, other);
        let joined_len = joined.len();
        let kept = drop_stationary(joined, self.policy);
        debug!(
            channel = %other[0].channel(),
            joined = joined_len,
            kept = kept.len(),
            "aligned channel against positions"
        );
        kept
    }
}

/// Pair every sample with the position closest in time.
///
/// Output order and length follow `other`. Returns an empty table when
/// `base` is empty.
pub fn nearest_join(base: &[Position], other: &[SensorSample]) -> Vec<FusedRecord> {
    if base.is_empty() {
        return Vec::new();
    }

    let mut cursor = 0;
    other
        .iter()
        .map(|sample| {
            // Cursor lands on the last fix at or before the sample.
            while cursor + 1 < base.len() && base[cursor + 1].timestamp <= sample.timestamp {
                cursor += 1;
            }
            let backward = &base[cursor];
            let fix = match base.get(cursor + 1) {
                _ if backward.timestamp > sample.timestamp => backward,
                Some(forward)
                    if forward.timestamp - sample.timestamp
                        < sample.timestamp - backward.timestamp =>
                {
                    forward
                }
                _ => backward,
            };
            FusedRecord {
                timestamp: sample.timestamp,
                x: fix.x,
                y: fix.y,
                payload: sample.payload,
            }
        })
        .collect()
}

/// Drop every record that has not moved relative to the previously kept one.
///
/// The first record is always kept. Survivors keep their relative order and
/// are re-indexed contiguously by construction.
pub fn drop_stationary<P: Planar>(records: Vec<P>, policy: StationaryPolicy) -> Vec<P> {
    let mut kept: Vec<P> = Vec::with_capacity(records.len());
    for record in records {
        let stationary = kept
            .last()
            .is_some_and(|prev| policy.is_stationary(prev.xy(), record.xy()));
        if !stationary {
            kept.push(record);
        }
    }
    kept
}
