//! A single decoded sensor sample.

/// One numeric sample taken from the tracked payload field.
///
/// `timestamp_ms` is the wall-clock time (Unix milliseconds) at which the
/// message carrying the value was received, not a time embedded in the
/// payload.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reading {
    /// Receipt time in Unix milliseconds.
    pub timestamp_ms: u64,
    /// The sampled value.
    pub value: f64,
}

impl Reading {
    /// Create a reading.
    pub const fn new(timestamp_ms: u64, value: f64) -> Self {
        Self {
            timestamp_ms,
            value,
        }
    }
}
