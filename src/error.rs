//! Error types for configuration and payload decoding.
//!
//! Transport and subscription failures are not errors in this sense: they
//! surface only as [`ConnectionState`](crate::ConnectionState) values.

use std::time::Duration;

use thiserror::Error;

/// Invalid or missing static configuration.
///
/// Fatal at construction time: a pipeline is never started with one of these.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The window must hold at least one reading.
    #[error("window size must be at least 1, got {0}")]
    InvalidWindow(usize),

    /// A required setting is absent or blank.
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    /// The broker URI could not be parsed.
    #[error("invalid broker URI {uri:?}: {reason}")]
    InvalidBrokerUri { uri: String, reason: String },

    /// The broker URI uses a scheme with no matching transport.
    #[error("unsupported broker scheme {0:?} (expected ws, wss, mqtt, mqtts, tcp or ssl)")]
    UnsupportedScheme(String),

    /// A duration setting is below its floor.
    #[error("{key} must be at least {min:?}, got {actual:?}")]
    TooShort {
        key: &'static str,
        min: Duration,
        actual: Duration,
    },

    /// A duration setting is above its ceiling.
    #[error("{key} must be at most {max:?}, got {actual:?}")]
    TooLong {
        key: &'static str,
        max: Duration,
        actual: Duration,
    },

    /// A duration setting carries a fraction of a second it cannot honor.
    #[error("{key} must be a whole number of seconds, got {actual:?}")]
    NotWholeSeconds { key: &'static str, actual: Duration },

    /// A duration setting could not be parsed.
    #[error("invalid duration for {key}: {value:?}")]
    InvalidDuration { key: &'static str, value: String },

    /// Reading or merging configuration sources failed.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// A payload that could not be parsed into a key-value mapping.
///
/// Never propagated past the decoder's caller; the message is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Not valid JSON.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// Valid JSON, but not an object.
    #[error("payload is not a JSON object (got {0})")]
    NotAnObject(&'static str),
}
