//! Transport adapters that deliver raw payloads and connection state.
//!
//! A [`TelemetrySource`] owns one subscription to one topic. It exposes two
//! independent outputs:
//!
//! - raw message arrivals, drained in delivery order with
//!   [`TelemetrySource::poll_message`]
//! - the current [`ConnectionState`], read with [`TelemetrySource::state`]
//!
//! Reconnection and backoff live entirely behind this trait, so the
//! pipeline above it never sees connection churn except as a state value.

mod channel;
mod mqtt;

pub use channel::{ChannelFeed, ChannelSource};
pub use mqtt::{
    check_keep_alive, classify_error, BrokerEndpoint, MqttSource, MqttSourceBuilder,
    TransportKind, MAX_KEEP_ALIVE, MIN_KEEP_ALIVE, MIN_RECONNECT_PERIOD,
};

use std::fmt::Debug;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::ConnectionState;

/// A payload as it arrived on the subscribed topic.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    /// Topic the broker delivered the payload on.
    pub topic: String,
    /// Opaque payload bytes.
    pub payload: Bytes,
    /// Wall-clock receipt time in Unix milliseconds.
    pub received_at_ms: u64,
}

impl RawMessage {
    /// Create a message stamped with the current wall-clock time.
    pub fn now(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self::at(topic, payload, now_ms())
    }

    /// Create a message with an explicit receipt time.
    pub fn at(topic: impl Into<String>, payload: impl Into<Bytes>, received_at_ms: u64) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at_ms,
        }
    }
}

/// A single-topic subscription feeding the pipeline.
///
/// # Example
///
/// ```
/// use sensorwatch::{ChannelSource, ConnectionState, TelemetrySource};
///
/// let (feed, mut source) = ChannelSource::create("ek/sensor/3", "demo");
/// feed.set_state(ConnectionState::Connected);
/// feed.publish("ek/sensor/3", r#"{"3T0": 21.0}"#);
///
/// assert_eq!(source.state(), ConnectionState::Connected);
/// assert!(source.poll_message().is_some());
/// ```
pub trait TelemetrySource: Send + Debug {
    /// Take the next raw message on the subscribed topic, if one is waiting.
    ///
    /// Never blocks. Messages come out in the order the transport
    /// delivered them.
    fn poll_message(&mut self) -> Option<RawMessage>;

    /// The current connection state.
    fn state(&self) -> ConnectionState;

    /// A human-readable description of the source, for the status bar.
    fn description(&self) -> &str;

    /// Release the subscription and the underlying connection.
    ///
    /// Safe to call more than once, and while a connection attempt is
    /// still in flight. After this returns the source delivers nothing and
    /// reports [`ConnectionState::Disconnected`].
    fn close(&mut self);
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
