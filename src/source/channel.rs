//! Channel-based source.
//!
//! Receives payloads and connection state from in-process code rather than a
//! broker. Useful for embedding the pipeline behind another transport, and
//! for driving it deterministically in tests.

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tracing::trace;

use super::{now_ms, RawMessage, TelemetrySource};
use crate::ConnectionState;

/// The producing half of a [`ChannelSource`].
///
/// Plays the role the broker connection plays for
/// [`MqttSource`](super::MqttSource): it publishes payloads and drives the
/// connection state.
#[derive(Debug)]
pub struct ChannelFeed {
    messages: mpsc::UnboundedSender<RawMessage>,
    state: watch::Sender<ConnectionState>,
}

impl ChannelFeed {
    /// Publish a payload stamped with the current time.
    ///
    /// Returns false if the source has been closed or dropped.
    pub fn publish(&self, topic: &str, payload: impl Into<Bytes>) -> bool {
        self.publish_at(topic, payload, now_ms())
    }

    /// Publish a payload with an explicit receipt time.
    pub fn publish_at(&self, topic: &str, payload: impl Into<Bytes>, received_at_ms: u64) -> bool {
        self.messages
            .send(RawMessage::at(topic, payload, received_at_ms))
            .is_ok()
    }

    /// Set the connection state reported by the source.
    pub fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

/// A source that receives raw payloads through an in-memory channel.
///
/// Applies the same subscribed-topic filter as the MQTT adapter: messages
/// published on any other topic are dropped.
///
/// # Example
///
/// ```
/// use sensorwatch::{ChannelSource, TelemetrySource};
///
/// let (feed, mut source) = ChannelSource::create("ek/sensor/3", "synthetic");
/// feed.publish("ek/sensor/other", "{}");
/// feed.publish("ek/sensor/3", r#"{"3T0": 22.5}"#);
///
/// let message = source.poll_message().unwrap();
/// assert_eq!(message.topic, "ek/sensor/3");
/// assert!(source.poll_message().is_none());
/// ```
#[derive(Debug)]
pub struct ChannelSource {
    topic: String,
    messages: mpsc::UnboundedReceiver<RawMessage>,
    state: watch::Receiver<ConnectionState>,
    description: String,
    closed: bool,
}

impl ChannelSource {
    /// Create a connected feed/source pair subscribed to `topic`.
    ///
    /// The source starts out [`ConnectionState::Disconnected`] until the
    /// feed says otherwise.
    pub fn create(topic: &str, source_description: &str) -> (ChannelFeed, Self) {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let feed = ChannelFeed {
            messages: msg_tx,
            state: state_tx,
        };
        let source = Self {
            topic: topic.to_string(),
            messages: msg_rx,
            state: state_rx,
            description: format!("channel: {} [{}]", source_description, topic),
            closed: false,
        };
        (feed, source)
    }

    /// The subscribed topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl TelemetrySource for ChannelSource {
    fn poll_message(&mut self) -> Option<RawMessage> {
        if self.closed {
            return None;
        }

        while let Ok(message) = self.messages.try_recv() {
            if message.topic == self.topic {
                return Some(message);
            }
            trace!(topic = %message.topic, "dropping message on foreign topic");
        }
        None
    }

    fn state(&self) -> ConnectionState {
        if self.closed {
            ConnectionState::Disconnected
        } else {
            *self.state.borrow()
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn close(&mut self) {
        self.closed = true;
        self.messages.close();
    }
}
