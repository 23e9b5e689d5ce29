//! MQTT transport adapter.
//!
//! Connects to a broker over WebSocket (`ws://`, `wss://`) or TCP
//! (`mqtt://`, `mqtts://`), subscribes to one topic and forwards matching
//! publishes. The rumqttc event loop runs in a background task; it talks to
//! the pipeline only through a bounded payload channel and a state watch.
//!
//! ## State transitions
//!
//! ```text
//! open() ──▶ Connecting ──ConnAck──▶ Connected ──SubAck(failure)──▶ SubscriptionError
//!                 ▲                      │
//!                 │                      ├──keep-alive lost / Disconnect──▶ Offline
//!                 └── reconnect_period ◀─┴──any other failure──────────────▶ TransportError
//! close() ──▶ Disconnected
//! ```
//!
//! Reconnection is left to rumqttc: polling the event loop again after an
//! error starts a fresh connection attempt. The only policy applied here is
//! the delay between attempts.

use std::io;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS,
    StateError, SubscribeReasonCode, Transport,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use super::{now_ms, RawMessage, TelemetrySource};
use crate::{ConfigError, ConnectionState};

/// Shortest delay allowed between reconnection attempts.
pub const MIN_RECONNECT_PERIOD: Duration = Duration::from_secs(1);

/// Shortest keep-alive interval rumqttc accepts.
pub const MIN_KEEP_ALIVE: Duration = Duration::from_secs(1);

/// Longest keep-alive the CONNECT packet can carry (a u16 of seconds).
pub const MAX_KEEP_ALIVE: Duration = Duration::from_secs(u16::MAX as u64);

const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);
const DEFAULT_CHANNEL_CAPACITY: usize = 64;
const REQUEST_CAPACITY: usize = 10;

/// How the client reaches the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Plain TCP (`mqtt://`, `tcp://`).
    Tcp,
    /// TLS over TCP (`mqtts://`, `ssl://`).
    Tls,
    /// WebSocket (`ws://`).
    Ws,
    /// WebSocket over TLS (`wss://`).
    Wss,
}

impl TransportKind {
    fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "mqtt" | "tcp" => Some(TransportKind::Tcp),
            "mqtts" | "ssl" => Some(TransportKind::Tls),
            "ws" => Some(TransportKind::Ws),
            "wss" => Some(TransportKind::Wss),
            _ => None,
        }
    }

    /// Port used when the URI does not name one.
    pub fn default_port(&self) -> u16 {
        match self {
            TransportKind::Tcp => 1883,
            TransportKind::Tls => 8883,
            TransportKind::Ws => 80,
            TransportKind::Wss => 443,
        }
    }

    fn is_websocket(&self) -> bool {
        matches!(self, TransportKind::Ws | TransportKind::Wss)
    }
}

/// A broker URI resolved into what rumqttc needs to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    /// Transport selected by the URI scheme.
    pub kind: TransportKind,
    /// Broker host name or address.
    pub host: String,
    /// Broker port (explicit, or the scheme's default).
    pub port: u16,
    /// Address handed to rumqttc: the full URI for WebSocket transports,
    /// the bare host otherwise.
    pub address: String,
}

impl BrokerEndpoint {
    /// Parse a broker URI.
    ///
    /// ```
    /// use sensorwatch::{BrokerEndpoint, TransportKind};
    ///
    /// let endpoint = BrokerEndpoint::parse("ws://damoa.io:9002").unwrap();
    /// assert_eq!(endpoint.kind, TransportKind::Ws);
    /// assert_eq!(endpoint.port, 9002);
    /// ```
    pub fn parse(uri: &str) -> Result<Self, ConfigError> {
        let uri = uri.trim();
        let invalid = |reason: String| ConfigError::InvalidBrokerUri {
            uri: uri.to_string(),
            reason,
        };

        let url = Url::parse(uri).map_err(|e| invalid(e.to_string()))?;
        let kind = TransportKind::from_scheme(url.scheme())
            .ok_or_else(|| ConfigError::UnsupportedScheme(url.scheme().to_string()))?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host".to_string()))?
            .to_string();
        let port = url.port_or_known_default().unwrap_or(kind.default_port());

        let address = if kind.is_websocket() {
            uri.to_string()
        } else {
            host.clone()
        };

        Ok(Self {
            kind,
            host,
            port,
            address,
        })
    }

    fn mqtt_options(&self, client_id: &str, keep_alive: Duration) -> MqttOptions {
        let mut options = MqttOptions::new(client_id, self.address.clone(), self.port);
        options.set_keep_alive(keep_alive);
        options.set_clean_session(true);

        match self.kind {
            TransportKind::Tcp => {}
            TransportKind::Tls => {
                options.set_transport(Transport::tls_with_default_config());
            }
            TransportKind::Ws => {
                options.set_transport(Transport::Ws);
            }
            TransportKind::Wss => {
                options.set_transport(Transport::wss_with_default_config());
            }
        }
        options
    }
}

/// Map an event-loop failure onto the state it should surface as.
///
/// Keep-alive loss, timeouts and a dropped link count as [`ConnectionState::Offline`];
/// everything else (refused connections, TLS and protocol failures) is a
/// [`ConnectionState::TransportError`].
pub fn classify_error(err: &ConnectionError) -> ConnectionState {
    match err {
        ConnectionError::NetworkTimeout | ConnectionError::FlushTimeout => ConnectionState::Offline,
        ConnectionError::MqttState(StateError::AwaitPingResp) => ConnectionState::Offline,
        ConnectionError::MqttState(StateError::Io(e)) | ConnectionError::Io(e)
            if is_link_loss(e) =>
        {
            ConnectionState::Offline
        }
        _ => ConnectionState::TransportError,
    }
}

fn is_link_loss(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::TimedOut
            | io::ErrorKind::NotConnected
    )
}

/// Publishes state transitions, and stops publishing once the source closes.
#[derive(Debug)]
struct StatePublisher {
    tx: watch::Sender<ConnectionState>,
    closed: AtomicBool,
}

impl StatePublisher {
    fn new(initial: ConnectionState) -> (Arc<Self>, watch::Receiver<ConnectionState>) {
        let (tx, rx) = watch::channel(initial);
        let publisher = Arc::new(Self {
            tx,
            closed: AtomicBool::new(false),
        });
        (publisher, rx)
    }

    fn set(&self, next: ConnectionState) {
        let changed = self.tx.send_if_modified(|current| {
            // Checked under the watch lock so close() always wins.
            if self.closed.load(Ordering::Acquire) || *current == next {
                return false;
            }
            *current = next;
            true
        });
        if changed {
            info!(state = %next, "connection state changed");
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.tx.send_replace(ConnectionState::Disconnected);
    }
}

/// Per-connection event handling, independent of the network.
#[derive(Debug)]
struct Session {
    topic: String,
    state: Arc<StatePublisher>,
    messages: mpsc::Sender<RawMessage>,
}

impl Session {
    async fn on_event(&mut self, client: &AsyncClient, event: Event) -> ControlFlow<()> {
        let Event::Incoming(packet) = event else {
            return ControlFlow::Continue(());
        };

        match packet {
            Packet::ConnAck(ack) if ack.code == ConnectReturnCode::Success => {
                self.state.set(ConnectionState::Connected);
                match client.try_subscribe(self.topic.as_str(), QoS::AtMostOnce) {
                    Ok(()) => debug!(topic = %self.topic, "subscribe requested"),
                    Err(e) => {
                        error!(topic = %self.topic, error = %e, "failed to request subscription");
                        self.state.set(ConnectionState::SubscriptionError);
                    }
                }
            }
            Packet::ConnAck(ack) => {
                warn!(code = ?ack.code, "broker refused connection");
                self.state.set(ConnectionState::TransportError);
            }
            Packet::SubAck(ack) => {
                if ack
                    .return_codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure))
                {
                    warn!(topic = %self.topic, "broker rejected subscription");
                    self.state.set(ConnectionState::SubscriptionError);
                } else {
                    info!(topic = %self.topic, "subscribed");
                }
            }
            Packet::Publish(publish) => {
                if publish.topic != self.topic {
                    trace!(topic = %publish.topic, "dropping message on foreign topic");
                    return ControlFlow::Continue(());
                }
                let message = RawMessage::at(publish.topic, publish.payload, now_ms());
                if self.messages.send(message).await.is_err() {
                    // Receiver dropped
                    return ControlFlow::Break(());
                }
            }
            Packet::Disconnect => {
                info!("broker closed the session");
                self.state.set(ConnectionState::Offline);
            }
            other => trace!(packet = ?other, "mqtt incoming"),
        }
        ControlFlow::Continue(())
    }
}

async fn drive(
    mut eventloop: EventLoop,
    client: AsyncClient,
    mut session: Session,
    reconnect_period: Duration,
) {
    loop {
        match eventloop.poll().await {
            Ok(event) => {
                if session.on_event(&client, event).await.is_break() {
                    break;
                }
            }
            Err(ConnectionError::RequestsDone) => break,
            Err(e) => {
                let state = classify_error(&e);
                error!(error = %e, retry_in = ?reconnect_period, "mqtt event loop error");
                session.state.set(state);
                tokio::time::sleep(reconnect_period).await;
            }
        }
    }
    debug!(topic = %session.topic, "mqtt event loop stopped");
}

/// Check a keep-alive interval against what the CONNECT packet can express.
///
/// The wire field is a u16 of seconds: anything below one second, above
/// 65535 seconds or with a fractional part would be silently altered.
pub fn check_keep_alive(keep_alive: Duration) -> Result<(), ConfigError> {
    const KEY: &str = "keep_alive";
    if keep_alive < MIN_KEEP_ALIVE {
        return Err(ConfigError::TooShort {
            key: KEY,
            min: MIN_KEEP_ALIVE,
            actual: keep_alive,
        });
    }
    if keep_alive > MAX_KEEP_ALIVE {
        return Err(ConfigError::TooLong {
            key: KEY,
            max: MAX_KEEP_ALIVE,
            actual: keep_alive,
        });
    }
    if keep_alive.subsec_nanos() != 0 {
        return Err(ConfigError::NotWholeSeconds {
            key: KEY,
            actual: keep_alive,
        });
    }
    Ok(())
}

/// Builder for [`MqttSource`].
#[derive(Debug, Clone)]
pub struct MqttSourceBuilder {
    broker_uri: Option<String>,
    topic: Option<String>,
    client_id: Option<String>,
    keep_alive: Duration,
    reconnect_period: Duration,
    channel_capacity: usize,
}

impl Default for MqttSourceBuilder {
    fn default() -> Self {
        Self {
            broker_uri: None,
            topic: None,
            client_id: None,
            keep_alive: DEFAULT_KEEP_ALIVE,
            reconnect_period: MIN_RECONNECT_PERIOD,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl MqttSourceBuilder {
    /// Set the broker URI (e.g. "ws://localhost:9001/mqtt").
    pub fn broker(mut self, uri: impl Into<String>) -> Self {
        self.broker_uri = Some(uri.into());
        self
    }

    /// Set the topic to subscribe to.
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set the MQTT client id (default: "sensorwatch-<pid>").
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set the keep-alive interval (default: 30s, minimum 1s).
    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Set the delay between reconnection attempts (default and minimum: 1s).
    pub fn reconnect_period(mut self, period: Duration) -> Self {
        self.reconnect_period = period;
        self
    }

    /// Set how many undelivered payloads may queue up before the event
    /// loop waits for the pipeline (default: 64).
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Validate the settings and start connecting.
    ///
    /// Returns immediately with the source in [`ConnectionState::Connecting`].
    /// Must be called from within a tokio runtime; the event loop is spawned
    /// onto it.
    pub fn open(self) -> Result<MqttSource, ConfigError> {
        let broker_uri = self
            .broker_uri
            .filter(|u| !u.trim().is_empty())
            .ok_or(ConfigError::Missing("broker_uri"))?;
        let topic = self
            .topic
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::Missing("topic"))?;
        let client_id = self
            .client_id
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| format!("sensorwatch-{}", std::process::id()));

        if self.reconnect_period < MIN_RECONNECT_PERIOD {
            return Err(ConfigError::TooShort {
                key: "reconnect_period",
                min: MIN_RECONNECT_PERIOD,
                actual: self.reconnect_period,
            });
        }
        check_keep_alive(self.keep_alive)?;

        let endpoint = BrokerEndpoint::parse(&broker_uri)?;
        let options = endpoint.mqtt_options(&client_id, self.keep_alive);
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        let (state, state_rx) = StatePublisher::new(ConnectionState::Connecting);
        let (msg_tx, msg_rx) = mpsc::channel(self.channel_capacity);

        let session = Session {
            topic: topic.clone(),
            state: state.clone(),
            messages: msg_tx,
        };

        info!(broker = %broker_uri, topic = %topic, client_id = %client_id, "connecting");
        let task = tokio::spawn(drive(eventloop, client, session, self.reconnect_period));

        Ok(MqttSource {
            task: Some(task),
            messages: msg_rx,
            state,
            state_rx,
            description: format!("mqtt: {} [{}]", broker_uri, topic),
            topic,
        })
    }
}

/// A [`TelemetrySource`] backed by an MQTT broker connection.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use sensorwatch::{MqttSource, TelemetrySource};
///
/// # tokio_test::block_on(async {
/// let mut source = MqttSource::builder()
///     .broker("ws://localhost:9001/mqtt")
///     .topic("ek/sensor/3")
///     .reconnect_period(Duration::from_secs(2))
///     .open()
///     .unwrap();
///
/// while let Some(message) = source.poll_message() {
///     println!("{} bytes on {}", message.payload.len(), message.topic);
/// }
/// source.close();
/// # });
/// ```
pub struct MqttSource {
    task: Option<JoinHandle<()>>,
    messages: mpsc::Receiver<RawMessage>,
    state: Arc<StatePublisher>,
    state_rx: watch::Receiver<ConnectionState>,
    description: String,
    topic: String,
}

impl MqttSource {
    /// Create a new builder for configuring the source.
    pub fn builder() -> MqttSourceBuilder {
        MqttSourceBuilder::default()
    }

    /// The subscribed topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl TelemetrySource for MqttSource {
    fn poll_message(&mut self) -> Option<RawMessage> {
        self.messages.try_recv().ok()
    }

    fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn close(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        // Aborting drops the event loop and with it the network link.
        task.abort();
        self.messages.close();
        self.state.close();
        info!(topic = %self.topic, "disconnected");
    }
}

impl Drop for MqttSource {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for MqttSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttSource")
            .field("description", &self.description)
            .field("state", &self.state())
            .finish()
    }
}
