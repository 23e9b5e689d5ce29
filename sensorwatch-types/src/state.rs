//! Transport connection status.

use core::fmt;

/// The connection status of the transport feeding the pipeline.
///
/// There is exactly one current value at any time. The transport owns it;
/// everything else only observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    /// No connection and none being attempted.
    #[default]
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Handshake completed; the subscription has been requested.
    Connected,
    /// The broker rejected the subscription. The connection itself may be alive.
    SubscriptionError,
    /// A transport-level failure. The transport keeps retrying on its own.
    TransportError,
    /// The link went idle or unreachable without a hard error.
    Offline,
}

/// Coarse grouping of states for status indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    /// Data can flow.
    Up,
    /// Waiting on the broker.
    Pending,
    /// No data will arrive until something changes.
    Down,
}

impl ConnectionState {
    /// All states, in declaration order.
    pub const ALL: [ConnectionState; 6] = [
        ConnectionState::Disconnected,
        ConnectionState::Connecting,
        ConnectionState::Connected,
        ConnectionState::SubscriptionError,
        ConnectionState::TransportError,
        ConnectionState::Offline,
    ];

    /// Human-readable status string.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::SubscriptionError => "Subscription Error",
            ConnectionState::TransportError => "Error",
            ConnectionState::Offline => "Offline",
        }
    }

    /// Indicator class for this state.
    pub fn indicator(&self) -> Indicator {
        match self {
            ConnectionState::Connected => Indicator::Up,
            ConnectionState::Connecting => Indicator::Pending,
            _ => Indicator::Down,
        }
    }

    /// Returns true if the handshake has completed.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
