use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a notification subscription.
///
/// ```text
/// Idle ─connect()─▶ Connecting ─opened─▶ Open ─closed─▶ Closing ─▶ Closed | Connecting
///                        │                  └─error──▶ Errored ─▶ Closed | Connecting
///                        └─failed─▶ Errored
/// any ─disconnect()─▶ Closed (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Constructed, `connect()` not yet called.
    #[default]
    Idle,
    /// A transport connection is being opened.
    Connecting,
    /// Transport is open; frames are being dispatched.
    Open,
    /// The server closed the stream normally.
    Closing,
    /// Opening failed or the open transport errored.
    Errored,
    /// No transport and no pending reconnect.
    Closed,
}

impl ConnectionState {
    /// Whether `connect()` may start a new connection from this state.
    pub fn can_connect(self) -> bool {
        matches!(self, ConnectionState::Idle | ConnectionState::Closed)
    }

    /// Whether a transport connection is currently usable.
    pub fn is_open(self) -> bool {
        self == ConnectionState::Open
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Errored => "errored",
            ConnectionState::Closed => "closed",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_connect_only_from_idle_or_closed() {
        assert!(ConnectionState::Idle.can_connect());
        assert!(ConnectionState::Closed.can_connect());
        for state in [
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Closing,
            ConnectionState::Errored,
        ] {
            assert!(!state.can_connect(), "{} must not allow connect()", state);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Errored.to_string(), "errored");
        assert_eq!(ConnectionState::default(), ConnectionState::Idle);
    }
}
