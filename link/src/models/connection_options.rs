use serde::{Deserialize, Serialize};

/// Connection-level options for a notification stream.
///
/// These options control:
/// - Whether reconnection is allowed at all for this client
/// - Reconnection timing (fixed interval, or opt-in exponential backoff)
/// - The largest inbound frame the decoder will accept
///
/// Whether a particular stream type may reconnect is declared by its
/// [`StreamProfile`](super::StreamProfile); `auto_reconnect` here can only
/// switch reconnection off, never on for a one-shot stream.
///
/// # Example
///
/// ```rust
/// use kalam_notify::ConnectionOptions;
///
/// let options = ConnectionOptions::default()
///     .with_reconnect_delay_ms(2000)
///     .with_reconnect_backoff(true)
///     .with_max_reconnect_delay_ms(60_000);
/// assert!(options.auto_reconnect);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Allow automatic reconnection on connection loss
    /// Default: true
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,

    /// Delay in milliseconds before each reconnection attempt
    /// (initial delay when backoff is enabled)
    /// Default: 1000ms (1 second)
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Upper bound for the delay when backoff is enabled
    /// Default: 30000ms (30 seconds)
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    /// Double the delay after each consecutive failed attempt
    /// Default: false (fixed interval)
    #[serde(default)]
    pub reconnect_backoff: bool,

    /// Largest inbound frame accepted, in bytes. Larger frames are reported
    /// as decode errors and skipped.
    /// Default: 64 MiB
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_max_reconnect_delay_ms() -> u64 {
    30000
}

fn default_max_frame_bytes() -> usize {
    64 << 20
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: default_auto_reconnect(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            reconnect_backoff: false,
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl ConnectionOptions {
    /// Create new connection options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether reconnection is allowed
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Set the delay between reconnection attempts (in milliseconds)
    pub fn with_reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnect_delay_ms = delay_ms;
        self
    }

    /// Set the maximum backoff delay (in milliseconds)
    pub fn with_max_reconnect_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_reconnect_delay_ms = max_delay_ms;
        self
    }

    /// Enable or disable exponential backoff between attempts
    pub fn with_reconnect_backoff(mut self, enabled: bool) -> Self {
        self.reconnect_backoff = enabled;
        self
    }

    /// Set the maximum accepted frame size (in bytes)
    pub fn with_max_frame_bytes(mut self, bytes: usize) -> Self {
        self.max_frame_bytes = bytes;
        self
    }
}
