//! Timers run by the connection task: the open attempt, the idle keepalive
//! ping, and the wait for any frame after that ping.

use std::time::Duration;

/// Timer settings for one notification stream. A zero duration switches the
/// corresponding timer off.
///
/// ```rust
/// use kalam_notify::NotifyTimeouts;
/// use std::time::Duration;
///
/// let timeouts = NotifyTimeouts::builder()
///     .connection_timeout(Duration::from_secs(30))
///     .keepalive_interval(Duration::from_secs(20))
///     .build();
/// assert_eq!(timeouts.pong_timeout, Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyTimeouts {
    /// Bound on TCP + TLS + WebSocket handshake. Default: 10 s.
    pub connection_timeout: Duration,
    /// Silence on an open stream before a Ping goes out. Default: 10 s.
    pub keepalive_interval: Duration,
    /// Window for any frame to arrive after a Ping. Default: 5 s.
    pub pong_timeout: Duration,
}

impl Default for NotifyTimeouts {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(10),
            pong_timeout: Duration::from_secs(5),
        }
    }
}

impl NotifyTimeouts {
    pub fn builder() -> NotifyTimeoutsBuilder {
        NotifyTimeoutsBuilder {
            timeouts: Self::default(),
        }
    }

    /// Defaults with keepalive pings (and so the pong check) turned off.
    /// For servers or proxies that mishandle control frames.
    pub fn without_keepalive() -> Self {
        Self {
            keepalive_interval: Duration::ZERO,
            pong_timeout: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Zero, or longer than a year, means "never".
    pub fn is_no_timeout(duration: Duration) -> bool {
        duration.is_zero() || duration > Duration::from_secs(86400 * 365)
    }
}

#[derive(Debug, Clone)]
pub struct NotifyTimeoutsBuilder {
    timeouts: NotifyTimeouts,
}

impl NotifyTimeoutsBuilder {
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connection_timeout = timeout;
        self
    }

    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.timeouts.keepalive_interval = interval;
        self
    }

    pub fn pong_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.pong_timeout = timeout;
        self
    }

    pub fn build(self) -> NotifyTimeouts {
        self.timeouts
    }
}
