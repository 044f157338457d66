//! Reconnection policy.
//!
//! Decides, after a stream terminates, whether the connection task goes
//! back to `Connecting` and how long it waits first. There is no attempt
//! cap: a capable stream keeps retrying until the consumer disconnects.

use crate::{event_handlers::DisconnectReason, models::ConnectionOptions};
use std::fmt;
use std::time::Duration;

/// Why a transport connection (or an attempt to open one) ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// The consumer called `disconnect()`.
    ClientDisconnect,
    /// The server closed an open stream with a close frame.
    ServerClosed(DisconnectReason),
    /// The open stream failed (socket error, EOF without close, keepalive timeout).
    TransportError(String),
    /// The transport never opened.
    OpenFailed(String),
}

impl TerminationReason {
    /// Normal closes go through `Closing`; everything else through `Errored`.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            TerminationReason::TransportError(_) | TerminationReason::OpenFailed(_)
        )
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::ClientDisconnect => write!(f, "client disconnected"),
            TerminationReason::ServerClosed(reason) => write!(f, "server closed: {}", reason),
            TerminationReason::TransportError(msg) => write!(f, "transport error: {}", msg),
            TerminationReason::OpenFailed(msg) => write!(f, "open failed: {}", msg),
        }
    }
}

/// Delay schedule between reconnection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Same delay before every attempt.
    Fixed(Duration),
    /// `initial * 2^attempt`, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Fixed(Duration::from_millis(1000))
    }
}

impl ReconnectPolicy {
    pub fn from_options(options: &ConnectionOptions) -> Self {
        let initial = Duration::from_millis(options.reconnect_delay_ms);
        if options.reconnect_backoff {
            ReconnectPolicy::Exponential {
                initial,
                max: Duration::from_millis(options.max_reconnect_delay_ms),
            }
        } else {
            ReconnectPolicy::Fixed(initial)
        }
    }

    /// Delay before the next `Connecting` attempt, or `None` to close.
    ///
    /// `attempt` counts consecutive failed attempts since the last
    /// successful open (0 for the first retry).
    pub fn next_delay(
        &self,
        reason: &TerminationReason,
        auto_reconnect_capable: bool,
        attempt: u32,
    ) -> Option<Duration> {
        if *reason == TerminationReason::ClientDisconnect || !auto_reconnect_capable {
            return None;
        }
        Some(self.delay_for(attempt))
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            ReconnectPolicy::Fixed(delay) => delay,
            ReconnectPolicy::Exponential { initial, max } => {
                let initial_ms = initial.as_millis() as u64;
                let delay_ms = initial_ms.saturating_mul(2u64.saturating_pow(attempt));
                std::cmp::min(Duration::from_millis(delay_ms), max)
            },
        }
    }
}
