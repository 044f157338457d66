//! Connection lifecycle event handlers for notification streams.
//!
//! Provides callback-based hooks for monitoring a subscription's transport:
//!
//! - [`on_connect`](EventHandlers::on_connect): Fired when the stream reaches `Open`
//! - [`on_disconnect`](EventHandlers::on_disconnect): Fired when an open stream closes
//! - [`on_error`](EventHandlers::on_error): Fired on transport failures and undecodable frames
//! - [`on_receive`](EventHandlers::on_receive): Optional debug hook for every inbound frame
//! - [`on_state_change`](EventHandlers::on_state_change): Every lifecycle state transition
//!
//! Handlers never carry message payloads; those go to the subscription's
//! message callback.
//!
//! # Example
//!
//! ```rust
//! use kalam_notify::EventHandlers;
//!
//! let handlers = EventHandlers::new()
//!     .on_connect(|| println!("Live"))
//!     .on_disconnect(|reason| println!("Disconnected: {}", reason))
//!     .on_error(|error| eprintln!("Stream error: {}", error));
//! assert!(handlers.has_any());
//! ```

use crate::models::ConnectionState;
use std::fmt;
use std::sync::Arc;

/// Reason for a disconnect event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectReason {
    /// Human-readable description of why the connection closed.
    pub message: String,
    /// WebSocket close code, if available (e.g. 1000 = normal, 1006 = abnormal).
    pub code: Option<u16>,
}

impl DisconnectReason {
    /// Create a new disconnect reason with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Create a new disconnect reason with a message and close code.
    pub fn with_code(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "{} (code: {})", self.message, code)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/// Which part of the pipeline produced a [`ConnectionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Opening, reading from, or keeping alive the transport failed.
    Transport,
    /// A frame arrived but could not be decoded; the stream stays open.
    Decode,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transport => write!(f, "transport"),
            ErrorKind::Decode => write!(f, "decode"),
        }
    }
}

/// Error information passed to the `on_error` handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionError {
    /// Human-readable error message.
    pub message: String,
    /// Where the error came from.
    pub kind: ErrorKind,
    /// Whether the stream keeps going after this error (open connection
    /// untouched, or a reconnect will be attempted).
    pub recoverable: bool,
}

impl ConnectionError {
    /// Create a transport error.
    pub fn transport(message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            message: message.into(),
            kind: ErrorKind::Transport,
            recoverable,
        }
    }

    /// Create a decode error. Always recoverable.
    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ErrorKind::Decode,
            recoverable: true,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

/// Type alias for the on_connect callback.
pub type OnConnectCallback = Arc<dyn Fn() + Send + Sync>;

/// Type alias for the on_disconnect callback.
pub type OnDisconnectCallback = Arc<dyn Fn(DisconnectReason) + Send + Sync>;

/// Type alias for the on_error callback.
pub type OnErrorCallback = Arc<dyn Fn(ConnectionError) + Send + Sync>;

/// Type alias for the on_receive callback (debug hook for all inbound frames).
pub type OnReceiveCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Type alias for the on_state_change callback.
pub type OnStateChangeCallback = Arc<dyn Fn(ConnectionState) + Send + Sync>;

/// Connection lifecycle event handlers.
///
/// All handlers are optional. They run on the subscription's connection
/// task, so like the message callback they must not block for long.
#[derive(Clone, Default)]
pub struct EventHandlers {
    pub(crate) on_connect: Option<OnConnectCallback>,
    pub(crate) on_disconnect: Option<OnDisconnectCallback>,
    pub(crate) on_error: Option<OnErrorCallback>,
    pub(crate) on_receive: Option<OnReceiveCallback>,
    pub(crate) on_state_change: Option<OnStateChangeCallback>,
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_receive", &self.on_receive.is_some())
            .field("on_state_change", &self.on_state_change.is_some())
            .finish()
    }
}

impl EventHandlers {
    /// Create a new empty `EventHandlers` (no callbacks registered).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked each time the stream reaches `Open`.
    pub fn on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked when an open stream closes, for any
    /// reason including an explicit `disconnect()`.
    pub fn on_disconnect(mut self, f: impl Fn(DisconnectReason) + Send + Sync + 'static) -> Self {
        self.on_disconnect = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked for transport and decode errors.
    ///
    /// # Example
    /// ```rust
    /// use kalam_notify::{EventHandlers, ErrorKind};
    ///
    /// let handlers = EventHandlers::new().on_error(|err| {
    ///     if err.kind == ErrorKind::Decode {
    ///         eprintln!("skipped bad frame: {}", err.message);
    ///     }
    /// });
    /// ```
    pub fn on_error(mut self, f: impl Fn(ConnectionError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked with the text of every inbound frame
    /// before decoding. Intended for debugging and tracing only.
    pub fn on_receive(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_receive = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked after every state transition, in order.
    ///
    /// Unlike `watch_state()`, which only exposes the latest value, this
    /// sees short-lived states such as `Errored` followed immediately by
    /// `Connecting`. May be called from the consumer's thread when
    /// `disconnect()` moves the stream to `Closed`.
    pub fn on_state_change(mut self, f: impl Fn(ConnectionState) + Send + Sync + 'static) -> Self {
        self.on_state_change = Some(Arc::new(f));
        self
    }

    /// Returns `true` if any handler is registered.
    pub fn has_any(&self) -> bool {
        self.on_connect.is_some()
            || self.on_disconnect.is_some()
            || self.on_error.is_some()
            || self.on_receive.is_some()
            || self.on_state_change.is_some()
    }

    // ---------------------------------------------------------------
    // Internal dispatch helpers
    // ---------------------------------------------------------------

    pub(crate) fn emit_connect(&self) {
        if let Some(cb) = &self.on_connect {
            cb();
        }
    }

    pub(crate) fn emit_disconnect(&self, reason: DisconnectReason) {
        if let Some(cb) = &self.on_disconnect {
            cb(reason);
        }
    }

    pub(crate) fn emit_error(&self, error: ConnectionError) {
        if let Some(cb) = &self.on_error {
            cb(error);
        }
    }

    pub(crate) fn emit_receive(&self, raw: &str) {
        if let Some(cb) = &self.on_receive {
            cb(raw);
        }
    }

    pub(crate) fn emit_state_change(&self, state: ConnectionState) {
        if let Some(cb) = &self.on_state_change {
            cb(state);
        }
    }
}
