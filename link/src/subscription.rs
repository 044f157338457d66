//! Notification subscription façade.
//!
//! A [`NotificationSubscription`] is one stream (server logs, cluster
//! topology, database changes, ...) configured by a [`StreamProfile`]. It owns
//! at most one background connection task at a time and exposes a small,
//! synchronous lifecycle API: `connect()`, `disconnect()` and state queries.

use crate::{
    connection::{
        connection_task, CallbackResult, ConnCmd, ConnectionContext, ConnectionShared,
        MessageCallback,
    },
    endpoint::resolve_endpoint,
    error::{NotifyError, Result},
    event_handlers::EventHandlers,
    models::{ConnectionOptions, ConnectionState, StreamMessage, StreamProfile, SubscriptionConfig},
    reconnect::ReconnectPolicy,
    timeouts::NotifyTimeouts,
    transport::{Connector, WebSocketConnector},
};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{mpsc, watch};

/// A resilient subscription to one server notification stream.
///
/// Messages are handed to the `on_message` callback one at a time, in wire
/// order, from the subscription's background task. The callback must not
/// block for long: a slow callback delays the next frame.
///
/// Dropping the subscription disconnects it.
///
/// # Examples
///
/// ```rust,no_run
/// use kalam_notify::{FilterRule, NotificationSubscription, StreamProfile, SubscriptionConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let logs = NotificationSubscription::builder()
///     .base_url("http://localhost:8080")
///     .profile(StreamProfile::server_logs())
///     .config(SubscriptionConfig::new().with_rule(FilterRule::exclude("Server.Voron")?))
///     .on_message(|message| {
///         println!("{}", message.as_raw().unwrap_or_default());
///         Ok(())
///     })
///     .build()?;
///
/// logs.connect()?;
/// // ...
/// logs.disconnect();
/// # Ok(())
/// # }
/// ```
pub struct NotificationSubscription {
    inner: Arc<SubscriptionInner>,
}

/// Cloneable, non-owning handle to a [`NotificationSubscription`].
///
/// Lets the message callback, or any other task, stop the stream without
/// keeping the subscription alive. Dropping a handle does nothing.
#[derive(Clone)]
pub struct SubscriptionHandle {
    inner: Weak<SubscriptionInner>,
}

struct SubscriptionInner {
    base_url: String,
    profile: StreamProfile,
    config: SubscriptionConfig,
    options: ConnectionOptions,
    timeouts: NotifyTimeouts,
    handlers: EventHandlers,
    connector: Arc<dyn Connector>,
    callback: MessageCallback,
    shared: Arc<ConnectionShared>,
    active: Mutex<Option<ActiveTask>>,
    url: Mutex<Option<String>>,
}

/// Command channel of the currently running connection task.
struct ActiveTask {
    cmd_tx: mpsc::UnboundedSender<ConnCmd>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl NotificationSubscription {
    /// Create a builder for a new subscription.
    pub fn builder() -> NotificationSubscriptionBuilder {
        NotificationSubscriptionBuilder::new()
    }

    /// Start streaming.
    ///
    /// A no-op while a connection task is already active (any state other
    /// than `Idle` or a `Closed` reached without `disconnect()`). Must be
    /// called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`NotifyError::Disconnected`] after [`disconnect`](Self::disconnect)
    /// - [`NotifyError::ConfigurationError`] if the endpoint cannot be resolved
    /// - [`NotifyError::InternalError`] outside a tokio runtime
    pub fn connect(&self) -> Result<()> {
        self.inner.connect()
    }

    /// Stop streaming for good.
    ///
    /// Synchronous and idempotent, valid in any state. When it returns the
    /// state is `Closed`, any pending open attempt or reconnect delay is
    /// cancelled, and no further message will be dispatched. A dispatch
    /// already running (e.g. the callback that called this) completes.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Human-readable label for diagnostics and log prefixes.
    pub fn connection_description(&self) -> &str {
        self.inner.shared.description()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.shared.state()
    }

    /// Subscribe to state changes. Observers see the latest value; use
    /// [`EventHandlers::on_state_change`] to observe every transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.shared.watch_state()
    }

    /// `true` only while the state is `Open`.
    pub fn is_connected(&self) -> bool {
        self.inner.shared.is_connected()
    }

    /// The resolved endpoint, available after the first successful
    /// `connect()`.
    pub fn url(&self) -> Option<String> {
        lock(&self.inner.url).clone()
    }

    pub fn profile(&self) -> &StreamProfile {
        &self.inner.profile
    }

    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl fmt::Debug for NotificationSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationSubscription")
            .field("description", &self.connection_description())
            .field("state", &self.state())
            .field("url", &self.url())
            .finish()
    }
}

impl Drop for NotificationSubscription {
    fn drop(&mut self) {
        self.inner.disconnect();
    }
}

impl SubscriptionHandle {
    /// Same as [`NotificationSubscription::disconnect`]. A no-op once the
    /// subscription has been dropped.
    pub fn disconnect(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.disconnect();
        }
    }

    /// Current state; `Closed` once the subscription has been dropped.
    pub fn state(&self) -> ConnectionState {
        self.inner
            .upgrade()
            .map(|inner| inner.shared.state())
            .unwrap_or(ConnectionState::Closed)
    }

    pub fn is_connected(&self) -> bool {
        self.inner
            .upgrade()
            .map(|inner| inner.shared.is_connected())
            .unwrap_or(false)
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("state", &self.state())
            .finish()
    }
}

impl SubscriptionInner {
    fn connect(&self) -> Result<()> {
        if self.shared.is_disconnected() {
            return Err(NotifyError::Disconnected);
        }

        // Held until the new task is registered, so a concurrent
        // disconnect() always finds it.
        let mut active = lock(&self.active);

        let state = self.shared.state();
        if !state.can_connect() {
            log::debug!(
                "[kalam-notify] {}: connect() ignored while {}",
                self.shared.description(),
                state
            );
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            NotifyError::InternalError("connect() must be called within a tokio runtime".into())
        })?;

        let url = resolve_endpoint(&self.base_url, &self.profile.route, &self.config)?;

        // Published without the state hook: the hook runs once the lock is
        // released, since it may call back into connect() or disconnect().
        if !self.shared.publish(ConnectionState::Connecting) {
            return Err(NotifyError::Disconnected);
        }

        let auto_reconnect = self.profile.auto_reconnect && self.options.auto_reconnect;
        log::info!(
            "[kalam-notify] {}: connecting to {} (auto_reconnect={})",
            self.shared.description(),
            url,
            auto_reconnect
        );

        let ctx = ConnectionContext {
            url: url.clone(),
            mode: self.profile.mode,
            auto_reconnect,
            policy: ReconnectPolicy::from_options(&self.options),
            timeouts: self.timeouts.clone(),
            max_frame_bytes: self.options.max_frame_bytes,
            connector: Arc::clone(&self.connector),
            callback: Arc::clone(&self.callback),
            handlers: self.handlers.clone(),
            shared: Arc::clone(&self.shared),
        };

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        *active = Some(ActiveTask { cmd_tx });
        *lock(&self.url) = Some(url);
        drop(active);

        // A disconnect() may land between the unlock and here, either from
        // another thread or from the hook itself. Its Shutdown is dropped
        // along with cmd_rx.
        if !self.shared.is_disconnected() {
            self.handlers.emit_state_change(ConnectionState::Connecting);
        }
        if self.shared.is_disconnected() {
            return Ok(());
        }
        runtime.spawn(connection_task(ctx, cmd_rx));
        Ok(())
    }

    fn disconnect(&self) {
        if !self.shared.mark_disconnected() {
            return;
        }
        log::info!("[kalam-notify] {}: disconnect requested", self.shared.description());

        if let Some(active) = lock(&self.active).take() {
            let _ = active.cmd_tx.send(ConnCmd::Shutdown);
        }
    }
}

/// Builder for [`NotificationSubscription`].
pub struct NotificationSubscriptionBuilder {
    base_url: Option<String>,
    profile: Option<StreamProfile>,
    config: SubscriptionConfig,
    options: ConnectionOptions,
    timeouts: NotifyTimeouts,
    handlers: EventHandlers,
    connector: Option<Arc<dyn Connector>>,
    callback: Option<MessageCallback>,
}

impl NotificationSubscriptionBuilder {
    fn new() -> Self {
        Self {
            base_url: None,
            profile: None,
            config: SubscriptionConfig::default(),
            options: ConnectionOptions::default(),
            timeouts: NotifyTimeouts::default(),
            handlers: EventHandlers::default(),
            connector: None,
            callback: None,
        }
    }

    /// Server base URL (`http(s)://` or `ws(s)://`). Required.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Which stream to subscribe to. Required.
    pub fn profile(mut self, profile: StreamProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Filter rules and scalar parameters sent with the connection.
    pub fn config(mut self, config: SubscriptionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn connection_options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn timeouts(mut self, timeouts: NotifyTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn event_handlers(mut self, handlers: EventHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    /// Replace the default [`WebSocketConnector`].
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// The message callback. Required.
    ///
    /// Invoked once per decoded message, never concurrently. Returning
    /// `Err` (or panicking) is logged and does not affect the stream.
    pub fn on_message<F>(mut self, f: F) -> Self
    where
        F: Fn(StreamMessage) -> CallbackResult + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Result<NotificationSubscription> {
        let base_url = self
            .base_url
            .ok_or_else(|| NotifyError::ConfigurationError("base_url is required".into()))?;
        let profile = self
            .profile
            .ok_or_else(|| NotifyError::ConfigurationError("profile is required".into()))?;
        let callback = self
            .callback
            .ok_or_else(|| NotifyError::ConfigurationError("on_message callback is required".into()))?;
        let connector = self.connector.unwrap_or_else(|| Arc::new(WebSocketConnector));

        let shared = Arc::new(ConnectionShared::new(
            profile.description.clone(),
            self.handlers.clone(),
        ));

        Ok(NotificationSubscription {
            inner: Arc::new(SubscriptionInner {
                base_url,
                profile,
                config: self.config,
                options: self.options,
                timeouts: self.timeouts,
                handlers: self.handlers,
                connector,
                callback,
                shared,
                active: Mutex::new(None),
                url: Mutex::new(None),
            }),
        })
    }
}
