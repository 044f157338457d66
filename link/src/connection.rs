//! Connection state machine for a single notification subscription.
//!
//! One background task per subscription owns the transport connection and
//! processes, strictly one at a time:
//!
//! - inbound frames (decoded and dispatched to the message callback)
//! - transport close / error (handed to the [`ReconnectPolicy`])
//! - consumer commands (`disconnect()`)
//!
//! Shared state is limited to the published [`ConnectionState`], the
//! connectivity flag and the terminal "disconnected" flag. The flag is
//! checked before every single dispatch so that nothing reaches the
//! callback once `disconnect()` has returned.

use crate::{
    decoder::{check_frame_size, decode_binary_frame, decode_frame},
    error::{NotifyError, Result},
    event_handlers::{ConnectionError, DisconnectReason, EventHandlers},
    models::{ConnectionState, FrameMode, StreamMessage},
    reconnect::{ReconnectPolicy, TerminationReason},
    timeouts::NotifyTimeouts,
    transport::{Connector, Frame, TransportConnection},
};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{
    atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant as TokioInstant;

/// Maximum sleep duration that won't overflow `Instant + Duration`.
/// ~100 years is far enough into the future to be effectively "never".
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// Error type a message callback may return. Failures are logged and never
/// affect the stream.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Return type of a message callback.
pub type CallbackResult = std::result::Result<(), CallbackError>;

/// Type alias for the message callback.
pub type MessageCallback = Arc<dyn Fn(StreamMessage) -> CallbackResult + Send + Sync>;

/// Source of [`ConnectionShared::id`].
static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(0);

/// Commands sent from the public API to the background connection task.
#[derive(Debug)]
pub(crate) enum ConnCmd {
    /// Stop immediately: drop any pending open or reconnect delay, close the
    /// transport and exit.
    Shutdown,
}

// ── Shared state ────────────────────────────────────────────────────────────

/// State shared between a subscription handle and its connection task.
pub(crate) struct ConnectionShared {
    /// Process-unique; tells apart subscriptions with the same description.
    id: u64,
    description: String,
    state_tx: watch::Sender<ConnectionState>,
    connected: AtomicBool,
    disconnected: AtomicBool,
    reconnect_attempts: AtomicU32,
    handlers: EventHandlers,
}

impl ConnectionShared {
    pub(crate) fn new(description: String, handlers: EventHandlers) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        Self {
            id: NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed),
            description,
            state_tx,
            connected: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
            reconnect_attempts: AtomicU32::new(0),
            handlers,
        }
    }

    pub(crate) fn description(&self) -> &str {
        &self.description
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub(crate) fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub(crate) fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    /// Move to `next` and fire the state hook. Refused (returns `false`)
    /// once the subscription has been disconnected, except for `Closed`
    /// itself.
    pub(crate) fn transition(&self, next: ConnectionState) -> bool {
        let changed = self.publish_changed(next);
        if changed {
            self.handlers.emit_state_change(next);
        }
        changed || self.state() == next
    }

    /// Like [`transition`](Self::transition) but without the state hook.
    /// The caller must emit `next` itself, outside any lock it holds.
    pub(crate) fn publish(&self, next: ConnectionState) -> bool {
        self.publish_changed(next) || self.state() == next
    }

    /// The check runs under the watch lock, so it cannot interleave with
    /// [`mark_disconnected`](Self::mark_disconnected).
    fn publish_changed(&self, next: ConnectionState) -> bool {
        self.state_tx.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            if self.disconnected.load(Ordering::SeqCst) && next != ConnectionState::Closed {
                return false;
            }
            log::debug!("[kalam-notify] {}: {} -> {}", self.description, state, next);
            *state = next;
            self.connected.store(next.is_open(), Ordering::SeqCst);
            true
        })
    }

    /// Enter the terminal `Closed` state. Returns `false` if this already
    /// happened.
    pub(crate) fn mark_disconnected(&self) -> bool {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return false;
        }
        let changed = self.state_tx.send_if_modified(|state| {
            self.connected.store(false, Ordering::SeqCst);
            if *state == ConnectionState::Closed {
                return false;
            }
            log::debug!(
                "[kalam-notify] {}: {} -> {} (disconnect)",
                self.description,
                state,
                ConnectionState::Closed
            );
            *state = ConnectionState::Closed;
            true
        });
        if changed {
            self.handlers.emit_state_change(ConnectionState::Closed);
        }
        true
    }
}

// ── Background connection task ──────────────────────────────────────────────

/// Everything the connection task needs; owned by the task.
pub(crate) struct ConnectionContext {
    pub url: String,
    pub mode: FrameMode,
    /// Effective capability: stream profile AND connection options.
    pub auto_reconnect: bool,
    pub policy: ReconnectPolicy,
    pub timeouts: NotifyTimeouts,
    pub max_frame_bytes: usize,
    pub connector: Arc<dyn Connector>,
    pub callback: MessageCallback,
    pub handlers: EventHandlers,
    pub shared: Arc<ConnectionShared>,
}

/// The main background task managing one subscription's transport.
///
/// Lifecycle:
/// 1. `Connecting`: open the transport (bounded by the connection timeout)
/// 2. `Open`: read frames, dispatch messages, send keepalive pings
/// 3. On termination: `Closing` (normal close) or `Errored`
/// 4. Ask the reconnect policy: wait and loop back to 1, or `Closed`
///
/// A `Shutdown` command is honoured at every await point.
pub(crate) async fn connection_task(ctx: ConnectionContext, mut cmd_rx: mpsc::UnboundedReceiver<ConnCmd>) {
    let description = ctx.shared.description().to_string();

    loop {
        if ctx.shared.is_disconnected() {
            break;
        }
        ctx.shared.transition(ConnectionState::Connecting);

        let opened = tokio::select! {
            biased;
            _ = cmd_rx.recv() => {
                log::debug!("[kalam-notify] {}: disconnect requested while connecting", description);
                break;
            }
            result = open_transport(&ctx) => result,
        };

        let reason = match opened {
            Ok(mut conn) => {
                if !ctx.shared.transition(ConnectionState::Open) {
                    conn.close().await;
                    break;
                }
                ctx.shared.reconnect_attempts.store(0, Ordering::SeqCst);
                log::info!("[kalam-notify] {}: connected to {}", description, ctx.url);
                ctx.handlers.emit_connect();

                let reason = run_open_stream(&ctx, &mut conn, &mut cmd_rx).await;
                conn.close().await;
                ctx.handlers.emit_disconnect(disconnect_reason(&reason));
                if let TerminationReason::TransportError(msg) = &reason {
                    ctx.handlers
                        .emit_error(ConnectionError::transport(msg.clone(), ctx.auto_reconnect));
                }
                reason
            },
            Err(e) => {
                log::warn!("[kalam-notify] {}: connection attempt failed: {}", description, e);
                ctx.handlers
                    .emit_error(ConnectionError::transport(e.to_string(), ctx.auto_reconnect));
                TerminationReason::OpenFailed(e.to_string())
            },
        };

        if reason == TerminationReason::ClientDisconnect {
            break;
        }

        let after = if reason.is_error() {
            ConnectionState::Errored
        } else {
            ConnectionState::Closing
        };
        ctx.shared.transition(after);

        let attempt = ctx.shared.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
        match ctx.policy.next_delay(&reason, ctx.auto_reconnect, attempt) {
            None => {
                log::info!("[kalam-notify] {}: closed ({})", description, reason);
                ctx.shared.transition(ConnectionState::Closed);
                return;
            },
            Some(delay) => {
                log::info!(
                    "[kalam-notify] {}: {}; reconnecting in {:?} (attempt {})",
                    description,
                    reason,
                    delay,
                    attempt + 1
                );
                let reconnect_sleep = tokio::time::sleep(delay);
                tokio::pin!(reconnect_sleep);
                tokio::select! {
                    biased;
                    _ = cmd_rx.recv() => break,
                    _ = &mut reconnect_sleep => {},
                }
            },
        }
    }

    ctx.shared.transition(ConnectionState::Closed);
    log::info!("[kalam-notify] {}: closed by client", description);
}

async fn open_transport(ctx: &ConnectionContext) -> Result<Box<dyn TransportConnection>> {
    let timeout = ctx.timeouts.connection_timeout;
    if NotifyTimeouts::is_no_timeout(timeout) {
        return ctx.connector.connect(&ctx.url).await;
    }
    match tokio::time::timeout(timeout, ctx.connector.connect(&ctx.url)).await {
        Ok(result) => result,
        Err(_) => Err(NotifyError::TimeoutError(format!("Connection timeout ({:?})", timeout))),
    }
}

/// Drive an open connection until it terminates or the consumer disconnects.
async fn run_open_stream(
    ctx: &ConnectionContext,
    conn: &mut Box<dyn TransportConnection>,
    cmd_rx: &mut mpsc::UnboundedReceiver<ConnCmd>,
) -> TerminationReason {
    let description = ctx.shared.description();

    let has_keepalive = !ctx.timeouts.keepalive_interval.is_zero();
    let keepalive_dur = if has_keepalive {
        let key = keepalive_jitter_key(&ctx.url, ctx.shared.id());
        jitter_keepalive_interval(ctx.timeouts.keepalive_interval, &key)
    } else {
        FAR_FUTURE
    };
    let mut idle_deadline = TokioInstant::now() + keepalive_dur;

    // After a Ping, *some* frame must arrive within this window.
    let pong_timeout_dur = ctx.timeouts.pong_timeout;
    let has_pong_timeout = has_keepalive && !pong_timeout_dur.is_zero();
    let mut awaiting_pong = false;
    let mut pong_deadline = TokioInstant::now() + FAR_FUTURE;

    loop {
        let idle_sleep = tokio::time::sleep_until(idle_deadline);
        tokio::pin!(idle_sleep);

        let pong_sleep = tokio::time::sleep_until(pong_deadline);
        tokio::pin!(pong_sleep);

        tokio::select! {
            biased;

            _ = cmd_rx.recv() => {
                return TerminationReason::ClientDisconnect;
            }

            _ = &mut pong_sleep, if has_pong_timeout && awaiting_pong => {
                log::warn!(
                    "[kalam-notify] {}: no response to keepalive ping within {:?}",
                    description,
                    pong_timeout_dur,
                );
                return TerminationReason::TransportError(format!(
                    "Pong timeout ({:?}), server unresponsive",
                    pong_timeout_dur
                ));
            }

            _ = &mut idle_sleep, if has_keepalive && !awaiting_pong => {
                log::debug!("[kalam-notify] {}: keepalive ping", description);
                if let Err(e) = conn.ping().await {
                    return TerminationReason::TransportError(e.to_string());
                }
                if has_pong_timeout {
                    awaiting_pong = true;
                    pong_deadline = TokioInstant::now() + pong_timeout_dur;
                }
                idle_deadline = TokioInstant::now() + keepalive_dur;
            }

            frame = conn.next_frame() => {
                // Any frame proves the connection is alive.
                idle_deadline = TokioInstant::now() + keepalive_dur;
                awaiting_pong = false;
                pong_deadline = TokioInstant::now() + FAR_FUTURE;

                match frame {
                    Some(Ok(Frame::Text(text))) => dispatch_text(ctx, &text),
                    Some(Ok(Frame::Binary(data))) => dispatch_binary(ctx, &data),
                    Some(Ok(Frame::Pong)) => {
                        log::debug!("[kalam-notify] {}: keepalive pong", description);
                    },
                    Some(Ok(Frame::Close(reason))) => {
                        return TerminationReason::ServerClosed(reason);
                    },
                    Some(Err(e)) => return TerminationReason::TransportError(e.to_string()),
                    None => {
                        return TerminationReason::TransportError(
                            "Stream ended without a close frame".to_string(),
                        );
                    },
                }

                if ctx.shared.is_disconnected() {
                    return TerminationReason::ClientDisconnect;
                }
            }
        }
    }
}

fn dispatch_text(ctx: &ConnectionContext, text: &str) {
    ctx.handlers.emit_receive(text);
    let decoded = check_frame_size(text.len(), ctx.max_frame_bytes)
        .and_then(|()| decode_frame(text, ctx.mode));
    dispatch_decoded(ctx, decoded);
}

fn dispatch_binary(ctx: &ConnectionContext, data: &[u8]) {
    if ctx.handlers.on_receive.is_some() {
        ctx.handlers.emit_receive(&String::from_utf8_lossy(data));
    }
    let decoded = check_frame_size(data.len(), ctx.max_frame_bytes)
        .and_then(|()| decode_binary_frame(data, ctx.mode));
    dispatch_decoded(ctx, decoded);
}

fn dispatch_decoded(ctx: &ConnectionContext, decoded: Result<Vec<StreamMessage>>) {
    let description = ctx.shared.description();
    let messages = match decoded {
        Ok(messages) => messages,
        Err(e) => {
            log::warn!("[kalam-notify] {}: skipping frame: {}", description, e);
            ctx.handlers.emit_error(ConnectionError::decode(e.to_string()));
            return;
        },
    };

    for message in messages {
        if ctx.shared.is_disconnected() {
            log::debug!("[kalam-notify] {}: dropping message after disconnect", description);
            return;
        }
        invoke_callback(ctx, message);
    }
}

/// Run the consumer callback, containing both `Err` returns and panics.
fn invoke_callback(ctx: &ConnectionContext, message: StreamMessage) {
    let description = ctx.shared.description();
    match panic::catch_unwind(AssertUnwindSafe(|| (ctx.callback)(message))) {
        Ok(Ok(())) => {},
        Ok(Err(e)) => {
            log::error!("[kalam-notify] {}: message callback failed: {}", description, e);
        },
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!("[kalam-notify] {}: message callback panicked: {}", description, detail);
        },
    }
}

fn disconnect_reason(reason: &TerminationReason) -> DisconnectReason {
    match reason {
        TerminationReason::ClientDisconnect => {
            DisconnectReason::with_code("Client disconnected", 1000)
        },
        TerminationReason::ServerClosed(reason) => reason.clone(),
        TerminationReason::TransportError(msg) | TerminationReason::OpenFailed(msg) => {
            DisconnectReason::new(msg.clone())
        },
    }
}

/// The resolved URL alone would put two subscriptions to the same stream in
/// lockstep; the subscription id separates them.
fn keepalive_jitter_key(url: &str, id: u64) -> String {
    format!("{}#{}", url, id)
}

/// Spread keepalive pings across subscriptions to avoid synchronized bursts.
///
/// Deterministic jitter (+/-20%) derived from [`keepalive_jitter_key`], so a
/// reconnecting stream keeps its phase.
fn jitter_keepalive_interval(base: Duration, key: &str) -> Duration {
    if base.is_zero() {
        return base;
    }

    let base_ms = base.as_millis() as u64;
    if base_ms <= 1 {
        return base;
    }

    let jitter_span = (base_ms / 5).max(1);
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    let hashed = hasher.finish();

    let offset = (hashed % (2 * jitter_span + 1)) as i64 - jitter_span as i64;
    let jittered_ms = if offset >= 0 {
        base_ms.saturating_add(offset as u64)
    } else {
        base_ms.saturating_sub((-offset) as u64).max(1)
    };

    Duration::from_millis(jittered_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording_shared() -> (Arc<ConnectionShared>, Arc<Mutex<Vec<ConnectionState>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handlers = EventHandlers::new().on_state_change(move |s| sink.lock().unwrap().push(s));
        (Arc::new(ConnectionShared::new("test".into(), handlers)), seen)
    }

    #[test]
    fn test_transition_publishes_and_sets_connected_flag() {
        let (shared, seen) = recording_shared();
        assert!(shared.transition(ConnectionState::Connecting));
        assert!(!shared.is_connected());
        assert!(shared.transition(ConnectionState::Open));
        assert!(shared.is_connected());
        assert!(shared.transition(ConnectionState::Errored));
        assert!(!shared.is_connected());
        assert_eq!(
            *seen.lock().unwrap(),
            [ConnectionState::Connecting, ConnectionState::Open, ConnectionState::Errored]
        );
    }

    #[test]
    fn test_closed_is_absorbing_after_disconnect() {
        let (shared, seen) = recording_shared();
        shared.transition(ConnectionState::Open);
        assert!(shared.mark_disconnected());
        assert!(!shared.mark_disconnected(), "second disconnect is a no-op");

        assert!(!shared.transition(ConnectionState::Connecting));
        assert!(!shared.transition(ConnectionState::Open));
        assert!(shared.transition(ConnectionState::Closed));
        assert_eq!(shared.state(), ConnectionState::Closed);
        assert!(!shared.is_connected());
        assert_eq!(*seen.lock().unwrap(), [ConnectionState::Open, ConnectionState::Closed]);
    }

    #[test]
    fn test_keepalive_jitter_is_deterministic() {
        let base = Duration::from_secs(20);
        let key = keepalive_jitter_key("ws://localhost:8080/v1/ws/logs", 7);
        let a = jitter_keepalive_interval(base, &key);
        let b = jitter_keepalive_interval(base, &key);
        assert_eq!(a, b, "jitter must be stable for the same stream");
    }

    #[test]
    fn test_keepalive_jitter_stays_within_bounds() {
        let base = Duration::from_secs(20);
        for key in ["a", "b", "cluster topology", "io stats: orders"] {
            let jittered = jitter_keepalive_interval(base, key);
            assert!(
                jittered >= Duration::from_secs(16) && jittered <= Duration::from_secs(24),
                "jittered interval {:?} out of bounds",
                jittered
            );
        }
        assert_eq!(jitter_keepalive_interval(Duration::ZERO, "a"), Duration::ZERO);
    }

    #[test]
    fn test_same_stream_subscriptions_get_distinct_ids_and_phases() {
        let first = ConnectionShared::new("server logs".into(), EventHandlers::new());
        let second = ConnectionShared::new("server logs".into(), EventHandlers::new());
        assert_ne!(first.id(), second.id());

        let base = Duration::from_secs(10);
        let url = "ws://localhost:8080/v1/ws/logs";
        let intervals: std::collections::HashSet<Duration> = (0..20)
            .map(|id| jitter_keepalive_interval(base, &keepalive_jitter_key(url, id)))
            .collect();
        assert!(intervals.len() > 1, "subscriptions to one URL ping in lockstep");
    }

    #[test]
    fn test_disconnect_reason_mapping() {
        assert_eq!(
            disconnect_reason(&TerminationReason::ClientDisconnect).code,
            Some(1000)
        );
        let server = DisconnectReason::with_code("going away", 1001);
        assert_eq!(
            disconnect_reason(&TerminationReason::ServerClosed(server.clone())),
            server
        );
        assert_eq!(
            disconnect_reason(&TerminationReason::OpenFailed("refused".into())).message,
            "refused"
        );
    }
}
