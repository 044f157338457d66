//! # kalam-notify
//!
//! Resilient client for server-pushed notification streams: server log
//! tails, cluster topology changes, per-database change feeds and live I/O
//! statistics.
//!
//! Every stream is the same [`NotificationSubscription`] configured with a
//! different [`StreamProfile`]. A subscription resolves its WebSocket URL
//! (filter rules become `only=` / `except=` query parameters), keeps the
//! connection alive, decodes each frame (verbatim text, or JSON with
//! top-level arrays split into one message per element) and reconnects on
//! its own after network trouble until it is explicitly disconnected.
//!
//! # Example
//!
//! ```rust,no_run
//! use kalam_notify::{
//!     EventHandlers, FilterRule, NotificationSubscription, StreamProfile, SubscriptionConfig,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let topology = NotificationSubscription::builder()
//!     .base_url("https://db.example.com")
//!     .profile(StreamProfile::cluster_topology())
//!     .config(SubscriptionConfig::new().with_rule(FilterRule::include("TopologyChanged")?))
//!     .event_handlers(EventHandlers::new().on_error(|e| eprintln!("{}", e)))
//!     .on_message(|message| {
//!         if let Some(json) = message.as_json() {
//!             println!("topology: {}", json);
//!         }
//!         Ok(())
//!     })
//!     .build()?;
//!
//! topology.connect()?;
//! # Ok(())
//! # }
//! ```

mod connection;
pub mod decoder;
pub mod endpoint;
pub mod error;
pub mod event_handlers;
pub mod models;
pub mod reconnect;
pub mod subscription;
pub mod timeouts;
pub mod transport;

pub use connection::{CallbackError, CallbackResult, MessageCallback};
pub use decoder::{decode_binary_frame, decode_frame};
pub use endpoint::resolve_endpoint;
pub use error::{NotifyError, Result};
pub use event_handlers::{ConnectionError, DisconnectReason, ErrorKind, EventHandlers};
pub use models::{
    ConnectionOptions, ConnectionState, FilterMode, FilterRule, FrameMode, MatchPattern,
    MessageKind, StreamMessage, StreamProfile, SubscriptionConfig,
};
pub use reconnect::{ReconnectPolicy, TerminationReason};
pub use subscription::{NotificationSubscription, NotificationSubscriptionBuilder, SubscriptionHandle};
pub use timeouts::{NotifyTimeouts, NotifyTimeoutsBuilder};
pub use transport::{Connector, Frame, TransportConnection, WebSocketConnector};
