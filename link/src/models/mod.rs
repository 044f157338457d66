//! Data models for kalam-notify.
//!
//! Filter rules, subscription configuration, stream profiles, connection
//! options, lifecycle states and dispatched messages.

pub mod connection_options;
pub mod connection_state;
pub mod filter_rule;
pub mod stream_message;
pub mod stream_profile;
pub mod subscription_config;

pub use connection_options::ConnectionOptions;
pub use connection_state::ConnectionState;
pub use filter_rule::{FilterMode, FilterRule, MatchPattern};
pub use stream_message::{FrameMode, MessageKind, StreamMessage};
pub use stream_profile::StreamProfile;
pub use subscription_config::SubscriptionConfig;
