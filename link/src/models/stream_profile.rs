use serde::{Deserialize, Serialize};

use super::stream_message::FrameMode;

/// Describes one kind of notification stream: where it lives, how its
/// frames are decoded, and whether it may silently reconnect.
///
/// Every stream the dashboard consumes is the same client configured with a
/// different profile.
///
/// # Example
///
/// ```rust
/// use kalam_notify::{FrameMode, StreamProfile};
///
/// let logs = StreamProfile::server_logs();
/// assert_eq!(logs.mode, FrameMode::Raw);
/// assert!(logs.auto_reconnect);
///
/// let stats = StreamProfile::io_stats("orders");
/// assert!(!stats.auto_reconnect);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamProfile {
    /// Human-readable label used in logs and diagnostics only.
    pub description: String,
    /// Server route, relative to the base URL.
    pub route: String,
    pub mode: FrameMode,
    /// Whether this stream type may reconnect after a termination it did
    /// not request. One-shot streams set this to `false`.
    pub auto_reconnect: bool,
}

impl StreamProfile {
    /// Custom profile. Reconnection is enabled; see
    /// [`with_auto_reconnect`](Self::with_auto_reconnect).
    pub fn new(description: impl Into<String>, route: impl Into<String>, mode: FrameMode) -> Self {
        Self {
            description: description.into(),
            route: route.into(),
            mode,
            auto_reconnect: true,
        }
    }

    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Server log tail. Each frame is one formatted log line.
    pub fn server_logs() -> Self {
        Self::new("server logs", "/admin/logs/watch", FrameMode::Raw)
    }

    /// Cluster topology change notifications.
    pub fn cluster_topology() -> Self {
        Self::new("cluster topology", "/cluster-topology/watch", FrameMode::Json)
    }

    /// Document/index change notifications for one database.
    pub fn database_changes(database: &str) -> Self {
        Self::new(
            format!("database changes: {}", database),
            format!("/databases/{}/changes", database),
            FrameMode::Json,
        )
    }

    /// Live I/O statistics for one database. The dashboard samples a single
    /// window per session, so this stream never reconnects on its own.
    pub fn io_stats(database: &str) -> Self {
        Self::new(
            format!("io stats: {}", database),
            format!("/databases/{}/debug/io-metrics/live", database),
            FrameMode::Json,
        )
        .with_auto_reconnect(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_profiles() {
        let changes = StreamProfile::database_changes("orders");
        assert_eq!(changes.route, "/databases/orders/changes");
        assert_eq!(changes.description, "database changes: orders");
        assert_eq!(changes.mode, FrameMode::Json);
        assert!(changes.auto_reconnect);

        assert_eq!(StreamProfile::cluster_topology().mode, FrameMode::Json);
        assert!(!StreamProfile::io_stats("orders").auto_reconnect);
    }

    #[test]
    fn test_custom_profile_override() {
        let profile = StreamProfile::new("replication", "/replication/watch", FrameMode::Json)
            .with_auto_reconnect(false);
        assert!(!profile.auto_reconnect);
    }
}
