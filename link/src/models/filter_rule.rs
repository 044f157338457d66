use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::NotifyError;

/// Whether matching events are pushed (`Include`) or suppressed (`Exclude`).
///
/// On the wire, `Include` rules become repeated `only=` query parameters and
/// `Exclude` rules become repeated `except=` parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    Include,
    Exclude,
}

impl FilterMode {
    /// Query parameter name this mode is encoded under.
    pub fn query_key(self) -> &'static str {
        match self {
            FilterMode::Include => "only",
            FilterMode::Exclude => "except",
        }
    }

    /// Inverse of [`query_key`](Self::query_key).
    pub fn from_query_key(key: &str) -> Option<Self> {
        match key {
            "only" => Some(FilterMode::Include),
            "except" => Some(FilterMode::Exclude),
            _ => None,
        }
    }
}

/// Server-side match criteria for one rule, e.g. a log source such as
/// `Server` or a dotted logger path such as `Server.Cluster.Raft`.
///
/// The pattern is sent verbatim (form-encoded); the server owns its
/// interpretation. Empty patterns are rejected because the server would
/// read them as "match everything".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MatchPattern(String);

impl MatchPattern {
    pub fn new(pattern: impl Into<String>) -> Result<Self, NotifyError> {
        let pattern = pattern.into();
        if pattern.trim().is_empty() {
            return Err(NotifyError::ConfigurationError(
                "Filter pattern must not be empty".to_string(),
            ));
        }
        Ok(Self(pattern))
    }

    /// Build a dotted pattern from path segments (`["Server", "Cluster"]`
    /// becomes `Server.Cluster`).
    pub fn from_segments<I, S>(segments: I) -> Result<Self, NotifyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = segments
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(".");
        Self::new(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MatchPattern {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for MatchPattern {
    type Error = NotifyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MatchPattern> for String {
    fn from(value: MatchPattern) -> Self {
        value.0
    }
}

/// One include/exclude criterion narrowing which events the server pushes.
///
/// # Example
///
/// ```rust
/// use kalam_notify::{FilterMode, FilterRule};
///
/// let rule = FilterRule::include("Server").unwrap();
/// assert_eq!(rule.mode, FilterMode::Include);
/// assert_eq!(rule.pattern.as_str(), "Server");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterRule {
    pub mode: FilterMode,
    pub pattern: MatchPattern,
}

impl FilterRule {
    pub fn new(mode: FilterMode, pattern: MatchPattern) -> Self {
        Self { mode, pattern }
    }

    pub fn include(pattern: impl Into<String>) -> Result<Self, NotifyError> {
        Ok(Self::new(FilterMode::Include, MatchPattern::new(pattern)?))
    }

    pub fn exclude(pattern: impl Into<String>) -> Result<Self, NotifyError> {
        Ok(Self::new(FilterMode::Exclude, MatchPattern::new(pattern)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_keys_round_trip() {
        for mode in [FilterMode::Include, FilterMode::Exclude] {
            assert_eq!(FilterMode::from_query_key(mode.query_key()), Some(mode));
        }
        assert_eq!(FilterMode::from_query_key("from"), None);
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(MatchPattern::new("").is_err());
        assert!(MatchPattern::new("   ").is_err());
        assert!(FilterRule::exclude("").is_err());
    }

    #[test]
    fn test_from_segments_joins_with_dots() {
        let pattern = MatchPattern::from_segments(["Server", "Cluster", "Raft"]).unwrap();
        assert_eq!(pattern.as_str(), "Server.Cluster.Raft");
    }

    #[test]
    fn test_rule_serde_shape() {
        let rule = FilterRule::exclude("Voron").unwrap();
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json, serde_json::json!({"mode": "exclude", "pattern": "Voron"}));

        let back: FilterRule = serde_json::from_value(json).unwrap();
        assert_eq!(back, rule);

        let bad = serde_json::from_value::<FilterRule>(
            serde_json::json!({"mode": "include", "pattern": ""}),
        );
        assert!(bad.is_err());
    }
}
