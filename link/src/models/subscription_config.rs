use serde::{Deserialize, Serialize};

use super::filter_rule::{FilterMode, FilterRule};

/// Filters and stream-specific parameters for one notification subscription.
///
/// Owned by the consumer; the subscription keeps a shared read-only copy and
/// encodes it into the connection URL on every (re)connect, so the same
/// filters apply across reconnects.
///
/// Scalar parameters keep their insertion order. A parameter whose value is
/// `None` is kept in the config but never encoded.
///
/// # Example
///
/// ```rust
/// use kalam_notify::{FilterRule, SubscriptionConfig};
///
/// let config = SubscriptionConfig::new()
///     .with_rule(FilterRule::include("Server").unwrap())
///     .with_rule(FilterRule::exclude("Server.Voron").unwrap())
///     .with_optional_param("from", Some(1_700_000_000_000u64));
///
/// assert_eq!(config.rules().len(), 2);
/// assert_eq!(config.param("from"), Some("1700000000000"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    #[serde(default)]
    rules: Vec<FilterRule>,
    #[serde(default)]
    params: Vec<(String, Option<String>)>,
}

impl SubscriptionConfig {
    /// Empty configuration: no filters, no parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter rule.
    pub fn with_rule(mut self, rule: FilterRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Append several filter rules, preserving their order.
    pub fn with_rules(mut self, rules: impl IntoIterator<Item = FilterRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Set a scalar parameter. Setting an existing name replaces its value
    /// in place.
    pub fn with_param(self, name: impl Into<String>, value: impl ToString) -> Self {
        self.with_optional_param(name, Some(value))
    }

    /// Set a scalar parameter that may be absent. `None` values are omitted
    /// from the connection URL.
    pub fn with_optional_param<V: ToString>(
        mut self,
        name: impl Into<String>,
        value: Option<V>,
    ) -> Self {
        let name = name.into();
        let value = value.map(|v| v.to_string());
        match self.params.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.params.push((name, value)),
        }
        self
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    /// Rules of one mode, in their original relative order.
    pub fn rules_by_mode(&self, mode: FilterMode) -> impl Iterator<Item = &FilterRule> + '_ {
        self.rules.iter().filter(move |rule| rule.mode == mode)
    }

    /// All scalar parameters, including absent ones.
    pub fn params(&self) -> &[(String, Option<String>)] {
        &self.params
    }

    /// Value of a present scalar parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(existing, _)| existing == name)
            .and_then(|(_, value)| value.as_deref())
    }

    /// Returns `true` when neither filters nor present parameters are set.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.params.iter().all(|(_, v)| v.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_by_mode_preserves_order() {
        let config = SubscriptionConfig::new().with_rules([
            FilterRule::include("a").unwrap(),
            FilterRule::exclude("x").unwrap(),
            FilterRule::include("b").unwrap(),
            FilterRule::exclude("y").unwrap(),
        ]);

        let only: Vec<_> = config
            .rules_by_mode(FilterMode::Include)
            .map(|r| r.pattern.as_str())
            .collect();
        let except: Vec<_> = config
            .rules_by_mode(FilterMode::Exclude)
            .map(|r| r.pattern.as_str())
            .collect();
        assert_eq!(only, ["a", "b"]);
        assert_eq!(except, ["x", "y"]);
    }

    #[test]
    fn test_param_replaced_in_place() {
        let config = SubscriptionConfig::new()
            .with_param("from", 1)
            .with_param("type", "Docs")
            .with_param("from", 2);
        assert_eq!(config.params().len(), 2);
        assert_eq!(config.params()[0], ("from".to_string(), Some("2".to_string())));
    }

    #[test]
    fn test_absent_param_is_not_readable() {
        let config = SubscriptionConfig::new().with_optional_param::<u64>("from", None);
        assert_eq!(config.param("from"), None);
        assert!(config.is_empty());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: SubscriptionConfig =
            serde_json::from_str(r#"{"rules":[{"mode":"include","pattern":"Server"}]}"#)
                .unwrap();
        assert_eq!(config.rules().len(), 1);
        assert!(config.params().is_empty());
    }
}
