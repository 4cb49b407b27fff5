//! Immutable policy configuration
//!
//! A [`PolicyConfig`] is built once from the raw settings section and then
//! shared read-only by every evaluation session. Reloading means building a
//! new instance.
//!
//! Malformed settings never abort the build. Each problem is resolved to its
//! safe default, logged, and kept as a [`ConfigIssue`] so operators (or a
//! strict loader) can act on it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::rule::{DenialMode, FieldRule};

/// Raw key/value settings of the policy section
pub type PolicySettings = BTreeMap<String, String>;

/// Setting holding the comma-separated list of configured fields
pub const TWEAKS_KEY: &str = "tweaks";
/// Setting holding extra grantable permission tokens
pub const PERMISSIONS_KEY: &str = "permissions";
/// Setting holding the display color for disabled fields
pub const GRAY_DISABLED_KEY: &str = "gray_disabled";
/// Prefix of the ticket-type gating settings
pub const TICKET_TYPE_PREFIX: &str = "ticket_type.";

/// A configuration problem found while building the policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigIssue {
    pub key: String,
    pub message: String,
}

/// Read-only description of all field rules and ticket-type gates
#[derive(Debug, Clone, Default)]
pub struct PolicyConfig {
    /// Rules in configured order
    rules: Vec<FieldRule>,

    /// Lower-cased ticket type -> gating permission
    ticket_types: BTreeMap<String, String>,

    /// Extra grantable tokens declared by this policy (upper-cased)
    declared_permissions: Vec<String>,

    gray_disabled: Option<String>,

    issues: Vec<ConfigIssue>,
}

impl PolicyConfig {
    /// Create an empty policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a policy from the raw settings section
    pub fn from_settings(settings: &PolicySettings) -> Self {
        // Option names are case-insensitive in the host configuration
        let settings: BTreeMap<String, &str> = settings
            .iter()
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.as_str()))
            .collect();

        let mut config = Self::default();

        let tweaks = settings.get(TWEAKS_KEY).copied().unwrap_or("");
        debug!(tweaks, "Loading field rules");

        for name in split_list(tweaks) {
            if config.field_rule(name).is_some() {
                config.record_issue(TWEAKS_KEY, format!("field '{}' listed more than once", name));
                continue;
            }
            let rule = config.parse_rule(&settings, name);
            config.rules.push(rule);
        }

        for (key, value) in &settings {
            let Some(ticket_type) = key.strip_prefix(TICKET_TYPE_PREFIX) else {
                continue;
            };
            if ticket_type.is_empty() {
                config.record_issue(key, "ticket type name is empty".to_string());
                continue;
            }
            if let Some(token) = non_empty(value) {
                config
                    .ticket_types
                    .insert(ticket_type.to_string(), token.to_string());
            }
        }

        for token in split_list(settings.get(PERMISSIONS_KEY).copied().unwrap_or("")) {
            let token = token.to_ascii_uppercase();
            if !config.declared_permissions.contains(&token) {
                config.declared_permissions.push(token);
            }
        }

        config.gray_disabled = settings
            .get(GRAY_DISABLED_KEY)
            .and_then(|v| non_empty(v))
            .map(str::to_string);

        debug!(
            fields = config.rules.len(),
            ticket_types = config.ticket_types.len(),
            declared = config.declared_permissions.len(),
            issues = config.issues.len(),
            "Policy loaded"
        );

        config
    }

    fn parse_rule(&mut self, settings: &BTreeMap<String, &str>, name: &str) -> FieldRule {
        let prefix = name.to_ascii_lowercase();
        let get = |suffix: &str| settings.get(&format!("{}.{}", prefix, suffix)).copied();

        let mut rule = FieldRule::new(name);

        if let Some(raw) = get("permission") {
            let key = format!("{}.permission", prefix);
            if !raw.trim().is_empty() && split_list(raw).next().is_none() {
                self.record_issue(&key, "permission list contains no tokens".to_string());
            } else if raw.split(',').any(|t| t.trim().is_empty()) && !raw.trim().is_empty() {
                self.record_issue(&key, "blank permission token ignored".to_string());
            }
            for token in split_list(raw) {
                let token = token.to_ascii_uppercase();
                if !rule.required_permissions.contains(&token) {
                    rule.required_permissions.push(token);
                }
            }
        }

        rule.disabled = self.parse_flag(&format!("{}.disable", prefix), get("disable"));
        rule.hidden = self.parse_flag(&format!("{}.hide", prefix), get("hide"));
        rule.label = get("label").and_then(non_empty).map(str::to_string);
        rule.notice = get("notice").and_then(non_empty).map(str::to_string);
        rule.tip = get("tip").and_then(non_empty).map(str::to_string);

        if let Some(raw) = get("ondenial").and_then(non_empty) {
            let key = format!("{}.ondenial", prefix);
            match raw.parse::<DenialMode>() {
                Ok(mode) => rule.on_denial = mode,
                Err(reason) => {
                    self.record_issue(&key, format!("{}, using '{}'", reason, DenialMode::Disable));
                    rule.on_denial = DenialMode::Disable;
                }
            }
            if !rule.requires_permission() {
                debug!(field = name, "ondenial set without a permission; it has no effect");
            }
        }

        rule
    }

    fn parse_flag(&mut self, key: &str, raw: Option<&str>) -> bool {
        let Some(raw) = raw else {
            return false;
        };
        match parse_bool(raw) {
            Some(value) => value,
            None => {
                self.record_issue(key, format!("'{}' is not a boolean, using false", raw));
                false
            }
        }
    }

    fn record_issue(&mut self, key: &str, message: String) {
        warn!(key, "{}", message);
        self.issues.push(ConfigIssue {
            key: key.to_string(),
            message,
        });
    }

    /// Add a rule (replacing any rule for the same field)
    pub fn with_rule(mut self, rule: FieldRule) -> Self {
        match self.rules.iter().position(|r| r.applies_to(&rule.name)) {
            Some(index) => self.rules[index] = rule,
            None => self.rules.push(rule),
        }
        self
    }

    /// Gate a ticket type behind a permission; a blank permission is no gate
    pub fn with_ticket_type(mut self, ticket_type: &str, permission: impl Into<String>) -> Self {
        let permission = permission.into();
        match non_empty(&permission) {
            Some(token) => {
                self.ticket_types
                    .insert(ticket_type.to_ascii_lowercase(), token.to_string());
            }
            None => {
                self.ticket_types.remove(&ticket_type.to_ascii_lowercase());
            }
        }
        self
    }

    /// Declare an extra grantable permission
    pub fn with_declared_permission(mut self, token: &str) -> Self {
        let token = token.to_ascii_uppercase();
        if !self.declared_permissions.contains(&token) {
            self.declared_permissions.push(token);
        }
        self
    }

    /// Look up the rule for a ticket field (case-insensitive)
    pub fn field_rule(&self, name: &str) -> Option<&FieldRule> {
        self.rules.iter().find(|r| r.applies_to(name))
    }

    /// All rules in configured order
    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Gating permission for a ticket type, if any
    pub fn permission_for_ticket_type(&self, ticket_type: &str) -> Option<&str> {
        self.ticket_types
            .get(&ticket_type.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Tokens this policy declares, for registration as grantable actions
    pub fn permission_actions(&self) -> &[String] {
        &self.declared_permissions
    }

    /// Whether `token` is one of the declared tokens (case-insensitive)
    pub fn declares_permission(&self, token: &str) -> bool {
        self.declared_permissions
            .iter()
            .any(|p| p.eq_ignore_ascii_case(token.trim()))
    }

    /// Display color for disabled labels, if configured
    pub fn gray_disabled(&self) -> Option<&str> {
        self.gray_disabled.as_deref()
    }

    /// Problems found while building from settings
    pub fn issues(&self) -> &[ConfigIssue] {
        &self.issues
    }
}

/// Split a comma-separated list, dropping blank entries
fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn non_empty(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Lenient boolean spelling used by the host configuration
fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "enabled" | "on" | "aye" | "1" => Some(true),
        "no" | "false" | "disabled" | "off" | "0" | "" => Some(false),
        _ => None,
    }
}
