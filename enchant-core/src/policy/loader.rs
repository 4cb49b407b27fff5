//! Policy Loader
//!
//! Reads the raw policy settings from a JSON object, either in memory or
//! from a file, and builds a [`PolicyConfig`]. Scalar values are accepted
//! in their natural JSON form (`"hide": true`), and string arrays are joined
//! into the comma-separated form the settings use.

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::{EnchantError, Result};

use super::config::{PolicyConfig, PolicySettings};

/// Loader that turns raw settings into a [`PolicyConfig`]
#[derive(Debug, Clone, Default)]
pub struct PolicyLoader {
    /// Reject settings that produced configuration issues
    strict: bool,
}

impl PolicyLoader {
    /// Create a lenient loader
    pub fn new() -> Self {
        Self { strict: false }
    }

    /// Fail on configuration issues instead of falling back to defaults
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Build a policy from already parsed settings
    pub fn load_settings(&self, settings: &PolicySettings) -> Result<PolicyConfig> {
        let config = PolicyConfig::from_settings(settings);

        if self.strict {
            if let Some(issue) = config.issues().first() {
                return Err(EnchantError::InvalidConfig {
                    key: issue.key.clone(),
                    reason: issue.message.clone(),
                });
            }
        }

        Ok(config)
    }

    /// Build a policy from a JSON object string
    pub fn load_from_json(&self, json: &str) -> Result<PolicyConfig> {
        let value: Value = serde_json::from_str(json)?;
        let settings = settings_from_value(&value)?;
        self.load_settings(&settings)
    }

    /// Build a policy from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<PolicyConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| EnchantError::ConfigLoadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let value: Value = serde_json::from_str(&content).map_err(|e| {
            EnchantError::ConfigLoadError {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        let settings = settings_from_value(&value)?;
        self.load_settings(&settings)
    }
}

/// Flatten a JSON object into raw settings
pub fn settings_from_value(value: &Value) -> Result<PolicySettings> {
    let object = value.as_object().ok_or_else(|| EnchantError::InvalidConfig {
        key: "<root>".to_string(),
        reason: "policy settings must be a JSON object".to_string(),
    })?;

    let mut settings = PolicySettings::new();
    for (key, value) in object {
        let raw = match value {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Array(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_str() {
                        Some(s) => parts.push(s),
                        None => {
                            return Err(EnchantError::InvalidConfig {
                                key: key.clone(),
                                reason: "list entries must be strings".to_string(),
                            })
                        }
                    }
                }
                parts.join(",")
            }
            Value::Object(_) => {
                return Err(EnchantError::InvalidConfig {
                    key: key.clone(),
                    reason: "nested objects are not allowed".to_string(),
                })
            }
        };
        settings.insert(key.clone(), raw);
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::DenialMode;

    #[test]
    fn test_load_from_json() {
        let json = r#"{
            "tweaks": ["milestone", "severity"],
            "milestone.permission": "MILESTONE_EDIT",
            "milestone.ondenial": "hide",
            "severity.hide": true,
            "ticket_type.security": "SECURITY_VIEW",
            "unused": null
        }"#;

        let config = PolicyLoader::new().load_from_json(json).unwrap();
        assert_eq!(config.rules().len(), 2);
        assert_eq!(config.field_rule("milestone").unwrap().on_denial, DenialMode::Hide);
        assert!(config.field_rule("severity").unwrap().hidden);
        assert_eq!(config.permission_for_ticket_type("security"), Some("SECURITY_VIEW"));
    }

    #[test]
    fn test_non_object_is_rejected() {
        let err = PolicyLoader::new().load_from_json("[1, 2]").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_nested_object_is_rejected() {
        let err = PolicyLoader::new()
            .load_from_json(r#"{"milestone": {"hide": true}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("milestone"));
    }

    #[test]
    fn test_strict_loader_rejects_issues() {
        let json = r#"{"tweaks": "milestone", "milestone.ondenial": "vanish"}"#;

        let lenient = PolicyLoader::new().load_from_json(json).unwrap();
        assert_eq!(lenient.issues().len(), 1);

        let err = PolicyLoader::new().strict().load_from_json(json).unwrap_err();
        match err {
            EnchantError::InvalidConfig { key, .. } => assert_eq!(key, "milestone.ondenial"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = PolicyLoader::new()
            .load_from_file("/nonexistent/enchant-policy.json")
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_LOAD_ERROR");
    }
}
