//! Field rules ("enchantments")

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What happens to a field when the principal holds none of its permissions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialMode {
    /// Field stays visible but cannot be edited
    #[default]
    Disable,
    /// Field is not shown at all
    Hide,
}

impl DenialMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialMode::Disable => "disable",
            DenialMode::Hide => "hide",
        }
    }
}

impl fmt::Display for DenialMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DenialMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disable" => Ok(DenialMode::Disable),
            "hide" => Ok(DenialMode::Hide),
            other => Err(format!("unknown denial mode '{}'", other)),
        }
    }
}

/// The configured policy for one ticket field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Field name as configured
    pub name: String,

    /// Tokens of which the principal must hold at least one (empty = none required)
    #[serde(default)]
    pub required_permissions: Vec<String>,

    #[serde(default)]
    pub disabled: bool,

    #[serde(default)]
    pub hidden: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip: Option<String>,

    /// Only consulted when `required_permissions` is non-empty
    #[serde(default)]
    pub on_denial: DenialMode,
}

impl FieldRule {
    /// Create a rule with no restrictions
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_permissions: Vec::new(),
            disabled: false,
            hidden: false,
            label: None,
            notice: None,
            tip: None,
            on_denial: DenialMode::Disable,
        }
    }

    pub fn with_permissions<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_permissions = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }

    pub fn with_tip(mut self, tip: impl Into<String>) -> Self {
        self.tip = Some(tip.into());
        self
    }

    pub fn on_denial(mut self, mode: DenialMode) -> Self {
        self.on_denial = mode;
        self
    }

    /// True if this rule names the given ticket field (case-insensitive)
    pub fn applies_to(&self, field: &str) -> bool {
        self.name.eq_ignore_ascii_case(field)
    }

    pub fn requires_permission(&self) -> bool {
        !self.required_permissions.is_empty()
    }

    /// Label to display for the field
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}
