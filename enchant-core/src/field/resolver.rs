//! Effective field state
//!
//! Precedence, highest first:
//!
//! 1. `hidden` hides the field for everyone
//! 2. missing every required permission applies the rule's denial mode
//! 3. `disabled` makes the field read-only
//! 4. otherwise the field is visible and editable

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::perm::PrincipalContext;
use crate::policy::{DenialMode, FieldRule, PolicyConfig};
use crate::ticket::ResourceRef;

/// How a field should be presented and whether it may change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEffectiveState {
    pub field: String,
    pub editable: bool,
    pub visible: bool,
    pub effective_label: String,

    /// Set when the field is read-only for lack of permission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denial_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip: Option<String>,
}

impl FieldEffectiveState {
    /// Shown, but not editable
    pub fn is_disabled(&self) -> bool {
        self.visible && !self.editable
    }
}

/// Resolve the effective state of one field
///
/// Deterministic for a deterministic `principal`. Permission membership is
/// scoped to `ticket`.
pub fn resolve(
    rule: &FieldRule,
    principal: &dyn PrincipalContext,
    ticket: Option<&ResourceRef>,
) -> FieldEffectiveState {
    let mut state = FieldEffectiveState {
        field: rule.name.clone(),
        editable: true,
        visible: true,
        effective_label: rule.display_label().to_string(),
        denial_reason: None,
        notice: rule.notice.clone(),
        tip: rule.tip.clone(),
    };

    if rule.hidden {
        state.visible = false;
        state.editable = false;
        return state;
    }

    if rule.requires_permission() && !principal.holds_any(&rule.required_permissions, ticket) {
        state.editable = false;
        state.visible = rule.on_denial != DenialMode::Hide;
        state.denial_reason = Some(format!(
            "missing permission: {}",
            rule.required_permissions.join(", ")
        ));
        return state;
    }

    if rule.disabled {
        state.editable = false;
    }

    state
}

/// Resolves field states against a shared policy
#[derive(Debug, Clone)]
pub struct FieldPolicyResolver {
    config: Arc<PolicyConfig>,
}

impl FieldPolicyResolver {
    pub fn new(config: Arc<PolicyConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// State of a configured field; `None` if no rule names it
    pub fn resolve_field(
        &self,
        field: &str,
        principal: &dyn PrincipalContext,
        ticket: Option<&ResourceRef>,
    ) -> Option<FieldEffectiveState> {
        self.config
            .field_rule(field)
            .map(|rule| resolve(rule, principal, ticket))
    }

    /// States of every configured field, in configured order
    pub fn resolve_all(
        &self,
        principal: &dyn PrincipalContext,
        ticket: Option<&ResourceRef>,
    ) -> Vec<FieldEffectiveState> {
        self.config
            .rules()
            .iter()
            .map(|rule| resolve(rule, principal, ticket))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perm::StaticPrincipal;

    fn nobody() -> StaticPrincipal {
        StaticPrincipal::new("nobody")
    }

    #[test]
    fn test_hidden_wins_over_everything() {
        let rule = FieldRule::new("severity")
            .hidden()
            .disabled()
            .with_permissions(["SEVERITY_EDIT"]);
        let holder = StaticPrincipal::new("alice").with_permission("SEVERITY_EDIT");

        for principal in [&nobody(), &holder] {
            let state = resolve(&rule, principal, None);
            assert!(!state.visible);
            assert!(!state.editable);
            assert!(state.denial_reason.is_none());
        }
    }

    #[test]
    fn test_unrestricted_field_is_editable() {
        let state = resolve(&FieldRule::new("summary"), &nobody(), None);
        assert!(state.visible);
        assert!(state.editable);
        assert_eq!(state.effective_label, "summary");
    }

    #[test]
    fn test_denial_disables_by_default() {
        let rule = FieldRule::new("milestone").with_permissions(["MILESTONE_EDIT"]);
        let state = resolve(&rule, &nobody(), None);

        assert!(state.is_disabled());
        assert_eq!(
            state.denial_reason.as_deref(),
            Some("missing permission: MILESTONE_EDIT")
        );
    }

    #[test]
    fn test_denial_can_hide() {
        let rule = FieldRule::new("milestone")
            .with_permissions(["MILESTONE_EDIT"])
            .on_denial(DenialMode::Hide);
        let state = resolve(&rule, &nobody(), None);

        assert!(!state.visible);
        assert!(!state.editable);
        assert!(state.denial_reason.is_some());
    }

    #[test]
    fn test_any_permission_satisfies() {
        let rule = FieldRule::new("milestone").with_permissions(["MILESTONE_EDIT", "TRAC_ADMIN"]);
        let admin = StaticPrincipal::new("root").with_permission("TRAC_ADMIN");

        let state = resolve(&rule, &admin, None);
        assert!(state.editable);
        assert!(state.denial_reason.is_none());
    }

    #[test]
    fn test_static_disable_after_permission() {
        let rule = FieldRule::new("owner")
            .disabled()
            .with_permissions(["OWNER_EDIT"])
            .with_label("Assignee")
            .with_notice("Set by triage")
            .with_tip("Who works on it");
        let holder = StaticPrincipal::new("alice").with_permission("OWNER_EDIT");

        let state = resolve(&rule, &holder, None);
        assert!(state.is_disabled());
        assert!(state.denial_reason.is_none());
        assert_eq!(state.effective_label, "Assignee");
        assert_eq!(state.notice.as_deref(), Some("Set by triage"));
        assert_eq!(state.tip.as_deref(), Some("Who works on it"));
    }

    #[test]
    fn test_membership_is_scoped_to_ticket() {
        let rule = FieldRule::new("milestone").with_permissions(["MILESTONE_EDIT"]);
        let principal = nobody().with_ticket_permission("7", "MILESTONE_EDIT");

        assert!(resolve(&rule, &principal, Some(&ResourceRef::ticket("7"))).editable);
        assert!(!resolve(&rule, &principal, Some(&ResourceRef::ticket("8"))).editable);
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let rule = FieldRule::new("milestone").with_permissions(["MILESTONE_EDIT"]);
        let principal = nobody();
        let ticket = ResourceRef::ticket("1");

        assert_eq!(
            resolve(&rule, &principal, Some(&ticket)),
            resolve(&rule, &principal, Some(&ticket))
        );
    }

    #[test]
    fn test_resolver_over_config() {
        let config = PolicyConfig::new()
            .with_rule(FieldRule::new("severity").hidden())
            .with_rule(FieldRule::new("milestone").with_permissions(["MILESTONE_EDIT"]));
        let resolver = FieldPolicyResolver::new(Arc::new(config));

        let states = resolver.resolve_all(&nobody(), None);
        let fields: Vec<_> = states.iter().map(|s| s.field.as_str()).collect();
        assert_eq!(fields, vec!["severity", "milestone"]);

        assert!(resolver.resolve_field("Milestone", &nobody(), None).is_some());
        assert!(resolver.resolve_field("summary", &nobody(), None).is_none());
    }
}
