//! Ticket mutation validation
//!
//! A submitted ticket is compared against its authoritative prior state.
//! Any change to a field the principal may not edit is a violation, as is
//! submitting a ticket of a type the principal may not use. Violations are
//! ordinary results, never errors.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::perm::PrincipalContext;
use crate::policy::PolicyConfig;
use crate::ticket::{Ticket, TicketStore, TYPE_FIELD};

use super::resolver::resolve;

/// One rejected change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    fn modifying(field: &str) -> Self {
        Self {
            field: field.to_string(),
            message: format!("access denied to modifying {}", field),
        }
    }

    fn ticket_type(ticket_type: &str) -> Self {
        Self {
            field: TYPE_FIELD.to_string(),
            message: format!("access denied to ticket type {}", ticket_type),
        }
    }
}

/// Validates proposed ticket changes against the field policy
#[derive(Debug, Clone)]
pub struct MutationValidator {
    config: Arc<PolicyConfig>,
}

impl MutationValidator {
    pub fn new(config: Arc<PolicyConfig>) -> Self {
        Self { config }
    }

    /// Violations of `proposed` relative to `original`; empty means accepted
    ///
    /// Field violations come first, in configured field order, followed by
    /// the ticket-type violation if any. Fields the submission does not
    /// carry are not being modified. Values compare exactly, so an absent
    /// original and an empty proposed value differ.
    pub fn validate(
        &self,
        original: &Ticket,
        proposed: &Ticket,
        principal: &dyn PrincipalContext,
    ) -> Vec<FieldViolation> {
        let resource = proposed.resource();
        let mut violations = Vec::new();

        debug!(
            ticket = proposed.id.as_deref().unwrap_or("new"),
            user = principal.username(),
            "Validating ticket"
        );

        for rule in self.config.rules() {
            let Some(new) = proposed.get(&rule.name) else {
                continue;
            };

            let state = resolve(rule, principal, Some(&resource));
            if state.editable {
                continue;
            }

            let old = original.get(&rule.name);
            if old != Some(new) {
                debug!(field = rule.name.as_str(), ?old, new, "Denied change to read-only field");
                violations.push(FieldViolation::modifying(&rule.name));
            }
        }

        if let Some(ticket_type) = proposed.ticket_type() {
            if let Some(required) = self.config.permission_for_ticket_type(ticket_type) {
                let held = match principal.has_permission(required, None) {
                    Ok(held) => held,
                    Err(e) => {
                        warn!(permission = required, "Permission lookup failed: {}", e);
                        false
                    }
                };
                if !held {
                    debug!(ticket_type, permission = required, "Ticket type not permitted");
                    violations.push(FieldViolation::ticket_type(ticket_type));
                }
            }
        }

        violations
    }

    /// Validate against the stored ticket rather than client-supplied values
    ///
    /// A ticket without an id, or one the store does not have, is compared
    /// against an empty original. A failing store is treated the same way,
    /// so every submitted change to a read-only field is rejected.
    pub fn validate_against_store(
        &self,
        store: &dyn TicketStore,
        proposed: &Ticket,
        principal: &dyn PrincipalContext,
    ) -> Vec<FieldViolation> {
        let original = match proposed.id.as_deref() {
            None => Ticket::new(),
            Some(id) => match store.fetch_ticket(id) {
                Ok(Some(ticket)) => ticket,
                Ok(None) => Ticket::new(),
                Err(e) => {
                    warn!(ticket = id, store = store.name(), "Ticket lookup failed: {}", e);
                    Ticket::new()
                }
            },
        };

        self.validate(&original, proposed, principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perm::StaticPrincipal;
    use crate::policy::{DenialMode, FieldRule};
    use crate::ticket::InMemoryTicketStore;

    fn validator() -> MutationValidator {
        let config = PolicyConfig::new()
            .with_rule(
                FieldRule::new("milestone")
                    .with_permissions(["MILESTONE_EDIT"])
                    .on_denial(DenialMode::Disable),
            )
            .with_rule(FieldRule::new("severity").hidden())
            .with_rule(FieldRule::new("keywords").disabled())
            .with_ticket_type("security", "SECURITY_VIEW");
        MutationValidator::new(Arc::new(config))
    }

    fn original() -> Ticket {
        Ticket::new()
            .with_id("1")
            .with_value("type", "defect")
            .with_value("milestone", "1.0")
            .with_value("severity", "minor")
            .with_value("keywords", "")
    }

    #[test]
    fn test_denied_milestone_change() {
        let proposed = original().with_value("milestone", "2.0");
        let nobody = StaticPrincipal::new("nobody");

        assert_eq!(
            validator().validate(&original(), &proposed, &nobody),
            vec![FieldViolation {
                field: "milestone".to_string(),
                message: "access denied to modifying milestone".to_string(),
            }]
        );
    }

    #[test]
    fn test_permitted_change() {
        let proposed = original().with_value("milestone", "2.0");
        let editor = StaticPrincipal::new("ed").with_permission("MILESTONE_EDIT");
        assert!(validator().validate(&original(), &proposed, &editor).is_empty());
    }

    #[test]
    fn test_unchanged_ticket_is_accepted() {
        let nobody = StaticPrincipal::new("nobody");
        assert!(validator().validate(&original(), &original(), &nobody).is_empty());
    }

    #[test]
    fn test_hidden_field_change_is_denied() {
        let proposed = original().with_value("severity", "critical");
        let admin = StaticPrincipal::new("root").with_permission("MILESTONE_EDIT");

        let violations = validator().validate(&original(), &proposed, &admin);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "severity");
    }

    #[test]
    fn test_absent_and_empty_differ() {
        let mut original = original();
        original.remove("keywords");
        let proposed = original.clone().with_value("keywords", "");
        let nobody = StaticPrincipal::new("nobody");

        let violations = validator().validate(&original, &proposed, &nobody);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "keywords");
    }

    #[test]
    fn test_omitted_field_is_not_modified() {
        let mut proposed = original();
        proposed.remove("milestone");
        let nobody = StaticPrincipal::new("nobody");
        assert!(validator().validate(&original(), &proposed, &nobody).is_empty());
    }

    #[test]
    fn test_violations_follow_configured_order_then_type() {
        let proposed = original()
            .with_value("keywords", "security")
            .with_value("milestone", "2.0")
            .with_value("severity", "blocker")
            .with_value("type", "security");
        let nobody = StaticPrincipal::new("nobody");

        let fields: Vec<_> = validator()
            .validate(&original(), &proposed, &nobody)
            .into_iter()
            .map(|v| v.field)
            .collect();
        assert_eq!(fields, vec!["milestone", "severity", "keywords", "type"]);
    }

    #[test]
    fn test_type_check_runs_without_changes() {
        let ticket = original().with_value("type", "security");
        let nobody = StaticPrincipal::new("nobody");

        let violations = validator().validate(&ticket, &ticket, &nobody);
        assert_eq!(
            violations,
            vec![FieldViolation {
                field: "type".to_string(),
                message: "access denied to ticket type security".to_string(),
            }]
        );

        let viewer = StaticPrincipal::new("sec").with_permission("SECURITY_VIEW");
        assert!(validator().validate(&ticket, &ticket, &viewer).is_empty());
    }

    #[test]
    fn test_validate_against_store_uses_stored_values() {
        let store = InMemoryTicketStore::new();
        store.insert(original()).unwrap();
        let nobody = StaticPrincipal::new("nobody");

        // Client claims the old value was 2.0; the store knows better
        let proposed = original().with_value("milestone", "2.0");
        let violations = validator().validate_against_store(&store, &proposed, &nobody);
        assert_eq!(violations.len(), 1);

        // New ticket: any value for a read-only field is a change
        let mut fresh = Ticket::new().with_value("milestone", "1.0");
        fresh.id = None;
        let violations = validator().validate_against_store(&store, &fresh, &nobody);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "milestone");
    }

    struct UnreachableStore;

    impl TicketStore for UnreachableStore {
        fn fetch_ticket(&self, id: &str) -> crate::error::Result<Option<Ticket>> {
            Err(crate::error::EnchantError::TicketLookupFailed {
                ticket_id: id.to_string(),
                reason: "timed out".to_string(),
            })
        }

        fn name(&self) -> &'static str {
            "unreachable"
        }
    }

    #[test]
    fn test_failing_store_rejects_read_only_changes() {
        let nobody = StaticPrincipal::new("nobody");

        // Even a resubmission of the stored values cannot be trusted
        let violations = validator().validate_against_store(&UnreachableStore, &original(), &nobody);
        let fields: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["milestone", "severity", "keywords"]);

        let editor = StaticPrincipal::new("ed").with_permission("MILESTONE_EDIT");
        let mut proposed = Ticket::new().with_id("1").with_value("milestone", "2.0");
        proposed.set("type", "defect");
        assert!(validator()
            .validate_against_store(&UnreachableStore, &proposed, &editor)
            .is_empty());
    }
}
