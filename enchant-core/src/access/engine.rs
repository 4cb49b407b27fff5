//! Ticket-type access decisions
//!
//! The engine only ever restricts. For a resource inside a ticket whose type
//! is gated by a permission, a principal lacking that permission is denied;
//! every other case is `NotApplicable`, leaving the final word to the rest of
//! the host's permission pipeline.
//!
//! ## Evaluation order
//!
//! 1. Guarded or policy-declared actions short-circuit (recursion guard)
//! 2. Find the enclosing ticket of the resource
//! 3. Fetch the ticket (missing or failing lookups have no opinion)
//! 4. Resolve the gating permission of the ticket type
//! 5. Guard that permission for the rest of the session
//! 6. Deny (and count) if the principal lacks it

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EnchantError, Result};
use crate::perm::PrincipalContext;
use crate::policy::PolicyConfig;
use crate::ticket::{ResourceRef, TicketStore};

use super::session::EvaluationSession;

/// Outcome of an access check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
    /// No opinion; defer to the rest of the pipeline
    NotApplicable,
}

impl Decision {
    pub fn is_denied(&self) -> bool {
        matches!(self, Decision::Deny)
    }
}

/// Ticket and permission behind a denial
#[derive(Debug, Clone, PartialEq, Eq)]
struct Denial {
    ticket_id: String,
    permission: String,
}

/// Resolves ticket-level access from the ticket-type gate
pub struct AccessDecisionEngine {
    config: Arc<PolicyConfig>,
    tickets: Arc<dyn TicketStore>,
}

impl AccessDecisionEngine {
    pub fn new(config: Arc<PolicyConfig>, tickets: Arc<dyn TicketStore>) -> Self {
        Self { config, tickets }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn tickets(&self) -> &dyn TicketStore {
        self.tickets.as_ref()
    }

    /// Decide whether `principal` may perform `action` on `resource`
    pub fn check_access(
        &self,
        session: &EvaluationSession,
        principal: &dyn PrincipalContext,
        action: &str,
        resource: &ResourceRef,
    ) -> Decision {
        match self.evaluate(session, principal, action, resource) {
            Some(_) => Decision::Deny,
            None => Decision::NotApplicable,
        }
    }

    /// Like [`check_access`](Self::check_access), but a denial is an error
    pub fn require_access(
        &self,
        session: &EvaluationSession,
        principal: &dyn PrincipalContext,
        action: &str,
        resource: &ResourceRef,
    ) -> Result<()> {
        match self.evaluate(session, principal, action, resource) {
            Some(denial) => Err(EnchantError::AccessDenied {
                ticket_id: denial.ticket_id,
                permission: denial.permission,
            }),
            None => Ok(()),
        }
    }

    /// Keep the ticket ids the principal is not denied, in input order
    ///
    /// Each denied ticket is counted on the session.
    pub fn filter_accessible<'a, I>(
        &self,
        session: &EvaluationSession,
        principal: &dyn PrincipalContext,
        action: &str,
        ticket_ids: I,
    ) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        ticket_ids
            .into_iter()
            .filter(|id| {
                let resource = ResourceRef::ticket(*id);
                !self
                    .check_access(session, principal, action, &resource)
                    .is_denied()
            })
            .map(str::to_string)
            .collect()
    }

    fn evaluate(
        &self,
        session: &EvaluationSession,
        principal: &dyn PrincipalContext,
        action: &str,
        resource: &ResourceRef,
    ) -> Option<Denial> {
        let sid = session.session_id();

        if session.is_guarded(action) || self.config.declares_permission(action) {
            debug!(session = sid, action, "Action is guarded, skipping");
            return None;
        }

        let ticket_ref = resource.enclosing_ticket()?;
        let ticket_id = ticket_ref.id.as_deref()?;

        let ticket = match self.tickets.fetch_ticket(ticket_id) {
            Ok(Some(ticket)) => ticket,
            Ok(None) => {
                debug!(session = sid, ticket = ticket_id, "Ticket doesn't exist");
                return None;
            }
            Err(e) => {
                warn!(
                    session = sid,
                    ticket = ticket_id,
                    store = self.tickets.name(),
                    "Ticket lookup failed: {}",
                    e
                );
                return None;
            }
        };

        let ticket_type = ticket.ticket_type()?;
        let Some(required) = self.config.permission_for_ticket_type(ticket_type) else {
            debug!(session = sid, ticket_type, "No permission set for ticket type");
            return None;
        };

        if !self.config.declares_permission(required) && session.guard(required) {
            debug!(session = sid, permission = required, "Guarding permission declared outside policy");
        }

        match principal.has_permission(required, Some(ticket_ref)) {
            Ok(true) => None,
            Ok(false) => {
                debug!(
                    session = sid,
                    user = principal.username(),
                    ticket = ticket_id,
                    permission = required,
                    "User doesn't have permission"
                );
                session.record_blocked();
                Some(Denial {
                    ticket_id: ticket_id.to_string(),
                    permission: required.to_string(),
                })
            }
            Err(e) => {
                warn!(
                    session = sid,
                    user = principal.username(),
                    permission = required,
                    "Permission lookup failed: {}",
                    e
                );
                None
            }
        }
    }
}
