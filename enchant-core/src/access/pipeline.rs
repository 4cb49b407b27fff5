//! Permission pipeline
//!
//! Composes the access engine with a grant store into a
//! [`PrincipalContext`]. A scoped lookup consults the engine first; the
//! engine in turn asks this same pipeline about the ticket-type permission,
//! which is where the session's guard set stops the recursion.

use tracing::debug;

use crate::error::{EnchantError, Result};
use crate::perm::{PermissionStore, PrincipalContext};
use crate::ticket::ResourceRef;

use super::engine::{AccessDecisionEngine, Decision};
use super::session::EvaluationSession;

/// Permission lookups for one user within one evaluation session
pub struct PermissionPipeline<'a> {
    engine: &'a AccessDecisionEngine,
    session: &'a EvaluationSession,
    store: &'a dyn PermissionStore,
    username: String,
}

impl<'a> PermissionPipeline<'a> {
    pub fn new(
        engine: &'a AccessDecisionEngine,
        session: &'a EvaluationSession,
        store: &'a dyn PermissionStore,
        username: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            session,
            store,
            username: username.into(),
        }
    }

    pub fn session(&self) -> &EvaluationSession {
        self.session
    }

    /// Fail with `AccessDenied` unless the user holds `token`
    pub fn require(&self, token: &str, scope: Option<&ResourceRef>) -> Result<()> {
        if self.has_permission(token, scope)? {
            return Ok(());
        }
        let ticket_id = scope
            .and_then(ResourceRef::enclosing_ticket)
            .and_then(|t| t.id.clone())
            .unwrap_or_default();
        Err(EnchantError::AccessDenied {
            ticket_id,
            permission: token.to_string(),
        })
    }
}

impl PrincipalContext for PermissionPipeline<'_> {
    fn username(&self) -> &str {
        &self.username
    }

    fn has_permission(&self, token: &str, scope: Option<&ResourceRef>) -> Result<bool> {
        if let Some(resource) = scope {
            match self.engine.check_access(self.session, self, token, resource) {
                Decision::Deny => return Ok(false),
                Decision::Allow => return Ok(true),
                Decision::NotApplicable => {}
            }
        }

        let granted = self.store.user_permissions(&self.username)?;
        let held = granted.contains(token);
        debug!(
            session = self.session.session_id(),
            user = self.username.as_str(),
            token,
            held,
            "Permission store lookup"
        );
        Ok(held)
    }
}
