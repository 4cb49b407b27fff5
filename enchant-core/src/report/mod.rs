//! List, report and query adjustments
//!
//! Access checks filter tickets out of lists as a side effect, so a list
//! view has to correct its "N results" total afterwards with the session's
//! blocked count. The same views also need ticket types the user may pick
//! and row values masked for fields the user may not see.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::access::EvaluationSession;
use crate::field::resolve;
use crate::perm::PrincipalContext;
use crate::policy::PolicyConfig;
use crate::ticket::ResourceRef;

/// Return the session's blocked count and reset it to zero
pub fn take_blocked_count(session: &EvaluationSession) -> usize {
    session.take_blocked_count()
}

/// Subtract the blocked count from a displayed total, resetting the count
pub fn adjusted_total(session: &EvaluationSession, total: usize) -> usize {
    let blocked = take_blocked_count(session);
    if blocked > total {
        warn!(
            session = session.session_id(),
            blocked,
            total,
            "More tickets blocked than listed"
        );
    }
    total.saturating_sub(blocked)
}

/// Filters ticket type choices by their gating permission
#[derive(Debug, Clone)]
pub struct TypeFilter {
    config: Arc<PolicyConfig>,
}

impl TypeFilter {
    pub fn new(config: Arc<PolicyConfig>) -> Self {
        Self { config }
    }

    /// Ticket types the principal may use, in input order
    pub fn allowed_types<'a, I>(&self, principal: &dyn PrincipalContext, types: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        types
            .into_iter()
            .filter(|ticket_type| {
                let Some(required) = self.config.permission_for_ticket_type(ticket_type) else {
                    return true;
                };
                let allowed = principal.has_permission(required, None).unwrap_or_else(|e| {
                    warn!(permission = required, "Permission lookup failed: {}", e);
                    false
                });
                debug!(
                    user = principal.username(),
                    ticket_type = *ticket_type,
                    permission = required,
                    allowed,
                    "Checked ticket type"
                );
                allowed
            })
            .map(str::to_string)
            .collect()
    }
}

/// Masks and relabels report and query rows
#[derive(Debug, Clone)]
pub struct RowMasker {
    config: Arc<PolicyConfig>,
}

impl RowMasker {
    pub fn new(config: Arc<PolicyConfig>) -> Self {
        Self { config }
    }

    /// Blank every column of `row` the principal may not see on `ticket`
    ///
    /// Returns the number of masked columns.
    pub fn mask_row(
        &self,
        principal: &dyn PrincipalContext,
        ticket: &ResourceRef,
        row: &mut BTreeMap<String, String>,
    ) -> usize {
        let mut masked = 0;
        for (column, value) in row.iter_mut() {
            let Some(rule) = self.config.field_rule(column) else {
                continue;
            };
            if !resolve(rule, principal, Some(ticket)).visible {
                value.clear();
                masked += 1;
            }
        }
        masked
    }

    /// Configured label for a column header, if any
    pub fn relabel(&self, column: &str) -> Option<&str> {
        self.config
            .field_rule(column)
            .and_then(|rule| rule.label.as_deref())
    }

    /// Header text for a column: its configured label or the column name
    pub fn header<'a>(&'a self, column: &'a str) -> &'a str {
        self.relabel(column).unwrap_or(column)
    }
}
