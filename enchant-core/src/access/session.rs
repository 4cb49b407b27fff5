//! Request-scoped evaluation state

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// State accumulated while evaluating one request or batch
///
/// Create one per incoming request and drop it afterwards. The session is
/// deliberately `!Sync`: re-entrant permission lookups within a request share
/// it by reference, but concurrent requests never do.
#[derive(Debug)]
pub struct EvaluationSession {
    session_id: String,
    started_at: DateTime<Utc>,

    /// Gating tokens seen during ticket-type resolution
    extra_permissions: RefCell<BTreeSet<String>>,

    /// Tickets denied since the last take
    blocked_count: Cell<usize>,
}

impl EvaluationSession {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            extra_permissions: RefCell::new(BTreeSet::new()),
            blocked_count: Cell::new(0),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whether `token` is guarded against re-entrant evaluation
    pub fn is_guarded(&self, token: &str) -> bool {
        self.extra_permissions.borrow().contains(token)
    }

    /// Guard `token`; returns false if it was already guarded
    pub(crate) fn guard(&self, token: &str) -> bool {
        self.extra_permissions.borrow_mut().insert(token.to_string())
    }

    /// Tokens guarded so far
    pub fn extra_permissions(&self) -> Vec<String> {
        self.extra_permissions.borrow().iter().cloned().collect()
    }

    pub(crate) fn record_blocked(&self) {
        self.blocked_count.set(self.blocked_count.get() + 1);
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked_count.get()
    }

    /// Return the blocked count and reset it to zero
    pub fn take_blocked_count(&self) -> usize {
        self.blocked_count.replace(0)
    }
}

impl Default for EvaluationSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_set() {
        let session = EvaluationSession::new();
        assert!(!session.is_guarded("SECURITY_VIEW"));
        assert!(session.guard("SECURITY_VIEW"));
        assert!(!session.guard("SECURITY_VIEW"));
        assert!(session.is_guarded("SECURITY_VIEW"));
        assert_eq!(session.extra_permissions(), vec!["SECURITY_VIEW"]);
    }

    #[test]
    fn test_blocked_count_take_resets() {
        let session = EvaluationSession::new();
        session.record_blocked();
        session.record_blocked();
        assert_eq!(session.blocked_count(), 2);
        assert_eq!(session.take_blocked_count(), 2);
        assert_eq!(session.blocked_count(), 0);
        assert_eq!(session.take_blocked_count(), 0);
    }

    #[test]
    fn test_sessions_are_independent() {
        let a = EvaluationSession::new();
        let b = EvaluationSession::new();
        a.record_blocked();
        a.guard("X");
        assert_eq!(b.blocked_count(), 0);
        assert!(!b.is_guarded("X"));
        assert_ne!(a.session_id(), b.session_id());
    }
}
