//! Principals and permission membership
//!
//! The engine consumes an already-authenticated principal through the
//! [`PrincipalContext`] trait: a permission-membership test that may be
//! scoped to a resource. Grants themselves live behind [`PermissionStore`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use tracing::warn;

use crate::error::{EnchantError, Result};
use crate::ticket::ResourceRef;

/// Permission-membership oracle for one authenticated principal
pub trait PrincipalContext {
    fn username(&self) -> &str;

    /// Whether the principal holds `token`, optionally scoped to a resource
    fn has_permission(&self, token: &str, scope: Option<&ResourceRef>) -> Result<bool>;

    /// Whether the principal holds at least one of `tokens`
    ///
    /// A failed lookup counts as not held.
    fn holds_any(&self, tokens: &[String], scope: Option<&ResourceRef>) -> bool {
        tokens.iter().any(|token| match self.has_permission(token, scope) {
            Ok(held) => held,
            Err(e) => {
                warn!(user = self.username(), token = token.as_str(), "Permission lookup failed: {}", e);
                false
            }
        })
    }
}

/// Principal with a fixed permission set
///
/// Grants can be global or scoped to a single ticket id.
#[derive(Debug, Clone, Default)]
pub struct StaticPrincipal {
    username: String,
    permissions: BTreeSet<String>,
    scoped: BTreeMap<String, BTreeSet<String>>,
}

impl StaticPrincipal {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            permissions: BTreeSet::new(),
            scoped: BTreeMap::new(),
        }
    }

    pub fn with_permission(mut self, token: impl Into<String>) -> Self {
        self.permissions.insert(token.into());
        self
    }

    pub fn with_permissions<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions.extend(tokens.into_iter().map(Into::into));
        self
    }

    /// Grant a token only on one ticket
    pub fn with_ticket_permission(mut self, ticket_id: &str, token: impl Into<String>) -> Self {
        self.scoped
            .entry(ticket_id.to_string())
            .or_default()
            .insert(token.into());
        self
    }
}

impl PrincipalContext for StaticPrincipal {
    fn username(&self) -> &str {
        &self.username
    }

    fn has_permission(&self, token: &str, scope: Option<&ResourceRef>) -> Result<bool> {
        if self.permissions.contains(token) {
            return Ok(true);
        }

        let ticket_id = scope
            .and_then(ResourceRef::enclosing_ticket)
            .and_then(|t| t.id.as_deref());

        Ok(ticket_id
            .and_then(|id| self.scoped.get(id))
            .is_some_and(|tokens| tokens.contains(token)))
    }
}

/// Permission store trait
///
/// Implement this trait over the host's grant table.
pub trait PermissionStore: Send + Sync {
    /// Tokens granted to a user; unknown users have none
    fn user_permissions(&self, username: &str) -> Result<BTreeSet<String>>;

    /// Get store name (for logging/debugging)
    fn name(&self) -> &'static str;
}

/// In-memory permission store
///
/// Thread-safe via RwLock.
#[derive(Debug, Default)]
pub struct InMemoryPermissionStore {
    grants: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl InMemoryPermissionStore {
    pub fn new() -> Self {
        Self {
            grants: RwLock::new(HashMap::new()),
        }
    }

    /// Build a store from a username -> tokens table
    pub fn from_grants<I, T>(grants: I) -> Self
    where
        I: IntoIterator<Item = (String, T)>,
        T: IntoIterator<Item = String>,
    {
        let grants = grants
            .into_iter()
            .map(|(user, tokens)| (user, tokens.into_iter().collect()))
            .collect();
        Self {
            grants: RwLock::new(grants),
        }
    }

    pub fn grant(&self, username: &str, token: &str) -> Result<()> {
        let mut grants = self.grants.write().map_err(|_| EnchantError::StoreLocked)?;
        grants
            .entry(username.to_string())
            .or_default()
            .insert(token.to_string());
        Ok(())
    }

    pub fn revoke(&self, username: &str, token: &str) -> Result<bool> {
        let mut grants = self.grants.write().map_err(|_| EnchantError::StoreLocked)?;
        Ok(grants
            .get_mut(username)
            .is_some_and(|tokens| tokens.remove(token)))
    }

    pub fn knows_user(&self, username: &str) -> bool {
        self.grants
            .read()
            .map(|g| g.contains_key(username))
            .unwrap_or(false)
    }
}

impl PermissionStore for InMemoryPermissionStore {
    fn user_permissions(&self, username: &str) -> Result<BTreeSet<String>> {
        let grants = self.grants.read().map_err(|_| EnchantError::StoreLocked)?;
        Ok(grants.get(username).cloned().unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingPrincipal;

    impl PrincipalContext for FailingPrincipal {
        fn username(&self) -> &str {
            "broken"
        }

        fn has_permission(&self, token: &str, _scope: Option<&ResourceRef>) -> Result<bool> {
            Err(EnchantError::PermissionLookupFailed {
                token: token.to_string(),
                reason: "backend down".to_string(),
            })
        }
    }

    #[test]
    fn test_static_principal_scoping() {
        let principal = StaticPrincipal::new("alice")
            .with_permission("TICKET_VIEW")
            .with_ticket_permission("7", "MILESTONE_EDIT");

        let seven = ResourceRef::ticket("7");
        let eight = ResourceRef::ticket("8");
        let attachment = seven.child("attachment", Some("a.txt".to_string()));

        assert!(principal.has_permission("TICKET_VIEW", None).unwrap());
        assert!(principal.has_permission("MILESTONE_EDIT", Some(&seven)).unwrap());
        assert!(principal.has_permission("MILESTONE_EDIT", Some(&attachment)).unwrap());
        assert!(!principal.has_permission("MILESTONE_EDIT", Some(&eight)).unwrap());
        assert!(!principal.has_permission("MILESTONE_EDIT", None).unwrap());
    }

    #[test]
    fn test_holds_any() {
        let principal = StaticPrincipal::new("bob").with_permission("TRAC_ADMIN");
        let tokens = vec!["MILESTONE_EDIT".to_string(), "TRAC_ADMIN".to_string()];
        assert!(principal.holds_any(&tokens, None));
        assert!(!principal.holds_any(&tokens[..1], None));
        assert!(!principal.holds_any(&[], None));
    }

    #[test]
    fn test_failed_lookup_counts_as_not_held() {
        let tokens = vec!["MILESTONE_EDIT".to_string()];
        assert!(!FailingPrincipal.holds_any(&tokens, None));
    }

    #[test]
    fn test_in_memory_permission_store() {
        let store = InMemoryPermissionStore::from_grants(vec![(
            "alice".to_string(),
            vec!["SECURITY_VIEW".to_string()],
        )]);

        store.grant("bob", "MILESTONE_EDIT").unwrap();
        assert!(store.knows_user("bob"));
        assert!(store.user_permissions("alice").unwrap().contains("SECURITY_VIEW"));
        assert!(store.user_permissions("carol").unwrap().is_empty());

        assert!(store.revoke("bob", "MILESTONE_EDIT").unwrap());
        assert!(!store.revoke("bob", "MILESTONE_EDIT").unwrap());
        assert!(store.user_permissions("bob").unwrap().is_empty());
    }
}
