//! Tickets, resource references, and the ticket store seam
//!
//! The engine never persists anything. It reads tickets through the
//! [`TicketStore`] trait, which hosts implement over their own storage.
//! [`InMemoryTicketStore`] is provided for embedding and tests.
//!
//! # Example
//!
//! ```rust
//! use enchant_core::ticket::{InMemoryTicketStore, Ticket, TicketStore};
//!
//! let store = InMemoryTicketStore::new();
//! let id = store.insert(Ticket::new().with_value("type", "defect")).unwrap();
//! let ticket = store.fetch_ticket(&id).unwrap().unwrap();
//! assert_eq!(ticket.ticket_type(), Some("defect"));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{EnchantError, Result};

/// Realm name of ticket resources
pub const TICKET_REALM: &str = "ticket";

/// Name of the field holding the ticket type
pub const TYPE_FIELD: &str = "type";

/// Reference to a resource, optionally nested inside a parent
///
/// An attachment on ticket 42 is `attachment:foo.txt` with parent `ticket:42`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub realm: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<ResourceRef>>,
}

impl ResourceRef {
    pub fn new(realm: impl Into<String>, id: Option<String>) -> Self {
        Self {
            realm: realm.into(),
            id,
            parent: None,
        }
    }

    /// Reference to an existing ticket
    pub fn ticket(id: impl Into<String>) -> Self {
        Self::new(TICKET_REALM, Some(id.into()))
    }

    /// Reference to a resource nested inside this one
    pub fn child(&self, realm: impl Into<String>, id: Option<String>) -> Self {
        Self {
            realm: realm.into(),
            id,
            parent: Some(Box::new(self.clone())),
        }
    }

    pub fn is_ticket(&self) -> bool {
        self.realm == TICKET_REALM
    }

    /// This resource followed by its parents, innermost first
    pub fn ancestors(&self) -> impl Iterator<Item = &ResourceRef> {
        std::iter::successors(Some(self), |r| r.parent.as_deref())
    }

    /// Nearest ticket in the containment chain, if any
    pub fn enclosing_ticket(&self) -> Option<&ResourceRef> {
        self.ancestors().find(|r| r.is_ticket())
    }
}

/// A ticket as seen by the engine: an id and its field values
///
/// A field missing from `values` is absent, which is distinct from a field
/// holding the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// `None` for a ticket that has not been stored yet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

impl Ticket {
    /// Create a new, unsaved ticket
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_value(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.values.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.values.remove(field)
    }

    /// Current value of a field; exact key first, then case-insensitive
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values
            .get(field)
            .or_else(|| {
                self.values
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(field))
                    .map(|(_, v)| v)
            })
            .map(String::as_str)
    }

    pub fn ticket_type(&self) -> Option<&str> {
        self.get(TYPE_FIELD)
    }

    /// Resource reference used to scope permission checks
    pub fn resource(&self) -> ResourceRef {
        ResourceRef::new(TICKET_REALM, self.id.clone())
    }
}

/// Ticket store trait
///
/// Implement this trait over the host's ticket storage.
/// All methods take `&self` to allow for interior mutability patterns.
pub trait TicketStore: Send + Sync {
    /// Fetch a ticket; `Ok(None)` means it does not exist
    fn fetch_ticket(&self, id: &str) -> Result<Option<Ticket>>;

    /// Get store name (for logging/debugging)
    fn name(&self) -> &'static str;
}

/// In-memory ticket store
///
/// Thread-safe via RwLock.
#[derive(Debug, Default)]
pub struct InMemoryTicketStore {
    tickets: RwLock<HashMap<String, Ticket>>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self {
            tickets: RwLock::new(HashMap::new()),
        }
    }

    /// Store a ticket, assigning the next numeric id if it has none
    pub fn insert(&self, mut ticket: Ticket) -> Result<String> {
        let mut tickets = self.tickets.write().map_err(|_| EnchantError::StoreLocked)?;

        let id = match ticket.id.clone() {
            Some(id) => id,
            None => {
                let last = tickets
                    .keys()
                    .filter_map(|k| k.parse::<u64>().ok())
                    .max()
                    .unwrap_or(0);
                last.checked_add(1)
                    .ok_or(EnchantError::IdsExhausted { last })?
                    .to_string()
            }
        };

        ticket.id = Some(id.clone());
        tickets.insert(id.clone(), ticket);
        Ok(id)
    }

    pub fn remove(&self, id: &str) -> Result<Option<Ticket>> {
        let mut tickets = self.tickets.write().map_err(|_| EnchantError::StoreLocked)?;
        Ok(tickets.remove(id))
    }

    pub fn len(&self) -> usize {
        self.tickets.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored ticket ids, numerically ordered where possible
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .tickets
            .read()
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort_by(|a, b| match (a.parse::<u64>(), b.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => a.cmp(b),
        });
        ids
    }
}

impl TicketStore for InMemoryTicketStore {
    fn fetch_ticket(&self, id: &str) -> Result<Option<Ticket>> {
        let tickets = self.tickets.read().map_err(|_| EnchantError::StoreLocked)?;
        Ok(tickets.get(id).cloned())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
