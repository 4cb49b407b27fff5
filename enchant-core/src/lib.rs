//! # Enchant Core - field-level access policy for ticket trackers
//!
//! Enchant decides, per user and per ticket:
//!
//! - **Access**: whether a ticket may be acted on at all, from a
//!   ticket type -> required permission map, with a recursion guard so
//!   derived permission lookups cannot loop
//! - **Fields**: whether each configured field is editable, disabled,
//!   hidden, relabeled or annotated
//! - **Mutations**: whether a submitted ticket only changes fields the
//!   user may edit
//!
//! The engine stores nothing. Tickets come from a [`TicketStore`], grants
//! from the host's permission system through [`PrincipalContext`], and all
//! mutable state lives in a per-request [`EvaluationSession`].
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use enchant_core::{
//!     AccessDecisionEngine, Decision, EvaluationSession, InMemoryTicketStore,
//!     MutationValidator, PolicyLoader, ResourceRef, StaticPrincipal, Ticket, TicketStore,
//! };
//!
//! let config = PolicyLoader::new()
//!     .load_from_json(r#"{
//!         "tweaks": "milestone",
//!         "milestone.permission": "MILESTONE_EDIT",
//!         "ticket_type.security": "SECURITY_VIEW"
//!     }"#)
//!     .unwrap();
//! let config = Arc::new(config);
//!
//! let store = InMemoryTicketStore::new();
//! let id = store
//!     .insert(Ticket::new().with_value("type", "security").with_value("milestone", "1.0"))
//!     .unwrap();
//!
//! let engine = AccessDecisionEngine::new(config.clone(), Arc::new(store));
//! let session = EvaluationSession::new();
//! let guest = StaticPrincipal::new("guest");
//!
//! let decision = engine.check_access(&session, &guest, "TICKET_VIEW", &ResourceRef::ticket(&id));
//! assert_eq!(decision, Decision::Deny);
//! assert_eq!(session.take_blocked_count(), 1);
//!
//! let original = engine.tickets().fetch_ticket(&id).unwrap().unwrap();
//! let proposed = original.clone().with_value("milestone", "2.0");
//! let violations = MutationValidator::new(config).validate(&original, &proposed, &guest);
//! assert_eq!(violations[0].message, "access denied to modifying milestone");
//! ```

pub mod access;
pub mod error;
pub mod field;
pub mod perm;
pub mod policy;
pub mod report;
pub mod ticket;

// Re-export main types
pub use access::{AccessDecisionEngine, Decision, EvaluationSession, PermissionPipeline};
pub use error::{EnchantError, ErrorCategory, ErrorDetail, ErrorResponse, Result};
pub use field::{resolve, FieldEffectiveState, FieldPolicyResolver, FieldViolation, MutationValidator};
pub use perm::{InMemoryPermissionStore, PermissionStore, PrincipalContext, StaticPrincipal};
pub use policy::{ConfigIssue, DenialMode, FieldRule, PolicyConfig, PolicyLoader, PolicySettings};
pub use report::{adjusted_total, take_blocked_count, RowMasker, TypeFilter};
pub use ticket::{InMemoryTicketStore, ResourceRef, Ticket, TicketStore};
