//! Policy configuration
//!
//! The policy is a fixed-shape set of field rules plus a ticket-type gate:
//!
//! - Field rules (permission, disable, hide, label, notice, tip, ondenial)
//! - Ticket type -> required permission
//! - Extra grantable permission tokens

mod config;
mod loader;
mod rule;

pub use config::{
    ConfigIssue, PolicyConfig, PolicySettings, GRAY_DISABLED_KEY, PERMISSIONS_KEY,
    TICKET_TYPE_PREFIX, TWEAKS_KEY,
};
pub use loader::{settings_from_value, PolicyLoader};
pub use rule::{DenialMode, FieldRule};
