//! Error types for Enchant operations
//!
//! Errors only travel across the collaborator seams: loading configuration,
//! fetching tickets, and looking up granted permissions. The decision
//! operations (access checks, field resolution, validation) never return
//! them; they degrade instead.
//!
//! # Error Codes
//!
//! Each variant has a stable error code (e.g., `TICKET_LOOKUP_FAILED`) that
//! hosts can switch on or aggregate in their own logs.
//!
//! # Example
//!
//! ```rust
//! use enchant_core::error::{EnchantError, ErrorCategory};
//!
//! fn handle_error(err: EnchantError) {
//!     match err.category() {
//!         ErrorCategory::Validation => println!("Fix the configuration"),
//!         ErrorCategory::External => println!("Collaborator failed"),
//!         _ => println!("Other error"),
//!     }
//!
//!     if err.is_recoverable() {
//!         println!("Retry may succeed");
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for Enchant operations
pub type Result<T> = std::result::Result<T, EnchantError>;

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Referenced item does not exist
    NotFound,
    /// Configuration or input is malformed
    Validation,
    /// Access was refused
    Authorization,
    /// Bug or poisoned state
    Internal,
    /// A collaborator (store, file system) failed
    External,
}

/// Errors that can occur at the engine's collaborator seams
#[derive(Error, Debug)]
pub enum EnchantError {
    // ═══════════════════════════════════════════════════════════════════════
    // Configuration errors
    // ═══════════════════════════════════════════════════════════════════════

    /// A setting could not be interpreted
    #[error("Invalid setting '{key}': {reason}")]
    InvalidConfig { key: String, reason: String },

    /// Settings could not be read from their source
    #[error("Failed to load policy settings from '{path}': {reason}")]
    ConfigLoadError { path: String, reason: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Collaborator errors
    // ═══════════════════════════════════════════════════════════════════════

    /// The ticket store failed while fetching a ticket
    #[error("Ticket lookup failed for #{ticket_id}: {reason}")]
    TicketLookupFailed { ticket_id: String, reason: String },

    /// The permission store or oracle failed
    #[error("Permission lookup failed for '{token}': {reason}")]
    PermissionLookupFailed { token: String, reason: String },

    /// A user is unknown to the permission store
    #[error("Unknown user: '{username}'")]
    UnknownUser { username: String },

    /// The ticket-type permission refused access
    #[error("Access to ticket #{ticket_id} denied: missing {permission}")]
    AccessDenied { ticket_id: String, permission: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Infrastructure errors
    // ═══════════════════════════════════════════════════════════════════════

    /// JSON serialization or deserialization failed
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// In-memory store lock is poisoned
    #[error("Store lock poisoned. This is a bug; please report it.")]
    StoreLocked,

    /// The in-memory store has no numeric ticket id left to assign
    #[error("No ticket id left to assign after #{last}")]
    IdsExhausted { last: u64 },

    /// I/O operation failed
    #[error("IO error: {message}")]
    IoError { message: String },
}

impl EnchantError {
    /// Returns true if this error might succeed on retry
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EnchantError::TicketLookupFailed { .. }
                | EnchantError::PermissionLookupFailed { .. }
                | EnchantError::StoreLocked
        )
    }

    /// Returns the error category for grouping
    pub fn category(&self) -> ErrorCategory {
        match self {
            EnchantError::UnknownUser { .. } => ErrorCategory::NotFound,

            EnchantError::InvalidConfig { .. } | EnchantError::JsonError(_) => {
                ErrorCategory::Validation
            }

            EnchantError::AccessDenied { .. } => ErrorCategory::Authorization,

            EnchantError::StoreLocked | EnchantError::IdsExhausted { .. } => {
                ErrorCategory::Internal
            }

            EnchantError::ConfigLoadError { .. }
            | EnchantError::TicketLookupFailed { .. }
            | EnchantError::PermissionLookupFailed { .. }
            | EnchantError::IoError { .. } => ErrorCategory::External,
        }
    }

    /// Returns the stable error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            EnchantError::InvalidConfig { .. } => "INVALID_CONFIG",
            EnchantError::ConfigLoadError { .. } => "CONFIG_LOAD_ERROR",
            EnchantError::TicketLookupFailed { .. } => "TICKET_LOOKUP_FAILED",
            EnchantError::PermissionLookupFailed { .. } => "PERMISSION_LOOKUP_FAILED",
            EnchantError::UnknownUser { .. } => "UNKNOWN_USER",
            EnchantError::AccessDenied { .. } => "ACCESS_DENIED",
            EnchantError::JsonError(_) => "JSON_ERROR",
            EnchantError::StoreLocked => "STORE_LOCKED",
            EnchantError::IdsExhausted { .. } => "IDS_EXHAUSTED",
            EnchantError::IoError { .. } => "IO_ERROR",
        }
    }

    /// Converts this error to a JSON-serializable response object
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                category: self.category(),
                recoverable: self.is_recoverable(),
            },
        }
    }
}

impl From<std::io::Error> for EnchantError {
    fn from(err: std::io::Error) -> Self {
        EnchantError::IoError {
            message: err.to_string(),
        }
    }
}

/// JSON-serializable error response for hosts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail for JSON responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable error code (e.g., "INVALID_CONFIG")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    pub category: ErrorCategory,
    /// Whether retry might succeed
    pub recoverable: bool,
}
