use thiserror::Error;

// ── Error codes ─────────────────────────────────────────────────────
//
// Stable, machine-readable identifiers. Callers match on these,
// never on the human-readable message string.

/// Stable error code constants.
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const UPSTREAM: &str = "UPSTREAM";
    pub const INTERNAL: &str = "INTERNAL";
}

// ── ServiceError ────────────────────────────────────────────────────

/// Unified error type used by the inventory and procurement modules.
///
/// Each variant maps to a stable error code (see [`error_code`]). The
/// display string is only the message, so UI layers can show it as-is
/// in a toast.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Entity, item, vendor or order does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate key (sku, vendor sku, entity id).
    #[error("{0}")]
    Conflict(String),

    /// Input or requested transition is invalid.
    #[error("{0}")]
    Validation(String),

    /// The external test-results service failed or answered badly.
    #[error("{0}")]
    Upstream(String),

    /// Unexpected internal error.
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => error_code::NOT_FOUND,
            ServiceError::Conflict(_) => error_code::ALREADY_EXISTS,
            ServiceError::Validation(_) => error_code::VALIDATION_FAILED,
            ServiceError::Upstream(_) => error_code::UPSTREAM,
            ServiceError::Internal(_) => error_code::INTERNAL,
        }
    }

    /// Shorthand for a `NotFound` naming the kind of record and its key.
    pub fn not_found(what: &str, key: &str) -> Self {
        ServiceError::NotFound(format!("{} '{}' not found", what, key))
    }
}
