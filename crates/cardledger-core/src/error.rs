//! # Error Types
//!
//! Domain-specific error types for cardledger-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  cardledger-core errors (this file)                                    │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  cardledger-db errors (separate crate)                                 │
//! │  └── DbError          - Storage failures + wrapped CoreError           │
//! │                                                                         │
//! │  Every error reports an ErrorKind so callers can map it to a status:   │
//! │                                                                         │
//! │    Validation ─────────────► 400                                       │
//! │    NotFound ───────────────► 404                                       │
//! │    DependencyConflict ─────► 409  (lot still referenced by sales)      │
//! │    InsufficientInventory ──► 409                                       │
//! │    ConcurrentModification ─► 409  (safe to retry)                      │
//! │    Storage ────────────────► 500                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification of every ledger failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    DependencyConflict,
    InsufficientInventory,
    ConcurrentModification,
    Storage,
}

impl ErrorKind {
    /// Stable machine-readable code, e.g. `LOT_HAS_SALES`.
    pub const fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::DependencyConflict => "LOT_HAS_SALES",
            ErrorKind::InsufficientInventory => "INSUFFICIENT_INVENTORY",
            ErrorKind::ConcurrentModification => "CONCURRENT_MODIFICATION",
            ErrorKind::Storage => "STORAGE_ERROR",
        }
    }

    /// HTTP status a request handler should answer with.
    pub const fn http_status(&self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::DependencyConflict
            | ErrorKind::InsufficientInventory
            | ErrorKind::ConcurrentModification => 409,
            ErrorKind::Storage => 500,
        }
    }

    /// True if the same request may succeed when simply retried.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::ConcurrentModification)
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Lot does not exist or belongs to another user.
    #[error("Inventory lot not found: {0}")]
    LotNotFound(String),

    /// Sale does not exist or belongs to another user.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Not enough units on hand across the identity group.
    ///
    /// ## User Workflow
    /// ```text
    /// Record sale (qty: 5)
    ///      │
    ///      ▼
    /// Lots for identity: on hand = 3
    ///      │
    ///      ▼
    /// InsufficientInventory { card: "pokemon Pikachu (Jungle) NM", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Nothing is written; the sale is not recorded
    /// ```
    #[error("Insufficient inventory for {card}: available {available}, requested {requested}")]
    InsufficientInventory {
        card: String,
        available: i64,
        requested: i64,
    },

    /// A lot cannot be deleted while sales still draw from it.
    #[error("Lot {lot_id} has {consumption_count} sale allocation(s) and cannot be deleted")]
    LotHasConsumptions { lot_id: String, consumption_count: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::LotNotFound(_) | CoreError::SaleNotFound(_) => ErrorKind::NotFound,
            CoreError::InsufficientInventory { .. } => ErrorKind::InsufficientInventory,
            CoreError::LotHasConsumptions { .. } => ErrorKind::DependencyConflict,
            CoreError::Validation(_) => ErrorKind::Validation,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before any row is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be zero or greater.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// The caller did not identify a user.
    #[error("Unauthorized: user id is required")]
    Unauthorized,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
