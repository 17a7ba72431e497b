//! # Validation Module
//!
//! Input validation utilities for Card Ledger.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request handler                                              │
//! │  ├── Type validation (serde deserialization of the enums)              │
//! │  └── Authenticated user id                                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: LedgerService (Rust)                                         │
//! │  └── THIS MODULE: field rules on the full (merged) payload             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints (0 <= qty_on_hand <= qty_initial)    │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use cardledger_core::validation::{validate_quantity, validate_user_id};
//!
//! validate_user_id("user-1").unwrap();
//! assert!(validate_quantity("qty_sold", 0).is_err());
//! ```

use crate::error::ValidationError;
use crate::payload::{NewLot, NewSale};
use crate::types::CardIdentity;
use crate::{
    MAX_MONEY_CENTS, MAX_NAME_LENGTH, MAX_PAGE_SIZE, MAX_QUANTITY, MAX_SEARCH_LENGTH,
};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Rejects an empty (or whitespace-only) user id.
///
/// Request handlers authenticate; this only catches a caller that forgot to.
pub fn validate_user_id(user_id: &str) -> ValidationResult<()> {
    if user_id.trim().is_empty() {
        return Err(ValidationError::Unauthorized);
    }
    Ok(())
}

/// Validates a required free-text field (card name, set name, platform).
///
/// ## Rules
/// - Must not be empty or whitespace-only
/// - At most `MAX_NAME_LENGTH` characters
///
/// The value is NOT trimmed: identity matching is exact, so callers store
/// exactly what was sent.
pub fn validate_required_text(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    validate_optional_text(field, value)
}

/// Validates an optional free-text field (variant, vendor). Empty is fine.
pub fn validate_optional_text(field: &str, value: &str) -> ValidationResult<()> {
    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LENGTH,
        });
    }
    Ok(())
}

/// Validates every free-text part of a card identity.
///
/// `game` and `condition` are already constrained by their enum types.
pub fn validate_identity(identity: &CardIdentity) -> ValidationResult<()> {
    validate_required_text("card_name", &identity.card_name)?;
    validate_required_text("set_name", &identity.set_name)?;
    validate_optional_text("variant", &identity.variant)?;
    Ok(())
}

/// Validates a search query.
///
/// ## Returns
/// The trimmed query, or `None` when it is blank.
pub fn validate_search_query(query: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(query) = query.map(str::trim) else {
        return Ok(None);
    };

    if query.is_empty() {
        return Ok(None);
    }

    if query.chars().count() > MAX_SEARCH_LENGTH {
        return Err(ValidationError::TooLong {
            field: "search".to_string(),
            max: MAX_SEARCH_LENGTH,
        });
    }

    Ok(Some(query.to_string()))
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity (lot size, units sold, units to preview).
///
/// ## Example
/// ```rust
/// use cardledger_core::validation::validate_quantity;
///
/// assert!(validate_quantity("qty_sold", 3).is_ok());
/// assert!(validate_quantity("qty_sold", 0).is_err());
/// assert!(validate_quantity("qty_sold", 1_000_001).is_err());
/// ```
pub fn validate_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    if qty > MAX_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_QUANTITY,
        });
    }
    Ok(())
}

/// Validates a money amount in cents. Zero is allowed (free cards, no fee),
/// anything above [`MAX_MONEY_CENTS`] is not.
pub fn validate_money_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    if cents > MAX_MONEY_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_MONEY_CENTS,
        });
    }
    Ok(())
}

/// Validates pagination parameters.
///
/// ## Rules
/// - `page >= 1`
/// - `1 <= page_size <= MAX_PAGE_SIZE`
pub fn validate_page(page: u32, page_size: u32) -> ValidationResult<()> {
    if page == 0 {
        return Err(ValidationError::MustBePositive {
            field: "page".to_string(),
        });
    }

    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(ValidationError::OutOfRange {
            field: "page_size".to_string(),
            min: 1,
            max: MAX_PAGE_SIZE as i64,
        });
    }

    Ok(())
}

/// Validates a UUID string (lot and sale ids).
///
/// ## Example
/// ```rust
/// use cardledger_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Payload Validators
// =============================================================================

/// Validates a complete lot payload (create, or a patch merged onto a lot).
pub fn validate_new_lot(lot: &NewLot) -> ValidationResult<()> {
    validate_identity(&lot.identity())?;
    validate_quantity("qty_initial", lot.qty_initial)?;
    validate_money_cents("total_cost_cents", lot.total_cost_cents)?;
    if let Some(vendor) = &lot.vendor {
        validate_optional_text("vendor", vendor)?;
    }
    Ok(())
}

/// Validates a complete sale payload (create, or a patch merged onto a sale).
pub fn validate_new_sale(sale: &NewSale) -> ValidationResult<()> {
    validate_identity(&sale.identity())?;
    validate_required_text("platform", &sale.platform)?;
    validate_quantity("qty_sold", sale.qty_sold)?;
    validate_money_cents("sale_price_each_cents", sale.sale_price_each_cents)?;
    validate_money_cents("platform_fee_cents", sale.platform_fee_cents)?;
    validate_money_cents("processing_fee_cents", sale.processing_fee_cents)?;
    validate_money_cents("shipping_cost_cents", sale.shipping_cost_cents)?;
    validate_money_cents("other_fees_cents", sale.other_fees_cents)?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
