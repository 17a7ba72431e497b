//! # cardledger-core: Pure Business Logic for Card Ledger
//!
//! This crate is the **heart** of Card Ledger. It contains the ledger's
//! business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Card Ledger Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Request handlers (external)                     │   │
//! │  │    POST /sales, PATCH /sales/:id, DELETE /inventory/:id, ...    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ authenticated user id + payload        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               cardledger-db::LedgerService                      │   │
//! │  │    locks, transactions, repositories                            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ cardledger-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   fifo    │  │ validation│  │   │
//! │  │   │    Lot    │  │   Money   │  │ plan_     │  │   rules   │  │   │
//! │  │   │   Sale    │  │ per_unit  │  │ allocation│  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │   ┌───────────┐  ┌───────────┐                                │   │
//! │  │   │  payload  │  │  report   │                                │   │
//! │  │   └───────────┘  └───────────┘                                │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (InventoryLot, Sale, FifoConsumption, CardIdentity)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`fifo`] - FIFO allocation planning over ordered lots
//! - [`payload`] - Create/patch payloads, list filters, pagination
//! - [`report`] - Dashboard statistics
//! - [`error`] - Domain error types and error kinds
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use cardledger_core::fifo::FifoBook;
//! use cardledger_core::{CardIdentity, Condition, Game, Money};
//! # use cardledger_core::fifo::test_support::lot;
//!
//! let identity = CardIdentity::new(Game::Pokemon, "Charizard", "Base Set", "", Condition::Nm);
//! let lots = vec![lot("a", 10, 10, 10_000), lot("b", 10, 10, 15_000)];
//! let mut book = FifoBook::new(identity, lots);
//!
//! let plan = book.consume(15).unwrap();
//! assert_eq!(plan.cost_basis(), Money::from_cents(17_500));
//! assert_eq!(plan.profit(Money::from_cents(30_000)).cents(), 12_500);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod fifo;
pub mod money;
pub mod payload;
pub mod report;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use cardledger_core::Money` instead of
// `use cardledger_core::money::Money`

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use fifo::{AllocationPlan, FifoBook, LotTake, SalePreview};
pub use money::Money;
pub use payload::*;
pub use report::{DailyProfit, DashboardStats};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Page size used when a listing does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Largest page a listing may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Longest accepted card name, set name, variant, platform or vendor.
pub const MAX_NAME_LENGTH: usize = 200;

/// Longest accepted card-name search string.
pub const MAX_SEARCH_LENGTH: usize = 100;

/// Largest accepted quantity on a lot or sale.
pub const MAX_QUANTITY: i64 = 1_000_000;

/// Largest accepted money amount in cents ($10 billion).
///
/// `MAX_QUANTITY * MAX_MONEY_CENTS` still fits in an i64, so gross proceeds
/// and per-lot cost totals of validated input cannot overflow.
pub const MAX_MONEY_CENTS: i64 = 1_000_000_000_000;
