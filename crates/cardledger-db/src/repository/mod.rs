//! # Repository Module
//!
//! Database repository implementations for Card Ledger.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  LedgerService                                                         │
//! │       │                                                                 │
//! │       │  let mut tx = pool.begin().await?;                             │
//! │       │  LotRepository::new(&mut tx).available_for_identity(..)        │
//! │       ▼                                                                 │
//! │  LotRepository / SaleRepository / ConsumptionRepository               │
//! │  └── borrow a &mut SqliteConnection: a pooled connection for reads,    │
//! │      the open transaction for writes                                   │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • SQL is isolated in one place                                        │
//! │  • Ledger operations compose several repositories in ONE transaction  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`LotRepository`](lot::LotRepository) - Lot CRUD, FIFO lookups, guarded decrements
//! - [`SaleRepository`](sale::SaleRepository) - Sale CRUD and replay order lookups
//! - [`ConsumptionRepository`](consumption::ConsumptionRepository) - FIFO audit records

pub mod consumption;
pub mod lot;
pub mod sale;

/// Builds a `LIKE` pattern matching `search` anywhere, with `%`, `_` and `\`
/// escaped (queries use `ESCAPE '\'`).
pub(crate) fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
