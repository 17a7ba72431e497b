//! # cardledger-db: Database Layer for Card Ledger
//!
//! This crate provides persistence and the transactional ledger operations
//! for Card Ledger. It uses SQLite for storage with sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Card Ledger Data Flow                            │
//! │                                                                         │
//! │  Request handler (record sale for user U)                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  cardledger-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ LedgerService │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │  (ledger/)    │    │ (repository/) │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ IdentityLocks │───►│ LotRepo       │    │ 001_initial_ │  │   │
//! │  │   │ FIFO engine   │    │ SaleRepo      │    │   schema.sql │  │   │
//! │  │   │ transactions  │    │ Consumption   │    │              │  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │ pure math                                          │   │
//! │  │           ▼                                                    │   │
//! │  │   cardledger-core (FifoBook, Money, validation)                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   inventory_lots • sales • fifo_consumption                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`ledger`] - `LedgerService`: locking, transactions, FIFO allocation
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - Environment-driven configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (lot, sale, consumption)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cardledger_db::{Database, LedgerConfig, LedgerService};
//!
//! let config = LedgerConfig::from_env()?;
//! let db = Database::new(config.db_config()).await?;
//! let ledger = LedgerService::with_config(db, &config);
//!
//! let sale = ledger.record_sale(user_id, new_sale).await?;
//! println!("profit: {}", sale.realized_profit());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, LedgerConfig};
pub use error::{DbError, DbResult};
pub use ledger::{IdentityLocks, LedgerService, RecalcSummary};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::consumption::ConsumptionRepository;
pub use repository::lot::LotRepository;
pub use repository::sale::SaleRepository;
