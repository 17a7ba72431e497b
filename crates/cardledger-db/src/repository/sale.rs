//! # Sale Repository
//!
//! Database operations for sales.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. INSERT                                                             │
//! │     └── insert() → cost_basis_used = 0, realized_profit = 0            │
//! │                                                                         │
//! │  2. ALLOCATE (same transaction)                                        │
//! │     └── set_cost_basis() → cost basis + profit from the FIFO plan      │
//! │                                                                         │
//! │  3. (OPTIONAL) EDIT / DELETE                                           │
//! │     └── update() / delete() → identity group is recalculated,          │
//! │         which calls set_cost_basis() again for every remaining sale    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use cardledger_core::{CardIdentity, Game, Sale};
use chrono::{NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::like_pattern;

const SALE_COLUMNS: &str = r#"
    id, user_id, sale_date, platform, game, card_name, set_name, variant, condition,
    qty_sold, sale_price_each_cents,
    platform_fee_cents, processing_fee_cents, shipping_cost_cents, other_fees_cents,
    net_proceeds_cents, cost_basis_used_cents, realized_profit_cents,
    created_at, updated_at
"#;

/// Resolved sale listing query.
#[derive(Debug, Clone, Default)]
pub struct SaleQuery {
    pub game: Option<Game>,
    pub platform: Option<String>,
    /// Already trimmed; `None` matches everything.
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// Repository for sale database operations.
pub struct SaleRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> SaleRepository<'c> {
    /// Creates a new SaleRepository.
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        SaleRepository { conn }
    }

    /// Inserts a sale.
    pub async fn insert(&mut self, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, user_id = %sale.user_id, qty = sale.qty_sold, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, user_id, sale_date, platform, game, card_name, set_name, variant, condition,
                qty_sold, sale_price_each_cents,
                platform_fee_cents, processing_fee_cents, shipping_cost_cents, other_fees_cents,
                net_proceeds_cents, cost_basis_used_cents, realized_profit_cents,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                ?10, ?11,
                ?12, ?13, ?14, ?15,
                ?16, ?17, ?18,
                ?19, ?20
            )
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.user_id)
        .bind(sale.sale_date)
        .bind(&sale.platform)
        .bind(sale.game)
        .bind(&sale.card_name)
        .bind(&sale.set_name)
        .bind(&sale.variant)
        .bind(sale.condition)
        .bind(sale.qty_sold)
        .bind(sale.sale_price_each_cents)
        .bind(sale.platform_fee_cents)
        .bind(sale.processing_fee_cents)
        .bind(sale.shipping_cost_cents)
        .bind(sale.other_fees_cents)
        .bind(sale.net_proceeds_cents)
        .bind(sale.cost_basis_used_cents)
        .bind(sale.realized_profit_cents)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Gets a sale by ID, scoped to its owner.
    pub async fn get(&mut self, user_id: &str, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1 AND user_id = ?2");

        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(sale)
    }

    /// Every sale of one identity group in replay order:
    /// `sale_date ASC`, then insertion order.
    pub async fn for_identity(
        &mut self,
        user_id: &str,
        identity: &CardIdentity,
    ) -> DbResult<Vec<Sale>> {
        debug!(user_id = %user_id, card = %identity, "Loading sales for replay");

        let sql = format!(
            r#"
            SELECT {SALE_COLUMNS} FROM sales
            WHERE user_id = ?1
              AND game = ?2 AND card_name = ?3 AND set_name = ?4
              AND variant = ?5 AND condition = ?6
            ORDER BY sale_date ASC, rowid ASC
            "#
        );

        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(user_id)
            .bind(identity.game)
            .bind(&identity.card_name)
            .bind(&identity.set_name)
            .bind(&identity.variant)
            .bind(identity.condition)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(sales)
    }

    /// Overwrites a sale's editable columns and its net proceeds.
    ///
    /// Cost basis and profit are left to [`set_cost_basis`](Self::set_cost_basis).
    pub async fn update(&mut self, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, "Updating sale");

        let result = sqlx::query(
            r#"
            UPDATE sales SET
                sale_date = ?3,
                platform = ?4,
                game = ?5,
                card_name = ?6,
                set_name = ?7,
                variant = ?8,
                condition = ?9,
                qty_sold = ?10,
                sale_price_each_cents = ?11,
                platform_fee_cents = ?12,
                processing_fee_cents = ?13,
                shipping_cost_cents = ?14,
                other_fees_cents = ?15,
                net_proceeds_cents = ?16,
                updated_at = ?17
            WHERE id = ?1 AND user_id = ?2
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.user_id)
        .bind(sale.sale_date)
        .bind(&sale.platform)
        .bind(sale.game)
        .bind(&sale.card_name)
        .bind(&sale.set_name)
        .bind(&sale.variant)
        .bind(sale.condition)
        .bind(sale.qty_sold)
        .bind(sale.sale_price_each_cents)
        .bind(sale.platform_fee_cents)
        .bind(sale.processing_fee_cents)
        .bind(sale.shipping_cost_cents)
        .bind(sale.other_fees_cents)
        .bind(sale.net_proceeds_cents)
        .bind(sale.updated_at)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", &sale.id));
        }

        Ok(())
    }

    /// Patches the FIFO-derived columns after allocation.
    pub async fn set_cost_basis(
        &mut self,
        id: &str,
        cost_basis_used_cents: i64,
        realized_profit_cents: i64,
    ) -> DbResult<()> {
        debug!(
            id = %id,
            cost_basis = cost_basis_used_cents,
            profit = realized_profit_cents,
            "Patching sale cost basis"
        );

        let result = sqlx::query(
            r#"
            UPDATE sales SET
                cost_basis_used_cents = ?2,
                realized_profit_cents = ?3,
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(cost_basis_used_cents)
        .bind(realized_profit_cents)
        .bind(Utc::now())
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }

        Ok(())
    }

    /// Deletes a sale. Its consumption records go with it (`ON DELETE CASCADE`).
    pub async fn delete(&mut self, user_id: &str, id: &str) -> DbResult<()> {
        debug!(id = %id, user_id = %user_id, "Deleting sale");

        let result = sqlx::query("DELETE FROM sales WHERE id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }

        Ok(())
    }

    /// One page of a user's sales, newest first, plus the total match count.
    pub async fn list(&mut self, user_id: &str, query: &SaleQuery) -> DbResult<(Vec<Sale>, i64)> {
        const FILTER: &str = r#"
            WHERE user_id = ?1
              AND (?2 IS NULL OR game = ?2)
              AND (?3 IS NULL OR platform = ?3)
              AND (?4 IS NULL OR card_name LIKE ?4 ESCAPE '\')
        "#;

        let pattern = query.search.as_deref().map(like_pattern);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM sales {FILTER}"))
            .bind(user_id)
            .bind(query.game)
            .bind(&query.platform)
            .bind(&pattern)
            .fetch_one(&mut *self.conn)
            .await?;

        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales {FILTER} \
             ORDER BY sale_date DESC, rowid DESC LIMIT ?5 OFFSET ?6"
        );

        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(user_id)
            .bind(query.game)
            .bind(&query.platform)
            .bind(&pattern)
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok((sales, total))
    }

    /// A user's sales dated on or after `from_date` (for reporting).
    pub async fn since(&mut self, user_id: &str, from_date: NaiveDate) -> DbResult<Vec<Sale>> {
        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE user_id = ?1 AND sale_date >= ?2 \
             ORDER BY sale_date ASC, rowid ASC"
        );

        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(user_id)
            .bind(from_date)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(sales)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
