//! # Inventory Lot Repository
//!
//! Database operations for purchase lots.
//!
//! ## FIFO Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every query feeding the allocator orders by:                          │
//! │                                                                         │
//! │    purchase_date ASC, rowid ASC                                        │
//! │                                                                         │
//! │  rowid grows with insertion, so two lots bought on the same day are    │
//! │  consumed in the order they were recorded.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quantity Writes
//! `qty_on_hand` is only ever:
//! - decremented with a guard (`qty_on_hand >= ?`), or
//! - reset to `qty_initial` for a whole identity group during recalculation.

use cardledger_core::{CardIdentity, Condition, Game, InventoryLot};
use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::like_pattern;

const LOT_COLUMNS: &str = r#"
    id, user_id, game, card_name, set_name, variant, condition,
    qty_initial, qty_on_hand, purchase_date, vendor,
    total_cost_cents, cost_per_card_cents, created_at, updated_at
"#;

/// Resolved lot listing query.
#[derive(Debug, Clone, Default)]
pub struct LotQuery {
    pub game: Option<Game>,
    pub condition: Option<Condition>,
    /// Already trimmed; `None` matches everything.
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// Repository for inventory lot database operations.
///
/// Borrows a connection so the same calls work on a pooled connection or
/// inside an open transaction.
pub struct LotRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> LotRepository<'c> {
    /// Creates a new LotRepository.
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        LotRepository { conn }
    }

    /// Inserts a lot.
    pub async fn insert(&mut self, lot: &InventoryLot) -> DbResult<()> {
        debug!(id = %lot.id, user_id = %lot.user_id, qty = lot.qty_initial, "Inserting lot");

        sqlx::query(
            r#"
            INSERT INTO inventory_lots (
                id, user_id, game, card_name, set_name, variant, condition,
                qty_initial, qty_on_hand, purchase_date, vendor,
                total_cost_cents, cost_per_card_cents, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15
            )
            "#,
        )
        .bind(&lot.id)
        .bind(&lot.user_id)
        .bind(lot.game)
        .bind(&lot.card_name)
        .bind(&lot.set_name)
        .bind(&lot.variant)
        .bind(lot.condition)
        .bind(lot.qty_initial)
        .bind(lot.qty_on_hand)
        .bind(lot.purchase_date)
        .bind(&lot.vendor)
        .bind(lot.total_cost_cents)
        .bind(lot.cost_per_card_cents)
        .bind(lot.created_at)
        .bind(lot.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Gets a lot by ID, scoped to its owner.
    pub async fn get(&mut self, user_id: &str, id: &str) -> DbResult<Option<InventoryLot>> {
        let sql =
            format!("SELECT {LOT_COLUMNS} FROM inventory_lots WHERE id = ?1 AND user_id = ?2");

        let lot = sqlx::query_as::<_, InventoryLot>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(lot)
    }

    /// Lots of one identity group that still have units on hand, in FIFO order.
    pub async fn available_for_identity(
        &mut self,
        user_id: &str,
        identity: &CardIdentity,
    ) -> DbResult<Vec<InventoryLot>> {
        debug!(user_id = %user_id, card = %identity, "Loading available lots");

        let sql = format!(
            r#"
            SELECT {LOT_COLUMNS} FROM inventory_lots
            WHERE user_id = ?1
              AND game = ?2 AND card_name = ?3 AND set_name = ?4
              AND variant = ?5 AND condition = ?6
              AND qty_on_hand > 0
            ORDER BY purchase_date ASC, rowid ASC
            "#
        );

        let lots = sqlx::query_as::<_, InventoryLot>(&sql)
            .bind(user_id)
            .bind(identity.game)
            .bind(&identity.card_name)
            .bind(&identity.set_name)
            .bind(&identity.variant)
            .bind(identity.condition)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(lots)
    }

    /// Every lot of one identity group (including empty ones), in FIFO order.
    pub async fn for_identity(
        &mut self,
        user_id: &str,
        identity: &CardIdentity,
    ) -> DbResult<Vec<InventoryLot>> {
        let sql = format!(
            r#"
            SELECT {LOT_COLUMNS} FROM inventory_lots
            WHERE user_id = ?1
              AND game = ?2 AND card_name = ?3 AND set_name = ?4
              AND variant = ?5 AND condition = ?6
            ORDER BY purchase_date ASC, rowid ASC
            "#
        );

        let lots = sqlx::query_as::<_, InventoryLot>(&sql)
            .bind(user_id)
            .bind(identity.game)
            .bind(&identity.card_name)
            .bind(&identity.set_name)
            .bind(&identity.variant)
            .bind(identity.condition)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(lots)
    }

    /// Σ `qty_on_hand` for one identity group.
    pub async fn available_qty(&mut self, user_id: &str, identity: &CardIdentity) -> DbResult<i64> {
        let qty: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(qty_on_hand), 0) FROM inventory_lots
            WHERE user_id = ?1
              AND game = ?2 AND card_name = ?3 AND set_name = ?4
              AND variant = ?5 AND condition = ?6
            "#,
        )
        .bind(user_id)
        .bind(identity.game)
        .bind(&identity.card_name)
        .bind(&identity.set_name)
        .bind(&identity.variant)
        .bind(identity.condition)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(qty)
    }

    /// Removes `qty` units from a lot.
    ///
    /// ## Guard
    /// The update only matches while the lot still has at least `qty` on hand.
    /// If another writer got there first, nothing is written and
    /// `DbError::ConcurrentModification` is returned.
    pub async fn decrement_on_hand(&mut self, id: &str, qty: i64) -> DbResult<()> {
        debug!(id = %id, qty = qty, "Decrementing lot quantity");

        let result = sqlx::query(
            r#"
            UPDATE inventory_lots
            SET qty_on_hand = qty_on_hand - ?2,
                updated_at = ?3
            WHERE id = ?1 AND qty_on_hand >= ?2
            "#,
        )
        .bind(id)
        .bind(qty)
        .bind(Utc::now())
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::concurrent_modification("InventoryLot", id));
        }

        Ok(())
    }

    /// Resets every lot of an identity group to `qty_on_hand = qty_initial`.
    ///
    /// ## Returns
    /// Number of lots reset.
    pub async fn restore_identity(
        &mut self,
        user_id: &str,
        identity: &CardIdentity,
    ) -> DbResult<u64> {
        debug!(user_id = %user_id, card = %identity, "Restoring lot quantities");

        let result = sqlx::query(
            r#"
            UPDATE inventory_lots
            SET qty_on_hand = qty_initial,
                updated_at = ?7
            WHERE user_id = ?1
              AND game = ?2 AND card_name = ?3 AND set_name = ?4
              AND variant = ?5 AND condition = ?6
            "#,
        )
        .bind(user_id)
        .bind(identity.game)
        .bind(&identity.card_name)
        .bind(&identity.set_name)
        .bind(&identity.variant)
        .bind(identity.condition)
        .bind(Utc::now())
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Overwrites a lot's editable columns.
    pub async fn update(&mut self, lot: &InventoryLot) -> DbResult<()> {
        debug!(id = %lot.id, "Updating lot");

        let result = sqlx::query(
            r#"
            UPDATE inventory_lots SET
                game = ?3,
                card_name = ?4,
                set_name = ?5,
                variant = ?6,
                condition = ?7,
                qty_initial = ?8,
                qty_on_hand = ?9,
                purchase_date = ?10,
                vendor = ?11,
                total_cost_cents = ?12,
                cost_per_card_cents = ?13,
                updated_at = ?14
            WHERE id = ?1 AND user_id = ?2
            "#,
        )
        .bind(&lot.id)
        .bind(&lot.user_id)
        .bind(lot.game)
        .bind(&lot.card_name)
        .bind(&lot.set_name)
        .bind(&lot.variant)
        .bind(lot.condition)
        .bind(lot.qty_initial)
        .bind(lot.qty_on_hand)
        .bind(lot.purchase_date)
        .bind(&lot.vendor)
        .bind(lot.total_cost_cents)
        .bind(lot.cost_per_card_cents)
        .bind(lot.updated_at)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("InventoryLot", &lot.id));
        }

        Ok(())
    }

    /// Deletes a lot. Callers check for consumption records first.
    pub async fn delete(&mut self, user_id: &str, id: &str) -> DbResult<()> {
        debug!(id = %id, user_id = %user_id, "Deleting lot");

        let result = sqlx::query("DELETE FROM inventory_lots WHERE id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("InventoryLot", id));
        }

        Ok(())
    }

    /// One page of a user's lots, oldest purchase first, plus the total match count.
    pub async fn list(
        &mut self,
        user_id: &str,
        query: &LotQuery,
    ) -> DbResult<(Vec<InventoryLot>, i64)> {
        const FILTER: &str = r#"
            WHERE user_id = ?1
              AND (?2 IS NULL OR game = ?2)
              AND (?3 IS NULL OR condition = ?3)
              AND (?4 IS NULL OR card_name LIKE ?4 ESCAPE '\')
        "#;

        let pattern = query.search.as_deref().map(like_pattern);

        let count_sql = format!("SELECT COUNT(*) FROM inventory_lots {FILTER}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(user_id)
            .bind(query.game)
            .bind(query.condition)
            .bind(&pattern)
            .fetch_one(&mut *self.conn)
            .await?;

        let sql = format!(
            "SELECT {LOT_COLUMNS} FROM inventory_lots {FILTER} \
             ORDER BY purchase_date ASC, rowid ASC LIMIT ?5 OFFSET ?6"
        );

        let lots = sqlx::query_as::<_, InventoryLot>(&sql)
            .bind(user_id)
            .bind(query.game)
            .bind(query.condition)
            .bind(&pattern)
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok((lots, total))
    }

    /// Every lot the user owns (for reporting).
    pub async fn all_for_user(&mut self, user_id: &str) -> DbResult<Vec<InventoryLot>> {
        let sql = format!(
            "SELECT {LOT_COLUMNS} FROM inventory_lots WHERE user_id = ?1 \
             ORDER BY purchase_date ASC, rowid ASC"
        );

        let lots = sqlx::query_as::<_, InventoryLot>(&sql)
            .bind(user_id)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(lots)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
