//! # FIFO Consumption Repository
//!
//! Audit records linking a sale to the lots it drew cost basis from.
//! Records are never edited: allocation inserts them, recalculation deletes
//! and regenerates them.

use cardledger_core::{CardIdentity, FifoConsumption};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;

/// Repository for consumption record operations.
pub struct ConsumptionRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ConsumptionRepository<'c> {
    /// Creates a new ConsumptionRepository.
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        ConsumptionRepository { conn }
    }

    /// Inserts one consumption record.
    pub async fn insert(&mut self, record: &FifoConsumption) -> DbResult<()> {
        debug!(
            sale_id = %record.sale_id,
            lot_id = %record.inventory_lot_id,
            qty = record.qty_taken,
            "Recording consumption"
        );

        sqlx::query(
            r#"
            INSERT INTO fifo_consumption (
                id, sale_id, inventory_lot_id, qty_taken,
                cost_per_card_cents, cost_total_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&record.id)
        .bind(&record.sale_id)
        .bind(&record.inventory_lot_id)
        .bind(record.qty_taken)
        .bind(record.cost_per_card_cents)
        .bind(record.cost_total_cents)
        .bind(record.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// A sale's records in the order they were created.
    pub async fn for_sale(&mut self, sale_id: &str) -> DbResult<Vec<FifoConsumption>> {
        let records = sqlx::query_as::<_, FifoConsumption>(
            r#"
            SELECT id, sale_id, inventory_lot_id, qty_taken,
                   cost_per_card_cents, cost_total_cents, created_at
            FROM fifo_consumption
            WHERE sale_id = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(sale_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(records)
    }

    /// Number of records drawing from a lot.
    pub async fn count_for_lot(&mut self, lot_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM fifo_consumption WHERE inventory_lot_id = ?1")
                .bind(lot_id)
                .fetch_one(&mut *self.conn)
                .await?;

        Ok(count)
    }

    /// Deletes a single sale's records.
    pub async fn delete_for_sale(&mut self, sale_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM fifo_consumption WHERE sale_id = ?1")
            .bind(sale_id)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected())
    }

    /// Deletes every record touching an identity group: records of the
    /// group's sales, and records drawing from the group's lots.
    ///
    /// The second half catches records left behind when a sale or lot has
    /// just moved to another identity.
    pub async fn delete_for_identity(
        &mut self,
        user_id: &str,
        identity: &CardIdentity,
    ) -> DbResult<u64> {
        debug!(user_id = %user_id, card = %identity, "Clearing consumption records");

        let result = sqlx::query(
            r#"
            DELETE FROM fifo_consumption
            WHERE sale_id IN (
                SELECT id FROM sales
                WHERE user_id = ?1
                  AND game = ?2 AND card_name = ?3 AND set_name = ?4
                  AND variant = ?5 AND condition = ?6
            )
            OR inventory_lot_id IN (
                SELECT id FROM inventory_lots
                WHERE user_id = ?1
                  AND game = ?2 AND card_name = ?3 AND set_name = ?4
                  AND variant = ?5 AND condition = ?6
            )
            "#,
        )
        .bind(user_id)
        .bind(identity.game)
        .bind(&identity.card_name)
        .bind(&identity.set_name)
        .bind(&identity.variant)
        .bind(identity.condition)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
