//! # FIFO Engine (transactional half)
//!
//! Applies plans from `cardledger_core::fifo` to the database. Every function
//! here runs on the caller's connection, which is always an open transaction:
//! a failure anywhere leaves nothing behind once the caller drops it.
//!
//! ## Allocation
//! ```text
//! load lots (qty_on_hand > 0, FIFO order)
//!      │
//!      ▼
//! FifoBook::consume(qty) ── short? ──► InsufficientInventory (rollback)
//!      │
//!      ▼
//! for each take:  guarded decrement ── lost race? ──► ConcurrentModification
//!                 insert consumption record
//!      │
//!      ▼
//! patch sale: cost_basis_used, realized_profit
//! ```
//!
//! ## Recalculation
//! ```text
//! delete consumption records of the group
//! restore every lot of the group to qty_initial
//! replay every sale of the group (sale_date ASC, creation order)
//! ```
//! Running it twice in a row produces the same lots, records and profits.

use cardledger_core::{
    AllocationPlan, CardIdentity, FifoBook, FifoConsumption, Money, Sale,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::consumption::ConsumptionRepository;
use crate::repository::lot::LotRepository;
use crate::repository::sale::SaleRepository;

/// Outcome of rebuilding one identity group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecalcSummary {
    /// Consumption records removed before the replay.
    pub records_cleared: u64,
    /// Lots restored to their initial quantity.
    pub lots_restored: u64,
    /// Sales re-allocated, in replay order.
    pub sales_replayed: usize,
    /// Consumption records written by the replay.
    pub records_written: usize,
}

/// Allocates one freshly inserted sale against its identity group and
/// patches the sale's cost basis and profit.
pub(crate) async fn allocate_sale(
    conn: &mut SqliteConnection,
    sale: &Sale,
) -> DbResult<AllocationPlan> {
    let identity = sale.identity();
    let lots = LotRepository::new(&mut *conn)
        .available_for_identity(&sale.user_id, &identity)
        .await?;

    let mut book = FifoBook::new(identity, lots);
    let plan = book.consume(sale.qty_sold)?;

    write_allocation(conn, sale, &plan).await?;
    Ok(plan)
}

/// Rebuilds every allocation of one identity group from scratch.
pub(crate) async fn recalculate(
    conn: &mut SqliteConnection,
    user_id: &str,
    identity: &CardIdentity,
) -> DbResult<RecalcSummary> {
    let records_cleared = ConsumptionRepository::new(&mut *conn)
        .delete_for_identity(user_id, identity)
        .await?;

    let mut lots = LotRepository::new(&mut *conn);
    let lots_restored = lots.restore_identity(user_id, identity).await?;
    let restored = lots.for_identity(user_id, identity).await?;

    let sales = SaleRepository::new(&mut *conn)
        .for_identity(user_id, identity)
        .await?;

    let mut book = FifoBook::new(identity.clone(), restored);
    let mut records_written = 0;
    for sale in &sales {
        let plan = book.consume(sale.qty_sold)?;
        write_allocation(conn, sale, &plan).await?;
        records_written += plan.takes.len();
    }

    let summary = RecalcSummary {
        records_cleared,
        lots_restored,
        sales_replayed: sales.len(),
        records_written,
    };

    debug!(
        user_id = %user_id,
        card = %identity,
        sales = summary.sales_replayed,
        records = summary.records_written,
        "Identity group recalculated"
    );

    Ok(summary)
}

/// Writes a plan: lot decrements, consumption records, sale patch.
async fn write_allocation(
    conn: &mut SqliteConnection,
    sale: &Sale,
    plan: &AllocationPlan,
) -> DbResult<()> {
    let now = Utc::now();

    for take in &plan.takes {
        LotRepository::new(&mut *conn)
            .decrement_on_hand(&take.lot_id, take.qty_taken)
            .await?;

        ConsumptionRepository::new(&mut *conn)
            .insert(&FifoConsumption {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                inventory_lot_id: take.lot_id.clone(),
                qty_taken: take.qty_taken,
                cost_per_card_cents: take.cost_per_card_cents,
                cost_total_cents: take.cost_total_cents,
                created_at: now,
            })
            .await?;
    }

    let profit = plan.profit(Money::from_cents(sale.net_proceeds_cents));
    SaleRepository::new(&mut *conn)
        .set_cost_basis(&sale.id, plan.cost_basis_cents, profit.cents())
        .await?;

    Ok(())
}
