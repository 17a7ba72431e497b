//! # Ledger Service
//!
//! The operations request handlers call. Each mutating operation follows
//! the same shape:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate input (user id, payload)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  lock every touched (user_id, CardIdentity) group   ← IdentityLocks   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                  │
//! │    read current rows (re-checked under the lock)                       │
//! │    write rows                                                           │
//! │    allocate / recalculate                             ← engine         │
//! │  COMMIT  (any error before this point rolls everything back)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Which Groups Get Recalculated
//! | Operation | Groups |
//! |-----------|--------|
//! | `record_sale` | none (allocates the new sale only) |
//! | `update_sale` | old identity, and new identity if it moved |
//! | `delete_sale` | the sale's identity |
//! | `update_lot` (qty, cost, date or identity) | old identity, and new identity if it moved |
//! | `recalculate_for_card` | the given identity |

mod engine;
mod locks;
#[cfg(test)]
mod tests;

pub use engine::RecalcSummary;
pub use locks::{IdentityGuard, IdentityLocks};

use cardledger_core::report::dashboard_stats;
use cardledger_core::validation::{
    validate_identity, validate_new_lot, validate_new_sale, validate_page, validate_quantity,
    validate_search_query, validate_user_id, validate_uuid,
};
use cardledger_core::{
    cost_per_card, page_offset, CardIdentity, CoreError, DashboardStats, FifoBook,
    FifoConsumption, InventoryFilters, InventoryLot, LotPatch, Money, NewLot, NewSale, Page,
    Sale, SaleFilters, SalePatch, SalePreview, StatsPeriod, DEFAULT_PAGE_SIZE,
};
use chrono::{NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::consumption::ConsumptionRepository;
use crate::repository::lot::{LotQuery, LotRepository};
use crate::repository::sale::{SaleQuery, SaleRepository};

/// Entry point for every ledger operation.
///
/// Cheap to clone; clones share the pool and the lock registry, so one
/// service (or its clones) should front a given database in a process.
#[derive(Debug, Clone)]
pub struct LedgerService {
    db: Database,
    locks: IdentityLocks,
    default_page_size: u32,
}

impl LedgerService {
    /// Creates a service with the default page size.
    pub fn new(db: Database) -> Self {
        LedgerService {
            db,
            locks: IdentityLocks::new(),
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Creates a service using the listing defaults from `config`.
    pub fn with_config(db: Database, config: &LedgerConfig) -> Self {
        LedgerService {
            default_page_size: config.default_page_size,
            ..Self::new(db)
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Sales
    // =========================================================================

    /// Records a sale and allocates its cost basis FIFO.
    ///
    /// ## Errors
    /// - `Validation` for a bad payload
    /// - `InsufficientInventory` if the identity group cannot cover
    ///   `qty_sold`; nothing is written
    pub async fn record_sale(&self, user_id: &str, payload: NewSale) -> DbResult<Sale> {
        validate_user_id(user_id)?;
        validate_new_sale(&payload)?;

        let identity = payload.identity();
        let _guard = self.locks.acquire(user_id, [identity.clone()]).await;

        let result = async {
            let mut tx = self.db.begin().await?;

            let now = Utc::now();
            let net = payload.net_proceeds();
            let sale = Sale {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                sale_date: payload.sale_date,
                platform: payload.platform.clone(),
                game: payload.game,
                card_name: payload.card_name.clone(),
                set_name: payload.set_name.clone(),
                variant: payload.variant.clone(),
                condition: payload.condition,
                qty_sold: payload.qty_sold,
                sale_price_each_cents: payload.sale_price_each_cents,
                platform_fee_cents: payload.platform_fee_cents,
                processing_fee_cents: payload.processing_fee_cents,
                shipping_cost_cents: payload.shipping_cost_cents,
                other_fees_cents: payload.other_fees_cents,
                net_proceeds_cents: net.cents(),
                cost_basis_used_cents: 0,
                realized_profit_cents: 0,
                created_at: now,
                updated_at: now,
            };

            SaleRepository::new(&mut tx).insert(&sale).await?;
            engine::allocate_sale(&mut tx, &sale).await?;
            let stored = require_sale(
                SaleRepository::new(&mut tx).get(user_id, &sale.id).await?,
                &sale.id,
            )?;

            tx.commit().await?;
            Ok::<_, DbError>(stored)
        }
        .await;

        match &result {
            Ok(sale) => info!(
                user_id = %user_id,
                sale_id = %sale.id,
                card = %identity,
                qty = sale.qty_sold,
                cost_basis = sale.cost_basis_used_cents,
                profit = sale.realized_profit_cents,
                "Sale recorded"
            ),
            Err(err) => warn!(
                user_id = %user_id,
                card = %identity,
                qty = payload.qty_sold,
                kind = ?err.kind(),
                error = %err,
                "Sale rejected"
            ),
        }

        result
    }

    /// Edits a sale and rebuilds the affected identity groups.
    ///
    /// When the edit moves the sale to another identity, both the old and
    /// the new group are recalculated in the same transaction.
    pub async fn update_sale(
        &self,
        user_id: &str,
        sale_id: &str,
        patch: SalePatch,
    ) -> DbResult<Sale> {
        validate_user_id(user_id)?;
        validate_uuid(sale_id)?;

        let existing = self.get_sale(user_id, sale_id).await?;
        let merged = patch.apply_to(&existing);
        validate_new_sale(&merged)?;

        let old_identity = existing.identity();
        let new_identity = merged.identity();
        let _guard = self
            .locks
            .acquire(user_id, [old_identity.clone(), new_identity.clone()])
            .await;

        let result = async {
            let mut tx = self.db.begin().await?;

            // Re-read under the lock: the sale may have moved or vanished
            let current = require_sale(
                SaleRepository::new(&mut tx).get(user_id, sale_id).await?,
                sale_id,
            )?;
            if current.identity() != old_identity {
                return Err(DbError::concurrent_modification("Sale", sale_id));
            }
            let merged = patch.apply_to(&current);
            validate_new_sale(&merged)?;

            let updated = Sale {
                sale_date: merged.sale_date,
                platform: merged.platform.clone(),
                game: merged.game,
                card_name: merged.card_name.clone(),
                set_name: merged.set_name.clone(),
                variant: merged.variant.clone(),
                condition: merged.condition,
                qty_sold: merged.qty_sold,
                sale_price_each_cents: merged.sale_price_each_cents,
                platform_fee_cents: merged.platform_fee_cents,
                processing_fee_cents: merged.processing_fee_cents,
                shipping_cost_cents: merged.shipping_cost_cents,
                other_fees_cents: merged.other_fees_cents,
                net_proceeds_cents: merged.net_proceeds().cents(),
                updated_at: Utc::now(),
                ..current
            };

            SaleRepository::new(&mut tx).update(&updated).await?;
            ConsumptionRepository::new(&mut tx).delete_for_sale(sale_id).await?;

            engine::recalculate(&mut tx, user_id, &old_identity).await?;
            if new_identity != old_identity {
                engine::recalculate(&mut tx, user_id, &new_identity).await?;
            }

            let stored = require_sale(
                SaleRepository::new(&mut tx).get(user_id, sale_id).await?,
                sale_id,
            )?;
            tx.commit().await?;
            Ok::<_, DbError>(stored)
        }
        .await;

        match &result {
            Ok(sale) => info!(
                user_id = %user_id,
                sale_id = %sale_id,
                from = %old_identity,
                to = %new_identity,
                cost_basis = sale.cost_basis_used_cents,
                profit = sale.realized_profit_cents,
                "Sale updated"
            ),
            Err(err) => warn!(
                user_id = %user_id,
                sale_id = %sale_id,
                kind = ?err.kind(),
                error = %err,
                "Sale update rejected"
            ),
        }

        result
    }

    /// Deletes a sale, returns its units to the lots and re-costs the
    /// remaining sales of its group.
    pub async fn delete_sale(&self, user_id: &str, sale_id: &str) -> DbResult<()> {
        validate_user_id(user_id)?;
        validate_uuid(sale_id)?;

        let identity = self.get_sale(user_id, sale_id).await?.identity();
        let _guard = self.locks.acquire(user_id, [identity.clone()]).await;

        let result = async {
            let mut tx = self.db.begin().await?;

            let current = require_sale(
                SaleRepository::new(&mut tx).get(user_id, sale_id).await?,
                sale_id,
            )?;
            if current.identity() != identity {
                return Err(DbError::concurrent_modification("Sale", sale_id));
            }

            // Consumption records cascade with the sale row
            SaleRepository::new(&mut tx).delete(user_id, sale_id).await?;
            let summary = engine::recalculate(&mut tx, user_id, &identity).await?;

            tx.commit().await?;
            Ok::<_, DbError>(summary)
        }
        .await;

        match result {
            Ok(summary) => {
                info!(
                    user_id = %user_id,
                    sale_id = %sale_id,
                    card = %identity,
                    sales_replayed = summary.sales_replayed,
                    "Sale deleted"
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    user_id = %user_id,
                    sale_id = %sale_id,
                    kind = ?err.kind(),
                    error = %err,
                    "Sale delete rejected"
                );
                Err(err)
            }
        }
    }

    /// Rebuilds one identity group's allocations from scratch.
    ///
    /// Idempotent: a second call changes nothing.
    pub async fn recalculate_for_card(
        &self,
        user_id: &str,
        identity: &CardIdentity,
    ) -> DbResult<RecalcSummary> {
        validate_user_id(user_id)?;
        validate_identity(identity)?;

        let _guard = self.locks.acquire(user_id, [identity.clone()]).await;

        let mut tx = self.db.begin().await?;
        let summary = engine::recalculate(&mut tx, user_id, identity).await?;
        tx.commit().await?;

        info!(
            user_id = %user_id,
            card = %identity,
            sales_replayed = summary.sales_replayed,
            lots_restored = summary.lots_restored,
            "Identity group recalculated"
        );

        Ok(summary)
    }

    /// A sale's consumption records, oldest first.
    pub async fn consumptions_for_sale(
        &self,
        user_id: &str,
        sale_id: &str,
    ) -> DbResult<Vec<FifoConsumption>> {
        validate_user_id(user_id)?;
        validate_uuid(sale_id)?;

        let mut conn = self.db.pool().acquire().await?;
        require_sale(SaleRepository::new(&mut conn).get(user_id, sale_id).await?, sale_id)?;
        ConsumptionRepository::new(&mut conn).for_sale(sale_id).await
    }

    pub async fn get_sale(&self, user_id: &str, sale_id: &str) -> DbResult<Sale> {
        validate_user_id(user_id)?;
        validate_uuid(sale_id)?;

        let mut conn = self.db.pool().acquire().await?;
        let sale = SaleRepository::new(&mut conn).get(user_id, sale_id).await?;
        require_sale(sale, sale_id)
    }

    /// A page of the user's sales, newest sale date first.
    pub async fn list_sales(&self, user_id: &str, filters: &SaleFilters) -> DbResult<Page<Sale>> {
        validate_user_id(user_id)?;
        let page_size = self.resolve_page(filters.page, filters.page_size)?;

        let query = SaleQuery {
            game: filters.game,
            platform: filters.platform.clone().filter(|p| !p.trim().is_empty()),
            search: validate_search_query(filters.search.as_deref())?,
            limit: page_size as i64,
            offset: page_offset(filters.page, page_size),
        };

        let mut conn = self.db.pool().acquire().await?;
        let (data, total_count) = SaleRepository::new(&mut conn).list(user_id, &query).await?;

        Ok(Page {
            data,
            total_count,
            page: filters.page,
            page_size,
        })
    }

    // =========================================================================
    // Lots
    // =========================================================================

    /// Records a purchase lot with everything on hand.
    pub async fn create_lot(&self, user_id: &str, payload: NewLot) -> DbResult<InventoryLot> {
        validate_user_id(user_id)?;
        validate_new_lot(&payload)?;

        let identity = payload.identity();
        let _guard = self.locks.acquire(user_id, [identity.clone()]).await;

        let now = Utc::now();
        let lot = InventoryLot {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            game: payload.game,
            card_name: payload.card_name,
            set_name: payload.set_name,
            variant: payload.variant,
            condition: payload.condition,
            qty_initial: payload.qty_initial,
            qty_on_hand: payload.qty_initial,
            purchase_date: payload.purchase_date,
            vendor: payload.vendor,
            total_cost_cents: payload.total_cost_cents,
            cost_per_card_cents: cost_per_card(
                Money::from_cents(payload.total_cost_cents),
                payload.qty_initial,
            )
            .cents(),
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.db.begin().await?;
        LotRepository::new(&mut tx).insert(&lot).await?;
        tx.commit().await?;

        info!(
            user_id = %user_id,
            lot_id = %lot.id,
            card = %identity,
            qty = lot.qty_initial,
            cost_per_card = lot.cost_per_card_cents,
            "Lot created"
        );

        Ok(lot)
    }

    /// Edits a lot.
    ///
    /// Edits that can change allocations (identity, quantity, cost, purchase
    /// date) rebuild the old group and, if the lot moved, the new one.
    ///
    /// ## Errors
    /// `InsufficientInventory` if the edited lots can no longer cover the
    /// sales already recorded (e.g. `qty_initial` cut below what was sold).
    pub async fn update_lot(
        &self,
        user_id: &str,
        lot_id: &str,
        patch: LotPatch,
    ) -> DbResult<InventoryLot> {
        validate_user_id(user_id)?;
        validate_uuid(lot_id)?;

        let existing = self.get_lot(user_id, lot_id).await?;
        let merged = patch.apply_to(&existing);
        validate_new_lot(&merged)?;

        let old_identity = existing.identity();
        let new_identity = merged.identity();
        let _guard = self
            .locks
            .acquire(user_id, [old_identity.clone(), new_identity.clone()])
            .await;

        let result = async {
            let mut tx = self.db.begin().await?;

            let current = require_lot(
                LotRepository::new(&mut tx).get(user_id, lot_id).await?,
                lot_id,
            )?;
            if current.identity() != old_identity {
                return Err(DbError::concurrent_modification("InventoryLot", lot_id));
            }
            let merged = patch.apply_to(&current);
            validate_new_lot(&merged)?;
            let reallocate = patch.affects_allocation();

            let updated = InventoryLot {
                game: merged.game,
                card_name: merged.card_name.clone(),
                set_name: merged.set_name.clone(),
                variant: merged.variant.clone(),
                condition: merged.condition,
                qty_initial: merged.qty_initial,
                // Recalculation re-derives on-hand from the replay
                qty_on_hand: if reallocate {
                    merged.qty_initial
                } else {
                    current.qty_on_hand
                },
                purchase_date: merged.purchase_date,
                vendor: merged.vendor.clone(),
                total_cost_cents: merged.total_cost_cents,
                cost_per_card_cents: cost_per_card(merged.total_cost(), merged.qty_initial).cents(),
                updated_at: Utc::now(),
                ..current
            };

            LotRepository::new(&mut tx).update(&updated).await?;

            if reallocate {
                engine::recalculate(&mut tx, user_id, &old_identity).await?;
                if new_identity != old_identity {
                    engine::recalculate(&mut tx, user_id, &new_identity).await?;
                }
            }

            let stored = require_lot(
                LotRepository::new(&mut tx).get(user_id, lot_id).await?,
                lot_id,
            )?;
            tx.commit().await?;
            Ok::<_, DbError>(stored)
        }
        .await;

        match &result {
            Ok(lot) => info!(
                user_id = %user_id,
                lot_id = %lot_id,
                from = %old_identity,
                to = %new_identity,
                qty_on_hand = lot.qty_on_hand,
                "Lot updated"
            ),
            Err(err) => warn!(
                user_id = %user_id,
                lot_id = %lot_id,
                kind = ?err.kind(),
                error = %err,
                "Lot update rejected"
            ),
        }

        result
    }

    /// Deletes a lot that no sale has drawn from.
    ///
    /// ## Errors
    /// `DependencyConflict` (`CoreError::LotHasConsumptions`) while any
    /// consumption record references the lot.
    pub async fn delete_lot(&self, user_id: &str, lot_id: &str) -> DbResult<()> {
        validate_user_id(user_id)?;
        validate_uuid(lot_id)?;

        let identity = self.get_lot(user_id, lot_id).await?.identity();
        let _guard = self.locks.acquire(user_id, [identity.clone()]).await;

        let result = async {
            let mut tx = self.db.begin().await?;

            require_lot(LotRepository::new(&mut tx).get(user_id, lot_id).await?, lot_id)?;

            let consumption_count = ConsumptionRepository::new(&mut tx)
                .count_for_lot(lot_id)
                .await?;
            if consumption_count > 0 {
                return Err(CoreError::LotHasConsumptions {
                    lot_id: lot_id.to_string(),
                    consumption_count,
                }
                .into());
            }

            LotRepository::new(&mut tx).delete(user_id, lot_id).await?;
            tx.commit().await?;
            Ok::<_, DbError>(())
        }
        .await;

        match &result {
            Ok(()) => info!(user_id = %user_id, lot_id = %lot_id, card = %identity, "Lot deleted"),
            Err(err) => warn!(
                user_id = %user_id,
                lot_id = %lot_id,
                kind = ?err.kind(),
                error = %err,
                "Lot delete rejected"
            ),
        }

        result
    }

    pub async fn get_lot(&self, user_id: &str, lot_id: &str) -> DbResult<InventoryLot> {
        validate_user_id(user_id)?;
        validate_uuid(lot_id)?;

        let mut conn = self.db.pool().acquire().await?;
        let lot = LotRepository::new(&mut conn).get(user_id, lot_id).await?;
        require_lot(lot, lot_id)
    }

    /// A page of the user's lots, oldest purchase first.
    pub async fn list_lots(
        &self,
        user_id: &str,
        filters: &InventoryFilters,
    ) -> DbResult<Page<InventoryLot>> {
        validate_user_id(user_id)?;
        let page_size = self.resolve_page(filters.page, filters.page_size)?;

        let query = LotQuery {
            game: filters.game,
            condition: filters.condition,
            search: validate_search_query(filters.search.as_deref())?,
            limit: page_size as i64,
            offset: page_offset(filters.page, page_size),
        };

        let mut conn = self.db.pool().acquire().await?;
        let (data, total_count) = LotRepository::new(&mut conn).list(user_id, &query).await?;

        Ok(Page {
            data,
            total_count,
            page: filters.page,
            page_size,
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Units on hand across an identity group.
    pub async fn available_qty(&self, user_id: &str, identity: &CardIdentity) -> DbResult<i64> {
        validate_user_id(user_id)?;
        validate_identity(identity)?;

        let mut conn = self.db.pool().acquire().await?;
        LotRepository::new(&mut conn).available_qty(user_id, identity).await
    }

    /// What selling `qty` units for `net_proceeds` would cost right now.
    /// Nothing is written and a shortfall is reported, not raised.
    pub async fn preview_sale(
        &self,
        user_id: &str,
        identity: &CardIdentity,
        qty: i64,
        net_proceeds: Money,
    ) -> DbResult<SalePreview> {
        validate_user_id(user_id)?;
        validate_identity(identity)?;
        validate_quantity("qty", qty)?;

        let mut conn = self.db.pool().acquire().await?;
        let lots = LotRepository::new(&mut conn)
            .available_for_identity(user_id, identity)
            .await?;

        Ok(FifoBook::new(identity.clone(), lots).preview_sale(qty, net_proceeds))
    }

    /// Dashboard statistics for the period ending today (UTC).
    pub async fn dashboard_stats(
        &self,
        user_id: &str,
        period: StatsPeriod,
    ) -> DbResult<DashboardStats> {
        self.dashboard_stats_on(user_id, period, Utc::now().date_naive()).await
    }

    /// Dashboard statistics for the period ending on `today`.
    pub async fn dashboard_stats_on(
        &self,
        user_id: &str,
        period: StatsPeriod,
        today: NaiveDate,
    ) -> DbResult<DashboardStats> {
        validate_user_id(user_id)?;

        let mut conn = self.db.pool().acquire().await?;
        let sales = SaleRepository::new(&mut conn)
            .since(user_id, period.start_date(today))
            .await?;
        let lots = LotRepository::new(&mut conn).all_for_user(user_id).await?;

        Ok(dashboard_stats(period, today, &sales, &lots))
    }

    fn resolve_page(&self, page: u32, page_size: Option<u32>) -> DbResult<u32> {
        let page_size = page_size.unwrap_or(self.default_page_size);
        validate_page(page, page_size)?;
        Ok(page_size)
    }
}

fn require_sale(sale: Option<Sale>, sale_id: &str) -> DbResult<Sale> {
    sale.ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()).into())
}

fn require_lot(lot: Option<InventoryLot>, lot_id: &str) -> DbResult<InventoryLot> {
    lot.ok_or_else(|| CoreError::LotNotFound(lot_id.to_string()).into())
}
