//! # FIFO Allocation Planning
//!
//! Pure first-in-first-out cost-basis planning. No I/O: the db crate loads
//! lots, asks this module for a plan, then writes the plan inside a
//! transaction.
//!
//! ## How A Sale Draws From Lots
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Sell 15 × Charizard (Base Set) NM                                      │
//! │                                                                         │
//! │  Lots (purchase_date ASC, then creation order):                        │
//! │                                                                         │
//! │   Lot A  2024-01-01  on hand 10  @ $10.00 ──► take 10 = $100.00        │
//! │   Lot B  2024-02-01  on hand 10  @ $15.00 ──► take  5 =  $75.00        │
//! │   Lot C  2024-03-01  on hand  4  @ $20.00     (not reached)            │
//! │                                                                         │
//! │  cost basis = $175.00        A → 0 on hand, B → 5 on hand              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Shortfall
//! [`plan_allocation`] reports how much it could cover; [`FifoBook::consume`]
//! refuses a plan that falls short, so a sale is never partially costed.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{realized_profit, CardIdentity, InventoryLot};

// =============================================================================
// Plan Types
// =============================================================================

/// Units drawn from one lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LotTake {
    pub lot_id: String,
    pub qty_taken: i64,
    /// The lot's rate at planning time.
    pub cost_per_card_cents: i64,
    /// `qty_taken * cost_per_card_cents`.
    pub cost_total_cents: i64,
}

impl LotTake {
    #[inline]
    pub fn cost_total(&self) -> Money {
        Money::from_cents(self.cost_total_cents)
    }
}

/// Ordered takes covering (some or all of) a requested quantity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AllocationPlan {
    pub qty_requested: i64,
    pub qty_allocated: i64,
    pub takes: Vec<LotTake>,
    /// Σ `takes[i].cost_total_cents`.
    pub cost_basis_cents: i64,
}

impl AllocationPlan {
    #[inline]
    pub fn cost_basis(&self) -> Money {
        Money::from_cents(self.cost_basis_cents)
    }

    /// Units the available lots could not cover.
    #[inline]
    pub fn shortfall(&self) -> i64 {
        self.qty_requested - self.qty_allocated
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.shortfall() == 0
    }

    /// `net_proceeds - cost_basis`.
    pub fn profit(&self, net_proceeds: Money) -> Money {
        realized_profit(net_proceeds, self.cost_basis())
    }
}

/// What a sale would cost if recorded now. Nothing is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalePreview {
    /// Σ `qty_on_hand` for the identity group.
    pub qty_available: i64,
    pub plan: AllocationPlan,
    pub estimated_cost_basis_cents: i64,
    /// `net_proceeds - estimated_cost_basis`.
    pub estimated_profit_cents: i64,
}

impl SalePreview {
    /// True if the lots cover the whole quantity, i.e. recording the sale
    /// would not fail with `InsufficientInventory`.
    #[inline]
    pub fn is_sufficient(&self) -> bool {
        self.plan.is_complete()
    }
}

// =============================================================================
// Planner
// =============================================================================

/// Walks `lots` in the given order and takes `min(remaining, qty_on_hand)`
/// from each until `qty` is covered or the lots run out.
///
/// `lots` must already be in FIFO order and belong to one identity group.
/// Lots with nothing on hand are skipped.
///
/// ## Example
/// ```rust
/// use cardledger_core::fifo::plan_allocation;
/// # use cardledger_core::fifo::test_support::lot;
///
/// let lots = vec![lot("a", 10, 10, 10_000), lot("b", 10, 10, 15_000)];
/// let plan = plan_allocation(&lots, 15);
/// assert_eq!(plan.cost_basis_cents, 17_500);
/// assert_eq!(plan.takes.len(), 2);
/// ```
pub fn plan_allocation(lots: &[InventoryLot], qty: i64) -> AllocationPlan {
    let mut plan = AllocationPlan {
        qty_requested: qty,
        ..Default::default()
    };

    let mut remaining = qty;
    for lot in lots {
        if remaining <= 0 {
            break;
        }
        if lot.qty_on_hand <= 0 {
            continue;
        }

        let qty_taken = remaining.min(lot.qty_on_hand);
        let cost_total = lot.cost_per_card().multiply_quantity(qty_taken);

        plan.takes.push(LotTake {
            lot_id: lot.id.clone(),
            qty_taken,
            cost_per_card_cents: lot.cost_per_card_cents,
            cost_total_cents: cost_total.cents(),
        });
        plan.qty_allocated += qty_taken;
        plan.cost_basis_cents = plan.cost_basis_cents.saturating_add(cost_total.cents());
        remaining -= qty_taken;
    }

    plan
}

/// Sorts lots into FIFO order: `purchase_date` ascending.
///
/// The sort is stable, so lots loaded in creation order keep that order
/// among themselves when they share a purchase date.
pub fn sort_fifo(lots: &mut [InventoryLot]) {
    lots.sort_by_key(|lot| lot.purchase_date);
}

// =============================================================================
// FIFO Book
// =============================================================================

/// In-memory view of one identity group's lots that tracks on-hand
/// quantities across several consecutive allocations.
///
/// Used for a single sale (one `consume`) and for recalculation, which
/// replays every remaining sale of the group in date order against lots
/// reset to their initial quantity.
#[derive(Debug, Clone)]
pub struct FifoBook {
    identity: CardIdentity,
    lots: Vec<InventoryLot>,
}

impl FifoBook {
    /// Builds a book from lots already in FIFO order.
    pub fn new(identity: CardIdentity, lots: Vec<InventoryLot>) -> Self {
        FifoBook { identity, lots }
    }

    /// Builds a book with every lot restored to `qty_initial`.
    pub fn restored(identity: CardIdentity, mut lots: Vec<InventoryLot>) -> Self {
        for lot in &mut lots {
            lot.qty_on_hand = lot.qty_initial;
        }
        FifoBook { identity, lots }
    }

    pub fn identity(&self) -> &CardIdentity {
        &self.identity
    }

    pub fn lots(&self) -> &[InventoryLot] {
        &self.lots
    }

    /// Σ `qty_on_hand` across the book.
    pub fn available(&self) -> i64 {
        self.lots.iter().map(|lot| lot.qty_on_hand.max(0)).sum()
    }

    /// Plans without mutating the book.
    pub fn preview(&self, qty: i64) -> AllocationPlan {
        plan_allocation(&self.lots, qty)
    }

    /// Estimates cost basis and profit for selling `qty` units for
    /// `net_proceeds`, without mutating the book.
    pub fn preview_sale(&self, qty: i64, net_proceeds: Money) -> SalePreview {
        let plan = self.preview(qty);
        SalePreview {
            qty_available: self.available(),
            estimated_cost_basis_cents: plan.cost_basis_cents,
            estimated_profit_cents: plan.profit(net_proceeds).cents(),
            plan,
        }
    }

    /// Plans `qty` units and applies the takes to the book.
    ///
    /// ## Errors
    /// `CoreError::InsufficientInventory` if the book cannot cover `qty`;
    /// the book is left unchanged.
    pub fn consume(&mut self, qty: i64) -> CoreResult<AllocationPlan> {
        let plan = plan_allocation(&self.lots, qty);
        if !plan.is_complete() {
            return Err(CoreError::InsufficientInventory {
                card: self.identity.to_string(),
                available: plan.qty_allocated,
                requested: qty,
            });
        }

        for take in &plan.takes {
            if let Some(lot) = self.lots.iter_mut().find(|lot| lot.id == take.lot_id) {
                lot.qty_on_hand -= take.qty_taken;
            }
        }

        Ok(plan)
    }
}

// =============================================================================
// Test Support
// =============================================================================

#[doc(hidden)]
pub mod test_support {
    use chrono::{NaiveDate, Utc};

    use crate::money::Money;
    use crate::types::{cost_per_card, Condition, Game, InventoryLot};

    /// A Charizard (Base Set) NM lot bought on 2024-01-01.
    pub fn lot(
        id: &str,
        qty_initial: i64,
        qty_on_hand: i64,
        total_cost_cents: i64,
    ) -> InventoryLot {
        let now = Utc::now();
        InventoryLot {
            id: id.to_string(),
            user_id: "user-1".to_string(),
            game: Game::Pokemon,
            card_name: "Charizard".to_string(),
            set_name: "Base Set".to_string(),
            variant: String::new(),
            condition: Condition::Nm,
            qty_initial,
            qty_on_hand,
            purchase_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            vendor: None,
            total_cost_cents,
            cost_per_card_cents: cost_per_card(Money::from_cents(total_cost_cents), qty_initial)
                .cents(),
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
