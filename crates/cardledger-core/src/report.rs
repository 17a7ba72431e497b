//! # Dashboard Reporting
//!
//! Aggregates a user's sales and lots into the numbers shown on the
//! dashboard. Pure: the caller loads the rows.
//!
//! ```text
//!   sales with sale_date >= today - period ──► profit / revenue / fees
//!                                         └──► profit by day (ascending)
//!   all lots ─────────────────────────────► cards on hand, lot counts,
//!                                           inventory cost value
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::money::Money;
use crate::payload::StatsPeriod;
use crate::types::{InventoryLot, Sale};

/// Realized profit summed over one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailyProfit {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub profit_cents: i64,
}

/// Dashboard summary for one user and period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DashboardStats {
    pub period: StatsPeriod,
    #[ts(as = "String")]
    pub from_date: NaiveDate,
    pub total_profit_cents: i64,
    /// Σ net proceeds.
    pub total_revenue_cents: i64,
    pub total_fees_cents: i64,
    pub sales_count: i64,
    /// Σ `qty_on_hand` across every lot.
    pub cards_on_hand: i64,
    /// Lots with at least one unit on hand.
    pub active_lots: i64,
    pub total_lots: i64,
    /// Σ `qty_on_hand * cost_per_card`.
    pub inventory_value_cents: i64,
    pub profit_by_day: Vec<DailyProfit>,
}

impl DashboardStats {
    #[inline]
    pub fn total_profit(&self) -> Money {
        Money::from_cents(self.total_profit_cents)
    }

    #[inline]
    pub fn inventory_value(&self) -> Money {
        Money::from_cents(self.inventory_value_cents)
    }
}

/// Builds dashboard statistics.
///
/// Sales dated before `period.start_date(today)` are ignored; lots are
/// always counted in full since they describe current stock.
pub fn dashboard_stats(
    period: StatsPeriod,
    today: NaiveDate,
    sales: &[Sale],
    lots: &[InventoryLot],
) -> DashboardStats {
    let from_date = period.start_date(today);

    let mut total_profit = Money::zero();
    let mut total_revenue = Money::zero();
    let mut total_fees = Money::zero();
    let mut sales_count = 0;
    let mut by_day: BTreeMap<NaiveDate, Money> = BTreeMap::new();

    for sale in sales.iter().filter(|s| s.sale_date >= from_date) {
        total_profit += sale.realized_profit();
        total_revenue += sale.net_proceeds();
        total_fees += sale.total_fees();
        sales_count += 1;
        *by_day.entry(sale.sale_date).or_default() += sale.realized_profit();
    }

    let cards_on_hand = lots.iter().map(|lot| lot.qty_on_hand).sum();
    let active_lots = lots.iter().filter(|lot| lot.qty_on_hand > 0).count() as i64;
    let inventory_value: Money = lots.iter().map(InventoryLot::on_hand_value).sum();

    DashboardStats {
        period,
        from_date,
        total_profit_cents: total_profit.cents(),
        total_revenue_cents: total_revenue.cents(),
        total_fees_cents: total_fees.cents(),
        sales_count,
        cards_on_hand,
        active_lots,
        total_lots: lots.len() as i64,
        inventory_value_cents: inventory_value.cents(),
        profit_by_day: by_day
            .into_iter()
            .map(|(date, profit)| DailyProfit {
                date,
                profit_cents: profit.cents(),
            })
            .collect(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
