//! # Request Payloads
//!
//! Input shapes handed to the ledger by request handlers, plus list filters.
//!
//! ## Create vs Patch
//! ```text
//! NewLot / NewSale     ── full payload, validated as a whole
//! LotPatch / SalePatch ── every field optional; `apply_to(existing)` merges
//!                         onto the stored row and yields a full payload,
//!                         which is then validated exactly like a create
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{CardIdentity, Condition, Game, InventoryLot, Sale, SaleFees};

// =============================================================================
// Lots
// =============================================================================

/// Payload for recording a new purchase lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewLot {
    pub game: Game,
    pub card_name: String,
    pub set_name: String,
    #[serde(default)]
    pub variant: String,
    pub condition: Condition,
    pub qty_initial: i64,
    #[ts(as = "String")]
    pub purchase_date: NaiveDate,
    #[serde(default)]
    pub vendor: Option<String>,
    pub total_cost_cents: i64,
}

impl NewLot {
    pub fn identity(&self) -> CardIdentity {
        CardIdentity {
            game: self.game,
            card_name: self.card_name.clone(),
            set_name: self.set_name.clone(),
            variant: self.variant.clone(),
            condition: self.condition,
        }
    }

    #[inline]
    pub fn total_cost(&self) -> Money {
        Money::from_cents(self.total_cost_cents)
    }
}

/// Partial edit of a lot. `None` keeps the stored value.
///
/// `vendor` is the one clearable field: `Some(None)` (a JSON `null`) removes
/// the stored vendor, while an absent key keeps it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LotPatch {
    pub game: Option<Game>,
    pub card_name: Option<String>,
    pub set_name: Option<String>,
    pub variant: Option<String>,
    pub condition: Option<Condition>,
    pub qty_initial: Option<i64>,
    #[ts(as = "Option<String>")]
    pub purchase_date: Option<NaiveDate>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional)]
    pub vendor: Option<Option<String>>,
    pub total_cost_cents: Option<i64>,
}

/// Maps a key that is present to `Some`, so `null` stays distinguishable
/// from a missing key (which `#[serde(default)]` turns into `None`).
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl LotPatch {
    /// Merges this patch over an existing lot.
    pub fn apply_to(&self, existing: &InventoryLot) -> NewLot {
        NewLot {
            game: self.game.unwrap_or(existing.game),
            card_name: self
                .card_name
                .clone()
                .unwrap_or_else(|| existing.card_name.clone()),
            set_name: self
                .set_name
                .clone()
                .unwrap_or_else(|| existing.set_name.clone()),
            variant: self
                .variant
                .clone()
                .unwrap_or_else(|| existing.variant.clone()),
            condition: self.condition.unwrap_or(existing.condition),
            qty_initial: self.qty_initial.unwrap_or(existing.qty_initial),
            purchase_date: self.purchase_date.unwrap_or(existing.purchase_date),
            vendor: match &self.vendor {
                Some(vendor) => vendor.clone(),
                None => existing.vendor.clone(),
            },
            total_cost_cents: self.total_cost_cents.unwrap_or(existing.total_cost_cents),
        }
    }

    /// True if the edit can change any sale's FIFO allocation.
    pub fn affects_allocation(&self) -> bool {
        self.game.is_some()
            || self.card_name.is_some()
            || self.set_name.is_some()
            || self.variant.is_some()
            || self.condition.is_some()
            || self.qty_initial.is_some()
            || self.purchase_date.is_some()
            || self.total_cost_cents.is_some()
    }
}

// =============================================================================
// Sales
// =============================================================================

/// Payload for recording a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSale {
    #[ts(as = "String")]
    pub sale_date: NaiveDate,
    pub platform: String,
    pub game: Game,
    pub card_name: String,
    pub set_name: String,
    #[serde(default)]
    pub variant: String,
    pub condition: Condition,
    pub qty_sold: i64,
    pub sale_price_each_cents: i64,
    #[serde(default)]
    pub platform_fee_cents: i64,
    #[serde(default)]
    pub processing_fee_cents: i64,
    #[serde(default)]
    pub shipping_cost_cents: i64,
    #[serde(default)]
    pub other_fees_cents: i64,
}

impl NewSale {
    pub fn identity(&self) -> CardIdentity {
        CardIdentity {
            game: self.game,
            card_name: self.card_name.clone(),
            set_name: self.set_name.clone(),
            variant: self.variant.clone(),
            condition: self.condition,
        }
    }

    pub fn fees(&self) -> SaleFees {
        SaleFees {
            platform_fee_cents: self.platform_fee_cents,
            processing_fee_cents: self.processing_fee_cents,
            shipping_cost_cents: self.shipping_cost_cents,
            other_fees_cents: self.other_fees_cents,
        }
    }

    #[inline]
    pub fn sale_price_each(&self) -> Money {
        Money::from_cents(self.sale_price_each_cents)
    }

    /// `qty_sold * sale_price_each - Σfees`.
    pub fn net_proceeds(&self) -> Money {
        crate::types::net_proceeds(self.qty_sold, self.sale_price_each(), &self.fees())
    }
}

/// Partial edit of a sale. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalePatch {
    #[ts(as = "Option<String>")]
    pub sale_date: Option<NaiveDate>,
    pub platform: Option<String>,
    pub game: Option<Game>,
    pub card_name: Option<String>,
    pub set_name: Option<String>,
    pub variant: Option<String>,
    pub condition: Option<Condition>,
    pub qty_sold: Option<i64>,
    pub sale_price_each_cents: Option<i64>,
    pub platform_fee_cents: Option<i64>,
    pub processing_fee_cents: Option<i64>,
    pub shipping_cost_cents: Option<i64>,
    pub other_fees_cents: Option<i64>,
}

impl SalePatch {
    /// Merges this patch over an existing sale.
    pub fn apply_to(&self, existing: &Sale) -> NewSale {
        NewSale {
            sale_date: self.sale_date.unwrap_or(existing.sale_date),
            platform: self
                .platform
                .clone()
                .unwrap_or_else(|| existing.platform.clone()),
            game: self.game.unwrap_or(existing.game),
            card_name: self
                .card_name
                .clone()
                .unwrap_or_else(|| existing.card_name.clone()),
            set_name: self
                .set_name
                .clone()
                .unwrap_or_else(|| existing.set_name.clone()),
            variant: self
                .variant
                .clone()
                .unwrap_or_else(|| existing.variant.clone()),
            condition: self.condition.unwrap_or(existing.condition),
            qty_sold: self.qty_sold.unwrap_or(existing.qty_sold),
            sale_price_each_cents: self
                .sale_price_each_cents
                .unwrap_or(existing.sale_price_each_cents),
            platform_fee_cents: self.platform_fee_cents.unwrap_or(existing.platform_fee_cents),
            processing_fee_cents: self
                .processing_fee_cents
                .unwrap_or(existing.processing_fee_cents),
            shipping_cost_cents: self
                .shipping_cost_cents
                .unwrap_or(existing.shipping_cost_cents),
            other_fees_cents: self.other_fees_cents.unwrap_or(existing.other_fees_cents),
        }
    }
}

// =============================================================================
// Filters & Pagination
// =============================================================================

fn default_page() -> u32 {
    1
}

/// Filters for listing inventory lots (ordered by purchase date, oldest first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryFilters {
    #[serde(default)]
    pub game: Option<Game>,
    #[serde(default)]
    pub condition: Option<Condition>,
    /// Case-insensitive substring of the card name.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    /// `None` uses the ledger's configured default.
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl Default for InventoryFilters {
    fn default() -> Self {
        InventoryFilters {
            game: None,
            condition: None,
            search: None,
            page: default_page(),
            page_size: None,
        }
    }
}

/// Filters for listing sales (ordered by sale date, newest first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleFilters {
    #[serde(default)]
    pub game: Option<Game>,
    #[serde(default)]
    pub platform: Option<String>,
    /// Case-insensitive substring of the card name.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    /// `None` uses the ledger's configured default.
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl Default for SaleFilters {
    fn default() -> Self {
        SaleFilters {
            game: None,
            platform: None,
            search: None,
            page: default_page(),
            page_size: None,
        }
    }
}

/// Row offset of the first item on `page` (1-based).
pub fn page_offset(page: u32, page_size: u32) -> i64 {
    (page.saturating_sub(1) as i64) * page_size as i64
}

/// One page of a filtered listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total_count: i64,
    pub page: u32,
    pub page_size: u32,
}

// =============================================================================
// Reporting Period
// =============================================================================

/// Look-back window for dashboard statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum StatsPeriod {
    #[serde(rename = "7d")]
    Week,
    #[default]
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
}

impl StatsPeriod {
    pub const fn days(&self) -> i64 {
        match self {
            StatsPeriod::Week => 7,
            StatsPeriod::Month => 30,
            StatsPeriod::Quarter => 90,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            StatsPeriod::Week => "7d",
            StatsPeriod::Month => "30d",
            StatsPeriod::Quarter => "90d",
        }
    }

    /// First calendar day included in the window ending on `today`.
    pub fn start_date(&self, today: NaiveDate) -> NaiveDate {
        today - chrono::Duration::days(self.days())
    }
}

impl fmt::Display for StatsPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatsPeriod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "7d" => Ok(StatsPeriod::Week),
            "30d" => Ok(StatsPeriod::Month),
            "90d" => Ok(StatsPeriod::Quarter),
            _ => Err(ValidationError::NotAllowed {
                field: "period".to_string(),
                allowed: vec!["7d".to_string(), "30d".to_string(), "90d".to_string()],
            }),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
