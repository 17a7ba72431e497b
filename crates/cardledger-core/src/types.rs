//! # Domain Types
//!
//! Core domain types used throughout Card Ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  InventoryLot   │   │      Sale       │   │ FifoConsumption │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──┼─────────────────┼───│  lot id (FK)    │       │
//! │  │  identity       │   │  id (UUID)   ◄──┼───│  sale id (FK)   │       │
//! │  │  qty_initial    │   │  identity       │   │  qty_taken      │       │
//! │  │  qty_on_hand    │   │  qty_sold       │   │  cost_per_card  │       │
//! │  │  cost_per_card  │   │  cost_basis     │   │  cost_total     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  CardIdentity = { game, card_name, set_name, variant, condition }       │
//! │  Lots and sales match by EXACT equality on all five fields.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every entity carries the owning `user_id`; nothing is shared across users.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Game
// =============================================================================

/// Trading card game a card belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Game {
    Pokemon,
    Yugioh,
    Riftbound,
}

impl Game {
    pub const ALL: [Game; 3] = [Game::Pokemon, Game::Yugioh, Game::Riftbound];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Game::Pokemon => "pokemon",
            Game::Yugioh => "yugioh",
            Game::Riftbound => "riftbound",
        }
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Game {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Game::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "game".to_string(),
                allowed: Game::ALL.iter().map(|g| g.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// Condition
// =============================================================================

/// Physical grade of a card, using the standard seller abbreviations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum Condition {
    /// Near Mint
    Nm,
    /// Lightly Played
    Lp,
    /// Moderately Played
    Mp,
    /// Heavily Played
    Hp,
    /// Damaged
    Dmg,
}

impl Condition {
    pub const ALL: [Condition; 5] = [
        Condition::Nm,
        Condition::Lp,
        Condition::Mp,
        Condition::Hp,
        Condition::Dmg,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Condition::Nm => "NM",
            Condition::Lp => "LP",
            Condition::Mp => "MP",
            Condition::Hp => "HP",
            Condition::Dmg => "DMG",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Condition::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "condition".to_string(),
                allowed: Condition::ALL
                    .iter()
                    .map(|c| c.as_str().to_string())
                    .collect(),
            })
    }
}

// =============================================================================
// Card Identity
// =============================================================================

/// The composite key identifying a fungible unit of inventory.
///
/// ## Matching Rules
/// - Exact, case-sensitive equality on every field
/// - `variant` is `""` when the card has no variant (never null)
///
/// `Ord` is derived so a set of identities can be locked in a stable order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CardIdentity {
    pub game: Game,
    pub card_name: String,
    pub set_name: String,
    #[serde(default)]
    pub variant: String,
    pub condition: Condition,
}

impl CardIdentity {
    pub fn new(
        game: Game,
        card_name: impl Into<String>,
        set_name: impl Into<String>,
        variant: impl Into<String>,
        condition: Condition,
    ) -> Self {
        CardIdentity {
            game,
            card_name: card_name.into(),
            set_name: set_name.into(),
            variant: variant.into(),
            condition,
        }
    }
}

/// Human-readable label used in log lines and error messages.
impl fmt::Display for CardIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({}", self.game, self.card_name, self.set_name)?;
        if !self.variant.is_empty() {
            write!(f, ", {}", self.variant)?;
        }
        write!(f, ") {}", self.condition)
    }
}

// =============================================================================
// Inventory Lot
// =============================================================================

/// A purchase batch of identical cards acquired at one price.
///
/// ## Quantity Invariant
/// `0 <= qty_on_hand <= qty_initial`. `qty_on_hand` only moves through the
/// FIFO allocator (down) and recalculation (reset to `qty_initial`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryLot {
    pub id: String,
    pub user_id: String,
    pub game: Game,
    pub card_name: String,
    pub set_name: String,
    pub variant: String,
    pub condition: Condition,
    /// Units originally purchased.
    pub qty_initial: i64,
    /// Units still available for allocation.
    pub qty_on_hand: i64,
    #[ts(as = "String")]
    pub purchase_date: NaiveDate,
    pub vendor: Option<String>,
    pub total_cost_cents: i64,
    /// `total_cost / qty_initial`, rounded to the cent (0 when qty is 0).
    pub cost_per_card_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl InventoryLot {
    pub fn identity(&self) -> CardIdentity {
        CardIdentity {
            game: self.game,
            card_name: self.card_name.clone(),
            set_name: self.set_name.clone(),
            variant: self.variant.clone(),
            condition: self.condition,
        }
    }

    /// Returns true if this lot belongs to the given identity group.
    pub fn matches(&self, identity: &CardIdentity) -> bool {
        self.game == identity.game
            && self.card_name == identity.card_name
            && self.set_name == identity.set_name
            && self.variant == identity.variant
            && self.condition == identity.condition
    }

    #[inline]
    pub fn total_cost(&self) -> Money {
        Money::from_cents(self.total_cost_cents)
    }

    #[inline]
    pub fn cost_per_card(&self) -> Money {
        Money::from_cents(self.cost_per_card_cents)
    }

    /// Units already drawn by sales.
    #[inline]
    pub fn qty_consumed(&self) -> i64 {
        self.qty_initial - self.qty_on_hand
    }

    /// Cost value of the units still on hand.
    pub fn on_hand_value(&self) -> Money {
        self.cost_per_card().multiply_quantity(self.qty_on_hand)
    }
}

/// Derives a lot's cost per card from its total cost and initial quantity.
pub fn cost_per_card(total_cost: Money, qty_initial: i64) -> Money {
    total_cost.per_unit(qty_initial)
}

// =============================================================================
// Sale
// =============================================================================

/// One sale transaction.
///
/// `cost_basis_used` and `realized_profit` are owned by the FIFO engine:
/// a sale is inserted with both at zero and patched once allocation completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub user_id: String,
    #[ts(as = "String")]
    pub sale_date: NaiveDate,
    pub platform: String,
    pub game: Game,
    pub card_name: String,
    pub set_name: String,
    pub variant: String,
    pub condition: Condition,
    pub qty_sold: i64,
    pub sale_price_each_cents: i64,
    pub platform_fee_cents: i64,
    pub processing_fee_cents: i64,
    pub shipping_cost_cents: i64,
    pub other_fees_cents: i64,
    /// `qty_sold * sale_price_each - fees`.
    pub net_proceeds_cents: i64,
    /// Sum of this sale's consumption `cost_total`.
    pub cost_basis_used_cents: i64,
    /// `net_proceeds - cost_basis_used`.
    pub realized_profit_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Sale {
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
    pub fn net_proceeds(&self) -> Money {
        Money::from_cents(self.net_proceeds_cents)
    }

    #[inline]
    pub fn cost_basis_used(&self) -> Money {
        Money::from_cents(self.cost_basis_used_cents)
    }

    #[inline]
    pub fn realized_profit(&self) -> Money {
        Money::from_cents(self.realized_profit_cents)
    }

    /// Gross revenue before fees.
    pub fn gross(&self) -> Money {
        Money::from_cents(self.sale_price_each_cents).multiply_quantity(self.qty_sold)
    }

    /// Sum of all four fee fields.
    pub fn total_fees(&self) -> Money {
        SaleFees {
            platform_fee_cents: self.platform_fee_cents,
            processing_fee_cents: self.processing_fee_cents,
            shipping_cost_cents: self.shipping_cost_cents,
            other_fees_cents: self.other_fees_cents,
        }
        .total()
    }
}

/// Fee components deducted from a sale's gross revenue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleFees {
    #[serde(default)]
    pub platform_fee_cents: i64,
    #[serde(default)]
    pub processing_fee_cents: i64,
    #[serde(default)]
    pub shipping_cost_cents: i64,
    #[serde(default)]
    pub other_fees_cents: i64,
}

impl SaleFees {
    pub fn total(&self) -> Money {
        [
            self.platform_fee_cents,
            self.processing_fee_cents,
            self.shipping_cost_cents,
            self.other_fees_cents,
        ]
        .into_iter()
        .map(Money::from_cents)
        .sum()
    }
}

/// Net proceeds: `qty_sold * sale_price_each - Σfees`.
///
/// ## Example
/// ```rust
/// use cardledger_core::money::Money;
/// use cardledger_core::types::{net_proceeds, SaleFees};
///
/// let fees = SaleFees { platform_fee_cents: 300, shipping_cost_cents: 100, ..Default::default() };
/// let net = net_proceeds(2, Money::from_cents(2_000), &fees);
/// assert_eq!(net.cents(), 3_600);
/// ```
pub fn net_proceeds(qty_sold: i64, sale_price_each: Money, fees: &SaleFees) -> Money {
    sale_price_each.multiply_quantity(qty_sold) - fees.total()
}

/// Realized profit: `net_proceeds - cost_basis`.
#[inline]
pub fn realized_profit(net_proceeds: Money, cost_basis: Money) -> Money {
    net_proceeds - cost_basis
}

// =============================================================================
// FIFO Consumption
// =============================================================================

/// Audit entry linking one sale to one lot it drew cost basis from.
///
/// Immutable once created; recalculation deletes and regenerates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct FifoConsumption {
    pub id: String,
    pub sale_id: String,
    pub inventory_lot_id: String,
    pub qty_taken: i64,
    /// Lot rate at allocation time.
    pub cost_per_card_cents: i64,
    /// `qty_taken * cost_per_card`.
    pub cost_total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl FifoConsumption {
    #[inline]
    pub fn cost_total(&self) -> Money {
        Money::from_cents(self.cost_total_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
