//! # Seed Data Generator
//!
//! Populates the database with a demo user's purchases and sales for
//! development.
//!
//! ## Usage
//! ```bash
//! # Seed the database named by CARDLEDGER_DB_PATH (default ./cardledger.db)
//! cargo run -p cardledger-db --bin seed
//!
//! # Specify database path and user
//! cargo run -p cardledger-db --bin seed -- --db ./data/dev.db --user demo-user
//! ```
//!
//! ## Generated Data
//! For every card in [`CARDS`], three lots bought a month apart at rising
//! prices, then a handful of sales that draw across lot boundaries. Every
//! sale goes through `LedgerService::record_sale`, so the consumption
//! records and profits are exactly what the ledger would produce live.

use cardledger_core::{CardIdentity, Condition, Game, NewLot, NewSale, StatsPeriod};
use cardledger_db::{Database, LedgerConfig, LedgerService};
use chrono::{Days, NaiveDate};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// (game, card, set, variant, condition, base price per card in cents)
const CARDS: &[(Game, &str, &str, &str, Condition, i64)] = &[
    (Game::Pokemon, "Charizard", "Base Set", "Holo", Condition::Nm, 35_000),
    (Game::Pokemon, "Pikachu", "Jungle", "", Condition::Lp, 450),
    (Game::Pokemon, "Umbreon VMAX", "Evolving Skies", "Alt Art", Condition::Nm, 42_000),
    (Game::Yugioh, "Dark Magician", "LOB", "1st Edition", Condition::Mp, 6_500),
    (Game::Yugioh, "Blue-Eyes White Dragon", "SDK", "", Condition::Nm, 2_200),
    (Game::Riftbound, "Jinx", "Origins", "Foil", Condition::Nm, 1_800),
];

const PLATFORMS: &[&str] = &["eBay", "TCGplayer", "Local Game Store"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = LedgerConfig::from_env()?;
    let mut user_id = String::from("demo-user");

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if let Some(path) = args.get(i + 1) {
                    config.database_path = PathBuf::from(path);
                    i += 1;
                }
            }
            "--user" | "-u" => {
                if let Some(user) = args.get(i + 1) {
                    user_id = user.clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Card Ledger Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>     Database file path (default: $CARDLEDGER_DB_PATH)");
                println!("  -u, --user <ID>     User to seed (default: demo-user)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            other => warn!(argument = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    info!(path = %config.database_path.display(), user_id = %user_id, "Seeding ledger");

    let db = Database::new(config.db_config()).await?;
    let ledger = LedgerService::with_config(db, &config);

    let existing = ledger
        .list_lots(&user_id, &Default::default())
        .await?
        .total_count;
    if existing > 0 {
        warn!(
            lots = existing,
            "User already has lots, skipping seed (delete the database file to regenerate)"
        );
        return Ok(());
    }

    let start_date = NaiveDate::from_ymd_opt(2024, 1, 5).ok_or("invalid seed start date")?;
    let mut lots_created = 0;
    let mut sales_recorded = 0;

    for (card_idx, &(game, card_name, set_name, variant, condition, base_price)) in
        CARDS.iter().enumerate()
    {
        let identity = CardIdentity::new(game, card_name, set_name, variant, condition);

        // Three lots, a month apart, each 10% dearer than the last
        for lot_idx in 0..3u64 {
            let qty = 2 + ((card_idx as i64 + lot_idx as i64) % 4);
            let price_each = base_price + base_price * lot_idx as i64 / 10;
            let purchase_date = start_date
                .checked_add_days(Days::new(lot_idx * 30 + card_idx as u64))
                .ok_or("purchase date out of range")?;

            ledger
                .create_lot(
                    &user_id,
                    NewLot {
                        game,
                        card_name: card_name.to_string(),
                        set_name: set_name.to_string(),
                        variant: variant.to_string(),
                        condition,
                        qty_initial: qty,
                        purchase_date,
                        vendor: Some(format!("Vendor {}", lot_idx + 1)),
                        total_cost_cents: price_each * qty,
                    },
                )
                .await?;
            lots_created += 1;
        }

        // Sell about half of what was bought, spread over three sales
        let available = ledger.available_qty(&user_id, &identity).await?;
        let mut remaining_to_sell = available / 2;
        let mut sale_idx = 0u64;
        while remaining_to_sell > 0 {
            let qty_sold = remaining_to_sell.min(1 + sale_idx as i64 * 2);
            let sale_price_each = base_price + base_price * (3 + sale_idx as i64) / 10;
            let platform = PLATFORMS[(card_idx + sale_idx as usize) % PLATFORMS.len()];
            let sale_date = start_date
                .checked_add_days(Days::new(75 + sale_idx * 14 + card_idx as u64))
                .ok_or("sale date out of range")?;

            let sale = ledger
                .record_sale(
                    &user_id,
                    NewSale {
                        sale_date,
                        platform: platform.to_string(),
                        game,
                        card_name: card_name.to_string(),
                        set_name: set_name.to_string(),
                        variant: variant.to_string(),
                        condition,
                        qty_sold,
                        sale_price_each_cents: sale_price_each,
                        platform_fee_cents: sale_price_each * qty_sold * 13 / 100,
                        processing_fee_cents: 30,
                        shipping_cost_cents: if platform == "Local Game Store" { 0 } else { 450 },
                        other_fees_cents: 0,
                    },
                )
                .await?;

            info!(
                card = %identity,
                qty = sale.qty_sold,
                profit = %sale.realized_profit(),
                "Seeded sale"
            );

            remaining_to_sell -= qty_sold;
            sale_idx += 1;
            sales_recorded += 1;
        }
    }

    let today = start_date
        .checked_add_days(Days::new(140))
        .ok_or("report date out of range")?;
    let stats = ledger
        .dashboard_stats_on(&user_id, StatsPeriod::Quarter, today)
        .await?;

    info!(
        lots = lots_created,
        sales = sales_recorded,
        profit_90d = %stats.total_profit(),
        inventory_value = %stats.inventory_value(),
        "Seed complete"
    );

    ledger.database().close().await;
    Ok(())
}
