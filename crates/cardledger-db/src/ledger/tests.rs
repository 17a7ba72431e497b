use std::collections::HashSet;

use cardledger_core::{
    CardIdentity, Condition, ErrorKind, Game, InventoryFilters, LotPatch, Money, NewLot, NewSale,
    SaleFilters, SalePatch, StatsPeriod,
};
use chrono::NaiveDate;

use super::LedgerService;
use crate::pool::{Database, DbConfig};
use crate::repository::consumption::ConsumptionRepository;

const USER: &str = "user-1";

async fn ledger() -> LedgerService {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    LedgerService::new(db)
}

fn charizard() -> CardIdentity {
    CardIdentity::new(Game::Pokemon, "Charizard", "Base Set", "", Condition::Nm)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn new_lot(
    identity: &CardIdentity,
    purchase_date: NaiveDate,
    qty: i64,
    total_cost_cents: i64,
) -> NewLot {
    NewLot {
        game: identity.game,
        card_name: identity.card_name.clone(),
        set_name: identity.set_name.clone(),
        variant: identity.variant.clone(),
        condition: identity.condition,
        qty_initial: qty,
        purchase_date,
        vendor: None,
        total_cost_cents,
    }
}

fn new_sale(
    identity: &CardIdentity,
    sale_date: NaiveDate,
    qty: i64,
    price_each_cents: i64,
) -> NewSale {
    NewSale {
        sale_date,
        platform: "eBay".to_string(),
        game: identity.game,
        card_name: identity.card_name.clone(),
        set_name: identity.set_name.clone(),
        variant: identity.variant.clone(),
        condition: identity.condition,
        qty_sold: qty,
        sale_price_each_cents: price_each_cents,
        platform_fee_cents: 0,
        processing_fee_cents: 0,
        shipping_cost_cents: 0,
        other_fees_cents: 0,
    }
}

async fn consumption_count(ledger: &LedgerService, lot_id: &str) -> i64 {
    let mut conn = ledger.database().pool().acquire().await.unwrap();
    ConsumptionRepository::new(&mut conn)
        .count_for_lot(lot_id)
        .await
        .unwrap()
}

// =============================================================================
// Allocation
// =============================================================================

#[tokio::test]
async fn test_sale_spanning_two_lots() {
    let ledger = ledger().await;
    let identity = charizard();

    let a = ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), 10, 10_000))
        .await
        .unwrap();
    let b = ledger
        .create_lot(USER, new_lot(&identity, date(2024, 2, 1), 10, 15_000))
        .await
        .unwrap();
    assert_eq!(a.cost_per_card_cents, 1_000);
    assert_eq!(b.cost_per_card_cents, 1_500);

    let sale = ledger
        .record_sale(USER, new_sale(&identity, date(2024, 3, 1), 15, 2_000))
        .await
        .unwrap();

    assert_eq!(sale.net_proceeds_cents, 30_000);
    assert_eq!(sale.cost_basis_used_cents, 17_500);
    assert_eq!(sale.realized_profit_cents, 12_500);

    assert_eq!(ledger.get_lot(USER, &a.id).await.unwrap().qty_on_hand, 0);
    assert_eq!(ledger.get_lot(USER, &b.id).await.unwrap().qty_on_hand, 5);

    let records = ledger.consumptions_for_sale(USER, &sale.id).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].inventory_lot_id, a.id);
    assert_eq!(records[0].qty_taken, 10);
    assert_eq!(records[0].cost_total_cents, 10_000);
    assert_eq!(records[1].inventory_lot_id, b.id);
    assert_eq!(records[1].qty_taken, 5);
    assert_eq!(records[1].cost_per_card_cents, 1_500);

    let recorded: i64 = records.iter().map(|r| r.cost_total_cents).sum();
    assert_eq!(recorded, sale.cost_basis_used_cents);
}

#[tokio::test]
async fn test_profit_subtracts_fees() {
    let ledger = ledger().await;
    let identity = charizard();

    ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), 4, 4_000))
        .await
        .unwrap();

    let mut payload = new_sale(&identity, date(2024, 1, 10), 2, 2_500);
    payload.platform_fee_cents = 650;
    payload.processing_fee_cents = 30;
    payload.shipping_cost_cents = 400;
    payload.other_fees_cents = 20;

    let sale = ledger.record_sale(USER, payload).await.unwrap();

    // 2 * 2500 - (650 + 30 + 400 + 20)
    assert_eq!(sale.net_proceeds_cents, 3_900);
    assert_eq!(sale.cost_basis_used_cents, 2_000);
    assert_eq!(sale.realized_profit(), Money::from_cents(1_900));
}

#[tokio::test]
async fn test_same_purchase_date_uses_creation_order() {
    let ledger = ledger().await;
    let identity = charizard();

    let first = ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), 1, 900))
        .await
        .unwrap();
    let second = ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), 1, 100))
        .await
        .unwrap();

    let sale = ledger
        .record_sale(USER, new_sale(&identity, date(2024, 1, 2), 1, 1_000))
        .await
        .unwrap();

    assert_eq!(sale.cost_basis_used_cents, 900);
    assert_eq!(ledger.get_lot(USER, &first.id).await.unwrap().qty_on_hand, 0);
    assert_eq!(ledger.get_lot(USER, &second.id).await.unwrap().qty_on_hand, 1);
}

#[tokio::test]
async fn test_sale_one_past_first_lot_leaves_third_lot_untouched() {
    let ledger = ledger().await;
    let identity = charizard();

    let first = ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), 3, 3_000))
        .await
        .unwrap();
    let second = ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 2), 3, 6_000))
        .await
        .unwrap();
    let third = ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 3), 3, 9_000))
        .await
        .unwrap();

    let sale = ledger
        .record_sale(USER, new_sale(&identity, date(2024, 2, 1), 4, 5_000))
        .await
        .unwrap();

    // All 3 of the first lot at $10, then 1 of the second at $20
    assert_eq!(sale.cost_basis_used_cents, 5_000);
    assert_eq!(ledger.get_lot(USER, &first.id).await.unwrap().qty_on_hand, 0);
    assert_eq!(ledger.get_lot(USER, &second.id).await.unwrap().qty_on_hand, 2);
    assert_eq!(ledger.get_lot(USER, &third.id).await.unwrap().qty_on_hand, 3);

    let records = ledger.consumptions_for_sale(USER, &sale.id).await.unwrap();
    let taken: Vec<(&str, i64)> = records
        .iter()
        .map(|r| (r.inventory_lot_id.as_str(), r.qty_taken))
        .collect();
    assert_eq!(taken, vec![(first.id.as_str(), 3), (second.id.as_str(), 1)]);
    assert!(records.iter().all(|r| r.inventory_lot_id != third.id));
    assert_eq!(consumption_count(&ledger, &third.id).await, 0);
}

#[tokio::test]
async fn test_identity_groups_are_isolated() {
    let ledger = ledger().await;
    let nm = charizard();
    let mut lp = charizard();
    lp.condition = Condition::Lp;

    ledger
        .create_lot(USER, new_lot(&lp, date(2023, 1, 1), 10, 1_000))
        .await
        .unwrap();

    let err = ledger
        .record_sale(USER, new_sale(&nm, date(2024, 1, 1), 1, 500))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientInventory);

    // Another user's lots never count either
    let err = ledger
        .record_sale("user-2", new_sale(&lp, date(2024, 1, 1), 1, 500))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientInventory);
}

#[tokio::test]
async fn test_oversell_is_rejected_without_trace() {
    let ledger = ledger().await;
    let identity = charizard();

    let a = ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), 3, 3_000))
        .await
        .unwrap();
    let b = ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 2), 2, 2_000))
        .await
        .unwrap();

    let err = ledger
        .record_sale(USER, new_sale(&identity, date(2024, 2, 1), 6, 1_500))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientInventory);

    let sales = ledger.list_sales(USER, &SaleFilters::default()).await.unwrap();
    assert_eq!(sales.total_count, 0);
    assert_eq!(ledger.get_lot(USER, &a.id).await.unwrap().qty_on_hand, 3);
    assert_eq!(ledger.get_lot(USER, &b.id).await.unwrap().qty_on_hand, 2);
    assert_eq!(consumption_count(&ledger, &a.id).await, 0);

    // Exactly what is on hand still sells
    ledger
        .record_sale(USER, new_sale(&identity, date(2024, 2, 1), 5, 1_500))
        .await
        .unwrap();
    assert_eq!(ledger.available_qty(USER, &identity).await.unwrap(), 0);
}

// =============================================================================
// Sale Edits & Deletes
// =============================================================================

#[tokio::test]
async fn test_delete_sale_restores_lots() {
    let ledger = ledger().await;
    let identity = charizard();

    let a = ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), 10, 10_000))
        .await
        .unwrap();
    let b = ledger
        .create_lot(USER, new_lot(&identity, date(2024, 2, 1), 10, 15_000))
        .await
        .unwrap();
    let sale = ledger
        .record_sale(USER, new_sale(&identity, date(2024, 3, 1), 15, 2_000))
        .await
        .unwrap();

    ledger.delete_sale(USER, &sale.id).await.unwrap();

    assert_eq!(ledger.get_lot(USER, &a.id).await.unwrap().qty_on_hand, 10);
    assert_eq!(ledger.get_lot(USER, &b.id).await.unwrap().qty_on_hand, 10);
    assert_eq!(consumption_count(&ledger, &a.id).await, 0);
    assert_eq!(consumption_count(&ledger, &b.id).await, 0);

    let err = ledger.get_sale(USER, &sale.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_delete_sale_recosts_later_sales() {
    let ledger = ledger().await;
    let identity = charizard();

    ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), 2, 2_000))
        .await
        .unwrap();
    ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 2), 2, 6_000))
        .await
        .unwrap();

    let first = ledger
        .record_sale(USER, new_sale(&identity, date(2024, 2, 1), 2, 4_000))
        .await
        .unwrap();
    let second = ledger
        .record_sale(USER, new_sale(&identity, date(2024, 2, 2), 1, 4_000))
        .await
        .unwrap();
    assert_eq!(second.cost_basis_used_cents, 3_000);

    ledger.delete_sale(USER, &first.id).await.unwrap();

    // The remaining sale now draws from the oldest lot
    let second = ledger.get_sale(USER, &second.id).await.unwrap();
    assert_eq!(second.cost_basis_used_cents, 1_000);
    assert_eq!(second.realized_profit_cents, 3_000);
    assert_eq!(ledger.available_qty(USER, &identity).await.unwrap(), 3);
}

#[tokio::test]
async fn test_backdating_a_sale_reorders_the_replay() {
    let ledger = ledger().await;
    let identity = charizard();

    ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), 10, 10_000))
        .await
        .unwrap();
    ledger
        .create_lot(USER, new_lot(&identity, date(2024, 2, 1), 10, 15_000))
        .await
        .unwrap();

    let early = ledger
        .record_sale(USER, new_sale(&identity, date(2024, 3, 1), 10, 2_000))
        .await
        .unwrap();
    let late = ledger
        .record_sale(USER, new_sale(&identity, date(2024, 3, 2), 5, 2_000))
        .await
        .unwrap();
    assert_eq!(early.cost_basis_used_cents, 10_000);
    assert_eq!(late.cost_basis_used_cents, 7_500);

    let late = ledger
        .update_sale(
            USER,
            &late.id,
            SalePatch {
                sale_date: Some(date(2024, 2, 15)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(late.cost_basis_used_cents, 5_000);

    let early = ledger.get_sale(USER, &early.id).await.unwrap();
    assert_eq!(early.cost_basis_used_cents, 5_000 + 7_500);
    assert_eq!(early.realized_profit_cents, 20_000 - 12_500);
}

#[tokio::test]
async fn test_sale_edit_moving_identity_recalculates_both_groups() {
    let ledger = ledger().await;
    let nm = charizard();
    let mut lp = charizard();
    lp.condition = Condition::Lp;

    let nm_lot = ledger
        .create_lot(USER, new_lot(&nm, date(2024, 1, 1), 5, 5_000))
        .await
        .unwrap();
    let lp_lot = ledger
        .create_lot(USER, new_lot(&lp, date(2024, 1, 1), 5, 2_500))
        .await
        .unwrap();

    let sale = ledger
        .record_sale(USER, new_sale(&nm, date(2024, 2, 1), 3, 1_200))
        .await
        .unwrap();
    assert_eq!(sale.cost_basis_used_cents, 3_000);

    let moved = ledger
        .update_sale(
            USER,
            &sale.id,
            SalePatch {
                condition: Some(Condition::Lp),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(moved.condition, Condition::Lp);
    assert_eq!(moved.cost_basis_used_cents, 1_500);
    assert_eq!(moved.realized_profit_cents, 3_600 - 1_500);

    assert_eq!(ledger.get_lot(USER, &nm_lot.id).await.unwrap().qty_on_hand, 5);
    assert_eq!(ledger.get_lot(USER, &lp_lot.id).await.unwrap().qty_on_hand, 2);
    assert_eq!(consumption_count(&ledger, &nm_lot.id).await, 0);

    let records = ledger.consumptions_for_sale(USER, &sale.id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].inventory_lot_id, lp_lot.id);
}

#[tokio::test]
async fn test_sale_edit_that_oversells_rolls_back() {
    let ledger = ledger().await;
    let identity = charizard();

    let lot = ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), 4, 4_000))
        .await
        .unwrap();
    let sale = ledger
        .record_sale(USER, new_sale(&identity, date(2024, 2, 1), 2, 1_500))
        .await
        .unwrap();

    let err = ledger
        .update_sale(
            USER,
            &sale.id,
            SalePatch {
                qty_sold: Some(5),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientInventory);

    let stored = ledger.get_sale(USER, &sale.id).await.unwrap();
    assert_eq!(stored.qty_sold, 2);
    assert_eq!(stored.cost_basis_used_cents, 2_000);
    assert_eq!(ledger.get_lot(USER, &lot.id).await.unwrap().qty_on_hand, 2);
    assert_eq!(consumption_count(&ledger, &lot.id).await, 1);
}

// =============================================================================
// Lot Edits & Deletes
// =============================================================================

#[tokio::test]
async fn test_delete_lot_with_consumptions_is_refused() {
    let ledger = ledger().await;
    let identity = charizard();

    let used = ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), 2, 2_000))
        .await
        .unwrap();
    let unused = ledger
        .create_lot(USER, new_lot(&identity, date(2024, 6, 1), 2, 2_000))
        .await
        .unwrap();
    ledger
        .record_sale(USER, new_sale(&identity, date(2024, 2, 1), 1, 1_500))
        .await
        .unwrap();

    let err = ledger.delete_lot(USER, &used.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DependencyConflict);
    assert_eq!(err.kind().code(), "LOT_HAS_SALES");
    assert!(ledger.get_lot(USER, &used.id).await.is_ok());

    ledger.delete_lot(USER, &unused.id).await.unwrap();
    let err = ledger.get_lot(USER, &unused.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_lot_cost_edit_updates_sale_profit() {
    let ledger = ledger().await;
    let identity = charizard();

    let lot = ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), 4, 4_000))
        .await
        .unwrap();
    let sale = ledger
        .record_sale(USER, new_sale(&identity, date(2024, 2, 1), 2, 3_000))
        .await
        .unwrap();
    assert_eq!(sale.realized_profit_cents, 4_000);

    let lot = ledger
        .update_lot(
            USER,
            &lot.id,
            LotPatch {
                total_cost_cents: Some(8_000),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(lot.cost_per_card_cents, 2_000);
    assert_eq!(lot.qty_on_hand, 2);

    let sale = ledger.get_sale(USER, &sale.id).await.unwrap();
    assert_eq!(sale.cost_basis_used_cents, 4_000);
    assert_eq!(sale.realized_profit_cents, 2_000);
}

#[tokio::test]
async fn test_vendor_edit_leaves_allocations_alone() {
    let ledger = ledger().await;
    let identity = charizard();

    let lot = ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), 4, 4_000))
        .await
        .unwrap();
    let sale = ledger
        .record_sale(USER, new_sale(&identity, date(2024, 2, 1), 3, 3_000))
        .await
        .unwrap();
    let before = ledger.consumptions_for_sale(USER, &sale.id).await.unwrap();

    let lot = ledger
        .update_lot(
            USER,
            &lot.id,
            LotPatch {
                vendor: Some(Some("Card Shop".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(lot.vendor.as_deref(), Some("Card Shop"));
    assert_eq!(lot.qty_on_hand, 1);
    assert_eq!(ledger.consumptions_for_sale(USER, &sale.id).await.unwrap(), before);
}

#[tokio::test]
async fn test_vendor_can_be_cleared() {
    let ledger = ledger().await;
    let mut lot = new_lot(&charizard(), date(2024, 1, 1), 2, 2_000);
    lot.vendor = Some("Card Shop".to_string());
    let lot = ledger.create_lot(USER, lot).await.unwrap();

    // An absent vendor keeps the stored one
    let kept: LotPatch = serde_json::from_str(r#"{"qty_initial": 2}"#).unwrap();
    let lot = ledger.update_lot(USER, &lot.id, kept).await.unwrap();
    assert_eq!(lot.vendor.as_deref(), Some("Card Shop"));

    // An explicit null clears it
    let cleared: LotPatch = serde_json::from_str(r#"{"vendor": null}"#).unwrap();
    let lot = ledger.update_lot(USER, &lot.id, cleared).await.unwrap();
    assert_eq!(lot.vendor, None);
    assert_eq!(ledger.get_lot(USER, &lot.id).await.unwrap().vendor, None);
}

#[tokio::test]
async fn test_lot_qty_cut_below_sold_is_rejected() {
    let ledger = ledger().await;
    let identity = charizard();

    let lot = ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), 5, 5_000))
        .await
        .unwrap();
    ledger
        .record_sale(USER, new_sale(&identity, date(2024, 2, 1), 4, 1_500))
        .await
        .unwrap();

    let err = ledger
        .update_lot(
            USER,
            &lot.id,
            LotPatch {
                qty_initial: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientInventory);

    let stored = ledger.get_lot(USER, &lot.id).await.unwrap();
    assert_eq!(stored.qty_initial, 5);
    assert_eq!(stored.qty_on_hand, 1);
}

#[tokio::test]
async fn test_lot_edit_moving_identity_recalculates_both_groups() {
    let ledger = ledger().await;
    let nm = charizard();
    let mut lp = charizard();
    lp.condition = Condition::Lp;

    let first = ledger
        .create_lot(USER, new_lot(&nm, date(2024, 1, 1), 2, 2_000))
        .await
        .unwrap();
    let second = ledger
        .create_lot(USER, new_lot(&nm, date(2024, 1, 2), 2, 4_000))
        .await
        .unwrap();
    let sale = ledger
        .record_sale(USER, new_sale(&nm, date(2024, 2, 1), 2, 5_000))
        .await
        .unwrap();
    assert_eq!(sale.cost_basis_used_cents, 2_000);

    // The first lot was graded wrong: it is really LP
    let moved = ledger
        .update_lot(
            USER,
            &first.id,
            LotPatch {
                condition: Some(Condition::Lp),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.qty_on_hand, 2);

    let sale = ledger.get_sale(USER, &sale.id).await.unwrap();
    assert_eq!(sale.cost_basis_used_cents, 4_000);
    assert_eq!(ledger.get_lot(USER, &second.id).await.unwrap().qty_on_hand, 0);
    assert_eq!(consumption_count(&ledger, &first.id).await, 0);
    assert_eq!(ledger.available_qty(USER, &lp).await.unwrap(), 2);
}

// =============================================================================
// Recalculation
// =============================================================================

#[tokio::test]
async fn test_recalculate_is_idempotent() {
    let ledger = ledger().await;
    let identity = charizard();

    ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), 3, 3_000))
        .await
        .unwrap();
    ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 5), 3, 4_500))
        .await
        .unwrap();
    let s1 = ledger
        .record_sale(USER, new_sale(&identity, date(2024, 2, 1), 2, 2_000))
        .await
        .unwrap();
    let s2 = ledger
        .record_sale(USER, new_sale(&identity, date(2024, 2, 2), 3, 2_000))
        .await
        .unwrap();

    let lots_before = ledger.list_lots(USER, &InventoryFilters::default()).await.unwrap().data;

    let first = ledger.recalculate_for_card(USER, &identity).await.unwrap();
    assert_eq!(first.sales_replayed, 2);
    assert_eq!(first.records_cleared, 3);
    assert_eq!(first.records_written, 3);

    let second = ledger.recalculate_for_card(USER, &identity).await.unwrap();
    assert_eq!(first, second);

    let lots_after = ledger.list_lots(USER, &InventoryFilters::default()).await.unwrap().data;
    let on_hand = |lots: &[cardledger_core::InventoryLot]| {
        lots.iter().map(|l| (l.id.clone(), l.qty_on_hand)).collect::<Vec<_>>()
    };
    assert_eq!(on_hand(&lots_before), on_hand(&lots_after));

    assert_eq!(ledger.get_sale(USER, &s1.id).await.unwrap().cost_basis_used_cents, 2_000);
    assert_eq!(
        ledger.get_sale(USER, &s2.id).await.unwrap().cost_basis_used_cents,
        1_000 + 3_000
    );
}

#[tokio::test]
async fn test_quantities_are_conserved() {
    let ledger = ledger().await;
    let identity = charizard();

    let mut lot_ids = Vec::new();
    for (day, qty) in [(1, 4), (2, 3), (3, 5)] {
        let lot = ledger
            .create_lot(USER, new_lot(&identity, date(2024, 1, day), qty, qty * 700))
            .await
            .unwrap();
        lot_ids.push(lot.id);
    }

    let mut sale_ids = Vec::new();
    for (day, qty) in [(10, 2), (11, 5), (12, 1)] {
        let sale = ledger
            .record_sale(USER, new_sale(&identity, date(2024, 1, day), qty, 1_000))
            .await
            .unwrap();
        sale_ids.push(sale.id);
    }

    let mut taken_per_lot = std::collections::HashMap::new();
    for sale_id in &sale_ids {
        for record in ledger.consumptions_for_sale(USER, sale_id).await.unwrap() {
            *taken_per_lot.entry(record.inventory_lot_id).or_insert(0) += record.qty_taken;
        }
    }

    for lot_id in &lot_ids {
        let lot = ledger.get_lot(USER, lot_id).await.unwrap();
        let taken = taken_per_lot.get(lot_id).copied().unwrap_or(0);
        assert_eq!(lot.qty_on_hand + taken, lot.qty_initial);
    }
    assert_eq!(ledger.available_qty(USER, &identity).await.unwrap(), 12 - 8);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sales_never_oversell() {
    let ledger = ledger().await;
    let identity = charizard();

    ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), 5, 5_000))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let ledger = ledger.clone();
        let identity = identity.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .record_sale(USER, new_sale(&identity, date(2024, 2, 1), 1, 1_500))
                .await
        }));
    }

    let mut ok = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(err) => {
                assert_eq!(err.kind(), ErrorKind::InsufficientInventory);
                rejected += 1;
            }
        }
    }

    assert_eq!(ok, 5);
    assert_eq!(rejected, 5);
    assert_eq!(ledger.available_qty(USER, &identity).await.unwrap(), 0);

    let sales = ledger.list_sales(USER, &SaleFilters::default()).await.unwrap();
    assert_eq!(sales.total_count, 5);
    assert!(sales.data.iter().all(|s| s.cost_basis_used_cents == 1_000));
}

// =============================================================================
// Queries
// =============================================================================

#[tokio::test]
async fn test_preview_reports_shortfall_without_writing() {
    let ledger = ledger().await;
    let identity = charizard();

    ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), 2, 2_000))
        .await
        .unwrap();
    ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 2), 2, 3_000))
        .await
        .unwrap();

    let preview = ledger
        .preview_sale(USER, &identity, 3, Money::from_cents(6_000))
        .await
        .unwrap();
    assert!(preview.is_sufficient());
    assert_eq!(preview.qty_available, 4);
    assert_eq!(preview.estimated_cost_basis_cents, 2_000 + 1_500);
    assert_eq!(preview.estimated_profit_cents, 2_500);

    let short = ledger
        .preview_sale(USER, &identity, 6, Money::from_cents(6_000))
        .await
        .unwrap();
    assert!(!short.is_sufficient());
    assert_eq!(short.plan.shortfall(), 2);

    assert_eq!(ledger.available_qty(USER, &identity).await.unwrap(), 4);
}

#[tokio::test]
async fn test_dashboard_stats_for_period() {
    let ledger = ledger().await;
    let identity = charizard();

    ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), 10, 10_000))
        .await
        .unwrap();
    // Outside a 30 day window ending 2024-03-31
    ledger
        .record_sale(USER, new_sale(&identity, date(2024, 1, 15), 1, 5_000))
        .await
        .unwrap();
    let mut with_fees = new_sale(&identity, date(2024, 3, 10), 2, 2_000);
    with_fees.platform_fee_cents = 500;
    ledger.record_sale(USER, with_fees).await.unwrap();
    ledger
        .record_sale(USER, new_sale(&identity, date(2024, 3, 10), 1, 1_500))
        .await
        .unwrap();

    let stats = ledger
        .dashboard_stats_on(USER, StatsPeriod::Month, date(2024, 3, 31))
        .await
        .unwrap();

    assert_eq!(stats.from_date, date(2024, 3, 1));
    assert_eq!(stats.sales_count, 2);
    assert_eq!(stats.total_revenue_cents, 3_500 + 1_500);
    assert_eq!(stats.total_fees_cents, 500);
    assert_eq!(stats.total_profit_cents, 1_500 + 500);
    assert_eq!(stats.profit_by_day.len(), 1);
    assert_eq!(stats.cards_on_hand, 6);
    assert_eq!(stats.inventory_value_cents, 6_000);
    assert_eq!(stats.active_lots, 1);
}

#[tokio::test]
async fn test_listing_filters_and_pages() {
    let ledger = ledger().await;
    let charizard = charizard();
    let pikachu = CardIdentity::new(Game::Pokemon, "Pikachu", "Jungle", "", Condition::Lp);
    let magician = CardIdentity::new(Game::Yugioh, "Dark Magician", "LOB", "1st", Condition::Mp);

    for day in 1..=3 {
        ledger
            .create_lot(USER, new_lot(&charizard, date(2024, 1, day), 1, 1_000))
            .await
            .unwrap();
    }
    ledger
        .create_lot(USER, new_lot(&pikachu, date(2024, 1, 4), 1, 100))
        .await
        .unwrap();
    ledger
        .create_lot(USER, new_lot(&magician, date(2024, 1, 5), 1, 100))
        .await
        .unwrap();

    let page = ledger
        .list_lots(
            USER,
            &InventoryFilters {
                game: Some(Game::Pokemon),
                page: 2,
                page_size: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total_count, 4);
    assert_eq!(page.page_size, 2);
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.data[0].purchase_date, date(2024, 1, 3));
    assert_eq!(page.data[1].card_name, "Pikachu");

    let search = ledger
        .list_lots(
            USER,
            &InventoryFilters {
                search: Some("  magic ".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(search.total_count, 1);
    assert_eq!(search.data[0].game, Game::Yugioh);

    let err = ledger
        .list_lots(
            USER,
            &InventoryFilters {
                page_size: Some(500),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let other_user = ledger
        .list_lots("user-2", &InventoryFilters::default())
        .await
        .unwrap();
    assert_eq!(other_user.total_count, 0);
}

#[tokio::test]
async fn test_sales_list_newest_first() {
    let ledger = ledger().await;
    let identity = charizard();

    ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), 5, 5_000))
        .await
        .unwrap();
    for day in [3, 1, 2] {
        ledger
            .record_sale(USER, new_sale(&identity, date(2024, 2, day), 1, 1_500))
            .await
            .unwrap();
    }

    let page = ledger.list_sales(USER, &SaleFilters::default()).await.unwrap();
    let dates: Vec<NaiveDate> = page.data.iter().map(|s| s.sale_date).collect();
    assert_eq!(dates, vec![date(2024, 2, 3), date(2024, 2, 2), date(2024, 2, 1)]);

    let ids: HashSet<&str> = page.data.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids.len(), 3);
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_rejects_bad_input() {
    let ledger = ledger().await;
    let identity = charizard();

    let err = ledger
        .create_lot("", new_lot(&identity, date(2024, 1, 1), 1, 100))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), 0, 100))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = ledger
        .record_sale(USER, new_sale(&identity, date(2024, 1, 1), 1, -5))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = ledger.get_sale(USER, "not-a-uuid").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = ledger
        .delete_sale(USER, &uuid::Uuid::new_v4().to_string())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_rejects_amounts_that_would_overflow() {
    let ledger = ledger().await;
    let identity = charizard();

    let lot = ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), 1, 1_000))
        .await
        .unwrap();

    let mut sale = new_sale(&identity, date(2024, 2, 1), 3, i64::MAX);
    sale.platform_fee_cents = 10;
    let err = ledger.record_sale(USER, sale).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), i64::MAX, 1_000))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), 1, i64::MAX))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = ledger
        .preview_sale(USER, &identity, i64::MAX, Money::zero())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // Nothing was written
    assert_eq!(ledger.get_lot(USER, &lot.id).await.unwrap().qty_on_hand, 1);
    assert_eq!(consumption_count(&ledger, &lot.id).await, 0);
    let sales = ledger.list_sales(USER, &SaleFilters::default()).await.unwrap();
    assert_eq!(sales.total_count, 0);
    let lots = ledger.list_lots(USER, &InventoryFilters::default()).await.unwrap();
    assert_eq!(lots.total_count, 1);
}

#[tokio::test]
async fn test_other_users_records_are_invisible() {
    let ledger = ledger().await;
    let identity = charizard();

    let lot = ledger
        .create_lot(USER, new_lot(&identity, date(2024, 1, 1), 2, 2_000))
        .await
        .unwrap();
    let sale = ledger
        .record_sale(USER, new_sale(&identity, date(2024, 2, 1), 1, 1_500))
        .await
        .unwrap();

    assert_eq!(
        ledger.get_lot("user-2", &lot.id).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        ledger
            .consumptions_for_sale("user-2", &sale.id)
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        ledger.delete_sale("user-2", &sale.id).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(ledger.available_qty(USER, &identity).await.unwrap(), 1);
}

#[tokio::test]
async fn test_json_request_bodies() {
    let ledger = ledger().await;

    let lot: NewLot = serde_json::from_str(
        r#"{
            "game": "yugioh",
            "card_name": "Dark Magician",
            "set_name": "LOB",
            "condition": "LP",
            "qty_initial": 3,
            "purchase_date": "2024-01-01",
            "total_cost_cents": 1000
        }"#,
    )
    .unwrap();
    assert_eq!(lot.variant, "");
    let lot = ledger.create_lot(USER, lot).await.unwrap();
    // 1000 / 3 rounds to 333
    assert_eq!(lot.cost_per_card_cents, 333);

    let sale: NewSale = serde_json::from_str(
        r#"{
            "sale_date": "2024-02-01",
            "platform": "TCGplayer",
            "game": "yugioh",
            "card_name": "Dark Magician",
            "set_name": "LOB",
            "condition": "LP",
            "qty_sold": 2,
            "sale_price_each_cents": 800,
            "platform_fee_cents": 100
        }"#,
    )
    .unwrap();
    let sale = ledger.record_sale(USER, sale).await.unwrap();

    let body = serde_json::to_value(&sale).unwrap();
    assert_eq!(body["net_proceeds_cents"], 1_500);
    assert_eq!(body["cost_basis_used_cents"], 666);
    assert_eq!(body["realized_profit_cents"], 834);
    assert_eq!(body["condition"], "LP");
}
