use cafeledger::domain::{IngredientId, InventoryLot, LotId, PurchaseOrderId, SnapshotEntry};
use cafeledger::engine::{CostAttribution, CostAttributor};
use cafeledger::{Decimal, TimeMs};

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn lot(id: i64, original: &str, remaining: &str, unit_cost: &str) -> InventoryLot {
    InventoryLot {
        id: LotId::new(id),
        purchase_order_id: PurchaseOrderId::new(1),
        ingredient_id: IngredientId::new(id),
        ingredient_name: Some(format!("ingredient-{id}")),
        original_qty: d(original),
        remaining_qty: d(remaining),
        unit_cost: d(unit_cost),
        purchased_at_ms: TimeMs::new(1_000),
        created_at_ms: TimeMs::new(1_000),
    }
}

/// Lots A, B, C at the given remaining quantities.
fn cafe_lots(a: &str, b: &str, c: &str) -> Vec<InventoryLot> {
    vec![
        lot(1, "100", a, "10"),
        lot(2, "50", b, "15"),
        lot(3, "25", c, "30"),
    ]
}

fn close(prior: Option<&[SnapshotEntry]>, lots: &[InventoryLot]) -> CostAttribution {
    CostAttributor::new(prior).attribute(lots)
}

fn consumed_by_lot(result: &CostAttribution) -> Vec<(i64, Decimal)> {
    let mut consumed: Vec<(i64, Decimal)> = result
        .details
        .items
        .iter()
        .map(|item| (item.lot_id.as_i64(), item.consumed_qty))
        .collect();
    consumed.sort_by_key(|(id, _)| *id);
    consumed
}

#[test]
fn test_first_cycle_bootstraps_from_original_quantity() {
    let result = close(None, &cafe_lots("75", "35", "20"));

    assert_eq!(
        consumed_by_lot(&result),
        vec![(1, d("25")), (2, d("15")), (3, d("5"))]
    );
    assert_eq!(result.total_cost, d("625"));
}

#[test]
fn test_three_consecutive_cycles_sum_to_one_shot_cost() {
    let first = close(None, &cafe_lots("75", "35", "20"));
    assert_eq!(first.total_cost, d("625"));

    let second = close(Some(&first.snapshot), &cafe_lots("55", "25", "15"));
    assert_eq!(
        consumed_by_lot(&second),
        vec![(1, d("20")), (2, d("10")), (3, d("5"))]
    );
    assert_eq!(second.total_cost, d("500"));

    let third = close(Some(&second.snapshot), &cafe_lots("45", "18", "10"));
    assert_eq!(
        consumed_by_lot(&third),
        vec![(1, d("10")), (2, d("7")), (3, d("5"))]
    );
    assert_eq!(third.total_cost, d("355"));

    let cumulative = first.total_cost + second.total_cost + third.total_cost;
    let one_shot = close(None, &cafe_lots("45", "18", "10"));
    assert_eq!(cumulative, d("1480"));
    assert_eq!(cumulative, one_shot.total_cost);
}

#[test]
fn test_upward_correction_contributes_nothing() {
    let prior = close(None, &[lot(1, "30", "20", "4")]);

    let corrected = close(Some(&prior.snapshot), &[lot(1, "30", "22", "4")]);

    assert!(corrected.details.items.is_empty());
    assert_eq!(corrected.total_cost, Decimal::zero());
    // The corrected value still becomes the next baseline.
    assert_eq!(corrected.snapshot[0].remaining_qty, d("22"));
}

#[test]
fn test_new_lot_mid_cycle_measured_from_original() {
    let prior = close(None, &cafe_lots("75", "35", "20"));

    let mut lots = cafe_lots("75", "35", "20");
    lots.push(lot(4, "40", "30", "2"));
    let result = close(Some(&prior.snapshot), &lots);

    assert_eq!(consumed_by_lot(&result), vec![(4, d("10"))]);
    assert_eq!(result.total_cost, d("20"));
}

#[test]
fn test_snapshot_covers_unconsumed_lots() {
    let result = close(None, &cafe_lots("100", "35", "25"));

    assert_eq!(result.details.items.len(), 1);
    assert_eq!(result.snapshot.len(), 3);
    let ids: Vec<i64> = result.snapshot.iter().map(|e| e.lot_id.as_i64()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn test_details_sorted_by_line_cost_descending() {
    let result = close(None, &cafe_lots("75", "35", "20"));

    let costs: Vec<Decimal> = result.details.items.iter().map(|i| i.line_cost).collect();
    assert_eq!(costs, vec![d("250"), d("225"), d("150")]);
}

#[test]
fn test_fractional_quantities_do_not_drift() {
    let mut prior = close(None, &[lot(1, "1", "1", "0.1")]);
    let mut total = Decimal::zero();
    let mut remaining = d("1");

    for _ in 0..10 {
        remaining = remaining - d("0.1");
        let step = close(
            Some(&prior.snapshot),
            &[lot(1, "1", &remaining.to_canonical_string(), "0.1")],
        );
        total += step.total_cost;
        prior = step;
    }

    assert_eq!(remaining, Decimal::zero());
    assert_eq!(total, d("0.1"));
}
