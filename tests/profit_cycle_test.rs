use async_trait::async_trait;
use cafeledger::db::init_db;
use cafeledger::db::repo::{CycleAnchor, SnapshotBaseline};
use cafeledger::domain::{
    CycleId, IngredientId, InventoryLot, LotId, OrderId, Product, ProfitCycle, SnapshotEntry,
};
use cafeledger::engine::PlaceholderLabels;
use cafeledger::orchestration::{
    CycleBaseline, CycleError, FixedCycleBaseline, InventoryService, NewOrder, OrderService,
    ProfitCycleManager, SqlCycleBaseline,
};
use cafeledger::{Clock, Decimal, ManualClock, Repository, TimeMs};
use sqlx::sqlite::SqliteConnection;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const T0: i64 = 1_700_000_000_000;

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

struct Harness {
    repo: Arc<Repository>,
    clock: Arc<ManualClock>,
    orders: OrderService,
    inventory: InventoryService,
    cycles: Arc<ProfitCycleManager>,
    _temp: TempDir,
}

async fn setup() -> Harness {
    setup_with_baseline(Arc::new(SqlCycleBaseline), Duration::from_secs(30)).await
}

async fn setup_with_baseline(baseline: Arc<dyn CycleBaseline>, timeout: Duration) -> Harness {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let clock = Arc::new(ManualClock::new(TimeMs::new(T0)));
    let dyn_clock: Arc<dyn Clock> = clock.clone();

    Harness {
        orders: OrderService::new(repo.clone(), dyn_clock.clone()),
        inventory: InventoryService::new(repo.clone(), dyn_clock.clone()),
        cycles: Arc::new(ProfitCycleManager::new(
            repo.clone(),
            baseline,
            dyn_clock,
            PlaceholderLabels::default(),
            timeout,
        )),
        repo,
        clock,
        _temp: temp_dir,
    }
}

impl Harness {
    async fn ingredient(&self, name: &str) -> IngredientId {
        self.repo
            .create_ingredient(name, Some("unit"), self.clock.now())
            .await
            .unwrap()
            .id
    }

    async fn purchase(&self, ingredient: IngredientId, qty: &str, cost: &str) -> InventoryLot {
        self.inventory
            .record_purchase(ingredient, d(qty), d(cost))
            .await
            .unwrap()
    }

    async fn count(&self, lot: LotId, remaining: &str) {
        self.inventory
            .record_stock_count(lot, d(remaining), None)
            .await
            .unwrap();
    }

    async fn product(&self, name: &str, price: &str) -> Product {
        self.repo
            .create_product(name, d(price), None, self.clock.now())
            .await
            .unwrap()
    }

    /// Sell `qty` of a product as a takeaway order and pay for it.
    async fn sell(&self, product: &Product, qty: i64) -> OrderId {
        let order = self.orders.create_order(NewOrder::default()).await.unwrap();
        self.orders
            .add_line_item(order.id, product.id, qty)
            .await
            .unwrap();
        self.orders
            .complete(order.id, Decimal::zero())
            .await
            .unwrap()
            .id
    }

    async fn close(&self) -> ProfitCycle {
        self.clock.advance(1_000);
        self.cycles.close().await.unwrap()
    }
}

async fn three_lots(h: &Harness) -> [LotId; 3] {
    let beans = h.ingredient("Beans").await;
    let milk = h.ingredient("Milk").await;
    let syrup = h.ingredient("Syrup").await;
    [
        h.purchase(beans, "100", "10").await.id,
        h.purchase(milk, "50", "15").await.id,
        h.purchase(syrup, "25", "30").await.id,
    ]
}

async fn count_all(h: &Harness, lots: &[LotId; 3], remaining: [&str; 3]) {
    for (lot, qty) in lots.iter().zip(remaining) {
        h.count(*lot, qty).await;
    }
}

#[tokio::test]
async fn test_first_cycle_starts_at_epoch() {
    let h = setup().await;
    let lots = three_lots(&h).await;
    count_all(&h, &lots, ["75", "35", "20"]).await;

    let cycle = h.close().await;

    assert_eq!(cycle.start_ms, TimeMs::EPOCH);
    assert_eq!(cycle.end_ms, TimeMs::new(T0 + 1_000));
    assert_eq!(cycle.cost, d("625"));
    assert_eq!(cycle.revenue, Decimal::zero());
    assert_eq!(cycle.profit, d("-625"));
    assert_eq!(cycle.inventory_snapshot.len(), 3);
    assert_eq!(cycle.cost_details.items[0].ingredient_name, "Beans");
}

#[tokio::test]
async fn test_consecutive_cycles_are_incremental() {
    let h = setup().await;
    let lots = three_lots(&h).await;

    count_all(&h, &lots, ["75", "35", "20"]).await;
    let first = h.close().await;
    count_all(&h, &lots, ["55", "25", "15"]).await;
    let second = h.close().await;
    count_all(&h, &lots, ["45", "18", "10"]).await;
    let third = h.close().await;

    assert_eq!(first.cost, d("625"));
    assert_eq!(second.cost, d("500"));
    assert_eq!(third.cost, d("355"));
    assert_eq!(second.start_ms, first.end_ms);
    assert_eq!(third.start_ms, second.end_ms);
    assert_eq!(first.cost + second.cost + third.cost, d("1480"));

    let listed = h.cycles.list().await.unwrap();
    let ids: Vec<CycleId> = listed.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![third.id, second.id, first.id]);
}

#[tokio::test]
async fn test_revenue_counted_exactly_once() {
    let h = setup().await;
    let latte = h.product("Latte", "30").await;

    h.sell(&latte, 2).await;
    let first = h.close().await;
    assert_eq!(first.revenue, d("60"));
    assert_eq!(first.profit, d("60"));
    assert_eq!(first.revenue_details.total_orders, 1);

    let second = h.close().await;
    assert_eq!(second.revenue, Decimal::zero());
    assert!(second.revenue_details.orders.is_empty());
}

#[tokio::test]
async fn test_payment_after_close_lands_in_next_window() {
    let h = setup().await;
    let latte = h.product("Latte", "30").await;

    let first = h.close().await;
    // The clock has not moved since the close.
    let order_id = h.sell(&latte, 1).await;
    let order = h.orders.get(order_id).await.unwrap();
    let paid_at = order.payment.unwrap().created_at_ms;
    assert!(paid_at > first.end_ms);

    let second = h.close().await;
    assert_eq!(second.revenue, d("30"));
    assert_eq!(second.revenue_details.orders[0].paid_at_ms, paid_at);
}

#[tokio::test]
async fn test_cancelled_orders_never_reach_revenue() {
    let h = setup().await;
    let latte = h.product("Latte", "30").await;

    let order = h.orders.create_order(NewOrder::default()).await.unwrap();
    h.orders.add_line_item(order.id, latte.id, 3).await.unwrap();
    h.orders.cancel(order.id).await.unwrap();
    h.sell(&latte, 1).await;

    let cycle = h.close().await;
    assert_eq!(cycle.revenue, d("30"));
    assert_eq!(cycle.revenue_details.total_orders, 1);
    assert!(cycle
        .revenue_details
        .orders
        .iter()
        .all(|o| o.order_id != order.id));
    assert_eq!(cycle.revenue_details.items[0].qty, 1);
}

#[tokio::test]
async fn test_revenue_breakdown_by_product_and_order() {
    let h = setup().await;
    let latte = h.product("Latte", "30").await;
    let cake = h.product("Cake", "45").await;

    let first = h.sell(&latte, 1).await;
    h.clock.advance(10);
    let order = h.orders.create_order(NewOrder::default()).await.unwrap();
    h.orders.add_line_item(order.id, cake.id, 2).await.unwrap();
    h.orders.add_line_item(order.id, latte.id, 1).await.unwrap();
    h.orders.complete(order.id, Decimal::zero()).await.unwrap();

    let cycle = h.close().await;
    let details = &cycle.revenue_details;

    assert_eq!(cycle.revenue, d("150"));
    assert_eq!(details.total_orders, 2);
    // Newest payment first.
    assert_eq!(details.orders[0].order_id, order.id);
    assert_eq!(details.orders[1].order_id, first);
    assert_eq!(details.orders[1].table_name, "Takeaway");
    assert_eq!(details.orders[1].customer_name, "Walk-in customer");

    assert_eq!(details.items[0].product_name, "Cake");
    assert_eq!(details.items[0].total, d("90"));
    assert_eq!(details.items[1].product_name, "Latte");
    assert_eq!(details.items[1].qty, 2);
    assert_eq!(details.items[1].total, d("60"));
}

#[tokio::test]
async fn test_deleting_latest_cycle_shifts_baseline() {
    let h = setup().await;
    let lots = three_lots(&h).await;

    count_all(&h, &lots, ["75", "35", "20"]).await;
    let first = h.close().await;
    count_all(&h, &lots, ["55", "25", "15"]).await;
    let second = h.close().await;

    h.cycles.delete(second.id).await.unwrap();
    let err = h.cycles.get(second.id).await.unwrap_err();
    assert!(matches!(err, CycleError::NotFound(_)));

    let replacement = h.close().await;
    assert_eq!(replacement.start_ms, first.end_ms);
    // Measured from the first snapshot again: 20 + 10 + 5 consumed.
    assert_eq!(replacement.cost, d("500"));
}

#[tokio::test]
async fn test_delete_missing_cycle_is_not_found() {
    let h = setup().await;
    let err = h.cycles.delete(CycleId::new(42)).await.unwrap_err();
    assert!(matches!(err, CycleError::NotFound(id) if id == CycleId::new(42)));
}

#[tokio::test]
async fn test_baselines_resolved_independently() {
    let anchor = CycleAnchor {
        cycle_id: CycleId::new(1),
        end_ms: TimeMs::new(T0 - 5_000),
    };
    // Snapshot from a different cycle, where lot 1 still held 90.
    let snapshot = SnapshotBaseline {
        cycle_id: CycleId::new(2),
        entries: vec![SnapshotEntry {
            lot_id: LotId::new(1),
            purchase_order_id: cafeledger::domain::PurchaseOrderId::new(1),
            ingredient_id: IngredientId::new(1),
            remaining_qty: d("90"),
        }],
    };
    let baseline = FixedCycleBaseline::new()
        .with_anchor(anchor)
        .with_snapshot(snapshot);
    let h = setup_with_baseline(Arc::new(baseline), Duration::from_secs(30)).await;

    let beans = h.ingredient("Beans").await;
    let lot = h.purchase(beans, "100", "10").await;
    assert_eq!(lot.id, LotId::new(1));
    h.count(lot.id, "80").await;

    let cycle = h.close().await;
    assert_eq!(cycle.start_ms, TimeMs::new(T0 - 5_000));
    assert_eq!(cycle.cost, d("100"));
    assert_eq!(cycle.cost_details.items[0].previous_remaining, d("90"));
}

#[derive(Debug)]
struct SlowBaseline;

#[async_trait]
impl CycleBaseline for SlowBaseline {
    async fn most_recent_by_end_date(
        &self,
        _conn: &mut SqliteConnection,
    ) -> Result<Option<CycleAnchor>, sqlx::Error> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(None)
    }

    async fn most_recent_by_creation(
        &self,
        _conn: &mut SqliteConnection,
    ) -> Result<Option<SnapshotBaseline>, sqlx::Error> {
        Ok(None)
    }
}

#[tokio::test]
async fn test_timed_out_close_persists_nothing() {
    let h = setup_with_baseline(Arc::new(SlowBaseline), Duration::from_millis(20)).await;

    let err = h.cycles.close().await.unwrap_err();
    assert!(matches!(err, CycleError::ComputationFailed(_)));
    assert!(h.cycles.list().await.unwrap().is_empty());

    // The rolled back close left the write lock free for the next one.
    let latte = h.product("Latte", "30").await;
    h.sell(&latte, 1).await;
}

#[tokio::test]
async fn test_concurrent_closes_do_not_overlap() {
    let h = setup().await;
    let latte = h.product("Latte", "30").await;
    h.sell(&latte, 1).await;
    h.clock.advance(1_000);

    let a = tokio::spawn({
        let cycles = h.cycles.clone();
        async move { cycles.close().await }
    });
    let b = tokio::spawn({
        let cycles = h.cycles.clone();
        async move { cycles.close().await }
    });
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    let mut cycles = h.cycles.list().await.unwrap();
    cycles.sort_by_key(|c| c.id);
    assert_eq!(cycles.len(), 2);
    assert_eq!(cycles[1].start_ms, cycles[0].end_ms);
    let total: Decimal = cycles.iter().map(|c| c.revenue).sum();
    assert_eq!(total, d("30"));
}
