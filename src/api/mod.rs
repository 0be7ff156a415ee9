pub mod catalog;
pub mod cycles;
pub mod health;
pub mod lots;
pub mod orders;
pub mod reports;

use crate::clock::Clock;
use crate::config::Config;
use crate::db::Repository;
use crate::orchestration::{
    CycleBaseline, InventoryService, OrderService, ProfitCycleManager, SqlCycleBaseline,
};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub clock: Arc<dyn Clock>,
    pub cycles: Arc<ProfitCycleManager>,
    pub orders: OrderService,
    pub inventory: InventoryService,
}

impl AppState {
    /// Wire the services with the SQL-backed cycle baselines.
    pub fn new(repo: Arc<Repository>, config: Config, clock: Arc<dyn Clock>) -> Self {
        Self::with_baseline(repo, &config, clock, Arc::new(SqlCycleBaseline))
    }

    pub fn with_baseline(
        repo: Arc<Repository>,
        config: &Config,
        clock: Arc<dyn Clock>,
        baseline: Arc<dyn CycleBaseline>,
    ) -> Self {
        let cycles = Arc::new(ProfitCycleManager::new(
            repo.clone(),
            baseline,
            clock.clone(),
            config.placeholder_labels(),
            config.close_timeout(),
        ));
        Self {
            orders: OrderService::new(repo.clone(), clock.clone()),
            inventory: InventoryService::new(repo.clone(), clock.clone()),
            cycles,
            repo,
            clock,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/profit-cycles", get(cycles::list_cycles))
        .route("/v1/profit-cycles/close", post(cycles::close_cycle))
        .route(
            "/v1/profit-cycles/:id",
            get(cycles::get_cycle).delete(cycles::delete_cycle),
        )
        .route(
            "/v1/ingredients",
            get(catalog::list_ingredients).post(catalog::create_ingredient),
        )
        .route(
            "/v1/products",
            get(catalog::list_products).post(catalog::create_product),
        )
        .route(
            "/v1/tables",
            get(catalog::list_tables).post(catalog::create_table),
        )
        .route("/v1/lots", get(lots::list_lots))
        .route("/v1/lots/:id", get(lots::get_lot))
        .route("/v1/lots/:id/stock-count", put(lots::record_stock_count))
        .route("/v1/purchases", post(lots::record_purchase))
        .route(
            "/v1/orders",
            get(orders::list_today_orders).post(orders::create_order),
        )
        .route("/v1/orders/:id", get(orders::get_order))
        .route("/v1/orders/:id/items", post(orders::add_line_item))
        .route("/v1/orders/items/:item_id", put(orders::set_line_item_qty))
        .route("/v1/orders/:id/served", post(orders::mark_served))
        .route("/v1/orders/:id/complete", post(orders::complete_order))
        .route("/v1/orders/:id/cancel", post(orders::cancel_order))
        .route("/v1/payments", get(reports::list_payments))
        .route("/v1/reports/today", get(reports::today_stats))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
