use cafeledger::{api, config::Config, db::init_db_with, Clock, Repository, SystemClock};
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

fn exit_with(context: &str, err: impl Display) -> ! {
    eprintln!("{context}: {err}");
    std::process::exit(1);
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Could not install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested, draining connections");
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into()))
        .init();

    let config = Config::from_env().unwrap_or_else(|e| exit_with("Configuration error", e));

    let pool = init_db_with(&config.database_path, config.db_max_connections)
        .await
        .unwrap_or_else(|e| exit_with("Failed to initialize database", e));

    let addr = SocketAddr::new(config.bind_addr, config.port);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = api::AppState::new(Arc::new(Repository::new(pool)), config, clock);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| exit_with(&format!("Failed to bind to {addr}"), e));
    tracing::info!(%addr, "Café ledger listening");

    if let Err(e) = axum::serve(listener, api::create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        exit_with("Server error", e);
    }
}
