pub(crate) mod api;
pub(crate) mod attempt;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod schemas;
pub(crate) mod store;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use tokio::sync::watch;

use crate::attempt::registry::AttemptRegistry;
use crate::core::{config::Settings, state::AppState, telemetry};
use crate::store::postgres::PgStore;
use crate::store::{AttemptStore, TestStore};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let store = Arc::new(PgStore::new(db_pool));
    let tests: Arc<dyn TestStore> = store.clone();
    let attempts: Arc<dyn AttemptStore> = store;

    let registry = AttemptRegistry::new();
    let state = AppState::new(settings, tests, attempts, registry.clone());

    let (sweep_tx, sweep_rx) = watch::channel(false);
    let sweeper = tokio::spawn(attempt::registry::sweep_loop(
        registry.clone(),
        state.settings().attempt().clone(),
        sweep_rx,
    ));

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Prepline API listening"
    );

    let result =
        axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await;

    if sweep_tx.send(true).is_err() {
        tracing::warn!("Failed to signal session sweeper shutdown");
    }
    if let Err(err) = sweeper.await {
        tracing::error!(error = %err, "Session sweeper join failed");
    }

    // Live sessions must not keep ticking past server shutdown.
    registry.shutdown_all().await;

    result?;

    Ok(())
}
