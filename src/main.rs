use actix_web::web;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ping_counter::api::{self, AppState};
use ping_counter::config::{AppConfig, StoreBackend};
use ping_counter::domain::counter::CounterCommandHandler;
use ping_counter::domain::history::HistoryQueryService;
use ping_counter::metrics::Metrics;
use ping_counter::persistence::{
    ensure_schema, CounterStore, HistoryStore, InMemoryCounterStore, InMemoryHistoryStore,
    ScyllaCounterStore, ScyllaHistoryStore,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging, overridable with RUST_LOG
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ping_counter=debug"))
        )
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(
        backend = ?config.store_backend,
        consistency = ?config.consistency,
        counter_id = %config.counter_id,
        "Starting ping counter service"
    );

    // === 1. Stores ===
    let (counter_store, history_store): (Arc<dyn CounterStore>, Arc<dyn HistoryStore>) =
        match config.store_backend {
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory stores, state is lost on shutdown");
                (
                    Arc::new(InMemoryCounterStore::new()),
                    Arc::new(InMemoryHistoryStore::new()),
                )
            }
            StoreBackend::Scylla => {
                tracing::info!(nodes = ?config.scylla.nodes, "Connecting to ScyllaDB...");
                let session: Session = SessionBuilder::new()
                    .known_nodes(&config.scylla.nodes)
                    .build()
                    .await?;
                ensure_schema(&session, &config.scylla.keyspace).await?;

                let session = Arc::new(session);
                (
                    Arc::new(ScyllaCounterStore::new(session.clone(), config.store_retry.clone())),
                    Arc::new(ScyllaHistoryStore::new(session, config.store_retry.clone())),
                )
            }
        };

    // === 2. Metrics ===
    let metrics = Arc::new(Metrics::new()?);

    // === 3. Services ===
    let history = Arc::new(HistoryQueryService::new(history_store));
    let counters = Arc::new(CounterCommandHandler::new(
        counter_store,
        history.clone(),
        config.consistency,
        metrics.clone(),
    ));

    let state = web::Data::new(AppState {
        counters,
        history,
        metrics,
        default_counter: config.counter_id.clone(),
    });

    // === 4. HTTP (stops gracefully on SIGINT/SIGTERM) ===
    api::start_server(state, &config.bind_address, config.port).await?;

    tracing::info!("HTTP server closed, shutting down");
    Ok(())
}
