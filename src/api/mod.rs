// Private module declarations
mod error;
mod handlers;

use actix_web::{web, App, HttpServer};
use std::sync::Arc;

use crate::domain::counter::{CounterCommandHandler, CounterId};
use crate::domain::history::HistoryQueryService;
use crate::metrics::Metrics;

// Re-export for public API
pub use error::ApiError;

// ============================================================================
// HTTP API
// ============================================================================

/// Shared state handed to every route
pub struct AppState {
    pub counters: Arc<CounterCommandHandler>,
    pub history: Arc<HistoryQueryService>,
    pub metrics: Arc<Metrics>,
    pub default_counter: CounterId,
}

/// Register all routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/ping", web::get().to(handlers::get_counter))
        .route("/ping", web::post().to(handlers::increment_counter))
        .route("/reset", web::post().to(handlers::reset_counter))
        .route("/history", web::get().to(handlers::get_history))
        .service(
            web::scope("/counters/{id}")
                .route("/ping", web::get().to(handlers::get_counter))
                .route("/ping", web::post().to(handlers::increment_counter))
                .route("/reset", web::post().to(handlers::reset_counter))
                .route("/history", web::get().to(handlers::get_history)),
        )
        .route("/metrics", web::get().to(handlers::metrics))
        .route("/health", web::get().to(handlers::health));
}

/// Start the HTTP server; returns once the server has shut down (SIGINT/SIGTERM)
pub async fn start_server(state: web::Data<AppState>, address: &str, port: u16) -> std::io::Result<()> {
    tracing::info!("🚀 HTTP listening on http://{}:{}", address, port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((address, port))?
    .run()
    .await
}

// ============================================================================
// Route Tests
// ============================================================================
