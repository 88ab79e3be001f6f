use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;

use crate::domain::counter::CounterId;
use super::error::ApiError;
use super::AppState;

// ============================================================================
// Route Handlers
// ============================================================================
//
// Every counter route exists twice: `/ping` targets the configured default
// counter, `/counters/{id}/ping` targets `{id}`.
//
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

fn target(state: &AppState, path: Option<web::Path<String>>) -> CounterId {
    match path {
        Some(id) => CounterId::new(id.into_inner()),
        None => state.default_counter.clone(),
    }
}

pub async fn get_counter(
    state: web::Data<AppState>,
    path: Option<web::Path<String>>,
) -> Result<HttpResponse, ApiError> {
    let id = target(&state, path);
    let counter = state.counters.get_current_counter(&id).await?;
    Ok(HttpResponse::Ok().json(counter))
}

pub async fn increment_counter(
    state: web::Data<AppState>,
    path: Option<web::Path<String>>,
) -> Result<HttpResponse, ApiError> {
    let id = target(&state, path);
    let counter = state.counters.increment_counter(&id).await?;
    Ok(HttpResponse::Ok().json(counter))
}

pub async fn reset_counter(
    state: web::Data<AppState>,
    path: Option<web::Path<String>>,
) -> Result<HttpResponse, ApiError> {
    let id = target(&state, path);
    let counter = state.counters.reset_counter(&id).await?;
    Ok(HttpResponse::Ok().json(counter))
}

pub async fn get_history(
    state: web::Data<AppState>,
    path: Option<web::Path<String>>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, ApiError> {
    let id = target(&state, path);
    let history = state.history.get_history(&id, query.limit).await?;
    Ok(HttpResponse::Ok().json(history))
}

pub async fn metrics(state: web::Data<AppState>) -> impl Responder {
    match state.metrics.render() {
        Ok(buffer) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(buffer),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "ping-counter"
    }))
}
