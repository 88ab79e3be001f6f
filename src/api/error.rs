use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use crate::domain::counter::CounterServiceError;
use crate::persistence::StoreError;

// ============================================================================
// HTTP Error Mapping
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Counter(#[from] CounterServiceError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Counter(e) if e.is_increment_rejected() => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        let message = if status == StatusCode::CONFLICT {
            self.to_string()
        } else {
            // Unresolved divergence is already logged at ERROR by the command handler
            if !matches!(self, ApiError::Counter(e) if e.is_unresolved_inconsistency()) {
                tracing::error!(error = %self, "Request failed");
            }
            "Internal Server Error".to_string()
        };

        HttpResponse::build(status).json(serde_json::json!({ "error": message }))
    }
}
