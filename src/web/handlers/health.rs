use axum::{Json, response::IntoResponse};

use crate::web::responses::HealthResponse;

/// Liveness check. Does not touch the resolver collaborators.
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse::healthy())
}
