use axum::{Json, extract::State, response::IntoResponse};

use crate::web::AppState;

/// Per-strategy attempt/success counters since process start
pub async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.chain.stats().snapshot())
}
