use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::models::ResolutionRequest;
use crate::web::AppState;
use crate::web::middleware::RequestId;
use crate::web::responses::{ExtractResponse, bad_request, handle_error};

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractRequest {
    #[serde(default)]
    pub url: Option<String>,
}

/// Resolve a watch page into a playable stream URL
///
/// `200` with the stream on success, `500` with a message when every
/// strategy failed, `400` when the body is unusable.
pub async fn extract_stream(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Response {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            return bad_request(&format!("invalid request body: {}", rejection.body_text()));
        }
    };

    let Some(url) = body.url.filter(|url| !url.trim().is_empty()) else {
        return bad_request("url is required");
    };

    let id = request_id.map_or_else(Uuid::new_v4, |Extension(RequestId(id))| id);
    let request = match ResolutionRequest::parse_with_id(&url, id) {
        Ok(request) => request,
        Err(e) => return handle_error(e),
    };

    let result = state.chain.handle(&request).await;
    ExtractResponse::from(&result).into_response()
}
