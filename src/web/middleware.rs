//! HTTP middleware

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

/// Response header echoing the id every log line of the request carries
pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Per-request id, minted by [`request_logging_middleware`] and stored as a
/// request extension so handlers can hand it on to the resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(pub Uuid);

/// Tag the request with a fresh [`RequestId`], log its completion and echo
/// the id back in `x-request-id`.
///
/// Only the path is logged; query strings may carry tokens.
pub async fn request_logging_middleware(mut request: Request, next: Next) -> Response {
    let request_id = RequestId(Uuid::new_v4());
    request.extensions_mut().insert(request_id);

    let span = info_span!(
        "http",
        request_id = %request_id.0,
        method = %request.method(),
        path = %request.uri().path()
    );

    async move {
        let started = Instant::now();
        let mut response = next.run(request).await;
        let status = response.status();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if status.is_client_error() || status.is_server_error() {
            warn!(status = status.as_u16(), elapsed_ms, "Request failed");
        } else {
            info!(status = status.as_u16(), elapsed_ms, "Request served");
        }

        if let Ok(value) = HeaderValue::from_str(&request_id.0.to_string()) {
            response
                .headers_mut()
                .insert(REQUEST_ID_HEADER.clone(), value);
        }
        response
    }
    .instrument(span)
    .await
}
