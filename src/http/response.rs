//! Response writing.
//!
//! # Responsibilities
//! - Wrap rendered bodies as `200 application/json`
//! - Stamp static headers and CORS headers on every inlet response
//! - Sign the exact body bytes when a signer is configured
//!
//! # Design Decisions
//! - The HTTP status never carries the error; the body record does
//! - A signing failure is logged and the body is sent unsigned

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;

use crate::http::server::AppState;

const APPLICATION_JSON: &str = "application/json";

/// Preflight answer: CORS and static headers, empty body.
pub fn preflight(state: &AppState, request: &HeaderMap) -> Response {
    let mut response = Response::new(Body::empty());
    decorate(state, request, response.headers_mut());
    response
}

/// Rendered body with every inlet header applied.
pub fn rendered(state: &AppState, request: &HeaderMap, body: String) -> Response {
    let signature = state.signer.as_ref().and_then(|signer| match signer.sign(body.as_bytes()) {
        Ok(signature) => HeaderValue::from_str(&signature)
            .ok()
            .map(|value| (signer.header().clone(), value)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to sign response body");
            None
        }
    });

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    decorate(state, request, headers);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
    if let Some((name, value)) = signature {
        headers.insert(name, value);
    }

    response
}

fn decorate(state: &AppState, request: &HeaderMap, headers: &mut HeaderMap) {
    state.static_headers.apply(headers);
    state.origins.apply(request, headers);
}
