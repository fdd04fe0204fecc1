//! Request inspection.
//!
//! # Responsibilities
//! - Name the control headers the inlet understands
//! - Detect multi-call requests
//! - Derive executor call options (timeout, range, pass-through headers)
//!
//! # Design Decisions
//! - Request ID is added by tower-http before handlers run
//! - Malformed advisory headers are ignored, never fatal

use std::time::Duration;

use axum::http::{HeaderMap, HeaderName};

use crate::executor::CallOptions;

/// Default header carrying the API name.
pub const X_API: &str = "X-Api";
/// Switches body interpretation to `{apiName: subRequest}`.
pub const X_API_MULTI_CALL: &str = "X-Api-Multi-Call";
/// Advisory timeout in milliseconds passed to the executor.
pub const X_API_CALL_TIMEOUT: &str = "X-Api-Call-Timeout";
/// Advisory range passed to the executor.
pub const X_RANGE: &str = "X-Range";
/// Correlation header set on every request and response.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Returns true if the request bundles several API calls.
pub fn is_multi_call(headers: &HeaderMap) -> bool {
    headers
        .get(X_API_MULTI_CALL)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "1")
        .unwrap_or(false)
}

/// Read the request ID assigned by the request-id layer.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Build executor call options from request headers.
pub fn call_options(headers: &HeaderMap, pass_through: &[HeaderName]) -> CallOptions {
    let timeout = headers
        .get(X_API_CALL_TIMEOUT)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis);

    let range = headers
        .get(X_RANGE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let mut forwarded = HeaderMap::new();
    for name in pass_through {
        for value in headers.get_all(name) {
            forwarded.append(name.clone(), value.clone());
        }
    }

    CallOptions {
        timeout,
        range,
        headers: forwarded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_is_multi_call() {
        let mut headers = HeaderMap::new();
        assert!(!is_multi_call(&headers));

        headers.insert(X_API_MULTI_CALL, HeaderValue::from_static("1"));
        assert!(is_multi_call(&headers));

        headers.insert(X_API_MULTI_CALL, HeaderValue::from_static("true"));
        assert!(!is_multi_call(&headers));
    }

    #[test]
    fn test_call_options() {
        let mut headers = HeaderMap::new();
        headers.insert(X_API_CALL_TIMEOUT, HeaderValue::from_static("1500"));
        headers.insert(X_RANGE, HeaderValue::from_static("0-9"));
        headers.insert("authorization", HeaderValue::from_static("Bearer t"));
        headers.insert("cookie", HeaderValue::from_static("a=b"));

        let options = call_options(&headers, &[HeaderName::from_static("authorization")]);
        assert_eq!(options.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(options.range.as_deref(), Some("0-9"));
        assert_eq!(options.headers.len(), 1);
        assert_eq!(options.headers["authorization"], "Bearer t");
    }

    #[test]
    fn test_bad_timeout_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(X_API_CALL_TIMEOUT, HeaderValue::from_static("soon"));
        assert_eq!(call_options(&headers, &[]).timeout, None);

        headers.insert(X_API_CALL_TIMEOUT, HeaderValue::from_static("0"));
        assert_eq!(call_options(&headers, &[]).timeout, None);
    }
}
