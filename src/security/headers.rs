//! Static response headers.
//!
//! # Responsibilities
//! - Build `Server`, optional `P3P` and configured extra headers once
//! - Stamp them onto every inlet response
//!
//! # Design Decisions
//! - Invalid names or values are rejected at startup, not per request
//! - Configured extras may override `Server`/`P3P`

use axum::http::header::SERVER;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::schema::HttpConfig;

#[derive(Debug, Error)]
pub enum HeaderConfigError {
    #[error("invalid response header name '{0}'")]
    InvalidName(String),

    #[error("invalid value for response header '{0}'")]
    InvalidValue(String),
}

#[derive(Debug, Clone, Default)]
pub struct StaticHeaders {
    headers: HeaderMap,
}

impl StaticHeaders {
    pub fn from_config(http: &HttpConfig) -> Result<Self, HeaderConfigError> {
        let mut headers = HeaderMap::new();

        if !http.server.trim().is_empty() {
            headers.insert(SERVER, header_value("Server", &http.server)?);
        }
        if !http.p3p.trim().is_empty() {
            headers.insert(HeaderName::from_static("p3p"), header_value("P3P", &http.p3p)?);
        }
        for (name, value) in &http.response_headers {
            let header = HeaderName::from_bytes(name.trim().as_bytes())
                .map_err(|_| HeaderConfigError::InvalidName(name.clone()))?;
            headers.insert(header, header_value(name, value)?);
        }

        Ok(Self { headers })
    }

    pub fn apply(&self, response: &mut HeaderMap) {
        for (name, value) in &self.headers {
            response.insert(name.clone(), value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, HeaderConfigError> {
    HeaderValue::from_str(value.trim()).map_err(|_| HeaderConfigError::InvalidValue(name.to_string()))
}
