//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity by dry-running the graph registry build
//! - Validate value ranges (timeouts > 0, body limit > 0)
//! - Validate addresses, header names and signing settings
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: InletConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderName;
use url::Url;

use crate::config::schema::InletConfig;
use crate::graph::GraphRegistry;

/// One failed check, named by the config field it concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &InletConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let http = &config.http;

    if http.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "http.bind_address",
            format!("'{}' is not a socket address", http.bind_address),
        ));
    }

    let path = http.path.trim();
    if !path.is_empty() && !path.starts_with('/') {
        errors.push(ValidationError::new("http.path", "must be empty or start with '/'"));
    }

    if HeaderName::from_bytes(http.api_header.trim().as_bytes()).is_err() {
        errors.push(ValidationError::new(
            "http.api_header",
            format!("'{}' is not a valid header name", http.api_header),
        ));
    }

    for name in &http.pass_through_headers {
        if HeaderName::from_bytes(name.trim().as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "http.pass_through_headers",
                format!("'{}' is not a valid header name", name),
            ));
        }
    }

    if http.max_body_size == 0 {
        errors.push(ValidationError::new("http.max_body_size", "must be greater than 0"));
    }

    if http.signature.enabled {
        if http.signature.private_key_path.trim().is_empty() {
            errors.push(ValidationError::new(
                "http.signature.private_key_path",
                "required when signing is enabled",
            ));
        }
        if HeaderName::from_bytes(http.signature.header.trim().as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "http.signature.header",
                format!("'{}' is not a valid header name", http.signature.header),
            ));
        }
    }

    if config.executor.timeout_ms == 0 {
        errors.push(ValidationError::new("executor.timeout_ms", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    for address in &config.address {
        let url = address.url.trim();
        if url.is_empty() {
            // Reported by the registry dry run below.
            continue;
        }
        match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => errors.push(ValidationError::new(
                format!("address.{}", address.name),
                format!("unsupported url scheme '{}'", parsed.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new(
                format!("address.{}", address.name),
                format!("invalid url '{}': {}", url, e),
            )),
        }
    }

    if let Err(e) = GraphRegistry::build(&config.address, &config.graphs, &config.hooks) {
        errors.push(ValidationError::new("graphs", e.to_string()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
