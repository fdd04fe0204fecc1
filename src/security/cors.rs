//! Cross-origin access policy.
//!
//! # Responsibilities
//! - Split a Referer/Origin value into protocol and domain
//! - Match the domain against the configured allow-list
//! - Write the `Access-Control-*` response headers
//!
//! # Design Decisions
//! - Referer wins over Origin, matching what browsers send on POST
//! - An empty origin or a browser-extension scheme is answered with `*`
//!   instead of the literal origin
//! - Allow-headers are computed once; names compare case-insensitively

use std::collections::HashSet;

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN, REFERER,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::http::request::{X_API, X_API_CALL_TIMEOUT, X_API_MULTI_CALL, X_RANGE};

/// Headers always advertised to browsers.
const BASELINE_HEADERS: &[&str] = &["Content-Type", X_API, X_API_MULTI_CALL, X_API_CALL_TIMEOUT, X_RANGE];

/// Schemes whose origins cannot be echoed back literally.
const EXTENSION_SCHEMES: &[&str] = &["chrome-extension", "moz-extension"];

/// Outcome of evaluating one Referer/Origin value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginCheck {
    pub protocol: String,
    pub domain: String,
    pub allowed: bool,
}

impl OriginCheck {
    /// Value for `Access-Control-Allow-Origin`, if the origin is allowed.
    pub fn allow_origin(&self) -> Option<String> {
        if !self.allowed {
            return None;
        }
        let origin = format!("{}://{}", self.protocol, self.domain);
        if origin == "://" || EXTENSION_SCHEMES.contains(&self.protocol.as_str()) {
            return Some("*".to_string());
        }
        Some(origin)
    }
}

#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allow_all: bool,
    exact: HashSet<String>,
    /// Suffixes from `*.domain` entries, stored with the leading dot.
    wildcard_suffixes: Vec<String>,
    allow_headers: String,
}

impl OriginPolicy {
    pub fn new(allow_origins: &[String], allow_headers: &[String], api_header: &str) -> Self {
        let mut allow_all = false;
        let mut exact = HashSet::new();
        let mut wildcard_suffixes = Vec::new();

        for origin in allow_origins {
            let origin = origin.trim().to_ascii_lowercase();
            if origin == "*" {
                allow_all = true;
            } else if let Some(suffix) = origin.strip_prefix('*') {
                wildcard_suffixes.push(suffix.to_string());
            } else if !origin.is_empty() {
                exact.insert(origin);
            }
        }

        Self {
            allow_all,
            exact,
            wildcard_suffixes,
            allow_headers: merge_headers(allow_headers, api_header),
        }
    }

    /// Comma-separated `Access-Control-Allow-Headers` value.
    pub fn allow_headers(&self) -> &str {
        &self.allow_headers
    }

    pub fn evaluate(&self, referer_or_origin: &str) -> OriginCheck {
        let (protocol, domain) = split_origin(referer_or_origin.trim());
        let allowed = self.allow_all || (!domain.is_empty() && self.domain_allowed(&domain));
        OriginCheck {
            protocol,
            domain,
            allowed,
        }
    }

    fn domain_allowed(&self, domain: &str) -> bool {
        let domain = domain.to_ascii_lowercase();
        let host = domain.split(':').next().unwrap_or(&domain);

        [domain.as_str(), host].iter().any(|candidate| {
            self.exact.contains(*candidate)
                || self
                    .wildcard_suffixes
                    .iter()
                    .any(|suffix| candidate.len() > suffix.len() && candidate.ends_with(suffix.as_str()))
        })
    }

    /// Write CORS headers for a request onto `response`.
    pub fn apply(&self, request: &HeaderMap, response: &mut HeaderMap) {
        let source = [REFERER, ORIGIN]
            .iter()
            .filter_map(|name| request.get(name).and_then(|v| v.to_str().ok()))
            .find(|v| !v.trim().is_empty())
            .unwrap_or("");

        let check = self.evaluate(source);
        if let Some(origin) = check.allow_origin() {
            match HeaderValue::from_str(&origin) {
                Ok(value) => {
                    response.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
                    response.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
                }
                Err(_) => tracing::debug!(origin = %origin, "Origin is not a valid header value"),
            }
        } else if !source.is_empty() {
            tracing::debug!(domain = %check.domain, "Origin not allowed");
        }

        response.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("POST"));
        if let Ok(value) = HeaderValue::from_str(&self.allow_headers) {
            response.insert(ACCESS_CONTROL_ALLOW_HEADERS, value);
        }
    }
}

/// `protocol://domain/...` split; a value without a scheme is all domain.
fn split_origin(value: &str) -> (String, String) {
    let (protocol, rest) = match value.find("://") {
        Some(i) => (&value[..i], &value[i + 3..]),
        None => ("", value),
    };
    let domain = rest.split('/').next().unwrap_or("");
    (protocol.to_string(), domain.to_string())
}

/// Baseline headers, the API-name header, then configured extras, without
/// case-insensitive duplicates or invalid names.
fn merge_headers(extra: &[String], api_header: &str) -> String {
    let mut seen = HashSet::new();
    let mut merged: Vec<&str> = Vec::new();

    let candidates = BASELINE_HEADERS
        .iter()
        .copied()
        .chain(std::iter::once(api_header))
        .chain(extra.iter().map(String::as_str));

    for name in candidates {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            tracing::warn!(header = %name, "Ignoring invalid allow header");
            continue;
        }
        if seen.insert(name.to_ascii_lowercase()) {
            merged.push(name);
        }
    }

    merged.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(origins: &[&str]) -> OriginPolicy {
        let origins: Vec<String> = origins.iter().map(|s| s.to_string()).collect();
        OriginPolicy::new(&origins, &[], X_API)
    }

    #[test]
    fn test_explicit_origin() {
        let policy = policy(&["ok.com"]);

        let check = policy.evaluate("https://ok.com/page?x=1");
        assert_eq!(check.protocol, "https");
        assert_eq!(check.domain, "ok.com");
        assert!(check.allowed);
        assert_eq!(check.allow_origin().as_deref(), Some("https://ok.com"));

        let check = policy.evaluate("https://evil.com");
        assert!(!check.allowed);
        assert_eq!(check.allow_origin(), None);
    }

    #[test]
    fn test_port_matches_host_entry() {
        let policy = policy(&["ok.com"]);
        let check = policy.evaluate("http://ok.com:8080/");
        assert!(check.allowed);
        assert_eq!(check.allow_origin().as_deref(), Some("http://ok.com:8080"));
    }

    #[test]
    fn test_wildcard_matches_subdomains_only() {
        let policy = policy(&["*.example.com"]);
        assert!(policy.evaluate("https://a.example.com").allowed);
        assert!(policy.evaluate("https://a.b.example.com").allowed);
        assert!(!policy.evaluate("https://example.com").allowed);
        assert!(!policy.evaluate("https://badexample.com").allowed);
    }

    #[test]
    fn test_allow_all() {
        let policy = policy(&["*"]);
        assert_eq!(
            policy.evaluate("https://any.io").allow_origin().as_deref(),
            Some("https://any.io")
        );
        // Nothing sent: the origin degenerates to "://".
        assert_eq!(policy.evaluate("").allow_origin().as_deref(), Some("*"));
    }

    #[test]
    fn test_extension_origin_widens_to_star() {
        let policy = policy(&["abcdef"]);
        let check = policy.evaluate("chrome-extension://abcdef/popup.html");
        assert!(check.allowed);
        assert_eq!(check.allow_origin().as_deref(), Some("*"));
    }

    #[test]
    fn test_allow_headers_dedup() {
        let policy = OriginPolicy::new(
            &[],
            &["x-api".to_string(), "X-Custom".to_string(), "x-custom".to_string(), "bad header".to_string()],
            "X-Service",
        );
        assert_eq!(
            policy.allow_headers(),
            "Content-Type,X-Api,X-Api-Multi-Call,X-Api-Call-Timeout,X-Range,X-Service,X-Custom"
        );
    }

    #[test]
    fn test_apply_headers() {
        let policy = policy(&["ok.com"]);

        let mut request = HeaderMap::new();
        request.insert(ORIGIN, HeaderValue::from_static("https://ok.com"));
        let mut response = HeaderMap::new();
        policy.apply(&request, &mut response);
        assert_eq!(response[ACCESS_CONTROL_ALLOW_ORIGIN], "https://ok.com");
        assert_eq!(response[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(response[ACCESS_CONTROL_ALLOW_METHODS], "POST");

        let mut request = HeaderMap::new();
        request.insert(ORIGIN, HeaderValue::from_static("https://evil.com"));
        let mut response = HeaderMap::new();
        policy.apply(&request, &mut response);
        assert!(response.get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert_eq!(response[ACCESS_CONTROL_ALLOW_METHODS], "POST");
    }

    #[test]
    fn test_referer_wins_over_origin() {
        let policy = policy(&["ok.com"]);
        let mut request = HeaderMap::new();
        request.insert(REFERER, HeaderValue::from_static("https://ok.com/form"));
        request.insert(ORIGIN, HeaderValue::from_static("https://evil.com"));

        let mut response = HeaderMap::new();
        policy.apply(&request, &mut response);
        assert_eq!(response[ACCESS_CONTROL_ALLOW_ORIGIN], "https://ok.com");
    }
}
