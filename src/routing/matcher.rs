//! API name extraction.
//!
//! # Responsibilities
//! - Read the API name from the configured header
//! - Fall back to the request path below the base path
//! - Chain sources with first-match semantics
//!
//! # Design Decisions
//! - Header names are case-insensitive (RFC 9110)
//! - Path matching is case-sensitive
//! - Empty values count as absent so the next source is tried

use axum::http::{HeaderMap, HeaderName};

/// Trait for reading an API name out of a request.
pub trait ApiNameSource: Send + Sync + std::fmt::Debug {
    /// Returns the API name if this source carries a non-empty one.
    fn extract(&self, headers: &HeaderMap, path: &str) -> Option<String>;
}

/// Reads the API name from a header.
#[derive(Debug, Clone)]
pub struct HeaderSource {
    header: HeaderName,
}

impl HeaderSource {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }
}

impl ApiNameSource for HeaderSource {
    fn extract(&self, headers: &HeaderMap, _path: &str) -> Option<String> {
        headers
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }
}

/// Reads the API name from the path segment(s) after the base path.
#[derive(Debug, Clone)]
pub struct PathSource {
    base_path: String,
}

impl PathSource {
    /// Create a path source. Trailing slashes of the base path are ignored.
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into().trim_end_matches('/').to_string(),
        }
    }
}

impl ApiNameSource for PathSource {
    fn extract(&self, _headers: &HeaderMap, path: &str) -> Option<String> {
        let rest = path.strip_prefix(self.base_path.as_str())?;
        // "/apix" must not match base "/api"
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }
        let name = rest.trim_start_matches('/').trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }
}

/// Tries each source in order and returns the first name found.
#[derive(Debug)]
pub struct FirstOf {
    sources: Vec<Box<dyn ApiNameSource>>,
}

impl FirstOf {
    pub fn new(sources: Vec<Box<dyn ApiNameSource>>) -> Self {
        Self { sources }
    }
}

impl ApiNameSource for FirstOf {
    fn extract(&self, headers: &HeaderMap, path: &str) -> Option<String> {
        self.sources.iter().find_map(|s| s.extract(headers, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(name: &'static str, value: &'static str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(HeaderName::from_bytes(name.as_bytes()).unwrap(), HeaderValue::from_static(value));
        h
    }

    #[test]
    fn test_header_source() {
        let source = HeaderSource::new(HeaderName::from_static("x-api"));

        assert_eq!(source.extract(&headers("x-api", " api.echo "), "/"), Some("api.echo".into()));
        assert_eq!(source.extract(&headers("X-API", "api.echo"), "/"), Some("api.echo".into())); // Case insensitive
        assert_eq!(source.extract(&headers("x-api", "  "), "/"), None);
        assert_eq!(source.extract(&HeaderMap::new(), "/"), None);
    }

    #[test]
    fn test_path_source() {
        let source = PathSource::new("/api/");
        let empty = HeaderMap::new();

        assert_eq!(source.extract(&empty, "/api/api.echo"), Some("api.echo".into()));
        assert_eq!(source.extract(&empty, "/api"), None);
        assert_eq!(source.extract(&empty, "/api/"), None);
        assert_eq!(source.extract(&empty, "/apix"), None);
        assert_eq!(source.extract(&empty, "/other/api.echo"), None);
    }

    #[test]
    fn test_root_path_source() {
        let source = PathSource::new("/");
        assert_eq!(source.extract(&HeaderMap::new(), "/api.echo"), Some("api.echo".into()));
        assert_eq!(source.extract(&HeaderMap::new(), "/"), None);
    }

    #[test]
    fn test_first_of_prefers_header() {
        let source = FirstOf::new(vec![
            Box::new(HeaderSource::new(HeaderName::from_static("x-api"))),
            Box::new(PathSource::new("/")),
        ]);

        assert_eq!(source.extract(&headers("x-api", "from.header"), "/from.path"), Some("from.header".into()));
        assert_eq!(source.extract(&HeaderMap::new(), "/from.path"), Some("from.path".into()));
        assert_eq!(source.extract(&HeaderMap::new(), "/"), None);
    }
}
