//! Request to graph resolution.
//!
//! # Responsibilities
//! - Reject anything but POST
//! - Single call: API name from header, else from the path below the base path
//! - Multi call: every top-level key of the JSON body is an API name
//! - Resolve every name against the graph registry
//!
//! # Design Decisions
//! - Partial resolution is never a success; the first bad name fails the request
//! - Multi-call body shape is checked before any name (empty object → EmptyMultiRequest)
//! - Output borrows graphs from the registry; nothing is cloned per request

use std::collections::BTreeMap;

use axum::http::{HeaderMap, HeaderName, Method};
use serde_json::{Map, Value};

use crate::error::InletError;
use crate::graph::{Graph, GraphRegistry};
use crate::http::request::is_multi_call;
use crate::routing::matcher::{ApiNameSource, FirstOf, HeaderSource, PathSource};

/// The parts of an HTTP request the resolver looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestView<'a> {
    pub method: &'a Method,
    pub headers: &'a HeaderMap,
    pub path: &'a str,
    pub body: &'a [u8],
}

/// Every API requested by one HTTP request, with its graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<'r> {
    pub multi_call: bool,
    pub graphs: BTreeMap<String, &'r Graph>,
}

impl Resolution<'_> {
    pub fn api_names(&self) -> impl Iterator<Item = &str> {
        self.graphs.keys().map(String::as_str)
    }
}

/// Turns inbound requests into validated sets of graphs.
#[derive(Debug)]
pub struct RequestResolver {
    api_name: FirstOf,
}

impl RequestResolver {
    /// Create a resolver reading single-call names from `api_header`,
    /// falling back to the path below `base_path`.
    pub fn new(api_header: HeaderName, base_path: &str) -> Self {
        Self {
            api_name: FirstOf::new(vec![
                Box::new(HeaderSource::new(api_header)),
                Box::new(PathSource::new(base_path)),
            ]),
        }
    }

    /// Resolve the request against the registry.
    pub fn resolve<'r>(
        &self,
        registry: &'r GraphRegistry,
        request: &RequestView<'_>,
    ) -> Result<Resolution<'r>, InletError> {
        if *request.method != Method::POST {
            return Err(InletError::MethodNotAllowed {
                method: request.method.to_string(),
            });
        }

        let mut graphs = BTreeMap::new();

        if is_multi_call(request.headers) {
            let calls: Map<String, Value> = serde_json::from_slice(request.body)
                .map_err(|e| InletError::MalformedMultiRequestBody(e.to_string()))?;
            if calls.is_empty() {
                return Err(InletError::EmptyMultiRequest);
            }
            for name in calls.keys() {
                let (api, graph) = lookup(registry, name)?;
                graphs.insert(api, graph);
            }
            tracing::debug!(apis = graphs.len(), "Resolved multi call");
            return Ok(Resolution {
                multi_call: true,
                graphs,
            });
        }

        let name = self.requested_api(request.headers, request.path);
        let (api, graph) = lookup(registry, &name)?;
        graphs.insert(api, graph);

        Ok(Resolution {
            multi_call: false,
            graphs,
        })
    }

    /// Single-call API name named by the request, trimmed; empty for multi
    /// calls or when neither header nor path carries one.
    pub fn requested_api(&self, headers: &HeaderMap, path: &str) -> String {
        if is_multi_call(headers) {
            return String::new();
        }
        self.api_name
            .extract(headers, path)
            .map(|name| name.trim().to_string())
            .unwrap_or_default()
    }
}

fn lookup<'r>(registry: &'r GraphRegistry, name: &str) -> Result<(String, &'r Graph), InletError> {
    let api = name.trim();
    if api.is_empty() {
        return Err(InletError::EmptyApiName);
    }
    let graph = registry.resolve(api)?;
    Ok((api.to_string(), graph))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Address;
    use axum::http::HeaderValue;

    fn registry() -> GraphRegistry {
        let mut registry = GraphRegistry::default();
        for api in ["api.a", "api.b", "api.echo"] {
            let mut g = Graph::new();
            g.add_stages([Address::new("addr1", "http", "http://b1")]);
            registry.set(api, g);
        }
        registry
    }

    fn resolver() -> RequestResolver {
        RequestResolver::new(HeaderName::from_static("x-api"), "/api")
    }

    fn multi_headers() -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert("x-api-multi-call", HeaderValue::from_static("1"));
        h
    }

    fn view<'a>(method: &'a Method, headers: &'a HeaderMap, path: &'a str, body: &'a [u8]) -> RequestView<'a> {
        RequestView { method, headers, path, body }
    }

    #[test]
    fn test_rejects_non_post() {
        let registry = registry();
        let headers = HeaderMap::new();
        let err = resolver()
            .resolve(&registry, &view(&Method::GET, &headers, "/api/api.echo", b""))
            .unwrap_err();
        assert!(matches!(err, InletError::MethodNotAllowed { ref method } if method == "GET"));
    }

    #[test]
    fn test_single_call_from_header() {
        let registry = registry();
        let mut headers = HeaderMap::new();
        headers.insert("x-api", HeaderValue::from_static(" api.echo "));

        let resolution = resolver()
            .resolve(&registry, &view(&Method::POST, &headers, "/api", b"{}"))
            .unwrap();
        assert!(!resolution.multi_call);
        assert_eq!(resolution.api_names().collect::<Vec<_>>(), vec!["api.echo"]);
    }

    #[test]
    fn test_single_call_from_path() {
        let registry = registry();
        let headers = HeaderMap::new();

        let resolution = resolver()
            .resolve(&registry, &view(&Method::POST, &headers, "/api/api.a", b""))
            .unwrap();
        assert_eq!(resolution.graphs.len(), 1);
        assert!(resolution.graphs.contains_key("api.a"));
    }

    #[test]
    fn test_requested_api() {
        let resolver = resolver();
        let mut headers = HeaderMap::new();
        assert_eq!(resolver.requested_api(&headers, "/api/api.a"), "api.a");
        assert_eq!(resolver.requested_api(&headers, "/api"), "");

        headers.insert("x-api", HeaderValue::from_static(" api.b "));
        assert_eq!(resolver.requested_api(&headers, "/api/api.a"), "api.b");

        headers.insert("x-api-multi-call", HeaderValue::from_static("1"));
        assert_eq!(resolver.requested_api(&headers, "/api/api.a"), "");
    }

    #[test]
    fn test_single_call_errors() {
        let registry = registry();
        let headers = HeaderMap::new();

        let err = resolver()
            .resolve(&registry, &view(&Method::POST, &headers, "/api", b""))
            .unwrap_err();
        assert!(matches!(err, InletError::EmptyApiName));

        let err = resolver()
            .resolve(&registry, &view(&Method::POST, &headers, "/api/api.ghost", b""))
            .unwrap_err();
        assert!(matches!(err, InletError::UnknownApi { ref api } if api == "api.ghost"));
    }

    #[test]
    fn test_multi_call() {
        let registry = registry();
        let headers = multi_headers();
        let body = br#"{"api.b": {"y": 2}, "api.a": {"x": 1}}"#;

        let resolution = resolver()
            .resolve(&registry, &view(&Method::POST, &headers, "/api", body))
            .unwrap();
        assert!(resolution.multi_call);
        assert_eq!(resolution.api_names().collect::<Vec<_>>(), vec!["api.a", "api.b"]);
    }

    #[test]
    fn test_multi_call_errors() {
        let registry = registry();
        let headers = multi_headers();
        let resolve = |body: &[u8]| {
            resolver()
                .resolve(&registry, &view(&Method::POST, &headers, "/api", body))
                .unwrap_err()
        };

        assert!(matches!(resolve(b"not json"), InletError::MalformedMultiRequestBody(_)));
        assert!(matches!(resolve(b"[1, 2]"), InletError::MalformedMultiRequestBody(_)));
        assert!(matches!(resolve(b"{}"), InletError::EmptyMultiRequest));
        assert!(matches!(resolve(br#"{"api.a": {}, " ": {}}"#), InletError::EmptyApiName));
        assert!(matches!(
            resolve(br#"{"api.a": {}, "api.ghost": {}}"#),
            InletError::UnknownApi { .. }
        ));
    }

    #[test]
    fn test_multi_call_header_must_be_one() {
        let registry = registry();
        let mut headers = HeaderMap::new();
        headers.insert("x-api-multi-call", HeaderValue::from_static("0"));
        headers.insert("x-api", HeaderValue::from_static("api.b"));

        let resolution = resolver()
            .resolve(&registry, &view(&Method::POST, &headers, "/api", b"{}"))
            .unwrap();
        assert!(!resolution.multi_call);
    }
}
