//! Per-API payload preparation.
//!
//! # Responsibilities
//! - Multi call: pick each API's sub-request out of the body
//! - Proxy APIs: decode the body as a ready-made payload envelope
//! - Other APIs: wrap the body as payload content
//! - Tag every payload's context with the API name
//!
//! # Design Decisions
//! - Content that is not JSON is passed on verbatim as a string
//! - A multi-call body is decoded once per request, not once per API

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::InletError;
use crate::graph::GraphRegistry;
use crate::payload::envelope::Payload;
use crate::routing::Resolution;

/// Where one API's request content comes from.
enum Source<'a> {
    Raw(&'a [u8]),
    Value(Value),
}

/// Builds outgoing payloads from request bodies.
#[derive(Debug, Clone)]
pub struct PayloadPreparer {
    context_key: String,
}

impl PayloadPreparer {
    /// `context_key` names the context entry holding the API name.
    pub fn new(context_key: impl Into<String>) -> Self {
        Self {
            context_key: context_key.into(),
        }
    }

    pub fn context_key(&self) -> &str {
        &self.context_key
    }

    /// Prepare the payload for one API.
    pub fn prepare(
        &self,
        api: &str,
        body: &[u8],
        multi_call: bool,
        proxy: bool,
    ) -> Result<Payload, InletError> {
        let source = if multi_call {
            let mut calls = decode_multi(api, body)?;
            Source::Value(take_call(&mut calls, api)?)
        } else {
            Source::Raw(body)
        };
        self.build(api, source, proxy)
    }

    /// Prepare payloads for every API of a resolved request.
    pub fn prepare_all(
        &self,
        registry: &GraphRegistry,
        resolution: &Resolution<'_>,
        body: &[u8],
    ) -> Result<BTreeMap<String, Payload>, InletError> {
        let mut payloads = BTreeMap::new();

        if resolution.multi_call {
            let mut calls = decode_multi("", body)?;
            for api in resolution.api_names() {
                let content = take_call(&mut calls, api)?;
                let payload = self.build(api, Source::Value(content), registry.is_proxy(api))?;
                payloads.insert(api.to_string(), payload);
            }
        } else {
            for api in resolution.api_names() {
                let payload = self.build(api, Source::Raw(body), registry.is_proxy(api))?;
                payloads.insert(api.to_string(), payload);
            }
        }

        Ok(payloads)
    }

    fn build(&self, api: &str, source: Source<'_>, proxy: bool) -> Result<Payload, InletError> {
        if api.is_empty() {
            return Err(InletError::EmptyApiName);
        }

        let mut payload = if proxy {
            let decoded = match source {
                Source::Raw(bytes) => Payload::from_slice(bytes),
                Source::Value(value) => serde_json::from_value(value),
            };
            let mut envelope = decoded.map_err(|e| {
                tracing::error!(api = %api, error = %e, "Failed to parse proxy payload");
                InletError::ProxyPayloadParseFailed {
                    api: api.to_string(),
                    err: e.to_string(),
                }
            })?;
            if envelope.id.is_empty() {
                envelope.id = Uuid::new_v4().to_string();
            }
            envelope
        } else {
            let content = match source {
                Source::Raw(bytes) => decode_content(bytes),
                Source::Value(value) => value,
            };
            Payload::new(content)
        };

        payload.set_context(self.context_key.clone(), api);
        Ok(payload)
    }
}

fn decode_multi(api: &str, body: &[u8]) -> Result<Map<String, Value>, InletError> {
    serde_json::from_slice(body).map_err(|e| InletError::MalformedMultiRequest {
        api: api.to_string(),
        err: e.to_string(),
    })
}

/// Remove the sub-request for `api`, tolerating whitespace around keys.
fn take_call(calls: &mut Map<String, Value>, api: &str) -> Result<Value, InletError> {
    if let Some(value) = calls.remove(api) {
        return Ok(value);
    }
    let key = calls.keys().find(|k| k.trim() == api).cloned();
    key.and_then(|k| calls.remove(&k))
        .ok_or_else(|| InletError::MultiApiRequestNotExist {
            api: api.to_string(),
        })
}

fn decode_content(body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Address, Graph};
    use serde_json::json;

    fn preparer() -> PayloadPreparer {
        PayloadPreparer::new("X-Api")
    }

    #[test]
    fn test_single_call_wraps_body() {
        let payload = preparer()
            .prepare("api.echo", br#"{"x": 1}"#, false, false)
            .unwrap();
        assert_eq!(payload.content, json!({"x": 1}));
        assert_eq!(payload.context("X-Api"), Some(&json!("api.echo")));
        assert!(!payload.id.is_empty());
    }

    #[test]
    fn test_non_json_body_is_verbatim() {
        let payload = preparer().prepare("api.echo", b"plain text", false, false).unwrap();
        assert_eq!(payload.content, json!("plain text"));

        let payload = preparer().prepare("api.echo", b"  \n", false, false).unwrap();
        assert_eq!(payload.content, Value::Null);
    }

    #[test]
    fn test_multi_call_extracts_sub_request() {
        let body = br#"{"api.a": {"x": 1}, " api.b ": [1, 2]}"#;

        let a = preparer().prepare("api.a", body, true, false).unwrap();
        assert_eq!(a.content, json!({"x": 1}));

        let b = preparer().prepare("api.b", body, true, false).unwrap();
        assert_eq!(b.content, json!([1, 2]));

        let err = preparer().prepare("api.c", body, true, false).unwrap_err();
        assert!(matches!(err, InletError::MultiApiRequestNotExist { ref api } if api == "api.c"));

        let err = preparer().prepare("api.a", b"oops", true, false).unwrap_err();
        assert_eq!(err.code(), 6);
    }

    #[test]
    fn test_proxy_payload() {
        let body = br#"{"id": "p-1", "context": {"trace": "t"}, "content": {"x": 1}}"#;
        let payload = preparer().prepare("api.proxy", body, false, true).unwrap();

        assert_eq!(payload.id, "p-1");
        assert_eq!(payload.content, json!({"x": 1}));
        assert_eq!(payload.context("trace"), Some(&json!("t")));
        assert_eq!(payload.context("X-Api"), Some(&json!("api.proxy")));
    }

    #[test]
    fn test_proxy_payload_in_multi_call() {
        let body = br#"{"api.proxy": {"content": "hi"}}"#;
        let payload = preparer().prepare("api.proxy", body, true, true).unwrap();
        assert_eq!(payload.content, json!("hi"));
        assert!(!payload.id.is_empty());
    }

    #[test]
    fn test_malformed_proxy_payload() {
        let err = preparer().prepare("api.proxy", b"[1]", false, true).unwrap_err();
        assert!(matches!(err, InletError::ProxyPayloadParseFailed { .. }));
        assert_eq!(err.code(), 10);
    }

    #[test]
    fn test_empty_api_name() {
        let err = preparer().prepare("", b"{}", false, false).unwrap_err();
        assert!(matches!(err, InletError::EmptyApiName));
    }

    #[test]
    fn test_prepare_all_multi_call() {
        let mut registry = GraphRegistry::default();
        let mut graph = Graph::new();
        graph.add_stages([Address::new("addr1", "http", "http://b1")]);
        registry.set("api.a", graph.clone()).set("api.b", graph);
        registry.set_proxy("api.b", true);

        let mut graphs = BTreeMap::new();
        graphs.insert("api.a".to_string(), registry.resolve("api.a").unwrap());
        graphs.insert("api.b".to_string(), registry.resolve("api.b").unwrap());
        let resolution = Resolution { multi_call: true, graphs };

        let body = br#"{"api.a": {"x": 1}, "api.b": {"content": {"y": 2}}}"#;
        let payloads = preparer().prepare_all(&registry, &resolution, body).unwrap();

        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads["api.a"].content, json!({"x": 1}));
        assert_eq!(payloads["api.b"].content, json!({"y": 2}));
    }
}
