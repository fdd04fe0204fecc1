//! Pipeline execution boundary.
//!
//! # Data Flow
//! ```text
//! Prepared payloads (API name → Payload)
//!     → dispatch() fans out, one future per API
//!     → PipelineExecutor::execute (transport, retries, delivery)
//!     → (API name, Payload | ExecutorError) per API
//! ```
//!
//! # Design Decisions
//! - The inlet never owns transport; executors are injected as trait objects
//! - Sibling APIs of a multi call run concurrently and fail independently
//! - Timeouts surface as ordinary per-API errors

pub mod http;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::HeaderMap;
use futures_util::future::join_all;
use thiserror::Error;

use crate::error::{ApiError, InletError};
use crate::graph::Graph;
use crate::payload::{ApiOutcome, Payload};
use crate::routing::Resolution;

pub use self::http::HttpStageExecutor;

/// Advisory per-request settings forwarded to the executor.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Whole-pipeline deadline requested by the caller.
    pub timeout: Option<Duration>,
    /// Opaque range hint.
    pub range: Option<String>,
    /// Request headers configured for pass-through.
    pub headers: HeaderMap,
}

/// Errors raised while executing a pipeline.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// A stage answered with a structured error.
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("api request timeout, api: {api}")]
    Timeout { api: String },

    #[error("{0}")]
    Transport(String),

    #[error("unsupported stage kind '{kind}', address: {address}")]
    UnsupportedStage { kind: String, address: String },
}

impl ExecutorError {
    /// Structured form; errors without structure are coerced to code 500.
    pub fn to_api_error(&self) -> ApiError {
        match self {
            ExecutorError::Api(err) => err.clone(),
            ExecutorError::Timeout { api } => InletError::RequestTimeout { api: api.clone() }.to_api_error(),
            other => ApiError::unstructured(other),
        }
    }
}

/// Runs one API's payload through its graph.
#[async_trait]
pub trait PipelineExecutor: Send + Sync {
    async fn execute(
        &self,
        api: &str,
        graph: &Graph,
        payload: Payload,
        options: &CallOptions,
    ) -> Result<Payload, ExecutorError>;
}

/// Execute every prepared payload concurrently and collect all outcomes.
pub async fn dispatch(
    executor: &dyn PipelineExecutor,
    resolution: &Resolution<'_>,
    payloads: BTreeMap<String, Payload>,
    options: &CallOptions,
) -> Vec<(String, ApiOutcome)> {
    let calls = payloads.into_iter().filter_map(|(api, payload)| {
        let graph: &Graph = resolution.graphs.get(&api).copied()?;
        Some(async move {
            let outcome = executor.execute(&api, graph, payload, options).await;
            if let Err(ref e) = outcome {
                tracing::warn!(api = %api, error = %e, "Pipeline execution failed");
            }
            (api, outcome)
        })
    });

    join_all(calls).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Address;
    use serde_json::json;

    /// Echoes content back, failing APIs whose name contains "fail".
    struct EchoExecutor;

    #[async_trait]
    impl PipelineExecutor for EchoExecutor {
        async fn execute(
            &self,
            api: &str,
            _graph: &Graph,
            payload: Payload,
            _options: &CallOptions,
        ) -> Result<Payload, ExecutorError> {
            if api.contains("fail") {
                return Err(ExecutorError::Transport("stage down".into()));
            }
            Ok(payload)
        }
    }

    #[tokio::test]
    async fn test_dispatch_collects_every_outcome() {
        let mut graph = Graph::new();
        graph.add_stages([Address::new("a", "http", "http://a")]);

        let mut graphs = BTreeMap::new();
        graphs.insert("api.ok".to_string(), &graph);
        graphs.insert("api.fail".to_string(), &graph);
        let resolution = Resolution { multi_call: true, graphs };

        let mut payloads = BTreeMap::new();
        payloads.insert("api.ok".to_string(), Payload::new(json!(1)));
        payloads.insert("api.fail".to_string(), Payload::new(json!(2)));

        let outcomes = dispatch(&EchoExecutor, &resolution, payloads, &CallOptions::default()).await;
        assert_eq!(outcomes.len(), 2);

        let by_api: BTreeMap<_, _> = outcomes.into_iter().collect();
        assert_eq!(by_api["api.ok"].as_ref().unwrap().content, json!(1));
        assert!(by_api["api.fail"].is_err());
    }

    #[test]
    fn test_to_api_error() {
        let err = ExecutorError::Transport("refused".into()).to_api_error();
        assert_eq!(err.code, 500);
        assert_eq!(err.message, "refused");

        let err = ExecutorError::Timeout { api: "api.slow".into() }.to_api_error();
        assert_eq!(err.code, 5);
        assert_eq!(err.message, "api request timeout, api: api.slow");
    }
}
