//! HTTP stage executor.
//!
//! # Responsibilities
//! - POST the payload envelope to each `http`/`https` stage in order
//! - Feed each stage's response payload into the next stage
//! - Stop early when a stage embeds a business error
//! - Report transport failures to the graph's error address
//! - Bound the whole pipeline by the caller's timeout
//!
//! # Design Decisions
//! - One shared `reqwest::Client` (connection pooling across requests)
//! - Error address delivery is best-effort and never changes the outcome
//! - Non-2xx answers carrying a structured error keep that error

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::executor::{CallOptions, ExecutorError, PipelineExecutor};
use crate::graph::{Address, Graph};
use crate::http::request::X_RANGE;
use crate::payload::{Payload, PayloadError};

/// Executes graphs by calling every stage over HTTP.
#[derive(Debug, Clone)]
pub struct HttpStageExecutor {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl HttpStageExecutor {
    /// Create an executor bounding pipelines by `default_timeout` unless the
    /// caller asks for another deadline.
    pub fn new(default_timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), default_timeout)
    }

    pub fn with_client(client: reqwest::Client, default_timeout: Duration) -> Self {
        Self {
            client,
            default_timeout,
        }
    }

    async fn run_stages(
        &self,
        graph: &Graph,
        mut payload: Payload,
        options: &CallOptions,
    ) -> Result<Payload, ExecutorError> {
        for stage in graph.stages() {
            match self.send(stage, &payload, options).await {
                Ok(next) => {
                    payload = next;
                    if !payload.is_correct() {
                        tracing::debug!(stage = %stage.name, "Stage returned business error");
                        return Ok(payload);
                    }
                }
                Err(e) => {
                    if let Some(error_address) = graph.error_address() {
                        self.report(error_address, &payload, &e, options).await;
                    }
                    return Err(e);
                }
            }
        }
        Ok(payload)
    }

    async fn send(
        &self,
        stage: &Address,
        payload: &Payload,
        options: &CallOptions,
    ) -> Result<Payload, ExecutorError> {
        if !matches!(stage.kind.as_str(), "" | "http" | "https") {
            return Err(ExecutorError::UnsupportedStage {
                kind: stage.kind.clone(),
                address: stage.name.clone(),
            });
        }

        let mut request = self
            .client
            .post(&stage.url)
            .headers(options.headers.clone())
            .json(payload);
        if let Some(range) = &options.range {
            request = request.header(X_RANGE, range);
        }

        let response = request.send().await.map_err(|e| {
            ExecutorError::Transport(format!("send to stage {} failed: {}", stage.name, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            // A zero code is not an error; treat the answer as a failed hop.
            if let Ok(err) = serde_json::from_slice::<ApiError>(&body) {
                if err.code != 0 {
                    return Err(ExecutorError::Api(err));
                }
            }
            return Err(ExecutorError::Transport(format!(
                "stage {} returned status {}",
                stage.name, status
            )));
        }

        response.json::<Payload>().await.map_err(|e| {
            ExecutorError::Transport(format!("decode payload from stage {} failed: {}", stage.name, e))
        })
    }

    async fn report(
        &self,
        address: &Address,
        payload: &Payload,
        err: &ExecutorError,
        options: &CallOptions,
    ) {
        let structured = err.to_api_error();
        let mut failed = payload.clone();
        failed.set_error(PayloadError {
            code: structured.code,
            id: structured.id,
            namespace: structured.namespace,
            message: structured.message,
        });

        if let Err(e) = self.send(address, &failed, options).await {
            tracing::warn!(address = %address.name, error = %e, "Failed to deliver payload to error address");
        }
    }
}

#[async_trait]
impl PipelineExecutor for HttpStageExecutor {
    async fn execute(
        &self,
        api: &str,
        graph: &Graph,
        payload: Payload,
        options: &CallOptions,
    ) -> Result<Payload, ExecutorError> {
        let deadline = options.timeout.unwrap_or(self.default_timeout);
        match tokio::time::timeout(deadline, self.run_stages(graph, payload, options)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(api = %api, timeout = ?deadline, "Pipeline timed out");
                Err(ExecutorError::Timeout {
                    api: api.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_unsupported_stage_kind() {
        let mut graph = Graph::new();
        graph.add_stages([Address::new("queue", "mqs", "mqs://queue")]);

        let executor = HttpStageExecutor::new(Duration::from_secs(1));
        let err = executor
            .execute("api.q", &graph, Payload::new(json!(1)), &CallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::UnsupportedStage { ref kind, .. } if kind == "mqs"));
    }

    #[tokio::test]
    async fn test_empty_graph_returns_payload() {
        let executor = HttpStageExecutor::new(Duration::from_secs(1));
        let payload = executor
            .execute("api.none", &Graph::new(), Payload::new(json!({"x": 1})), &CallOptions::default())
            .await
            .unwrap();
        assert_eq!(payload.content, json!({"x": 1}));
    }
}
