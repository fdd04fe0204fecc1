//! Inlet API client.
//!
//! # Responsibilities
//! - Call one API, several APIs in one multi call, or post a proxy envelope
//! - Decode the default-template response record
//! - Turn non-zero records into structured errors
//!
//! # Design Decisions
//! - Client failures live in their own namespace so callers can tell a local
//!   send failure from an error the inlet returned
//! - Multi calls report per-API outcomes; one failed API does not fail the call

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::error::ApiError;
use crate::http::request::{X_API, X_API_CALL_TIMEOUT, X_API_MULTI_CALL};
use crate::payload::Payload;

/// Namespace of errors raised by the client itself.
pub const CLIENT_ERR_NAMESPACE: &str = "INLET_API_CLIENT";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("api name is empty")]
    EmptyApiName,

    #[error("send request failed, error: {0}")]
    SendFailed(String),

    #[error("unmarshal response failed, error: {0}")]
    UnmarshalFailed(String),

    #[error("{0}")]
    Remote(ApiError),
}

impl ClientError {
    pub fn code(&self) -> u64 {
        match self {
            ClientError::EmptyApiName => 1,
            ClientError::SendFailed(_) => 2,
            ClientError::UnmarshalFailed(_) => 3,
            ClientError::Remote(_) => 4,
        }
    }

    /// Remote errors keep their own tuple; local ones use the client namespace.
    pub fn to_api_error(&self) -> ApiError {
        match self {
            ClientError::Remote(err) => err.clone(),
            other => ApiError::new(CLIENT_ERR_NAMESPACE, other.code(), other.to_string()),
        }
    }
}

/// A response record as rendered by the built-in default template.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClientRecord {
    #[serde(default)]
    pub code: u64,
    #[serde(default)]
    pub error_id: String,
    #[serde(default)]
    pub error_namespace: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub result: Value,
}

impl ClientRecord {
    pub fn into_result(self) -> Result<Value, ApiError> {
        if self.code == 0 {
            return Ok(self.result);
        }
        Err(ApiError {
            namespace: self.error_namespace,
            code: self.code,
            id: self.error_id,
            message: self.message,
        })
    }
}

/// Per-API outcomes of a multi call.
pub type MultiOutcome = BTreeMap<String, Result<Value, ApiError>>;

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    endpoint: Url,
    api_header: String,
    timeout: Option<Duration>,
}

impl ApiClient {
    /// Client for the inlet mounted at `endpoint` (base path included).
    pub fn new(endpoint: Url) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(http: reqwest::Client, endpoint: Url) -> Self {
        Self {
            http,
            endpoint,
            api_header: X_API.to_string(),
            timeout: None,
        }
    }

    /// Header carrying the API name, when the inlet is configured differently.
    pub fn api_header(mut self, name: impl Into<String>) -> Self {
        self.api_header = name.into();
        self
    }

    /// Advisory pipeline timeout sent as `X-Api-Call-Timeout`.
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Call one API with `content` as the request body.
    pub async fn call(&self, api: &str, content: &Value) -> Result<Value, ClientError> {
        let body = serde_json::to_vec(content).map_err(|e| ClientError::SendFailed(e.to_string()))?;
        self.single(api, body).await
    }

    /// Call a proxy API with a full payload envelope.
    pub async fn call_proxy(&self, api: &str, payload: &Payload) -> Result<Value, ClientError> {
        let body = payload.to_vec().map_err(|e| ClientError::SendFailed(e.to_string()))?;
        self.single(api, body).await
    }

    /// Call several APIs at once.
    ///
    /// The inlet answers with each API's rendered text, decoded here as a
    /// default-template record.
    pub async fn call_multi(&self, calls: &BTreeMap<String, Value>) -> Result<MultiOutcome, ClientError> {
        if calls.keys().any(|api| api.trim().is_empty()) {
            return Err(ClientError::EmptyApiName);
        }

        let request = self
            .request()
            .header(X_API_MULTI_CALL, "1")
            .json(calls);
        let result = self.send(request).await?.into_result().map_err(ClientError::Remote)?;

        let rendered: BTreeMap<String, String> =
            serde_json::from_value(result).map_err(|e| ClientError::UnmarshalFailed(e.to_string()))?;
        rendered
            .into_iter()
            .map(|(api, text)| {
                let record: ClientRecord =
                    serde_json::from_str(&text).map_err(|e| ClientError::UnmarshalFailed(e.to_string()))?;
                Ok((api, record.into_result()))
            })
            .collect()
    }

    /// True when the inlet answers its health probe.
    pub async fn ping(&self) -> Result<bool, ClientError> {
        let url = self
            .endpoint
            .join("/ping")
            .map_err(|e| ClientError::SendFailed(e.to_string()))?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::SendFailed(e.to_string()))?;
        let ok = response.status().is_success();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::UnmarshalFailed(e.to_string()))?;
        Ok(ok && text.trim() == "pong")
    }

    async fn single(&self, api: &str, body: Vec<u8>) -> Result<Value, ClientError> {
        let api = api.trim();
        if api.is_empty() {
            return Err(ClientError::EmptyApiName);
        }

        let request = self
            .request()
            .header(self.api_header.as_str(), api)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        self.send(request).await?.into_result().map_err(ClientError::Remote)
    }

    fn request(&self) -> reqwest::RequestBuilder {
        let request = self.http.post(self.endpoint.clone());
        match self.timeout {
            Some(timeout) => request.header(X_API_CALL_TIMEOUT, timeout.as_millis().to_string()),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<ClientRecord, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::SendFailed(e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::SendFailed(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::debug!(error = %e, body = %String::from_utf8_lossy(&bytes), "Unexpected inlet response");
            ClientError::UnmarshalFailed(e.to_string())
        })
    }
}
