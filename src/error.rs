//! Structured errors surfaced to API callers.
//!
//! Every error that reaches an HTTP caller is flattened into an [`ApiError`]:
//! a stable `(namespace, code, id, message)` tuple. Errors raised by the inlet
//! itself come from the [`InletError`] catalogue in the [`ERR_NAMESPACE`]
//! namespace; errors raised by backend stages keep their own namespace.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Namespace of every error raised by the inlet itself.
pub const ERR_NAMESPACE: &str = "INLET_API";

/// Code used when an error carries no structure of its own.
pub const UNSTRUCTURED_ERROR_CODE: u64 = 500;

/// A structured error with a stable identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ApiError {
    pub namespace: String,
    pub code: u64,
    /// Unique per raised instance, useful for correlating logs.
    #[serde(default)]
    pub id: String,
    pub message: String,
}

impl ApiError {
    pub fn new(namespace: impl Into<String>, code: u64, message: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            code,
            id: new_error_id(),
            message: message.into(),
        }
    }

    /// Coerce an error without structure into the inlet namespace.
    pub fn unstructured(err: &dyn std::error::Error) -> Self {
        Self::new(ERR_NAMESPACE, UNSTRUCTURED_ERROR_CODE, err.to_string())
    }
}

/// Errors raised by the inlet while resolving, preparing, aggregating or
/// rendering a request, plus the renderer's startup errors.
#[derive(Debug, Error)]
pub enum InletError {
    #[error("api name is empty")]
    EmptyApiName,

    #[error("method is not post, METHOD: {method}")]
    MethodNotAllowed { method: String },

    #[error("api graph is not exist, api: {api}")]
    UnknownApi { api: String },

    #[error("marshal struct error, error: {0}")]
    MarshalFailed(String),

    #[error("api request timeout, api: {api}")]
    RequestTimeout { api: String },

    #[error("unmarshal multi request failed {api}, error: {err}")]
    MalformedMultiRequest { api: String, err: String },

    #[error("api not exist in multi request, api: {api}")]
    MultiApiRequestNotExist { api: String },

    #[error("unmarshal multi request body failed, error: {0}")]
    MalformedMultiRequestBody(String),

    #[error("empty multi api request")]
    EmptyMultiRequest,

    #[error("parse proxy payload failed, api: {api} error: {err}")]
    ProxyPayloadParseFailed { api: String, err: String },

    #[error("payload response count not match, count: {count}")]
    ResponseCountMismatch { count: usize },

    #[error("render api response error, error: {0}")]
    RenderFailed(String),

    #[error("add template failed: {file}, error: {err}")]
    AddTemplateFailed { file: String, err: String },

    #[error("read file error, file: {file}, error: {err}")]
    ReadFile { file: String, err: String },

    #[error("match file list failed, dir: {dir}, error: {err}")]
    ListDirectory { dir: String, err: String },

    #[error("get file info failed, file: {file}, error: {err}")]
    FileInfo { file: String, err: String },

    #[error("decode template vars error, file: {file}, error: {err}")]
    DecodeVariables { file: String, err: String },

    #[error("template vars already exist, key: {key}, value: {value}")]
    VariableConflict { key: String, value: String },

    #[error("template not exist, name: {name}")]
    TemplateNotExist { name: String },

    #[error("api {api} already with template {template}")]
    ApiAlreadyRelated { api: String, template: String },
}

impl InletError {
    /// Stable numeric code within [`ERR_NAMESPACE`].
    pub fn code(&self) -> u64 {
        match self {
            InletError::EmptyApiName => 1,
            InletError::MethodNotAllowed { .. } => 2,
            InletError::UnknownApi { .. } => 3,
            InletError::MarshalFailed(_) => 4,
            InletError::RequestTimeout { .. } => 5,
            InletError::MalformedMultiRequest { .. } => 6,
            InletError::MultiApiRequestNotExist { .. } => 7,
            InletError::MalformedMultiRequestBody(_) => 8,
            InletError::EmptyMultiRequest => 9,
            InletError::ProxyPayloadParseFailed { .. } => 10,
            InletError::ResponseCountMismatch { .. } => 11,
            InletError::RenderFailed(_) => 12,
            InletError::AddTemplateFailed { .. } => 15,
            InletError::ReadFile { .. } => 16,
            InletError::ListDirectory { .. } => 17,
            InletError::FileInfo { .. } => 18,
            InletError::DecodeVariables { .. } => 19,
            InletError::VariableConflict { .. } => 20,
            InletError::TemplateNotExist { .. } => 21,
            InletError::ApiAlreadyRelated { .. } => 22,
        }
    }

    /// Flatten into the structured tuple returned to callers.
    pub fn to_api_error(&self) -> ApiError {
        ApiError::new(ERR_NAMESPACE, self.code(), self.to_string())
    }
}

impl From<InletError> for ApiError {
    fn from(err: InletError) -> Self {
        err.to_api_error()
    }
}

fn new_error_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(InletError::EmptyApiName.code(), 1);
        assert_eq!(InletError::UnknownApi { api: "a".into() }.code(), 3);
        assert_eq!(InletError::EmptyMultiRequest.code(), 9);
        assert_eq!(InletError::ResponseCountMismatch { count: 2 }.code(), 11);
        assert_eq!(
            InletError::ApiAlreadyRelated { api: "a".into(), template: "t".into() }.code(),
            22
        );
    }

    #[test]
    fn test_to_api_error() {
        let err = InletError::UnknownApi { api: "api.ghost".into() }.to_api_error();
        assert_eq!(err.namespace, ERR_NAMESPACE);
        assert_eq!(err.code, 3);
        assert_eq!(err.message, "api graph is not exist, api: api.ghost");
        assert_eq!(err.id.len(), 32);
    }

    #[test]
    fn test_error_ids_are_unique() {
        let a = InletError::EmptyApiName.to_api_error();
        let b = InletError::EmptyApiName.to_api_error();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_unstructured() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = ApiError::unstructured(&io);
        assert_eq!(err.code, UNSTRUCTURED_ERROR_CODE);
        assert_eq!(err.namespace, ERR_NAMESPACE);
        assert_eq!(err.message, "boom");
    }
}
