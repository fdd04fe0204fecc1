//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the inlet.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the inlet.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct InletConfig {
    /// Additional files (or directories of `*.toml`) contributing
    /// `address` and `graphs` entries.
    pub include_config_files: Vec<String>,

    /// HTTP surface settings.
    pub http: HttpConfig,

    /// Backend endpoint definitions.
    pub address: Vec<AddressConfig>,

    /// API name to pipeline definitions.
    pub graphs: Vec<GraphConfig>,

    /// Stages wrapped around every pipeline.
    pub hooks: HooksConfig,

    /// Response template settings.
    pub renderer: RendererConfig,

    /// Pipeline executor settings.
    pub executor: ExecutorConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HTTP listener and edge behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Base path the inlet is mounted on ("" or "/" for root).
    pub path: String,

    /// Header carrying the API name for single calls.
    pub api_header: String,

    /// Value of the `Server` response header.
    pub server: String,

    /// Optional `P3P` response header.
    pub p3p: String,

    /// Origins (domains) allowed by CORS. `*` allows all, `*.x.com` allows subdomains.
    pub allow_origins: Vec<String>,

    /// Extra headers advertised in `Access-Control-Allow-Headers`.
    pub allow_headers: Vec<String>,

    /// Request headers forwarded to the pipeline executor.
    pub pass_through_headers: Vec<String>,

    /// Extra static response headers.
    pub response_headers: HashMap<String, String>,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Optional response signing.
    pub signature: SignatureConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            path: "/".to_string(),
            api_header: "X-Api".to_string(),
            server: "api-inlet".to_string(),
            p3p: String::new(),
            allow_origins: Vec::new(),
            allow_headers: Vec::new(),
            pass_through_headers: Vec::new(),
            response_headers: HashMap::new(),
            max_body_size: 2 * 1024 * 1024, // 2MB
            signature: SignatureConfig::default(),
        }
    }
}

/// RSA/SHA1 response signing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SignatureConfig {
    pub enabled: bool,

    /// Response header receiving the base64 signature.
    pub header: String,

    /// PEM encoded RSA private key (PKCS#1 or PKCS#8).
    pub private_key_path: String,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            header: "X-Signature".to_string(),
            private_key_path: String::new(),
        }
    }
}

/// Backend endpoint definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AddressConfig {
    /// Unique address identifier referenced by graphs.
    pub name: String,

    /// Transport kind (e.g., "http").
    #[serde(default, alias = "type")]
    pub kind: String,

    /// Endpoint URL.
    pub url: String,
}

/// Pipeline definition for one API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GraphConfig {
    /// API name callers use.
    pub api: String,

    /// Ordered address names the request traverses.
    #[serde(default)]
    pub graph: Vec<String>,

    /// Request body is a serialized payload envelope.
    #[serde(default)]
    pub is_proxy: bool,

    /// Address receiving the payload when a stage fails.
    #[serde(default)]
    pub error_address_name: String,
}

/// Address names placed before and after every configured pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HooksConfig {
    pub before: Vec<String>,
    pub after: Vec<String>,
}

/// Response rendering configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Template files or directories of `*.tmpl`.
    pub templates: Vec<String>,

    /// Template used when an API has no binding; empty for the built-in one.
    pub default_template: String,

    /// Variable files or directories of `*.json`.
    pub variables: Vec<String>,

    /// Template name -> API names rendered with it.
    pub relation: HashMap<String, Vec<String>>,
}

/// Pipeline executor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Default whole-pipeline timeout when the caller sends none.
    pub timeout_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Hard ceiling on handling one HTTP request, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
