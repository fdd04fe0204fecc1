//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the graph registry and the response renderer from config
//! - Load templates, variables and API/template bindings
//! - Prepare origin policy, static headers and the optional signer
//! - Assemble the shared `AppState`
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Bindings are applied in sorted order so conflicts are reported the same
//!   way on every start

use std::sync::Arc;

use axum::http::HeaderName;
use thiserror::Error;

use crate::config::InletConfig;
use crate::error::InletError;
use crate::executor::PipelineExecutor;
use crate::graph::{GraphError, GraphRegistry};
use crate::http::server::{base_path, AppState};
use crate::payload::PayloadPreparer;
use crate::render::ResponseRenderer;
use crate::routing::RequestResolver;
use crate::security::{HeaderConfigError, OriginPolicy, ResponseSigner, SignatureError, StaticHeaders};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("graph registry: {0}")]
    Graph(#[from] GraphError),

    #[error("renderer: {0}")]
    Renderer(#[from] InletError),

    #[error("signature: {0}")]
    Signature(#[from] SignatureError),

    #[error("response headers: {0}")]
    Headers(#[from] HeaderConfigError),

    #[error("invalid header name '{0}'")]
    InvalidHeaderName(String),
}

/// Build the request-handling state from a validated config.
pub fn build_state(
    config: &InletConfig,
    executor: Arc<dyn PipelineExecutor>,
) -> Result<AppState, StartupError> {
    let registry = GraphRegistry::build(&config.address, &config.graphs, &config.hooks)?;
    tracing::info!(apis = registry.len(), "Graph registry ready");

    let renderer = build_renderer(config)?;

    let http = &config.http;
    let api_header = header_name(&http.api_header)?;
    let pass_through = http
        .pass_through_headers
        .iter()
        .map(|name| header_name(name))
        .collect::<Result<Vec<_>, _>>()?;

    let signer = if http.signature.enabled {
        let signer = ResponseSigner::from_file(http.signature.private_key_path.trim(), &http.signature.header)?;
        tracing::info!(header = %signer.header(), "Response signing enabled");
        Some(Arc::new(signer))
    } else {
        None
    };

    Ok(AppState {
        registry: Arc::new(registry),
        resolver: Arc::new(RequestResolver::new(api_header, &base_path(&http.path))),
        preparer: Arc::new(PayloadPreparer::new(http.api_header.trim())),
        renderer: Arc::new(renderer),
        origins: Arc::new(OriginPolicy::new(&http.allow_origins, &http.allow_headers, http.api_header.trim())),
        static_headers: Arc::new(StaticHeaders::from_config(http)?),
        signer,
        executor,
        pass_through: pass_through.into(),
        max_body_size: http.max_body_size,
    })
}

/// Renderer with templates, default template, variables and bindings loaded.
pub fn build_renderer(config: &InletConfig) -> Result<ResponseRenderer, StartupError> {
    let settings = &config.renderer;
    let mut renderer = ResponseRenderer::new()?;

    let templates = renderer.load_templates(&settings.templates)?;
    renderer.set_default_template(&settings.default_template)?;
    let variables = renderer.load_variables(&settings.variables)?;

    let mut relation: Vec<_> = settings.relation.iter().collect();
    relation.sort();
    for (template, apis) in relation {
        for api in apis {
            renderer.bind_api(api.trim(), template.trim())?;
        }
    }

    tracing::info!(
        templates,
        variables,
        default_template = %renderer.default_template(),
        "Response renderer ready"
    );
    Ok(renderer)
}

fn header_name(name: &str) -> Result<HeaderName, StartupError> {
    HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| StartupError::InvalidHeaderName(name.to_string()))
}
