//! HTTP server setup and request handling.
//!
//! # Responsibilities
//! - Create the axum Router for the base path and `{base}/{api}`
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Run resolve → prepare → dispatch → aggregate → render per request
//! - Serve with graceful shutdown
//!
//! # Design Decisions
//! - `AppState` is cheap to clone; everything inside is shared read-only
//! - Every failure becomes a rendered error record, never an HTTP error

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, Method, Request},
    response::Response,
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::InletConfig;
use crate::error::ApiError;
use crate::executor::{self, PipelineExecutor};
use crate::graph::GraphRegistry;
use crate::http::{request, response};
use crate::observability::metrics;
use crate::payload::{aggregate, ResponseRecord};
use crate::render::renderer::fallback_body;
use crate::render::ResponseRenderer;
use crate::routing::{RequestResolver, RequestView};
use crate::security::{OriginPolicy, ResponseSigner, StaticHeaders};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<GraphRegistry>,
    pub resolver: Arc<RequestResolver>,
    pub preparer: Arc<crate::payload::PayloadPreparer>,
    pub renderer: Arc<ResponseRenderer>,
    pub origins: Arc<OriginPolicy>,
    pub static_headers: Arc<StaticHeaders>,
    pub signer: Option<Arc<ResponseSigner>>,
    pub executor: Arc<dyn PipelineExecutor>,
    pub pass_through: Arc<[HeaderName]>,
    /// Upper bound on buffered request bodies, in bytes.
    pub max_body_size: usize,
}

/// Body produced for one request, with the code recorded per API.
#[derive(Debug, Clone, PartialEq)]
pub struct Handled {
    pub body: String,
    pub codes: Vec<(String, u64)>,
}

impl AppState {
    /// Handle one inlet call end to end. Never fails: errors are rendered.
    pub async fn handle(&self, view: &RequestView<'_>) -> Handled {
        let resolution = match self.resolver.resolve(&self.registry, view) {
            Ok(resolution) => resolution,
            Err(e) => return self.failed(view.headers, view.path, e.to_api_error()),
        };

        let payloads = match self.preparer.prepare_all(&self.registry, &resolution, view.body) {
            Ok(payloads) => payloads,
            Err(e) => return self.failed(view.headers, view.path, e.to_api_error()),
        };

        let options = request::call_options(view.headers, &self.pass_through);
        let outcomes = executor::dispatch(self.executor.as_ref(), &resolution, payloads, &options).await;

        let records = match aggregate(resolution.multi_call, outcomes) {
            Ok(records) => records,
            Err(e) => return self.failed(view.headers, view.path, e.to_api_error()),
        };
        let codes = records.iter().map(|(api, r)| (api.clone(), r.code)).collect();

        let body = match self.renderer.render(resolution.multi_call, &records) {
            Ok(body) => body,
            Err(e) => {
                let api = records.keys().next().map(String::as_str).unwrap_or("");
                metrics::record_render_failure(api);
                fallback_body(&ResponseRecord::from_api_error(&e.to_api_error()))
            }
        };

        Handled { body, codes }
    }

    /// Error raised before any API produced an outcome, rendered with the
    /// template of the API the request names.
    fn failed(&self, headers: &HeaderMap, path: &str, err: ApiError) -> Handled {
        let api = self.resolver.requested_api(headers, path);
        tracing::debug!(api = %api, code = err.code, error = %err.message, "Request rejected");
        Handled {
            body: self.renderer.render_error(&api, &err),
            codes: vec![(String::new(), err.code)],
        }
    }
}

/// HTTP server for the inlet.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server from config and prebuilt state.
    pub fn new(config: &InletConfig, state: AppState) -> Self {
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &InletConfig, state: AppState) -> Router {
        let base = base_path(&config.http.path);
        let (root, nested) = if base.is_empty() {
            ("/".to_string(), "/{*api}".to_string())
        } else {
            (base.clone(), format!("{base}/{{*api}}"))
        };

        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .route(&root, any(inlet_handler))
            .route(&nested, any(inlet_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(RequestBodyLimitLayer::new(config.http.max_body_size))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = %request::request_id(req.headers()),
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The configured router, for in-process serving.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// `/api/` → `/api`; `/` and `` → ``.
pub fn base_path(path: &str) -> String {
    let path = path.trim().trim_end_matches('/');
    if path.is_empty() {
        return String::new();
    }
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Main inlet handler.
async fn inlet_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();

    if parts.method == Method::OPTIONS {
        return response::preflight(&state, &parts.headers);
    }

    let request_id = request::request_id(&parts.headers).to_string();

    let handled = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => {
            let view = RequestView {
                method: &parts.method,
                headers: &parts.headers,
                path: parts.uri.path(),
                body: &bytes,
            };
            state.handle(&view).await
        }
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            state.failed(&parts.headers, parts.uri.path(), ApiError::unstructured(&e))
        }
    };

    for (api, code) in &handled.codes {
        metrics::record_request(api, *code, start);
    }
    tracing::info!(
        request_id = %request_id,
        apis = handled.codes.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request handled"
    );

    response::rendered(&state, &parts.headers, handled.body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UNSTRUCTURED_ERROR_CODE;
    use crate::executor::HttpStageExecutor;
    use crate::lifecycle::build_state;

    #[test]
    fn test_base_path() {
        assert_eq!(base_path("/"), "");
        assert_eq!(base_path(""), "");
        assert_eq!(base_path("/api/"), "/api");
        assert_eq!(base_path("api"), "/api");
    }

    #[tokio::test]
    async fn test_handler_bounds_body_without_layer() {
        let executor = Arc::new(HttpStageExecutor::new(Duration::from_secs(1)));
        let mut state = build_state(&InletConfig::default(), executor).unwrap();
        state.max_body_size = 8;

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api.echo")
            .body(Body::from(vec![b'x'; 64]))
            .unwrap();
        let response = inlet_handler(State(state), request).await;

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["code"], UNSTRUCTURED_ERROR_CODE);
    }
}
