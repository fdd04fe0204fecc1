//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use api_inlet::config::{AddressConfig, GraphConfig, InletConfig};
use api_inlet::error::ApiError;
use api_inlet::executor::{CallOptions, ExecutorError, PipelineExecutor};
use api_inlet::graph::Graph;
use api_inlet::http::HttpServer;
use api_inlet::lifecycle::build_state;
use api_inlet::payload::Payload;
use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;
use tower::ServiceExt;

/// In-process executor answering from a fixed table.
///
/// APIs without an entry echo their request content back. Every call is
/// recorded with the payload and options it received.
#[derive(Default)]
pub struct StaticExecutor {
    answers: HashMap<String, Result<Value, ApiError>>,
    calls: AtomicUsize,
    received: Mutex<Vec<(String, Payload, CallOptions)>>,
}

impl StaticExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, api: &str, content: Value) -> Self {
        self.answers.insert(api.to_string(), Ok(content));
        self
    }

    pub fn fail(mut self, api: &str, err: ApiError) -> Self {
        self.answers.insert(api.to_string(), Err(err));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<(String, Payload, CallOptions)> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl PipelineExecutor for StaticExecutor {
    async fn execute(
        &self,
        api: &str,
        _graph: &Graph,
        mut payload: Payload,
        options: &CallOptions,
    ) -> Result<Payload, ExecutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.received
            .lock()
            .unwrap()
            .push((api.to_string(), payload.clone(), options.clone()));
        match self.answers.get(api) {
            Some(Ok(content)) => {
                payload.content = content.clone();
                Ok(payload)
            }
            Some(Err(err)) => Err(ExecutorError::Api(err.clone())),
            None => Ok(payload),
        }
    }
}

/// Config with one http address per `(name, url)` and one graph per
/// `(api, stages)`.
pub fn config(addresses: &[(&str, &str)], graphs: &[(&str, &[&str])]) -> InletConfig {
    let mut config = InletConfig::default();
    for (name, url) in addresses {
        config.address.push(AddressConfig {
            name: name.to_string(),
            kind: "http".to_string(),
            url: url.to_string(),
        });
    }
    for (api, stages) in graphs {
        config.graphs.push(GraphConfig {
            api: api.to_string(),
            graph: stages.iter().map(|s| s.to_string()).collect(),
            is_proxy: false,
            error_address_name: String::new(),
        });
    }
    config
}

/// The `api.echo → [addr1]` setup most scenarios start from.
pub fn echo_config() -> InletConfig {
    let mut config = config(
        &[("addr1", "http://b1"), ("addr2", "http://b2")],
        &[("api.echo", &["addr1"][..]), ("api.user", &["addr2"][..])],
    );
    config.http.allow_origins = vec!["ok.com".to_string()];
    config
}

pub fn router(config: &InletConfig, executor: Arc<dyn PipelineExecutor>) -> Router {
    let state = build_state(config, executor).unwrap();
    HttpServer::new(config, state).router()
}

/// Send one request through the router; returns headers and body text.
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(body.to_vec()).unwrap())
}

/// POST `body` to `path` with extra headers.
pub fn post_request(path: &str, headers: &[(&str, &str)], body: &str) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Start a stage backend on an ephemeral port. Every POST is answered by `f`
/// with the request path and decoded payload.
pub async fn start_stage_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String, Payload) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handler = move |request: Request<Body>| {
        let f = f.clone();
        async move {
            let path = request.uri().path().to_string();
            let bytes: Bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
                .await
                .unwrap_or_default();
            let payload = Payload::from_slice(&bytes).unwrap_or_default();
            let (status, body) = f(path, payload).await;
            (
                StatusCode::from_u16(status).unwrap_or(StatusCode::OK),
                [("content-type", "application/json")],
                body,
            )
                .into_response()
        }
    };

    let app = Router::new().route("/{*path}", post(handler));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    addr
}

/// Start the full inlet on an ephemeral port.
pub async fn start_inlet(config: &InletConfig, executor: Arc<dyn PipelineExecutor>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = build_state(config, executor).unwrap();
    let server = HttpServer::new(config, state);
    tokio::spawn(async move {
        let _ = server.run(listener, std::future::pending()).await;
    });
    addr
}
