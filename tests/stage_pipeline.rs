//! HTTP stage executor and API client over real sockets.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use api_inlet::client::{ApiClient, ClientError};
use api_inlet::executor::{CallOptions, ExecutorError, HttpStageExecutor, PipelineExecutor};
use api_inlet::graph::{Address, Graph};
use api_inlet::payload::{Payload, PayloadError};
use serde_json::{json, Value};
use url::Url;

mod common;

/// Backend appending the stage path to `content.trail`.
async fn trail_backend() -> std::net::SocketAddr {
    common::start_stage_backend(|path: String, mut payload: Payload| async move {
        let mut trail = payload.content["trail"].as_array().cloned().unwrap_or_default();
        trail.push(Value::String(path));
        payload.content = json!({ "trail": trail });
        (200, serde_json::to_string(&payload).unwrap())
    })
    .await
}

fn stage(addr: std::net::SocketAddr, name: &str) -> Address {
    Address::new(name, "http", format!("http://{addr}/{name}"))
}

#[tokio::test]
async fn test_stages_run_in_order() {
    let addr = trail_backend().await;
    let mut graph = Graph::new();
    graph.add_stages([stage(addr, "a"), stage(addr, "b"), stage(addr, "c")]);

    let executor = HttpStageExecutor::new(Duration::from_secs(5));
    let payload = executor
        .execute("api.trail", &graph, Payload::new(json!({})), &CallOptions::default())
        .await
        .unwrap();

    assert_eq!(payload.content, json!({"trail": ["/a", "/b", "/c"]}));
}

#[tokio::test]
async fn test_business_error_stops_pipeline() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let addr = common::start_stage_backend(move |path: String, mut payload: Payload| {
        let recorder = recorder.clone();
        async move {
            recorder.lock().unwrap().push(path.clone());
            if path == "/deny" {
                payload.set_error(PayloadError {
                    code: 403,
                    id: "e1".into(),
                    namespace: "AUTH".into(),
                    message: "denied".into(),
                });
            }
            (200, serde_json::to_string(&payload).unwrap())
        }
    })
    .await;

    let mut graph = Graph::new();
    graph.add_stages([stage(addr, "deny"), stage(addr, "never")]);

    let executor = HttpStageExecutor::new(Duration::from_secs(5));
    let payload = executor
        .execute("api.auth", &graph, Payload::new(json!({})), &CallOptions::default())
        .await
        .unwrap();

    assert!(!payload.is_correct());
    assert_eq!(*seen.lock().unwrap(), vec!["/deny".to_string()]);
}

#[tokio::test]
async fn test_transport_failure_reaches_error_address() {
    let reported = Arc::new(Mutex::new(Vec::<Payload>::new()));
    let recorder = reported.clone();
    let addr = common::start_stage_backend(move |path: String, payload: Payload| {
        let recorder = recorder.clone();
        async move {
            match path.as_str() {
                "/broken" => (502, "bad gateway".to_string()),
                "/errors" => {
                    recorder.lock().unwrap().push(payload.clone());
                    (200, serde_json::to_string(&payload).unwrap())
                }
                _ => (200, serde_json::to_string(&payload).unwrap()),
            }
        }
    })
    .await;

    let mut graph = Graph::new();
    graph
        .add_stages([stage(addr, "ok"), stage(addr, "broken")])
        .set_error_address(stage(addr, "errors"));

    let executor = HttpStageExecutor::new(Duration::from_secs(5));
    let err = executor
        .execute("api.broken", &graph, Payload::new(json!({"n": 1})), &CallOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutorError::Transport(_)));
    assert_eq!(err.to_api_error().code, 500);

    let reported = reported.lock().unwrap();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].content, json!({"n": 1}));
    assert_eq!(reported[0].error.as_ref().unwrap().code, 500);
}

#[tokio::test]
async fn test_structured_stage_error_is_kept() {
    let addr = common::start_stage_backend(|_path: String, _payload: Payload| async move {
        (
            400,
            json!({"namespace": "ORDER", "code": 17, "id": "x1", "message": "sold out"}).to_string(),
        )
    })
    .await;

    let mut graph = Graph::new();
    graph.add_stages([stage(addr, "order")]);

    let executor = HttpStageExecutor::new(Duration::from_secs(5));
    let err = executor
        .execute("api.order", &graph, Payload::new(json!({})), &CallOptions::default())
        .await
        .unwrap_err();

    let api_err = err.to_api_error();
    assert_eq!((api_err.namespace.as_str(), api_err.code), ("ORDER", 17));
    assert_eq!(api_err.message, "sold out");
}

#[tokio::test]
async fn test_zero_coded_stage_error_is_transport_failure() {
    let addr = common::start_stage_backend(|_path: String, _payload: Payload| async move {
        (
            500,
            json!({"namespace": "ORDER", "code": 0, "id": "x1", "message": "oops"}).to_string(),
        )
    })
    .await;

    let mut graph = Graph::new();
    graph.add_stages([stage(addr, "order")]);

    let executor = HttpStageExecutor::new(Duration::from_secs(5));
    let err = executor
        .execute("api.order", &graph, Payload::new(json!({})), &CallOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutorError::Transport(_)));
    assert_eq!(err.to_api_error().code, 500);
}

#[tokio::test]
async fn test_caller_timeout_bounds_pipeline() {
    let addr = common::start_stage_backend(|_path: String, payload: Payload| async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        (200, serde_json::to_string(&payload).unwrap())
    })
    .await;

    let mut graph = Graph::new();
    graph.add_stages([stage(addr, "slow")]);

    let executor = HttpStageExecutor::new(Duration::from_secs(5));
    let options = CallOptions {
        timeout: Some(Duration::from_millis(50)),
        ..CallOptions::default()
    };
    let err = executor
        .execute("api.slow", &graph, Payload::new(json!({})), &options)
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutorError::Timeout { ref api } if api == "api.slow"));
    assert_eq!(err.to_api_error().code, 5);
}

#[tokio::test]
async fn test_client_against_running_inlet() {
    let backend = trail_backend().await;
    let (url_a, url_b) = (format!("http://{backend}/a"), format!("http://{backend}/b"));
    let config = common::config(
        &[("a", url_a.as_str()), ("b", url_b.as_str())],
        &[("api.ab", &["a", "b"][..]), ("api.b", &["b"][..])],
    );
    let executor = Arc::new(HttpStageExecutor::new(Duration::from_secs(5)));
    let inlet = common::start_inlet(&config, executor).await;

    let client = ApiClient::new(Url::parse(&format!("http://{inlet}/")).unwrap())
        .call_timeout(Duration::from_secs(2));

    assert!(client.ping().await.unwrap());

    let result = client.call("api.ab", &json!({})).await.unwrap();
    assert_eq!(result, json!({"trail": ["/a", "/b"]}));

    let mut calls = BTreeMap::new();
    calls.insert("api.ab".to_string(), json!({}));
    calls.insert("api.b".to_string(), json!({"trail": ["/start"]}));
    let outcomes = client.call_multi(&calls).await.unwrap();
    assert_eq!(outcomes["api.ab"].as_ref().unwrap(), &json!({"trail": ["/a", "/b"]}));
    assert_eq!(outcomes["api.b"].as_ref().unwrap(), &json!({"trail": ["/start", "/b"]}));

    let err = client.call("api.ghost", &json!({})).await.unwrap_err();
    match err {
        ClientError::Remote(remote) => {
            assert_eq!(remote.code, 3);
            assert_eq!(remote.namespace, "INLET_API");
        }
        other => panic!("unexpected error: {other}"),
    }
}
