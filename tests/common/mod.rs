#![allow(dead_code)]

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use request_correlation::api::{create_router, AppState};
use request_correlation::middleware::RequestPipeline;
use request_correlation::observability::{LogFormatter, LogLayer, Logger, MemorySink, Severity};
use request_correlation::{ClientConfig, TracedClient};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::layer::SubscriberExt;

/// Routes every event on this thread into an in-memory sink.
pub fn capture_logs() -> (Arc<MemorySink>, DefaultGuard) {
    let logger = Arc::new(Logger::new("test", Severity::Debug));
    let sink = Arc::new(MemorySink::new(LogFormatter::default(), Severity::Debug));
    logger.attach_sink(sink.clone());

    let subscriber = tracing_subscriber::registry().with(LogLayer::new(logger));
    let guard = tracing::subscriber::set_default(subscriber);
    (sink, guard)
}

pub fn test_state(downstream_url: &str) -> AppState {
    let client = TracedClient::new(ClientConfig::default()).expect("client");
    AppState::new(Arc::new(client), downstream_url).with_slow_delay(Duration::from_millis(20))
}

pub fn test_app() -> Router {
    create_router(test_state("http://127.0.0.1:9"), RequestPipeline::default())
}

/// Serves `app` on an ephemeral local port.
pub async fn spawn_app(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

/// Serves the demo router, with `/proxy` pointing back at itself.
pub async fn spawn_demo() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let app = create_router(test_state(&format!("http://{}", addr)), RequestPipeline::default());
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn get_with_id(uri: &str, id: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("X-Request-ID", id)
        .body(Body::empty())
        .unwrap()
}

pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
