use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;

use super::handlers;
use crate::client::TracedClient;
use crate::middleware::{RequestPipeline, REQUEST_ID_HEADER};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<TracedClient>,
    pub downstream_url: String,
    pub slow_delay: Duration,
    pub correlation_header: String,
}

impl AppState {
    pub fn new(client: Arc<TracedClient>, downstream_url: impl Into<String>) -> Self {
        Self {
            client,
            downstream_url: downstream_url.into(),
            slow_delay: Duration::from_secs(2),
            correlation_header: REQUEST_ID_HEADER.to_string(),
        }
    }

    /// Sets how long `/slow` takes.
    pub fn with_slow_delay(mut self, delay: Duration) -> Self {
        self.slow_delay = delay;
        self
    }

    /// Header `/echo` reports on.
    pub fn with_correlation_header(mut self, header: impl Into<String>) -> Self {
        self.correlation_header = header.into();
        self
    }
}

/// Creates the demo router wrapped in the request pipeline.
pub fn create_router(state: AppState, pipeline: RequestPipeline) -> Router {
    let router = Router::new()
        .route("/", get(handlers::root))
        .route("/slow", get(handlers::slow))
        .route("/proxy", get(handlers::proxy))
        .route("/echo", get(handlers::echo))
        .route("/fail", get(handlers::fail))
        .route("/health", get(handlers::health_check))
        .route("/live", get(handlers::liveness_check))
        .with_state(state);

    pipeline.apply(router)
}
