//! Request interceptors and the fixed order they run in.

pub mod correlation;
pub mod timing;

use axum::Router;
use http::{header, Method, Request};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;

pub use correlation::{extract_correlation_id, CorrelationLayer, CorrelationService, REQUEST_ID_HEADER};
pub use timing::{format_duration_ms, LatencyTimer, TimingLayer, TimingService, PROCESS_TIME_HEADER};

/// True for requests that switch protocols instead of getting a response.
pub fn is_upgrade_request<B>(request: &Request<B>) -> bool {
    if request.method() == Method::CONNECT {
        return true;
    }
    let connection_upgrade = request
        .headers()
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
    connection_upgrade && request.headers().contains_key(header::UPGRADE)
}

/// The interceptor chain: correlation, then timing, then a panic guard
/// around the handlers.
///
/// A panicking handler becomes a 500 response inside the chain, so the
/// response still gets its correlation and timing headers.
#[derive(Debug, Clone, Default)]
pub struct RequestPipeline {
    correlation: CorrelationLayer,
    timing: TimingLayer,
}

impl RequestPipeline {
    pub fn new(correlation: CorrelationLayer) -> Self {
        Self {
            correlation,
            timing: TimingLayer::new(),
        }
    }

    pub fn correlation(&self) -> &CorrelationLayer {
        &self.correlation
    }

    /// Wraps every route of `router`, fallback included.
    pub fn apply<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(
            ServiceBuilder::new()
                .layer(self.correlation)
                .layer(self.timing)
                .layer(CatchPanicLayer::new()),
        )
    }
}
