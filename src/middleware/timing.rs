use futures::future::BoxFuture;
use http::header::{HeaderName, HeaderValue};
use http::{Request, Response};
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};

use super::is_upgrade_request;

/// Response header carrying the handling time in milliseconds.
pub const PROCESS_TIME_HEADER: &str = "x-process-time-ms";

/// Timer for measuring request latency.
#[derive(Debug, Clone, Copy)]
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for LatencyTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders a duration the way it appears in the timing header.
pub fn format_duration_ms(duration_ms: f64) -> String {
    format!("{:.2}", duration_ms)
}

/// Second stage: times the rest of the chain and logs the outcome.
///
/// Must sit inside [`super::CorrelationLayer`] so the completion line can
/// pick up the request's correlation id. The timing header is appended, never
/// replacing one set further in.
#[derive(Debug, Clone, Default)]
pub struct TimingLayer;

impl TimingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TimingLayer {
    type Service = TimingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimingService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct TimingService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for TimingService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        if is_upgrade_request(&request) {
            return Box::pin(self.inner.call(request));
        }

        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let timer = LatencyTimer::new();
        let pending = self.inner.call(request);

        Box::pin(async move {
            let mut response = pending.await?;
            let elapsed = format_duration_ms(timer.elapsed_ms());

            if let Ok(value) = HeaderValue::from_str(&elapsed) {
                response
                    .headers_mut()
                    .append(HeaderName::from_static(PROCESS_TIME_HEADER), value);
            }

            // The correlation id is read from the context when this line is logged.
            tracing::info!("Request {} {} completed in {} ms", method, path, elapsed);
            Ok(response)
        })
    }
}
