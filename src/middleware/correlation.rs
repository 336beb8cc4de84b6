use futures::future::BoxFuture;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Request, Response};
use std::task::{Context, Poll};
use tower::{Layer, Service};

use super::is_upgrade_request;
use crate::context::{CorrelationContext, CorrelationId};
use crate::error::{AppError, Result};

/// Default inbound and echoed header.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Adopts the first usable value of `header`, if any.
pub fn extract_correlation_id(headers: &HeaderMap, header: &HeaderName) -> Option<CorrelationId> {
    headers
        .get(header)
        .and_then(|value| value.to_str().ok())
        .and_then(CorrelationId::parse)
}

/// Outermost stage: gives every request exactly one correlation id.
///
/// The id is appended to the response headers; a value the handler already
/// set under the same name is kept ahead of it.
#[derive(Debug, Clone)]
pub struct CorrelationLayer {
    header: HeaderName,
}

impl Default for CorrelationLayer {
    fn default() -> Self {
        Self {
            header: HeaderName::from_static(REQUEST_ID_HEADER),
        }
    }
}

impl CorrelationLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `name` for both the inbound lookup and the response header.
    pub fn with_header(name: &str) -> Result<Self> {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AppError::InvalidHeader(format!("{}: {}", name, e)))?;
        Ok(Self { header })
    }

    pub fn header_name(&self) -> &HeaderName {
        &self.header
    }
}

impl<S> Layer<S> for CorrelationLayer {
    type Service = CorrelationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationService {
            inner,
            header: self.header.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CorrelationService<S> {
    inner: S,
    header: HeaderName,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CorrelationService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        // The clone is not ready yet; keep the ready one for this call.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        if is_upgrade_request(&request) {
            return Box::pin(inner.call(request));
        }

        let id = extract_correlation_id(request.headers(), &self.header)
            .unwrap_or_else(CorrelationId::generate);
        request.extensions_mut().insert(id.clone());
        let header = self.header.clone();

        Box::pin(CorrelationContext::scope(id.clone(), async move {
            let mut response = inner.call(request).await?;
            match HeaderValue::from_str(id.as_str()) {
                Ok(value) => {
                    response.headers_mut().append(header, value);
                }
                Err(_) => tracing::warn!("correlation id {} is not a valid header value", id),
            }
            Ok(response)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_uses_first_value() {
        let header = HeaderName::from_static(REQUEST_ID_HEADER);
        let mut headers = HeaderMap::new();
        headers.append(&header, HeaderValue::from_static("first"));
        headers.append(&header, HeaderValue::from_static("second"));

        let id = extract_correlation_id(&headers, &header).unwrap();
        assert_eq!(id.as_str(), "first");
    }

    #[test]
    fn test_extract_treats_blank_as_absent() {
        let header = HeaderName::from_static(REQUEST_ID_HEADER);
        let mut headers = HeaderMap::new();
        headers.insert(&header, HeaderValue::from_static("   "));
        assert!(extract_correlation_id(&headers, &header).is_none());

        let headers = HeaderMap::new();
        assert!(extract_correlation_id(&headers, &header).is_none());
    }

    #[test]
    fn test_extract_rejects_opaque_bytes() {
        let header = HeaderName::from_static(REQUEST_ID_HEADER);
        let mut headers = HeaderMap::new();
        headers.insert(&header, HeaderValue::from_bytes(b"\xfa\xfb").unwrap());
        assert!(extract_correlation_id(&headers, &header).is_none());
    }

    #[test]
    fn test_with_header_validates_name() {
        let layer = CorrelationLayer::with_header("X-Correlation-ID").unwrap();
        assert_eq!(layer.header_name().as_str(), "x-correlation-id");
        assert!(matches!(
            CorrelationLayer::with_header("bad header"),
            Err(AppError::InvalidHeader(_))
        ));
    }
}
