//! Outbound HTTP client that forwards the active correlation id.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Response, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::context::CorrelationContext;
use crate::error::{AppError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for a [`TracedClient`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Relative targets are resolved against this URL.
    pub base_url: Option<String>,
    /// Headers sent with every request.
    pub headers: Vec<(String, String)>,
    pub timeout_secs: f64,
    /// Header used to forward the correlation id.
    pub header_name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            headers: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs_f64(),
            header_name: "X-Request-ID".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs_f64();
        self
    }
}

/// Per-call extras.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub json: Option<serde_json::Value>,
    pub body: Option<String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.json = Some(body);
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| AppError::InvalidHeader(format!("{}: {}", name, e)))
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| AppError::InvalidHeader(format!("{}: {}", name, e)))
}

/// HTTP client that tags every outbound call with the current correlation id.
///
/// The connection pool is released by [`TracedClient::close`] or when the
/// client is dropped, whichever comes first.
#[derive(Debug)]
pub struct TracedClient {
    client: reqwest::Client,
    base_url: Option<Url>,
    header: HeaderName,
}

impl TracedClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw).map_err(|e| AppError::InvalidUrl {
                    url: raw.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let mut default_headers = HeaderMap::new();
        for (name, value) in &config.headers {
            default_headers.append(header_name(name)?, header_value(name, value)?);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::try_from_secs_f64(config.timeout_secs).unwrap_or(DEFAULT_TIMEOUT))
            .default_headers(default_headers)
            .build()
            .map_err(AppError::ClientBuild)?;

        Ok(Self {
            client,
            base_url,
            header: header_name(&config.header_name)?,
        })
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    fn resolve(&self, target: &str) -> Result<Url> {
        let invalid = |reason: String| AppError::InvalidUrl {
            url: target.to_string(),
            reason,
        };
        match Url::parse(target) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base_url {
                Some(base) => base.join(target).map_err(|e| invalid(e.to_string())),
                None => Err(invalid("relative URL without a base URL".to_string())),
            },
            Err(e) => Err(invalid(e.to_string())),
        }
    }

    /// Sends one request carrying the correlation header.
    ///
    /// With no active correlation id the header carries the `no-request-id`
    /// sentinel. Transport failures are logged and returned, never retried.
    pub async fn request(
        &self,
        method: Method,
        target: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        let request_id = CorrelationContext::get_or_sentinel();
        let url = self.resolve(target)?;

        let mut headers = HeaderMap::new();
        for (name, value) in &options.headers {
            headers.append(header_name(name)?, header_value(name, value)?);
        }
        headers.insert(
            self.header.clone(),
            header_value(self.header.as_str(), &request_id)?,
        );

        info!(request_id = %request_id, "Making {} request to {}", method, url);

        let mut builder = self
            .client
            .request(method.clone(), url.clone())
            .headers(headers);
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if let Some(json) = &options.json {
            builder = builder.json(json);
        } else if let Some(body) = options.body {
            builder = builder.body(body);
        }

        match builder.send().await {
            Ok(response) => {
                info!(
                    request_id = %request_id,
                    "Received response from {} with status {}",
                    url,
                    response.status().as_u16()
                );
                Ok(response)
            }
            Err(source) => {
                error!(request_id = %request_id, "Error making request to {}: {}", url, source);
                Err(AppError::Transport {
                    method: method.to_string(),
                    url: url.to_string(),
                    source,
                })
            }
        }
    }

    pub async fn get(&self, target: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::GET, target, options).await
    }

    pub async fn post(&self, target: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::POST, target, options).await
    }

    pub async fn put(&self, target: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::PUT, target, options).await
    }

    pub async fn delete(&self, target: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::DELETE, target, options).await
    }

    /// Releases the connection pool.
    pub fn close(self) {
        debug!("Closing traced client");
        drop(self.client);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_against_base() {
        let client =
            TracedClient::new(ClientConfig::default().with_base_url("http://svc.local/api/"))
                .unwrap();
        assert_eq!(
            client.resolve("users/1").unwrap().as_str(),
            "http://svc.local/api/users/1"
        );
        assert_eq!(
            client.resolve("http://other.local/x").unwrap().as_str(),
            "http://other.local/x"
        );
    }

    #[test]
    fn test_relative_without_base_is_invalid() {
        let client = TracedClient::new(ClientConfig::default()).unwrap();
        assert!(matches!(
            client.resolve("/users"),
            Err(AppError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(matches!(
            TracedClient::new(ClientConfig::default().with_base_url("not a url")),
            Err(AppError::InvalidUrl { .. })
        ));
        assert!(matches!(
            TracedClient::new(ClientConfig::default().with_header("bad header", "x")),
            Err(AppError::InvalidHeader(_))
        ));
    }
}
