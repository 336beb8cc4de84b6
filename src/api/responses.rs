use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Standard API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ErrorResponse>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(error: ErrorResponse) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Plain message tagged with the request's correlation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
    pub request_id: String,
}

/// What the downstream service saw for a proxied call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyResponse {
    pub request_id: String,
    pub downstream_status: u16,
    pub downstream: serde_json::Value,
}

/// Correlation header as received by `/echo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EchoResponse {
    pub received_request_id: Option<String>,
    pub request_id: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_success_serialization() {
        let response = ApiResponse::success(MessageResponse {
            message: "Hello World".to_string(),
            request_id: "abc-123".to_string(),
        });
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"request_id\":\"abc-123\""));
    }

    #[test]
    fn test_api_response_error_serialization() {
        let error = ErrorResponse::new("DOWNSTREAM_ERROR", "unreachable").with_request_id("abc");
        let response: ApiResponse<()> = ApiResponse::<()>::error(error);
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("\"code\":\"DOWNSTREAM_ERROR\""));
        assert!(json.contains("\"request_id\":\"abc\""));
    }
}
