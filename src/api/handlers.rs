use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::api::responses::{
    ApiResponse, EchoResponse, ErrorResponse, HealthResponse, MessageResponse, ProxyResponse,
};
use crate::client::RequestOptions;
use crate::context::CorrelationContext;

use super::routes::AppState;

/// Greets the caller with its correlation id.
pub async fn root() -> Json<ApiResponse<MessageResponse>> {
    tracing::info!("Processing root endpoint");
    Json(ApiResponse::success(MessageResponse {
        message: "Hello World".to_string(),
        request_id: CorrelationContext::get_or_sentinel(),
    }))
}

/// Answers after the configured delay.
pub async fn slow(State(state): State<AppState>) -> Json<ApiResponse<MessageResponse>> {
    tokio::time::sleep(state.slow_delay).await;
    tracing::info!("Processing slow endpoint");
    Json(ApiResponse::success(MessageResponse {
        message: "Slow response".to_string(),
        request_id: CorrelationContext::get_or_sentinel(),
    }))
}

/// Calls the downstream `/echo` and reports what it received.
pub async fn proxy(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ProxyResponse>>, (StatusCode, Json<ApiResponse<()>>)> {
    let request_id = CorrelationContext::get_or_sentinel();
    let target = format!("{}/echo", state.downstream_url.trim_end_matches('/'));

    let downstream_error = |message: String| {
        (
            StatusCode::BAD_GATEWAY,
            Json(ApiResponse::<()>::error(
                ErrorResponse::new("DOWNSTREAM_ERROR", message).with_request_id(request_id.clone()),
            )),
        )
    };

    let response = state
        .client
        .get(&target, RequestOptions::new())
        .await
        .map_err(|e| downstream_error(e.to_string()))?;

    let downstream_status = response.status().as_u16();
    let downstream = response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| downstream_error(e.to_string()))?;

    Ok(Json(ApiResponse::success(ProxyResponse {
        request_id: request_id.clone(),
        downstream_status,
        downstream,
    })))
}

/// Reports the correlation header this request arrived with.
pub async fn echo(State(state): State<AppState>, headers: HeaderMap) -> Json<EchoResponse> {
    let received_request_id = headers
        .get(state.correlation_header.as_str())
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    tracing::info!("Echoing inbound correlation header");
    Json(EchoResponse {
        received_request_id,
        request_id: CorrelationContext::get_or_sentinel(),
    })
}

/// Always panics; exercises the pipeline's failure path.
pub async fn fail() -> Json<ApiResponse<()>> {
    tracing::warn!("About to fail on purpose");
    panic!("simulated handler failure");
}

/// Health check endpoint.
pub async fn health_check() -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    }))
}

/// Liveness probe.
pub async fn liveness_check() -> StatusCode {
    StatusCode::OK
}
