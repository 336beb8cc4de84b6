use request_correlation::api::{create_router, AppState};
use request_correlation::config::Settings;
use request_correlation::middleware::{CorrelationLayer, RequestPipeline};
use request_correlation::observability::init_logging;
use request_correlation::TracedClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;

    // Initialize logging
    let logger = init_logging(&settings.logging)?;
    info!("Configuration loaded, logger '{}' ready", logger.name());

    let client = TracedClient::new(settings.client_config())?;
    let state = AppState::new(Arc::new(client), settings.downstream_url())
        .with_slow_delay(Duration::from_millis(settings.demo.slow_delay_ms))
        .with_correlation_header(settings.correlation.header_name.clone());

    let pipeline =
        RequestPipeline::new(CorrelationLayer::with_header(&settings.correlation.header_name)?);
    let app = create_router(state, pipeline);

    let addr = format!("{}:{}", settings.application.host, settings.application.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
