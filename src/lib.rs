pub mod api;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod middleware;
pub mod observability;

pub use client::{ClientConfig, RequestOptions, TracedClient};
pub use context::{ContextToken, CorrelationContext, CorrelationId, NO_REQUEST_ID};
pub use error::{AppError, Result};
pub use middleware::{CorrelationLayer, RequestPipeline, TimingLayer};
pub use observability::{init_logging, setup_logger, LogConfig};
