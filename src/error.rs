use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the correlation and logging toolkit.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    #[error("Cannot prepare log directory {path}: {source}")]
    LogDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("HTTP client error: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("{method} {url} failed: {source}")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl AppError {
    /// Returns true for failures of the outbound transport.
    pub fn is_transport(&self) -> bool {
        matches!(self, AppError::Transport { .. })
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
