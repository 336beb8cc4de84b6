use serde::Deserialize;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::formatter::DEFAULT_LOG_FORMAT;
use super::registry::{LogLayer, Logger, LoggerRegistry};
use crate::error::Result;

static REGISTRY: OnceLock<LoggerRegistry> = OnceLock::new();
static INSTALLED: OnceLock<Arc<Logger>> = OnceLock::new();

/// Configuration for a logger and its sinks.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Logger name, also the stem of the log file names.
    pub name: String,
    /// Minimum severity: debug, info, warning, error or critical.
    pub level: String,
    /// Directory for `<name>.log` and `<name>.error.log`. No files when unset.
    pub log_dir: Option<PathBuf>,
    /// Output on stdout, colored when stdout is a terminal.
    pub log_to_console: bool,
    /// Size at which a log file is rotated. 0 disables rotation.
    pub max_bytes: u64,
    /// Rotated files kept per log file.
    pub backup_count: usize,
    /// Line template, see [`DEFAULT_LOG_FORMAT`].
    pub log_format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            name: "service".to_string(),
            level: "info".to_string(),
            log_dir: None,
            log_to_console: true,
            max_bytes: 10 * 1024 * 1024,
            backup_count: 5,
            log_format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LogConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn with_console(mut self, enabled: bool) -> Self {
        self.log_to_console = enabled;
        self
    }

    pub fn with_rotation(mut self, max_bytes: u64, backup_count: usize) -> Self {
        self.max_bytes = max_bytes;
        self.backup_count = backup_count;
        self
    }

    pub fn with_format(mut self, log_format: impl Into<String>) -> Self {
        self.log_format = log_format.into();
        self
    }
}

/// Process-wide logger registry.
pub fn registry() -> &'static LoggerRegistry {
    REGISTRY.get_or_init(LoggerRegistry::new)
}

/// Wires the named logger in the process-wide registry.
///
/// Calling it again for the same name replaces that logger's sinks instead
/// of adding to them.
pub fn setup_logger(config: &LogConfig) -> Result<Arc<Logger>> {
    registry().setup(config)
}

/// Sets up the logger and installs it as the global tracing subscriber.
///
/// Only the first logger is installed. Later calls still reconfigure their
/// logger, and when it is the installed one the change applies in place.
/// `RUST_LOG`, when set, narrows what reaches the logger.
pub fn init_logging(config: &LogConfig) -> Result<Arc<Logger>> {
    let logger = setup_logger(config)?;

    let mut first = false;
    let installed = INSTALLED.get_or_init(|| {
        first = true;
        logger.clone()
    });

    if first {
        let env_filter = EnvFilter::try_from_default_env().ok();
        let installed_now = tracing_subscriber::registry()
            .with(env_filter)
            .with(LogLayer::new(logger.clone()))
            .try_init()
            .is_ok();
        if installed_now {
            tracing::info!("Logging initialized with level: {}", config.level);
        } else {
            eprintln!("a global tracing subscriber is already installed, '{}' will not receive events", config.name);
        }
    } else if !Arc::ptr_eq(installed, &logger) {
        tracing::warn!(
            "Logger '{}' configured, but '{}' is the installed logger",
            logger.name(),
            installed.name()
        );
    }

    Ok(logger)
}

/// Logs at CRITICAL severity: an ERROR event flagged `critical = true`.
#[macro_export]
macro_rules! critical {
    ($($arg:tt)+) => {
        ::tracing::error!(critical = true, $($arg)+)
    };
}
