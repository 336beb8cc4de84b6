pub mod filter;
pub mod formatter;
pub mod logging;
pub mod record;
pub mod registry;
pub mod sink;

pub use filter::{SensitiveDataFilter, REDACTION_MARKER, SENSITIVE_KEYS};
pub use formatter::{LogFormatter, DEFAULT_LOG_FORMAT};
pub use logging::{init_logging, registry, setup_logger, LogConfig};
pub use record::{LogRecord, Payload, Severity};
pub use registry::{LogLayer, Logger, LoggerRegistry};
pub use sink::{ConsoleSink, MemorySink, RotatingFileSink, Sink, SinkKind};
