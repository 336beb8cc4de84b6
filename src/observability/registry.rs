use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::subscriber::Interest;
use tracing::{Event, Level, Metadata, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use super::filter::SensitiveDataFilter;
use super::formatter::LogFormatter;
use super::logging::LogConfig;
use super::record::{LogRecord, Severity};
use super::sink::{ConsoleSink, RotatingFileSink, Sink, SinkKind};
use crate::error::{AppError, Result};

struct LoggerState {
    level: Severity,
    sinks: Vec<Arc<dyn Sink>>,
}

/// A named logger: one redaction filter in front of a set of sinks.
pub struct Logger {
    name: String,
    filter: SensitiveDataFilter,
    state: RwLock<LoggerState>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level())
            .field("sinks", &self.sink_kinds())
            .finish()
    }
}

impl Logger {
    /// Creates a logger with no sinks attached.
    pub fn new(name: impl Into<String>, level: Severity) -> Self {
        Self {
            name: name.into(),
            filter: SensitiveDataFilter::new(),
            state: RwLock::new(LoggerState {
                level,
                sinks: Vec::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> Severity {
        self.state.read().map(|s| s.level).unwrap_or(Severity::Debug)
    }

    pub fn is_enabled(&self, severity: Severity) -> bool {
        severity >= self.level()
    }

    pub fn sink_kinds(&self) -> Vec<SinkKind> {
        self.state
            .read()
            .map(|s| s.sinks.iter().map(|sink| sink.kind()).collect())
            .unwrap_or_default()
    }

    pub fn attach_sink(&self, sink: Arc<dyn Sink>) {
        if let Ok(mut state) = self.state.write() {
            state.sinks.push(sink);
        }
    }

    pub fn clear_sinks(&self) {
        if let Ok(mut state) = self.state.write() {
            state.sinks.clear();
        }
    }

    /// Replaces the level and the whole sink set from `config`.
    ///
    /// Sinks are built before anything is swapped, so a failing
    /// configuration leaves the previous wiring in place.
    pub fn configure(&self, config: &LogConfig) -> Result<()> {
        let level: Severity = config.level.parse()?;
        let formatter = LogFormatter::new(&config.log_format)?;
        let mut sinks: Vec<Arc<dyn Sink>> = Vec::new();

        if config.log_to_console {
            sinks.push(Arc::new(ConsoleSink::interactive(formatter.clone(), level)));
        }

        if let Some(dir) = &config.log_dir {
            std::fs::create_dir_all(dir).map_err(|source| AppError::LogDirectory {
                path: dir.clone(),
                source,
            })?;
            sinks.push(Arc::new(RotatingFileSink::open(
                dir.join(format!("{}.log", config.name)),
                config.max_bytes,
                config.backup_count,
                level,
                formatter.clone(),
            )?));
            sinks.push(Arc::new(RotatingFileSink::open(
                dir.join(format!("{}.error.log", config.name)),
                config.max_bytes,
                config.backup_count,
                level.max(Severity::Error),
                formatter,
            )?));
        }

        let mut state = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.level = level;
        state.sinks = sinks;
        Ok(())
    }

    /// Filters the record and hands it to every sink that accepts it.
    pub fn log(&self, mut record: LogRecord) {
        let sinks = match self.state.read() {
            Ok(state) if record.severity >= state.level => state.sinks.clone(),
            _ => return,
        };

        self.filter.filter(&mut record);

        for sink in sinks.iter().filter(|sink| sink.accepts(record.severity)) {
            if let Err(err) = sink.write_record(&record) {
                // The logging path has nowhere else to report to.
                eprintln!("{}: failed to write log record: {}", self.name, err);
            }
        }
    }
}

/// Named loggers. Setting up a name twice reconfigures the same instance.
#[derive(Debug, Default)]
pub struct LoggerRegistry {
    loggers: Mutex<HashMap<String, Arc<Logger>>>,
}

impl LoggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the logger for `config.name`, wired according to `config`.
    pub fn setup(&self, config: &LogConfig) -> Result<Arc<Logger>> {
        let logger = {
            let mut loggers = self
                .loggers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            loggers
                .entry(config.name.clone())
                .or_insert_with(|| Arc::new(Logger::new(config.name.clone(), Severity::Info)))
                .clone()
        };
        logger.configure(config)?;
        Ok(logger)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Logger>> {
        self.loggers
            .lock()
            .ok()
            .and_then(|loggers| loggers.get(name).cloned())
    }

    pub fn len(&self) -> usize {
        self.loggers.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Feeds tracing events into a [`Logger`].
#[derive(Debug, Clone)]
pub struct LogLayer {
    logger: Arc<Logger>,
}

impl LogLayer {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }
}

impl<S> Layer<S> for LogLayer
where
    S: Subscriber,
{
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        // The logger level can change at runtime, so never cache a decision.
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        // ERROR events may turn out to be CRITICAL once their fields are read.
        let highest = Severity::from_level(metadata.level(), *metadata.level() == Level::ERROR);
        self.logger.is_enabled(highest)
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.logger.log(LogRecord::from_event(event));
    }
}
