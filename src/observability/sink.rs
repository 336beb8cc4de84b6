use std::fs::{self, File, OpenOptions};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::formatter::LogFormatter;
use super::record::{LogRecord, Severity};
use crate::error::{AppError, Result};

/// Kind of destination, used to inspect a logger's wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    Console,
    File,
    ErrorFile,
    Memory,
}

/// A destination for formatted log lines.
pub trait Sink: Send + Sync {
    fn kind(&self) -> SinkKind;

    /// Lowest severity this sink accepts.
    fn threshold(&self) -> Severity;

    /// Formats and writes one record as a single line.
    fn write_record(&self, record: &LogRecord) -> io::Result<()>;

    fn accepts(&self, severity: Severity) -> bool {
        severity >= self.threshold()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Writes to standard output.
#[derive(Debug)]
pub struct ConsoleSink {
    formatter: LogFormatter,
    threshold: Severity,
}

impl ConsoleSink {
    pub fn new(formatter: LogFormatter, threshold: Severity) -> Self {
        Self {
            formatter,
            threshold,
        }
    }

    /// Colored when stdout is a terminal, plain when it is piped or redirected.
    pub fn interactive(formatter: LogFormatter, threshold: Severity) -> Self {
        let colored = io::stdout().is_terminal();
        Self::new(formatter.with_color(colored), threshold)
    }

    pub fn is_colored(&self) -> bool {
        self.formatter.is_colored()
    }
}

impl Sink for ConsoleSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Console
    }

    fn threshold(&self) -> Severity {
        self.threshold
    }

    fn write_record(&self, record: &LogRecord) -> io::Result<()> {
        let mut line = self.formatter.format(record);
        line.push('\n');
        let mut out = io::stdout().lock();
        out.write_all(line.as_bytes())?;
        out.flush()
    }
}

struct ActiveFile {
    file: File,
    size: u64,
}

/// Appends to a file that is rotated once it would grow past `max_bytes`.
///
/// Backups are named `<file>.1` (newest) up to `<file>.<backup_count>`.
/// Each line is written with a single call under the sink's lock, so lines
/// from concurrent flows never interleave and rotation never splits a line.
pub struct RotatingFileSink {
    path: PathBuf,
    max_bytes: u64,
    backup_count: usize,
    kind: SinkKind,
    threshold: Severity,
    formatter: LogFormatter,
    active: Mutex<ActiveFile>,
}

impl std::fmt::Debug for RotatingFileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingFileSink")
            .field("path", &self.path)
            .field("max_bytes", &self.max_bytes)
            .field("backup_count", &self.backup_count)
            .field("kind", &self.kind)
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl RotatingFileSink {
    /// Opens (or creates) `path` in append mode.
    ///
    /// `max_bytes == 0` disables rotation.
    pub fn open(
        path: impl Into<PathBuf>,
        max_bytes: u64,
        backup_count: usize,
        threshold: Severity,
        formatter: LogFormatter,
    ) -> Result<Self> {
        let path = path.into();
        let file = open_append(&path).map_err(|source| AppError::LogFile {
            path: path.clone(),
            source,
        })?;
        let size = file
            .metadata()
            .map_err(|source| AppError::LogFile {
                path: path.clone(),
                source,
            })?
            .len();

        let kind = if threshold >= Severity::Error {
            SinkKind::ErrorFile
        } else {
            SinkKind::File
        };

        Ok(Self {
            path,
            max_bytes,
            backup_count,
            kind,
            threshold,
            formatter: formatter.with_color(false),
            active: Mutex::new(ActiveFile { file, size }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the `index`-th backup.
    pub fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn should_rotate(&self, active: &ActiveFile, incoming: u64) -> bool {
        self.max_bytes > 0 && active.size > 0 && active.size + incoming > self.max_bytes
    }

    fn rotate(&self, active: &mut ActiveFile) -> io::Result<()> {
        active.file.flush()?;

        if self.backup_count > 0 {
            let oldest = self.backup_path(self.backup_count);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for index in (1..self.backup_count).rev() {
                let source = self.backup_path(index);
                if source.exists() {
                    fs::rename(&source, self.backup_path(index + 1))?;
                }
            }
            fs::rename(&self.path, self.backup_path(1))?;
            active.file = open_append(&self.path)?;
        } else {
            active.file = OpenOptions::new()
                .write(true)
                .truncate(true)
                .create(true)
                .open(&self.path)?;
        }

        active.size = 0;
        Ok(())
    }
}

impl Sink for RotatingFileSink {
    fn kind(&self) -> SinkKind {
        self.kind
    }

    fn threshold(&self) -> Severity {
        self.threshold
    }

    fn write_record(&self, record: &LogRecord) -> io::Result<()> {
        let mut line = self.formatter.format(record);
        line.push('\n');
        let incoming = line.len() as u64;

        let mut active = lock(&self.active);
        if self.should_rotate(&active, incoming) {
            self.rotate(&mut active)?;
        }
        active.file.write_all(line.as_bytes())?;
        active.size += incoming;
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Keeps formatted lines in memory.
#[derive(Debug)]
pub struct MemorySink {
    formatter: LogFormatter,
    threshold: Severity,
    lines: Mutex<Vec<String>>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(LogFormatter::default(), Severity::Debug)
    }
}

impl MemorySink {
    pub fn new(formatter: LogFormatter, threshold: Severity) -> Self {
        Self {
            formatter,
            threshold,
            lines: Mutex::new(Vec::new()),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        lock(&self.lines).clone()
    }

    /// Lines containing `needle`.
    pub fn matching(&self, needle: &str) -> Vec<String> {
        lock(&self.lines)
            .iter()
            .filter(|line| line.contains(needle))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.lines).clear();
    }
}

impl Sink for MemorySink {
    fn kind(&self) -> SinkKind {
        SinkKind::Memory
    }

    fn threshold(&self) -> Severity {
        self.threshold
    }

    fn write_record(&self, record: &LogRecord) -> io::Result<()> {
        let line = self.formatter.format(record);
        lock(&self.lines).push(line);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(message: &str) -> LogRecord {
        LogRecord::new(Severity::Info, "svc", message)
    }

    #[test]
    fn test_console_color_follows_terminal() {
        let sink = ConsoleSink::interactive(LogFormatter::default(), Severity::Info);
        assert_eq!(sink.is_colored(), io::stdout().is_terminal());

        let plain = ConsoleSink::new(LogFormatter::default(), Severity::Info);
        assert!(!plain.is_colored());
        assert_eq!(plain.kind(), SinkKind::Console);
    }

    #[test]
    fn test_file_sink_kind_follows_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let main = RotatingFileSink::open(
            dir.path().join("svc.log"),
            0,
            1,
            Severity::Debug,
            LogFormatter::default(),
        )
        .unwrap();
        let errors = RotatingFileSink::open(
            dir.path().join("svc.error.log"),
            0,
            1,
            Severity::Error,
            LogFormatter::default(),
        )
        .unwrap();

        assert_eq!(main.kind(), SinkKind::File);
        assert_eq!(errors.kind(), SinkKind::ErrorFile);
        assert!(!errors.accepts(Severity::Warning));
        assert!(errors.accepts(Severity::Critical));
    }

    #[test]
    fn test_file_sink_never_uses_color() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RotatingFileSink::open(
            dir.path().join("svc.log"),
            0,
            1,
            Severity::Debug,
            LogFormatter::default().with_color(true),
        )
        .unwrap();
        sink.write_record(&record("plain")).unwrap();

        let contents = fs::read_to_string(sink.path()).unwrap();
        assert!(!contents.contains('\x1b'));
        assert!(contents.ends_with("plain\n"));
    }

    #[test]
    fn test_zero_backups_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let formatter = LogFormatter::new("{message}").unwrap();
        let sink =
            RotatingFileSink::open(dir.path().join("svc.log"), 10, 0, Severity::Debug, formatter)
                .unwrap();

        sink.write_record(&record("first-line")).unwrap();
        sink.write_record(&record("second")).unwrap();

        assert_eq!(fs::read_to_string(sink.path()).unwrap(), "second\n");
        assert!(!sink.backup_path(1).exists());
    }

    #[test]
    fn test_memory_sink_collects() {
        let sink = MemorySink::default();
        sink.write_record(&record("one")).unwrap();
        sink.write_record(&record("two")).unwrap();
        assert_eq!(sink.lines().len(), 2);
        assert_eq!(sink.matching("two").len(), 1);
        sink.clear();
        assert!(sink.lines().is_empty());
    }
}
