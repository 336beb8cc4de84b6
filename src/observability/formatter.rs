use std::fmt::Write;

use super::record::{LogRecord, Severity};
use crate::error::{AppError, Result};

/// Layout used when no `log_format` is configured.
pub const DEFAULT_LOG_FORMAT: &str =
    "{timestamp} - {level} - [{request_id}] - {file}:{line} - {function} - {message}";

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

const RESET: &str = "\x1b[0m";

/// ANSI color used for a severity on interactive output.
pub fn color_for(severity: Severity) -> &'static str {
    match severity {
        Severity::Debug => "\x1b[38;21m",
        Severity::Info => "\x1b[38;5;39m",
        Severity::Warning => "\x1b[38;5;226m",
        Severity::Error => "\x1b[38;5;196m",
        Severity::Critical => "\x1b[31;1m",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Timestamp,
    Name,
    Level,
    RequestId,
    File,
    Line,
    Function,
    Message,
}

impl Segment {
    fn placeholder(name: &str) -> Option<Self> {
        match name {
            "timestamp" => Some(Segment::Timestamp),
            "name" => Some(Segment::Name),
            "level" => Some(Segment::Level),
            "request_id" => Some(Segment::RequestId),
            "file" => Some(Segment::File),
            "line" => Some(Segment::Line),
            "function" => Some(Segment::Function),
            "message" => Some(Segment::Message),
            _ => None,
        }
    }
}

/// Renders records into single lines following a `{placeholder}` template.
#[derive(Debug, Clone)]
pub struct LogFormatter {
    segments: Vec<Segment>,
    colored: bool,
}

impl Default for LogFormatter {
    fn default() -> Self {
        Self {
            segments: parse_template(DEFAULT_LOG_FORMAT).unwrap_or_default(),
            colored: false,
        }
    }
}

impl LogFormatter {
    /// Parses a template. `{{` and `}}` stand for literal braces.
    pub fn new(template: &str) -> Result<Self> {
        Ok(Self {
            segments: parse_template(template)?,
            colored: false,
        })
    }

    pub fn with_color(mut self, colored: bool) -> Self {
        self.colored = colored;
        self
    }

    pub fn is_colored(&self) -> bool {
        self.colored
    }

    pub fn format(&self, record: &LogRecord) -> String {
        let mut line = String::with_capacity(128);
        if self.colored {
            line.push_str(color_for(record.severity));
        }

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => line.push_str(text),
                Segment::Timestamp => {
                    let _ = write!(line, "{}", record.timestamp.format(TIMESTAMP_FORMAT));
                }
                Segment::Name => line.push_str(&record.name),
                Segment::Level => line.push_str(record.severity.as_str()),
                Segment::RequestId => line.push_str(record.request_id_or_sentinel()),
                Segment::File => line.push_str(record.file.as_deref().unwrap_or("<unknown>")),
                Segment::Line => {
                    let _ = write!(line, "{}", record.line.unwrap_or(0));
                }
                Segment::Function => {
                    line.push_str(record.function.as_deref().unwrap_or("<unknown>"))
                }
                Segment::Message => {
                    let _ = write!(line, "{}", record.message);
                    for (key, value) in &record.fields {
                        let _ = write!(line, " {}={}", key, value);
                    }
                }
            }
        }

        if self.colored {
            line.push_str(RESET);
        }
        line
    }
}

fn parse_template(template: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        closed = true;
                        break;
                    }
                    name.push(next);
                }
                if !closed {
                    return Err(AppError::InvalidFormat(format!(
                        "unclosed placeholder in '{}'",
                        template
                    )));
                }
                let segment = Segment::placeholder(name.trim()).ok_or_else(|| {
                    AppError::InvalidFormat(format!("unknown placeholder '{{{}}}'", name))
                })?;
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(segment);
            }
            '}' => {
                return Err(AppError::InvalidFormat(format!(
                    "unmatched '}}' in '{}'",
                    template
                )))
            }
            _ => literal.push(c),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NO_REQUEST_ID;
    use chrono::{Local, TimeZone};

    fn record() -> LogRecord {
        let mut record = LogRecord::new(Severity::Warning, "svc", "disk almost full")
            .with_location("src/main.rs", 42, "svc::disk");
        record.timestamp = Local.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        record
    }

    #[test]
    fn test_default_layout() {
        let line = LogFormatter::default().format(&record());
        assert_eq!(
            line,
            format!(
                "2024-03-01 12:30:05,000 - WARNING - [{}] - src/main.rs:42 - svc::disk - disk almost full",
                NO_REQUEST_ID
            )
        );
    }

    #[test]
    fn test_request_id_is_rendered() {
        let line = LogFormatter::default().format(&record().with_request_id("abc-123"));
        assert!(line.contains("[abc-123]"));
    }

    #[test]
    fn test_colored_wraps_line() {
        let formatter = LogFormatter::default().with_color(true);
        let line = formatter.format(&record());
        assert!(line.starts_with(color_for(Severity::Warning)));
        assert!(line.ends_with(RESET));
    }

    #[test]
    fn test_five_distinct_colors() {
        let colors = [
            color_for(Severity::Debug),
            color_for(Severity::Info),
            color_for(Severity::Warning),
            color_for(Severity::Error),
            color_for(Severity::Critical),
        ];
        for (i, a) in colors.iter().enumerate() {
            for b in colors.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_custom_template_and_fields() {
        let formatter = LogFormatter::new("{{{level}}} {name}: {message}").unwrap();
        let line = formatter.format(&record().with_field("disk", "sda1"));
        assert_eq!(line, "{WARNING} svc: disk almost full disk=sda1");
    }

    #[test]
    fn test_invalid_templates() {
        assert!(matches!(
            LogFormatter::new("{timestamp} {thread}"),
            Err(AppError::InvalidFormat(_))
        ));
        assert!(matches!(
            LogFormatter::new("{message"),
            Err(AppError::InvalidFormat(_))
        ));
        assert!(matches!(
            LogFormatter::new("message}"),
            Err(AppError::InvalidFormat(_))
        ));
    }
}
