use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::field::{Field, Visit};
use tracing::{Event, Level};

use crate::context::{CorrelationContext, NO_REQUEST_ID};
use crate::error::AppError;

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Maps a tracing level; `critical` promotes ERROR events to CRITICAL.
    pub fn from_level(level: &Level, critical: bool) -> Self {
        match *level {
            Level::TRACE | Level::DEBUG => Severity::Debug,
            Level::INFO => Severity::Info,
            Level::WARN => Severity::Warning,
            Level::ERROR if critical => Severity::Critical,
            Level::ERROR => Severity::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" | "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" | "fatal" => Ok(Severity::Critical),
            _ => Err(AppError::InvalidLevel(s.to_string())),
        }
    }
}

/// Message or field value carried by a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    /// A JSON mapping, sequence or scalar.
    Structured(Value),
}

impl Payload {
    /// Text that parses as a JSON object or array becomes structured.
    ///
    /// So does the `Debug` rendering of a `serde_json::Value` mapping or
    /// sequence, which is what a `field = ?value` event field records.
    /// Prefer `field = %value` for JSON values; it records plain JSON text.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let trimmed = text.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(value @ (Value::Object(_) | Value::Array(_))) =
                serde_json::from_str::<Value>(&text)
            {
                return Payload::Structured(value);
            }
        }
        if let Some(value) = json_from_value_debug(trimmed) {
            return Payload::Structured(value);
        }
        Payload::Text(text)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Structured(_) => None,
        }
    }

    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            Payload::Text(_) => None,
            Payload::Structured(value) => Some(value),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Text(text) => f.write_str(text),
            Payload::Structured(value) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::from_text(value)
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::from_text(value)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Structured(value)
    }
}

/// One log call, as seen by the filter, the formatter and the sinks.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    pub name: String,
    pub message: Payload,
    pub fields: Vec<(String, Payload)>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub function: Option<String>,
    pub request_id: Option<String>,
}

impl LogRecord {
    pub fn new(severity: Severity, name: impl Into<String>, message: impl Into<Payload>) -> Self {
        Self {
            timestamp: Local::now(),
            severity,
            name: name.into(),
            message: message.into(),
            fields: Vec::new(),
            file: None,
            line: None,
            function: None,
            request_id: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Payload>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn with_location(
        mut self,
        file: impl Into<String>,
        line: u32,
        function: impl Into<String>,
    ) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self.function = Some(function.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Builds a record from a tracing event.
    ///
    /// An explicit `request_id` field wins over the ambient correlation id.
    pub fn from_event(event: &Event<'_>) -> Self {
        let metadata = event.metadata();
        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        let request_id = visitor
            .request_id
            .or_else(|| CorrelationContext::get().map(String::from));

        Self {
            timestamp: Local::now(),
            severity: Severity::from_level(metadata.level(), visitor.critical),
            name: metadata.target().to_string(),
            message: Payload::from_text(visitor.message.unwrap_or_default()),
            fields: visitor.fields,
            file: metadata.file().map(str::to_string),
            line: metadata.line(),
            function: metadata.module_path().map(str::to_string),
            request_id,
        }
    }

    pub fn request_id_or_sentinel(&self) -> &str {
        self.request_id.as_deref().unwrap_or(NO_REQUEST_ID)
    }
}

/// Rewrites `Object {"a": Number(1)}` style output back into JSON.
///
/// Strings that Rust escapes differently from JSON make the parse fail, and
/// the text is then left to the free text scan.
fn json_from_value_debug(rendered: &str) -> Option<Value> {
    if !(rendered.starts_with("Object {") || rendered.starts_with("Array [")) {
        return None;
    }

    let mut json = String::with_capacity(rendered.len());
    let mut chars = rendered.chars().peekable();
    let mut in_string = false;
    let mut open_wrappers = 0usize;

    while let Some(c) = chars.next() {
        if in_string {
            json.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        json.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                json.push(c);
            }
            ')' if open_wrappers > 0 => open_wrappers -= 1,
            c if c.is_ascii_alphabetic() => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if !next.is_ascii_alphanumeric() {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                match word.as_str() {
                    "Object" | "Array" if chars.peek() == Some(&' ') => {
                        chars.next();
                    }
                    "String" | "Number" | "Bool" if chars.peek() == Some(&'(') => {
                        chars.next();
                        open_wrappers += 1;
                    }
                    "Null" => json.push_str("null"),
                    // true/false and exponents such as `1e10`
                    _ => json.push_str(&word),
                }
            }
            _ => json.push(c),
        }
    }

    match serde_json::from_str::<Value>(&json) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

#[derive(Default)]
struct RecordVisitor {
    message: Option<String>,
    request_id: Option<String>,
    critical: bool,
    fields: Vec<(String, Payload)>,
}

impl RecordVisitor {
    fn push(&mut self, field: &Field, value: Payload) {
        let name = field.name();
        if name.starts_with("log.") {
            return;
        }
        self.fields.push((name.to_string(), value));
    }
}

impl Visit for RecordVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{:?}", value);
        match field.name() {
            "message" => self.message = Some(rendered),
            "request_id" => self.request_id = Some(rendered),
            _ => self.push(field, Payload::from_text(rendered)),
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            "request_id" => self.request_id = Some(value.to_string()),
            _ => self.push(field, Payload::from_text(value)),
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "critical" {
            self.critical = value;
        } else {
            self.push(field, Payload::Structured(Value::Bool(value)));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, Payload::Structured(Value::from(value)));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, Payload::Structured(Value::from(value)));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, Payload::Structured(Value::from(value)));
    }
}
