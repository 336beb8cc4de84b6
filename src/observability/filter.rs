use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::OnceLock;

use super::record::{LogRecord, Payload};

/// Replacement written in place of every sensitive value.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Field names whose values are always masked, compared case-insensitively.
pub const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "token",
    "secret",
    "api_key",
    "apikey",
    "access_token",
    "refresh_token",
    "private_key",
    "client_secret",
    "authorization",
    "email",
    "phone",
];

/// A named free-text matcher and what its matches become.
#[derive(Debug)]
pub struct SensitivePattern {
    pub name: &'static str,
    pub regex: Regex,
    pub replacement: &'static str,
}

static PATTERNS: OnceLock<Vec<SensitivePattern>> = OnceLock::new();

/// Returns the fixed free-text pattern registry.
pub fn sensitive_patterns() -> &'static [SensitivePattern] {
    PATTERNS.get_or_init(|| {
        // The sources are literals; failing to compile them is a programming error.
        let compile = |name, source: &str, replacement| SensitivePattern {
            name,
            regex: Regex::new(source).expect("sensitive pattern must compile"),
            replacement,
        };
        vec![
            compile(
                "assignment",
                // Bare, JSON-quoted and Python-quoted keys. Values may be quoted or
                // wrapped the way serde_json's Debug output wraps strings.
                r#"(?i)(["']?)\b(password|passwd|pwd|secret|client[_-]?secret|access[_-]?token|refresh[_-]?token|api[_-]?key|private[_-]?key|token)\b(["']?)(\s*[:=]\s*)(String\("(?:[^"\\]|\\.)*"\)|\w+\([^()]*\)|"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|[^\s,;&"'(){}\[\]]+)"#,
                "${1}${2}${3}${4}[REDACTED]",
            ),
            compile(
                "bearer",
                r"(?i)\bbearer\s+[A-Za-z0-9\-._~+/]+=*",
                "Bearer [REDACTED]",
            ),
            compile(
                "email",
                r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
                REDACTION_MARKER,
            ),
            compile(
                "phone",
                r"(?:\+\d{1,3}[\s.-]?)?(?:\(\d{3}\)|\b\d{3})[\s.-]?\d{3}[\s.-]\d{4}\b",
                REDACTION_MARKER,
            ),
        ]
    })
}

/// Masks sensitive values in a record before it is formatted.
///
/// Structured payloads are walked recursively: values under a sensitive key
/// are replaced whole, whatever their type, and string leaves get the free
/// text scan. Plain text messages only get the free text scan. Record fields
/// are treated the same way, independently of the message.
#[derive(Debug, Clone)]
pub struct SensitiveDataFilter {
    keys: Vec<String>,
}

impl Default for SensitiveDataFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl SensitiveDataFilter {
    pub fn new() -> Self {
        Self {
            keys: SENSITIVE_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Redacts the record in place. Always keeps the record.
    pub fn filter(&self, record: &mut LogRecord) -> bool {
        self.redact_payload(&mut record.message);
        for (key, value) in record.fields.iter_mut() {
            if self.is_sensitive_key(key) {
                *value = Payload::Text(REDACTION_MARKER.to_string());
            } else {
                self.redact_payload(value);
            }
        }
        true
    }

    pub fn is_sensitive_key(&self, key: &str) -> bool {
        let normalized = key.trim().to_lowercase().replace('-', "_");
        self.keys.iter().any(|k| *k == normalized)
    }

    pub fn redact_payload(&self, payload: &mut Payload) {
        match payload {
            Payload::Text(text) => self.redact_string(text),
            Payload::Structured(value) => self.redact_value(value),
        }
    }

    pub fn redact_value(&self, value: &mut Value) {
        match value {
            Value::Object(map) => {
                for (key, entry) in map.iter_mut() {
                    if self.is_sensitive_key(key) {
                        *entry = Value::String(REDACTION_MARKER.to_string());
                    } else {
                        self.redact_value(entry);
                    }
                }
            }
            Value::Array(items) => {
                for item in items.iter_mut() {
                    self.redact_value(item);
                }
            }
            Value::String(text) => self.redact_string(text),
            _ => {}
        }
    }

    /// Applies every free-text pattern, borrowing when nothing matched.
    pub fn redact_text<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut current = Cow::Borrowed(text);
        for pattern in sensitive_patterns() {
            let replaced = match pattern.regex.replace_all(&current, pattern.replacement) {
                Cow::Owned(replaced) => Some(replaced),
                Cow::Borrowed(_) => None,
            };
            if let Some(replaced) = replaced {
                current = Cow::Owned(replaced);
            }
        }
        current
    }

    fn redact_string(&self, text: &mut String) {
        let redacted = match self.redact_text(text) {
            Cow::Owned(redacted) => Some(redacted),
            Cow::Borrowed(_) => None,
        };
        if let Some(redacted) = redacted {
            *text = redacted;
        }
    }
}
