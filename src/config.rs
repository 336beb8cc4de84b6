use serde::Deserialize;

use crate::client::ClientConfig;
use crate::observability::LogConfig;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationSettings,
    #[serde(default)]
    pub logging: LogConfig,
    #[serde(default)]
    pub correlation: CorrelationSettings,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub demo: DemoSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorrelationSettings {
    /// Inbound header adopted as the correlation id and echoed back.
    pub header_name: String,
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        Self {
            header_name: "X-Request-ID".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DemoSettings {
    /// Service called by `/proxy`; defaults to this service itself.
    pub downstream_url: Option<String>,
    pub slow_delay_ms: u64,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            downstream_url: None,
            slow_delay_ms: 2000,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        builder.build()?.try_deserialize()
    }

    /// Reads settings from a TOML document only.
    pub fn from_toml(document: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(document, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Client settings with the correlation header applied.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            header_name: self.correlation.header_name.clone(),
            ..self.client.clone()
        }
    }

    pub fn downstream_url(&self) -> String {
        self.demo.downstream_url.clone().unwrap_or_else(|| {
            format!("http://{}:{}", self.application.host, self.application.port)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.application.port, 8000);
        assert_eq!(settings.correlation.header_name, "X-Request-ID");
        assert_eq!(settings.logging.backup_count, 5);
        assert_eq!(settings.downstream_url(), "http://127.0.0.1:8000");
    }

    #[test]
    fn test_logging_section() {
        let settings = Settings::from_toml(
            r#"
            [logging]
            name = "example_service"
            level = "debug"
            log_dir = "./logs"
            max_bytes = 5242880
            backup_count = 3
            log_to_console = false

            [correlation]
            header_name = "X-Correlation-ID"
            "#,
        )
        .unwrap();

        assert_eq!(settings.logging.name, "example_service");
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.max_bytes, 5 * 1024 * 1024);
        assert_eq!(settings.logging.backup_count, 3);
        assert!(!settings.logging.log_to_console);
        assert_eq!(settings.client_config().header_name, "X-Correlation-ID");
    }
}
