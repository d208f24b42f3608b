//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.
//!
//! Meter definitions live in the same file as `[[meters]]` tables.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::meter::Meter;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub namespace: NamespaceConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub meters: Vec<Meter>,
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8888
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl From<&ApiConfig> for crate::api::ApiConfig {
    fn from(config: &ApiConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            cors_origins: config.cors_origins.clone(),
        }
    }
}

/// Namespace configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NamespaceConfig {
    /// Namespace requests are served from
    #[serde(default = "default_namespace")]
    pub default: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            default: default_namespace(),
        }
    }
}

/// Aggregation backend configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendConfig {
    /// JSON file of pre-aggregated rows for the in-memory backend
    pub fixtures: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    /// Whether logs are emitted as JSON lines
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("meterscope").join("config.toml")),
            Some(PathBuf::from("/etc/meterscope/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply `METERSCOPE_*` overrides read through `var`
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // API overrides
        if let Some(host) = var("METERSCOPE_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = var("METERSCOPE_API_PORT") {
            match port.parse() {
                Ok(p) => self.api.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid METERSCOPE_API_PORT"),
            }
        }

        if let Some(namespace) = var("METERSCOPE_NAMESPACE") {
            self.namespace.default = namespace;
        }

        if let Some(fixtures) = var("METERSCOPE_FIXTURES") {
            self.backend.fixtures = Some(PathBuf::from(fixtures));
        }

        // Logging overrides
        if let Some(level) = var("METERSCOPE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("METERSCOPE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Meterscope Configuration
#
# Environment variables override these settings:
# - METERSCOPE_API_HOST
# - METERSCOPE_API_PORT
# - METERSCOPE_NAMESPACE
# - METERSCOPE_FIXTURES
# - METERSCOPE_LOG_LEVEL
# - METERSCOPE_LOG_FORMAT

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8888

# Allowed CORS origins (empty allows any origin)
cors_origins = []

[namespace]
# Namespace requests are served from
default = "default"

[backend]
# JSON file of pre-aggregated rows served by the in-memory backend
# fixtures = "/var/lib/meterscope/rows.json"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Meter definitions
#
# aggregation: SUM, COUNT, AVG, MIN, MAX, UNIQUE_COUNT
# windowSize:  MINUTE, HOUR, DAY, MONTH
[[meters]]
slug = "api_requests"
description = "API requests"
aggregation = "COUNT"
eventType = "request"
windowSize = "MINUTE"

[meters.groupBy]
method = "$.method"
path = "$.path"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meter::{MeterAggregation, WindowSize};
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.port, 8888);
        assert_eq!(config.namespace.default, "default");
        assert!(config.backend.fixtures.is_none());
        assert!(!config.logging.is_json());
        assert!(config.meters.is_empty());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[api]
port = 9000

[namespace]
default = "acme"

[logging]
format = "json"

[[meters]]
slug = "tokens"
aggregation = "SUM"
eventType = "prompt"
windowSize = "HOUR"
valueProperty = "$.tokens"

[meters.groupBy]
model = "$.model"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.namespace.default, "acme");
        assert!(config.logging.is_json());

        let meter = &config.meters[0];
        assert_eq!(meter.slug, "tokens");
        assert_eq!(meter.aggregation, MeterAggregation::Sum);
        assert_eq!(meter.window_size, WindowSize::Hour);
        assert_eq!(meter.value_property.as_deref(), Some("$.tokens"));
        assert!(meter.declares_group_by("model"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/meterscope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[api\nport = ").unwrap();
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("METERSCOPE_API_PORT", "7000"),
            ("METERSCOPE_NAMESPACE", "tenant-a"),
            ("METERSCOPE_FIXTURES", "/tmp/rows.json"),
            ("METERSCOPE_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.api.port, 7000);
        assert_eq!(config.namespace.default, "tenant-a");
        assert_eq!(config.backend.fixtures, Some(PathBuf::from("/tmp/rows.json")));
        assert!(config.logging.is_json());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_port_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|name| (name == "METERSCOPE_API_PORT").then(|| "http".to_string()));
        assert_eq!(config.api.port, 8888);
    }

    #[test]
    fn test_default_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.meters.len(), 1);
        assert_eq!(config.meters[0].group_by.len(), 2);
        assert!(config.meters[0].validate().is_ok());
    }
}
