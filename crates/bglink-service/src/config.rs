//! Server configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Shortest allowed stale-check interval in seconds.
pub const MIN_STALE_CHECK_INTERVAL: u64 = 60;
/// Longest allowed stale-check interval in seconds.
pub const MAX_STALE_CHECK_INTERVAL: u64 = 3600;

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server settings.
    pub server: ServerConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Stale-data monitor settings.
    pub monitor: MonitorConfig,
    /// Vendor ingest settings.
    pub ingest: IngestConfig,
    /// Nightscout upload settings.
    pub nightscout: NightscoutConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Server bind address is valid (host:port format)
    /// - Broadcast buffer is non-zero
    /// - Storage path is not empty
    /// - Stale-check interval is within bounds (1 minute - 1 hour)
    /// - SGV limit, when set, is non-zero
    /// - Nightscout URL, when set, is http(s) and has an API secret
    ///
    /// # Example
    ///
    /// ```
    /// use bglink_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.monitor.validate());
        errors.extend(self.ingest.validate());
        errors.extend(self.nightscout.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind: String,
    /// Capacity of the fired-alert broadcast channel.
    pub broadcast_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            broadcast_buffer: 100,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push(ValidationError {
                field: "server.bind".to_string(),
                message: "bind address cannot be empty".to_string(),
            });
        } else {
            let parts: Vec<&str> = self.bind.rsplitn(2, ':').collect();
            if parts.len() != 2 {
                errors.push(ValidationError {
                    field: "server.bind".to_string(),
                    message: format!(
                        "invalid bind address '{}': expected format 'host:port'",
                        self.bind
                    ),
                });
            } else {
                let port_str = parts[0];
                match port_str.parse::<u16>() {
                    Ok(0) => {
                        errors.push(ValidationError {
                            field: "server.bind".to_string(),
                            message: "port cannot be 0".to_string(),
                        });
                    }
                    Err(_) => {
                        errors.push(ValidationError {
                            field: "server.bind".to_string(),
                            message: format!(
                                "invalid port '{}': must be a number 1-65535",
                                port_str
                            ),
                        });
                    }
                    Ok(_) => {}
                }
            }
        }

        // tokio's broadcast channel panics on zero capacity.
        if self.broadcast_buffer == 0 {
            errors.push(ValidationError {
                field: "server.broadcast_buffer".to_string(),
                message: "broadcast buffer must be at least 1".to_string(),
            });
        }

        errors
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: bglink_store::default_db_path(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.path".to_string(),
                message: "database path cannot be empty".to_string(),
            });
        }

        errors
    }
}

/// Stale-data monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between stale-data checks.
    pub stale_check_interval: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            stale_check_interval: 600,
        }
    }
}

impl MonitorConfig {
    /// Validate monitor configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.stale_check_interval < MIN_STALE_CHECK_INTERVAL {
            errors.push(ValidationError {
                field: "monitor.stale_check_interval".to_string(),
                message: format!(
                    "stale check interval {} is too short (minimum {} seconds)",
                    self.stale_check_interval, MIN_STALE_CHECK_INTERVAL
                ),
            });
        } else if self.stale_check_interval > MAX_STALE_CHECK_INTERVAL {
            errors.push(ValidationError {
                field: "monitor.stale_check_interval".to_string(),
                message: format!(
                    "stale check interval {} is too long (maximum {} seconds / 1 hour)",
                    self.stale_check_interval, MAX_STALE_CHECK_INTERVAL
                ),
            });
        }

        errors
    }
}

/// Vendor ingest configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Keep only the newest N CareLink entries per upload. Unset keeps all.
    pub sgv_limit: Option<usize>,
}

impl IngestConfig {
    /// Validate ingest configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.sgv_limit == Some(0) {
            errors.push(ValidationError {
                field: "ingest.sgv_limit".to_string(),
                message: "sgv limit must be at least 1 when set".to_string(),
            });
        }

        errors
    }
}

/// Nightscout upload configuration.
///
/// Upload is disabled unless `url` is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NightscoutConfig {
    /// Site base URL (e.g., "https://my-site.herokuapp.com").
    pub url: Option<String>,
    /// Plain API secret; hashed before it is sent.
    pub api_secret: Option<String>,
}

impl NightscoutConfig {
    /// Validate Nightscout configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let Some(url) = self.url.as_deref().filter(|url| !url.is_empty()) else {
            return errors;
        };

        if !url.starts_with("http://") && !url.starts_with("https://") {
            errors.push(ValidationError {
                field: "nightscout.url".to_string(),
                message: format!("invalid URL '{}': must start with http:// or https://", url),
            });
        }
        if self.api_secret.as_deref().is_none_or(str::is_empty) {
            errors.push(ValidationError {
                field: "nightscout.api_secret".to_string(),
                message: "API secret is required when a Nightscout URL is set".to_string(),
            });
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `server.bind`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bglink")
        .join("server.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(result: Result<(), ConfigError>) -> Vec<String> {
        match result {
            Err(ConfigError::Validation(errors)) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation errors, got {:?}", other),
        }
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.server.broadcast_buffer, 100);
        assert_eq!(config.monitor.stale_check_interval, 600);
        assert_eq!(config.ingest.sgv_limit, None);
        assert!(config.nightscout.url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        assert_eq!(config.path, bglink_store::default_db_path());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml = r#"
            [monitor]
            stale_check_interval = 120
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.monitor.stale_check_interval, 120);
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.ingest.sgv_limit, None);
    }

    #[test]
    fn test_config_full_toml() {
        let toml = r#"
            [server]
            bind = "0.0.0.0:9000"
            broadcast_buffer = 16

            [storage]
            path = "/data/bglink.db"

            [monitor]
            stale_check_interval = 300

            [ingest]
            sgv_limit = 288

            [nightscout]
            url = "https://ns.example.com"
            api_secret = "abcdefghijkl"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.server.broadcast_buffer, 16);
        assert_eq!(config.storage.path, PathBuf::from("/data/bglink.db"));
        assert_eq!(config.monitor.stale_check_interval, 300);
        assert_eq!(config.ingest.sgv_limit, Some(288));
        assert_eq!(config.nightscout.url.as_deref(), Some("https://ns.example.com"));
        assert_eq!(config.nightscout.api_secret.as_deref(), Some("abcdefghijkl"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("server.toml");

        let mut config = Config::default();
        config.server.bind = "0.0.0.0:9090".to_string();
        config.storage.path = PathBuf::from("/tmp/test.db");
        config.ingest.sgv_limit = Some(12);

        config.save(&config_path).unwrap();
        let loaded = Config::load_validated(&config_path).unwrap();

        assert_eq!(loaded.server.bind, "0.0.0.0:9090");
        assert_eq!(loaded.storage.path, PathBuf::from("/tmp/test.db"));
        assert_eq!(loaded.ingest.sgv_limit, Some(12));
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        std::fs::write(&config_path, "this is not valid { toml").unwrap();

        let result = Config::load(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_invalid_bind_addresses() {
        for bind in ["", "localhost", "127.0.0.1:0", "127.0.0.1:http"] {
            let mut config = Config::default();
            config.server.bind = bind.to_string();
            assert_eq!(fields(config.validate()), vec!["server.bind"], "{}", bind);
        }
    }

    #[test]
    fn test_validation_collects_every_error() {
        let mut config = Config::default();
        config.server.broadcast_buffer = 0;
        config.storage.path = PathBuf::new();
        config.monitor.stale_check_interval = 30;
        config.ingest.sgv_limit = Some(0);
        config.nightscout.url = Some("https://ns.example.com".to_string());

        assert_eq!(
            fields(config.validate()),
            vec![
                "server.broadcast_buffer",
                "storage.path",
                "monitor.stale_check_interval",
                "ingest.sgv_limit",
                "nightscout.api_secret",
            ]
        );
    }

    #[test]
    fn test_nightscout_validation() {
        let mut config = Config::default();
        config.nightscout.url = Some(String::new());
        assert!(config.validate().is_ok());

        config.nightscout.url = Some("ns.example.com".to_string());
        config.nightscout.api_secret = Some("abcdefghijkl".to_string());
        assert_eq!(fields(config.validate()), vec!["nightscout.url"]);

        config.nightscout.url = Some("http://localhost:1337".to_string());
        assert!(config.validate().is_ok());

        config.nightscout.api_secret = Some(String::new());
        assert_eq!(fields(config.validate()), vec!["nightscout.api_secret"]);
    }

    #[test]
    fn test_stale_check_interval_bounds() {
        let mut config = Config::default();
        config.monitor.stale_check_interval = MIN_STALE_CHECK_INTERVAL;
        assert!(config.validate().is_ok());
        config.monitor.stale_check_interval = MAX_STALE_CHECK_INTERVAL;
        assert!(config.validate().is_ok());
        config.monitor.stale_check_interval = MAX_STALE_CHECK_INTERVAL + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_error_display() {
        let mut config = Config::default();
        config.storage.path = PathBuf::new();
        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("storage.path: database path cannot be empty"));
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("bglink/server.toml"));
    }
}
