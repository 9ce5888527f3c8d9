//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `shutterlink.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use serde::Deserialize;

use shutterlink_adapter_ble::BleConfig;
use shutterlink_app::config::EngineConfig;
use shutterlink_app::services::command_relay::RelayPaths;
use shutterlink_domain::camera::LocalIdentity;
use shutterlink_domain::relay::{COMMAND_PATH, RESPONSE_PATH};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Protocol and reconnection timings.
    pub engine: EngineConfig,
    /// Host BLE adapter selection.
    pub ble: BleConfig,
    /// Fallback identity announced to the camera.
    pub identity: IdentityConfig,
    /// Companion-device relay.
    pub relay: RelayConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Name sent during pairing until one is stored.
    pub device_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub enabled: bool,
    /// Path commands arrive on.
    pub command_path: String,
    /// Path responses are sent on.
    pub response_path: String,
    /// Messages buffered per path.
    pub capacity: usize,
}

impl Config {
    /// Load configuration from `shutterlink.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if
    /// the resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("shutterlink.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SHUTTERLINK_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("SHUTTERLINK_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("SHUTTERLINK_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Ok(val) = std::env::var("SHUTTERLINK_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("SHUTTERLINK_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("SHUTTERLINK_DEVICE_NAME") {
            self.identity.device_name = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.identity.device_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "identity.device_name must not be empty".to_string(),
            ));
        }
        let engine = &self.engine;
        for (name, value) in [
            ("engine.connect_timeout_ms", engine.connect_timeout_ms),
            ("engine.passive_poll_interval_ms", engine.passive_poll_interval_ms),
            ("engine.active_scan_window_ms", engine.active_scan_window_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation(format!("{name} must be non-zero")));
            }
        }
        if self.relay.capacity == 0 {
            return Err(ConfigError::Validation(
                "relay.capacity must be non-zero".to_string(),
            ));
        }
        for path in [&self.relay.command_path, &self.relay.response_path] {
            if !path.starts_with('/') {
                return Err(ConfigError::Validation(format!(
                    "relay path {path:?} must start with '/'"
                )));
            }
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    /// The fallback local identity.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when the device name is blank.
    pub fn local_identity(&self) -> Result<LocalIdentity, ConfigError> {
        LocalIdentity::new(self.identity.device_name.clone())
            .map_err(|err| ConfigError::Validation(err.to_string()))
    }
}

impl RelayConfig {
    #[must_use]
    pub fn paths(&self) -> RelayPaths {
        RelayPaths {
            command: self.command_path.clone(),
            response: self.response_path.clone(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:shutterlink.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "shutterlinkd=info,shutterlink=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            device_name: "shutterlink".to_string(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command_path: COMMAND_PATH.to_string(),
            response_path: RESPONSE_PATH.to_string(),
            capacity: 16,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
