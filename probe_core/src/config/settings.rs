use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Directory scanned for `*.yaml` probe files.
    pub config_dir: PathBuf,
    /// Used by probe files that do not set `global.check_interval`.
    pub default_check_interval_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("/config"),
            default_check_interval_seconds: 60,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?);

        if std::path::Path::new("config.toml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        builder = builder.add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        app_config.validate()?;

        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port cannot be 0".to_string()));
        }

        if self.server.host.is_empty() {
            return Err(ConfigError::Message("Server host cannot be empty".to_string()));
        }

        if self.monitoring.config_dir.as_os_str().is_empty() {
            return Err(ConfigError::Message(
                "Probe config directory cannot be empty".to_string(),
            ));
        }

        if self.monitoring.default_check_interval_seconds == 0 {
            return Err(ConfigError::Message(
                "Default check interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Applies a `host:port` listen address given on the command line.
    ///
    /// A bare `:port` keeps the configured host, mirroring the usual listen flag shape.
    pub fn apply_listen_address(&mut self, listen: &str) -> Result<(), ConfigError> {
        let (host, port) = listen.rsplit_once(':').ok_or_else(|| {
            ConfigError::Message(format!("Invalid listen address '{}': expected host:port", listen))
        })?;

        let port: u16 = port.parse().map_err(|_| {
            ConfigError::Message(format!("Invalid port in listen address '{}'", listen))
        })?;

        if !host.is_empty() {
            self.server.host = host.trim_start_matches('[').trim_end_matches(']').to_string();
        }
        self.server.port = port;

        self.validate()
    }

    pub fn default_check_interval(&self) -> Duration {
        Duration::from_secs(self.monitoring.default_check_interval_seconds)
    }

    pub fn bind_address(&self) -> String {
        if self.server.host.contains(':') {
            format!("[{}]:{}", self.server.host, self.server.port)
        } else {
            format!("{}:{}", self.server.host, self.server.port)
        }
    }
}
