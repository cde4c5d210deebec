//! Server configuration

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Base name of the optional config file (`predictor.toml`, `.yaml`, `.json`)
pub const CONFIG_FILE: &str = "predictor";
/// Environment variable prefix, e.g. `PREDICTOR_PORT=5001`
pub const ENV_PREFIX: &str = "PREDICTOR";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Append-only sample CSV
    #[serde(default = "default_samples_path")]
    pub samples_path: PathBuf,

    /// Externally maintained `date,totalEnergy` CSV
    #[serde(default = "default_daily_history_path")]
    pub daily_history_path: PathBuf,

    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Name attached to structured log events
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
}

fn default_bind_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_samples_path() -> PathBuf {
    PathBuf::from("samples.csv")
}

fn default_daily_history_path() -> PathBuf {
    PathBuf::from("daily_history.csv")
}

fn default_refresh_interval() -> u64 {
    60
}

fn default_instance_name() -> String {
    "energy-predictor".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            port: default_port(),
            samples_path: default_samples_path(),
            daily_history_path: default_daily_history_path(),
            refresh_interval_secs: default_refresh_interval(),
            instance_name: default_instance_name(),
        }
    }
}

impl ServerConfig {
    /// Load from the optional config file, then `PREDICTOR_*` variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(CONFIG_FILE).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        Ok(Self::from_config(config))
    }

    /// Deserialize a built config, falling back to defaults when it does
    /// not fit the expected shape
    pub fn from_config(config: config::Config) -> Self {
        config.try_deserialize().unwrap_or_else(|e| {
            warn!(error = %e, "Invalid configuration, using defaults");
            Self::default()
        })
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_sources() {
        let config = config::Config::builder().build().unwrap();
        let server = ServerConfig::from_config(config);
        assert_eq!(server, ServerConfig::default());
        assert_eq!(server.bind_addr(), "127.0.0.1:5000");
        assert_eq!(server.refresh_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_file_overrides_some_fields() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "port = 5055\nsamples_path = \"/var/lib/meter/samples.csv\"").unwrap();

        let config = config::Config::builder()
            .add_source(config::File::from(file.path()))
            .build()
            .unwrap();
        let server = ServerConfig::from_config(config);
        assert_eq!(server.port, 5055);
        assert_eq!(server.samples_path, PathBuf::from("/var/lib/meter/samples.csv"));
        assert_eq!(server.instance_name, "energy-predictor");
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let server = ServerConfig {
            refresh_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(server.refresh_interval(), Duration::from_secs(1));
    }
}
