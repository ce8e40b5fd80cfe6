//! Command-line configuration for the router binary
//!
//! The model registry, catalog location and admin keys come from the JSON config file; everything
//! about how this process runs comes from flags (or their environment variables).
use anyhow::anyhow;
use clap::{ArgAction, Parser};
use recsys_router::DEFAULT_API_PREFIX;
use recsys_router::client::PoolConfig;
use recsys_router::proxy::DEFAULT_REQUEST_TIMEOUT;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// The port on which the API server will listen.
    #[arg(short = 'p', long, env = "RECSYS_PORT", default_value_t = 3000)]
    pub port: u16,

    /// The JSON file holding the model registry, catalog location and admin keys.
    #[arg(short = 'f', long, env = "RECSYS_CONFIG")]
    pub config: PathBuf,

    /// Path prefix all API routes are mounted under.
    #[arg(long, env = "RECSYS_API_PREFIX", default_value = DEFAULT_API_PREFIX)]
    pub api_prefix: String,

    /// Upper bound (in milliseconds) on each call to a recommender backend or the catalog.
    #[arg(long, env = "RECSYS_REQUEST_TIMEOUT_MS", default_value_t = DEFAULT_REQUEST_TIMEOUT.as_millis() as u64)]
    pub request_timeout_ms: u64,

    /// The port on which the metrics server will listen.
    #[arg(long, default_value_t = 9090)]
    pub metrics_port: u16,

    /// Whether to enable the metrics endpoint (`--metrics false` turns it off).
    #[arg(short = 'm', long, env = "RECSYS_METRICS", default_value_t = true, action = ArgAction::Set)]
    pub metrics: bool,

    /// The prefix to use for metrics.
    #[arg(long, default_value = "recsys_router")]
    pub metrics_prefix: String,

    /// Maximum number of idle HTTP connections to keep alive per backend host.
    #[arg(long, default_value_t = 32)]
    pub pool_max_idle_per_host: usize,

    /// How long (in seconds) to keep idle HTTP connections alive.
    #[arg(long, default_value_t = 90)]
    pub pool_idle_timeout_secs: u64,
}

impl Config {
    pub fn validate(self) -> Result<Self, anyhow::Error> {
        if !self.config.exists() {
            return Err(anyhow!(
                "Config file '{}' does not exist",
                self.config.display()
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(anyhow!("--request-timeout-ms must be greater than zero"));
        }
        Ok(self)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn pool(&self) -> PoolConfig {
        PoolConfig {
            idle_timeout: Duration::from_secs(self.pool_idle_timeout_secs),
            max_idle_per_host: self.pool_max_idle_per_host,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse_from(["recsys-router", "--config", "models.json"]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.api_prefix, "/api/v1");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.pool().max_idle_per_host, 32);
        assert!(config.metrics);
    }

    #[test]
    fn test_metrics_can_be_disabled() {
        let config =
            Config::parse_from(["recsys-router", "-f", "models.json", "--metrics", "false"]);
        assert!(!config.metrics);

        let config = Config::parse_from(["recsys-router", "-f", "models.json", "-m", "true"]);
        assert!(config.metrics);
    }

    #[test]
    fn test_missing_config_file_fails_validation() {
        let config = Config::parse_from(["recsys-router", "-f", "/no/such/models.json"]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_zero_timeout_fails_validation() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = Config::parse_from([
            "recsys-router",
            "-f",
            file.path().to_str().unwrap(),
            "--request-timeout-ms",
            "0",
        ]);
        assert!(config.validate().is_err());
    }
}
