//! Exporter configuration file.
//!
//! Every section and field is optional; missing values take the
//! defaults below. Command-line flags are applied on top, see
//! [`super::Cli`].

use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use crate::metrics::MAX_AGE_BUCKETS;

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Listen address is neither `:port` nor a resolvable `host:port`.
    #[error("invalid listen address {0:?}")]
    InvalidListenAddress(String),
    /// Generator interval is zero.
    #[error("generator interval must be at least 1 second")]
    InvalidInterval,
    /// Summary window length or bucket count out of range.
    #[error("invalid summary window: {0}")]
    InvalidSummaryWindow(String),
    /// Config file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// Config file is not valid TOML for this format.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on. A leading `:` means all interfaces.
    pub listen_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: ":8080".to_string(),
        }
    }
}

impl ServerConfig {
    /// Resolves the listen address to a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_listen_address(&self.listen_address)
    }
}

/// Background generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Seconds between generator iterations.
    pub interval_secs: u64,
    /// Seed for reproducible samples; OS entropy when unset.
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    /// Interval between generator iterations.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Metric declaration parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Label value of the `test1` demo gauge.
    pub demo_arg: String,
    /// Window covered by summary quantiles, in seconds.
    pub summary_max_age_secs: u64,
    /// Number of rotating buckets in the summary window.
    pub summary_age_buckets: u32,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            demo_arg: "hello".to_string(),
            summary_max_age_secs: 600,
            summary_age_buckets: 5,
        }
    }
}

impl MetricsConfig {
    /// Window covered by summary quantiles.
    pub fn summary_max_age(&self) -> Duration {
        Duration::from_secs(self.summary_max_age_secs)
    }
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FileConfig {
    /// `[server]` section.
    #[serde(default)]
    pub server: ServerConfig,
    /// `[generator]` section.
    #[serde(default)]
    pub generator: GeneratorConfig,
    /// `[metrics]` section.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates all sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.socket_addr()?;
        if self.generator.interval_secs == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        if self.metrics.summary_max_age_secs == 0 {
            return Err(ConfigError::InvalidSummaryWindow(
                "max age must be positive".to_string(),
            ));
        }
        let buckets = self.metrics.summary_age_buckets;
        if buckets == 0 || buckets > MAX_AGE_BUCKETS {
            return Err(ConfigError::InvalidSummaryWindow(format!(
                "age buckets must be between 1 and {}, got {}",
                MAX_AGE_BUCKETS, buckets
            )));
        }
        Ok(())
    }
}

/// Parses `host:port`, `[v6]:port` or `:port`.
///
/// `:port` binds every IPv4 interface (`0.0.0.0`) only; use `[::]:port`
/// to listen on IPv6. Host names resolve to their first address.
pub fn parse_listen_address(addr: &str) -> Result<SocketAddr, ConfigError> {
    let invalid = || ConfigError::InvalidListenAddress(addr.to_string());

    if let Some(port) = addr.strip_prefix(':') {
        let port: u16 = port.parse().map_err(|_| invalid())?;
        return Ok(SocketAddr::from(([0, 0, 0, 0], port)));
    }
    if let Ok(socket) = addr.parse::<SocketAddr>() {
        return Ok(socket);
    }
    addr.to_socket_addrs()
        .map_err(|_| invalid())?
        .next()
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = FileConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.socket_addr().unwrap().port(), 8080);
        assert_eq!(config.generator.interval(), Duration::from_secs(5));
        assert_eq!(config.metrics.demo_arg, "hello");
    }

    #[test]
    fn test_listen_address_forms() {
        assert_eq!(
            parse_listen_address(":9100").unwrap(),
            SocketAddr::from(([0, 0, 0, 0], 9100))
        );
        assert_eq!(
            parse_listen_address("127.0.0.1:8080").unwrap(),
            SocketAddr::from(([127, 0, 0, 1], 8080))
        );
        assert!(parse_listen_address(":9100").unwrap().is_ipv4());
        assert!(parse_listen_address("[::1]:8080").unwrap().is_ipv6());
        assert_eq!(
            parse_listen_address("[::]:9100").unwrap(),
            SocketAddr::from(([0u16; 8], 9100))
        );
        assert!(matches!(
            parse_listen_address(":notaport"),
            Err(ConfigError::InvalidListenAddress(_))
        ));
        assert!(parse_listen_address("8080").is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = FileConfig::from_toml_str(
            r#"
            [generator]
            seed = 42

            [metrics]
            demo_arg = "world"
            "#,
        )
        .unwrap();

        assert_eq!(config.generator.seed, Some(42));
        assert_eq!(config.generator.interval_secs, 5);
        assert_eq!(config.metrics.demo_arg, "world");
        assert_eq!(config.metrics.summary_age_buckets, 5);
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_zero_interval_invalid() {
        let result = FileConfig::from_toml_str("[generator]\ninterval_secs = 0\n");
        assert!(matches!(result, Err(ConfigError::InvalidInterval)));
    }

    #[test]
    fn test_zero_age_buckets_invalid() {
        let result = FileConfig::from_toml_str("[metrics]\nsummary_age_buckets = 0\n");
        assert!(matches!(result, Err(ConfigError::InvalidSummaryWindow(_))));
    }

    #[test]
    fn test_age_buckets_capped() {
        let result = FileConfig::from_toml_str("[metrics]\nsummary_age_buckets = 1000000\n");
        assert!(matches!(result, Err(ConfigError::InvalidSummaryWindow(_))));

        let config = FileConfig::from_toml_str(&format!(
            "[metrics]\nsummary_age_buckets = {}\n",
            MAX_AGE_BUCKETS
        ))
        .unwrap();
        assert_eq!(config.metrics.summary_age_buckets, MAX_AGE_BUCKETS);
    }

    #[test]
    fn test_malformed_file_rejected() {
        let result = FileConfig::from_toml_str("[server\nlisten_address = ");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_missing_file_rejected() {
        let result = FileConfig::from_file("/nonexistent/exporter-demo.toml");
        assert!(matches!(result, Err(ConfigError::FileReadError(_))));
    }
}
