use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use super::errors::ConfigError;
use super::logging::LoggingConfig;
use super::quic::QuicConfig;
use super::tls::TlsPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "dnsperf.toml";

/// File-level configuration for probing runs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    /// Per-operation deadline in milliseconds, 0 disables it.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Upstream IPs to use instead of resolving the URL host.
    #[serde(default)]
    pub server_ips: Vec<IpAddr>,

    #[serde(default)]
    pub tls: TlsPolicy,

    #[serde(default)]
    pub quic: QuicConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            server_ips: Vec::new(),
            tls: TlsPolicy::default(),
            quic: QuicConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ProbeConfig {
    /// Priority order:
    /// 1. Explicitly provided path
    /// 2. dnsperf.toml in the current directory
    /// 3. Defaults
    pub fn load(path: Option<&str>, overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else if Path::new(DEFAULT_CONFIG_FILE).exists() {
            Self::from_file(DEFAULT_CONFIG_FILE)?
        } else {
            Self::default()
        };

        config.apply_cli_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(timeout_ms) = overrides.timeout_ms {
            self.timeout_ms = timeout_ms;
        }
        if !overrides.server_ips.is_empty() {
            self.server_ips = overrides.server_ips;
        }
        if overrides.insecure_skip_verify {
            self.tls.insecure_skip_verify = true;
        }
        if overrides.skip_common_name {
            self.tls.skip_common_name = true;
        }
        if let Some(port) = overrides.local_port {
            self.quic.local_port = Some(port);
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let (Some(min), Some(max)) = (self.tls.min_version, self.tls.max_version) {
            if min > max {
                return Err(ConfigError::Validation(format!(
                    "tls.min_version {} is above tls.max_version {}",
                    min, max
                )));
            }
        }
        if self.quic.allowed_versions.iter().any(|v| v.is_empty()) {
            return Err(ConfigError::Validation(
                "quic.allowed_versions must not contain empty entries".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Command-line overrides for configuration
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub timeout_ms: Option<u64>,
    pub server_ips: Vec<IpAddr>,
    pub insecure_skip_verify: bool,
    pub skip_common_name: bool,
    pub local_port: Option<u16>,
    pub log_level: Option<String>,
}

fn default_timeout_ms() -> u64 {
    10_000
}
