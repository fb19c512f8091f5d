//! Configuration management for the Radix client

use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// File read by [`load_config`] when present in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "radix.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    #[serde(default)]
    pub universe: UniverseSection,
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub pow: PowSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UniverseSection {
    #[serde(default = "default_magic")]
    pub magic: i32,
    #[serde(default = "default_universe_name")]
    pub name: String,
    /// RPC port assumed for peers reported without one.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for UniverseSection {
    fn default() -> Self {
        Self {
            magic: default_magic(),
            name: default_universe_name(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct NetworkSection {
    /// `host[:port]` entries.
    #[serde(default = "default_bootstrap_nodes")]
    pub bootstrap_nodes: Vec<String>,
    /// HTTP node finder; takes precedence over `bootstrap_nodes`.
    #[serde(default)]
    pub bootstrap_url: Option<String>,
    #[serde(default)]
    pub use_ssl: bool,
    #[serde(default = "default_close_delay_ms")]
    pub websocket_close_delay_ms: u64,
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_secs: u64,
    #[serde(default = "default_submission_timeout")]
    pub submission_timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_simultaneous_connections: usize,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            bootstrap_nodes: default_bootstrap_nodes(),
            bootstrap_url: None,
            use_ssl: false,
            websocket_close_delay_ms: default_close_delay_ms(),
            rpc_timeout_secs: default_rpc_timeout(),
            submission_timeout_secs: default_submission_timeout(),
            max_simultaneous_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PowSection {
    #[serde(default = "default_leading_zeros")]
    pub leading_zeros: u32,
}

impl Default for PowSection {
    fn default() -> Self {
        Self {
            leading_zeros: default_leading_zeros(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingSection {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_magic() -> i32 {
    // localnet
    -1332248574
}

fn default_universe_name() -> String {
    "localnet".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_bootstrap_nodes() -> Vec<String> {
    vec!["localhost:8080".to_string()]
}

fn default_close_delay_ms() -> u64 {
    5000
}

fn default_rpc_timeout() -> u64 {
    30
}

fn default_submission_timeout() -> u64 {
    60
}

fn default_max_connections() -> usize {
    1
}

fn default_leading_zeros() -> u32 {
    16
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl ClientConfig {
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Applies `RADIX_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(nodes) = var("RADIX_BOOTSTRAP_NODES") {
            self.network.bootstrap_nodes = nodes
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(magic) = var("RADIX_UNIVERSE_MAGIC") {
            self.universe.magic = magic
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("RADIX_UNIVERSE_MAGIC={magic}")))?;
        }
        if let Some(zeros) = var("RADIX_POW_LEADING_ZEROS") {
            self.pow.leading_zeros = zeros
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("RADIX_POW_LEADING_ZEROS={zeros}")))?;
        }
        if let Some(filter) = var("RADIX_LOG") {
            self.logging.filter = filter;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let network = &self.network;
        if network.rpc_timeout_secs == 0 {
            return Err(ConfigError::Invalid("network.rpc_timeout_secs must be positive".into()));
        }
        if network.submission_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "network.submission_timeout_secs must be positive".into(),
            ));
        }
        if network.bootstrap_url.is_none() && network.bootstrap_nodes.is_empty() {
            return Err(ConfigError::Invalid(
                "network.bootstrap_nodes or network.bootstrap_url must be set".into(),
            ));
        }
        if self.pow.leading_zeros > 256 {
            return Err(ConfigError::Invalid(format!(
                "pow.leading_zeros {} exceeds 256",
                self.pow.leading_zeros
            )));
        }
        Ok(())
    }
}

/// Reads `radix.toml` if present, otherwise defaults, then applies
/// environment overrides.
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    let config = if Path::new(DEFAULT_CONFIG_FILE).exists() {
        ClientConfig::from_file(DEFAULT_CONFIG_FILE)?
    } else {
        ClientConfig::default()
    };
    config.with_env_overrides()
}
