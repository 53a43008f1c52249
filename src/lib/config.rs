use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use alloy_primitives::Address;
use serde::Deserialize;

use crate::sync::DEFAULT_CALL_TIMEOUT;

/// Top-level configuration loaded from TOML.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub store: StoreConfig,
    /// Required when any mint gate is configured.
    pub chain: Option<ChainConfig>,
    /// Campaign → deployed mint gate contract.
    #[serde(default)]
    pub mint_gates: Vec<MintGateConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Where campaign records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    File,
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Directory for JSON campaign records. Required for the file backend.
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    /// Owner key of the mint gate contracts. Without it root pushes and
    /// mints are refused; reads still work.
    pub admin_private_key: Option<String>,
    /// Upper bound for a single chain call including receipt wait
    /// (e.g. "2m", "90s"). Parsed via humantime.
    #[serde(with = "humantime_serde", default = "default_call_timeout")]
    pub call_timeout: Duration,
}

fn default_call_timeout() -> Duration {
    DEFAULT_CALL_TIMEOUT
}

#[derive(Debug, Clone, Deserialize)]
pub struct MintGateConfig {
    pub campaign: String,
    pub address: Address,
}

/// Errors from config loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppConfig {
    /// Load and validate a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.backend == StoreBackend::File && self.store.data_dir.is_none() {
            return Err(ConfigError::Validation(
                "store.data_dir required for the file backend".into(),
            ));
        }

        if !self.mint_gates.is_empty() && self.chain.is_none() {
            return Err(ConfigError::Validation(
                "[chain] section required when mint_gates are configured".into(),
            ));
        }

        if let Some(chain) = &self.chain {
            if chain.rpc_url.trim().is_empty() {
                return Err(ConfigError::Validation("chain.rpc_url must not be empty".into()));
            }
            if chain
                .admin_private_key
                .as_deref()
                .is_some_and(|k| k.trim().is_empty())
            {
                return Err(ConfigError::Validation(
                    "chain.admin_private_key must not be empty when present".into(),
                ));
            }
            if chain.call_timeout.is_zero() {
                return Err(ConfigError::Validation(
                    "chain.call_timeout must be greater than zero".into(),
                ));
            }
        }

        let mut seen = HashSet::new();
        for gate in &self.mint_gates {
            if !seen.insert(gate.campaign.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "campaign {} has more than one mint gate",
                    gate.campaign
                )));
            }
            if gate.address.is_zero() {
                return Err(ConfigError::Validation(format!(
                    "campaign {}: mint gate address must not be zero",
                    gate.campaign
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
listen_addr = "0.0.0.0:9000"

[store]
backend = "file"
data_dir = "./data/campaigns"

[chain]
rpc_url = "https://rpc.sepolia.org"
admin_private_key = "0xdead000000000000000000000000000000000000000000000000000000000001"
call_timeout = "90s"

[[mint_gates]]
campaign = "ethglobal-2024"
address = "0x1234567890123456789012345678901234567890"
"#;
        let config = AppConfig::from_toml(toml).unwrap();
        assert_eq!(config.server.listen_addr.port(), 9000);
        assert_eq!(config.store.backend, StoreBackend::File);
        assert_eq!(
            config.chain.as_ref().unwrap().call_timeout,
            Duration::from_secs(90)
        );
        assert_eq!(config.mint_gates[0].campaign, "ethglobal-2024");
    }

    #[test]
    fn test_minimal_memory_config_uses_defaults() {
        let config = AppConfig::from_toml("[store]\nbackend = \"memory\"\n").unwrap();
        assert_eq!(config.server.listen_addr, default_listen_addr());
        assert!(config.chain.is_none());
        assert!(config.mint_gates.is_empty());
    }

    #[test]
    fn test_default_call_timeout() {
        let toml = r#"
[store]
backend = "memory"

[chain]
rpc_url = "http://127.0.0.1:8545"
"#;
        let config = AppConfig::from_toml(toml).unwrap();
        assert_eq!(config.chain.unwrap().call_timeout, DEFAULT_CALL_TIMEOUT);
    }

    #[test]
    fn test_file_backend_needs_data_dir() {
        let err = AppConfig::from_toml("[store]\nbackend = \"file\"\n").unwrap_err();
        assert!(err.to_string().contains("data_dir required"));
    }

    #[test]
    fn test_gates_need_chain() {
        let toml = r#"
[store]
backend = "memory"

[[mint_gates]]
campaign = "pop"
address = "0x1234567890123456789012345678901234567890"
"#;
        let err = AppConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("[chain] section required"));
    }

    #[test]
    fn test_duplicate_gate_rejected() {
        let toml = r#"
[store]
backend = "memory"

[chain]
rpc_url = "http://127.0.0.1:8545"

[[mint_gates]]
campaign = "pop"
address = "0x1234567890123456789012345678901234567890"

[[mint_gates]]
campaign = "pop"
address = "0x2234567890123456789012345678901234567890"
"#;
        let err = AppConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("more than one mint gate"));
    }

    #[test]
    fn test_unknown_backend_is_parse_error() {
        let err = AppConfig::from_toml("[store]\nbackend = \"firestore\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
