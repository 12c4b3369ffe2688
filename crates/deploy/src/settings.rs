//! Run settings, persisted as `Rollout.toml`.

use std::{collections::BTreeMap, path::Path, path::PathBuf, time::Duration};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{DeployError, NetworkConfig};

/// The default name for the rollout settings file.
pub const SETTINGS_FILENAME: &str = "Rollout.toml";

/// Default number of retries after a nonce collision.
pub const DEFAULT_MAX_RETRIES: u32 = 20;

/// Default pause between two attempts after a nonce collision.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

/// JSON-RPC client tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcSettings {
    /// Timeout applied to every single HTTP request.
    pub request_timeout_secs: u64,
    /// Interval between two `eth_getTransactionReceipt` polls.
    pub poll_interval_ms: u64,
    /// How long to wait for a receipt before giving up.
    pub receipt_timeout_secs: u64,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            poll_interval_ms: 2_000,
            receipt_timeout_secs: 600,
        }
    }
}

/// Settings for a deployment run.
///
/// Every field has a default so a partial `Rollout.toml` is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory searched for compiled contract artifacts.
    pub artifacts_dir: PathBuf,
    /// Root directory of the deployment ledgers, one sub-directory per task.
    pub ledger_dir: PathBuf,
    /// Deployer account. Defaults to the node's first unlocked account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployer: Option<Address>,
    /// Owner of freshly deployed proxy admins. Defaults to the deployer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_admin_owner: Option<Address>,
    /// Retries allowed after nonce collisions, per deployment.
    pub max_retries: u32,
    /// Fixed pause between two attempts.
    pub retry_delay_ms: u64,
    /// Pre-flight gas estimation before each deployment.
    pub estimate_gas: bool,
    /// Gas price override in wei, replaces `eth_gasPrice`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<u64>,
    /// API key of the network's block explorer, enables verification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_api_key: Option<String>,
    /// JSON-RPC endpoint overrides keyed by network name.
    pub rpc_urls: BTreeMap<String, String>,
    pub rpc: RpcSettings,
    /// Custom networks, or replacements for the built-in ones.
    pub networks: BTreeMap<String, NetworkConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("artifacts"),
            ledger_dir: PathBuf::from("deployments"),
            deployer: None,
            proxy_admin_owner: None,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            estimate_gas: true,
            gas_price: None,
            explorer_api_key: None,
            rpc_urls: BTreeMap::new(),
            rpc: RpcSettings::default(),
            networks: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Save the settings to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize settings to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write settings to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Settings saved");
        Ok(())
    }

    /// Load the settings from a TOML file, or from `Rollout.toml` inside a directory.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Settings file or directory not found: {}", path.display());
        }

        let settings_path = if path.is_dir() {
            path.join(SETTINGS_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&settings_path)
            .context(format!("Failed to read settings from {}", settings_path.display()))?;
        let settings: Self =
            toml::from_str(&content).context("Failed to parse settings file as TOML")?;
        tracing::info!(path = %settings_path.display(), "Settings loaded");
        Ok(settings)
    }

    /// Resolve and validate the configuration of `network`.
    ///
    /// Networks declared in the settings shadow the built-in tables.
    pub fn network(&self, network: &str) -> Result<NetworkConfig, DeployError> {
        let config = match self.networks.get(network) {
            Some(config) => config.clone(),
            None => NetworkConfig::for_network(network)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// JSON-RPC endpoint for `network`, honouring the overrides.
    pub fn rpc_url<'a>(&'a self, network: &'a NetworkConfig) -> &'a str {
        self.rpc_urls
            .get(&network.name)
            .map(String::as_str)
            .unwrap_or(&network.rpc_url)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
