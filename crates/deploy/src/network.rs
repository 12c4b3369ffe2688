//! Per-network address tables.
//!
//! A [`NetworkConfig`] is resolved once per run and handed to the orchestrator by value,
//! nothing in the crate reads network data from global state.
//!
//! NOTE: `oracle_tokens` and `oracles` are paired by position. Both lists must have the
//! same length and the same ordering, [`NetworkConfig::validate`] enforces the former.

use std::collections::BTreeMap;

use alloy_core::primitives::{Address, U256, address};
use serde::{Deserialize, Serialize};

use crate::DeployError;

/// Minimum native liquidity (in wei) a pool needs before the price getter trusts it.
pub const DEFAULT_NATIVE_LIQUIDITY_THRESHOLD: u128 = 1_000_000_000_000_000_000;

/// AMM protocols the price getter contracts read from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum AmmProtocol {
    UniV2,
    UniV3,
    Algebra,
    Solidly,
    Xfai,
}

/// Static deployment inputs for one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network name, used in ledger file names.
    pub name: String,
    pub chain_id: u64,
    /// Default JSON-RPC endpoint, overridable from the settings file.
    pub rpc_url: String,
    /// Etherscan-compatible API endpoint used for source verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer_api_url: Option<String>,
    /// Wrapped native token (WBNB, WETH, WMATIC...).
    pub wrapped_native: Address,
    /// Factory address per AMM protocol. Missing protocols are passed as the zero address.
    #[serde(default)]
    pub factories: BTreeMap<AmmProtocol, Address>,
    #[serde(default)]
    pub stable_usd_tokens: Vec<Address>,
    #[serde(default)]
    pub oracle_tokens: Vec<Address>,
    #[serde(default)]
    pub oracles: Vec<Address>,
    pub native_liquidity_threshold: U256,
    /// Pre-existing proxy admin to reuse for upgradeable deployments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_admin: Option<Address>,
}

impl NetworkConfig {
    /// Look up one of the built-in networks.
    pub fn for_network(network: &str) -> Result<Self, DeployError> {
        let config = match network {
            "bsc" | "bsc-fork" => Self::bsc(network),
            "polygon" => Self::polygon(),
            "mainnet" | "ethereum" | "eth" => Self::mainnet(network),
            "arbitrum" => Self::arbitrum(),
            "telos" => Self::telos(),
            _ => return Err(DeployError::UnsupportedNetwork(network.to_string())),
        };

        tracing::debug!(network, chain_id = config.chain_id, "Resolved network configuration");
        Ok(config)
    }

    /// Names accepted by [`NetworkConfig::for_network`].
    pub fn builtin_names() -> &'static [&'static str] {
        &[
            "bsc", "bsc-fork", "polygon", "mainnet", "ethereum", "eth", "arbitrum", "telos",
        ]
    }

    /// Reject configurations the contracts cannot be constructed from.
    pub fn validate(&self) -> Result<(), DeployError> {
        if self.oracle_tokens.len() != self.oracles.len() {
            return Err(DeployError::InvalidNetworkConfig {
                network: self.name.clone(),
                reason: format!(
                    "{} oracle tokens but {} oracles, the lists are paired by position",
                    self.oracle_tokens.len(),
                    self.oracles.len()
                ),
            });
        }
        Ok(())
    }

    /// Factory for `protocol`, or the zero address when the network has none.
    pub fn factory(&self, protocol: AmmProtocol) -> Address {
        self.factories
            .get(&protocol)
            .copied()
            .unwrap_or(Address::ZERO)
    }

    /// Oracle tokens zipped with their oracle feeds.
    pub fn oracle_pairs(&self) -> impl Iterator<Item = (Address, Address)> + '_ {
        self.oracle_tokens
            .iter()
            .copied()
            .zip(self.oracles.iter().copied())
    }

    fn bsc(name: &str) -> Self {
        let fork = name == "bsc-fork";
        Self {
            name: name.to_string(),
            chain_id: 56,
            rpc_url: if fork {
                "http://127.0.0.1:8545".to_string()
            } else {
                "https://binance.llamarpc.com".to_string()
            },
            explorer_api_url: Some("https://api.bscscan.com/api".to_string()),
            wrapped_native: address!("bb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c"),
            factories: BTreeMap::from([
                (
                    AmmProtocol::UniV2,
                    address!("0841BD0B734E4F5853f0dD8d7Ea041c241fb0Da6"),
                ),
                (
                    AmmProtocol::UniV3,
                    address!("7Bc382DdC5928964D7af60e7e2f6299A1eA6F48d"),
                ),
                (
                    AmmProtocol::Algebra,
                    address!("306F06C147f064A010530292A1EB6737c3e378e4"),
                ),
            ]),
            stable_usd_tokens: vec![
                address!("e9e7CEA3DedcA5984780Bafc599bD69ADd087D56"),
                address!("8AC76a51cc950d9822D68b83fE1Ad97B32Cd580d"),
                address!("55d398326f99059fF775485246999027B3197955"),
            ],
            oracle_tokens: vec![
                address!("bb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c"),
                address!("e9e7CEA3DedcA5984780Bafc599bD69ADd087D56"),
                address!("8AC76a51cc950d9822D68b83fE1Ad97B32Cd580d"),
                address!("55d398326f99059fF775485246999027B3197955"),
            ],
            // https://docs.chain.link/data-feeds/price-feeds/addresses?network=bnb-chain
            oracles: vec![
                address!("0567f2323251f0aab15c8dfb1967e4e8a7d42aee"),
                address!("cbb98864ef56e9042e7d2efef76141f15731b82f"),
                address!("51597f405303c4377e36123cbc172b13269ea163"),
                address!("b97ad0e74fa7d920791e90258a6e2085088b4320"),
            ],
            native_liquidity_threshold: U256::from(DEFAULT_NATIVE_LIQUIDITY_THRESHOLD),
            proxy_admin: None,
        }
    }

    fn polygon() -> Self {
        Self {
            name: "polygon".to_string(),
            chain_id: 137,
            rpc_url: "https://polygon.llamarpc.com".to_string(),
            explorer_api_url: Some("https://api.polygonscan.com/api".to_string()),
            wrapped_native: address!("0d500b1d8e8ef31e21c99d1db9a6444d3adf1270"),
            factories: BTreeMap::from([
                // ApeSwap V2
                (
                    AmmProtocol::UniV2,
                    address!("Cf083Be4164828f00cAE704EC15a36D711491284"),
                ),
                (
                    AmmProtocol::UniV3,
                    address!("1F98431c8aD98523631AE4a59f267346ea31F984"),
                ),
                (
                    AmmProtocol::Algebra,
                    address!("411b0fAcC3489691f28ad58c47006AF5E3Ab3A28"),
                ),
            ]),
            stable_usd_tokens: vec![
                address!("8f3cf7ad23cd3cadbd9735aff958023239c6a063"), // DAI
                address!("2791bca1f2de4661ed88a30c99a7a9449aa84174"), // USDC
                address!("c2132d05d31c914a87c6611c10748aeb04b58e8f"), // USDT
            ],
            oracle_tokens: vec![
                address!("0d500b1d8e8ef31e21c99d1db9a6444d3adf1270"), // WMATIC
                address!("8f3cf7ad23cd3cadbd9735aff958023239c6a063"), // DAI
                address!("2791bca1f2de4661ed88a30c99a7a9449aa84174"), // USDC
                address!("c2132d05d31c914a87c6611c10748aeb04b58e8f"), // USDT
            ],
            oracles: vec![
                address!("AB594600376Ec9fD91F8e885dADF0CE036862dE0"), // MATIC/USD
                address!("4746DeC9e833A82EC7C2C1356372CcF2cfcD2F3D"), // DAI/USD
                address!("fE4A8cc5b5B2366C1B58Bea3858e81843581b2F7"), // USDC/USD
                address!("0A6513e40db6EB1b165753AD52E80663aeA50545"), // USDT/USD
            ],
            native_liquidity_threshold: U256::from(DEFAULT_NATIVE_LIQUIDITY_THRESHOLD),
            proxy_admin: None,
        }
    }

    fn mainnet(name: &str) -> Self {
        Self {
            name: name.to_string(),
            chain_id: 1,
            rpc_url: "https://rpc.ankr.com/eth".to_string(),
            explorer_api_url: Some("https://api.etherscan.io/api".to_string()),
            wrapped_native: address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
            factories: BTreeMap::from([
                // ApeFactory
                (
                    AmmProtocol::UniV2,
                    address!("BAe5dc9B19004883d0377419FeF3c2C8832d7d7B"),
                ),
                (
                    AmmProtocol::UniV3,
                    address!("1F98431c8aD98523631AE4a59f267346ea31F984"),
                ),
            ]),
            stable_usd_tokens: vec![
                address!("6B175474E89094C44Da98b954EedeAC495271d0F"), // DAI
                address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"), // USDC
                address!("dAC17F958D2ee523a2206206994597C13D831ec7"), // USDT
            ],
            oracle_tokens: vec![
                address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"), // WETH
                address!("6B175474E89094C44Da98b954EedeAC495271d0F"), // DAI
                address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"), // USDC
                address!("dAC17F958D2ee523a2206206994597C13D831ec7"), // USDT
            ],
            oracles: vec![
                address!("5f4eC3Df9cbd43714FE2740f5E3616155c5b8419"), // ETH/USD
                address!("Aed0c38402a5d19df6E4c03F4E2DceD6e29c1ee9"), // DAI/USD
                address!("8fFfFfd4AfB6115b954Bd326cbe7B4BA576818f6"), // USDC/USD
                address!("3E7d1eAB13ad0104d2750B8863b489D65364e32D"), // USDT/USD
            ],
            native_liquidity_threshold: U256::from(DEFAULT_NATIVE_LIQUIDITY_THRESHOLD),
            proxy_admin: None,
        }
    }

    fn arbitrum() -> Self {
        Self {
            name: "arbitrum".to_string(),
            chain_id: 42161,
            rpc_url: "https://arbitrum-one.publicnode.com".to_string(),
            explorer_api_url: Some("https://api.arbiscan.io/api".to_string()),
            wrapped_native: address!("82af49447d8a07e3bd95bd0d56f35241523fbab1"),
            factories: BTreeMap::from([
                (
                    AmmProtocol::UniV2,
                    address!("Cf083Be4164828f00cAE704EC15a36D711491284"),
                ),
                (
                    AmmProtocol::UniV3,
                    address!("1F98431c8aD98523631AE4a59f267346ea31F984"),
                ),
                (
                    AmmProtocol::Algebra,
                    address!("9C2ABD632771b433E5E7507BcaA41cA3b25D8544"),
                ),
            ]),
            stable_usd_tokens: vec![
                address!("da10009cbd5d07dd0cecc66161fc93d7c9000da1"), // DAI
                address!("ff970a61a04b1ca14834a43f5de4533ebddb5cc8"), // USDC
                address!("fd086bc7cd5c481dcc9c85ebe478a1c0b69fcbb9"), // USDT
            ],
            oracle_tokens: vec![
                address!("82af49447d8a07e3bd95bd0d56f35241523fbab1"), // WETH
                address!("da10009cbd5d07dd0cecc66161fc93d7c9000da1"), // DAI
                address!("ff970a61a04b1ca14834a43f5de4533ebddb5cc8"), // USDC
                address!("fd086bc7cd5c481dcc9c85ebe478a1c0b69fcbb9"), // USDT
            ],
            oracles: vec![
                address!("639Fe6ab55C921f74e7fac1ee960C0B6293ba612"), // ETH/USD
                address!("c5C8E77B397E531B8EC06BFb0048328B30E9eCfB"), // DAI/USD
                address!("50834F3163758fcC1Df9973b6e91f0F0F0434aD3"), // USDC/USD
                address!("3f3f5dF88dC9F13eac63DF89EC16ef6e7E25DdE7"), // USDT/USD
            ],
            native_liquidity_threshold: U256::from(DEFAULT_NATIVE_LIQUIDITY_THRESHOLD),
            proxy_admin: None,
        }
    }

    fn telos() -> Self {
        Self {
            name: "telos".to_string(),
            chain_id: 40,
            rpc_url: "https://mainnet.telos.net/evm".to_string(),
            explorer_api_url: None,
            wrapped_native: Address::ZERO,
            factories: BTreeMap::new(),
            stable_usd_tokens: Vec::new(),
            oracle_tokens: Vec::new(),
            oracles: Vec::new(),
            native_liquidity_threshold: U256::from(DEFAULT_NATIVE_LIQUIDITY_THRESHOLD),
            proxy_admin: None,
        }
    }
}
