//! Built-in deployment tasks for the price getter contracts.

use alloy_core::{dyn_abi::DynSolValue, primitives::Address};
use serde_json::{Value, json};

use crate::{
    AmmProtocol, ChainClient, DeployError, DeployParams, NetworkConfig, Orchestrator,
    TxOverrides, UpgradeableOptions,
};

/// Protocol-specific price getters deployed by [`DeployTask::PriceGetterProtocols`].
const PROTOCOL_CONTRACTS: [&str; 4] = [
    "PriceGetterUniV2",
    "PriceGetterUniV3",
    "PriceGetterAlgebra",
    "PriceGetterSolidly",
];

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::EnumMessage,
)]
#[strum(serialize_all = "kebab-case")]
pub enum DeployTask {
    #[strum(message = "PriceGetter behind a transparent upgradeable proxy")]
    PriceGetter,
    #[strum(message = "PriceGetterExtended covering every AMM protocol of the network")]
    PriceGetterExtended,
    #[strum(message = "One argument-less PriceGetter per AMM protocol")]
    PriceGetterProtocols,
}

impl DeployTask {
    /// Run the task, returning the deployed addresses and the configuration used.
    pub async fn run<C: ChainClient>(
        self,
        orchestrator: &mut Orchestrator<C>,
    ) -> Result<Value, DeployError> {
        let network = orchestrator.network().clone();
        tracing::info!(task = %self, network = %network.name, "Running deployment task");

        match self {
            Self::PriceGetter => {
                require_token_lists(&network)?;

                let initializer_args = vec![
                    address(network.wrapped_native),
                    DynSolValue::Uint(network.native_liquidity_threshold, 256),
                    addresses(&network.stable_usd_tokens),
                    addresses(&network.oracle_tokens),
                    addresses(&network.oracles),
                ];
                let options = UpgradeableOptions {
                    proxy_admin: network.proxy_admin,
                    ..Default::default()
                };
                let result = orchestrator
                    .deploy_upgradeable("PriceGetter", initializer_args, options)
                    .await?;

                Ok(json!({
                    "priceGetter": checksum(result.proxy),
                    "priceGetterImplementation": checksum(result.implementation),
                    "proxyAdmin": checksum(result.proxy_admin),
                    "config": config_output(&network),
                }))
            }
            Self::PriceGetterExtended => {
                let args = vec![
                    address(network.wrapped_native),
                    DynSolValue::Uint(network.native_liquidity_threshold, 256),
                    address(network.factory(AmmProtocol::UniV2)),
                    address(network.factory(AmmProtocol::UniV3)),
                    address(network.factory(AmmProtocol::Algebra)),
                    address(network.factory(AmmProtocol::Solidly)),
                    address(network.factory(AmmProtocol::Xfai)),
                    addresses(&network.stable_usd_tokens),
                    addresses(&network.oracle_tokens),
                    addresses(&network.oracles),
                ];
                let params =
                    DeployParams::new(args).with_overrides(TxOverrides::without_estimate());
                let record = orchestrator.deploy("PriceGetterExtended", params).await?;

                Ok(json!({
                    "priceGetterExtended": checksum(record.address),
                    "config": config_output(&network),
                }))
            }
            Self::PriceGetterProtocols => {
                require_token_lists(&network)?;

                let mut contracts = serde_json::Map::new();
                for contract in PROTOCOL_CONTRACTS {
                    let params =
                        DeployParams::empty().with_overrides(TxOverrides::without_estimate());
                    let record = orchestrator.deploy(contract, params).await?;
                    contracts.insert(contract.to_string(), checksum(record.address));
                }

                Ok(json!({
                    "contracts": contracts,
                    "config": config_output(&network),
                }))
            }
        }
    }
}

fn require_token_lists(network: &NetworkConfig) -> Result<(), DeployError> {
    if network.stable_usd_tokens.is_empty()
        || network.oracle_tokens.is_empty()
        || network.oracles.is_empty()
    {
        return Err(DeployError::InvalidNetworkConfig {
            network: network.name.clone(),
            reason: "stable USD tokens, oracle tokens and oracles must be provided".to_string(),
        });
    }
    Ok(())
}

fn address(address: Address) -> DynSolValue {
    DynSolValue::Address(address)
}

fn addresses(list: &[Address]) -> DynSolValue {
    DynSolValue::Array(list.iter().copied().map(address).collect())
}

fn checksum(address: Address) -> Value {
    Value::String(address.to_checksum(None))
}

fn config_output(network: &NetworkConfig) -> Value {
    let list = |list: &[Address]| Value::Array(list.iter().copied().map(checksum).collect());
    let factories: serde_json::Map<String, Value> = network
        .factories
        .iter()
        .map(|(protocol, factory)| (protocol.to_string(), checksum(*factory)))
        .collect();

    json!({
        "wNative": checksum(network.wrapped_native),
        "nativeLiquidityThreshold": network.native_liquidity_threshold.to_string(),
        "factories": factories,
        "stableUsdTokens": list(&network.stable_usd_tokens),
        "oracleTokens": list(&network.oracle_tokens),
        "oracles": list(&network.oracles),
    })
}
