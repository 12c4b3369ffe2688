//! Pre-flight gas estimation and cost aggregation.

use alloy_core::primitives::{
    U256,
    utils::{format_ether, format_units},
};
use serde::{Deserialize, Serialize};

use crate::{ChainClient, ChainError, TxRequest};

/// Safety margin applied to the gas price, in percent.
pub const GAS_PRICE_MARGIN_PERCENT: u64 = 110;

/// Expected cost of one deployment, or of a whole ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    pub gas_limit: u64,
    /// Gas price in wei, margin included.
    #[serde(with = "decimal")]
    pub gas_price: U256,
    /// `gas_price` in gwei, for humans.
    pub gas_price_gwei: String,
    /// `gas_price * gas_limit` in wei.
    #[serde(with = "decimal")]
    pub cost: U256,
    /// `cost` in whole native units (ETH, BNB, MATIC...).
    pub cost_native: String,
}

impl GasEstimate {
    pub fn new(gas_limit: u64, gas_price: U256) -> Self {
        let cost = gas_price.saturating_mul(U256::from(gas_limit));
        Self {
            gas_limit,
            gas_price,
            gas_price_gwei: format_units(gas_price, "gwei")
                .unwrap_or_else(|_| gas_price.to_string()),
            cost,
            cost_native: format_ether(cost),
        }
    }

    /// Aggregate of several estimates: summed limits priced at the highest observed price.
    pub fn total<'a>(estimates: impl IntoIterator<Item = &'a GasEstimate>) -> Self {
        let (gas_limit, gas_price) = estimates
            .into_iter()
            .fold((0u64, U256::ZERO), |(limit, price), estimate| {
                (
                    limit.saturating_add(estimate.gas_limit),
                    price.max(estimate.gas_price),
                )
            });
        Self::new(gas_limit, gas_price)
    }
}

/// Estimates deployment transactions against a [`ChainClient`].
#[derive(Debug)]
pub struct GasEstimator<'a, C> {
    client: &'a C,
    gas_price_override: Option<u128>,
}

impl<'a, C: ChainClient> GasEstimator<'a, C> {
    pub fn new(client: &'a C, gas_price_override: Option<u128>) -> Self {
        Self {
            client,
            gas_price_override,
        }
    }

    /// Estimate `tx`, pricing it at the override (or network) price plus the safety margin.
    ///
    /// A failure means no estimate is available, not that the deployment would fail.
    pub async fn estimate(&self, tx: &TxRequest) -> Result<GasEstimate, ChainError> {
        let gas_limit = self.client.estimate_gas(tx).await?;
        let base_price = match tx.gas_price.or(self.gas_price_override) {
            Some(price) => price,
            None => self.client.gas_price().await?,
        };

        let gas_price = U256::from(base_price) * U256::from(GAS_PRICE_MARGIN_PERCENT)
            / U256::from(100u64);
        let estimate = GasEstimate::new(gas_limit, gas_price);

        tracing::debug!(
            gas_limit,
            gas_price_gwei = %estimate.gas_price_gwei,
            cost = %estimate.cost_native,
            "Estimated deployment cost"
        );
        Ok(estimate)
    }
}

/// Wei amounts as decimal strings, JSON numbers cannot hold them.
mod decimal {
    use alloy_core::primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub(super) fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}
