//! [`ChainClient`] over an Ethereum JSON-RPC endpoint.
//!
//! Transactions are signed by the node (`eth_sendTransaction`), so the deployer must be one of
//! its unlocked accounts: a local fork, a hardhat/anvil node or a signing proxy.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use alloy_core::primitives::{Address, B256, U64, U128};
use anyhow::Context;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use url::Url;

use crate::{ChainClient, ChainError, RpcSettings, TxReceipt, TxRequest};

/// Create an HTTP client configured for JSON-RPC requests.
fn create_client(timeout: Duration) -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result.
///
/// Error responses are classified with [`ChainError::from_rpc_message`], everything that goes
/// wrong before a response is decoded is a [`ChainError::Transport`] failure.
async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &Url,
    id: u64,
    method: &str,
    params: Vec<Value>,
) -> Result<T, ChainError> {
    let response = client
        .post(url.clone())
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    if let Some(error) = result.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown");
        return Err(ChainError::from_rpc_message(message));
    }

    let result_value = result
        .get("result")
        .with_context(|| format!("No result in {} response", method))?
        .clone();

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
        .map_err(ChainError::from)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    contract_address: Option<Address>,
    /// Absent on pre-byzantium chains, where a mined receipt means success.
    status: Option<U64>,
    gas_used: U64,
    block_number: U64,
}

impl From<RpcReceipt> for TxReceipt {
    fn from(receipt: RpcReceipt) -> Self {
        Self {
            tx_hash: receipt.transaction_hash,
            contract_address: receipt.contract_address,
            success: receipt.status.is_none_or(|status| status == U64::from(1)),
            gas_used: receipt.gas_used.to(),
            block_number: receipt.block_number.to(),
        }
    }
}

/// Encode a request as the `eth_sendTransaction`/`eth_estimateGas` call object.
fn tx_object(tx: &TxRequest) -> Value {
    let mut object = Map::new();
    object.insert("from".into(), Value::String(tx.from.to_checksum(None)));
    if let Some(to) = tx.to {
        object.insert("to".into(), Value::String(to.to_checksum(None)));
    }
    object.insert(
        "data".into(),
        Value::String(format!("0x{}", hex::encode(&tx.data))),
    );
    if let Some(value) = tx.value {
        object.insert("value".into(), Value::String(format!("{value:#x}")));
    }
    if let Some(nonce) = tx.nonce {
        object.insert("nonce".into(), Value::String(format!("{nonce:#x}")));
    }
    if let Some(gas) = tx.gas_limit {
        object.insert("gas".into(), Value::String(format!("{gas:#x}")));
    }
    if let Some(gas_price) = tx.gas_price {
        object.insert("gasPrice".into(), Value::String(format!("{gas_price:#x}")));
    }
    Value::Object(object)
}

/// JSON-RPC chain client.
#[derive(Debug)]
pub struct JsonRpcClient {
    client: reqwest::Client,
    url: Url,
    poll_interval: Duration,
    receipt_timeout: Duration,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: &str, settings: &RpcSettings) -> Result<Self, anyhow::Error> {
        let url = Url::parse(url).with_context(|| format!("Invalid RPC URL: {}", url))?;
        Ok(Self {
            client: create_client(Duration::from_secs(settings.request_timeout_secs))?,
            url,
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            receipt_timeout: Duration::from_secs(settings.receipt_timeout_secs),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(method, id, "JSON-RPC request");
        json_rpc_call(&self.client, &self.url, id, method, params).await
    }

    /// Accounts the node signs for.
    pub async fn accounts(&self) -> Result<Vec<Address>, ChainError> {
        self.call("eth_accounts", vec![]).await
    }

    pub async fn chain_id(&self) -> Result<u64, ChainError> {
        let chain_id: U64 = self.call("eth_chainId", vec![]).await?;
        Ok(chain_id.to())
    }
}

impl ChainClient for JsonRpcClient {
    async fn pending_nonce(&self, account: Address) -> Result<u64, ChainError> {
        let nonce: U64 = self
            .call(
                "eth_getTransactionCount",
                vec![Value::String(account.to_checksum(None)), "pending".into()],
            )
            .await?;
        Ok(nonce.to())
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        let price: U128 = self.call("eth_gasPrice", vec![]).await?;
        Ok(price.to())
    }

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64, ChainError> {
        let gas: U64 = self.call("eth_estimateGas", vec![tx_object(tx)]).await?;
        Ok(gas.to())
    }

    async fn send_transaction(&self, tx: &TxRequest) -> Result<B256, ChainError> {
        self.call("eth_sendTransaction", vec![tx_object(tx)]).await
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TxReceipt, ChainError> {
        let start = Instant::now();

        loop {
            if start.elapsed() > self.receipt_timeout {
                return Err(ChainError::Transport(anyhow::anyhow!(
                    "Timeout waiting for receipt of {}",
                    tx_hash
                )));
            }

            let receipt: Option<RpcReceipt> = self
                .call(
                    "eth_getTransactionReceipt",
                    vec![Value::String(tx_hash.to_string())],
                )
                .await?;

            if let Some(receipt) = receipt {
                return Ok(receipt.into());
            }

            tracing::trace!(%tx_hash, "Receipt not available yet, retrying...");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
