//! The chain capabilities the orchestrator depends on.

use std::future::Future;

use alloy_core::primitives::{Address, B256, Bytes, U256};

use crate::ChainError;

/// An unsigned transaction, signed by the node holding `from`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxRequest {
    pub from: Address,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub data: Bytes,
    pub value: Option<U256>,
    pub nonce: Option<u64>,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u128>,
}

impl TxRequest {
    /// A contract creation transaction carrying `data` as init code.
    pub fn create(from: Address, data: Bytes) -> Self {
        Self {
            from,
            data,
            ..Default::default()
        }
    }
}

/// The subset of a transaction receipt the orchestrator reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub contract_address: Option<Address>,
    /// `false` when the transaction was mined but reverted.
    pub success: bool,
    pub gas_used: u64,
    pub block_number: u64,
}

/// Submit transactions and query the state they depend on.
///
/// Implementations report nonce reuse as [`ChainError::NonceCollision`]. Every other failure
/// is final from the orchestrator's point of view.
pub trait ChainClient: Send + Sync {
    /// Number of transactions sent by `account`, including pending ones.
    fn pending_nonce(&self, account: Address)
    -> impl Future<Output = Result<u64, ChainError>> + Send;

    /// Current gas price in wei.
    fn gas_price(&self) -> impl Future<Output = Result<u128, ChainError>> + Send;

    fn estimate_gas(&self, tx: &TxRequest)
    -> impl Future<Output = Result<u64, ChainError>> + Send;

    /// Broadcast `tx`, returning its hash.
    fn send_transaction(&self, tx: &TxRequest)
    -> impl Future<Output = Result<B256, ChainError>> + Send;

    /// Wait until `tx_hash` is mined.
    fn wait_for_receipt(
        &self,
        tx_hash: B256,
    ) -> impl Future<Output = Result<TxReceipt, ChainError>> + Send;
}
