//! Error types shared by the deployment components.

use alloy_core::primitives::{Address, B256};

/// Failures reported by a [`ChainClient`](crate::ChainClient).
///
/// The client is responsible for telling nonce collisions apart from every other failure,
/// the orchestrator only ever retries the former.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The network reports the nonce as already used, known or too low.
    #[error("nonce collision: {0}")]
    NonceCollision(String),
    /// The node answered with a JSON-RPC error that is not a nonce collision.
    #[error("RPC error: {0}")]
    Rpc(String),
    /// The request never produced a usable answer (connection, decoding, timeout).
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl ChainError {
    /// Classify a JSON-RPC error message.
    pub fn from_rpc_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_nonce_collision(&message) {
            Self::NonceCollision(message)
        } else {
            Self::Rpc(message)
        }
    }

    pub fn is_nonce_collision(&self) -> bool {
        matches!(self, Self::NonceCollision(_))
    }
}

/// Messages emitted by geth, erigon, hardhat, anvil and bsc nodes when a nonce is reused.
const NONCE_COLLISION_MARKERS: &[&str] = &[
    "nonce too low",
    "nonce is too low",
    "nonce has already been used",
    "already known",
    "known transaction",
    "replacement transaction underpriced",
    "transaction already imported",
];

fn is_nonce_collision(message: &str) -> bool {
    let message = message.to_lowercase();
    NONCE_COLLISION_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

/// Coarse classification the retry loop and the audit encoding branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    NonceCollision,
    EncodingUnavailable,
    Fatal,
}

/// Errors surfaced by the deployment orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("invalid configuration for network {network}: {reason}")]
    InvalidNetworkConfig { network: String, reason: String },

    #[error("failed to encode {what}: {reason}")]
    EncodingUnavailable { what: String, reason: String },

    #[error("deployment of {name} exhausted retries after {attempts} attempts")]
    RetriesExhausted {
        name: String,
        attempts: u32,
        #[source]
        last: ChainError,
    },

    #[error("deployment transaction {tx_hash} for {name} reverted")]
    Reverted { name: String, tx_hash: B256 },

    #[error("receipt {tx_hash} for {name} carries no contract address")]
    MissingContractAddress { name: String, tx_hash: B256 },

    /// The name is recorded already, for another contract or other arguments.
    #[error("{name} is already recorded at {address}: {reason}")]
    NameTaken {
        name: String,
        address: Address,
        reason: String,
    },

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DeployError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Chain(ChainError::NonceCollision(_)) => ErrorKind::NonceCollision,
            Self::EncodingUnavailable { .. } => ErrorKind::EncodingUnavailable,
            _ => ErrorKind::Fatal,
        }
    }

    pub(crate) fn encoding(what: impl Into<String>, reason: impl ToString) -> Self {
        Self::EncodingUnavailable {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_nonce_collisions() {
        for message in [
            "nonce too low",
            "Nonce too low. Expected nonce to be 12 but got 11.",
            "already known",
            "replacement transaction underpriced",
            "the tx doesn't have the correct nonce. account has nonce of: 5 tx has nonce of: 4; nonce has already been used",
        ] {
            assert!(
                ChainError::from_rpc_message(message).is_nonce_collision(),
                "{message} should be a nonce collision"
            );
        }
    }

    #[test]
    fn test_classify_other_failures() {
        for message in [
            "insufficient funds for gas * price + value",
            "execution reverted",
            "invalid opcode",
        ] {
            assert!(matches!(
                ChainError::from_rpc_message(message),
                ChainError::Rpc(_)
            ));
        }
    }

    #[test]
    fn test_error_kinds() {
        let collision = DeployError::from(ChainError::NonceCollision("already known".into()));
        assert_eq!(collision.kind(), ErrorKind::NonceCollision);

        let encoding = DeployError::encoding("constructor arguments", "arity mismatch");
        assert_eq!(encoding.kind(), ErrorKind::EncodingUnavailable);

        let exhausted = DeployError::RetriesExhausted {
            name: "PriceGetter".into(),
            attempts: 21,
            last: ChainError::NonceCollision("nonce too low".into()),
        };
        assert_eq!(exhausted.kind(), ErrorKind::Fatal);

        let taken = DeployError::NameTaken {
            name: "ProxyAdmin".into(),
            address: Address::ZERO,
            reason: "pick another name".into(),
        };
        assert_eq!(taken.kind(), ErrorKind::Fatal);
        assert!(taken.to_string().starts_with("ProxyAdmin is already recorded at 0x"));
        assert_eq!(
            DeployError::UnsupportedNetwork("moonbeam".into()).kind(),
            ErrorKind::Fatal
        );
    }
}
