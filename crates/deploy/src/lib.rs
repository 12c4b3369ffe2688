//! rollout-deploy - Contract deployment orchestration for EVM networks.
//!
//! This crate deploys compiled contracts in order, retries nonce collisions, composes
//! transparent upgradeable proxies and keeps a restartable ledger of every deployment.

mod artifacts;
pub use artifacts::{ArtifactStore, BuildInfo, ContractArtifact, ContractHandle};

mod chain;
pub use chain::{ChainClient, TxReceipt, TxRequest};

mod error;
pub use error::{ChainError, DeployError, ErrorKind};

mod etherscan;
pub use etherscan::EtherscanVerifier;

mod gas;
pub use gas::{GAS_PRICE_MARGIN_PERCENT, GasEstimate, GasEstimator};

mod ledger;
pub use ledger::{DeploymentLedger, DeploymentRecord, LedgerDocument};

mod network;
pub use network::{AmmProtocol, DEFAULT_NATIVE_LIQUIDITY_THRESHOLD, NetworkConfig};

mod nonce;
pub use nonce::NonceAllocator;

mod orchestrator;
pub use orchestrator::{Orchestrator, OrchestratorConfig};

pub mod params;
pub use params::{DeployParams, ParamValue, TxOverrides};

mod proxy;
pub use proxy::{
    PROXY_ADMIN_CONTRACT, ProxyComposer, ProxyDeploymentResult, TRANSPARENT_PROXY_CONTRACT,
    UpgradeableOptions, encode_initializer,
};

mod rpc;
pub use rpc::JsonRpcClient;

mod settings;
pub use settings::{RpcSettings, SETTINGS_FILENAME, Settings};

mod tasks;
pub use tasks::DeployTask;

mod verify;
pub use verify::{VerificationRequest, VerificationStatus, VerificationSummary, Verifier};
