//! Shared fixtures: a scripted in-memory chain and contract artifacts on disk.

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::Mutex,
    time::Duration,
};

use alloy_core::primitives::{Address, B256, address};
use anyhow::Result;
use rollout_deploy::{
    ArtifactStore, ChainClient, ChainError, NetworkConfig, Orchestrator, OrchestratorConfig,
    TxReceipt, TxRequest, VerificationRequest, VerificationStatus, Verifier,
};
use serde_json::{Value, json};
use tempdir::TempDir;

pub const DEPLOYER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

pub const GAS_PER_DEPLOYMENT: u64 = 1_500_000;

/// 10 gwei.
pub const NETWORK_GAS_PRICE: u128 = 10_000_000_000;

#[derive(Debug, Default)]
struct ChainState {
    nonces: HashMap<Address, u64>,
    /// Sends left that fail because someone else took the nonce.
    collisions: u32,
    /// Error message returned by the next send.
    send_failure: Option<String>,
    revert_next: bool,
    estimate_failure: bool,
    nonce_queries: u32,
    sent: Vec<TxRequest>,
    receipts: HashMap<B256, TxReceipt>,
}

/// Deterministic chain: contracts land at `Address::create(sender, nonce)`.
#[derive(Debug, Default)]
pub struct MockChain {
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` sends collide with a transaction sent by another tool.
    pub fn collide_next(&self, count: u32) {
        self.state.lock().unwrap().collisions = count;
    }

    pub fn fail_next_send(&self, message: &str) {
        self.state.lock().unwrap().send_failure = Some(message.to_string());
    }

    pub fn revert_next(&self) {
        self.state.lock().unwrap().revert_next = true;
    }

    pub fn fail_estimates(&self) {
        self.state.lock().unwrap().estimate_failure = true;
    }

    /// Transactions that were accepted or rejected by the node, in order.
    pub fn sent(&self) -> Vec<TxRequest> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn nonce_queries(&self) -> u32 {
        self.state.lock().unwrap().nonce_queries
    }

    pub fn nonce(&self, account: Address) -> u64 {
        self.state
            .lock()
            .unwrap()
            .nonces
            .get(&account)
            .copied()
            .unwrap_or_default()
    }
}

impl ChainClient for MockChain {
    async fn pending_nonce(&self, account: Address) -> Result<u64, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.nonce_queries += 1;
        Ok(state.nonces.get(&account).copied().unwrap_or_default())
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        Ok(NETWORK_GAS_PRICE)
    }

    async fn estimate_gas(&self, _tx: &TxRequest) -> Result<u64, ChainError> {
        if self.state.lock().unwrap().estimate_failure {
            return Err(ChainError::from_rpc_message("execution reverted"));
        }
        Ok(GAS_PER_DEPLOYMENT)
    }

    async fn send_transaction(&self, tx: &TxRequest) -> Result<B256, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.sent.push(tx.clone());

        if let Some(message) = state.send_failure.take() {
            return Err(ChainError::from_rpc_message(message));
        }

        let current = state.nonces.get(&tx.from).copied().unwrap_or_default();
        if state.collisions > 0 {
            state.collisions -= 1;
            // Another tool sent a transaction with the same nonce first.
            state.nonces.insert(tx.from, current + 1);
            return Err(ChainError::from_rpc_message("nonce too low"));
        }

        let nonce = tx.nonce.unwrap_or(current);
        if nonce != current {
            return Err(ChainError::from_rpc_message(format!(
                "nonce too low: next nonce {current}, tx nonce {nonce}"
            )));
        }
        state.nonces.insert(tx.from, current + 1);

        let tx_hash = B256::left_padding_from(&(state.sent.len() as u64).to_be_bytes());
        let success = !std::mem::take(&mut state.revert_next);
        let receipt = TxReceipt {
            tx_hash,
            contract_address: (tx.to.is_none() && success).then(|| tx.from.create(nonce)),
            success,
            gas_used: GAS_PER_DEPLOYMENT - 100_000,
            block_number: state.sent.len() as u64,
        };
        state.receipts.insert(tx_hash, receipt);
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TxReceipt, ChainError> {
        self.state
            .lock()
            .unwrap()
            .receipts
            .get(&tx_hash)
            .cloned()
            .ok_or_else(|| ChainError::Rpc(format!("unknown transaction {tx_hash}")))
    }
}

/// Verifier recording every request and failing for chosen contract names.
#[derive(Debug, Default)]
pub struct MockVerifier {
    failing: HashSet<String>,
    requests: Mutex<Vec<VerificationRequest>>,
}

impl MockVerifier {
    pub fn failing(names: &[&str]) -> Self {
        Self {
            failing: names.iter().map(|n| n.to_string()).collect(),
            requests: Mutex::default(),
        }
    }

    pub fn requests(&self) -> Vec<VerificationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Verifier for MockVerifier {
    async fn verify(&self, request: &VerificationRequest) -> Result<VerificationStatus> {
        self.requests.lock().unwrap().push(request.clone());
        if self.failing.contains(&request.name) {
            anyhow::bail!("Fail - Unable to verify");
        }
        Ok(VerificationStatus::Verified)
    }
}

fn constructor(inputs: Value) -> Value {
    json!({ "type": "constructor", "stateMutability": "nonpayable", "inputs": inputs })
}

fn input(name: &str, ty: &str) -> Value {
    json!({ "name": name, "type": ty, "internalType": ty })
}

fn write_artifact(root: &Path, source: &str, name: &str, abi: Value) -> Result<()> {
    let dir = root.join(source);
    std::fs::create_dir_all(&dir)?;
    let artifact = json!({
        "_format": "hh-sol-artifact-1",
        "contractName": name,
        "sourceName": source,
        "abi": abi,
        "bytecode": "0x608060405234801561001057600080fd5b50",
    });
    std::fs::write(dir.join(format!("{name}.json")), serde_json::to_string_pretty(&artifact)?)?;
    Ok(())
}

/// Write the artifacts the tests deploy below `root`.
pub fn write_artifacts(root: &Path) -> Result<()> {
    write_artifact(
        root,
        "contracts/Counter.sol",
        "Counter",
        json!([constructor(json!([input("start", "uint256")]))]),
    )?;

    write_artifact(
        root,
        "contracts/PriceGetter.sol",
        "PriceGetter",
        json!([
            {
                "type": "function",
                "name": "initialize",
                "stateMutability": "nonpayable",
                "inputs": [
                    input("_wNative", "address"),
                    input("_nativeLiquidityThreshold", "uint256"),
                    input("_stableUsdTokens", "address[]"),
                    input("_oracleTokens", "address[]"),
                    input("_oracles", "address[]"),
                ],
                "outputs": []
            }
        ]),
    )?;

    write_artifact(
        root,
        "contracts/PriceGetterExtended.sol",
        "PriceGetterExtended",
        json!([constructor(json!([
            input("_wNative", "address"),
            input("_nativeLiquidityThreshold", "uint256"),
            input("_factoryV2", "address"),
            input("_factoryV3", "address"),
            input("_factoryAlgebra", "address"),
            input("_factorySolidly", "address"),
            input("_factoryXFAI", "address"),
            input("_stableUsdTokens", "address[]"),
            input("_oracleTokens", "address[]"),
            input("_oracles", "address[]"),
        ]))]),
    )?;

    for name in [
        "PriceGetterUniV2",
        "PriceGetterUniV3",
        "PriceGetterAlgebra",
        "PriceGetterSolidly",
    ] {
        write_artifact(root, &format!("contracts/protocols/{name}.sol"), name, json!([]))?;
    }

    write_artifact(
        root,
        "@openzeppelin/contracts/proxy/transparent/ProxyAdmin.sol",
        "ProxyAdmin",
        json!([constructor(json!([input("initialOwner", "address")]))]),
    )?;

    write_artifact(
        root,
        "@openzeppelin/contracts/proxy/transparent/TransparentUpgradeableProxy.sol",
        "TransparentUpgradeableProxy",
        json!([constructor(json!([
            input("_logic", "address"),
            input("admin_", "address"),
            input("_data", "bytes"),
        ]))]),
    )?;

    Ok(())
}

pub fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        deployer: DEPLOYER,
        proxy_admin_owner: None,
        max_retries: 20,
        retry_delay: Duration::from_millis(1),
        estimate_gas: true,
        gas_price_override: None,
        reuse_recorded: false,
    }
}

/// Temporary artifacts and ledger directories.
pub struct Workspace {
    pub temp_dir: TempDir,
}

impl Workspace {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new("rollout-test")?;
        write_artifacts(&temp_dir.path().join("artifacts"))?;
        Ok(Self { temp_dir })
    }

    pub fn ledger_dir(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("deployments")
    }

    pub fn orchestrator(
        &self,
        network: &str,
        task: &str,
        config: OrchestratorConfig,
    ) -> Result<Orchestrator<MockChain>> {
        let orchestrator = Orchestrator::new(
            MockChain::new(),
            NetworkConfig::for_network(network)?,
            ArtifactStore::new(self.temp_dir.path().join("artifacts")),
            self.ledger_dir(),
            task,
            config,
        )?;
        Ok(orchestrator)
    }
}

/// Initialize tracing for tests (idempotent).
pub fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init()
        .ok();
}
