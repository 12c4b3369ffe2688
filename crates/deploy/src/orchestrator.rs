//! Sequential contract deployment with nonce-collision retries.

use std::{
    path::PathBuf,
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, Bytes},
};
use backon::{ConstantBuilder, Retryable};
use serde_json::Value;

use crate::{
    ArtifactStore, ChainClient, ChainError, ContractArtifact, DeployError, DeployParams,
    DeploymentLedger, DeploymentRecord, GasEstimate, GasEstimator, NetworkConfig, NonceAllocator,
    ProxyComposer, ProxyDeploymentResult, Settings, TxReceipt, TxRequest, UpgradeableOptions,
    VerificationRequest, VerificationStatus, VerificationSummary, Verifier,
    params::{encode_constructor_args, parse_args},
};

/// Knobs of one orchestrator session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Account every transaction is sent from.
    pub deployer: Address,
    /// Owner of freshly deployed proxy admins, the deployer when unset.
    pub proxy_admin_owner: Option<Address>,
    /// Retries after nonce collisions, on top of the first attempt.
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub estimate_gas: bool,
    pub gas_price_override: Option<u128>,
    /// Return the recorded deployment of a name when contract and arguments match, instead
    /// of failing.
    pub reuse_recorded: bool,
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &Settings, deployer: Address) -> Self {
        Self {
            deployer,
            proxy_admin_owner: settings.proxy_admin_owner,
            max_retries: settings.max_retries,
            retry_delay: settings.retry_delay(),
            estimate_gas: settings.estimate_gas,
            gas_price_override: settings.gas_price.map(u128::from),
            reuse_recorded: false,
        }
    }
}

/// Deploys contracts one after the other and keeps the ledger of what was deployed.
#[derive(Debug)]
pub struct Orchestrator<C> {
    client: C,
    network: NetworkConfig,
    artifacts: ArtifactStore,
    task: String,
    ledger: DeploymentLedger,
    config: OrchestratorConfig,
}

impl<C: ChainClient> Orchestrator<C> {
    /// Create an orchestrator for `task`, rejecting invalid network configurations up front.
    pub fn new(
        client: C,
        network: NetworkConfig,
        artifacts: ArtifactStore,
        ledger_dir: impl Into<PathBuf>,
        task: &str,
        config: OrchestratorConfig,
    ) -> Result<Self, DeployError> {
        network.validate()?;
        let ledger = DeploymentLedger::new(ledger_dir.into(), task, &network.name);

        tracing::info!(
            task,
            network = %network.name,
            deployer = %config.deployer,
            ledger = %ledger.dir().display(),
            "Orchestrator ready"
        );

        Ok(Self {
            client,
            network,
            artifacts,
            task: task.to_string(),
            ledger,
            config,
        })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn ledger(&self) -> &DeploymentLedger {
        &self.ledger
    }

    /// Load the latest snapshot of this task and network, and reuse its deployments.
    pub fn resume(&mut self) -> Result<Option<PathBuf>, DeployError> {
        let Some(path) = self.ledger.latest_snapshot()? else {
            tracing::info!("No previous deployment found, starting from scratch");
            return Ok(None);
        };

        self.ledger.load_existing(&path)?;
        self.config.reuse_recorded = true;
        Ok(Some(path))
    }

    /// Deploy the artifact named `contract`, recorded under the same name.
    pub async fn deploy(
        &mut self,
        contract: &str,
        params: DeployParams,
    ) -> Result<DeploymentRecord, DeployError> {
        self.deploy_named(contract, contract, params).await
    }

    /// Deploy the artifact named `contract`, recorded as `name`.
    pub async fn deploy_named(
        &mut self,
        name: &str,
        contract: &str,
        params: DeployParams,
    ) -> Result<DeploymentRecord, DeployError> {
        let artifact = self.artifacts.load(contract)?;
        self.deploy_artifact(name, &artifact, params, false).await
    }

    /// Deploy implementation, proxy admin and transparent proxy of `contract`.
    pub async fn deploy_upgradeable(
        &mut self,
        contract: &str,
        initializer_args: Vec<DynSolValue>,
        options: UpgradeableOptions,
    ) -> Result<ProxyDeploymentResult, DeployError> {
        ProxyComposer::new(self)
            .deploy_upgradeable(contract, initializer_args, options)
            .await
    }

    pub(crate) async fn deploy_artifact(
        &mut self,
        name: &str,
        artifact: &ContractArtifact,
        params: DeployParams,
        upgradeable_proxy: bool,
    ) -> Result<DeploymentRecord, DeployError> {
        if let Some(record) = self.ledger.find(name) {
            let taken = |reason: String| DeployError::NameTaken {
                name: name.to_string(),
                address: record.address,
                reason,
            };
            if !self.config.reuse_recorded {
                return Err(taken("pick another name".to_string()));
            }
            if record.contract != artifact.name {
                return Err(taken(format!(
                    "recorded as {}, not {}; rerun with --force",
                    record.contract, artifact.name
                )));
            }
            let args = params.render_args();
            if record.constructor_arguments != args {
                return Err(taken(format!(
                    "recorded with arguments {}, not {}; rerun with --force",
                    Value::Array(record.constructor_arguments.clone()),
                    Value::Array(args)
                )));
            }

            tracing::info!(name, address = %record.address, "Reusing recorded deployment");
            return Ok(record.clone());
        }

        tracing::info!(name, contract = %artifact.name, "Deploying contract");

        let overrides = params.overrides.clone().unwrap_or_default();
        let mut data = artifact.bytecode.to_vec();
        data.extend(params.encode_args());
        let tx = TxRequest {
            value: overrides.value,
            gas_limit: overrides.gas_limit,
            gas_price: overrides.gas_price.or(self.config.gas_price_override),
            ..TxRequest::create(self.config.deployer, Bytes::from(data))
        };

        let gas_estimate = if overrides.estimate_gas.unwrap_or(self.config.estimate_gas) {
            self.estimate(name, &tx).await
        } else {
            None
        };

        let (receipt, attempts) = self.submit_with_retries(name, &tx).await?;

        if !receipt.success {
            return Err(DeployError::Reverted {
                name: name.to_string(),
                tx_hash: receipt.tx_hash,
            });
        }
        let address = receipt
            .contract_address
            .ok_or_else(|| DeployError::MissingContractAddress {
                name: name.to_string(),
                tx_hash: receipt.tx_hash,
            })?;

        let encoded_constructor_args =
            match encode_constructor_args(artifact.abi.constructor.as_ref(), &params.args) {
                Ok(encoded) => encoded,
                Err(e) => {
                    tracing::warn!(name, error = %e, "Constructor arguments not encoded for the ledger");
                    Bytes::new()
                }
            };

        let constructor_arguments = params.render_args();
        let record = DeploymentRecord {
            name: name.to_string(),
            contract: artifact.name.clone(),
            address,
            tx_hash: receipt.tx_hash,
            attempts,
            encoded_constructor_args,
            verification_command: self.verification_command(name, address, &constructor_arguments),
            constructor_arguments,
            gas_estimate,
            upgradeable_proxy,
        };

        tracing::info!(
            name,
            %address,
            tx_hash = %receipt.tx_hash,
            attempts,
            gas_used = receipt.gas_used,
            block = receipt.block_number,
            "Contract deployed"
        );

        self.ledger.append(record.clone())?;
        Ok(record)
    }

    async fn estimate(&self, name: &str, tx: &TxRequest) -> Option<GasEstimate> {
        let estimator = GasEstimator::new(&self.client, self.config.gas_price_override);
        match estimator.estimate(tx).await {
            Ok(estimate) => {
                tracing::info!(
                    name,
                    gas_limit = estimate.gas_limit,
                    gas_price_gwei = %estimate.gas_price_gwei,
                    cost = %estimate.cost_native,
                    "Estimated deployment cost"
                );
                Some(estimate)
            }
            Err(e) => {
                tracing::warn!(name, error = %e, "Gas estimation failed, deploying without estimate");
                None
            }
        }
    }

    /// Send `tx` with a fresh nonce until it is mined, retrying nonce collisions only.
    ///
    /// Returns the receipt and the number of attempts it took.
    async fn submit_with_retries(
        &self,
        name: &str,
        tx: &TxRequest,
    ) -> Result<(TxReceipt, u32), DeployError> {
        let client = &self.client;
        let nonces = &NonceAllocator::new(client);
        let attempts = &AtomicU32::new(0);

        let submit = || async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let nonce = nonces.next_nonce(tx.from).await?;
            let request = TxRequest {
                nonce: Some(nonce),
                ..tx.clone()
            };

            tracing::debug!(name, attempt, nonce, "Submitting deployment transaction");
            let tx_hash = client.send_transaction(&request).await?;
            tracing::debug!(name, %tx_hash, "Waiting for receipt");
            client.wait_for_receipt(tx_hash).await
        };

        let backoff = ConstantBuilder::default()
            .with_delay(self.config.retry_delay)
            .with_max_times(self.config.max_retries as usize);

        let result = submit
            .retry(backoff)
            .sleep(tokio::time::sleep)
            .when(ChainError::is_nonce_collision)
            .notify(|e: &ChainError, delay: Duration| {
                tracing::warn!(
                    name,
                    attempt = attempts.load(Ordering::SeqCst),
                    error = %e,
                    "Nonce collision, retrying in {:?}",
                    delay
                );
            })
            .await;

        let attempts = attempts.load(Ordering::SeqCst);
        match result {
            Ok(receipt) => Ok((receipt, attempts)),
            Err(last) if last.is_nonce_collision() => {
                tracing::error!(name, attempts, "Deployment exhausted its retries");
                Err(DeployError::RetriesExhausted {
                    name: name.to_string(),
                    attempts,
                    last,
                })
            }
            Err(e) => Err(DeployError::Chain(e)),
        }
    }

    fn verification_command(&self, name: &str, address: Address, args: &[Value]) -> String {
        let mut command = format!(
            "rollout verify --id {} --network {} --name {} --address {}",
            self.task, self.network.name, name, address
        );
        if !args.is_empty() {
            command.push_str(&format!(" --args '{}'", Value::Array(args.to_vec())));
        }
        command
    }

    /// Verify every recorded deployment.
    ///
    /// A failing contract is logged and reported in the summary, the others are still verified.
    pub async fn verify_all<V: Verifier>(&self, verifier: &V) -> VerificationSummary {
        let mut summary = VerificationSummary::default();

        for record in self.ledger.records() {
            tracing::info!(name = %record.name, address = %record.address, "Verifying contract");

            let outcome = match self.verification_request(record, None) {
                Ok(request) => verifier.verify(&request).await,
                Err(e) => Err(e.into()),
            };

            match outcome {
                Ok(status) => {
                    tracing::info!(name = %record.name, %status, "Contract verified");
                    summary.verified.push(record.name.clone());
                }
                Err(e) => {
                    tracing::error!(name = %record.name, address = %record.address, error = %e, "Verification failed");
                    summary.failed.push((record.name.clone(), format!("{e:#}")));
                }
            }
        }

        summary
    }

    /// Verify a single contract.
    ///
    /// `name` is looked up in the ledger first. Without a record, `name` is the artifact name
    /// and `address` is required. `args` replace the recorded constructor arguments.
    pub async fn verify_one<V: Verifier>(
        &self,
        verifier: &V,
        name: &str,
        address: Option<Address>,
        args: Option<Vec<Value>>,
    ) -> Result<VerificationStatus, DeployError> {
        let request = match self.ledger.find(name) {
            Some(record) => {
                let mut request = self.verification_request(record, args)?;
                if let Some(address) = address {
                    request.address = address;
                }
                request
            }
            None => {
                let address = address.ok_or_else(|| {
                    DeployError::Other(anyhow::anyhow!(
                        "{} is not in the ledger, an address is required",
                        name
                    ))
                })?;
                let artifact = self.artifacts.load(name)?;
                let constructor_args = explicit_args(&artifact, &args.unwrap_or_default())?;
                VerificationRequest {
                    name: name.to_string(),
                    address,
                    contract_name: artifact.fully_qualified_name(),
                    constructor_args,
                    build_info: artifact.build_info()?,
                }
            }
        };

        tracing::info!(name, address = %request.address, "Verifying contract");
        let status = verifier.verify(&request).await?;
        tracing::info!(name, %status, "Contract verified");
        Ok(status)
    }

    fn verification_request(
        &self,
        record: &DeploymentRecord,
        args: Option<Vec<Value>>,
    ) -> Result<VerificationRequest, DeployError> {
        let artifact = self.artifacts.load(&record.contract)?;
        let constructor_args = match args {
            Some(args) => explicit_args(&artifact, &args)?,
            None => record.encoded_constructor_args.clone(),
        };

        Ok(VerificationRequest {
            name: record.name.clone(),
            address: record.address,
            contract_name: artifact.fully_qualified_name(),
            constructor_args,
            build_info: artifact.build_info()?,
        })
    }
}

/// Encode constructor arguments given as JSON.
fn explicit_args(artifact: &ContractArtifact, args: &[Value]) -> Result<Bytes, DeployError> {
    let constructor = artifact.abi.constructor.as_ref();
    let inputs = constructor.map(|c| c.inputs.as_slice()).unwrap_or_default();
    let values = parse_args(inputs, args)?;
    encode_constructor_args(constructor, &values)
}
