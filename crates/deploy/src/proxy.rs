//! Upgradeable deployments: implementation, proxy admin and transparent proxy.

use alloy_core::{
    dyn_abi::{DynSolValue, JsonAbiExt},
    primitives::{Address, Bytes},
};

use crate::{
    ChainClient, ContractArtifact, ContractHandle, DeployError, DeployParams, DeploymentRecord,
    Orchestrator, TxOverrides,
};

/// Artifact of the proxy admin, constructed as `ProxyAdmin(address initialOwner)`.
pub const PROXY_ADMIN_CONTRACT: &str = "ProxyAdmin";

/// Artifact of the proxy, constructed as
/// `TransparentUpgradeableProxy(address logic, address admin, bytes data)`.
pub const TRANSPARENT_PROXY_CONTRACT: &str = "TransparentUpgradeableProxy";

/// Options of [`ProxyComposer::deploy_upgradeable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeableOptions {
    /// Name the proxy is recorded under, the contract name when unset. The implementation and
    /// admin are recorded as `<name>_Implementation` and `<name>_ProxyAdmin`.
    pub name: Option<String>,
    /// Existing proxy admin to reuse instead of deploying one.
    pub proxy_admin: Option<Address>,
    /// Owner of a freshly deployed proxy admin.
    pub proxy_admin_owner: Option<Address>,
    pub initializer: String,
    /// Leave the proxy uninitialized, it must then be initialized by another transaction.
    pub skip_initialization: bool,
    pub overrides: Option<TxOverrides>,
}

impl Default for UpgradeableOptions {
    fn default() -> Self {
        Self {
            name: None,
            proxy_admin: None,
            proxy_admin_owner: None,
            initializer: "initialize".to_string(),
            skip_initialization: false,
            overrides: None,
        }
    }
}

/// What one upgradeable deployment produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyDeploymentResult {
    pub implementation: Address,
    pub proxy_admin: Address,
    /// Owner of the proxy admin. Unknown when an existing admin was reused.
    pub proxy_admin_owner: Option<Address>,
    pub proxy: Address,
    /// The implementation's interface at the proxy's address.
    pub contract: ContractHandle,
    /// `false` when initialization was skipped.
    pub initialized: bool,
    /// Initializer call data passed to the proxy constructor, empty when skipped.
    pub init_data: Bytes,
}

/// Composes upgradeable deployments on top of an [`Orchestrator`].
#[derive(Debug)]
pub struct ProxyComposer<'a, C> {
    orchestrator: &'a mut Orchestrator<C>,
}

impl<'a, C: ChainClient> ProxyComposer<'a, C> {
    pub fn new(orchestrator: &'a mut Orchestrator<C>) -> Self {
        Self { orchestrator }
    }

    /// Deploy a fresh proxy admin owned by `owner`.
    ///
    /// Recorded as `ProxyAdmin`, or `ProxyAdmin_<n>` when that name is taken.
    pub async fn deploy_proxy_admin(
        &mut self,
        owner: Address,
    ) -> Result<DeploymentRecord, DeployError> {
        let name = self.orchestrator.ledger().free_name(PROXY_ADMIN_CONTRACT);
        self.proxy_admin_named(&name, owner, None).await
    }

    /// Deploy a transparent proxy in front of `implementation`, administered by `proxy_admin`.
    ///
    /// `init_data` is called on the implementation through the proxy during construction,
    /// nothing is called when it is empty. Named like [`Self::deploy_proxy_admin`].
    pub async fn deploy_transparent_proxy(
        &mut self,
        implementation: Address,
        proxy_admin: Address,
        init_data: Bytes,
    ) -> Result<DeploymentRecord, DeployError> {
        let name = self
            .orchestrator
            .ledger()
            .free_name(TRANSPARENT_PROXY_CONTRACT);
        self.transparent_proxy_named(
            &name,
            implementation,
            proxy_admin,
            init_data,
            None,
        )
        .await
    }

    /// Deploy `contract` behind a transparent proxy.
    ///
    /// The implementation is deployed without constructor arguments, `initializer_args` go to
    /// the initializer called through the proxy.
    pub async fn deploy_upgradeable(
        &mut self,
        contract: &str,
        initializer_args: Vec<DynSolValue>,
        options: UpgradeableOptions,
    ) -> Result<ProxyDeploymentResult, DeployError> {
        let artifact = self.orchestrator.artifacts().load(contract)?;
        let name = options.name.clone().unwrap_or_else(|| contract.to_string());

        // Encoded before anything is sent, a bad initializer fails the whole deployment early.
        let init_data = if options.skip_initialization {
            tracing::warn!(name = %name, "Initialization skipped, the proxy must be initialized separately");
            Bytes::new()
        } else {
            encode_initializer(&artifact, &options.initializer, &initializer_args)?
        };

        let implementation = self
            .orchestrator
            .deploy_artifact(
                &format!("{name}_Implementation"),
                &artifact,
                params(Vec::new(), &options.overrides),
                false,
            )
            .await?
            .address;

        let (proxy_admin, proxy_admin_owner) = match options.proxy_admin {
            Some(admin) => {
                tracing::info!(name = %name, %admin, "Reusing existing proxy admin");
                (admin, None)
            }
            None => {
                let config = self.orchestrator.config();
                let owner = options
                    .proxy_admin_owner
                    .or(config.proxy_admin_owner)
                    .unwrap_or(config.deployer);
                let admin = self
                    .proxy_admin_named(
                        &format!("{name}_ProxyAdmin"),
                        owner,
                        options.overrides.clone(),
                    )
                    .await?
                    .address;
                (admin, Some(owner))
            }
        };

        let proxy = self
            .transparent_proxy_named(
                &name,
                implementation,
                proxy_admin,
                init_data.clone(),
                options.overrides.clone(),
            )
            .await?
            .address;

        tracing::info!(
            name = %name,
            %proxy,
            %implementation,
            %proxy_admin,
            initialized = !options.skip_initialization,
            "Upgradeable contract deployed"
        );

        Ok(ProxyDeploymentResult {
            implementation,
            proxy_admin,
            proxy_admin_owner,
            proxy,
            contract: artifact.at(name, proxy),
            initialized: !options.skip_initialization,
            init_data,
        })
    }

    async fn proxy_admin_named(
        &mut self,
        name: &str,
        owner: Address,
        overrides: Option<TxOverrides>,
    ) -> Result<DeploymentRecord, DeployError> {
        let artifact = self.orchestrator.artifacts().load(PROXY_ADMIN_CONTRACT)?;
        self.orchestrator
            .deploy_artifact(
                name,
                &artifact,
                params(vec![DynSolValue::Address(owner)], &overrides),
                false,
            )
            .await
    }

    async fn transparent_proxy_named(
        &mut self,
        name: &str,
        implementation: Address,
        proxy_admin: Address,
        init_data: Bytes,
        overrides: Option<TxOverrides>,
    ) -> Result<DeploymentRecord, DeployError> {
        let artifact = self
            .orchestrator
            .artifacts()
            .load(TRANSPARENT_PROXY_CONTRACT)?;
        let args = vec![
            DynSolValue::Address(implementation),
            DynSolValue::Address(proxy_admin),
            DynSolValue::Bytes(init_data.to_vec()),
        ];
        self.orchestrator
            .deploy_artifact(name, &artifact, params(args, &overrides), true)
            .await
    }
}

fn params(args: Vec<DynSolValue>, overrides: &Option<TxOverrides>) -> DeployParams {
    DeployParams {
        args,
        overrides: overrides.clone(),
    }
}

/// Call data of `initializer(args)` on the implementation.
///
/// Among overloads, the one taking as many inputs as there are arguments is used.
pub fn encode_initializer(
    artifact: &ContractArtifact,
    initializer: &str,
    args: &[DynSolValue],
) -> Result<Bytes, DeployError> {
    let what = format!("{}.{}", artifact.name, initializer);
    let function = artifact
        .abi
        .function(initializer)
        .and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == args.len()))
        .ok_or_else(|| {
            DeployError::encoding(
                &what,
                format!("no initializer taking {} arguments in the ABI", args.len()),
            )
        })?;

    function
        .abi_encode_input(args)
        .map(Bytes::from)
        .map_err(|e| DeployError::encoding(what, e))
}
