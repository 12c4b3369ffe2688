//! rollout deploys price getter contracts, keeps a ledger of every deployment and verifies
//! them on the network's block explorer.

mod cli;
mod config;
mod summary;

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Command, DeployArgs, TaskArgs, VerifyArgs};
use rollout_deploy::{
    ArtifactStore, DeploymentLedger, EtherscanVerifier, JsonRpcClient, LedgerDocument,
    NetworkConfig, Orchestrator, OrchestratorConfig, Settings,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let settings = config::load_settings(&cli.config)?;

    match cli.command {
        Command::Deploy(args) => deploy(settings, args).await,
        Command::Verify(args) => verify(settings, args).await,
        Command::Tasks => {
            println!("{}", summary::tasks_table());
            Ok(())
        }
        Command::Ledger(args) => show_ledger(&settings, &args),
        Command::Config { write } => {
            println!(
                "{}",
                toml::to_string_pretty(&settings).context("Failed to serialize settings")?
            );
            if write {
                settings.save_to_file(&config::settings_path(&cli.config))?;
            }
            Ok(())
        }
    }
}

async fn deploy(settings: Settings, args: DeployArgs) -> Result<()> {
    let network = resolve_network(&settings, &args.task.network)?;
    let rpc_url = args
        .rpc_url
        .as_deref()
        .unwrap_or_else(|| settings.rpc_url(&network));
    let client = JsonRpcClient::new(rpc_url, &settings.rpc)?;

    let chain_id = client
        .chain_id()
        .await
        .with_context(|| format!("Failed to reach the JSON-RPC endpoint {}", client.url()))?;
    if chain_id != network.chain_id {
        // Local forks usually keep their own chain id.
        tracing::warn!(
            network = %network.name,
            expected = network.chain_id,
            actual = chain_id,
            "Chain id does not match the network configuration"
        );
    }

    let deployer = resolve_deployer(&client, args.deployer.or(settings.deployer)).await?;
    let task = args.task.id;

    let mut orchestrator = Orchestrator::new(
        client,
        network,
        ArtifactStore::new(settings.artifacts_dir.clone()),
        settings.ledger_dir.clone(),
        &task.to_string(),
        OrchestratorConfig::from_settings(&settings, deployer),
    )?;

    if args.force {
        tracing::info!("Forced run, previous deployments are ignored");
    } else if let Some(path) = orchestrator.resume()? {
        tracing::info!(
            path = %path.display(),
            records = orchestrator.ledger().len(),
            "Resuming from previous snapshot"
        );
    }

    let output = task.run(&mut orchestrator).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    let ledger = orchestrator.ledger();
    println!("{}", summary::ledger_table(ledger));
    println!("{}", summary::total_line(&ledger.total_cost()));

    if args.no_verify {
        return Ok(());
    }
    let Some(key) = args.key.or(settings.explorer_api_key) else {
        tracing::warn!("No block explorer API key, skipping verification");
        return Ok(());
    };

    let verifier = EtherscanVerifier::for_network(orchestrator.network(), key)?;
    let verification = orchestrator.verify_all(&verifier).await;
    println!("{}", summary::verification_table(&verification));
    if !verification.is_success() {
        tracing::warn!(
            failed = verification.failed.len(),
            "Some contracts could not be verified, retry them with `rollout verify`"
        );
    }

    Ok(())
}

async fn verify(settings: Settings, args: VerifyArgs) -> Result<()> {
    let network = resolve_network(&settings, &args.task.network)?;
    let constructor_args = args.constructor_args()?;
    let key = args
        .key
        .or_else(|| settings.explorer_api_key.clone())
        .context("A block explorer API key is required, pass --key or set explorer_api_key")?;
    let verifier = EtherscanVerifier::for_network(&network, key)?;

    // Nothing is sent, the client only satisfies the orchestrator.
    let client = JsonRpcClient::new(settings.rpc_url(&network), &settings.rpc)?;
    let deployer = settings.deployer.unwrap_or_default();

    let mut orchestrator = Orchestrator::new(
        client,
        network,
        ArtifactStore::new(settings.artifacts_dir.clone()),
        settings.ledger_dir.clone(),
        &args.task.id.to_string(),
        OrchestratorConfig::from_settings(&settings, deployer),
    )?;
    orchestrator.resume()?;

    let status = orchestrator
        .verify_one(&verifier, &args.name, args.address, constructor_args)
        .await?;
    println!("{}: {}", args.name, status);
    Ok(())
}

fn show_ledger(settings: &Settings, args: &TaskArgs) -> Result<()> {
    let mut ledger =
        DeploymentLedger::new(&settings.ledger_dir, &args.id.to_string(), &args.network);
    let path = ledger.latest_snapshot()?.with_context(|| {
        format!(
            "No deployment of {} recorded on {} in {}",
            args.id,
            args.network,
            ledger.dir().display()
        )
    })?;

    let recorded_total = LedgerDocument::read(&path)?.total_deployment_cost;
    ledger.load_existing(&path)?;
    let total = ledger.total_cost();
    if total != recorded_total {
        tracing::warn!(
            recorded = %recorded_total.cost,
            recomputed = %total.cost,
            "Recorded total cost differs from the recomputed one"
        );
    }

    println!("{}", path.display());
    println!("{}", summary::ledger_table(&ledger));
    println!("{}", summary::total_line(&total));
    Ok(())
}

fn resolve_network(settings: &Settings, name: &str) -> Result<NetworkConfig> {
    settings.network(name).with_context(|| {
        let known: Vec<&str> = NetworkConfig::builtin_names()
            .iter()
            .copied()
            .chain(settings.networks.keys().map(String::as_str))
            .collect();
        format!("Unknown or invalid network {name}, known networks: {}", known.join(", "))
    })
}

/// The configured deployer, or the node's first unlocked account.
async fn resolve_deployer(client: &JsonRpcClient, configured: Option<Address>) -> Result<Address> {
    if let Some(deployer) = configured {
        return Ok(deployer);
    }

    let accounts = client
        .accounts()
        .await
        .context("Failed to list the node's accounts")?;
    let deployer = accounts
        .first()
        .copied()
        .context("The node has no unlocked account, set `deployer` in the settings")?;
    tracing::info!(%deployer, "Using the node's first account");
    Ok(deployer)
}
