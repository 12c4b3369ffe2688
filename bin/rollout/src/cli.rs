use std::path::PathBuf;

use alloy_core::primitives::Address;
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use rollout_deploy::{DeployTask, SETTINGS_FILENAME};
use serde_json::Value;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "rollout")]
#[command(
    author,
    version,
    about = "Deploy, record and verify price getter contracts on EVM networks"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "ROLLOUT_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the settings file, or to a directory containing `Rollout.toml`.
    ///
    /// A missing file is not an error: defaults and environment variables are used instead.
    #[arg(short, long, global = true, alias = "conf", env = "ROLLOUT_CONFIG", default_value = SETTINGS_FILENAME)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a deployment task, then verify the deployed contracts.
    Deploy(DeployArgs),
    /// Verify one contract on the network's block explorer.
    Verify(VerifyArgs),
    /// List the available deployment tasks.
    Tasks,
    /// Print the latest ledger snapshot of a task.
    Ledger(TaskArgs),
    /// Print the resolved settings.
    Config {
        /// Save the resolved settings to the settings file.
        #[arg(long)]
        write: bool,
    },
}

/// Selects the ledger of a task on a network.
#[derive(Debug, Clone, Args)]
pub struct TaskArgs {
    /// The deployment task.
    #[arg(long, alias = "task")]
    pub id: DeployTask,

    /// The network name, as declared in the settings or built in.
    #[arg(short, long, env = "ROLLOUT_NETWORK")]
    pub network: String,
}

#[derive(Debug, Clone, Args)]
pub struct DeployArgs {
    #[clap(flatten)]
    pub task: TaskArgs,

    /// Deploy every contract again, ignoring the previous snapshot.
    #[arg(long, default_value_t = false)]
    pub force: bool,

    /// Block explorer API key. Verification is skipped without one.
    #[arg(short, long)]
    pub key: Option<String>,

    /// The JSON-RPC endpoint, replaces the network's default.
    #[arg(long, alias = "rpc")]
    pub rpc_url: Option<String>,

    /// The deployer account, defaults to the node's first unlocked account.
    #[arg(long)]
    pub deployer: Option<Address>,

    /// Skip the verification of the deployed contracts.
    #[arg(long, default_value_t = false)]
    pub no_verify: bool,
}

#[derive(Debug, Clone, Args)]
pub struct VerifyArgs {
    #[clap(flatten)]
    pub task: TaskArgs,

    /// The recorded deployment name, or the artifact name of an unrecorded contract.
    #[arg(long)]
    pub name: String,

    /// The contract address, required when the contract is not in the ledger.
    #[arg(long)]
    pub address: Option<Address>,

    /// Constructor arguments as a JSON array, replaces the recorded ones.
    #[arg(long)]
    pub args: Option<String>,

    /// Block explorer API key.
    #[arg(short, long)]
    pub key: Option<String>,
}

impl VerifyArgs {
    /// The `--args` JSON array, if given.
    pub fn constructor_args(&self) -> anyhow::Result<Option<Vec<Value>>> {
        let Some(raw) = &self.args else {
            return Ok(None);
        };
        match serde_json::from_str(raw).context("--args is not valid JSON")? {
            Value::Array(values) => Ok(Some(values)),
            other => anyhow::bail!("--args must be a JSON array, got {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_deploy() {
        let cli = Cli::try_parse_from([
            "rollout",
            "deploy",
            "--id",
            "price-getter-extended",
            "--network",
            "bsc-fork",
            "--force",
        ])
        .unwrap();

        assert_eq!(cli.verbosity, LevelFilter::INFO);
        assert_eq!(cli.config, PathBuf::from(SETTINGS_FILENAME));
        let Command::Deploy(args) = cli.command else {
            panic!("expected the deploy command");
        };
        assert_eq!(args.task.id, DeployTask::PriceGetterExtended);
        assert_eq!(args.task.network, "bsc-fork");
        assert!(args.force);
        assert!(args.key.is_none());
    }

    #[test]
    fn test_parse_verify() {
        let cli = Cli::try_parse_from([
            "rollout",
            "-v",
            "debug",
            "verify",
            "--id",
            "price-getter",
            "--network",
            "polygon",
            "--name",
            "PriceGetter",
            "--address",
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
            "--args",
            r#"["0x0000000000000000000000000000000000000001"]"#,
        ])
        .unwrap();

        assert_eq!(cli.verbosity, LevelFilter::DEBUG);
        let Command::Verify(args) = cli.command else {
            panic!("expected the verify command");
        };
        assert_eq!(args.name, "PriceGetter");
        assert!(args.address.is_some());
        assert_eq!(
            args.constructor_args().unwrap(),
            Some(vec![Value::String(
                "0x0000000000000000000000000000000000000001".to_string()
            )])
        );
    }

    #[test]
    fn test_constructor_args_must_be_an_array() {
        let parse = |args: &str| {
            let cli = Cli::try_parse_from([
                "rollout", "verify", "--id", "price-getter", "--network", "bsc", "--name",
                "PriceGetter", "--args", args,
            ])
            .unwrap();
            match cli.command {
                Command::Verify(args) => args.constructor_args(),
                _ => unreachable!(),
            }
        };

        assert!(parse(r#"{"a": 1}"#).is_err());
        assert!(parse("not json").is_err());
        assert_eq!(parse("[]").unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_unknown_task_is_rejected() {
        assert!(
            Cli::try_parse_from(["rollout", "ledger", "--id", "nope", "--network", "bsc"]).is_err()
        );
    }
}
