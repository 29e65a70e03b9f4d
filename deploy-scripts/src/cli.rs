//! Definitions of CLI arguments and commands for deploy scripts

use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};

use crate::{
    artifacts::ArtifactDir,
    client::RpcClient,
    commands::{confirm, deploy_proxy, inspect},
    constants::{
        DEFAULT_ARTIFACTS_DIR, DEFAULT_CONFIRMATIONS, DEFAULT_CONFIRMATION_TIMEOUT_SECS,
        DEFAULT_DEPLOYMENTS_PATH, DEFAULT_POLL_INTERVAL_MS,
    },
    errors::ScriptError,
    types::{ProxyKind, WaitPolicy},
};

/// Deploy an upgradeable contract behind a proxy
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Private key of the deployer
    #[arg(short, long, env = "PKEY")]
    pub priv_key: String,

    /// Network RPC URL
    #[arg(short, long, env = "RPC_URL", default_value = "http://localhost:8545")]
    pub rpc_url: String,

    /// Path to the file recording deployed addresses
    #[arg(short, long, env = "DEPLOYMENTS_PATH", default_value = DEFAULT_DEPLOYMENTS_PATH)]
    pub deployments_path: PathBuf,

    /// Directory containing compiled contract artifacts
    #[arg(short, long, env = "ARTIFACTS_DIR", default_value = DEFAULT_ARTIFACTS_DIR)]
    pub artifacts_dir: PathBuf,

    #[command(flatten)]
    pub wait: WaitArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Arguments controlling how long to wait for transactions to be confirmed
#[derive(Args)]
pub struct WaitArgs {
    /// Seconds to wait for each transaction to be confirmed
    #[arg(long, default_value_t = DEFAULT_CONFIRMATION_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Milliseconds between receipt polls
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// Blocks required, including the inclusion block, before a transaction is confirmed
    #[arg(long, default_value_t = DEFAULT_CONFIRMATIONS)]
    pub confirmations: u64,
}

impl From<&WaitArgs> for WaitPolicy {
    fn from(args: &WaitArgs) -> Self {
        Self {
            timeout: Duration::from_secs(args.timeout_secs),
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            confirmations: args.confirmations,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    DeployProxy(DeployProxyArgs),
    Confirm(ConfirmArgs),
    Inspect(InspectArgs),
}

impl Command {
    pub async fn run(
        self,
        client: RpcClient,
        artifacts_dir: PathBuf,
        deployments_path: PathBuf,
        policy: WaitPolicy,
    ) -> Result<(), ScriptError> {
        match self {
            Command::DeployProxy(args) => {
                let artifacts = ArtifactDir::new(artifacts_dir);
                deploy_proxy(args, &client, &artifacts, &deployments_path, &policy).await?;
            }
            Command::Confirm(args) => {
                confirm(args, &client, &deployments_path, &policy).await?;
            }
            Command::Inspect(args) => inspect(args, &client).await?,
        }

        Ok(())
    }
}

/// Deploy an implementation contract and an upgradeable proxy in front of it.
///
/// The proxy is initialized in its constructor with the given initializer arguments.
/// For UUPS proxies, upgrades are gated by the implementation itself. For transparent
/// proxies, the proxy deploys a `ProxyAdmin` owned by the deployer.
#[derive(Args)]
pub struct DeployProxyArgs {
    /// Name of the implementation contract artifact, qualified as `<source>:<Contract>`
    /// when the name alone is ambiguous
    #[arg(short, long)]
    pub implementation: String,

    /// Initializer arguments, in order
    #[arg(long = "init-arg", num_args = 1, allow_hyphen_values = true)]
    pub init_args: Vec<String>,

    /// The kind of proxy to deploy
    #[arg(short, long, value_enum, default_value_t = ProxyKind::Uups)]
    pub kind: ProxyKind,

    /// Name of the proxy contract artifact, overriding the default for the proxy kind
    #[arg(long)]
    pub proxy_artifact: Option<String>,

    /// Address of an already deployed implementation to reuse
    #[arg(long, conflicts_with = "resume")]
    pub implementation_address: Option<String>,

    /// Reuse the pending implementation recorded for this contract in the deployments file
    #[arg(long)]
    pub resume: bool,
}

/// Wait for a deployment transaction that timed out to be confirmed, without resubmitting it.
///
/// Without `--implementation-address` the transaction is an implementation deployment, which
/// is recorded as pending for `deploy-proxy --resume`. With it, the transaction is a proxy
/// deployment against that implementation, which is verified and recorded.
#[derive(Args)]
pub struct ConfirmArgs {
    /// Name of the implementation contract artifact the deployment is recorded under
    #[arg(short, long)]
    pub contract: String,

    /// Hash of the pending transaction
    #[arg(long)]
    pub tx_hash: String,

    /// Address of the implementation the pending proxy deployment points at
    #[arg(long)]
    pub implementation_address: Option<String>,
}

/// Print the EIP-1967 state of a deployed proxy
#[derive(Args)]
pub struct InspectArgs {
    /// Address of the proxy contract
    #[arg(short, long)]
    pub proxy: String,
}
