use std::process::ExitCode;

use clap::Parser;
use proxy_deploy::{cli::Cli, errors::ScriptError, types::WaitPolicy, utils::setup_client};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let Cli {
        priv_key,
        rpc_url,
        deployments_path,
        artifacts_dir,
        wait,
        command,
    } = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().pretty().with_env_filter(filter).init();

    let policy = WaitPolicy::from(&wait);
    let res = match setup_client(&priv_key, &rpc_url) {
        Ok(client) => {
            tokio::select! {
                res = command.run(client, artifacts_dir, deployments_path, policy) => res,
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted, transactions already submitted may still be mined");
                    Err(ScriptError::Interrupted)
                }
            }
        }
        Err(e) => Err(e),
    };

    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
