//! Implementations of the various deploy scripts

use std::{path::Path, str::FromStr};

use alloy_primitives::{Address, TxHash};
use tracing::{info, warn};

use crate::{
    artifacts::ArtifactSource,
    cli::{ConfirmArgs, DeployProxyArgs, InspectArgs},
    client::ChainClient,
    constants::PENDING_IMPLEMENTATION_KEY,
    deploy::{confirm_deployment, deploy, inspect_proxy},
    errors::{DeploymentError, ErrorKind, ScriptError},
    types::{DeploymentPhase, DeploymentReceipt, DeploymentRequest, DeploymentState, WaitPolicy},
    utils::{
        check_deployments_file, read_deployed_address, write_deployment_receipt,
        write_pending_implementation,
    },
};

pub async fn deploy_proxy<C: ChainClient, A: ArtifactSource>(
    args: DeployProxyArgs,
    client: &C,
    artifacts: &A,
    deployments_path: &Path,
    policy: &WaitPolicy,
) -> Result<DeploymentReceipt, ScriptError> {
    check_deployments_file(deployments_path, &args.implementation)?;

    let resume_from = if args.resume {
        let address = read_deployed_address(
            deployments_path,
            &args.implementation,
            PENDING_IMPLEMENTATION_KEY,
        )?;
        info!("Resuming from implementation {:#x}", address);
        Some(address)
    } else {
        parse_implementation_address(args.implementation_address.as_deref())?
    };

    let request = DeploymentRequest {
        implementation: args.implementation,
        initializer_args: args.init_args,
        kind: args.kind,
        proxy_artifact: args.proxy_artifact,
        resume_from,
    };

    match deploy(client, artifacts, &request, policy).await {
        Ok(receipt) => {
            record_receipt(deployments_path, &request.implementation, &receipt);
            Ok(receipt)
        }
        Err(e) => {
            report_failure(deployments_path, &request.implementation, &e);
            Err(e.into())
        }
    }
}

pub async fn confirm<C: ChainClient>(
    args: ConfirmArgs,
    client: &C,
    deployments_path: &Path,
    policy: &WaitPolicy,
) -> Result<DeploymentState, ScriptError> {
    check_deployments_file(deployments_path, &args.contract)?;

    let tx_hash = TxHash::from_str(&args.tx_hash)
        .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;
    let implementation = parse_implementation_address(args.implementation_address.as_deref())?;

    let state = match confirm_deployment(client, tx_hash, implementation, policy).await {
        Ok(state) => state,
        Err(e) => {
            report_failure(deployments_path, &args.contract, &e);
            return Err(e.into());
        }
    };

    match &state {
        DeploymentState::ProxyDeployedAndInitialized(receipt) => {
            record_receipt(deployments_path, &args.contract, receipt);
        }
        DeploymentState::ImplementationDeployed { implementation } => {
            println!("Implementation: {implementation:#x}");
            info!(
                "Rerun `deploy-proxy --implementation {} --resume` to deploy its proxy",
                args.contract
            );
            record_pending_implementation(deployments_path, &args.contract, *implementation);
        }
        DeploymentState::NotStarted => {}
    }

    Ok(state)
}

pub async fn inspect<C: ChainClient>(args: InspectArgs, client: &C) -> Result<(), ScriptError> {
    let proxy = Address::from_str(&args.proxy)
        .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;

    let info = inspect_proxy(client, proxy)
        .await
        .map_err(|e| ScriptError::ContractInteraction(e.message))?;

    if info.code_size == 0 {
        warn!("No contract code at {:#x}", proxy);
    }

    println!("Proxy: {:#x}", info.proxy);
    println!("Implementation: {:#x}", info.implementation);
    if let Some(admin) = info.admin {
        println!("Proxy admin: {admin:#x}");
    }

    Ok(())
}

/// Parse an implementation address given on the command line
fn parse_implementation_address(addr: Option<&str>) -> Result<Option<Address>, DeploymentError> {
    addr.map(|addr| {
        Address::from_str(addr).map_err(|e| {
            DeploymentError::argument_mismatch(DeploymentPhase::NotStarted, e.to_string())
        })
    })
    .transpose()
}

/// Print a completed deployment, then record it in the deployments file.
///
/// The deployment is already on-chain, so a failure to record it is only logged.
fn record_receipt(deployments_path: &Path, contract_key: &str, receipt: &DeploymentReceipt) {
    info!(
        "Deployed `{}`: proxy {:#x}, implementation {:#x}",
        contract_key, receipt.contract_address, receipt.implementation_address
    );
    println!("Hash: {:#x}", receipt.transaction_hash);
    println!("Address: {:#x}", receipt.contract_address);
    if let Some(admin) = receipt.proxy_admin {
        println!("Proxy admin: {admin:#x}");
    }

    if let Err(e) = write_deployment_receipt(deployments_path, contract_key, receipt) {
        warn!(
            "Failed to record `{}` (hash {:#x}, proxy {:#x}, implementation {:#x}): {}",
            contract_key,
            receipt.transaction_hash,
            receipt.contract_address,
            receipt.implementation_address,
            e
        );
    }
}

/// Record an implementation awaiting its proxy, logging a failure to do so
fn record_pending_implementation(deployments_path: &Path, contract_key: &str, address: Address) {
    if let Err(e) = write_pending_implementation(deployments_path, contract_key, address) {
        warn!("Failed to record pending implementation {:#x}: {}", address, e);
    }
}

/// Log how to recover from a failed deployment
///
/// A timed-out transaction may still be mined, so the only safe recovery is to confirm it by
/// hash. An implementation left behind by a reverted proxy deployment is recorded for
/// `--resume`.
fn report_failure(deployments_path: &Path, contract_key: &str, e: &DeploymentError) {
    if e.kind.is_retryable() {
        let Some(tx_hash) = e.transaction_hash else {
            return;
        };
        let implementation = e
            .implementation_address
            .map(|addr| format!(" --implementation-address {addr:#x}"))
            .unwrap_or_default();
        warn!(
            "Transaction {:#x} may still be mined, do not redeploy; rerun \
             `confirm --contract {} --tx-hash {:#x}{}` to pick it up",
            tx_hash, contract_key, tx_hash, implementation
        );
        return;
    }

    if let (ErrorKind::TransactionReverted, Some(implementation)) =
        (e.kind, e.implementation_address)
    {
        warn!(
            "Proxy deployment failed, implementation left at {:#x}; \
             rerun with `--resume` to reuse it",
            implementation
        );
        record_pending_implementation(deployments_path, contract_key, implementation);
    }
}
