//! The upgradeable-proxy deployment orchestrator.
//!
//! A deployment moves through three states:
//!
//! `NotStarted → ImplementationDeployed → ProxyDeployedAndInitialized`
//!
//! Phase one deploys the implementation contract and waits for it to be confirmed. Phase two
//! deploys the proxy pointing at the confirmed implementation, passing the initializer calldata
//! to the proxy constructor so that the proxy is never live in an uninitialized state. A failure
//! in either phase aborts the deployment and reports the phase reached, along with the
//! implementation address if one was produced, so that the proxy deployment can be retried
//! against it.

use alloy::json_abi::JsonAbi;
use alloy_primitives::{Address, Bytes, TxHash, B256};
use alloy_sol_types::SolCall;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::{
    artifacts::{ArtifactSource, CompiledContract},
    calldata::{initializer_calldata, proxy_creation_code},
    client::{ChainClient, TxOutcome},
    constants::{
        IMPLEMENTATION_STORAGE_SLOT, NUM_BYTES_ADDRESS, NUM_BYTES_STORAGE_SLOT,
        PROXY_ADMIN_STORAGE_SLOT,
    },
    errors::DeploymentError,
    solidity::{proxiableUUIDCall, upgradeToAndCallCall},
    types::{
        DeploymentPhase, DeploymentReceipt, DeploymentRequest, DeploymentState, ProxyInfo,
        ProxyKind, WaitPolicy,
    },
};

/// Everything needed to deploy, resolved and validated before anything is submitted
struct PreparedDeployment {
    /// The implementation contract
    implementation: CompiledContract,
    /// The proxy contract
    proxy: CompiledContract,
    /// The calldata for the implementation's initializer
    init_calldata: Bytes,
}

/// Deploy an upgradeable proxy in front of the requested implementation, initializing it
/// with the requested arguments.
///
/// All artifact and argument validation happens before the first transaction is submitted.
/// If `request.resume_from` is set, phase one is skipped and the proxy is deployed against
/// that implementation.
pub async fn deploy<C: ChainClient, A: ArtifactSource>(
    client: &C,
    artifacts: &A,
    request: &DeploymentRequest,
    policy: &WaitPolicy,
) -> Result<DeploymentReceipt, DeploymentError> {
    let prepared = prepare(artifacts, request)?;

    let mut state = DeploymentState::starting_from(request.resume_from);
    loop {
        debug!("Deployment of `{}` at phase {}", request.implementation, state.phase());
        state = match state {
            DeploymentState::NotStarted => {
                let implementation =
                    deploy_implementation(client, &prepared.implementation, policy).await?;
                DeploymentState::ImplementationDeployed { implementation }
            }
            DeploymentState::ImplementationDeployed { implementation } => {
                let receipt =
                    deploy_proxy(client, &prepared, request.kind, implementation, policy)
                        .await
                        .map_err(|e| e.with_implementation(implementation))?;
                DeploymentState::ProxyDeployedAndInitialized(receipt)
            }
            DeploymentState::ProxyDeployedAndInitialized(receipt) => {
                info!("Proxy deployed at {:#x}", receipt.contract_address);
                return Ok(receipt);
            }
        };
    }
}

/// Resolve both artifacts and build the initializer calldata
fn prepare<A: ArtifactSource>(
    artifacts: &A,
    request: &DeploymentRequest,
) -> Result<PreparedDeployment, DeploymentError> {
    let phase = DeploymentPhase::NotStarted;

    let implementation = artifacts
        .resolve(&request.implementation)
        .map_err(|e| DeploymentError::compilation(phase, e.to_string()))?;
    check_upgrade_safety(&implementation.abi, request.kind)?;

    let proxy_name = request.proxy_artifact();
    let proxy = artifacts
        .resolve(proxy_name)
        .map_err(|e| DeploymentError::compilation(phase, e.to_string()))?;
    let proxy_arity = proxy.abi.constructor().map(|c| c.inputs.len()).unwrap_or_default();
    if proxy_arity != request.kind.constructor_arity() {
        return Err(DeploymentError::compilation(
            phase,
            format!(
                "`{proxy_name}` constructor takes {proxy_arity} arguments, a {} proxy takes {}",
                request.kind,
                request.kind.constructor_arity()
            ),
        ));
    }

    let init_calldata = initializer_calldata(&implementation.abi, &request.initializer_args)?;
    if init_calldata.is_empty() {
        warn!("`{}` has no initializer, the proxy will not be initialized", implementation.name);
    }

    Ok(PreparedDeployment {
        implementation,
        proxy,
        init_calldata,
    })
}

/// Check that the implementation can sit behind a proxy of the given kind
///
/// Proxies never run the implementation's constructor, so it must take no arguments. A UUPS
/// implementation must carry its own upgrade logic, otherwise the proxy could never be upgraded.
pub fn check_upgrade_safety(abi: &JsonAbi, kind: ProxyKind) -> Result<(), DeploymentError> {
    let phase = DeploymentPhase::NotStarted;

    if abi.constructor().is_some_and(|c| !c.inputs.is_empty()) {
        return Err(DeploymentError::compilation(
            phase,
            "upgradeable implementations must not take constructor arguments",
        ));
    }

    if kind == ProxyKind::Uups {
        for required in [proxiableUUIDCall::SIGNATURE, upgradeToAndCallCall::SIGNATURE] {
            if !abi.functions().any(|f| f.signature() == required) {
                return Err(DeploymentError::compilation(
                    phase,
                    format!("UUPS implementation is missing `{required}`"),
                ));
            }
        }
    }

    Ok(())
}

/// Phase one: deploy the implementation and wait for it to be confirmed
async fn deploy_implementation<C: ChainClient>(
    client: &C,
    implementation: &CompiledContract,
    policy: &WaitPolicy,
) -> Result<Address, DeploymentError> {
    let phase = DeploymentPhase::NotStarted;
    info!("Deploying implementation `{}`", implementation.name);

    let outcome =
        submit_and_confirm(client, None, implementation.bytecode.clone(), policy, phase).await?;
    let address = created_contract(client, &outcome, phase).await?;

    info!("Implementation `{}` deployed at {:#x}", implementation.name, address);
    Ok(address)
}

/// Phase two: deploy the proxy against a confirmed implementation, initializing it in the
/// same transaction
async fn deploy_proxy<C: ChainClient>(
    client: &C,
    prepared: &PreparedDeployment,
    kind: ProxyKind,
    implementation: Address,
    policy: &WaitPolicy,
) -> Result<DeploymentReceipt, DeploymentError> {
    let phase = DeploymentPhase::ImplementationDeployed;
    check_implementation(client, implementation, kind).await?;

    info!("Deploying {} proxy `{}` for {:#x}", kind, prepared.proxy.name, implementation);
    let creation_code = proxy_creation_code(
        &prepared.proxy,
        kind,
        implementation,
        client.sender(),
        prepared.init_calldata.clone(),
    );
    let outcome = submit_and_confirm(client, None, creation_code, policy, phase).await?;
    verify_proxy(client, &outcome, implementation, phase).await
}

/// Check that a confirmed proxy creation left code behind and that the proxy's EIP-1967
/// implementation slot points at `implementation`
async fn verify_proxy<C: ChainClient>(
    client: &C,
    outcome: &TxOutcome,
    implementation: Address,
    phase: DeploymentPhase,
) -> Result<DeploymentReceipt, DeploymentError> {
    let tx_hash = outcome.transaction_hash;
    let proxy = created_contract(client, outcome, phase).await?;

    let info = inspect_proxy(client, proxy)
        .await
        .map_err(|e| DeploymentError { phase, ..e }.with_transaction(tx_hash))?;
    if info.implementation != implementation {
        return Err(DeploymentError::reverted(
            phase,
            format!(
                "proxy at {proxy:#x} points at {:#x}, expected {implementation:#x}",
                info.implementation
            ),
        )
        .with_transaction(tx_hash));
    }

    Ok(DeploymentReceipt {
        transaction_hash: tx_hash,
        contract_address: proxy,
        implementation_address: implementation,
        proxy_admin: info.admin,
    })
}

/// Pick up a deployment whose creation transaction timed out, by re-polling its hash.
///
/// Without an `implementation`, the transaction is the implementation creation of phase one
/// and the deployment resumes at [`DeploymentState::ImplementationDeployed`]. With one, it is
/// the proxy creation of phase two, which is verified exactly as [`deploy`] verifies it.
/// Nothing is resubmitted.
pub async fn confirm_deployment<C: ChainClient>(
    client: &C,
    tx_hash: TxHash,
    implementation: Option<Address>,
    policy: &WaitPolicy,
) -> Result<DeploymentState, DeploymentError> {
    let Some(implementation) = implementation else {
        let phase = DeploymentPhase::NotStarted;
        let outcome = await_confirmation(client, tx_hash, policy, phase).await?;
        let implementation = created_contract(client, &outcome, phase).await?;

        info!("Implementation confirmed at {:#x}", implementation);
        return Ok(DeploymentState::ImplementationDeployed { implementation });
    };

    let phase = DeploymentPhase::ImplementationDeployed;
    let outcome = await_confirmation(client, tx_hash, policy, phase)
        .await
        .map_err(|e| e.with_implementation(implementation))?;
    let receipt = verify_proxy(client, &outcome, implementation, phase)
        .await
        .map_err(|e| e.with_implementation(implementation))?;

    info!("Proxy confirmed at {:#x}", receipt.contract_address);
    Ok(DeploymentState::ProxyDeployedAndInitialized(receipt))
}

/// Check that there is a deployed implementation at the given address, and that a UUPS
/// implementation reports the EIP-1967 implementation slot as its proxiable UUID
async fn check_implementation<C: ChainClient>(
    client: &C,
    implementation: Address,
    kind: ProxyKind,
) -> Result<(), DeploymentError> {
    let phase = DeploymentPhase::ImplementationDeployed;

    let code = client
        .code_at(implementation)
        .await
        .map_err(|e| DeploymentError::reverted(phase, e.to_string()))?;
    if code.is_empty() {
        return Err(DeploymentError::argument_mismatch(
            phase,
            format!("no contract code at implementation address {implementation:#x}"),
        ));
    }

    if kind == ProxyKind::Uups {
        let uuid = client
            .call(implementation, proxiableUUIDCall {}.abi_encode().into())
            .await
            .map_err(|e| DeploymentError::compilation(phase, e.to_string()))?;
        let uuid = proxiableUUIDCall::abi_decode_returns(&uuid)
            .map_err(|e| DeploymentError::compilation(phase, e.to_string()))?;
        if uuid != IMPLEMENTATION_STORAGE_SLOT {
            return Err(DeploymentError::compilation(
                phase,
                format!("implementation reports unsupported proxiable UUID {uuid:#x}"),
            ));
        }
    }

    Ok(())
}

/// Read the contract address from a creation transaction outcome and check that it holds code
async fn created_contract<C: ChainClient>(
    client: &C,
    outcome: &TxOutcome,
    phase: DeploymentPhase,
) -> Result<Address, DeploymentError> {
    let tx_hash = outcome.transaction_hash;
    let address = outcome.contract_address.ok_or_else(|| {
        DeploymentError::reverted(phase, "receipt has no contract address")
            .with_transaction(tx_hash)
    })?;

    let code = client
        .code_at(address)
        .await
        .map_err(|e| DeploymentError::reverted(phase, e.to_string()).with_transaction(tx_hash))?;
    if code.is_empty() {
        return Err(DeploymentError::reverted(
            phase,
            format!("no contract code at created address {address:#x}"),
        )
        .with_transaction(tx_hash));
    }

    Ok(address)
}

/// Submit a transaction and wait for it to be confirmed successfully.
///
/// A submission error (including failed gas estimation) and a reverted receipt both surface
/// as [`ErrorKind::TransactionReverted`](crate::errors::ErrorKind::TransactionReverted).
pub async fn submit_and_confirm<C: ChainClient>(
    client: &C,
    to: Option<Address>,
    input: Bytes,
    policy: &WaitPolicy,
    phase: DeploymentPhase,
) -> Result<TxOutcome, DeploymentError> {
    let tx_hash = client
        .send_transaction(to, input)
        .await
        .map_err(|e| DeploymentError::reverted(phase, format!("error sending transaction: {e}")))?;
    info!("Submitted transaction {:#x}", tx_hash);

    await_confirmation(client, tx_hash, policy, phase).await
}

/// Wait for an already submitted transaction to be confirmed successfully.
///
/// This is the recovery path for a
/// [`ErrorKind::ConfirmationTimeout`](crate::errors::ErrorKind::ConfirmationTimeout): it polls
/// the same hash and never resubmits.
pub async fn await_confirmation<C: ChainClient>(
    client: &C,
    tx_hash: TxHash,
    policy: &WaitPolicy,
    phase: DeploymentPhase,
) -> Result<TxOutcome, DeploymentError> {
    let outcome = timeout(policy.timeout, poll_until_confirmed(client, tx_hash, policy))
        .await
        .map_err(|_| {
            DeploymentError::timeout(
                phase,
                format!("transaction not confirmed within {:?}", policy.timeout),
            )
            .with_transaction(tx_hash)
        })?;

    if !outcome.success {
        return Err(
            DeploymentError::reverted(phase, "transaction reverted").with_transaction(tx_hash)
        );
    }

    Ok(outcome)
}

/// Poll for a receipt until one is found and buried under enough blocks
async fn poll_until_confirmed<C: ChainClient>(
    client: &C,
    tx_hash: TxHash,
    policy: &WaitPolicy,
) -> TxOutcome {
    loop {
        match client.transaction_receipt(tx_hash).await {
            Ok(Some(outcome)) => match is_buried(client, &outcome, policy.confirmations).await {
                Ok(true) => return outcome,
                Ok(false) => {}
                Err(e) => warn!("error fetching block number: {}", e),
            },
            Ok(None) => {}
            Err(e) => warn!("error fetching receipt for {:#x}: {}", tx_hash, e),
        }

        sleep(policy.poll_interval).await;
    }
}

/// Whether the transaction's block has the required number of confirmations
async fn is_buried<C: ChainClient>(
    client: &C,
    outcome: &TxOutcome,
    confirmations: u64,
) -> Result<bool, crate::client::ClientError> {
    let Some(included_at) = outcome.block_number else {
        return Ok(confirmations <= 1);
    };
    if confirmations <= 1 {
        return Ok(true);
    }

    let latest = client.block_number().await?;
    Ok(latest.saturating_sub(included_at) + 1 >= confirmations)
}

/// Read the EIP-1967 implementation and admin slots of a proxy
pub async fn inspect_proxy<C: ChainClient>(
    client: &C,
    proxy: Address,
) -> Result<ProxyInfo, DeploymentError> {
    let phase = DeploymentPhase::ProxyDeployedAndInitialized;
    let read_err = |e: crate::client::ClientError| DeploymentError::reverted(phase, e.to_string());

    let code = client.code_at(proxy).await.map_err(read_err)?;
    let implementation_slot =
        client.storage_at(proxy, IMPLEMENTATION_STORAGE_SLOT).await.map_err(read_err)?;
    let admin_slot = client.storage_at(proxy, PROXY_ADMIN_STORAGE_SLOT).await.map_err(read_err)?;
    let implementation = slot_to_address(implementation_slot);
    let admin = slot_to_address(admin_slot);

    Ok(ProxyInfo {
        proxy,
        implementation,
        admin: (!admin.is_zero()).then_some(admin),
        code_size: code.len(),
    })
}

/// Extract the address stored in the low-order bytes of a storage slot
fn slot_to_address(slot: B256) -> Address {
    Address::from_slice(&slot[NUM_BYTES_STORAGE_SLOT - NUM_BYTES_ADDRESS..NUM_BYTES_STORAGE_SLOT])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_slot_to_address() {
        let mut slot = B256::ZERO;
        slot[12..].copy_from_slice(Address::repeat_byte(0x42).as_slice());
        assert_eq!(slot_to_address(slot), Address::repeat_byte(0x42));
    }

    #[test]
    fn test_uups_requires_upgrade_logic() {
        let plain = JsonAbi::parse(["function initialize(address token)"]).unwrap();
        let err = check_upgrade_safety(&plain, ProxyKind::Uups).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Compilation);
        assert!(check_upgrade_safety(&plain, ProxyKind::Transparent).is_ok());

        let uups = JsonAbi::parse([
            "function initialize(address token)",
            "function proxiableUUID() view returns (bytes32)",
            "function upgradeToAndCall(address newImplementation, bytes data) payable",
        ])
        .unwrap();
        assert!(check_upgrade_safety(&uups, ProxyKind::Uups).is_ok());
    }

    #[test]
    fn test_reject_constructor_arguments() {
        let abi = JsonAbi::parse(["constructor(address token)"]).unwrap();
        let err = check_upgrade_safety(&abi, ProxyKind::Transparent).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Compilation);
    }
}
