//! Utilities for the deploy scripts.

use std::{fs, path::Path, str::FromStr};

use alloy::{
    providers::{DynProvider, ProviderBuilder},
    signers::local::PrivateKeySigner,
    transports::http::reqwest::Url,
};
use alloy_primitives::Address;
use serde_json::{json, Map, Value};

use crate::{
    client::RpcClient,
    constants::{DEPLOYMENTS_KEY, PENDING_IMPLEMENTATION_KEY},
    errors::ScriptError,
    types::DeploymentReceipt,
};

/// Sets up the client with which to deploy, signing with the given private key
/// and sending to the given RPC url.
pub fn setup_client(priv_key: &str, rpc_url: &str) -> Result<RpcClient, ScriptError> {
    let signer = PrivateKeySigner::from_str(priv_key)
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    let url = Url::parse(rpc_url).map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;

    let sender = signer.address();
    let provider = ProviderBuilder::new().wallet(signer).connect_http(url);

    Ok(RpcClient::new(DynProvider::new(provider), sender))
}

/// Read the deployments file, treating a missing file as empty
fn read_deployments_file(file_path: &Path) -> Result<Value, ScriptError> {
    if !file_path.exists() {
        return Ok(json!({}));
    }

    let contents =
        fs::read_to_string(file_path).map_err(|e| ScriptError::ReadDeployments(e.to_string()))?;
    serde_json::from_str(&contents).map_err(|e| ScriptError::ReadDeployments(e.to_string()))
}

/// Write the deployments file
fn write_deployments_file(file_path: &Path, deployments: &Value) -> Result<(), ScriptError> {
    let contents = serde_json::to_string_pretty(deployments)
        .map_err(|e| ScriptError::WriteDeployments(e.to_string()))?;
    fs::write(file_path, contents).map_err(|e| ScriptError::WriteDeployments(e.to_string()))
}

/// Get a mutable reference to the record of the given contract, creating it if absent
fn record_mut<'a>(
    deployments: &'a mut Value,
    contract_key: &str,
) -> Result<&'a mut Map<String, Value>, ScriptError> {
    let malformed = || {
        ScriptError::ReadDeployments(format!(
            "deployments file has no JSON object for `{contract_key}`"
        ))
    };

    let root = deployments.as_object_mut().ok_or_else(malformed)?;
    let records = root.entry(DEPLOYMENTS_KEY).or_insert_with(|| json!({}));
    let record = records
        .as_object_mut()
        .ok_or_else(malformed)?
        .entry(contract_key)
        .or_insert_with(|| json!({}));

    record.as_object_mut().ok_or_else(malformed)
}

/// Check that a record for the given contract can be written to the deployments file.
///
/// Run before anything is submitted, so that a malformed file cannot lose the outcome of an
/// irreversible deployment.
pub fn check_deployments_file(file_path: &Path, contract_key: &str) -> Result<(), ScriptError> {
    let mut deployments = read_deployments_file(file_path)?;
    record_mut(&mut deployments, contract_key).map(|_| ())
}

/// Record a completed deployment in the deployments file, replacing any earlier record of
/// the contract
pub fn write_deployment_receipt(
    file_path: &Path,
    contract_key: &str,
    receipt: &DeploymentReceipt,
) -> Result<(), ScriptError> {
    let mut deployments = read_deployments_file(file_path)?;

    let record = serde_json::to_value(receipt)
        .map_err(|e| ScriptError::WriteDeployments(e.to_string()))?;
    *record_mut(&mut deployments, contract_key)? = record
        .as_object()
        .cloned()
        .ok_or_else(|| ScriptError::WriteDeployments("receipt is not an object".to_string()))?;

    write_deployments_file(file_path, &deployments)
}

/// Record an implementation whose proxy deployment failed, so that a later run can resume
/// from it instead of redeploying it.
///
/// Any completed deployment already recorded for the contract is left in place.
pub fn write_pending_implementation(
    file_path: &Path,
    contract_key: &str,
    implementation: Address,
) -> Result<(), ScriptError> {
    let mut deployments = read_deployments_file(file_path)?;

    record_mut(&mut deployments, contract_key)?
        .insert(PENDING_IMPLEMENTATION_KEY.to_string(), json!(format!("{implementation:#x}")));

    write_deployments_file(file_path, &deployments)
}

/// Read an address from a contract's record in the deployments file
pub fn read_deployed_address(
    file_path: &Path,
    contract_key: &str,
    field: &str,
) -> Result<Address, ScriptError> {
    let deployments = read_deployments_file(file_path)?;

    let addr_str = deployments[DEPLOYMENTS_KEY][contract_key][field].as_str().ok_or_else(|| {
        ScriptError::ReadDeployments(format!(
            "no `{field}` address recorded for `{contract_key}` in {}",
            file_path.display()
        ))
    })?;

    Address::from_str(addr_str).map_err(|e| ScriptError::ReadDeployments(e.to_string()))
}
