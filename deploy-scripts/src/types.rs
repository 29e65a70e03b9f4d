//! Type definitions used throughout the deploy scripts

use std::{
    fmt::{self, Display},
    time::Duration,
};

use alloy_primitives::{Address, TxHash};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CONFIRMATIONS, DEFAULT_CONFIRMATION_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_MS,
    ERC1967_PROXY_ARTIFACT, TRANSPARENT_PROXY_ARTIFACT,
};

/// The upgrade-authorization mechanism of the deployed proxy
#[derive(ValueEnum, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum ProxyKind {
    /// Universal Upgradeable Proxy Standard (ERC-1822): the implementation
    /// itself gates upgrades, the proxy is a bare `ERC1967Proxy`
    #[default]
    Uups,
    /// A `TransparentUpgradeableProxy`, which deploys its own `ProxyAdmin`
    /// owned by the deployer
    Transparent,
}

impl ProxyKind {
    /// The name of the proxy artifact deployed for this kind
    pub fn default_artifact(&self) -> &'static str {
        match self {
            ProxyKind::Uups => ERC1967_PROXY_ARTIFACT,
            ProxyKind::Transparent => TRANSPARENT_PROXY_ARTIFACT,
        }
    }

    /// The number of arguments the proxy constructor takes
    pub fn constructor_arity(&self) -> usize {
        match self {
            // (implementation, data)
            ProxyKind::Uups => 2,
            // (implementation, initialOwner, data)
            ProxyKind::Transparent => 3,
        }
    }
}

impl Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyKind::Uups => write!(f, "uups"),
            ProxyKind::Transparent => write!(f, "transparent"),
        }
    }
}

/// The phases of a deployment, in order
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeploymentPhase {
    /// Nothing has been submitted on-chain
    NotStarted,
    /// The implementation contract is confirmed on-chain
    ImplementationDeployed,
    /// The proxy is confirmed on-chain and initialized
    ProxyDeployedAndInitialized,
}

impl Display for DeploymentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentPhase::NotStarted => write!(f, "NotStarted"),
            DeploymentPhase::ImplementationDeployed => write!(f, "ImplementationDeployed"),
            DeploymentPhase::ProxyDeployedAndInitialized => {
                write!(f, "ProxyDeployedAndInitialized")
            }
        }
    }
}

/// The state of an in-progress deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentState {
    /// Nothing has been submitted on-chain
    NotStarted,
    /// The implementation is confirmed at the given address
    ImplementationDeployed {
        /// The address of the implementation contract
        implementation: Address,
    },
    /// Terminal success
    ProxyDeployedAndInitialized(DeploymentReceipt),
}

impl DeploymentState {
    /// The starting state of a deployment, optionally resuming from an
    /// implementation deployed by an earlier run
    pub fn starting_from(implementation: Option<Address>) -> Self {
        match implementation {
            Some(implementation) => DeploymentState::ImplementationDeployed { implementation },
            None => DeploymentState::NotStarted,
        }
    }

    /// The phase this state corresponds to
    pub fn phase(&self) -> DeploymentPhase {
        match self {
            DeploymentState::NotStarted => DeploymentPhase::NotStarted,
            DeploymentState::ImplementationDeployed { .. } => {
                DeploymentPhase::ImplementationDeployed
            }
            DeploymentState::ProxyDeployedAndInitialized(_) => {
                DeploymentPhase::ProxyDeployedAndInitialized
            }
        }
    }
}

/// The result of a successful deployment
///
/// Serializes to the record kept for the contract in the deployments file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentReceipt {
    /// The hash of the proxy deployment transaction
    pub transaction_hash: TxHash,
    /// The address of the proxy contract
    #[serde(rename = "proxy")]
    pub contract_address: Address,
    /// The address of the implementation the proxy points at
    #[serde(rename = "implementation")]
    pub implementation_address: Address,
    /// The address of the `ProxyAdmin` contract, for transparent proxies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_admin: Option<Address>,
}

/// How long, and how often, to wait for a transaction to be confirmed
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WaitPolicy {
    /// The upper bound on the time spent waiting for a single transaction
    pub timeout: Duration,
    /// The delay between receipt polls
    pub poll_interval: Duration,
    /// The number of blocks, including the inclusion block, required before
    /// a transaction is considered confirmed
    pub confirmations: u64,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_CONFIRMATION_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            confirmations: DEFAULT_CONFIRMATIONS,
        }
    }
}

/// The inputs to a deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRequest {
    /// The name of the implementation artifact
    pub implementation: String,
    /// The initializer arguments, in their string form
    pub initializer_args: Vec<String>,
    /// The kind of proxy to deploy
    pub kind: ProxyKind,
    /// Overrides the proxy artifact implied by `kind`
    pub proxy_artifact: Option<String>,
    /// An implementation deployed by an earlier run, to reuse instead of
    /// deploying a new one
    pub resume_from: Option<Address>,
}

impl DeploymentRequest {
    /// A fresh UUPS deployment of the given implementation
    pub fn new(implementation: impl Into<String>, initializer_args: Vec<String>) -> Self {
        Self {
            implementation: implementation.into(),
            initializer_args,
            kind: ProxyKind::Uups,
            proxy_artifact: None,
            resume_from: None,
        }
    }

    /// The name of the proxy artifact to deploy
    pub fn proxy_artifact(&self) -> &str {
        self.proxy_artifact.as_deref().unwrap_or_else(|| self.kind.default_artifact())
    }
}

/// The upgrade-relevant state of a deployed proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyInfo {
    /// The address of the proxy
    pub proxy: Address,
    /// The implementation stored in the EIP-1967 implementation slot
    pub implementation: Address,
    /// The admin stored in the EIP-1967 admin slot, if any
    pub admin: Option<Address>,
    /// The size of the proxy's runtime code
    pub code_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resumed_deployment_starts_after_phase_one() {
        assert_eq!(DeploymentState::starting_from(None).phase(), DeploymentPhase::NotStarted);

        let resumed = DeploymentState::starting_from(Some(Address::repeat_byte(0x01)));
        assert_eq!(resumed.phase(), DeploymentPhase::ImplementationDeployed);
        assert!(DeploymentPhase::NotStarted < resumed.phase());
    }

    #[test]
    fn test_proxy_artifact_override() {
        let mut request = DeploymentRequest::new("TokenTimelockVault", vec![]);
        assert_eq!(request.proxy_artifact(), ERC1967_PROXY_ARTIFACT);

        request.kind = ProxyKind::Transparent;
        assert_eq!(request.proxy_artifact(), TRANSPARENT_PROXY_ARTIFACT);

        request.proxy_artifact = Some("MyProxy".to_string());
        assert_eq!(request.proxy_artifact(), "MyProxy");
    }
}
