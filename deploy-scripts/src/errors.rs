//! Definitions of errors that can occur during deployment of an upgradeable proxy

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

use alloy_primitives::{Address, TxHash};

use crate::types::DeploymentPhase;

/// The kinds of failure the deployment orchestrator can report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The implementation (or proxy) artifact could not be resolved to
    /// deployable, upgrade-safe bytecode
    Compilation,
    /// The initializer arguments do not match the initializer signature
    ArgumentMismatch,
    /// A submitted transaction was rejected on-chain, or could not be submitted
    TransactionReverted,
    /// A submitted transaction was not confirmed within the wait policy
    ConfirmationTimeout,
}

impl ErrorKind {
    /// Whether the failed step may be retried.
    ///
    /// Only a confirmation timeout is retryable, and only by re-polling the
    /// same transaction hash.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::ConfirmationTimeout)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Compilation => write!(f, "CompilationError"),
            ErrorKind::ArgumentMismatch => write!(f, "ArgumentMismatchError"),
            ErrorKind::TransactionReverted => write!(f, "TransactionRevertedError"),
            ErrorKind::ConfirmationTimeout => write!(f, "ConfirmationTimeoutError"),
        }
    }
}

/// A failed deployment, along with any artifacts it produced before failing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentError {
    /// The kind of failure
    pub kind: ErrorKind,
    /// The last phase the deployment reached before failing
    pub phase: DeploymentPhase,
    /// A description of the failure
    pub message: String,
    /// The implementation address, if phase one produced one
    pub implementation_address: Option<Address>,
    /// The hash of the transaction the failure concerns, if one was submitted
    pub transaction_hash: Option<TxHash>,
}

impl DeploymentError {
    /// Construct an error with no partial artifacts attached
    pub fn new(kind: ErrorKind, phase: DeploymentPhase, message: impl Into<String>) -> Self {
        Self {
            kind,
            phase,
            message: message.into(),
            implementation_address: None,
            transaction_hash: None,
        }
    }

    /// Shorthand for a [`ErrorKind::Compilation`] error
    pub fn compilation(phase: DeploymentPhase, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Compilation, phase, message)
    }

    /// Shorthand for a [`ErrorKind::ArgumentMismatch`] error
    pub fn argument_mismatch(phase: DeploymentPhase, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ArgumentMismatch, phase, message)
    }

    /// Shorthand for a [`ErrorKind::TransactionReverted`] error
    pub fn reverted(phase: DeploymentPhase, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransactionReverted, phase, message)
    }

    /// Shorthand for a [`ErrorKind::ConfirmationTimeout`] error
    pub fn timeout(phase: DeploymentPhase, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfirmationTimeout, phase, message)
    }

    /// Attach the implementation address produced before the failure
    pub fn with_implementation(mut self, implementation: Address) -> Self {
        self.implementation_address = Some(implementation);
        self
    }

    /// Attach the hash of the transaction the failure concerns
    pub fn with_transaction(mut self, tx_hash: TxHash) -> Self {
        self.transaction_hash = Some(tx_hash);
        self
    }
}

impl Display for DeploymentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} at phase {}: {}", self.kind, self.phase, self.message)?;
        if let Some(implementation) = self.implementation_address {
            write!(f, " (implementation: {implementation:#x})")?;
        }
        if let Some(tx_hash) = self.transaction_hash {
            write!(f, " (transaction: {tx_hash:#x})")?;
        }

        Ok(())
    }
}

impl Error for DeploymentError {}

/// Errors that can occur during the execution of the deploy scripts
#[derive(Debug)]
pub enum ScriptError {
    /// Error initializing the RPC client
    ClientInitialization(String),
    /// Error reading the `deployments.json` file
    ReadDeployments(String),
    /// Error writing the `deployments.json` file
    WriteDeployments(String),
    /// Error calling a contract method or reading contract state
    ContractInteraction(String),
    /// The deployment orchestrator failed
    Deployment(DeploymentError),
    /// The run was interrupted before it completed
    Interrupted,
}

impl ScriptError {
    /// The process exit code the CLI reports for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            ScriptError::Deployment(e) => match e.kind {
                ErrorKind::Compilation => 2,
                ErrorKind::ArgumentMismatch => 3,
                ErrorKind::TransactionReverted => 4,
                ErrorKind::ConfirmationTimeout => 5,
            },
            ScriptError::Interrupted => 130,
            _ => 1,
        }
    }
}

impl Display for ScriptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::ClientInitialization(s) => write!(f, "error initializing client: {}", s),
            ScriptError::ReadDeployments(s) => write!(f, "error reading deployments: {}", s),
            ScriptError::WriteDeployments(s) => write!(f, "error writing deployments: {}", s),
            ScriptError::ContractInteraction(s) => {
                write!(f, "error interacting with contract: {}", s)
            }
            ScriptError::Deployment(e) => write!(f, "error deploying contract: {}", e),
            ScriptError::Interrupted => write!(f, "interrupted"),
        }
    }
}

impl Error for ScriptError {}

impl From<DeploymentError> for ScriptError {
    fn from(e: DeploymentError) -> Self {
        ScriptError::Deployment(e)
    }
}
