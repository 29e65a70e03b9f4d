//! Constants used in the deploy scripts

use alloy_primitives::{b256, B256};

/// The name of the proxy artifact deployed for UUPS proxies
///
/// Compiled from OpenZeppelin Contracts v5.0.0,
/// `contracts/proxy/ERC1967/ERC1967Proxy.sol`
pub const ERC1967_PROXY_ARTIFACT: &str = "ERC1967Proxy";

/// The name of the proxy artifact deployed for transparent proxies
///
/// Compiled from OpenZeppelin Contracts v5.0.0,
/// `contracts/proxy/transparent/TransparentUpgradeableProxy.sol`
pub const TRANSPARENT_PROXY_ARTIFACT: &str = "TransparentUpgradeableProxy";

/// The name of the initializer entry point on upgradeable implementations
pub const INITIALIZER_FN: &str = "initialize";

/// The storage slot containing the implementation address in the upgradeable proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#logic-contract-address
pub const IMPLEMENTATION_STORAGE_SLOT: B256 =
    b256!("360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc");

/// The storage slot containing the proxy admin contract address in the upgradeable proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#admin-address
pub const PROXY_ADMIN_STORAGE_SLOT: B256 =
    b256!("b53127684a568b3173ae13b9f8a6016e243e63b6e8ee1178d6a717850b5d6103");

/// The number of bytes stored in a single storage slot
pub const NUM_BYTES_STORAGE_SLOT: usize = 32;

/// The number of bytes in an Ethereum address
pub const NUM_BYTES_ADDRESS: usize = 20;

/// The default upper bound on the time spent waiting for one transaction
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 120;

/// The default delay between transaction receipt polls
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// The default number of blocks to wait for, including the inclusion block
pub const DEFAULT_CONFIRMATIONS: u64 = 1;

/// The default path of the deployments file
pub const DEFAULT_DEPLOYMENTS_PATH: &str = "deployments.json";

/// The default directory searched for compiled contract artifacts
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

/// The extension of a compiled contract artifact
pub const ARTIFACT_EXTENSION: &str = "json";

/// The marker solc leaves in bytecode for unlinked library addresses
pub const UNLINKED_LIBRARY_MARKER: &str = "__$";

/// The deployments key in the `deployments.json` file
pub const DEPLOYMENTS_KEY: &str = "deployments";

/// The implementation contract key of a deployment record
pub const IMPLEMENTATION_KEY: &str = "implementation";

/// The key of a deployment record holding an implementation whose proxy has not been deployed
pub const PENDING_IMPLEMENTATION_KEY: &str = "pending_implementation";

/// The proxy contract key of a deployment record
pub const PROXY_KEY: &str = "proxy";

/// The proxy deployment transaction key of a deployment record
pub const TRANSACTION_HASH_KEY: &str = "transaction_hash";

/// The proxy admin contract key of a deployment record
pub const PROXY_ADMIN_KEY: &str = "proxy_admin";
