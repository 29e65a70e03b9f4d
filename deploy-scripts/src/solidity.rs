//! Definitions of Solidity functions called during and after deployment

use alloy_sol_types::sol;

sol! {
    /// ERC-1822 proxiable UUID, exposed by UUPS implementations
    function proxiableUUID() external view returns (bytes32);
    /// The UUPS upgrade entry point
    function upgradeToAndCall(address newImplementation, bytes memory data) external payable;
}
