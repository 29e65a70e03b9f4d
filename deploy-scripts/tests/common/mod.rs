//! An in-memory chain used to exercise the deployment orchestrator.
//!
//! The chain understands exactly three kinds of creation code, distinguished by prefix: a
//! token vault implementation, an `ERC1967Proxy`, and a `TransparentUpgradeableProxy`. Proxy
//! construction decodes its constructor arguments, writes the EIP-1967 slots, and runs the
//! initializer against the proxy's storage, as the real contracts do.

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::Duration,
};

use alloy::json_abi::JsonAbi;
use alloy_primitives::{keccak256, Address, Bytes, TxHash, B256};
use alloy_sol_types::{sol, SolCall, SolValue};
use proxy_deploy::{
    artifacts::CompiledContract,
    client::{ChainClient, ClientError, TxOutcome},
    constants::{IMPLEMENTATION_STORAGE_SLOT, PROXY_ADMIN_STORAGE_SLOT},
    types::WaitPolicy,
};

sol! {
    function initialize(address token) external;
    function token() external view returns (address);
    function proxiableUUID() external view returns (bytes32);
}

/// The name of the vault implementation artifact
pub const VAULT: &str = "TokenTimelockVault";
/// A mainnet ERC-20 address used as the initializer argument
pub const TOKEN: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";

/// A wait policy short enough to exercise timeouts quickly
pub fn fast_policy() -> WaitPolicy {
    WaitPolicy {
        timeout: Duration::from_millis(200),
        poll_interval: Duration::from_millis(10),
        confirmations: 1,
    }
}

/// Creation code of the vault implementation
const VAULT_CODE: [u8; 2] = [0x60, 0x01];
/// Creation code prefix of the UUPS proxy
const ERC1967_PROXY_CODE: [u8; 2] = [0x60, 0x02];
/// Creation code prefix of the transparent proxy
const TRANSPARENT_PROXY_CODE: [u8; 2] = [0x60, 0x03];
/// Runtime code given to every deployed contract
const RUNTIME_CODE: [u8; 1] = [0xfe];

/// The vault's storage slot holding the token address
const TOKEN_SLOT: B256 = B256::ZERO;
/// The vault's storage slot holding the initialized flag
const INITIALIZED_SLOT: B256 = B256::with_last_byte(1);

/// The artifacts known to the simulated chain
pub fn artifacts() -> HashMap<String, CompiledContract> {
    let vault_abi = JsonAbi::parse([
        "function initialize(address token)",
        "function token() view returns (address)",
        "function proxiableUUID() view returns (bytes32)",
        "function upgradeToAndCall(address newImplementation, bytes data) payable",
    ])
    .unwrap();
    let erc1967_abi =
        JsonAbi::parse(["constructor(address implementation, bytes _data) payable"]).unwrap();
    let transparent_abi =
        JsonAbi::parse(["constructor(address _logic, address initialOwner, bytes _data) payable"])
            .unwrap();

    [
        (VAULT, vault_abi, &VAULT_CODE),
        ("ERC1967Proxy", erc1967_abi, &ERC1967_PROXY_CODE),
        ("TransparentUpgradeableProxy", transparent_abi, &TRANSPARENT_PROXY_CODE),
    ]
    .into_iter()
    .map(|(name, abi, code)| {
        let contract = CompiledContract {
            name: name.to_string(),
            abi,
            bytecode: Bytes::copy_from_slice(code),
        };
        (name.to_string(), contract)
    })
    .collect()
}

/// A deployed account
#[derive(Default, Clone)]
struct Account {
    /// Runtime code
    code: Bytes,
    /// Storage
    storage: HashMap<B256, B256>,
    /// Whether this account is a proxy
    is_proxy: bool,
}

/// The mutable state of the chain
#[derive(Default)]
struct ChainState {
    /// The deployer nonce
    nonce: u64,
    /// The latest block
    block: u64,
    /// Deployed accounts
    accounts: HashMap<Address, Account>,
    /// Receipts of mined transactions
    receipts: HashMap<TxHash, TxOutcome>,
    /// Hashes whose receipts are withheld from the client
    withheld: HashSet<TxHash>,
    /// The number of transactions submitted
    submissions: usize,
    /// Creation transactions made with these code prefixes revert
    reverting_prefixes: Vec<[u8; 2]>,
    /// Whether receipts of new transactions are withheld
    withhold_receipts: bool,
    /// Receipts of creations made with these code prefixes are withheld
    withheld_prefixes: Vec<[u8; 2]>,
    /// Whether every block number query sees a new block
    advance_on_poll: bool,
    /// Whether creations succeed without leaving code behind
    drop_code: bool,
    /// An error returned when sending a transaction
    send_error: Option<String>,
}

/// An in-memory chain with a single funded deployer
pub struct SimulatedChain {
    /// The deployer address
    sender: Address,
    /// The chain state
    state: Mutex<ChainState>,
}

impl Default for SimulatedChain {
    fn default() -> Self {
        Self {
            sender: Address::repeat_byte(0xde),
            state: Mutex::default(),
        }
    }
}

impl SimulatedChain {
    /// The number of transactions submitted so far
    pub fn submissions(&self) -> usize {
        self.state.lock().unwrap().submissions
    }

    /// Make every proxy creation revert
    pub fn revert_proxy_creations(&self) {
        let mut state = self.state.lock().unwrap();
        state.reverting_prefixes.extend([ERC1967_PROXY_CODE, TRANSPARENT_PROXY_CODE]);
    }

    /// Stop reverting creations
    pub fn clear_reverts(&self) {
        self.state.lock().unwrap().reverting_prefixes.clear();
    }

    /// Withhold receipts of transactions submitted from now on
    pub fn withhold_receipts(&self) {
        self.state.lock().unwrap().withhold_receipts = true;
    }

    /// Withhold receipts of proxy creations submitted from now on
    pub fn withhold_proxy_receipts(&self) {
        let mut state = self.state.lock().unwrap();
        state.withheld_prefixes.extend([ERC1967_PROXY_CODE, TRANSPARENT_PROXY_CODE]);
    }

    /// Release all withheld receipts
    pub fn release_receipts(&self) {
        let mut state = self.state.lock().unwrap();
        state.withhold_receipts = false;
        state.withheld_prefixes.clear();
        state.withheld.clear();
    }

    /// Mine an empty block every time the block number is queried, as a busy chain would
    pub fn advance_blocks_on_poll(&self) {
        self.state.lock().unwrap().advance_on_poll = true;
    }

    /// The latest block
    pub fn block(&self) -> u64 {
        self.state.lock().unwrap().block
    }

    /// Make creations succeed without leaving code behind
    pub fn drop_code(&self) {
        self.state.lock().unwrap().drop_code = true;
    }

    /// Fail every send with the given error
    pub fn fail_sends(&self, msg: &str) {
        self.state.lock().unwrap().send_error = Some(msg.to_string());
    }

    /// Mine a transaction, returning its hash
    fn mine(&self, to: Option<Address>, input: &[u8]) -> TxHash {
        let mut state = self.state.lock().unwrap();
        let nonce = state.nonce;
        state.nonce += 1;
        state.block += 1;
        state.submissions += 1;

        let tx_hash = keccak256([self.sender.as_slice(), &nonce.to_be_bytes()[..]].concat());
        let (success, contract_address) = match to {
            None => {
                let address = self.sender.create(nonce);
                let success = create(&mut state, address, input);
                (success, success.then_some(address))
            }
            Some(to) => (execute(&mut state, to, input), None),
        };

        let outcome = TxOutcome {
            transaction_hash: tx_hash,
            success,
            contract_address,
            block_number: Some(state.block),
        };
        state.receipts.insert(tx_hash, outcome);
        if state.withhold_receipts || state.withheld_prefixes.iter().any(|p| input.starts_with(p)) {
            state.withheld.insert(tx_hash);
        }

        tx_hash
    }
}

/// Run creation code, returning whether it succeeded
fn create(state: &mut ChainState, address: Address, input: &[u8]) -> bool {
    if input.len() < 2 || state.reverting_prefixes.iter().any(|p| input.starts_with(p)) {
        return false;
    }

    let (prefix, args) = input.split_at(2);
    let mut account = Account::default();
    if prefix == VAULT_CODE {
        if !args.is_empty() {
            return false;
        }
    } else if prefix == ERC1967_PROXY_CODE {
        let Ok((implementation, data)) = <(Address, Bytes)>::abi_decode_params(args) else {
            return false;
        };
        if !construct_proxy(state, &mut account, implementation, &data) {
            return false;
        }
    } else if prefix == TRANSPARENT_PROXY_CODE {
        let Ok((implementation, _owner, data)) =
            <(Address, Address, Bytes)>::abi_decode_params(args)
        else {
            return false;
        };
        if !construct_proxy(state, &mut account, implementation, &data) {
            return false;
        }
        // The proxy deploys its own admin, owned by `_owner`
        let admin = address.create(1);
        account.storage.insert(PROXY_ADMIN_STORAGE_SLOT, admin.into_word());
    } else {
        return false;
    }

    if !state.drop_code {
        account.code = Bytes::from_static(&RUNTIME_CODE);
    }
    state.accounts.insert(address, account);
    true
}

/// Point a proxy at its implementation and run the initializer calldata against it
fn construct_proxy(
    state: &ChainState,
    proxy: &mut Account,
    implementation: Address,
    data: &[u8],
) -> bool {
    if state.accounts.get(&implementation).map_or(true, |a| a.code.is_empty()) {
        return false;
    }

    proxy.is_proxy = true;
    proxy.storage.insert(IMPLEMENTATION_STORAGE_SLOT, implementation.into_word());
    data.is_empty() || run_vault(proxy, data)
}

/// Execute a transaction against a deployed account, returning whether it succeeded
fn execute(state: &mut ChainState, to: Address, input: &[u8]) -> bool {
    match state.accounts.get_mut(&to) {
        Some(account) if account.is_proxy => run_vault(account, input),
        _ => false,
    }
}

/// The vault's state-changing entry points, run in the proxy's storage context
fn run_vault(proxy: &mut Account, input: &[u8]) -> bool {
    let Ok(call) = initializeCall::abi_decode(input) else {
        return false;
    };

    // Initializable: at most once
    if proxy.storage.get(&INITIALIZED_SLOT).is_some_and(|v| !v.is_zero()) {
        return false;
    }
    proxy.storage.insert(TOKEN_SLOT, call.token.into_word());
    proxy.storage.insert(INITIALIZED_SLOT, B256::with_last_byte(1));
    true
}

impl ChainClient for SimulatedChain {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn send_transaction(
        &self,
        to: Option<Address>,
        input: Bytes,
    ) -> Result<TxHash, ClientError> {
        if let Some(err) = self.state.lock().unwrap().send_error.clone() {
            return Err(ClientError(err));
        }

        Ok(self.mine(to, &input))
    }

    async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<TxOutcome>, ClientError> {
        let state = self.state.lock().unwrap();
        if state.withheld.contains(&tx_hash) {
            return Ok(None);
        }

        Ok(state.receipts.get(&tx_hash).cloned())
    }

    async fn block_number(&self) -> Result<u64, ClientError> {
        let mut state = self.state.lock().unwrap();
        if state.advance_on_poll {
            state.block += 1;
        }

        Ok(state.block)
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, ClientError> {
        let state = self.state.lock().unwrap();
        Ok(state.accounts.get(&address).map(|a| a.code.clone()).unwrap_or_default())
    }

    async fn storage_at(&self, address: Address, slot: B256) -> Result<B256, ClientError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .accounts
            .get(&address)
            .and_then(|a| a.storage.get(&slot).copied())
            .unwrap_or_default())
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, ClientError> {
        let state = self.state.lock().unwrap();
        let account = state
            .accounts
            .get(&to)
            .ok_or_else(|| ClientError(format!("no account at {to:#x}")))?;

        if input.starts_with(&proxiableUUIDCall::SELECTOR) && !account.is_proxy {
            return Ok(IMPLEMENTATION_STORAGE_SLOT.abi_encode().into());
        }
        if input.starts_with(&tokenCall::SELECTOR) && account.is_proxy {
            let token = account.storage.get(&TOKEN_SLOT).copied().unwrap_or_default();
            return Ok(token.abi_encode().into());
        }

        Err(ClientError("execution reverted".to_string()))
    }
}

/// Read the token the vault behind `proxy` was initialized with
pub async fn read_token(chain: &SimulatedChain, proxy: Address) -> Address {
    let ret = chain.call(proxy, tokenCall {}.abi_encode().into()).await.unwrap();
    tokenCall::abi_decode_returns(&ret).unwrap()
}

/// Calldata for a second call to the vault's initializer
pub fn initialize_calldata(token: Address) -> Bytes {
    initializeCall { token }.abi_encode().into()
}
