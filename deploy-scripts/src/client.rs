//! The network collaborator through which transactions are submitted and chain state is read

use std::{
    fmt::{self, Display, Formatter},
    future::Future,
};

use alloy::{
    network::{Ethereum, TransactionBuilder},
    providers::{DynProvider, Provider},
    rpc::types::{TransactionReceipt, TransactionRequest},
};
use alloy_primitives::{Address, Bytes, TxHash, B256, U256};

/// The outcome of a mined transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    /// The hash of the transaction
    pub transaction_hash: TxHash,
    /// Whether the transaction executed successfully
    pub success: bool,
    /// The address of the created contract, for creation transactions
    pub contract_address: Option<Address>,
    /// The block the transaction was included in
    pub block_number: Option<u64>,
}

impl From<TransactionReceipt> for TxOutcome {
    fn from(receipt: TransactionReceipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash,
            success: receipt.status(),
            contract_address: receipt.contract_address,
            block_number: receipt.block_number,
        }
    }
}

/// An error returned by the network collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientError(pub String);

impl Display for ClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ClientError {}

/// A signing client able to submit transactions and report on their confirmation.
///
/// Implementations sign with a single account. Nonces are assigned by the implementation;
/// concurrent deployments from the same account must be serialized by the caller.
pub trait ChainClient {
    /// The address transactions are sent from
    fn sender(&self) -> Address;

    /// Sign and submit a transaction, returning its hash once accepted by the node.
    ///
    /// A `to` of `None` submits a contract creation transaction with `input` as its init code.
    fn send_transaction(
        &self,
        to: Option<Address>,
        input: Bytes,
    ) -> impl Future<Output = Result<TxHash, ClientError>> + Send;

    /// Fetch the outcome of a transaction, or `None` if it is still pending
    fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<Option<TxOutcome>, ClientError>> + Send;

    /// The latest block number
    fn block_number(&self) -> impl Future<Output = Result<u64, ClientError>> + Send;

    /// The runtime code at an address
    fn code_at(&self, address: Address) -> impl Future<Output = Result<Bytes, ClientError>> + Send;

    /// The value of a storage slot
    fn storage_at(
        &self,
        address: Address,
        slot: B256,
    ) -> impl Future<Output = Result<B256, ClientError>> + Send;

    /// Execute a read-only call against the latest block
    fn call(
        &self,
        to: Address,
        input: Bytes,
    ) -> impl Future<Output = Result<Bytes, ClientError>> + Send;
}

/// The provider type used to talk to a live node
pub type Wallet = DynProvider<Ethereum>;

/// A [`ChainClient`] backed by an RPC provider with a local signer attached
#[derive(Clone)]
pub struct RpcClient {
    /// The underlying provider, with wallet and fillers attached
    provider: Wallet,
    /// The address of the attached signer
    sender: Address,
}

impl RpcClient {
    /// Wrap a provider whose wallet signs for `sender`
    pub fn new(provider: Wallet, sender: Address) -> Self {
        Self { provider, sender }
    }
}

/// Convert a transport error into a [`ClientError`]
fn client_err(e: impl Display) -> ClientError {
    ClientError(e.to_string())
}

impl ChainClient for RpcClient {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn send_transaction(
        &self,
        to: Option<Address>,
        input: Bytes,
    ) -> Result<TxHash, ClientError> {
        let tx = match to {
            Some(to) => TransactionRequest::default().with_to(to).with_input(input),
            None => TransactionRequest::default().with_deploy_code(input),
        }
        .with_from(self.sender);

        let pending = self.provider.send_transaction(tx).await.map_err(client_err)?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_receipt(&self, tx_hash: TxHash) -> Result<Option<TxOutcome>, ClientError> {
        let receipt = self.provider.get_transaction_receipt(tx_hash).await.map_err(client_err)?;
        Ok(receipt.map(TxOutcome::from))
    }

    async fn block_number(&self) -> Result<u64, ClientError> {
        self.provider.get_block_number().await.map_err(client_err)
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, ClientError> {
        self.provider.get_code_at(address).await.map_err(client_err)
    }

    async fn storage_at(&self, address: Address, slot: B256) -> Result<B256, ClientError> {
        let value = self
            .provider
            .get_storage_at(address, U256::from_be_bytes(slot.0))
            .await
            .map_err(client_err)?;
        Ok(B256::from(value))
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, ClientError> {
        let tx = TransactionRequest::default().with_to(to).with_input(input);
        self.provider.call(tx).await.map_err(client_err)
    }
}
