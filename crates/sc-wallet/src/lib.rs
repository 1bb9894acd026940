//! Wallet capability interface.
//!
//! The session layer never talks to a concrete wallet. It receives an
//! `Arc<dyn WalletProvider>` (a browser bridge, a node-backed provider, or a
//! test double) and derives provider and signer handles from it.

mod error;
mod tx;

pub use error::{EXECUTION_REVERTED_CODE, RpcErrorObject, USER_REJECTED_CODE, WalletError};
pub use tx::{PendingTx, TxReceipt, TxRequest};

use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Notifications a wallet pushes without being asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// The set of exposed accounts changed; empty means access was revoked.
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// `eth_requestAccounts`: may open the wallet's permission prompt.
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;
    /// Forward an arbitrary JSON-RPC call.
    async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError>;
    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;
}

/// RPC provider bound to one wallet instance. Every call is bounded by
/// `call_timeout`; expiry surfaces as `NetworkError`.
#[derive(Clone)]
pub struct ProviderHandle {
    wallet: Arc<dyn WalletProvider>,
    call_timeout: Duration,
}

impl ProviderHandle {
    pub fn new(wallet: Arc<dyn WalletProvider>, call_timeout: Duration) -> Self {
        Self {
            wallet,
            call_timeout,
        }
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.wallet.subscribe()
    }

    pub async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        tokio::time::timeout(self.call_timeout, self.wallet.request_accounts())
            .await
            .map_err(|_| timed_out("eth_requestAccounts"))?
    }

    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, WalletError> {
        let value = tokio::time::timeout(self.call_timeout, self.wallet.request(method, params))
            .await
            .map_err(|_| timed_out(method))??;
        serde_json::from_value(value)
            .map_err(|err| WalletError::NetworkError(format!("malformed {method} response: {err}")))
    }

    pub async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
        self.request("eth_accounts", json!([])).await
    }

    pub async fn chain_id(&self) -> Result<u64, WalletError> {
        let id: U256 = self.request("eth_chainId", json!([])).await?;
        Ok(id.saturating_to::<u64>())
    }

    pub async fn call(&self, tx: &TxRequest) -> Result<Bytes, WalletError> {
        self.request("eth_call", json!([tx, "latest"])).await
    }

    pub async fn estimate_gas(&self, tx: &TxRequest) -> Result<U256, WalletError> {
        self.request("eth_estimateGas", json!([tx])).await
    }

    pub async fn send_transaction(&self, tx: &TxRequest) -> Result<PendingTx, WalletError> {
        let hash: B256 = self.request("eth_sendTransaction", json!([tx])).await?;
        Ok(PendingTx::new(hash, self.clone()))
    }

    pub async fn transaction_receipt(&self, hash: B256) -> Result<Option<TxReceipt>, WalletError> {
        self.request("eth_getTransactionReceipt", json!([hash])).await
    }
}

/// Handle authorised to sign for exactly one account.
#[derive(Clone)]
pub struct Signer {
    provider: ProviderHandle,
    address: Address,
}

impl Signer {
    pub fn new(provider: ProviderHandle, address: Address) -> Self {
        Self { provider, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn provider(&self) -> &ProviderHandle {
        &self.provider
    }

    /// Fills in `from` and hands the transaction to the wallet for signing.
    pub async fn send_transaction(&self, mut tx: TxRequest) -> Result<PendingTx, WalletError> {
        tx.from = Some(self.address);
        self.provider.send_transaction(&tx).await
    }
}

/// Wrap the execution environment's wallet into a provider and a signer for
/// the selected account. Opens the wallet's account-access prompt.
pub async fn acquire_provider(
    wallet: Option<Arc<dyn WalletProvider>>,
    call_timeout: Duration,
) -> Result<(ProviderHandle, Signer), WalletError> {
    let wallet = wallet.ok_or(WalletError::WalletUnavailable)?;
    let provider = ProviderHandle::new(wallet, call_timeout);
    let accounts = provider.request_accounts().await?;
    let address = accounts.first().copied().ok_or(WalletError::UserRejected)?;
    tracing::debug!(%address, "wallet granted account access");
    Ok((provider.clone(), Signer::new(provider, address)))
}

/// Same as [`acquire_provider`] but only uses accounts the wallet already
/// exposes, so no prompt is shown. Used for silent reconnection.
pub async fn acquire_existing_provider(
    wallet: Option<Arc<dyn WalletProvider>>,
    call_timeout: Duration,
) -> Result<(ProviderHandle, Signer), WalletError> {
    let wallet = wallet.ok_or(WalletError::WalletUnavailable)?;
    let provider = ProviderHandle::new(wallet, call_timeout);
    let accounts = provider.accounts().await?;
    let address = accounts.first().copied().ok_or(WalletError::UserRejected)?;
    Ok((provider.clone(), Signer::new(provider, address)))
}

fn timed_out(method: &str) -> WalletError {
    WalletError::NetworkError(format!("{method} timed out"))
}
