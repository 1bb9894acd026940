//! Wallet session state machine.
//!
//! A [`Session`] owns the handles derived from one wallet (provider, signer,
//! contract) and tracks whether the selected account is registered. The
//! registration flag is a cache of the contract's `isUserRegistered` for the
//! current account and is recomputed whenever the account changes.
//!
//! ```text
//! Disconnected -> Connecting -> Connected{registered: false} -> Connected{registered: true}
//!        ^             |                 |
//!        +-------------+---- Error <-----+
//! ```

mod dispatch;
mod error;
mod feed;
mod listener;
pub mod route;

pub use dispatch::{MAX_POST_LENGTH, validate_post_content, validate_username};
pub use error::SessionError;
pub use feed::{POSTS_PER_PAGE, paginate, shorten_address};

use alloy_primitives::Address;
use sc_api_types::{SessionSnapshot, SessionStatus};
use sc_contract::{ContractCapabilities, DispatchOptions, SocialContract, bind_contract};
use sc_pinning::DEFAULT_GATEWAY_URL;
use sc_storage::{ClientStore, ConnectionMarker};
use sc_wallet::{ProviderHandle, Signer, WalletError, WalletProvider, acquire_existing_provider, acquire_provider};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub contract_address: Address,
    pub capabilities: ContractCapabilities,
    pub dispatch: DispatchOptions,
    /// Upper bound on every individual wallet round-trip.
    pub call_timeout: Duration,
    pub gateway_url: String,
}

impl SessionConfig {
    pub fn new(contract_address: Address) -> Self {
        Self {
            contract_address,
            capabilities: ContractCapabilities::full(),
            dispatch: DispatchOptions::default(),
            call_timeout: Duration::from_secs(60),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
        }
    }
}

struct SessionState {
    status: SessionStatus,
    provider: Option<ProviderHandle>,
    signer: Option<Signer>,
    contract: Option<SocialContract>,
    account: Option<Address>,
    chain_id: Option<u64>,
    is_registered: bool,
    // Account the `is_registered` value was computed for.
    registered_for: Option<Address>,
    loading: bool,
    last_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            status: SessionStatus::Disconnected,
            provider: None,
            signer: None,
            contract: None,
            account: None,
            chain_id: None,
            is_registered: false,
            registered_for: None,
            loading: false,
            last_error: None,
        }
    }
}

impl SessionState {
    fn clear_handles(&mut self) {
        self.provider = None;
        self.signer = None;
        self.contract = None;
        self.account = None;
        self.chain_id = None;
        self.is_registered = false;
        self.registered_for = None;
    }
}

pub struct Session {
    wallet: Option<Arc<dyn WalletProvider>>,
    store: Arc<dyn ClientStore>,
    config: SessionConfig,
    state: RwLock<SessionState>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// `wallet` is `None` when the environment has no wallet at all.
    pub fn new(wallet: Option<Arc<dyn WalletProvider>>, store: Arc<dyn ClientStore>, config: SessionConfig) -> Self {
        Self {
            wallet,
            store,
            config,
            state: RwLock::new(SessionState::default()),
            listener: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ClientStore> {
        &self.store
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        SessionSnapshot {
            status: state.status.clone(),
            account: state.account.map(|account| account.to_string()),
            chain_id: state.chain_id,
            is_registered: state.is_registered,
            loading: state.loading,
            last_error: state.last_error.clone(),
        }
    }

    pub async fn account(&self) -> Option<Address> {
        self.state.read().await.account
    }

    pub async fn is_registered(&self) -> bool {
        self.state.read().await.is_registered
    }

    pub async fn has_connection_marker(&self) -> Result<bool, SessionError> {
        let marker = self
            .store
            .load_connection_marker()
            .await
            .map_err(SessionError::storage)?;
        Ok(marker.is_some_and(|marker| marker.is_active(epoch_ms())))
    }

    /// Prompt the wallet for account access and bind the contract.
    ///
    /// On failure the session falls back to `Disconnected` and the
    /// originating error is returned.
    pub async fn connect(&self) -> Result<SessionSnapshot, SessionError> {
        self.begin_connecting().await;

        let result: Result<Address, SessionError> = async {
            let (provider, signer) = acquire_provider(self.wallet.clone(), self.config.call_timeout).await?;
            let account = self.establish(provider, signer).await?;
            self.save_marker(account).await?;
            Ok(account)
        }
        .await;

        match result {
            Ok(_) => {
                self.finish_loading().await;
                Ok(self.snapshot().await)
            }
            Err(err) => {
                error!(error = %err, "wallet connection failed");
                let mut state = self.state.write().await;
                state.clear_handles();
                state.status = SessionStatus::Disconnected;
                state.loading = false;
                state.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Reconnect without prompting when the connection marker is present.
    /// Any failure tears the session down completely.
    pub async fn restore(&self) -> Result<SessionSnapshot, SessionError> {
        let marker = self
            .store
            .load_connection_marker()
            .await
            .map_err(SessionError::storage)?;
        let Some(marker) = marker else {
            return Ok(self.snapshot().await);
        };
        if !marker.is_active(epoch_ms()) {
            info!(wallet = %marker.wallet_address, "connection marker expired");
            self.store
                .clear_connection_marker()
                .await
                .map_err(SessionError::storage)?;
            return Ok(self.snapshot().await);
        }

        self.begin_connecting().await;
        let result: Result<Address, SessionError> = async {
            let (provider, signer) =
                acquire_existing_provider(self.wallet.clone(), self.config.call_timeout).await?;
            self.establish(provider, signer).await
        }
        .await;

        match result {
            Ok(_) => {
                self.finish_loading().await;
            }
            Err(err) => {
                warn!(error = %err, "silent reconnect failed; disconnecting");
                self.disconnect().await?;
                self.state.write().await.last_error = Some(err.to_string());
            }
        }
        Ok(self.snapshot().await)
    }

    /// Local teardown only. Wallet permissions are left untouched.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        {
            let mut state = self.state.write().await;
            state.clear_handles();
            state.status = SessionStatus::Disconnected;
            state.loading = false;
            state.last_error = None;
        }
        self.store
            .clear_connection_marker()
            .await
            .map_err(SessionError::storage)?;
        info!("wallet session disconnected");
        Ok(())
    }

    /// Re-enter `Connecting` for the wallet's newly selected account.
    /// An empty account list means access was revoked.
    pub async fn handle_accounts_changed(&self, accounts: &[Address]) {
        let Some(&account) = accounts.first() else {
            info!("wallet revoked account access");
            if let Err(err) = self.disconnect().await {
                error!(error = %err, "disconnect after account removal failed");
            }
            return;
        };

        let provider = {
            let mut state = self.state.write().await;
            let Some(provider) = state.provider.clone() else {
                return;
            };
            if state.account == Some(account) && state.contract.is_some() {
                return;
            }
            state.signer = None;
            state.contract = None;
            state.account = Some(account);
            state.is_registered = false;
            state.registered_for = None;
            state.status = SessionStatus::Connecting;
            provider
        };

        info!(%account, "wallet account changed");
        let signer = Signer::new(provider.clone(), account);
        match self.establish(provider, signer).await {
            Ok(account) => {
                if let Err(err) = self.save_marker(account).await {
                    warn!(error = %err, "cannot refresh connection marker");
                }
            }
            Err(err) => {
                warn!(%account, error = %err, "account switch failed");
                let mut state = self.state.write().await;
                state.status = SessionStatus::Error {
                    message: err.to_string(),
                };
                state.last_error = Some(err.to_string());
            }
        }
    }

    /// Handles are bound to the old chain, so nothing is migrated: the
    /// session is reset and rebuilt from the connection marker.
    pub async fn handle_chain_changed(&self, chain_id: u64) {
        let was_connected = {
            let mut state = self.state.write().await;
            let was_connected = state.provider.is_some();
            state.clear_handles();
            state.status = SessionStatus::Disconnected;
            was_connected
        };
        info!(chain_id, "wallet switched chain; session reset");

        if was_connected {
            if let Err(err) = self.restore().await {
                error!(chain_id, error = %err, "cannot restore session on new chain");
            }
        }
    }

    async fn begin_connecting(&self) {
        let mut state = self.state.write().await;
        state.status = SessionStatus::Connecting;
        state.loading = true;
        state.last_error = None;
    }

    async fn finish_loading(&self) {
        self.state.write().await.loading = false;
    }

    /// Bind the contract for `signer` and derive the registration flag.
    async fn establish(&self, provider: ProviderHandle, signer: Signer) -> Result<Address, SessionError> {
        let account = signer.address();
        let chain_id = provider.chain_id().await?;
        let contract = bind_contract(signer.clone(), self.config.contract_address, self.config.capabilities);
        let registered = contract.is_user_registered(account).await?;

        let mut state = self.state.write().await;
        state.provider = Some(provider);
        state.signer = Some(signer);
        state.contract = Some(contract);
        state.account = Some(account);
        state.chain_id = Some(chain_id);
        state.is_registered = registered;
        state.registered_for = Some(account);
        state.status = SessionStatus::Connected { registered };
        state.last_error = None;
        info!(%account, chain_id, registered, "wallet session established");
        Ok(account)
    }

    async fn save_marker(&self, account: Address) -> Result<(), SessionError> {
        let marker = ConnectionMarker::issue(&account.to_string(), epoch_ms());
        self.store
            .save_connection_marker(&marker)
            .await
            .map_err(SessionError::storage)
    }

    /// Contract handle and account, or `NotConnected`. Never touches the network.
    async fn connected(&self) -> Result<(SocialContract, Address), SessionError> {
        let state = self.state.read().await;
        match (&state.contract, state.account) {
            (Some(contract), Some(account)) => Ok((contract.clone(), account)),
            _ => Err(SessionError::NotConnected),
        }
    }

    /// Like [`Session::connected`], plus a registration flag that is known to
    /// belong to the returned account.
    async fn registration(&self) -> Result<(SocialContract, Address, bool), SessionError> {
        let (contract, account) = self.connected().await?;
        let cached = {
            let state = self.state.read().await;
            (state.registered_for == Some(account)).then_some(state.is_registered)
        };
        let registered = match cached {
            Some(registered) => registered,
            None => self.refresh_registration(&contract, account).await?,
        };
        Ok((contract, account, registered))
    }

    async fn refresh_registration(&self, contract: &SocialContract, account: Address) -> Result<bool, SessionError> {
        let registered = contract.is_user_registered(account).await?;
        let mut state = self.state.write().await;
        if state.account == Some(account) {
            state.is_registered = registered;
            state.registered_for = Some(account);
            state.status = SessionStatus::Connected { registered };
        }
        Ok(registered)
    }

    /// Runs a dispatcher with the advisory `loading` flag raised. Failures are
    /// logged here and returned unchanged.
    async fn with_loading<T, F>(&self, action: &'static str, work: F) -> Result<T, SessionError>
    where
        F: Future<Output = Result<T, SessionError>>,
    {
        self.state.write().await.loading = true;
        let result = work.await;

        let mut state = self.state.write().await;
        state.loading = false;
        if let Err(err) = &result {
            error!(action, error = %err, "dispatcher failed");
            state.last_error = Some(err.to_string());
        }
        result
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.detach_listeners();
    }
}

fn require_registered(registered: bool) -> Result<(), SessionError> {
    if registered {
        Ok(())
    } else {
        Err(SessionError::NotRegistered)
    }
}

fn epoch_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0)
}

pub(crate) fn validation(message: impl Into<String>) -> SessionError {
    SessionError::Wallet(WalletError::validation(message))
}

#[cfg(test)]
mod tests;
