use sc_wallet::WalletError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("wallet is not connected")]
    NotConnected,
    #[error("account is not registered")]
    NotRegistered,
    #[error("account is already registered")]
    AlreadyRegistered,
    #[error("username '{0}' is already taken")]
    UsernameTaken(String),
    #[error("client store failure: {0}")]
    Storage(String),
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

impl SessionError {
    pub(crate) fn storage(err: anyhow::Error) -> Self {
        Self::Storage(format!("{err:#}"))
    }

    /// True when the call was refused locally before reaching the wallet.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NotConnected
                | Self::NotRegistered
                | Self::AlreadyRegistered
                | Self::UsernameTaken(_)
                | Self::Wallet(WalletError::ValidationError(_))
        )
    }
}
