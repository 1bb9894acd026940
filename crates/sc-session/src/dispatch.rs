use alloy_primitives::U256;
use sc_api_types::TxOutcome;
use sc_contract::units::parse_ether;
use sc_contract::{MediaAttachment, parse_post_id};
use sc_wallet::{TxReceipt, WalletError};
use tracing::{info, warn};

use crate::{Session, SessionError, require_registered, validation};

pub const MAX_POST_LENGTH: usize = 1000;

pub fn validate_post_content(content: &str) -> Result<(), WalletError> {
    if content.trim().is_empty() {
        return Err(WalletError::validation("Post content cannot be empty"));
    }
    if content.chars().count() > MAX_POST_LENGTH {
        return Err(WalletError::validation(format!(
            "Post content cannot exceed {MAX_POST_LENGTH} characters"
        )));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<String, WalletError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(WalletError::validation("Username cannot be empty"));
    }
    Ok(username.to_owned())
}

fn outcome(receipt: &TxReceipt) -> TxOutcome {
    TxOutcome {
        tx_hash: receipt.transaction_hash.to_string(),
        block_number: receipt.block_number_u64(),
    }
}

impl Session {
    /// Valid only while `Connected{registered: false}`. The availability
    /// pre-check and the registration transaction are not atomic; the
    /// contract decides any race.
    pub async fn register(&self, username: &str) -> Result<TxOutcome, SessionError> {
        self.with_loading("register", async {
            let username = validate_username(username)?;
            let (contract, account, registered) = self.registration().await?;
            if registered {
                return Err(SessionError::AlreadyRegistered);
            }
            if !self.username_available_on(&contract, &username).await? {
                return Err(SessionError::UsernameTaken(username));
            }

            let receipt = contract.register_user(&username, &self.config.dispatch).await?;
            let registered = self.refresh_registration(&contract, account).await?;
            info!(%account, %username, registered, "registration confirmed");
            Ok(outcome(&receipt))
        })
        .await
    }

    pub async fn create_post(&self, content: &str, media: Option<MediaAttachment>) -> Result<TxOutcome, SessionError> {
        self.with_loading("create_post", async {
            validate_post_content(content)?;
            if media.as_ref().is_some_and(|media| media.hash.trim().is_empty()) {
                return Err(validation("Media hash cannot be empty"));
            }
            let (contract, _, registered) = self.registration().await?;
            require_registered(registered)?;

            let receipt = contract
                .create_post(content, media.as_ref(), &self.config.dispatch)
                .await?;
            Ok(outcome(&receipt))
        })
        .await
    }

    /// Records the post as edited in the local store once the edit confirms.
    pub async fn edit_post(&self, post_id: &str, content: &str) -> Result<TxOutcome, SessionError> {
        self.with_loading("edit_post", async {
            validate_post_content(content)?;
            let id = parse_post_id(post_id)?;
            let (contract, _, registered) = self.registration().await?;
            require_registered(registered)?;

            let receipt = contract.edit_post(id, content, &self.config.dispatch).await?;
            if let Err(err) = self.store.mark_post_edited(&id.to_string()).await {
                warn!(post_id = %id, error = %err, "edit confirmed but edited marker not saved");
            }
            Ok(outcome(&receipt))
        })
        .await
    }

    /// `amount` is a decimal ether string such as `"0.01"`.
    pub async fn tip_post(&self, post_id: &str, amount: &str) -> Result<TxOutcome, SessionError> {
        self.with_loading("tip_post", async {
            let id = parse_post_id(post_id)?;
            let value = parse_ether(amount)?;
            if value == U256::ZERO {
                return Err(validation("Tip amount must be greater than 0"));
            }
            let (contract, account) = self.connected().await?;

            let receipt = contract
                .give_tipping(id, value, &self.config.dispatch)
                .await?;
            info!(%account, post_id = %id, amount, "tip confirmed");
            Ok(outcome(&receipt))
        })
        .await
    }

    /// Fails before submitting when the ledger shows nothing to withdraw.
    pub async fn withdraw_tips(&self) -> Result<TxOutcome, SessionError> {
        self.with_loading("withdraw_tips", async {
            let (contract, account) = self.connected().await?;
            let ledger = contract.get_user_tipping(account).await?;
            if ledger.available == U256::ZERO {
                return Err(validation("No tips available to withdraw"));
            }

            let receipt = contract.withdraw_tipping(&self.config.dispatch).await?;
            info!(%account, amount = %ledger.available, "tips withdrawn");
            Ok(outcome(&receipt))
        })
        .await
    }
}
