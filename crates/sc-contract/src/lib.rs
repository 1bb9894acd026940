//! Contract handle factory.
//!
//! `bind_contract` pairs a signer with a fixed contract address and the ABI
//! surface selected by [`ContractCapabilities`]. Construction makes no network
//! call; a bad address only shows up when a method call fails.

pub mod abi;
pub mod units;

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use sc_api_types::{PlatformStats, UserInfo};
use sc_wallet::{Signer, TxReceipt, TxRequest, WalletError};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use abi::{SocialDApp, SocialDAppMedia, SocialDAppWithdrawal};

/// Which contract revision the handle talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContractCapabilities {
    /// `createPost(content, mediaHash, mediaType)` and media columns in `getAllPosts`.
    pub media_posts: bool,
    /// Three-part tip ledger and `withdrawTipping`.
    pub tip_withdrawal: bool,
}

impl ContractCapabilities {
    pub fn full() -> Self {
        Self {
            media_posts: true,
            tip_withdrawal: true,
        }
    }
}

impl FromStr for ContractCapabilities {
    type Err = String;

    /// Comma separated flags, e.g. `media,withdrawal`. Empty means the base surface.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut caps = Self::default();
        for flag in s.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            match flag {
                "media" => caps.media_posts = true,
                "withdrawal" => caps.tip_withdrawal = true,
                other => return Err(format!("unknown contract capability '{other}'")),
            }
        }
        Ok(caps)
    }
}

/// Submission policy applied by every state-changing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Safety margin added to `eth_estimateGas`. `None` or `0` skips estimation.
    pub gas_buffer_percent: Option<u32>,
    pub confirmation_poll: Duration,
    pub confirmation_timeout: Duration,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            gas_buffer_percent: Some(20),
            confirmation_poll: Duration::from_secs(1),
            confirmation_timeout: Duration::from_secs(120),
        }
    }
}

pub fn apply_gas_buffer(estimated: U256, percent: u32) -> U256 {
    estimated * U256::from(100 + percent as u64) / U256::from(100)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAttachment {
    pub hash: String,
    pub media_type: String,
}

/// One row of `getAllPosts`, media columns filled only on media revisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub id: U256,
    pub author: Address,
    pub content: String,
    pub media: Option<MediaAttachment>,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TipLedger {
    pub total: U256,
    pub withdrawn: U256,
    pub available: U256,
}

pub fn parse_post_id(id: &str) -> Result<U256, WalletError> {
    U256::from_str(id.trim()).map_err(|_| WalletError::validation(format!("invalid post id '{id}'")))
}

#[derive(Clone)]
pub struct SocialContract {
    address: Address,
    capabilities: ContractCapabilities,
    signer: Signer,
}

pub fn bind_contract(signer: Signer, address: Address, capabilities: ContractCapabilities) -> SocialContract {
    SocialContract {
        address,
        capabilities,
        signer,
    }
}

impl SocialContract {
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn capabilities(&self) -> ContractCapabilities {
        self.capabilities
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    async fn read<C: SolCall>(&self, call: C) -> Result<C::Return, WalletError> {
        let mut tx = TxRequest::call(self.address, call.abi_encode());
        tx.from = Some(self.signer.address());
        let output = self.signer.provider().call(&tx).await?;
        if output.is_empty() {
            return Err(WalletError::reverted(format!(
                "{} returned no data; is the contract deployed at {}?",
                C::SIGNATURE,
                self.address
            )));
        }
        C::abi_decode_returns(&output, false).map_err(|err| {
            WalletError::NetworkError(format!("cannot decode {} result: {err}", C::SIGNATURE))
        })
    }

    /// Estimate (optionally), submit, then wait for inclusion. The three steps
    /// always run in this order.
    async fn transact<C: SolCall>(
        &self,
        call: C,
        value: Option<U256>,
        options: &DispatchOptions,
    ) -> Result<TxReceipt, WalletError> {
        let mut tx = TxRequest::call(self.address, call.abi_encode());
        tx.from = Some(self.signer.address());
        tx.value = value;

        if let Some(percent) = options.gas_buffer_percent.filter(|percent| *percent > 0) {
            let estimated = self.signer.provider().estimate_gas(&tx).await?;
            tx.gas = Some(apply_gas_buffer(estimated, percent));
        }

        let pending = self.signer.send_transaction(tx).await?;
        info!(method = C::SIGNATURE, tx_hash = %pending.hash(), "transaction submitted");
        pending
            .wait(options.confirmation_poll, options.confirmation_timeout)
            .await
    }

    pub async fn is_user_registered(&self, user: Address) -> Result<bool, WalletError> {
        Ok(self
            .read(SocialDApp::isUserRegisteredCall { user })
            .await?
            .registered)
    }

    pub async fn get_user_info(&self, user: Address) -> Result<UserInfo, WalletError> {
        let info = self.read(SocialDApp::getUserInfoCall { user }).await?;
        Ok(UserInfo {
            username: info.username,
            post_count: info.postCount.saturating_to::<u64>(),
        })
    }

    pub async fn register_user(&self, name: &str, options: &DispatchOptions) -> Result<TxReceipt, WalletError> {
        self.transact(
            SocialDApp::registerUserCall {
                name: name.to_owned(),
            },
            None,
            options,
        )
        .await
    }

    pub async fn create_post(
        &self,
        content: &str,
        media: Option<&MediaAttachment>,
        options: &DispatchOptions,
    ) -> Result<TxReceipt, WalletError> {
        if self.capabilities.media_posts {
            let (media_hash, media_type) = media
                .map(|m| (m.hash.clone(), m.media_type.clone()))
                .unwrap_or_default();
            return self
                .transact(
                    SocialDAppMedia::createPostCall {
                        content: content.to_owned(),
                        mediaHash: media_hash,
                        mediaType: media_type,
                    },
                    None,
                    options,
                )
                .await;
        }

        if media.is_some() {
            return Err(WalletError::validation(
                "this contract does not support media attachments",
            ));
        }

        self.transact(
            SocialDApp::createPostCall {
                content: content.to_owned(),
            },
            None,
            options,
        )
        .await
    }

    pub async fn edit_post(&self, post_id: U256, content: &str, options: &DispatchOptions) -> Result<TxReceipt, WalletError> {
        self.transact(
            SocialDApp::editPostCall {
                postId: post_id,
                content: content.to_owned(),
            },
            None,
            options,
        )
        .await
    }

    pub async fn get_all_posts(&self) -> Result<Vec<PostRecord>, WalletError> {
        if self.capabilities.media_posts {
            let posts = self.read(SocialDAppMedia::getAllPostsCall {}).await?;
            return Ok(posts
                .ids
                .into_iter()
                .zip(posts.authors)
                .zip(posts.contents)
                .zip(posts.mediaHashes.into_iter().zip(posts.mediaTypes))
                .zip(posts.timestamps)
                .map(|((((id, author), content), (hash, media_type)), timestamp)| PostRecord {
                    id,
                    author,
                    content,
                    media: (!hash.is_empty()).then_some(MediaAttachment { hash, media_type }),
                    timestamp: timestamp.saturating_to::<u64>(),
                })
                .collect());
        }

        let posts = self.read(SocialDApp::getAllPostsCall {}).await?;
        Ok(posts
            .ids
            .into_iter()
            .zip(posts.authors)
            .zip(posts.contents)
            .zip(posts.timestamps)
            .map(|(((id, author), content), timestamp)| PostRecord {
                id,
                author,
                content,
                media: None,
                timestamp: timestamp.saturating_to::<u64>(),
            })
            .collect())
    }

    pub async fn get_platform_stats(&self) -> Result<PlatformStats, WalletError> {
        let stats = self.read(SocialDApp::getPlatformStatsCall {}).await?;
        Ok(PlatformStats {
            users_count: stats.usersCount.saturating_to::<u64>(),
            posts_count: stats.postsCount.saturating_to::<u64>(),
        })
    }

    pub async fn give_tipping(&self, post_id: U256, amount: U256, options: &DispatchOptions) -> Result<TxReceipt, WalletError> {
        self.transact(
            SocialDApp::giveTippingCall { postId: post_id },
            Some(amount),
            options,
        )
        .await
    }

    pub async fn get_post_tipping(&self, post_id: U256) -> Result<U256, WalletError> {
        Ok(self
            .read(SocialDApp::getPostTippingCall { postId: post_id })
            .await?
            .totalTipping)
    }

    /// Lifetime tips received; available on every revision.
    pub async fn get_user_tip_total(&self, user: Address) -> Result<U256, WalletError> {
        Ok(self
            .read(SocialDApp::getUserTippingCall { user })
            .await?
            .totalTipping)
    }

    pub async fn get_user_tipping(&self, user: Address) -> Result<TipLedger, WalletError> {
        self.require_withdrawal()?;
        let ledger = self.read(SocialDAppWithdrawal::getUserTippingCall { user }).await?;
        Ok(TipLedger {
            total: ledger.totalTipping,
            withdrawn: ledger.withdrawnTipping,
            available: ledger.availableTipping,
        })
    }

    pub async fn withdraw_tipping(&self, options: &DispatchOptions) -> Result<TxReceipt, WalletError> {
        self.require_withdrawal()?;
        self.transact(SocialDAppWithdrawal::withdrawTippingCall {}, None, options)
            .await
    }

    fn require_withdrawal(&self) -> Result<(), WalletError> {
        if self.capabilities.tip_withdrawal {
            Ok(())
        } else {
            Err(WalletError::validation(
                "this contract does not support tip withdrawal",
            ))
        }
    }
}
