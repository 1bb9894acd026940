use alloy_primitives::{Address, U256};
use futures::future::join_all;
use sc_api_types::{PlatformStats, PostId, PostView, TipsSummary, WalletAddress};
use sc_contract::units::format_ether;
use sc_contract::{SocialContract, parse_post_id};
use sc_pinning::media_ref;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

use crate::{Session, SessionError, validate_username};

pub const POSTS_PER_PAGE: usize = 10;

/// `0x1234...abcd`, shown when an author has no resolvable username.
pub fn shorten_address(address: Address) -> String {
    let full = address.to_string();
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// One-based page of `items`; out-of-range pages are empty.
pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> (Vec<T>, usize) {
    let per_page = per_page.max(1);
    let total_pages = items.len().div_ceil(per_page);
    let start = page.saturating_sub(1).saturating_mul(per_page);
    let slice = items.iter().skip(start).take(per_page).cloned().collect();
    (slice, total_pages)
}

async fn lookup_username(contract: &SocialContract, address: Address) -> Result<Option<String>, SessionError> {
    if !contract.is_user_registered(address).await? {
        return Ok(None);
    }
    Ok(Some(contract.get_user_info(address).await?.username))
}

impl Session {
    /// Rebuilds the feed from the contract. Author names are resolved
    /// concurrently; an author that cannot be resolved is shown by address.
    pub async fn load_feed(&self) -> Result<Vec<PostView>, SessionError> {
        let (contract, account) = self.connected().await?;
        let posts = contract.get_all_posts().await?;

        let authors: Vec<Address> = posts
            .iter()
            .map(|post| post.author)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let lookups = join_all(authors.iter().map(|author| lookup_username(&contract, *author))).await;
        let names: HashMap<Address, String> = authors
            .into_iter()
            .zip(lookups)
            .map(|(author, lookup)| {
                let name = match lookup {
                    Ok(Some(name)) => name,
                    Ok(None) => shorten_address(author),
                    Err(err) => {
                        warn!(%author, error = %err, "username lookup failed");
                        shorten_address(author)
                    }
                };
                (author, name)
            })
            .collect();

        let mut feed = Vec::with_capacity(posts.len());
        for post in posts {
            let id = post.id.to_string();
            let edited = self.store.is_post_edited(&id).await.unwrap_or_else(|err| {
                warn!(post_id = %id, error = %err, "edited marker unavailable");
                false
            });
            feed.push(PostView {
                author_name: names
                    .get(&post.author)
                    .cloned()
                    .unwrap_or_else(|| shorten_address(post.author)),
                author_address: WalletAddress(post.author.to_string()),
                content: post.content,
                media: post
                    .media
                    .map(|media| media_ref(&self.config.gateway_url, &media.hash, &media.media_type)),
                timestamp: post.timestamp,
                is_owner: post.author.to_string().eq_ignore_ascii_case(&account.to_string()),
                edited,
                id: PostId(id),
            });
        }
        Ok(feed)
    }

    /// Best-effort pre-flight: scans the usernames of accounts that have
    /// posted. The contract stays authoritative at registration time.
    pub async fn is_username_available(&self, username: &str) -> Result<bool, SessionError> {
        let username = validate_username(username)?;
        let (contract, _) = self.connected().await?;
        self.username_available_on(&contract, &username).await
    }

    pub(crate) async fn username_available_on(
        &self,
        contract: &SocialContract,
        username: &str,
    ) -> Result<bool, SessionError> {
        let authors: BTreeSet<Address> = contract
            .get_all_posts()
            .await?
            .into_iter()
            .map(|post| post.author)
            .collect();
        let wanted = username.to_lowercase();
        for name in join_all(authors.iter().map(|author| lookup_username(contract, *author))).await {
            if name?.is_some_and(|name| name.to_lowercase() == wanted) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub async fn current_username(&self) -> Result<Option<String>, SessionError> {
        let (contract, account) = self.connected().await?;
        lookup_username(&contract, account).await
    }

    pub async fn get_available_tips(&self) -> Result<TipsSummary, SessionError> {
        let (contract, account) = self.connected().await?;
        let ledger = contract.get_user_tipping(account).await?;
        Ok(TipsSummary {
            total: format_ether(ledger.total),
            withdrawn: format_ether(ledger.withdrawn),
            available: format_ether(ledger.available),
        })
    }

    pub async fn get_post_tips(&self, post_id: &str) -> Result<U256, SessionError> {
        let id = parse_post_id(post_id)?;
        let (contract, _) = self.connected().await?;
        Ok(contract.get_post_tipping(id).await?)
    }

    /// Lifetime tips received by the connected account.
    pub async fn get_user_tips(&self) -> Result<U256, SessionError> {
        let (contract, account) = self.connected().await?;
        Ok(contract.get_user_tip_total(account).await?)
    }

    pub async fn platform_stats(&self) -> Result<PlatformStats, SessionError> {
        let (contract, _) = self.connected().await?;
        Ok(contract.get_platform_stats().await?)
    }
}
