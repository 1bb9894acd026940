use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use sc_contract::ContractCapabilities;
use sc_contract::abi::{SocialDApp, SocialDAppMedia, SocialDAppWithdrawal};
use std::collections::HashMap;

const MAX_CONTENT_CHARS: usize = 1000;

#[derive(Debug, Clone)]
struct User {
    username: String,
    post_count: u64,
}

#[derive(Debug, Clone)]
struct Post {
    id: U256,
    author: Address,
    content: String,
    media_hash: String,
    media_type: String,
    timestamp: u64,
    tips: U256,
}

#[derive(Debug, Clone, Copy, Default)]
struct Ledger {
    total: U256,
    withdrawn: U256,
}

/// Reference model of the SocialDApp contract.
#[derive(Debug, Clone)]
pub struct SocialState {
    capabilities: ContractCapabilities,
    users: HashMap<Address, User>,
    posts: Vec<Post>,
    ledgers: HashMap<Address, Ledger>,
}

type Outcome = Result<Vec<u8>, String>;

fn decode<C: SolCall>(data: &[u8]) -> Result<C, String> {
    C::abi_decode(data, true).map_err(|err| format!("bad calldata for {}: {err}", C::SIGNATURE))
}

fn selects<C: SolCall>(selector: &[u8]) -> bool {
    selector == C::SELECTOR.as_slice()
}

impl SocialState {
    pub fn new(capabilities: ContractCapabilities) -> Self {
        Self {
            capabilities,
            users: HashMap::new(),
            posts: Vec::new(),
            ledgers: HashMap::new(),
        }
    }

    pub fn is_registered(&self, address: Address) -> bool {
        self.users.contains_key(&address)
    }

    pub fn username(&self, address: Address) -> Option<String> {
        self.users.get(&address).map(|u| u.username.clone())
    }

    pub fn post_content(&self, id: U256) -> Option<String> {
        self.post(id).map(|p| p.content.clone())
    }

    pub fn post_count(&self) -> usize {
        self.posts.len()
    }

    pub(crate) fn seed_user(&mut self, address: Address, username: &str) {
        self.users.insert(
            address,
            User {
                username: username.to_owned(),
                post_count: 0,
            },
        );
    }

    pub(crate) fn seed_post(&mut self, author: Address, content: &str, timestamp: u64) -> U256 {
        self.push_post(author, content, String::new(), String::new(), timestamp)
    }

    fn post(&self, id: U256) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == id)
    }

    fn push_post(&mut self, author: Address, content: &str, media_hash: String, media_type: String, timestamp: u64) -> U256 {
        let id = U256::from(self.posts.len() + 1);
        self.posts.push(Post {
            id,
            author,
            content: content.to_owned(),
            media_hash,
            media_type,
            timestamp,
            tips: U256::ZERO,
        });
        if let Some(user) = self.users.get_mut(&author) {
            user.post_count += 1;
        }
        id
    }

    /// Run one call. `Err` carries the revert reason; state changes made
    /// before a revert must be discarded by the caller.
    pub fn execute(&mut self, sender: Address, value: U256, data: &[u8], timestamp: u64) -> Outcome {
        let selector = data.get(..4).ok_or_else(|| "missing function selector".to_owned())?;
        let caps = self.capabilities;

        if !selects::<SocialDApp::giveTippingCall>(selector) && !value.is_zero() {
            return Err("function is not payable".to_owned());
        }

        if selects::<SocialDApp::isUserRegisteredCall>(selector) {
            let call = decode::<SocialDApp::isUserRegisteredCall>(data)?;
            return Ok(SocialDApp::isUserRegisteredCall::abi_encode_returns(&(
                self.is_registered(call.user),
            )));
        }

        if selects::<SocialDApp::getUserInfoCall>(selector) {
            let call = decode::<SocialDApp::getUserInfoCall>(data)?;
            let user = self.users.get(&call.user).ok_or("User not registered")?;
            return Ok(SocialDApp::getUserInfoCall::abi_encode_returns(&(
                user.username.clone(),
                U256::from(user.post_count),
            )));
        }

        if selects::<SocialDApp::registerUserCall>(selector) {
            let call = decode::<SocialDApp::registerUserCall>(data)?;
            return self.register(sender, &call.name);
        }

        if !caps.media_posts && selects::<SocialDApp::createPostCall>(selector) {
            let call = decode::<SocialDApp::createPostCall>(data)?;
            return self.create_post(sender, &call.content, String::new(), String::new(), timestamp);
        }

        if caps.media_posts && selects::<SocialDAppMedia::createPostCall>(selector) {
            let call = decode::<SocialDAppMedia::createPostCall>(data)?;
            return self.create_post(sender, &call.content, call.mediaHash, call.mediaType, timestamp);
        }

        if selects::<SocialDApp::editPostCall>(selector) {
            let call = decode::<SocialDApp::editPostCall>(data)?;
            validate_content(&call.content)?;
            let post = self
                .posts
                .iter_mut()
                .find(|p| p.id == call.postId)
                .ok_or("Post does not exist")?;
            if post.author != sender {
                return Err("Only the author can edit this post".to_owned());
            }
            post.content = call.content;
            return Ok(Vec::new());
        }

        if selects::<SocialDApp::getAllPostsCall>(selector) {
            let ids = self.posts.iter().map(|p| p.id).collect::<Vec<_>>();
            let authors = self.posts.iter().map(|p| p.author).collect::<Vec<_>>();
            let contents = self.posts.iter().map(|p| p.content.clone()).collect::<Vec<_>>();
            let timestamps = self
                .posts
                .iter()
                .map(|p| U256::from(p.timestamp))
                .collect::<Vec<_>>();
            if caps.media_posts {
                let hashes = self.posts.iter().map(|p| p.media_hash.clone()).collect::<Vec<_>>();
                let types = self.posts.iter().map(|p| p.media_type.clone()).collect::<Vec<_>>();
                return Ok(SocialDAppMedia::getAllPostsCall::abi_encode_returns(&(
                    ids, authors, contents, hashes, types, timestamps,
                )));
            }
            return Ok(SocialDApp::getAllPostsCall::abi_encode_returns(&(
                ids, authors, contents, timestamps,
            )));
        }

        if selects::<SocialDApp::getPlatformStatsCall>(selector) {
            return Ok(SocialDApp::getPlatformStatsCall::abi_encode_returns(&(
                U256::from(self.users.len()),
                U256::from(self.posts.len()),
            )));
        }

        if selects::<SocialDApp::giveTippingCall>(selector) {
            let call = decode::<SocialDApp::giveTippingCall>(data)?;
            if value.is_zero() {
                return Err("Tip amount must be greater than 0".to_owned());
            }
            let post = self
                .posts
                .iter_mut()
                .find(|p| p.id == call.postId)
                .ok_or("Post does not exist")?;
            post.tips += value;
            let author = post.author;
            self.ledgers.entry(author).or_default().total += value;
            return Ok(Vec::new());
        }

        if selects::<SocialDApp::getPostTippingCall>(selector) {
            let call = decode::<SocialDApp::getPostTippingCall>(data)?;
            let post = self.post(call.postId).ok_or("Post does not exist")?;
            return Ok(SocialDApp::getPostTippingCall::abi_encode_returns(&(post.tips,)));
        }

        if selects::<SocialDApp::getUserTippingCall>(selector) {
            let call = decode::<SocialDApp::getUserTippingCall>(data)?;
            let ledger = self.ledgers.get(&call.user).copied().unwrap_or_default();
            if caps.tip_withdrawal {
                return Ok(SocialDAppWithdrawal::getUserTippingCall::abi_encode_returns(&(
                    ledger.total,
                    ledger.withdrawn,
                    ledger.total - ledger.withdrawn,
                )));
            }
            return Ok(SocialDApp::getUserTippingCall::abi_encode_returns(&(ledger.total,)));
        }

        if caps.tip_withdrawal && selects::<SocialDAppWithdrawal::withdrawTippingCall>(selector) {
            if !self.is_registered(sender) {
                return Err("User not registered".to_owned());
            }
            let ledger = self.ledgers.entry(sender).or_default();
            if ledger.total == ledger.withdrawn {
                return Err("No tips available to withdraw".to_owned());
            }
            ledger.withdrawn = ledger.total;
            return Ok(Vec::new());
        }

        Err(String::new())
    }

    fn register(&mut self, sender: Address, name: &str) -> Outcome {
        if name.trim().is_empty() {
            return Err("Username cannot be empty".to_owned());
        }
        if self.users.contains_key(&sender) {
            return Err("User already registered".to_owned());
        }
        let lowered = name.to_lowercase();
        if self
            .users
            .values()
            .any(|u| u.username.to_lowercase() == lowered)
        {
            return Err("Username already taken".to_owned());
        }
        self.seed_user(sender, name);
        Ok(Vec::new())
    }

    fn create_post(&mut self, sender: Address, content: &str, media_hash: String, media_type: String, timestamp: u64) -> Outcome {
        if !self.is_registered(sender) {
            return Err("User not registered".to_owned());
        }
        validate_content(content)?;
        self.push_post(sender, content, media_hash, media_type, timestamp);
        Ok(Vec::new())
    }
}

fn validate_content(content: &str) -> Result<(), String> {
    if content.is_empty() {
        return Err("Content cannot be empty".to_owned());
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err("Content too long".to_owned());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account;

    fn encode<C: SolCall>(call: C) -> Vec<u8> {
        call.abi_encode()
    }

    #[test]
    fn usernames_are_unique_ignoring_case() {
        let mut state = SocialState::new(ContractCapabilities::full());
        let call = encode(SocialDApp::registerUserCall {
            name: "alice".to_owned(),
        });
        state.execute(account(1), U256::ZERO, &call, 0).unwrap();

        let call = encode(SocialDApp::registerUserCall {
            name: "Alice".to_owned(),
        });
        let err = state.execute(account(2), U256::ZERO, &call, 0).unwrap_err();
        assert_eq!(err, "Username already taken");
    }

    #[test]
    fn withdrawal_moves_available_into_withdrawn() {
        let mut state = SocialState::new(ContractCapabilities::full());
        state.seed_user(account(1), "bob");
        let id = state.seed_post(account(1), "hello world", 0);

        let tip = encode(SocialDApp::giveTippingCall { postId: id });
        state.execute(account(2), U256::from(5u64), &tip, 0).unwrap();

        let withdraw = encode(SocialDAppWithdrawal::withdrawTippingCall {});
        state.execute(account(1), U256::ZERO, &withdraw, 0).unwrap();
        let err = state.execute(account(1), U256::ZERO, &withdraw, 0).unwrap_err();
        assert_eq!(err, "No tips available to withdraw");
    }

    #[test]
    fn plain_revision_rejects_withdrawal() {
        let mut state = SocialState::new(ContractCapabilities::default());
        state.seed_user(account(1), "bob");
        let withdraw = encode(SocialDAppWithdrawal::withdrawTippingCall {});
        assert!(state.execute(account(1), U256::ZERO, &withdraw, 0).is_err());
    }
}
