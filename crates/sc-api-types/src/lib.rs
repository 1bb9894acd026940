use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct WalletAddress(pub String);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PostId(pub String);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected { registered: bool },
    Error { message: String },
}

/// Point-in-time view of the session, safe to hand to the UI layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub account: Option<String>,
    pub chain_id: Option<u64>,
    pub is_registered: bool,
    pub loading: bool,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfo {
    pub username: String,
    pub post_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Link,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaRef {
    pub hash: String,
    pub media_type: String,
    pub url: String,
    pub kind: MediaKind,
}

/// Feed entry derived from the contract's post records and resolved usernames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostView {
    pub id: PostId,
    pub author_name: String,
    pub author_address: WalletAddress,
    pub content: String,
    pub media: Option<MediaRef>,
    pub timestamp: u64,
    pub is_owner: bool,
    pub edited: bool,
}

/// Decimal ether strings as reported by the contract's tip ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TipsSummary {
    pub total: String,
    pub withdrawn: String,
    pub available: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformStats {
    pub users_count: u64,
    pub posts_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxOutcome {
    pub tx_hash: String,
    pub block_number: Option<u64>,
}

// ── HTTP request / response bodies ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsernameAvailabilityResponse {
    pub username: String,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUserResponse {
    pub account: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
    #[serde(default)]
    pub media_hash: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMediaPostRequest {
    pub content: String,
    pub file_name: String,
    pub content_type: String,
    /// Base64-encoded file body.
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaPostResponse {
    pub media: MediaRef,
    pub transaction: TxOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPageResponse {
    pub posts: Vec<PostView>,
    pub page: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditPostRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TipPostRequest {
    /// Decimal amount in ether, e.g. `"0.01"`.
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TipTotalResponse {
    pub total: String,
    pub formatted: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecisionResponse {
    pub path: String,
    pub allowed: bool,
    pub redirect_to: Option<String>,
}
