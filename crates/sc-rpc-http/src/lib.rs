use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use sc_wallet::{RpcErrorObject, WalletError, WalletEvent, WalletProvider};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:7545";

/// JSON-RPC wallet backed by a node that custodies unlocked accounts
/// (ganache, hardhat node, anvil).
///
/// Reads `RPC_URL` from environment at construction time
/// (default: `http://127.0.0.1:7545`). The node never pushes account or chain
/// changes, so [`HttpRpcProvider::spawn_watcher`] polls for them.
pub struct HttpRpcProvider {
    endpoint: String,
    http: reqwest::Client,
    next_id: AtomicU64,
    events: broadcast::Sender<WalletEvent>,
}

impl Default for HttpRpcProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

impl HttpRpcProvider {
    pub fn new(endpoint: Option<String>) -> Self {
        let endpoint = endpoint
            .or_else(|| std::env::var("RPC_URL").ok())
            .unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        let (events, _) = broadcast::channel(16);
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
            events,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Poll `eth_accounts` and `eth_chainId` every `interval` and publish
    /// differences as wallet events. The first poll only records a baseline.
    pub fn spawn_watcher(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let provider = Arc::clone(self);
        tokio::spawn(async move {
            let mut last: Option<NodeSnapshot> = None;
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let snapshot = match provider.snapshot().await {
                    Ok(snapshot) => snapshot,
                    Err(err) => {
                        warn!("wallet watcher poll failed: {}", err);
                        continue;
                    }
                };
                if let Some(previous) = &last {
                    for event in snapshot_changes(previous, &snapshot) {
                        debug!(?event, "wallet state changed");
                        let _ = provider.events.send(event);
                    }
                }
                last = Some(snapshot);
            }
        })
    }

    async fn snapshot(&self) -> Result<NodeSnapshot, WalletError> {
        let accounts: Vec<Address> = serde_json::from_value(self.request("eth_accounts", json!([])).await?)
            .map_err(WalletError::network)?;
        let chain_id: U256 = serde_json::from_value(self.request("eth_chainId", json!([])).await?)
            .map_err(WalletError::network)?;
        Ok(NodeSnapshot {
            accounts,
            chain_id: chain_id.saturating_to::<u64>(),
        })
    }
}

// ── JSON-RPC envelope ────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

impl RpcResponse {
    fn into_result(self) -> Result<Value, WalletError> {
        if let Some(err) = self.error {
            return Err(err.into());
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NodeSnapshot {
    accounts: Vec<Address>,
    chain_id: u64,
}

fn snapshot_changes(previous: &NodeSnapshot, current: &NodeSnapshot) -> Vec<WalletEvent> {
    let mut events = Vec::new();
    if previous.chain_id != current.chain_id {
        events.push(WalletEvent::ChainChanged(current.chain_id));
    }
    if previous.accounts != current.accounts {
        events.push(WalletEvent::AccountsChanged(current.accounts.clone()));
    }
    events
}

#[async_trait]
impl WalletProvider for HttpRpcProvider {
    /// Node accounts are pre-authorised, so this is `eth_accounts`.
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let value = self.request("eth_accounts", json!([])).await?;
        serde_json::from_value(value).map_err(WalletError::network)
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|err| WalletError::NetworkError(format!("{method} transport: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(WalletError::NetworkError(format!("{method} HTTP {status}: {text}")));
        }

        let envelope: RpcResponse = response
            .json()
            .await
            .map_err(|err| WalletError::NetworkError(format!("{method} parse: {err}")))?;
        envelope.into_result()
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let provider = HttpRpcProvider::new(Some("http://node:8545/".to_owned()));
        assert_eq!(provider.endpoint(), "http://node:8545");
    }

    #[test]
    fn request_envelope_shape() {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: 7,
            method: "eth_chainId",
            params: json!([]),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"jsonrpc": "2.0", "id": 7, "method": "eth_chainId", "params": []})
        );
    }

    #[test]
    fn error_envelope_maps_to_taxonomy() {
        let response: RpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": 3, "message": "execution reverted: Content too long"}
        }))
        .unwrap();
        assert_eq!(
            response.into_result(),
            Err(WalletError::reverted("Content too long"))
        );
    }

    #[test]
    fn null_result_is_kept() {
        let response: RpcResponse =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1, "result": null})).unwrap();
        assert_eq!(response.into_result(), Ok(Value::Null));
    }

    #[test]
    fn snapshot_diff_reports_chain_before_accounts() {
        let previous = NodeSnapshot {
            accounts: vec![Address::repeat_byte(1)],
            chain_id: 1337,
        };
        let current = NodeSnapshot {
            accounts: vec![Address::repeat_byte(2)],
            chain_id: 11155111,
        };
        assert_eq!(
            snapshot_changes(&previous, &current),
            vec![
                WalletEvent::ChainChanged(11155111),
                WalletEvent::AccountsChanged(vec![Address::repeat_byte(2)]),
            ]
        );
        assert!(snapshot_changes(&current, &current).is_empty());
    }
}
