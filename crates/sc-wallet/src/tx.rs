use alloy_primitives::{Address, B256, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{ProviderHandle, WalletError};

/// Call or transaction object in JSON-RPC shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    pub data: Bytes,
}

impl TxRequest {
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to: Some(to),
            data: data.into(),
            ..Self::default()
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_gas(mut self, gas: U256) -> Self {
        self.gas = Some(gas);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub block_number: Option<U256>,
    #[serde(default)]
    pub status: Option<U256>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub gas_used: Option<U256>,
}

impl TxReceipt {
    /// Receipts without a status field predate EIP-658 and count as success.
    pub fn succeeded(&self) -> bool {
        self.status.is_none_or(|status| status == U256::from(1))
    }

    pub fn block_number_u64(&self) -> Option<u64> {
        self.block_number.map(|n| n.saturating_to::<u64>())
    }
}

/// A broadcast transaction that has not been confirmed yet.
pub struct PendingTx {
    hash: B256,
    provider: ProviderHandle,
}

impl PendingTx {
    pub(crate) fn new(hash: B256, provider: ProviderHandle) -> Self {
        Self { hash, provider }
    }

    pub fn hash(&self) -> B256 {
        self.hash
    }

    /// Poll for the receipt until the transaction is included in a block.
    ///
    /// A transaction that was accepted for broadcast but reverted on-chain is
    /// reported as `CallReverted` here, never earlier.
    pub async fn wait(self, poll_interval: Duration, timeout: Duration) -> Result<TxReceipt, WalletError> {
        let hash = self.hash;
        let poll = async {
            loop {
                if let Some(receipt) = self.provider.transaction_receipt(hash).await? {
                    return Ok::<TxReceipt, WalletError>(receipt);
                }
                tokio::time::sleep(poll_interval).await;
            }
        };

        let receipt = tokio::time::timeout(timeout, poll).await.map_err(|_| {
            WalletError::NetworkError(format!("timed out waiting for confirmation of {hash}"))
        })??;

        if !receipt.succeeded() {
            return Err(WalletError::reverted(format!("transaction {hash} reverted on-chain")));
        }

        tracing::info!(tx_hash = %hash, block = ?receipt.block_number_u64(), "transaction confirmed");
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serialises_as_rpc_object() {
        let to = Address::repeat_byte(0xaa);
        let tx = TxRequest::call(to, vec![0x12, 0x34]).with_value(U256::from(16));
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["data"], json!("0x1234"));
        assert_eq!(value["value"], json!("0x10"));
        assert!(value.get("from").is_none());
        assert!(value.get("gas").is_none());
    }

    #[test]
    fn receipt_status_decides_success() {
        let receipt: TxReceipt = serde_json::from_value(json!({
            "transactionHash": format!("0x{}", "ab".repeat(32)),
            "blockNumber": "0x5",
            "status": "0x0",
        }))
        .unwrap();
        assert!(!receipt.succeeded());
        assert_eq!(receipt.block_number_u64(), Some(5));

        let legacy: TxReceipt = serde_json::from_value(json!({
            "transactionHash": format!("0x{}", "cd".repeat(32)),
        }))
        .unwrap();
        assert!(legacy.succeeded());
    }
}
