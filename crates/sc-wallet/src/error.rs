use alloy_primitives::hex;
use serde::Deserialize;
use serde_json::Value;

/// Failure taxonomy shared by every wallet, contract and dispatcher call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("no wallet found; please install a browser wallet")]
    WalletUnavailable,
    #[error("request was rejected in the wallet")]
    UserRejected,
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("call reverted: {}", reason.as_deref().unwrap_or("no reason given"))]
    CallReverted { reason: Option<String> },
    #[error("{0}")]
    ValidationError(String),
}

impl WalletError {
    pub fn network(err: impl std::fmt::Display) -> Self {
        Self::NetworkError(err.to_string())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    pub fn reverted(reason: impl Into<String>) -> Self {
        Self::CallReverted {
            reason: Some(reason.into()),
        }
    }
}

/// EIP-1193 code for "user rejected request".
pub const USER_REJECTED_CODE: i64 = 4001;
/// Code geth and most dev nodes attach to `execution reverted`.
pub const EXECUTION_REVERTED_CODE: i64 = 3;

/// JSON-RPC error object as returned by wallets and nodes.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl From<RpcErrorObject> for WalletError {
    fn from(err: RpcErrorObject) -> Self {
        if err.code == USER_REJECTED_CODE {
            return WalletError::UserRejected;
        }

        let lowered = err.message.to_lowercase();
        if err.code == EXECUTION_REVERTED_CODE || lowered.contains("revert") {
            let reason = err
                .data
                .as_ref()
                .and_then(revert_data)
                .and_then(|bytes| alloy_sol_types::decode_revert_reason(&bytes))
                .filter(|reason| !reason.is_empty())
                .or_else(|| message_reason(&err.message));
            return WalletError::CallReverted { reason };
        }

        WalletError::NetworkError(format!("rpc error {}: {}", err.code, err.message))
    }
}

fn revert_data(data: &Value) -> Option<Vec<u8>> {
    let raw = match data {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("data")?.as_str()?,
        _ => return None,
    };
    hex::decode(raw.trim_start_matches("0x")).ok()
}

fn message_reason(message: &str) -> Option<String> {
    let reason = match message.find("reverted") {
        Some(idx) => message[idx + "reverted".len()..].trim_start_matches([':', ' ']),
        None => message,
    };
    let reason = reason
        .strip_prefix("with reason string")
        .unwrap_or(reason)
        .trim()
        .trim_matches('\'');
    if reason.is_empty() {
        None
    } else {
        Some(reason.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::{Revert, SolError};
    use serde_json::json;

    #[test]
    fn rejection_code_maps_to_user_rejected() {
        let err = WalletError::from(RpcErrorObject {
            code: 4001,
            message: "User denied account authorization".to_owned(),
            data: None,
        });
        assert_eq!(err, WalletError::UserRejected);
    }

    #[test]
    fn revert_reason_is_decoded_from_error_data() {
        let data = Revert {
            reason: "Username already taken".to_owned(),
        }
        .abi_encode();
        let err = WalletError::from(RpcErrorObject {
            code: 3,
            message: "execution reverted".to_owned(),
            data: Some(json!(format!("0x{}", hex::encode(data)))),
        });
        assert_eq!(err, WalletError::reverted("Username already taken"));
    }

    #[test]
    fn revert_reason_falls_back_to_message() {
        let err = WalletError::from(RpcErrorObject {
            code: -32000,
            message: "VM Exception while processing transaction: reverted with reason string 'User not registered'"
                .to_owned(),
            data: None,
        });
        assert_eq!(err, WalletError::reverted("User not registered"));
    }

    #[test]
    fn bare_revert_has_no_reason() {
        let err = WalletError::from(RpcErrorObject {
            code: 3,
            message: "execution reverted".to_owned(),
            data: None,
        });
        assert_eq!(err, WalletError::CallReverted { reason: None });
    }

    #[test]
    fn other_codes_are_network_errors() {
        let err = WalletError::from(RpcErrorObject {
            code: -32603,
            message: "internal error".to_owned(),
            data: None,
        });
        assert!(matches!(err, WalletError::NetworkError(_)));
    }
}
