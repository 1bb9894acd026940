//! Test doubles for the wallet capability interface.
//!
//! [`MockWallet`] is an in-memory chain that exposes accounts like a browser
//! wallet and executes the SocialDApp ABI, so session flows can be exercised
//! end to end without a node.

#![allow(clippy::unwrap_used)]

mod chain;

pub use chain::SocialState;

use alloy_primitives::{Address, B256, Bytes, U256, hex, keccak256};
use alloy_sol_types::{Revert, SolError};
use async_trait::async_trait;
use sc_contract::ContractCapabilities;
use sc_wallet::{RpcErrorObject, TxReceipt, WalletError, WalletEvent, WalletProvider};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

pub const MOCK_CHAIN_ID: u64 = 1337;
pub const MOCK_GAS_ESTIMATE: u64 = 50_000;
const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

pub fn account(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

pub fn contract_address() -> Address {
    Address::repeat_byte(0xc0)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallObject {
    #[serde(default)]
    from: Option<Address>,
    #[serde(default)]
    to: Option<Address>,
    #[serde(default)]
    value: Option<U256>,
    #[serde(default)]
    gas: Option<U256>,
    #[serde(default, alias = "input")]
    data: Bytes,
}

struct MockChain {
    accounts: Vec<Address>,
    authorized: bool,
    reject_prompts: bool,
    offline: bool,
    stalled: bool,
    chain_id: u64,
    block_number: u64,
    tx_counter: u64,
    prompts: usize,
    state: SocialState,
    receipts: HashMap<B256, TxReceipt>,
    method_log: Vec<String>,
    submitted_gas: Vec<Option<U256>>,
}

pub struct MockWallet {
    contract: Address,
    chain: Mutex<MockChain>,
    events: broadcast::Sender<WalletEvent>,
}

impl MockWallet {
    pub fn new(accounts: Vec<Address>, capabilities: ContractCapabilities) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            contract: contract_address(),
            chain: Mutex::new(MockChain {
                accounts,
                authorized: false,
                reject_prompts: false,
                offline: false,
                stalled: false,
                chain_id: MOCK_CHAIN_ID,
                block_number: 0,
                tx_counter: 0,
                prompts: 0,
                state: SocialState::new(capabilities),
                receipts: HashMap::new(),
                method_log: Vec::new(),
                submitted_gas: Vec::new(),
            }),
            events,
        }
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    /// Make `address` the selected account and notify subscribers.
    pub fn select_account(&self, address: Address) {
        let accounts = {
            let mut chain = self.chain.lock().unwrap();
            chain.accounts.retain(|a| *a != address);
            chain.accounts.insert(0, address);
            chain.accounts.clone()
        };
        let _ = self.events.send(WalletEvent::AccountsChanged(accounts));
    }

    /// The user disconnected every account from the wallet UI.
    pub fn revoke_accounts(&self) {
        self.chain.lock().unwrap().authorized = false;
        let _ = self.events.send(WalletEvent::AccountsChanged(Vec::new()));
    }

    pub fn switch_chain(&self, chain_id: u64) {
        self.chain.lock().unwrap().chain_id = chain_id;
        let _ = self.events.send(WalletEvent::ChainChanged(chain_id));
    }

    pub fn set_reject_prompts(&self, reject: bool) {
        self.chain.lock().unwrap().reject_prompts = reject;
    }

    pub fn set_offline(&self, offline: bool) {
        self.chain.lock().unwrap().offline = offline;
    }

    /// Every request after this never resolves.
    pub fn set_stalled(&self, stalled: bool) {
        self.chain.lock().unwrap().stalled = stalled;
    }

    pub fn prompt_count(&self) -> usize {
        self.chain.lock().unwrap().prompts
    }

    pub fn method_log(&self) -> Vec<String> {
        self.chain.lock().unwrap().method_log.clone()
    }

    pub fn clear_method_log(&self) {
        self.chain.lock().unwrap().method_log.clear();
    }

    /// Gas limits attached to submitted transactions, in submission order.
    pub fn submitted_gas(&self) -> Vec<Option<U256>> {
        self.chain.lock().unwrap().submitted_gas.clone()
    }

    /// Seed a registration without going through a transaction.
    pub fn seed_user(&self, address: Address, username: &str) {
        self.chain
            .lock()
            .unwrap()
            .state
            .seed_user(address, username);
    }

    /// Seed a post without going through a transaction. Returns its id.
    pub fn seed_post(&self, author: Address, content: &str) -> U256 {
        let mut chain = self.chain.lock().unwrap();
        let timestamp = GENESIS_TIMESTAMP + chain.block_number * 12;
        chain.state.seed_post(author, content, timestamp)
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&SocialState) -> R) -> R {
        f(&self.chain.lock().unwrap().state)
    }

    fn handle(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        let mut chain = self.chain.lock().unwrap();
        chain.method_log.push(method.to_owned());
        if chain.offline {
            return Err(WalletError::network("connection refused"));
        }

        match method {
            "eth_accounts" => {
                if chain.authorized {
                    Ok(json!(chain.accounts))
                } else {
                    Ok(json!([]))
                }
            }
            "eth_chainId" => Ok(json!(format!("{:#x}", chain.chain_id))),
            "eth_blockNumber" => Ok(json!(format!("{:#x}", chain.block_number))),
            "eth_call" => {
                let call = call_object(&params)?;
                let timestamp = GENESIS_TIMESTAMP + chain.block_number * 12;
                let mut scratch = chain.state.clone();
                let output = scratch
                    .execute(
                        call.from.unwrap_or_default(),
                        call.value.unwrap_or_default(),
                        &call.data,
                        timestamp,
                    )
                    .map_err(revert_error)?;
                Ok(json!(Bytes::from(output)))
            }
            "eth_estimateGas" => {
                let call = call_object(&params)?;
                let timestamp = GENESIS_TIMESTAMP + chain.block_number * 12;
                let mut scratch = chain.state.clone();
                scratch
                    .execute(
                        call.from.unwrap_or_default(),
                        call.value.unwrap_or_default(),
                        &call.data,
                        timestamp,
                    )
                    .map_err(revert_error)?;
                Ok(json!(U256::from(MOCK_GAS_ESTIMATE)))
            }
            "eth_sendTransaction" => {
                let call = call_object(&params)?;
                if chain.reject_prompts {
                    return Err(rpc_error(4001, "User denied transaction signature."));
                }
                let from = call.from.unwrap_or_default();
                if !chain.authorized || !chain.accounts.contains(&from) {
                    return Err(rpc_error(4100, "The requested account has not been authorized"));
                }
                if call.to != Some(self.contract) {
                    return Err(rpc_error(-32000, "no contract code at target address"));
                }

                chain.tx_counter += 1;
                chain.block_number += 1;
                chain.submitted_gas.push(call.gas);
                let hash = keccak256(format!("mock-tx-{}", chain.tx_counter));
                let timestamp = GENESIS_TIMESTAMP + chain.block_number * 12;

                // Reverted transactions are mined with status 0 and leave state untouched.
                let mut scratch = chain.state.clone();
                let status = match scratch.execute(from, call.value.unwrap_or_default(), &call.data, timestamp) {
                    Ok(_) => {
                        chain.state = scratch;
                        1u64
                    }
                    Err(_) => 0,
                };

                let receipt = TxReceipt {
                    transaction_hash: hash,
                    block_number: Some(U256::from(chain.block_number)),
                    status: Some(U256::from(status)),
                    contract_address: None,
                    gas_used: Some(U256::from(MOCK_GAS_ESTIMATE)),
                };
                chain.receipts.insert(hash, receipt);
                Ok(json!(hash))
            }
            "eth_getTransactionReceipt" => {
                let hash: B256 = params
                    .get(0)
                    .cloned()
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(WalletError::network)?
                    .ok_or_else(|| WalletError::network("missing transaction hash"))?;
                Ok(json!(chain.receipts.get(&hash)))
            }
            other => Err(rpc_error(-32601, &format!("method {other} not supported"))),
        }
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let stalled = {
            let mut chain = self.chain.lock().unwrap();
            chain.method_log.push("eth_requestAccounts".to_owned());
            chain.prompts += 1;
            chain.stalled
        };
        if stalled {
            std::future::pending::<()>().await;
        }

        let mut chain = self.chain.lock().unwrap();
        if chain.offline {
            return Err(WalletError::network("connection refused"));
        }
        if chain.reject_prompts {
            return Err(rpc_error(4001, "User rejected the request."));
        }
        chain.authorized = true;
        Ok(chain.accounts.clone())
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        let stalled = self.chain.lock().unwrap().stalled;
        if stalled {
            std::future::pending::<()>().await;
        }
        self.handle(method, params)
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

fn call_object(params: &Value) -> Result<CallObject, WalletError> {
    let raw = params
        .get(0)
        .cloned()
        .ok_or_else(|| WalletError::network("missing call object"))?;
    serde_json::from_value(raw).map_err(WalletError::network)
}

fn rpc_error(code: i64, message: &str) -> WalletError {
    WalletError::from(RpcErrorObject {
        code,
        message: message.to_owned(),
        data: None,
    })
}

fn revert_error(reason: String) -> WalletError {
    let data = Revert {
        reason: reason.clone(),
    }
    .abi_encode();
    WalletError::from(RpcErrorObject {
        code: sc_wallet::EXECUTION_REVERTED_CODE,
        message: format!("execution reverted: {reason}"),
        data: Some(json!(format!("0x{}", hex::encode(data)))),
    })
}
