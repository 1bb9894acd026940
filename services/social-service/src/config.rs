use alloy_primitives::Address;
use anyhow::{Context, Result, anyhow};
use sc_contract::{ContractCapabilities, DispatchOptions};
use sc_rpc_http::DEFAULT_RPC_URL;
use std::net::SocketAddr;
use std::time::Duration;

/// Runtime settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub(crate) struct ServiceConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) rpc_url: String,
    pub(crate) contract_address: Address,
    pub(crate) capabilities: ContractCapabilities,
    pub(crate) dispatch: DispatchOptions,
    pub(crate) call_timeout: Duration,
    pub(crate) poll_interval: Duration,
    pub(crate) marker_db_path: Option<String>,
    pub(crate) pinata_jwt: Option<String>,
    pub(crate) pinata_api_url: Option<String>,
    pub(crate) gateway_url: Option<String>,
}

impl ServiceConfig {
    pub(crate) fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|value| value.trim().to_owned()).filter(|value| !value.is_empty());

        let bind_addr = get("SOCIAL_BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_owned())
            .parse()
            .context("SOCIAL_BIND_ADDR must be host:port")?;

        let contract_address = get("CONTRACT_ADDRESS")
            .ok_or_else(|| anyhow!("CONTRACT_ADDRESS is required"))?
            .parse::<Address>()
            .context("CONTRACT_ADDRESS must be a 20-byte hex address")?;

        let capabilities = get("CONTRACT_FEATURES")
            .unwrap_or_else(|| "media,withdrawal".to_owned())
            .parse::<ContractCapabilities>()
            .map_err(|err| anyhow!("CONTRACT_FEATURES: {err}"))?;

        let gas_buffer_percent = match get("GAS_BUFFER_PERCENT") {
            Some(raw) => raw.parse::<u32>().context("GAS_BUFFER_PERCENT must be an integer")?,
            None => 20,
        };

        Ok(Self {
            bind_addr,
            rpc_url: get("RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_owned()),
            contract_address,
            capabilities,
            dispatch: DispatchOptions {
                gas_buffer_percent: (gas_buffer_percent > 0).then_some(gas_buffer_percent),
                ..DispatchOptions::default()
            },
            call_timeout: Duration::from_secs(seconds(&get, "WALLET_TIMEOUT_SECS", 60)?.max(1)),
            poll_interval: Duration::from_secs(seconds(&get, "WALLET_POLL_SECS", 2)?.max(1)),
            marker_db_path: get("MARKER_DB_PATH"),
            pinata_jwt: get("PINATA_JWT"),
            pinata_api_url: get("PINATA_API_URL"),
            gateway_url: get("GATEWAY_URL"),
        })
    }
}

fn seconds(get: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64> {
    match get(key) {
        Some(raw) => raw.parse().with_context(|| format!("{key} must be a number of seconds")),
        None => Ok(default),
    }
}
