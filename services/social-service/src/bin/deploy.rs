//! Deploys the SocialDApp contract through a node that custodies the
//! deployer account (ganache / hardhat style `eth_sendTransaction`).
//!
//! `DEPLOY_BYTECODE_PATH` points at either a compiler artifact JSON with a
//! `bytecode` field or a plain hex file.

use alloy_primitives::{Address, Bytes, hex};
use anyhow::{Context, Result, anyhow};
use sc_rpc_http::HttpRpcProvider;
use sc_wallet::{ProviderHandle, TxRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let path = std::env::var("DEPLOY_BYTECODE_PATH").context("DEPLOY_BYTECODE_PATH is required")?;
    let raw = std::fs::read_to_string(&path).with_context(|| format!("cannot read {path}"))?;
    let bytecode = parse_bytecode(&raw).with_context(|| format!("invalid bytecode in {path}"))?;

    let node = Arc::new(HttpRpcProvider::new(std::env::var("RPC_URL").ok()));
    let provider = ProviderHandle::new(node.clone(), Duration::from_secs(60));

    let deployer = match std::env::var("DEPLOYER_ADDRESS") {
        Ok(raw) => raw
            .trim()
            .parse::<Address>()
            .context("DEPLOYER_ADDRESS must be a 20-byte hex address")?,
        Err(_) => provider
            .accounts()
            .await?
            .first()
            .copied()
            .ok_or_else(|| anyhow!("node at {} exposes no accounts", node.endpoint()))?,
    };

    println!("Deploying SocialDApp contract...");
    info!(%deployer, bytes = bytecode.len(), rpc = %node.endpoint(), "sending creation transaction");

    let tx = TxRequest {
        from: Some(deployer),
        data: bytecode,
        ..TxRequest::default()
    };
    let pending = provider.send_transaction(&tx).await?;
    let receipt = pending
        .wait(Duration::from_secs(1), Duration::from_secs(120))
        .await?;
    let address = receipt
        .contract_address
        .ok_or_else(|| anyhow!("receipt for {} has no contract address", receipt.transaction_hash))?;

    println!("SocialDApp deployed to: {address}");
    Ok(())
}

fn parse_bytecode(raw: &str) -> Result<Bytes> {
    let trimmed = raw.trim();
    let hex_text = if trimmed.starts_with('{') {
        let artifact: serde_json::Value = serde_json::from_str(trimmed)?;
        artifact
            .get("bytecode")
            .and_then(|value| value.as_str())
            .ok_or_else(|| anyhow!("artifact has no string `bytecode` field"))?
            .to_owned()
    } else {
        trimmed.to_owned()
    };

    let bytes = hex::decode(hex_text.trim())?;
    if bytes.is_empty() {
        return Err(anyhow!("bytecode is empty"));
    }
    Ok(Bytes::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_plain_hex_and_artifacts() -> Result<()> {
        assert_eq!(parse_bytecode("0x6080\n")?, Bytes::from(vec![0x60, 0x80]));
        assert_eq!(
            parse_bytecode(r#"{"contractName":"SocialDApp","bytecode":"0x60806040"}"#)?,
            Bytes::from(vec![0x60, 0x80, 0x60, 0x40])
        );
        assert!(parse_bytecode("0x").is_err());
        assert!(parse_bytecode(r#"{"abi":[]}"#).is_err());
        Ok(())
    }
}
