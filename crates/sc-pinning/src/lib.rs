use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use sc_api_types::{MediaKind, MediaRef};
use serde::Deserialize;
use tracing::{info, warn};

pub const DEFAULT_PINNING_API_URL: &str = "https://api.pinata.cloud";
pub const DEFAULT_GATEWAY_URL: &str = "https://gateway.pinata.cloud";

/// Retrieval URL for a pinned object: `{gateway}/ipfs/{cid}`.
pub fn media_url(gateway: &str, cid: &str) -> String {
    format!("{}/ipfs/{}", gateway.trim_end_matches('/'), cid)
}

/// Images render inline, anything else as a link.
pub fn media_kind(media_type: &str) -> MediaKind {
    if media_type.starts_with("image/") {
        MediaKind::Image
    } else {
        MediaKind::Link
    }
}

pub fn media_ref(gateway: &str, hash: &str, media_type: &str) -> MediaRef {
    MediaRef {
        hash: hash.to_owned(),
        media_type: media_type.to_owned(),
        url: media_url(gateway, hash),
        kind: media_kind(media_type),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedMedia {
    pub cid: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct PinFileResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

/// Client for a Pinata-compatible pinning service.
///
/// Reads `PINATA_JWT`, `PINATA_API_URL` and `GATEWAY_URL` from environment
/// when the corresponding argument is `None`.
#[derive(Clone)]
pub struct PinningClient {
    api_url: String,
    gateway_url: String,
    jwt: Option<String>,
    http: reqwest::Client,
}

impl PinningClient {
    pub fn new(api_url: Option<String>, gateway_url: Option<String>, jwt: Option<String>) -> Self {
        let api_url = api_url
            .or_else(|| std::env::var("PINATA_API_URL").ok())
            .unwrap_or_else(|| DEFAULT_PINNING_API_URL.to_string());
        let gateway_url = gateway_url
            .or_else(|| std::env::var("GATEWAY_URL").ok())
            .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string());
        let jwt = jwt
            .or_else(|| std::env::var("PINATA_JWT").ok())
            .filter(|token| !token.trim().is_empty());
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            jwt,
            http: reqwest::Client::new(),
        }
    }

    pub fn gateway_url(&self) -> &str {
        &self.gateway_url
    }

    pub fn is_configured(&self) -> bool {
        self.jwt.is_some()
    }

    /// Upload one file and return its content identifier and gateway URL.
    pub async fn pin_file(&self, file_name: &str, content_type: &str, bytes: Vec<u8>) -> Result<PinnedMedia> {
        let Some(jwt) = self.jwt.as_deref() else {
            anyhow::bail!("pinning service configuration is missing (PINATA_JWT)");
        };
        if bytes.is_empty() {
            anyhow::bail!("no file provided");
        }

        info!(name = file_name, size = bytes.len(), content_type, "uploading media");

        let part = Part::bytes(bytes)
            .file_name(file_name.to_owned())
            .mime_str(content_type)
            .context("invalid media content type")?;
        let form = Form::new()
            .part("file", part)
            .text("pinataMetadata", serde_json::json!({ "name": file_name }).to_string())
            .text("pinataOptions", serde_json::json!({ "cidVersion": 1 }).to_string());

        let url = format!("{}/pinning/pinFileToIPFS", self.api_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(jwt)
            .multipart(form)
            .send()
            .await
            .context("pinning upload transport")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(%status, body = %text, "pinning upload failed");
            match status {
                reqwest::StatusCode::FORBIDDEN => {
                    anyhow::bail!("pinning authentication failed; check the JWT")
                }
                reqwest::StatusCode::UNAUTHORIZED => {
                    anyhow::bail!("pinning token is invalid or expired")
                }
                _ => anyhow::bail!("failed to upload to pinning service: HTTP {status}"),
            }
        }

        let body: PinFileResponse = response.json().await.context("pinning upload parse")?;
        Ok(PinnedMedia {
            url: media_url(&self.gateway_url, &body.ipfs_hash),
            cid: body.ipfs_hash,
        })
    }
}
