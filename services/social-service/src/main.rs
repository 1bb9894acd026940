mod config;
mod error;
mod posts;
mod session;
mod tips;
mod users;

use anyhow::Context;
use axum::{
    Json, Router,
    routing::{get, post, put},
};
use sc_pinning::PinningClient;
use sc_rpc_http::HttpRpcProvider;
use sc_session::{Session, SessionConfig};
use sc_storage::{ClientStore, InMemoryClientStore, RocksDbClientStore};
use sc_wallet::WalletProvider;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::ServiceConfig;

#[derive(Debug, Serialize)]
struct HealthResponse {
    service: &'static str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    service: &'static str,
    version: &'static str,
}

pub(crate) struct AppState {
    pub(crate) session: Arc<Session>,
    pub(crate) pinning: PinningClient,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServiceConfig::from_env()?;

    let provider = Arc::new(HttpRpcProvider::new(Some(config.rpc_url.clone())));
    let _watcher = provider.spawn_watcher(config.poll_interval);

    let store: Arc<dyn ClientStore> = match &config.marker_db_path {
        Some(path) => Arc::new(
            RocksDbClientStore::open_default(path)
                .with_context(|| format!("cannot open marker store at {path}"))?,
        ),
        None => Arc::new(InMemoryClientStore::default()),
    };

    let pinning = PinningClient::new(
        config.pinata_api_url.clone(),
        config.gateway_url.clone(),
        config.pinata_jwt.clone(),
    );

    let session_config = SessionConfig {
        capabilities: config.capabilities,
        dispatch: config.dispatch.clone(),
        call_timeout: config.call_timeout,
        gateway_url: pinning.gateway_url().to_owned(),
        ..SessionConfig::new(config.contract_address)
    };
    let wallet: Arc<dyn WalletProvider> = provider.clone();
    let session = Arc::new(Session::new(Some(wallet), store, session_config));
    session.attach_listeners();

    let snapshot = session.restore().await?;
    info!(status = ?snapshot.status, rpc = %provider.endpoint(), "session initialised");

    let app = app(Arc::new(AppState { session, pinning }));

    info!("social-service listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/session", get(session::session_snapshot))
        .route("/session/connect", post(session::session_connect))
        .route("/session/restore", post(session::session_restore))
        .route("/session/disconnect", post(session::session_disconnect))
        .route("/session/route", get(session::session_route))
        .route("/users/available", get(users::username_available))
        .route("/users/register", post(users::register))
        .route("/users/me", get(users::current_user))
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route("/posts/media", post(posts::create_media_post))
        .route("/posts/{id}", put(posts::edit_post))
        .route("/posts/{id}/tip", post(posts::tip_post))
        .route("/posts/{id}/tips", get(posts::post_tips))
        .route("/tips", get(tips::available_tips))
        .route("/tips/total", get(tips::total_tips))
        .route("/tips/withdraw", post(tips::withdraw))
        .route("/stats", get(tips::platform_stats))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        service: "social-service",
        status: "ok",
    })
}

async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        service: "social-service",
        version: env!("CARGO_PKG_VERSION"),
    })
}
