use super::*;
use alloy_primitives::U256;
use sc_api_types::MediaKind;
use sc_contract::MediaAttachment;
use sc_storage::InMemoryClientStore;
use sc_testkit::{MOCK_CHAIN_ID, MOCK_GAS_ESTIMATE, MockWallet, account, contract_address};

struct Harness {
    wallet: Arc<MockWallet>,
    store: Arc<InMemoryClientStore>,
    session: Arc<Session>,
}

fn config(capabilities: ContractCapabilities) -> SessionConfig {
    SessionConfig {
        capabilities,
        dispatch: DispatchOptions {
            confirmation_poll: Duration::from_millis(10),
            ..DispatchOptions::default()
        },
        call_timeout: Duration::from_secs(5),
        gateway_url: "https://gw.example".to_string(),
        ..SessionConfig::new(contract_address())
    }
}

fn harness_with(accounts: Vec<Address>, config: SessionConfig) -> Harness {
    let wallet = Arc::new(MockWallet::new(accounts, config.capabilities));
    let store = Arc::new(InMemoryClientStore::default());
    let session = Arc::new(Session::new(
        Some(wallet.clone() as Arc<dyn WalletProvider>),
        store.clone() as Arc<dyn ClientStore>,
        config,
    ));
    Harness {
        wallet,
        store,
        session,
    }
}

fn harness(accounts: Vec<Address>) -> Harness {
    harness_with(accounts, config(ContractCapabilities::full()))
}

fn assert_validation(err: &SessionError) {
    assert!(
        matches!(err, SessionError::Wallet(WalletError::ValidationError(_))),
        "expected validation error, got {err:?}"
    );
}

#[tokio::test]
async fn connect_without_wallet_is_unavailable() {
    let session = Session::new(
        None,
        Arc::new(InMemoryClientStore::default()),
        config(ContractCapabilities::full()),
    );
    let err = session.connect().await.unwrap_err();
    assert_eq!(err, SessionError::Wallet(WalletError::WalletUnavailable));
    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.status, SessionStatus::Disconnected);
    assert!(snapshot.last_error.is_some());
}

#[tokio::test]
async fn dismissed_prompt_returns_to_disconnected() -> anyhow::Result<()> {
    let h = harness(vec![account(1)]);
    h.wallet.set_reject_prompts(true);

    let err = h.session.connect().await.unwrap_err();
    assert_eq!(err, SessionError::Wallet(WalletError::UserRejected));
    assert_eq!(h.session.snapshot().await.status, SessionStatus::Disconnected);
    assert!(h.store.load_connection_marker().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn connect_derives_registration_and_sets_marker() -> anyhow::Result<()> {
    let h = harness(vec![account(1)]);
    h.wallet.seed_user(account(1), "alice");

    let snapshot = h.session.connect().await?;
    assert_eq!(snapshot.status, SessionStatus::Connected { registered: true });
    assert_eq!(snapshot.chain_id, Some(MOCK_CHAIN_ID));
    assert_eq!(snapshot.account, Some(account(1).to_string()));
    assert!(!snapshot.loading);
    assert_eq!(h.wallet.prompt_count(), 1);

    let marker = h.store.load_connection_marker().await?.expect("marker saved");
    assert_eq!(marker.wallet_address, account(1).to_string());
    assert!(h.session.has_connection_marker().await?);
    assert_eq!(h.session.current_username().await?, Some("alice".to_string()));
    Ok(())
}

/// Store whose marker writes always fail; everything else is in-memory.
#[derive(Default)]
struct MarkerWriteFails {
    inner: InMemoryClientStore,
}

#[async_trait::async_trait]
impl ClientStore for MarkerWriteFails {
    async fn save_connection_marker(&self, _marker: &ConnectionMarker) -> anyhow::Result<()> {
        anyhow::bail!("disk full")
    }

    async fn load_connection_marker(&self) -> anyhow::Result<Option<ConnectionMarker>> {
        self.inner.load_connection_marker().await
    }

    async fn clear_connection_marker(&self) -> anyhow::Result<()> {
        self.inner.clear_connection_marker().await
    }

    async fn mark_post_edited(&self, post_id: &str) -> anyhow::Result<()> {
        self.inner.mark_post_edited(post_id).await
    }

    async fn is_post_edited(&self, post_id: &str) -> anyhow::Result<bool> {
        self.inner.is_post_edited(post_id).await
    }
}

#[tokio::test]
async fn marker_write_failure_leaves_session_disconnected() {
    let cfg = config(ContractCapabilities::full());
    let wallet = Arc::new(MockWallet::new(vec![account(1)], cfg.capabilities));
    wallet.seed_user(account(1), "alice");
    let session = Session::new(
        Some(wallet.clone() as Arc<dyn WalletProvider>),
        Arc::new(MarkerWriteFails::default()),
        cfg,
    );

    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, SessionError::Storage(_)), "got {err:?}");

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.status, SessionStatus::Disconnected);
    assert_eq!(snapshot.account, None);
    assert!(!snapshot.loading);
    assert!(snapshot.last_error.is_some());
    assert_eq!(
        session.create_post("hello", None).await.unwrap_err(),
        SessionError::NotConnected
    );
}

#[tokio::test]
async fn stalled_wallet_times_out_as_network_error() {
    let h = harness_with(
        vec![account(1)],
        SessionConfig {
            call_timeout: Duration::from_millis(200),
            ..config(ContractCapabilities::full())
        },
    );
    h.wallet.set_stalled(true);

    let err = h.session.connect().await.unwrap_err();
    match err {
        SessionError::Wallet(WalletError::NetworkError(message)) => assert!(message.contains("timed out")),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(h.session.snapshot().await.status, SessionStatus::Disconnected);
}

#[tokio::test]
async fn register_then_flag_matches_contract() -> anyhow::Result<()> {
    let h = harness(vec![account(1)]);
    let snapshot = h.session.connect().await?;
    assert_eq!(snapshot.status, SessionStatus::Connected { registered: false });

    let outcome = h.session.register("  bob ").await?;
    assert!(outcome.block_number.is_some());

    let on_chain = h.wallet.with_state(|state| state.is_registered(account(1)));
    assert!(on_chain);
    assert_eq!(h.session.is_registered().await, on_chain);
    assert_eq!(
        h.session.snapshot().await.status,
        SessionStatus::Connected { registered: true }
    );
    assert_eq!(h.wallet.with_state(|state| state.username(account(1))), Some("bob".to_string()));

    let err = h.session.register("bobby").await.unwrap_err();
    assert_eq!(err, SessionError::AlreadyRegistered);
    Ok(())
}

#[tokio::test]
async fn empty_username_is_rejected_locally() -> anyhow::Result<()> {
    let h = harness(vec![account(1)]);
    h.session.connect().await?;
    h.wallet.clear_method_log();

    let err = h.session.register("   ").await.unwrap_err();
    assert_validation(&err);
    assert!(h.wallet.method_log().is_empty());
    Ok(())
}

#[tokio::test]
async fn username_precheck_is_case_insensitive() -> anyhow::Result<()> {
    let h = harness(vec![account(2), account(1)]);
    h.wallet.seed_user(account(1), "alice");
    h.wallet.seed_post(account(1), "first!");

    h.session.connect().await?;
    assert!(!h.session.is_username_available("ALICE").await?);
    assert!(h.session.is_username_available("carol").await?);

    let err = h.session.register("Alice").await.unwrap_err();
    assert_eq!(err, SessionError::UsernameTaken("Alice".to_string()));
    assert!(!h.session.is_registered().await);
    Ok(())
}

#[tokio::test]
async fn contract_rejects_taken_name_the_precheck_cannot_see() -> anyhow::Result<()> {
    // "alice" never posted, so only the contract knows the name is taken.
    let h = harness(vec![account(2)]);
    h.wallet.seed_user(account(1), "alice");

    h.session.connect().await?;
    assert!(h.session.is_username_available("Alice").await?);
    let err = h.session.register("Alice").await.unwrap_err();
    assert_eq!(
        err,
        SessionError::Wallet(WalletError::CallReverted {
            reason: Some("Username already taken".to_string())
        })
    );
    assert!(!h.session.is_registered().await);
    Ok(())
}

#[tokio::test]
async fn invalid_post_content_makes_no_network_call() -> anyhow::Result<()> {
    let h = harness(vec![account(1)]);
    h.wallet.seed_user(account(1), "alice");
    h.session.connect().await?;
    h.wallet.clear_method_log();

    assert_validation(&h.session.create_post("", None).await.unwrap_err());
    assert_validation(&h.session.create_post(" \n\t ", None).await.unwrap_err());
    let long = "x".repeat(MAX_POST_LENGTH + 1);
    assert_validation(&h.session.create_post(&long, None).await.unwrap_err());
    assert_validation(&h.session.edit_post("1", "").await.unwrap_err());
    assert_validation(&h.session.tip_post("1", "0").await.unwrap_err());
    assert_validation(&h.session.tip_post("1", "lots").await.unwrap_err());
    assert_validation(&h.session.tip_post("1", "-0.01").await.unwrap_err());

    assert!(h.wallet.method_log().is_empty());
    assert_eq!(h.wallet.with_state(|state| state.post_count()), 0);

    let exact = "x".repeat(MAX_POST_LENGTH);
    h.session.create_post(&exact, None).await?;
    assert_eq!(h.wallet.with_state(|state| state.post_count()), 1);
    Ok(())
}

#[tokio::test]
async fn gated_dispatchers_require_connection_and_registration() -> anyhow::Result<()> {
    let h = harness(vec![account(1)]);
    assert_eq!(
        h.session.create_post("hi", None).await.unwrap_err(),
        SessionError::NotConnected
    );
    assert_eq!(h.session.withdraw_tips().await.unwrap_err(), SessionError::NotConnected);

    h.session.connect().await?;
    assert_eq!(
        h.session.create_post("hi", None).await.unwrap_err(),
        SessionError::NotRegistered
    );
    assert_eq!(
        h.session.edit_post("1", "hi").await.unwrap_err(),
        SessionError::NotRegistered
    );
    Ok(())
}

#[tokio::test]
async fn dispatcher_estimates_then_submits_then_waits() -> anyhow::Result<()> {
    let h = harness(vec![account(1)]);
    h.wallet.seed_user(account(1), "alice");
    h.session.connect().await?;
    h.wallet.clear_method_log();

    h.session.create_post("hello world", None).await?;

    let log = h.wallet.method_log();
    let position = |method: &str| log.iter().position(|m| m == method).expect(method);
    assert!(position("eth_estimateGas") < position("eth_sendTransaction"));
    assert!(position("eth_sendTransaction") < position("eth_getTransactionReceipt"));
    assert_eq!(
        h.wallet.submitted_gas(),
        vec![Some(U256::from(MOCK_GAS_ESTIMATE * 120 / 100))]
    );
    Ok(())
}

#[tokio::test]
async fn gas_buffer_can_be_disabled() -> anyhow::Result<()> {
    let mut cfg = config(ContractCapabilities::full());
    cfg.dispatch.gas_buffer_percent = None;
    let h = harness_with(vec![account(1)], cfg);
    h.wallet.seed_user(account(1), "alice");
    h.session.connect().await?;
    h.wallet.clear_method_log();

    h.session.create_post("no estimate", None).await?;
    assert!(!h.wallet.method_log().iter().any(|m| m == "eth_estimateGas"));
    assert_eq!(h.wallet.submitted_gas(), vec![None]);
    Ok(())
}

#[tokio::test]
async fn on_chain_revert_surfaces_after_confirmation() -> anyhow::Result<()> {
    let mut cfg = config(ContractCapabilities::full());
    cfg.dispatch.gas_buffer_percent = None;
    let h = harness_with(vec![account(2), account(1)], cfg);
    h.wallet.seed_user(account(1), "alice");
    h.wallet.seed_user(account(2), "mallory");
    let post = h.wallet.seed_post(account(1), "original");

    h.session.connect().await?;
    let err = h.session.edit_post(&post.to_string(), "defaced").await.unwrap_err();
    assert!(matches!(err, SessionError::Wallet(WalletError::CallReverted { .. })));
    assert_eq!(h.wallet.submitted_gas().len(), 1);
    assert_eq!(
        h.wallet.with_state(|state| state.post_content(post)),
        Some("original".to_string())
    );
    assert!(!h.store.is_post_edited(&post.to_string()).await?);
    assert!(h.session.snapshot().await.last_error.is_some());
    Ok(())
}

#[tokio::test]
async fn bob_posts_receives_tip_and_withdraws() -> anyhow::Result<()> {
    let h = harness(vec![account(0xa), account(0xb)]);

    h.session.connect().await?;
    h.session.register("bob").await?;
    h.session.create_post("hello world", None).await?;

    let feed = h.session.load_feed().await?;
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].author_name, "bob");
    assert!(feed[0].is_owner);
    let post_id = feed[0].id.0.clone();

    let before = h.session.get_available_tips().await?;
    assert_eq!(before.available, "0.0");
    assert_validation(&h.session.withdraw_tips().await.unwrap_err());

    // Account B tips from the same wallet.
    h.wallet.select_account(account(0xb));
    h.session.handle_accounts_changed(&[account(0xb), account(0xa)]).await;
    assert!(!h.session.is_registered().await);
    h.session.tip_post(&post_id, "0.01").await?;
    assert_eq!(h.session.get_post_tips(&post_id).await?, U256::from(10_000_000_000_000_000u64));

    h.wallet.select_account(account(0xa));
    h.session.handle_accounts_changed(&[account(0xa), account(0xb)]).await;
    let tips = h.session.get_available_tips().await?;
    assert_eq!(tips.total, "0.01");
    assert_eq!(tips.withdrawn, "0.0");
    assert_eq!(tips.available, "0.01");

    h.session.withdraw_tips().await?;
    let after = h.session.get_available_tips().await?;
    assert_eq!(after.available, "0.0");
    assert_eq!(after.withdrawn, "0.01");
    assert_eq!(after.total, "0.01");
    assert_eq!(h.session.get_user_tips().await?, U256::from(10_000_000_000_000_000u64));

    let stats = h.session.platform_stats().await?;
    assert_eq!(stats.users_count, 1);
    assert_eq!(stats.posts_count, 1);
    Ok(())
}

#[tokio::test]
async fn account_switch_recomputes_registration_before_gated_calls() -> anyhow::Result<()> {
    let h = harness(vec![account(1), account(2)]);
    h.wallet.seed_user(account(1), "alice");

    h.session.connect().await?;
    assert!(h.session.is_registered().await);

    h.wallet.select_account(account(2));
    h.session.handle_accounts_changed(&[account(2), account(1)]).await;
    let snapshot = h.session.snapshot().await;
    assert_eq!(snapshot.account, Some(account(2).to_string()));
    assert_eq!(snapshot.status, SessionStatus::Connected { registered: false });
    assert_eq!(
        h.session.create_post("not mine", None).await.unwrap_err(),
        SessionError::NotRegistered
    );

    let marker = h.store.load_connection_marker().await?.expect("marker kept");
    assert_eq!(marker.wallet_address, account(2).to_string());
    Ok(())
}

#[tokio::test]
async fn disconnect_clears_handles_and_marker() -> anyhow::Result<()> {
    let h = harness(vec![account(1)]);
    h.wallet.seed_user(account(1), "alice");
    h.session.connect().await?;
    assert!(h.session.is_registered().await);

    h.session.disconnect().await?;
    let snapshot = h.session.snapshot().await;
    assert_eq!(snapshot.status, SessionStatus::Disconnected);
    assert_eq!(snapshot.account, None);
    assert!(!snapshot.is_registered);
    assert!(h.store.load_connection_marker().await?.is_none());
    assert_eq!(h.session.load_feed().await.unwrap_err(), SessionError::NotConnected);
    assert_eq!(h.session.current_username().await.unwrap_err(), SessionError::NotConnected);
    Ok(())
}

#[tokio::test]
async fn revoked_accounts_destroy_the_session() -> anyhow::Result<()> {
    let h = harness(vec![account(1)]);
    h.session.connect().await?;

    h.session.handle_accounts_changed(&[]).await;
    assert_eq!(h.session.snapshot().await.status, SessionStatus::Disconnected);
    assert!(h.store.load_connection_marker().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn restore_reconnects_silently_from_marker() -> anyhow::Result<()> {
    let h = harness(vec![account(1)]);
    h.wallet.seed_user(account(1), "alice");
    h.session.connect().await?;
    assert_eq!(h.wallet.prompt_count(), 1);

    // Same wallet, fresh session: the marker survives in the store.
    let reloaded = Session::new(
        Some(h.wallet.clone() as Arc<dyn WalletProvider>),
        h.store.clone() as Arc<dyn ClientStore>,
        config(ContractCapabilities::full()),
    );
    let snapshot = reloaded.restore().await?;
    assert_eq!(snapshot.status, SessionStatus::Connected { registered: true });
    assert_eq!(h.wallet.prompt_count(), 1);
    Ok(())
}

#[tokio::test]
async fn restore_without_marker_stays_disconnected() -> anyhow::Result<()> {
    let h = harness(vec![account(1)]);
    let snapshot = h.session.restore().await?;
    assert_eq!(snapshot.status, SessionStatus::Disconnected);
    assert!(h.wallet.method_log().is_empty());
    Ok(())
}

#[tokio::test]
async fn failed_restore_disconnects_and_clears_marker() -> anyhow::Result<()> {
    let h = harness(vec![account(1)]);
    // Marker left over from an earlier visit, but the wallet has not exposed any account.
    h.store
        .save_connection_marker(&ConnectionMarker::issue(&account(1).to_string(), epoch_ms()))
        .await?;

    let snapshot = h.session.restore().await?;
    assert_eq!(snapshot.status, SessionStatus::Disconnected);
    assert!(snapshot.last_error.is_some());
    assert!(h.store.load_connection_marker().await?.is_none());
    assert_eq!(h.wallet.prompt_count(), 0);
    Ok(())
}

#[tokio::test]
async fn expired_marker_is_discarded() -> anyhow::Result<()> {
    let h = harness(vec![account(1)]);
    h.store
        .save_connection_marker(&ConnectionMarker::issue(&account(1).to_string(), 0))
        .await?;

    let snapshot = h.session.restore().await?;
    assert_eq!(snapshot.status, SessionStatus::Disconnected);
    assert!(h.store.load_connection_marker().await?.is_none());
    assert!(h.wallet.method_log().is_empty());
    Ok(())
}

#[tokio::test]
async fn chain_change_rebuilds_session() -> anyhow::Result<()> {
    let h = harness(vec![account(1)]);
    h.session.connect().await?;

    h.wallet.switch_chain(5);
    h.session.handle_chain_changed(5).await;
    let snapshot = h.session.snapshot().await;
    assert_eq!(snapshot.chain_id, Some(5));
    assert_eq!(snapshot.status, SessionStatus::Connected { registered: false });
    assert!(h.store.load_connection_marker().await?.is_some());
    assert_eq!(h.wallet.prompt_count(), 1);
    Ok(())
}

#[tokio::test]
async fn listener_follows_wallet_events() -> anyhow::Result<()> {
    let h = harness(vec![account(1), account(2)]);
    h.session.connect().await?;
    assert!(h.session.attach_listeners());
    assert!(!h.session.attach_listeners());

    h.wallet.select_account(account(2));
    let mut switched = false;
    for _ in 0..100 {
        if h.session.account().await == Some(account(2)) && h.session.snapshot().await.chain_id.is_some() {
            switched = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(switched, "listener did not pick up the account switch");

    h.session.detach_listeners();
    h.wallet.revoke_accounts();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.session.account().await, Some(account(2)));
    Ok(())
}

#[tokio::test]
async fn feed_resolves_names_media_and_edits() -> anyhow::Result<()> {
    let h = harness(vec![account(1)]);
    h.wallet.seed_user(account(1), "alice");
    h.wallet.seed_post(account(3), "from an unregistered author");

    h.session.connect().await?;
    h.session
        .create_post(
            "look",
            Some(MediaAttachment {
                hash: "bafycid".to_string(),
                media_type: "image/png".to_string(),
            }),
        )
        .await?;
    h.session.create_post("plain", None).await?;
    h.session.edit_post("3", "plain, edited").await?;

    let feed = h.session.load_feed().await?;
    assert_eq!(feed.len(), 3);

    assert_eq!(feed[0].author_name, shorten_address(account(3)));
    assert!(!feed[0].is_owner);
    assert!(feed[0].media.is_none());

    let media = feed[1].media.as_ref().expect("media attached");
    assert_eq!(media.url, "https://gw.example/ipfs/bafycid");
    assert_eq!(media.kind, MediaKind::Image);
    assert!(feed[1].is_owner);
    assert!(!feed[1].edited);

    assert_eq!(feed[2].content, "plain, edited");
    assert!(feed[2].edited);
    Ok(())
}

#[tokio::test]
async fn plain_contract_refuses_media_and_withdrawal() -> anyhow::Result<()> {
    let h = harness_with(vec![account(1)], config(ContractCapabilities::default()));
    h.wallet.seed_user(account(1), "alice");
    h.session.connect().await?;
    h.wallet.clear_method_log();

    let media = MediaAttachment {
        hash: "bafycid".to_string(),
        media_type: "image/png".to_string(),
    };
    assert_validation(&h.session.create_post("look", Some(media)).await.unwrap_err());
    assert_validation(&h.session.withdraw_tips().await.unwrap_err());
    assert!(!h.wallet.method_log().iter().any(|m| m == "eth_sendTransaction"));

    h.session.create_post("plain works", None).await?;
    assert_eq!(h.session.load_feed().await?.len(), 1);
    Ok(())
}
