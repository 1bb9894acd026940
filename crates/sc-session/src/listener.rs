use sc_wallet::WalletEvent;
use std::sync::{Arc, PoisonError};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::Session;

impl Session {
    pub async fn handle_event(&self, event: WalletEvent) {
        debug!(?event, "wallet event");
        match event {
            WalletEvent::AccountsChanged(accounts) => self.handle_accounts_changed(&accounts).await,
            WalletEvent::ChainChanged(chain_id) => self.handle_chain_changed(chain_id).await,
        }
    }

    /// Subscribe to wallet events. Calling it again while a listener is
    /// running is a no-op; returns whether a new listener was started.
    pub fn attach_listeners(self: &Arc<Self>) -> bool {
        let Some(wallet) = self.wallet.as_ref() else {
            return false;
        };
        let mut slot = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        let mut events = wallet.subscribe();
        let session = Arc::downgrade(self);
        *slot = Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(session) = session.upgrade() else {
                            break;
                        };
                        session.handle_event(event).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "wallet events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));
        true
    }

    pub fn detach_listeners(&self) {
        let handle = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}
