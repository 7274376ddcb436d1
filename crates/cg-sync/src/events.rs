//! Event subscriptions
//!
//! Install/startup and storage-change handling, wired explicitly to a
//! [`RuleSynchronizer`] instead of registered as process-wide listeners.

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use cg_core::config::WHITELIST_KEY;
use cg_core::engine::RuleEngineClient;
use cg_core::store::{KeyValueStore, StorageArea, StorageChange};

use crate::synchronizer::{RebuildOutcome, RuleSynchronizer};

/// Extension lifecycle events that (re)install all rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Installed,
    Startup,
}

/// Run full initialization for a lifecycle event. Failures are logged; the
/// next event retries from scratch.
pub async fn handle_lifecycle(event: LifecycleEvent, sync: &RuleSynchronizer) {
    info!("Lifecycle event {:?}: initializing rules", event);
    if let Err(e) = sync.initialize().await {
        error!("Rule initialization failed on {:?}: {}", event, e);
    }
}

/// True for changes to the whitelist key in the synced area.
pub fn is_whitelist_change(change: &StorageChange) -> bool {
    change.area == StorageArea::Sync && change.key == WHITELIST_KEY
}

/// Rebuild whitelist rules after every whitelist change until the store's
/// change channel closes.
pub fn spawn_storage_listener(store: &dyn KeyValueStore, sync: Arc<RuleSynchronizer>) -> JoinHandle<()> {
    let mut changes = store.subscribe();

    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) if is_whitelist_change(&change) => rebuild(&sync).await,
                Ok(change) => debug!("Ignoring change to {:?}/{}", change.area, change.key),
                Err(RecvError::Lagged(missed)) => {
                    warn!("Missed {} storage changes; rebuilding", missed);
                    rebuild(&sync).await;
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Storage listener stopped");
    })
}

async fn rebuild(sync: &RuleSynchronizer) {
    match sync.rebuild_whitelist_rules().await {
        Ok(RebuildOutcome::Applied { added, .. }) => debug!("Whitelist change applied ({} rules)", added),
        Ok(RebuildOutcome::Coalesced) => {}
        Err(e) => error!("Whitelist rebuild failed: {}", e),
    }
}

// =============================================================================
// Background
// =============================================================================

/// The extension's background context: one synchronizer plus its storage
/// subscription.
pub struct Background {
    sync: Arc<RuleSynchronizer>,
    listener: JoinHandle<()>,
}

impl Background {
    /// Subscribe to storage changes. Rules are installed on the first
    /// lifecycle event.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime, since the storage
    /// listener is spawned onto the current one.
    pub fn start(engine: Arc<dyn RuleEngineClient>, store: Arc<dyn KeyValueStore>) -> Self {
        let sync = Arc::new(RuleSynchronizer::new(engine, store.clone()));
        let listener = spawn_storage_listener(store.as_ref(), sync.clone());
        Self { sync, listener }
    }

    pub async fn on_lifecycle(&self, event: LifecycleEvent) {
        handle_lifecycle(event, &self.sync).await;
    }

    pub fn shutdown(self) {
        self.listener.abort();
    }
}
