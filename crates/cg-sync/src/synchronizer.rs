//! Rule Synchronizer
//!
//! Reconciles the host engine's dynamic rules with the base tier and the
//! stored whitelist. Each operation re-reads storage and the engine, plans one
//! atomic update and applies it; nothing is cached between calls.
//!
//! All operations run under one async mutex, so a rebuild never interleaves
//! with another rebuild or with base-rule initialization. Rebuild requests are
//! numbered; a request already covered by a rebuild that read storage after it
//! was issued returns without touching the engine, which coalesces bursts of
//! change events into the latest snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, info};
use tokio::sync::Mutex;

use cg_core::engine::{EngineError, RuleEngineClient};
use cg_core::rules::{plan_base_update, plan_whitelist_update, CompileStats};
use cg_core::store::{read_whitelist, KeyValueStore, StoreError};

/// Error type for a synchronization attempt.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Failed to read whitelist: {0}")]
    Store(#[from] StoreError),
    #[error("Rule engine rejected update: {0}")]
    Engine(#[from] EngineError),
}

/// Result of a whitelist rebuild request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// Rules were replaced.
    Applied {
        added: usize,
        removed: usize,
        stats: CompileStats,
    },
    /// A later rebuild already reflected this request.
    Coalesced,
}

pub struct RuleSynchronizer {
    engine: Arc<dyn RuleEngineClient>,
    store: Arc<dyn KeyValueStore>,
    lock: Mutex<()>,
    /// Highest rebuild ticket handed out
    requested: AtomicU64,
    /// Highest ticket whose storage snapshot has been applied
    completed: AtomicU64,
}

impl RuleSynchronizer {
    pub fn new(engine: Arc<dyn RuleEngineClient>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            engine,
            store,
            lock: Mutex::new(()),
            requested: AtomicU64::new(0),
            completed: AtomicU64::new(0),
        }
    }

    /// Install the base tier, then the whitelist tier.
    pub async fn initialize(&self) -> Result<RebuildOutcome, SyncError> {
        self.initialize_base_rules().await?;
        self.rebuild_whitelist_rules().await
    }

    /// Replace the three base rules in one update.
    pub async fn initialize_base_rules(&self) -> Result<(), SyncError> {
        let _guard = self.lock.lock().await;

        let existing = self.registered_ids().await?;
        let update = plan_base_update(&existing);
        let removed = update.remove_rule_ids.len();

        debug!("Base update: add {} rules, remove {:?}", update.add_rules.len(), update.remove_rule_ids);
        self.engine.update_dynamic_rules(update).await?;
        info!("Installed base rules (replaced {})", removed);
        Ok(())
    }

    /// Replace every dynamic-range rule with rules for the stored whitelist.
    pub async fn rebuild_whitelist_rules(&self) -> Result<RebuildOutcome, SyncError> {
        let ticket = self.requested.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = self.lock.lock().await;

        if self.completed.load(Ordering::SeqCst) >= ticket {
            debug!("Rebuild #{} already covered by a newer snapshot", ticket);
            return Ok(RebuildOutcome::Coalesced);
        }

        // Every ticket issued so far was issued before the read below.
        let covers = self.requested.load(Ordering::SeqCst);

        let whitelist = read_whitelist(self.store.as_ref()).await?;
        let existing = self.registered_ids().await?;
        let (update, stats) = plan_whitelist_update(&existing, &whitelist);
        let added = update.add_rules.len();
        let removed = update.remove_rule_ids.len();

        debug!(
            "Whitelist update #{}: {} entries -> add {}, remove {}",
            covers, stats.entries, added, removed
        );
        self.engine.update_dynamic_rules(update).await?;
        self.completed.fetch_max(covers, Ordering::SeqCst);

        info!(
            "Whitelist rules rebuilt: {} active ({} duplicate, {} invalid skipped)",
            added, stats.duplicates, stats.invalid
        );
        Ok(RebuildOutcome::Applied { added, removed, stats })
    }

    async fn registered_ids(&self) -> Result<Vec<i32>, SyncError> {
        let rules = self.engine.dynamic_rules().await?;
        Ok(rules.into_iter().map(|r| r.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cg_core::config::{BASE_RULE_IDS, DYNAMIC_RULE_START_ID, WHITELIST_PRIORITY};
    use cg_core::engine::MemoryRuleEngine;
    use cg_core::store::{write_whitelist, MemoryStore, StorageArea};
    use cg_core::types::{ResourceType, Rule, RuleUpdate};
    use serde_json::json;
    use tokio::task::JoinSet;

    /// Yields to the scheduler around every call so concurrent callers interleave.
    struct YieldingEngine(MemoryRuleEngine);

    #[async_trait]
    impl RuleEngineClient for YieldingEngine {
        async fn dynamic_rules(&self) -> Result<Vec<Rule>, EngineError> {
            tokio::task::yield_now().await;
            self.0.dynamic_rules().await
        }

        async fn update_dynamic_rules(&self, update: RuleUpdate) -> Result<(), EngineError> {
            tokio::task::yield_now().await;
            self.0.update_dynamic_rules(update).await
        }
    }

    struct FailingEngine;

    #[async_trait]
    impl RuleEngineClient for FailingEngine {
        async fn dynamic_rules(&self) -> Result<Vec<Rule>, EngineError> {
            Ok(Vec::new())
        }

        async fn update_dynamic_rules(&self, _update: RuleUpdate) -> Result<(), EngineError> {
            Err(EngineError::Unavailable("quota".to_string()))
        }
    }

    fn setup(whitelist: &[&str]) -> (Arc<MemoryRuleEngine>, Arc<MemoryStore>, RuleSynchronizer) {
        let engine = Arc::new(MemoryRuleEngine::new());
        let store = Arc::new(MemoryStore::new(StorageArea::Sync).with_value("whitelist", json!(whitelist)));
        let sync = RuleSynchronizer::new(engine.clone(), store.clone());
        (engine, store, sync)
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_initialize_installs_both_tiers() {
        let (engine, _store, sync) = setup(&["a.com", "b.net"]);

        let outcome = sync.initialize().await.unwrap();
        assert!(matches!(outcome, RebuildOutcome::Applied { added: 2, removed: 0, .. }));

        let ids = engine.rule_ids();
        assert_eq!(ids, vec![1, 2, 3, DYNAMIC_RULE_START_ID, DYNAMIC_RULE_START_ID + 1]);
        assert!(engine
            .rules()
            .iter()
            .filter(|r| r.id >= DYNAMIC_RULE_START_ID)
            .all(|r| r.priority == WHITELIST_PRIORITY));
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let (engine, _store, sync) = setup(&["a.com"]);
        sync.initialize().await.unwrap();
        let first = engine.rules();

        sync.initialize().await.unwrap();
        assert_eq!(engine.rules(), first);
    }

    #[tokio::test]
    async fn test_rebuild_removes_stale_dynamic_rules() {
        let (engine, store, sync) = setup(&["a.com", "b.net", "c.org"]);
        sync.initialize().await.unwrap();

        write_whitelist(store.as_ref(), &strings(&["b.net"])).await.unwrap();
        let outcome = sync.rebuild_whitelist_rules().await.unwrap();
        assert!(matches!(outcome, RebuildOutcome::Applied { added: 1, removed: 3, .. }));

        let ids = engine.rule_ids();
        assert_eq!(ids, vec![1, 2, 3, DYNAMIC_RULE_START_ID]);
        // Positional ids: b.net moved from 1001 to 1000
        assert!(engine.evaluate("https://b.net", ResourceType::MainFrame).is_allowed());
        assert!(!engine.evaluate("https://a.xyz", ResourceType::MainFrame).is_allowed());
    }

    #[tokio::test]
    async fn test_rebuild_leaves_base_rules_alone() {
        let (engine, store, sync) = setup(&["a.com"]);
        sync.initialize().await.unwrap();

        write_whitelist(store.as_ref(), &[]).await.unwrap();
        sync.rebuild_whitelist_rules().await.unwrap();
        assert_eq!(engine.rule_ids(), BASE_RULE_IDS.to_vec());
    }

    #[tokio::test]
    async fn test_navigation_scenario() {
        let (engine, store, sync) = setup(&[]);
        sync.initialize().await.unwrap();

        assert!(engine.evaluate("https://example.org", ResourceType::MainFrame).is_allowed());
        assert!(!engine.evaluate("https://example.xyz", ResourceType::MainFrame).is_allowed());

        write_whitelist(store.as_ref(), &strings(&["example.xyz"])).await.unwrap();
        sync.rebuild_whitelist_rules().await.unwrap();
        assert!(engine.evaluate("https://example.xyz", ResourceType::MainFrame).is_allowed());
    }

    #[tokio::test]
    async fn test_concurrent_rebuilds_are_serialized() {
        let engine = Arc::new(YieldingEngine(MemoryRuleEngine::new()));
        let store = Arc::new(MemoryStore::new(StorageArea::Sync));
        let sync = Arc::new(RuleSynchronizer::new(engine.clone(), store.clone()));
        sync.initialize().await.unwrap();

        write_whitelist(store.as_ref(), &strings(&["a.com", "b.net"])).await.unwrap();
        let first = {
            let sync = sync.clone();
            tokio::spawn(async move { sync.rebuild_whitelist_rules().await })
        };
        tokio::task::yield_now().await;
        write_whitelist(store.as_ref(), &strings(&["c.net"])).await.unwrap();
        let second = {
            let sync = sync.clone();
            tokio::spawn(async move { sync.rebuild_whitelist_rules().await })
        };

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        // The latest snapshot wins and no stale or duplicate rule survives.
        let dynamic: Vec<i32> = engine
            .0
            .rule_ids()
            .into_iter()
            .filter(|&id| id >= DYNAMIC_RULE_START_ID)
            .collect();
        assert_eq!(dynamic, vec![DYNAMIC_RULE_START_ID]);
        assert!(engine.0.evaluate("https://c.net", ResourceType::MainFrame).is_allowed());
        assert!(!engine.0.evaluate("https://b.net", ResourceType::MainFrame).is_allowed());
    }

    #[tokio::test]
    async fn test_burst_is_coalesced() {
        let engine = Arc::new(YieldingEngine(MemoryRuleEngine::new()));
        let store = Arc::new(MemoryStore::new(StorageArea::Sync));
        let sync = Arc::new(RuleSynchronizer::new(engine.clone(), store.clone()));
        sync.initialize().await.unwrap();
        let before = engine.0.update_count();

        write_whitelist(store.as_ref(), &strings(&["a.com", "b.net", "c.org"])).await.unwrap();

        let mut tasks = JoinSet::new();
        for _ in 0..5 {
            let sync = sync.clone();
            tasks.spawn(async move { sync.rebuild_whitelist_rules().await });
        }

        let mut coalesced = 0;
        while let Some(result) = tasks.join_next().await {
            if result.unwrap().unwrap() == RebuildOutcome::Coalesced {
                coalesced += 1;
            }
        }

        assert!(coalesced >= 3);
        assert!(engine.0.update_count() - before <= 2);
        let dynamic = engine.0.rule_ids().into_iter().filter(|&id| id >= DYNAMIC_RULE_START_ID).count();
        assert_eq!(dynamic, 3);
    }

    #[tokio::test]
    async fn test_engine_failure_is_reported() {
        let store = Arc::new(MemoryStore::new(StorageArea::Sync).with_value("whitelist", json!(["a.com"])));
        let sync = RuleSynchronizer::new(Arc::new(FailingEngine), store);

        let err = sync.rebuild_whitelist_rules().await.unwrap_err();
        assert!(matches!(err, SyncError::Engine(EngineError::Unavailable(_))));

        // A failed attempt does not mark the request as completed.
        let err = sync.rebuild_whitelist_rules().await.unwrap_err();
        assert!(matches!(err, SyncError::Engine(_)));
    }

    #[tokio::test]
    async fn test_duplicate_entries_yield_one_rule() {
        let (engine, _store, sync) = setup(&["a.com", "A.com", "https://a.com/"]);
        let outcome = sync.initialize().await.unwrap();

        match outcome {
            RebuildOutcome::Applied { added, stats, .. } => {
                assert_eq!(added, 1);
                assert_eq!(stats.duplicates, 2);
            }
            RebuildOutcome::Coalesced => panic!("expected an applied rebuild"),
        }
        assert_eq!(engine.rule_ids().len(), 4);
    }
}
