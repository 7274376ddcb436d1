use std::sync::Arc;

use cg_core::config::WHITELIST_KEY;
use cg_core::engine::{MemoryRuleEngine, Verdict};
use cg_core::rules::{base_rules, compile_whitelist, CompileStats};
use cg_core::store::{read_whitelist, KeyValueStore, MemoryStore, StorageArea};
use cg_core::types::{ResourceType, Rule};
use cg_sync::RuleSynchronizer;

/// Base rules followed by the rules for the stored whitelist.
pub async fn load_rules(store: &dyn KeyValueStore) -> Result<(Vec<Rule>, CompileStats), String> {
    let whitelist = read_whitelist(store)
        .await
        .map_err(|e| format!("Failed to read whitelist: {}", e))?;

    let (whitelist_rules, stats) = compile_whitelist(&whitelist);
    let mut rules = base_rules();
    rules.extend(whitelist_rules);
    Ok((rules, stats))
}

/// Register the rules the extension would install for the stored whitelist
/// and evaluate one request against them.
pub async fn check_url(store: &dyn KeyValueStore, url: &str, resource_type: ResourceType) -> Result<Verdict, String> {
    let whitelist = store
        .get(WHITELIST_KEY)
        .await
        .map_err(|e| format!("Failed to read whitelist: {}", e))?;

    // Work on a snapshot so the check never writes to the user's store.
    let snapshot = MemoryStore::new(StorageArea::Sync).with_value(WHITELIST_KEY, whitelist.unwrap_or_default());
    let engine = Arc::new(MemoryRuleEngine::new());
    let sync = RuleSynchronizer::new(engine.clone(), Arc::new(snapshot));

    sync.initialize()
        .await
        .map_err(|e| format!("Failed to install rules: {}", e))?;

    Ok(engine.evaluate(url, resource_type))
}
