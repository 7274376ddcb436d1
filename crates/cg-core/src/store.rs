//! Host key-value store interface
//!
//! The whitelist lives under a single key of the browser's synced storage
//! area. [`KeyValueStore`] models the part of that API we use: get, set and
//! change notifications tagged with the storage area.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::config::WHITELIST_KEY;

/// Capacity of the change notification channel.
pub const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Error type for store calls.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Quota exceeded for key '{key}': {bytes} > {limit} bytes")]
    QuotaExceeded { key: String, bytes: usize, limit: usize },
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed storage data: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Storage area a change notification originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageArea {
    Sync,
    Local,
    Managed,
    Session,
}

/// A single key changing value.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub area: StorageArea,
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// Client for a host key-value storage area.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Receive every subsequent change to this store.
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}

// =============================================================================
// Whitelist Access
// =============================================================================

/// Read the whitelist, defaulting to empty.
///
/// A value that is not an array is treated as empty; non-string elements are
/// dropped. Both cases are logged.
pub async fn read_whitelist(store: &dyn KeyValueStore) -> Result<Vec<String>, StoreError> {
    let value = store.get(WHITELIST_KEY).await?;
    Ok(whitelist_from_value(value))
}

/// Replace the stored whitelist.
pub async fn write_whitelist(store: &dyn KeyValueStore, whitelist: &[String]) -> Result<(), StoreError> {
    store.set(WHITELIST_KEY, Value::from(whitelist.to_vec())).await
}

pub fn whitelist_from_value(value: Option<Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            let total = items.len();
            let entries: Vec<String> = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect();
            if entries.len() != total {
                warn!("Dropped {} non-string whitelist entries", total - entries.len());
            }
            entries
        }
        Some(other) => {
            warn!("Ignoring malformed whitelist value: {}", other);
            Vec::new()
        }
    }
}

/// Bytes an item counts against a per-item quota: key plus JSON-encoded value.
pub fn item_size(key: &str, value: &Value) -> usize {
    key.len() + value.to_string().len()
}

// =============================================================================
// In-memory Store
// =============================================================================

/// In-process store emitting change notifications on every write.
pub struct MemoryStore {
    area: StorageArea,
    values: Mutex<HashMap<String, Value>>,
    quota_bytes_per_item: Option<usize>,
    changes: broadcast::Sender<StorageChange>,
}

impl MemoryStore {
    pub fn new(area: StorageArea) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            area,
            values: Mutex::new(HashMap::new()),
            quota_bytes_per_item: None,
            changes,
        }
    }

    /// Reject writes whose item size exceeds `bytes`.
    pub fn with_item_quota(mut self, bytes: usize) -> Self {
        self.quota_bytes_per_item = Some(bytes);
        self
    }

    /// Seed a value without emitting a change.
    pub fn with_value(self, key: &str, value: Value) -> Self {
        self.lock().insert(key.to_string(), value);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        if let Some(limit) = self.quota_bytes_per_item {
            let bytes = item_size(key, &value);
            if bytes > limit {
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                    bytes,
                    limit,
                });
            }
        }

        let old_value = self.lock().insert(key.to_string(), value.clone());

        // No receivers is fine; nobody is listening yet.
        let _ = self.changes.send(StorageChange {
            area: self.area,
            key: key.to_string(),
            old_value,
            new_value: Some(value),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}
