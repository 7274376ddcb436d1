//! JSON file backed key-value store
//!
//! Holds a single JSON object whose keys are storage keys. Every `get` reads
//! the file; every `set` rewrites it through a temporary file and a rename.
//! Used by the CLI to keep a whitelist between runs. A store for the synced
//! area enforces the browser's per-item quota, so a whitelist the CLI accepts
//! also fits in the extension.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, Mutex};

use cg_core::config::SYNC_QUOTA_BYTES_PER_ITEM;
use cg_core::store::{item_size, KeyValueStore, StorageArea, StorageChange, StoreError, CHANGE_CHANNEL_CAPACITY};

pub struct FileStore {
    path: PathBuf,
    area: StorageArea,
    quota_bytes_per_item: Option<usize>,
    write_lock: Mutex<()>,
    changes: broadcast::Sender<StorageChange>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, area: StorageArea) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            path: path.into(),
            area,
            quota_bytes_per_item: (area == StorageArea::Sync).then_some(SYNC_QUOTA_BYTES_PER_ITEM),
            write_lock: Mutex::new(()),
            changes,
        }
    }

    async fn read_map(&self) -> Result<Map<String, Value>, StoreError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::Unavailable(format!(
                "'{}' holds {} instead of an object",
                self.path.display(),
                json_kind(&other)
            ))),
        }
    }

    async fn write_map(&self, map: &Map<String, Value>) -> Result<(), StoreError> {
        let mut text = serde_json::to_string_pretty(map)?;
        text.push('\n');

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.read_map().await?.get(key).cloned())
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

        let _guard = self.write_lock.lock().await;

        let mut map = self.read_map().await?;
        let old_value = map.insert(key.to_string(), value.clone());
        self.write_map(&map).await?;

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
