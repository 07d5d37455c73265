// ── Durable key-value persistence seam ──
//
// The durable store is an external collaborator. The engine writes
// JSON strings under stable keys; anything that can hold strings
// (platform preferences, sqlite, a file) can implement the trait.
// Store failures must never crash the engine -- the state store
// degrades to in-memory operation for the process lifetime.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

/// Stable keys for each persisted state section.
pub mod keys {
    pub const DEVICES: &str = "discovery/devices";
    pub const PREFERRED: &str = "discovery/preferred";
    pub const STATS: &str = "discovery/stats";
    pub const LAST_DISCOVERY: &str = "discovery/last-discovery";
    pub const OFFLINE_QUEUE: &str = "offline/queue";
    pub const TRANSLATION_CACHE: &str = "cache/translations";
    pub const LAST_SYNC: &str = "sync/last-sync";
}

#[derive(Debug, Error)]
#[error("key-value store error: {message}")]
pub struct PersistError {
    pub message: String,
}

impl PersistError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Durable string-keyed storage collaborator.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistError>;
    async fn put(&self, key: &str, value: String) -> Result<(), PersistError>;
    async fn remove(&self, key: &str) -> Result<(), PersistError>;
}

// ── In-memory store ──────────────────────────────────────────────────

/// Volatile store for tests and for degraded operation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| PersistError::new("memory store poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<(), PersistError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| PersistError::new("memory store poisoned"))?;
        entries.insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PersistError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| PersistError::new("memory store poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

// ── JSON file store ──────────────────────────────────────────────────

/// Single-file store: the whole key space serialized as one JSON
/// object, written through on every mutation. Enough durability for a
/// client device; replace with the platform store where one exists.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl JsonFileStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| PersistError::new(format!("read {}: {e}", path.display())))?;
            serde_json::from_str(&raw)
                .map_err(|e| PersistError::new(format!("parse {}: {e}", path.display())))?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn flush(&self, entries: &HashMap<String, String>) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PersistError::new(format!("mkdir {}: {e}", parent.display())))?;
        }
        let raw = serde_json::to_string(entries)
            .map_err(|e| PersistError::new(format!("serialize store: {e}")))?;
        std::fs::write(&self.path, raw)
            .map_err(|e| PersistError::new(format!("write {}: {e}", self.path.display())))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| PersistError::new("file store poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<(), PersistError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| PersistError::new("file store poisoned"))?;
        entries.insert(key.to_owned(), value);
        self.flush(&entries)
    }

    async fn remove(&self, key: &str) -> Result<(), PersistError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| PersistError::new("file store poisoned"))?;
        entries.remove(key);
        self.flush(&entries)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.get("k").await.unwrap().is_none());

        store.put("k", "v".into()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        store.remove("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        {
            let store = JsonFileStore::open(&path).unwrap();
            store.put(keys::LAST_SYNC, "\"2026-01-01T00:00:00Z\"".into())
                .await
                .unwrap();
        }

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get(keys::LAST_SYNC).await.unwrap().as_deref(),
            Some("\"2026-01-01T00:00:00Z\"")
        );
    }
}
