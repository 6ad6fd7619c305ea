use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Full data snapshot: alerts, resources, protocols, metrics, playbook.
pub const DATA_KEY: &str = "preventionOrchestratorData";
pub const SIMULATION_HISTORY_KEY: &str = "simulationHistory";
pub const NOTIFICATIONS_KEY: &str = "notifications";
/// Tab router record (current pane).
pub const TAB_STATE_KEY: &str = "orchestratorState";
/// Orchestrator record (emergency flag, last active).
pub const APP_STATE_KEY: &str = "preventionOrchestratorState";

#[derive(Debug, Clone)]
pub struct StorageError {
    pub message: String,
}

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StorageError {}

impl From<serde_json::Error> for StorageError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(format!("serialization failed: {error}"))
    }
}

impl From<std::io::Error> for StorageError {
    fn from(error: std::io::Error) -> Self {
        Self::new(error.to_string())
    }
}

/// String-keyed blob storage; every write replaces the whole value.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

pub async fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub async fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, raw).await
}

/// Best-effort write: failures are logged and dropped.
pub async fn persist_best_effort<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> bool {
    match save_json(store, key, value).await {
        Ok(()) => {
            tracing::debug!(key, "snapshot persisted");
            true
        }
        Err(err) => {
            tracing::error!(key, error = %err, "could not persist snapshot");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        name: String,
        count: u32,
    }

    #[tokio::test]
    async fn json_helpers_round_trip_through_memory_store() {
        let store = MemoryStore::new();
        let record = Record {
            name: "pane".into(),
            count: 3,
        };
        save_json(&store, TAB_STATE_KEY, &record).await.expect("save");
        let loaded: Option<Record> = load_json(&store, TAB_STATE_KEY).await.expect("load");
        assert_eq!(loaded, Some(record));
        let missing: Option<Record> = load_json(&store, "absent").await.expect("load");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn corrupt_blob_surfaces_as_error() {
        let store = MemoryStore::new();
        store.set(DATA_KEY, "{not json".into()).await.expect("set");
        let result: Result<Option<Record>, _> = load_json(&store, DATA_KEY).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn read_failures_surface_until_switched_off() {
        let store = MemoryStore::new();
        store.set(DATA_KEY, "[1]".into()).await.expect("set");
        store.fail_reads(true);
        assert!(store.get(DATA_KEY).await.is_err());
        store.fail_reads(false);
        assert_eq!(store.get(DATA_KEY).await.expect("get"), Some("[1]".to_string()));
    }

    #[tokio::test]
    async fn best_effort_reports_failure_without_panicking() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        assert!(!persist_best_effort(&store, DATA_KEY, &[1, 2, 3]).await);
        assert_eq!(store.get(DATA_KEY).await.expect("get"), None);
    }
}
