use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::{KeyValueStore, StorageError};

/// One JSON file per key under a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            || key.starts_with('.')
        {
            return Err(StorageError::new(format!("invalid storage key: {key:?}")));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value).await?;
        fs::rename(&staging, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DATA_KEY, NOTIFICATIONS_KEY};
    use tempfile::TempDir;

    #[tokio::test]
    async fn overwrites_and_removes_blobs() {
        let dir = TempDir::new().expect("tempdir");
        let store = FileStore::open(dir.path().join("state")).await.expect("open");

        store.set(DATA_KEY, "{\"a\":1}".into()).await.expect("set");
        store.set(DATA_KEY, "{\"a\":2}".into()).await.expect("set");
        assert_eq!(
            store.get(DATA_KEY).await.expect("get").as_deref(),
            Some("{\"a\":2}")
        );

        store.remove(DATA_KEY).await.expect("remove");
        store.remove(DATA_KEY).await.expect("remove twice");
        assert_eq!(store.get(DATA_KEY).await.expect("get"), None);
        assert_eq!(store.get(NOTIFICATIONS_KEY).await.expect("get"), None);
    }

    #[tokio::test]
    async fn rejects_path_like_keys() {
        let dir = TempDir::new().expect("tempdir");
        let store = FileStore::open(dir.path()).await.expect("open");
        assert!(store.set("../escape", "x".into()).await.is_err());
        assert!(store.get("").await.is_err());
    }
}
