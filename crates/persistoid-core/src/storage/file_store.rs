//! Directory-backed storage, one file per key

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::Storage;
use crate::error::StorageError;

const FILE_EXTENSION: &str = "json";

/// Stores each key as a file under a root directory
///
/// Keys are escaped into portable file names (`persist:root` becomes
/// `persist%3Aroot.json`). Writes go to a temporary sibling first and are
/// renamed into place, so readers never observe a partial record.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Use `root` as the storage directory, creating it if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Storage directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File holding the value of `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{}", escape_key(key), FILE_EXTENSION))
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp = path.with_extension(format!("{}.tmp", FILE_EXTENSION));
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' => escaped.push(byte as char),
            other => escaped.push_str(&format!("%{:02X}", other)),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_key() {
        assert_eq!(escape_key("persist:root"), "persist%3Aroot");
        assert_eq!(escape_key("a/b.c"), "a%2Fb%2Ec");
        assert_eq!(escape_key("plain_key-1"), "plain_key-1");
    }

    #[tokio::test]
    async fn test_file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStorage::open(dir.path().join("state")).unwrap();

        assert_eq!(store.get_item("persist:root").await.unwrap(), None);
        store.set_item("persist:root", r#"{"a":"1"}"#).await.unwrap();
        assert!(store.path_for("persist:root").exists());
        assert_eq!(
            store.get_item("persist:root").await.unwrap().as_deref(),
            Some(r#"{"a":"1"}"#)
        );

        store.remove_item("persist:root").await.unwrap();
        store.remove_item("persist:root").await.unwrap();
        assert_eq!(store.get_item("persist:root").await.unwrap(), None);
    }
}
