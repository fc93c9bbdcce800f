//! Reading back and purging persisted records
//!
//! Values come back exactly as encoded: transforms only run on the way out.

use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::codec::StagedMap;
use crate::config::PersistConfig;
use crate::error::{PersistError, Result};
use crate::storage::Storage;

/// Fetch the record stored for `config` without decoding its values
pub async fn read_record(
    storage: &dyn Storage,
    config: &PersistConfig,
) -> Result<Option<StagedMap>> {
    let storage_key = config.storage_key();

    let payload = storage
        .get_item(&storage_key)
        .await
        .map_err(|e| PersistError::Read {
            storage_key: storage_key.clone(),
            source: Arc::new(e),
        })?;

    let Some(payload) = payload else {
        return Ok(None);
    };

    config
        .codec()
        .decode_record(&payload)
        .map(Some)
        .map_err(|source| PersistError::Decode {
            key: storage_key,
            source,
        })
}

/// Fetch the record for `config` and decode every value into `T`
pub async fn load_stored_state<T>(
    storage: &dyn Storage,
    config: &PersistConfig,
) -> Result<Option<BTreeMap<String, T>>>
where
    T: DeserializeOwned,
{
    let Some(record) = read_record(storage, config).await? else {
        return Ok(None);
    };

    let codec = config.codec();
    let mut state = BTreeMap::new();
    for (key, encoded) in record {
        let value = codec
            .decode_value(&encoded)
            .map_err(|source| PersistError::Decode {
                key: key.clone(),
                source,
            })?;
        state.insert(key, value);
    }

    tracing::debug!(
        "Loaded {} keys from '{}'",
        state.len(),
        config.storage_key()
    );
    Ok(Some(state))
}

/// Remove the record stored for `config`
pub async fn purge_stored_state(storage: &dyn Storage, config: &PersistConfig) -> Result<()> {
    let storage_key = config.storage_key();
    storage
        .remove_item(&storage_key)
        .await
        .map_err(|e| PersistError::Remove {
            storage_key: storage_key.clone(),
            source: Arc::new(e),
        })?;

    tracing::debug!("Purged '{}'", storage_key);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    #[derive(Debug)]
    struct FailingRemove;

    #[async_trait]
    impl Storage for FailingRemove {
        async fn get_item(&self, _key: &str) -> std::result::Result<Option<String>, StorageError> {
            Ok(None)
        }

        async fn set_item(&self, _key: &str, _value: &str) -> std::result::Result<(), StorageError> {
            Ok(())
        }

        async fn remove_item(&self, _key: &str) -> std::result::Result<(), StorageError> {
            Err(StorageError::Backend("read-only volume".to_string()))
        }
    }

    #[tokio::test]
    async fn test_missing_record() {
        let storage = MemoryStorage::new();
        let config = PersistConfig::new("root");

        assert_eq!(read_record(&storage, &config).await.unwrap(), None);
        assert!(load_stored_state::<Value>(&storage, &config)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_load_and_purge() {
        let storage = MemoryStorage::new();
        let config = PersistConfig::new("root");
        storage
            .set_item("persist:root", r#"{"a":"1","b":"{\"x\":true}"}"#)
            .await
            .unwrap();

        let state = load_stored_state::<Value>(&storage, &config)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state["a"], json!(1));
        assert_eq!(state["b"], json!({"x": true}));

        purge_stored_state(&storage, &config).await.unwrap();
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_decode_error() {
        let storage = MemoryStorage::new();
        let config = PersistConfig::new("root");
        storage.set_item("persist:root", "not json").await.unwrap();

        let err = read_record(&storage, &config).await.unwrap_err();
        assert!(matches!(err, PersistError::Decode { ref key, .. } if key == "persist:root"));
    }

    #[tokio::test]
    async fn test_purge_failure_is_remove_error() {
        let storage = FailingRemove;
        let config = PersistConfig::new("root");

        let err = purge_stored_state(&storage, &config).await.unwrap_err();
        assert!(
            matches!(err, PersistError::Remove { ref storage_key, .. } if storage_key == "persist:root")
        );
        assert!(matches!(err.storage_error(), Some(StorageError::Backend(_))));
    }

    #[tokio::test]
    async fn test_raw_codec_returns_strings() {
        let storage = MemoryStorage::new();
        let config = PersistConfig::new("root").with_codec_enabled(false);
        storage
            .set_item("persist:root", r#"{"token":"abc"}"#)
            .await
            .unwrap();

        let state = load_stored_state::<String>(&storage, &config)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state["token"], "abc");
    }
}
