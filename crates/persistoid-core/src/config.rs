//! Persistoid configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use crate::codec::Codec;
use crate::error::ConfigError;
use crate::filter::KeyFilter;
use crate::DEFAULT_KEY_PREFIX;

/// Configuration of one persistoid instance
///
/// Transforms and the failure reporter are attached through
/// [`PersistoidBuilder`](crate::persistoid::PersistoidBuilder); everything
/// here is plain data and can be loaded from TOML or JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    /// Prefix of the storage key
    pub key_prefix: String,

    /// Name of the storage key
    pub key: String,

    /// Only these keys are persisted (plus the control key)
    pub whitelist: Option<BTreeSet<String>>,

    /// These keys are never persisted
    pub blacklist: Option<BTreeSet<String>>,

    /// Minimum interval between scheduled cycles, in milliseconds
    #[serde(alias = "throttle")]
    pub throttle_ms: u64,

    /// Encode values as JSON; when false values must already be strings
    #[serde(alias = "serialize")]
    pub codec_enabled: bool,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            key: String::new(),
            whitelist: None,
            blacklist: None,
            throttle_ms: 0,
            codec_enabled: true,
        }
    }
}

impl PersistConfig {
    /// Create a configuration for the given key name
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Set the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Restrict persistence to the given keys
    pub fn with_whitelist<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.whitelist = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Exclude the given keys from persistence
    pub fn with_blacklist<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blacklist = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Set the throttle interval
    pub fn with_throttle(mut self, interval: Duration) -> Self {
        self.throttle_ms = interval.as_millis() as u64;
        self
    }

    /// Enable or disable the JSON codec
    pub fn with_codec_enabled(mut self, enabled: bool) -> Self {
        self.codec_enabled = enabled;
        self
    }

    /// Full storage key (`key_prefix + key`)
    pub fn storage_key(&self) -> String {
        format!("{}{}", self.key_prefix, self.key)
    }

    /// Throttle interval as a duration
    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    /// Codec selected by `codec_enabled`
    pub fn codec(&self) -> Codec {
        Codec::from_enabled(self.codec_enabled)
    }

    /// Key filter built from the whitelist and blacklist
    pub fn key_filter(&self) -> KeyFilter {
        KeyFilter::new(self.whitelist.clone(), self.blacklist.clone())
    }

    /// Check the configuration before building an instance
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "storage key name must not be empty".to_string(),
            ));
        }

        if self.whitelist.is_some() && self.blacklist.is_some() {
            tracing::warn!(
                "Both whitelist and blacklist set for '{}'; both will apply",
                self.storage_key()
            );
        }

        Ok(())
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Parse configuration from JSON text
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load configuration from a file (`.json` as JSON, anything else as TOML)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content)?,
            _ => Self::from_toml_str(&content)?,
        };
        config.validate()?;
        Ok(config)
    }
}
