//! Serialization codec for staged values and the persisted record
//!
//! Values are encoded one by one into strings; the staged map of those strings
//! is then encoded as a single JSON object (`{"key":"<encoded value>"}`).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::CodecError;

/// Staged durable image: state key → encoded value
pub type StagedMap = BTreeMap<String, String>;

/// Value encoding strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    /// Deterministic JSON encoding of arbitrary values
    #[default]
    Json,
    /// Values are already encoded strings and pass through unchanged
    Raw,
}

impl Codec {
    /// Pick a codec from the `codec_enabled` toggle
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            Self::Json
        } else {
            Self::Raw
        }
    }

    /// Encode one value
    pub fn encode_value<V>(&self, value: &V) -> Result<String, CodecError>
    where
        V: Serialize + ?Sized,
    {
        match self {
            Self::Json => Ok(serde_json::to_string(value)?),
            Self::Raw => match serde_json::to_value(value)? {
                Value::String(encoded) => Ok(encoded),
                other => Err(CodecError::NotPreEncoded {
                    found: json_kind(&other),
                }),
            },
        }
    }

    /// Decode one value previously produced by [`Codec::encode_value`]
    pub fn decode_value<T>(&self, encoded: &str) -> Result<T, CodecError>
    where
        T: DeserializeOwned,
    {
        match self {
            Self::Json => Ok(serde_json::from_str(encoded)?),
            Self::Raw => Ok(serde_json::from_value(Value::String(encoded.to_string()))?),
        }
    }

    /// Encode the whole staged map into the record payload
    pub fn encode_record(&self, staged: &StagedMap) -> Result<String, CodecError> {
        Ok(serde_json::to_string(staged)?)
    }

    /// Decode a record payload back into a staged map
    pub fn decode_record(&self, payload: &str) -> Result<StagedMap, CodecError> {
        Ok(serde_json::from_str(payload)?)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
