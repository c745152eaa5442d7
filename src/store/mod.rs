pub mod keys;
pub mod memory;
pub mod sled_store;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub use memory::MemoryStorage;
pub use sled_store::SledStorage;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found: key={key}")]
    NotFound { key: String },
    #[error("validation error: {0}")]
    Validation(String),
}

/// Named-document persistence used by the orchestrator and the binary.
pub trait DataStorage {
    fn exists(&self, key: &str) -> Result<bool, StoreError>;

    fn load(&self, key: &str) -> Result<String, StoreError>;

    fn save(&self, key: &str, data: &str) -> Result<(), StoreError>;

    /// Returns `false` when nothing was stored under `key`.
    fn delete(&self, key: &str) -> Result<bool, StoreError>;
}

pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<String, StoreError> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub(crate) fn deserialize<T: DeserializeOwned>(raw: &str) -> Result<T, StoreError> {
    Ok(serde_json::from_str(raw)?)
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.trim().is_empty() {
        return Err(StoreError::Validation("storage key must not be empty".to_string()));
    }
    Ok(())
}
