use std::cell::RefCell;
use std::collections::HashMap;

use super::{validate_key, DataStorage, StoreError};

/// In-process storage, handy for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.borrow().is_empty()
    }
}

impl DataStorage for MemoryStorage {
    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        Ok(self.blobs.borrow().contains_key(key))
    }

    fn load(&self, key: &str) -> Result<String, StoreError> {
        validate_key(key)?;
        self.blobs
            .borrow()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    fn save(&self, key: &str, data: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        self.blobs
            .borrow_mut()
            .insert(key.to_string(), data.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        Ok(self.blobs.borrow_mut().remove(key).is_some())
    }
}
