use sled::Db;

use super::{keys, validate_key, DataStorage, StoreError};

#[derive(Debug, Clone)]
pub struct SledStorage {
    db: Db,
    blobs: sled::Tree,
}

impl SledStorage {
    pub fn open(sled_path: &str) -> Result<Self, StoreError> {
        let db = sled::open(sled_path)?;
        Self::from_db(db)
    }

    pub fn from_db(db: Db) -> Result<Self, StoreError> {
        let blobs = db.open_tree(keys::BLOBS_TREE)?;
        Ok(Self { db, blobs })
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn raw_db(&self) -> &Db {
        &self.db
    }
}

impl DataStorage for SledStorage {
    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        Ok(self.blobs.contains_key(key.as_bytes())?)
    }

    fn load(&self, key: &str) -> Result<String, StoreError> {
        validate_key(key)?;
        let raw = self
            .blobs
            .get(key.as_bytes())?
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| StoreError::Validation(format!("document {key} is not UTF-8: {e}")))
    }

    fn save(&self, key: &str, data: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        self.blobs.insert(key.as_bytes(), data.as_bytes())?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        Ok(self.blobs.remove(key.as_bytes())?.is_some())
    }
}
