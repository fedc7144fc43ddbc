//! Session-scoped storage seam used to rehydrate in-progress edits.
//!
//! Storage is advisory: the in-memory stores are the source of truth while a
//! session is live, and every failure here is logged and dropped by the caller.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// Key/value storage scoped to one browsing session.
pub trait EphemeralStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage quota exceeded writing {key}")]
    QuotaExceeded { key: String },

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("stored value for {key} is invalid: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// In-memory storage with an optional byte quota.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RefCell<HashMap<String, String>>,
    quota: Option<usize>,
    disabled: Cell<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that rejects writes once the stored values exceed `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota: Some(bytes),
            ..Self::default()
        }
    }

    /// Make every call fail, as when storage is blocked by the browser.
    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.set(disabled);
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    fn check_enabled(&self) -> Result<(), StorageError> {
        if self.disabled.get() {
            return Err(StorageError::Unavailable("storage disabled".into()));
        }
        Ok(())
    }
}

impl EphemeralStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_enabled()?;
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_enabled()?;
        let mut items = self.items.borrow_mut();
        if let Some(quota) = self.quota {
            let others: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            if others + value.len() > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                });
            }
        }
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.check_enabled()?;
        self.items.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_rejects_oversized_write() {
        let storage = MemoryStorage::with_quota(8);
        storage.set_item("a", "1234").unwrap();
        assert!(matches!(
            storage.set_item("b", "123456"),
            Err(StorageError::QuotaExceeded { .. })
        ));
        // replacing a key does not count its old value
        storage.set_item("a", "12345678").unwrap();
    }

    #[test]
    fn test_disabled_storage_errors() {
        let storage = MemoryStorage::new();
        storage.set_disabled(true);
        assert!(storage.get_item("a").is_err());
    }
}
