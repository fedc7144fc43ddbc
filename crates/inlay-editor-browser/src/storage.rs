//! `sessionStorage` backend for unsaved edits.
//!
//! Edits survive a reload of the tab but not closing it.

use gloo_storage::{SessionStorage, Storage};
use inlay_editor_core::{EphemeralStorage, StorageError};
use wasm_bindgen::{JsCast, JsValue};

/// The browser's `sessionStorage`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserSessionStorage;

impl BrowserSessionStorage {
    pub fn new() -> Self {
        Self
    }

    /// Whether `sessionStorage` can be used at all. It is missing in some
    /// sandboxed iframes and throws when blocked by privacy settings.
    pub fn is_available() -> bool {
        web_sys::window()
            .map(|w| matches!(w.session_storage(), Ok(Some(_))))
            .unwrap_or(false)
    }
}

impl EphemeralStorage for BrowserSessionStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        if !Self::is_available() {
            return Err(StorageError::Unavailable("sessionStorage".into()));
        }
        SessionStorage::raw()
            .get_item(key)
            .map_err(|e| js_error(key, e))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if !Self::is_available() {
            return Err(StorageError::Unavailable("sessionStorage".into()));
        }
        SessionStorage::raw()
            .set_item(key, value)
            .map_err(|e| js_error(key, e))
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        if !Self::is_available() {
            return Err(StorageError::Unavailable("sessionStorage".into()));
        }
        SessionStorage::delete(key);
        Ok(())
    }
}

fn js_error(key: &str, error: JsValue) -> StorageError {
    match error.dyn_ref::<web_sys::DomException>() {
        Some(e) if e.name() == "QuotaExceededError" => StorageError::QuotaExceeded {
            key: key.to_string(),
        },
        Some(e) => StorageError::Unavailable(e.message()),
        None => StorageError::Unavailable(format!("{error:?}")),
    }
}
