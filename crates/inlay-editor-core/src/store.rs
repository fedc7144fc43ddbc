//! Per-category change store.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::category::{Category, ChangeKind};
use crate::element::ElementRef;
use crate::storage::{EphemeralStorage, StorageError};

/// Pending change to one element in one category.
#[derive(Debug, Clone)]
pub struct ChangeEntry<V> {
    pub cms_id: SmolStr,
    /// Live element, `None` after rehydration until rebound.
    pub element: Option<ElementRef>,
    pub original: V,
    pub current: V,
    pub dirty: bool,
}

impl<V: Clone> ChangeEntry<V> {
    /// Clean entry whose current value is its original.
    pub fn new(cms_id: impl Into<SmolStr>, element: Option<ElementRef>, original: V) -> Self {
        Self {
            cms_id: cms_id.into(),
            element,
            current: original.clone(),
            original,
            dirty: false,
        }
    }
}

/// What goes to session storage for one entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedEntry<V> {
    original_value: V,
    current_value: V,
}

type Observer = Box<dyn Fn(ChangeKind, usize)>;

/// Entries of one category keyed by content id.
///
/// `dirty_count` is cached and invalidated on every mutation. Each mutation
/// also writes the dirty subset through to session storage and notifies
/// observers with the new dirty count.
pub struct ChangeStore<C: Category> {
    entries: BTreeMap<SmolStr, ChangeEntry<C::Value>>,
    dirty_count: Cell<Option<usize>>,
    storage: Option<Rc<dyn EphemeralStorage>>,
    observers: Vec<Observer>,
    _category: PhantomData<C>,
}

impl<C: Category> Default for ChangeStore<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Category> fmt::Debug for ChangeStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeStore")
            .field("kind", &C::KIND)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl<C: Category> ChangeStore<C> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            dirty_count: Cell::new(None),
            storage: None,
            observers: Vec::new(),
            _category: PhantomData,
        }
    }

    pub fn with_storage(storage: Rc<dyn EphemeralStorage>) -> Self {
        Self {
            storage: Some(storage),
            ..Self::new()
        }
    }

    pub fn kind(&self) -> ChangeKind {
        C::KIND
    }

    /// Call `observer` with the dirty count after every mutation.
    pub fn subscribe(&mut self, observer: impl Fn(ChangeKind, usize) + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn get(&self, cms_id: &str) -> Option<&ChangeEntry<C::Value>> {
        self.entries.get(cms_id)
    }

    pub fn contains(&self, cms_id: &str) -> bool {
        self.entries.contains_key(cms_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChangeEntry<C::Value>> {
        self.entries.values()
    }

    /// Insert or replace the entry for `entry.cms_id`.
    pub fn set(&mut self, entry: ChangeEntry<C::Value>) {
        self.entries.insert(entry.cms_id.clone(), entry);
        self.changed();
    }

    /// Replace the entry for `cms_id` with `updater(entry)`. Returns `false`
    /// and does nothing when there is no entry. The id is kept whatever the
    /// updater returns.
    pub fn update(
        &mut self,
        cms_id: &str,
        updater: impl FnOnce(&ChangeEntry<C::Value>) -> ChangeEntry<C::Value>,
    ) -> bool {
        let Some(slot) = self.entries.get_mut(cms_id) else {
            return false;
        };
        let mut next = updater(slot);
        next.cms_id = slot.cms_id.clone();
        *slot = next;
        self.changed();
        true
    }

    pub fn remove(&mut self, cms_id: &str) -> Option<ChangeEntry<C::Value>> {
        let removed = self.entries.remove(cms_id);
        if removed.is_some() {
            self.changed();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.changed();
    }

    /// Create a clean entry unless one exists already.
    pub fn track(&mut self, cms_id: &str, element: Option<ElementRef>, original: C::Value) {
        if self.contains(cms_id) {
            if let Some(element) = element {
                self.bind_element(cms_id, element);
            }
            return;
        }
        self.set(ChangeEntry::new(cms_id, element, original));
    }

    /// Set the current value, recomputing dirtiness against the original.
    /// Creates the entry with `original` when absent.
    pub fn edit(
        &mut self,
        cms_id: &str,
        element: Option<ElementRef>,
        original: C::Value,
        current: C::Value,
    ) {
        let updated = self.update(cms_id, |entry| ChangeEntry {
            element: element.clone().or_else(|| entry.element.clone()),
            dirty: C::is_changed(&entry.original, &current),
            current: current.clone(),
            ..entry.clone()
        });
        if !updated {
            let dirty = C::is_changed(&original, &current);
            self.set(ChangeEntry {
                cms_id: cms_id.into(),
                element,
                original,
                current,
                dirty,
            });
        }
    }

    /// Set the current value and the dirty flag as given, as history replay
    /// does. An absent entry is recreated with `replaced` as its original
    /// and dirtiness recomputed, since its previous original was cleared.
    pub fn replay(
        &mut self,
        cms_id: &str,
        element: Option<ElementRef>,
        value: C::Value,
        replaced: C::Value,
        dirty: bool,
    ) {
        let updated = self.update(cms_id, |entry| ChangeEntry {
            element: element.clone().or_else(|| entry.element.clone()),
            current: value.clone(),
            dirty,
            ..entry.clone()
        });
        if !updated {
            let dirty = C::is_changed(&replaced, &value);
            self.set(ChangeEntry {
                cms_id: cms_id.into(),
                element,
                original: replaced,
                current: value,
                dirty,
            });
        }
    }

    /// Attach a live element to an entry, typically after rehydration.
    pub fn bind_element(&mut self, cms_id: &str, element: ElementRef) -> bool {
        match self.entries.get_mut(cms_id) {
            Some(entry) => {
                entry.element = Some(element);
                true
            }
            None => false,
        }
    }

    pub fn dirty_count(&self) -> usize {
        if let Some(count) = self.dirty_count.get() {
            return count;
        }
        let count = self.entries.values().filter(|e| e.dirty).count();
        self.dirty_count.set(Some(count));
        count
    }

    pub fn has_dirty(&self) -> bool {
        self.dirty_count() > 0
    }

    pub fn dirty_entries(&self) -> impl Iterator<Item = &ChangeEntry<C::Value>> {
        self.entries.values().filter(|e| e.dirty)
    }

    /// Load dirty entries written by an earlier page in this session.
    /// Existing entries win. Returns how many were restored.
    pub fn rehydrate(&mut self) -> usize {
        let Some(storage) = self.storage.clone() else {
            return 0;
        };
        let key = C::KIND.storage_key();
        let stored = match read_persisted::<C::Value>(storage.as_ref(), &key) {
            Ok(stored) => stored,
            Err(error) => {
                tracing::warn!(%error, kind = %C::KIND, "could not rehydrate pending changes");
                return 0;
            }
        };

        let mut restored = 0;
        for (cms_id, persisted) in stored {
            if self.entries.contains_key(cms_id.as_str()) {
                continue;
            }
            let dirty = C::is_changed(&persisted.original_value, &persisted.current_value);
            let cms_id = SmolStr::from(cms_id);
            self.entries.insert(
                cms_id.clone(),
                ChangeEntry {
                    cms_id,
                    element: None,
                    original: persisted.original_value,
                    current: persisted.current_value,
                    dirty,
                },
            );
            restored += 1;
        }
        if restored > 0 {
            tracing::debug!(restored, kind = %C::KIND, "rehydrated pending changes");
            self.changed();
        }
        restored
    }

    fn changed(&mut self) {
        self.dirty_count.set(None);
        self.write_through();
        let count = self.dirty_count();
        for observer in &self.observers {
            observer(C::KIND, count);
        }
    }

    fn write_through(&self) {
        let Some(storage) = &self.storage else {
            return;
        };
        if let Err(error) = self.persist(storage.as_ref()) {
            tracing::warn!(%error, kind = %C::KIND, "failed to persist pending changes");
        }
    }

    fn persist(&self, storage: &dyn EphemeralStorage) -> Result<(), StorageError> {
        let key = C::KIND.storage_key();
        let dirty: BTreeMap<&str, PersistedEntry<&C::Value>> = self
            .dirty_entries()
            .map(|e| {
                (
                    e.cms_id.as_str(),
                    PersistedEntry {
                        original_value: &e.original,
                        current_value: &e.current,
                    },
                )
            })
            .collect();
        if dirty.is_empty() {
            return storage.remove_item(&key);
        }
        let json = serde_json::to_string(&dirty)
            .map_err(|source| StorageError::Corrupt {
                key: key.clone(),
                source,
            })?;
        storage.set_item(&key, &json)
    }
}

fn read_persisted<V: serde::de::DeserializeOwned>(
    storage: &dyn EphemeralStorage,
    key: &str,
) -> Result<BTreeMap<String, PersistedEntry<V>>, StorageError> {
    let Some(raw) = storage.get_item(key)? else {
        return Ok(BTreeMap::new());
    };
    serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
        key: key.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::category::{AttributeCategory, ImageCategory, ImageValue, SeoCategory};
    use crate::storage::MemoryStorage;

    fn image(src: &str) -> ImageValue {
        ImageValue {
            src: src.into(),
            alt: "alt".into(),
            srcset: None,
        }
    }

    #[test]
    fn test_dirty_count_follows_edits() {
        let mut store = ChangeStore::<ImageCategory>::new();
        store.edit("img-1", None, image("/a.png"), image("/b.png"));
        store.edit("img-2", None, image("/c.png"), image("/c.png"));
        assert_eq!(store.dirty_count(), 1);
        assert!(store.has_dirty());

        // back to the original clears dirtiness exactly
        store.edit("img-1", None, image("/ignored.png"), image("/a.png"));
        assert_eq!(store.dirty_count(), 0);
        assert_eq!(store.get("img-1").unwrap().original.src, "/a.png");
    }

    #[test]
    fn test_update_keeps_id_and_skips_missing() {
        let mut store = ChangeStore::<SeoCategory>::new();
        assert!(!store.update("missing", |e| e.clone()));

        store.set(ChangeEntry::new("seo-title", None, "Home".to_string()));
        store.update("seo-title", |e| ChangeEntry {
            cms_id: "hijacked".into(),
            current: "Start".into(),
            dirty: true,
            ..e.clone()
        });
        assert!(store.get("hijacked").is_none());
        assert_eq!(store.get("seo-title").unwrap().current, "Start");
    }

    #[test]
    fn test_write_through_stores_only_dirty() {
        let storage = Rc::new(MemoryStorage::new());
        let mut store = ChangeStore::<SeoCategory>::with_storage(storage.clone());
        store.edit("a", None, "x".into(), "y".into());
        store.edit("b", None, "z".into(), "z".into());

        let raw = storage.get_item("inlay:pending:seo").unwrap().unwrap();
        insta::assert_snapshot!(raw, @r#"{"a":{"originalValue":"x","currentValue":"y"}}"#);

        store.clear();
        assert_eq!(storage.get_item("inlay:pending:seo").unwrap(), None);
    }

    #[test]
    fn test_storage_failure_keeps_edit() {
        let storage = Rc::new(MemoryStorage::with_quota(4));
        let mut store = ChangeStore::<SeoCategory>::with_storage(storage.clone());
        store.edit("a", None, "x".into(), "a long value".into());
        assert_eq!(store.dirty_count(), 1);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_rehydrate_round_trip() {
        let storage: Rc<dyn EphemeralStorage> = Rc::new(MemoryStorage::new());
        let mut first = ChangeStore::<AttributeCategory>::with_storage(storage.clone());
        first.edit(
            "link",
            None,
            [("target".to_string(), None)].into(),
            [("target".to_string(), Some("_blank".into()))].into(),
        );

        let mut second = ChangeStore::<AttributeCategory>::with_storage(storage);
        assert_eq!(second.rehydrate(), 1);
        let entry = second.get("link").unwrap();
        assert!(entry.dirty);
        assert!(entry.element.is_none());
        assert_eq!(entry.current["target"].as_deref(), Some("_blank"));
    }

    #[test]
    fn test_observers_see_dirty_count() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut store = ChangeStore::<SeoCategory>::new();
        let sink = seen.clone();
        store.subscribe(move |kind, count| sink.borrow_mut().push((kind, count)));

        store.edit("a", None, "x".into(), "y".into());
        store.remove("a");
        assert_eq!(
            *seen.borrow(),
            vec![(ChangeKind::Seo, 1), (ChangeKind::Seo, 0)]
        );
    }
}
