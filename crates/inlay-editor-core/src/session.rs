//! Editing session: the change registry and history driven together.

use std::cell::Cell;
use std::rc::Rc;

use inlay_common::manifest::Manifest;
use inlay_common::{ApiClient, EditorConfig};

use crate::category::{
    AttributeCategory, AttributeValue, BackgroundImageCategory, BackgroundImageValue, Category,
    ColorCategory, ColorValue, ImageCategory, ImageValue, SeoCategory, TextCategory, TextValue,
    write_if_attached,
};
use crate::clock::Clock;
use crate::element::ElementRef;
use crate::history::{Edit, History, UndoManager};
use crate::persist::{SaveOutcome, save_dirty_changes};
use crate::registry::ChangeRegistry;
use crate::storage::EphemeralStorage;
use crate::store::{ChangeEntry, ChangeStore};

/// Everything the overlay UI calls into.
///
/// Edits update the element, the category store and the history in one
/// step. Undo and redo come from the [`UndoManager`] impl.
#[derive(Debug)]
pub struct EditorSession {
    registry: ChangeRegistry,
    history: History,
}

impl EditorSession {
    pub fn new(registry: ChangeRegistry, history: History) -> Self {
        Self { registry, history }
    }

    /// Session backed by session storage, rehydrating edits made before a reload.
    pub fn restore(
        config: &EditorConfig,
        storage: Rc<dyn EphemeralStorage>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        let mut registry = ChangeRegistry::with_storage(storage);
        let restored = registry.rehydrate();
        if restored > 0 {
            tracing::info!(restored, "restored unsaved changes");
        }
        Self::new(registry, History::from_config(config, clock))
    }

    pub fn registry(&self) -> &ChangeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ChangeRegistry {
        &mut self.registry
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// See [`History::applying_flag`].
    pub fn applying_flag(&self) -> Rc<Cell<bool>> {
        self.history.applying_flag()
    }

    pub fn total_dirty_count(&self) -> usize {
        self.registry.total_dirty_count()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.registry.has_any_dirty_changes() || self.history.has_pending_text()
    }

    /// Start tracking an element with a known original value.
    pub fn track<C: Category>(&mut self, cms_id: &str, element: &ElementRef, original: C::Value) {
        C::store_mut(&mut self.registry).track(cms_id, Some(element.clone()), original);
    }

    /// Capture an element's text before the user starts typing into it.
    pub fn begin_text(&mut self, cms_id: &str, element: &ElementRef) {
        let original = TextCategory::read(element.as_ref(), &TextValue::default());
        self.track::<TextCategory>(cms_id, element, original);
    }

    /// The element's content was changed in place by typing.
    pub fn text_input(&mut self, cms_id: &str, element: &ElementRef) {
        if self.history.is_applying_undo_redo() {
            return;
        }
        let after = TextCategory::read(element.as_ref(), &TextValue::default());
        let (before, original, was_dirty) = match self.registry.text.get(cms_id) {
            Some(entry) => (entry.current.clone(), entry.original.clone(), entry.dirty),
            None => {
                tracing::debug!(cms_id, "text input on untracked element");
                (after.clone(), after.clone(), false)
            }
        };
        if before == after {
            return;
        }
        self.registry
            .text
            .edit(cms_id, Some(element.clone()), original, after.clone());
        self.history
            .record_text_change(cms_id, Some(element.clone()), before, after, was_dirty);
    }

    /// Replace an element's html programmatically, as if typed.
    pub fn edit_text(&mut self, cms_id: &str, element: &ElementRef, html: &str) {
        self.begin_text(cms_id, element);
        element.set_inner_html(html);
        self.text_input(cms_id, element);
    }

    /// Apply a discrete edit of any category other than text.
    pub fn edit<C: Category>(&mut self, cms_id: &str, element: &ElementRef, after: C::Value) {
        if self.history.is_applying_undo_redo() {
            return;
        }
        let store = C::store_mut(&mut self.registry);
        let (before, original, was_dirty) = match store.get(cms_id) {
            Some(entry) => (entry.current.clone(), entry.original.clone(), entry.dirty),
            None => {
                let read = C::read(element.as_ref(), &after);
                (read.clone(), read, false)
            }
        };
        if before == after {
            return;
        }

        C::write(element.as_ref(), &after);
        store.edit(cms_id, Some(element.clone()), original, after.clone());
        self.history.record_change(C::into_action(Edit {
            cms_id: cms_id.into(),
            element: Some(element.clone()),
            before,
            after,
            was_dirty,
        }));
    }

    pub fn edit_image(&mut self, cms_id: &str, element: &ElementRef, src: &str, alt: &str) {
        let after = ImageValue {
            src: src.to_string(),
            alt: alt.to_string(),
            srcset: None,
        };
        self.edit::<ImageCategory>(cms_id, element, after);
    }

    pub fn edit_color(&mut self, cms_id: &str, element: &ElementRef, after: ColorValue) {
        self.edit::<ColorCategory>(cms_id, element, after);
    }

    pub fn edit_background_image(
        &mut self,
        cms_id: &str,
        element: &ElementRef,
        after: BackgroundImageValue,
    ) {
        self.edit::<BackgroundImageCategory>(cms_id, element, after);
    }

    /// Change some attributes. Names not mentioned keep their current value.
    pub fn edit_attributes(&mut self, cms_id: &str, element: &ElementRef, changes: AttributeValue) {
        let store = &mut self.registry.attribute;
        let after = match store.get(cms_id) {
            Some(entry) => {
                let newly_tracked: AttributeValue = changes
                    .keys()
                    .filter(|name| !entry.current.contains_key(*name))
                    .map(|name| (name.clone(), element.attribute(name)))
                    .collect();
                if !newly_tracked.is_empty() {
                    widen_attributes(store, cms_id, newly_tracked);
                }
                let mut after = store
                    .get(cms_id)
                    .map(|e| e.current.clone())
                    .unwrap_or_default();
                after.extend(changes);
                after
            }
            None => changes,
        };
        self.edit::<AttributeCategory>(cms_id, element, after);
    }

    pub fn edit_seo(&mut self, cms_id: &str, element: &ElementRef, value: &str) {
        self.edit::<SeoCategory>(cms_id, element, value.to_string());
    }

    /// Flush the pending text edit once its debounce window has passed.
    pub fn tick(&mut self) -> bool {
        self.history.poll()
    }

    /// Commit the pending text edit now, ahead of its deadline.
    pub fn flush_pending(&mut self) -> bool {
        self.history.flush_pending()
    }

    /// Put every element back to its original value and forget all changes
    /// and history.
    pub fn discard_all(&mut self) {
        let flag = self.history.applying_flag();
        flag.set(true);
        discard_store(&mut self.registry.text);
        for entry in self.registry.image.iter() {
            write_if_attached::<ImageCategory>(entry.element.as_ref(), &entry.original);
            if let (Some(element), Some(srcset)) = (&entry.element, &entry.original.srcset) {
                if element.is_connected() {
                    element.set_attribute("srcset", srcset);
                }
            }
        }
        self.registry.image.clear();
        discard_store(&mut self.registry.color);
        discard_store(&mut self.registry.background_image);
        discard_store(&mut self.registry.attribute);
        discard_store(&mut self.registry.seo);
        flag.set(false);

        self.history.clear();
        tracing::info!("discarded all changes");
    }

    /// Save every dirty change. History is kept.
    pub async fn save(
        &mut self,
        client: &ApiClient,
        manifest: Option<&Manifest>,
        page_url: &str,
    ) -> SaveOutcome {
        self.flush_pending();
        save_dirty_changes(client, &mut self.registry, manifest, page_url).await
    }
}

impl UndoManager for EditorSession {
    fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    fn undo(&mut self) -> bool {
        self.history.undo(&mut self.registry)
    }

    fn redo(&mut self) -> bool {
        self.history.redo(&mut self.registry)
    }

    fn clear_history(&mut self) {
        self.history.clear();
    }
}

fn discard_store<C: Category>(store: &mut ChangeStore<C>) {
    for entry in store.iter() {
        write_if_attached::<C>(entry.element.as_ref(), &entry.original);
    }
    store.clear();
}

/// Start tracking more attribute names on an existing entry, with their
/// present value as both original and current.
fn widen_attributes(
    store: &mut ChangeStore<AttributeCategory>,
    cms_id: &str,
    names: AttributeValue,
) {
    store.update(cms_id, |entry| {
        let mut original = entry.original.clone();
        let mut current = entry.current.clone();
        for (name, value) in names {
            original.entry(name.clone()).or_insert_with(|| value.clone());
            current.entry(name).or_insert(value);
        }
        ChangeEntry {
            original,
            current,
            ..entry.clone()
        }
    });
}
