//! All change stores of a session, one per [`ChangeKind`].

use std::rc::Rc;

use crate::category::{
    AttributeCategory, AttributeValue, BackgroundImageCategory, BackgroundImageValue, ChangeKind,
    ColorCategory, ColorValue, ImageCategory, ImageValue, SeoCategory, TextCategory, TextValue,
};
use crate::storage::EphemeralStorage;
use crate::store::{ChangeEntry, ChangeStore};

#[derive(Debug, Default)]
pub struct ChangeRegistry {
    pub text: ChangeStore<TextCategory>,
    pub image: ChangeStore<ImageCategory>,
    pub color: ChangeStore<ColorCategory>,
    pub background_image: ChangeStore<BackgroundImageCategory>,
    pub attribute: ChangeStore<AttributeCategory>,
    pub seo: ChangeStore<SeoCategory>,
}

/// A dirty entry of any category.
#[derive(Debug, Clone)]
pub enum DirtyChange {
    Text(ChangeEntry<TextValue>),
    Image(ChangeEntry<ImageValue>),
    Color(ChangeEntry<ColorValue>),
    BackgroundImage(ChangeEntry<BackgroundImageValue>),
    Attribute(ChangeEntry<AttributeValue>),
    Seo(ChangeEntry<String>),
}

impl DirtyChange {
    pub fn kind(&self) -> ChangeKind {
        match self {
            DirtyChange::Text(_) => ChangeKind::Text,
            DirtyChange::Image(_) => ChangeKind::Image,
            DirtyChange::Color(_) => ChangeKind::Color,
            DirtyChange::BackgroundImage(_) => ChangeKind::BackgroundImage,
            DirtyChange::Attribute(_) => ChangeKind::Attribute,
            DirtyChange::Seo(_) => ChangeKind::Seo,
        }
    }

    pub fn cms_id(&self) -> &str {
        match self {
            DirtyChange::Text(e) => &e.cms_id,
            DirtyChange::Image(e) => &e.cms_id,
            DirtyChange::Color(e) => &e.cms_id,
            DirtyChange::BackgroundImage(e) => &e.cms_id,
            DirtyChange::Attribute(e) => &e.cms_id,
            DirtyChange::Seo(e) => &e.cms_id,
        }
    }
}

impl ChangeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose stores write through to `storage`.
    pub fn with_storage(storage: Rc<dyn EphemeralStorage>) -> Self {
        Self {
            text: ChangeStore::with_storage(storage.clone()),
            image: ChangeStore::with_storage(storage.clone()),
            color: ChangeStore::with_storage(storage.clone()),
            background_image: ChangeStore::with_storage(storage.clone()),
            attribute: ChangeStore::with_storage(storage.clone()),
            seo: ChangeStore::with_storage(storage),
        }
    }

    pub fn dirty_count(&self, kind: ChangeKind) -> usize {
        match kind {
            ChangeKind::Text => self.text.dirty_count(),
            ChangeKind::Image => self.image.dirty_count(),
            ChangeKind::Color => self.color.dirty_count(),
            ChangeKind::BackgroundImage => self.background_image.dirty_count(),
            ChangeKind::Attribute => self.attribute.dirty_count(),
            ChangeKind::Seo => self.seo.dirty_count(),
        }
    }

    pub fn total_dirty_count(&self) -> usize {
        ChangeKind::ALL.iter().map(|&k| self.dirty_count(k)).sum()
    }

    pub fn has_any_dirty_changes(&self) -> bool {
        ChangeKind::ALL.iter().any(|&k| self.dirty_count(k) > 0)
    }

    pub fn remove(&mut self, kind: ChangeKind, cms_id: &str) -> bool {
        match kind {
            ChangeKind::Text => self.text.remove(cms_id).is_some(),
            ChangeKind::Image => self.image.remove(cms_id).is_some(),
            ChangeKind::Color => self.color.remove(cms_id).is_some(),
            ChangeKind::BackgroundImage => self.background_image.remove(cms_id).is_some(),
            ChangeKind::Attribute => self.attribute.remove(cms_id).is_some(),
            ChangeKind::Seo => self.seo.remove(cms_id).is_some(),
        }
    }

    pub fn clear(&mut self, kind: ChangeKind) {
        match kind {
            ChangeKind::Text => self.text.clear(),
            ChangeKind::Image => self.image.clear(),
            ChangeKind::Color => self.color.clear(),
            ChangeKind::BackgroundImage => self.background_image.clear(),
            ChangeKind::Attribute => self.attribute.clear(),
            ChangeKind::Seo => self.seo.clear(),
        }
    }

    pub fn clear_all(&mut self) {
        for kind in ChangeKind::ALL {
            self.clear(kind);
        }
    }

    /// Rehydrate every store from session storage.
    pub fn rehydrate(&mut self) -> usize {
        self.text.rehydrate()
            + self.image.rehydrate()
            + self.color.rehydrate()
            + self.background_image.rehydrate()
            + self.attribute.rehydrate()
            + self.seo.rehydrate()
    }

    /// Subscribe to dirty count changes of every store.
    pub fn subscribe(&mut self, observer: impl Fn(ChangeKind, usize) + Clone + 'static) {
        self.text.subscribe(observer.clone());
        self.image.subscribe(observer.clone());
        self.color.subscribe(observer.clone());
        self.background_image.subscribe(observer.clone());
        self.attribute.subscribe(observer.clone());
        self.seo.subscribe(observer);
    }

    /// Every dirty entry, grouped by kind in [`ChangeKind::ALL`] order.
    pub fn dirty_changes(&self) -> Vec<DirtyChange> {
        let mut changes = Vec::with_capacity(self.total_dirty_count());
        for kind in ChangeKind::ALL {
            match kind {
                ChangeKind::Text => changes
                    .extend(self.text.dirty_entries().cloned().map(DirtyChange::Text)),
                ChangeKind::Image => changes
                    .extend(self.image.dirty_entries().cloned().map(DirtyChange::Image)),
                ChangeKind::Color => changes
                    .extend(self.color.dirty_entries().cloned().map(DirtyChange::Color)),
                ChangeKind::BackgroundImage => changes.extend(
                    self.background_image
                        .dirty_entries()
                        .cloned()
                        .map(DirtyChange::BackgroundImage),
                ),
                ChangeKind::Attribute => changes.extend(
                    self.attribute
                        .dirty_entries()
                        .cloned()
                        .map(DirtyChange::Attribute),
                ),
                ChangeKind::Seo => {
                    changes.extend(self.seo.dirty_entries().cloned().map(DirtyChange::Seo))
                }
            }
        }
        changes
    }
}
