//! Batched save of every dirty change.

use std::collections::BTreeSet;

use inlay_common::manifest::Manifest;
use inlay_common::{ApiClient, ApiError};
use inlay_common::wire::{
    AttributeChange, BackgroundImageChange, ChangePayload, ColorChange, ImageChange, SaveErrorEntry,
    SaveMeta, SaveRequest, SaveResponse, SeoChange,
};

use crate::category::{
    AttributeCategory, BackgroundImageCategory, Category, ColorCategory, ImageCategory,
    SeoCategory, TextCategory,
};
use crate::registry::{ChangeRegistry, DirtyChange};
use crate::store::{ChangeEntry, ChangeStore};

/// `meta.source` sent with every save.
pub const SAVE_SOURCE: &str = "inlay";

/// Result of a save as the UI reports it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveOutcome {
    pub updated: usize,
    pub errors: Vec<SaveErrorEntry>,
}

impl SaveOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Save every dirty change in one request.
///
/// Entries the server accepted are cleared from their stores. Entries it
/// reported in `errors` stay dirty. A transport failure or timeout reports
/// every entry as failed and clears nothing. History is left alone either way.
pub async fn save_dirty_changes(
    client: &ApiClient,
    registry: &mut ChangeRegistry,
    manifest: Option<&Manifest>,
    page_url: &str,
) -> SaveOutcome {
    let changes = registry.dirty_changes();
    if changes.is_empty() {
        return SaveOutcome::default();
    }

    let request = build_save_request(&changes, manifest, page_url);
    match client.save_changes(&request).await {
        Ok(response) => apply_save_result(registry, &changes, response),
        Err(error) => failed_save(&changes, &error),
    }
}

/// Outcome of a save that never got a response: every entry failed.
pub fn failed_save(sent: &[DirtyChange], error: &ApiError) -> SaveOutcome {
    tracing::warn!(%error, changes = sent.len(), "save failed");
    let message = error.to_string();
    SaveOutcome {
        updated: 0,
        errors: unique_ids(sent)
            .into_iter()
            .map(|cms_id| SaveErrorEntry {
                cms_id,
                error: message.clone(),
            })
            .collect(),
    }
}

pub fn build_save_request(
    changes: &[DirtyChange],
    manifest: Option<&Manifest>,
    page_url: &str,
) -> SaveRequest {
    SaveRequest {
        changes: changes.iter().map(|c| to_payload(c, manifest)).collect(),
        meta: SaveMeta {
            source: SAVE_SOURCE.to_string(),
            url: page_url.to_string(),
        },
    }
}

/// Clear what the server saved, keep what it rejected.
pub fn apply_save_result(
    registry: &mut ChangeRegistry,
    sent: &[DirtyChange],
    response: SaveResponse,
) -> SaveOutcome {
    let errors = response.errors.unwrap_or_default();
    let failed: BTreeSet<&str> = errors.iter().map(|e| e.cms_id.as_str()).collect();

    for change in sent.iter().filter(|c| !failed.contains(c.cms_id())) {
        match change {
            DirtyChange::Text(e) => settle::<TextCategory>(&mut registry.text, e),
            DirtyChange::Image(e) => settle::<ImageCategory>(&mut registry.image, e),
            DirtyChange::Color(e) => settle::<ColorCategory>(&mut registry.color, e),
            DirtyChange::BackgroundImage(e) => {
                settle::<BackgroundImageCategory>(&mut registry.background_image, e)
            }
            DirtyChange::Attribute(e) => settle::<AttributeCategory>(&mut registry.attribute, e),
            DirtyChange::Seo(e) => settle::<SeoCategory>(&mut registry.seo, e),
        }
    }

    if !errors.is_empty() {
        tracing::warn!(failed = errors.len(), updated = response.updated, "save partially failed");
    } else {
        tracing::info!(updated = response.updated, "saved changes");
    }

    SaveOutcome {
        updated: response.updated,
        errors,
    }
}

/// Remove a saved entry. If it was edited again while the save was in
/// flight, keep it with the saved value as its new original.
fn settle<C: Category>(store: &mut ChangeStore<C>, saved: &ChangeEntry<C::Value>) {
    let edited_since = store
        .get(&saved.cms_id)
        .map(|entry| entry.current != saved.current);
    match edited_since {
        Some(false) => {
            store.remove(&saved.cms_id);
        }
        Some(true) => {
            store.update(&saved.cms_id, |entry| ChangeEntry {
                original: saved.current.clone(),
                dirty: C::is_changed(&saved.current, &entry.current),
                ..entry.clone()
            });
        }
        None => {}
    }
}

fn unique_ids(changes: &[DirtyChange]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    changes
        .iter()
        .map(DirtyChange::cms_id)
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

fn to_payload(change: &DirtyChange, manifest: Option<&Manifest>) -> ChangePayload {
    let mut payload = ChangePayload {
        cms_id: change.cms_id().to_string(),
        ..Default::default()
    };
    locate_source(&mut payload, change, manifest);

    match change {
        DirtyChange::Text(e) => {
            payload.new_value = e.current.text.clone();
            payload.original_value = e.original.text.clone();
            if e.current.html != e.current.text {
                payload.html_value = Some(e.current.html.clone());
            }
        }
        DirtyChange::Image(e) => {
            payload.new_value = e.current.src.clone();
            payload.original_value = e.original.src.clone();
            payload.image_change = Some(ImageChange {
                new_src: e.current.src.clone(),
                new_alt: e.current.alt.clone(),
                original_src: e.original.src.clone(),
                original_alt: e.original.alt.clone(),
            });
        }
        DirtyChange::Color(e) => {
            payload.new_value = e.current.class_name.clone();
            payload.original_value = e.original.class_name.clone();
            payload.color_change = Some(ColorChange {
                new_classes: e.current.classes.clone(),
                original_classes: e.original.classes.clone(),
                new_style: Some(e.current.style.clone()).filter(|s| !s.is_empty()),
            });
        }
        DirtyChange::BackgroundImage(e) => {
            payload.new_value = e.current.image_url.clone();
            payload.original_value = e.original.image_url.clone();
            let non_empty = |s: &String| Some(s.clone()).filter(|s| !s.is_empty());
            payload.bg_image_change = Some(BackgroundImageChange {
                new_url: e.current.image_url.clone(),
                original_url: e.original.image_url.clone(),
                size: non_empty(&e.current.size),
                position: non_empty(&e.current.position),
                repeat: non_empty(&e.current.repeat),
            });
        }
        DirtyChange::Attribute(e) => {
            let names: BTreeSet<&String> = e.original.keys().chain(e.current.keys()).collect();
            payload.attribute_changes = names
                .into_iter()
                .filter_map(|name| {
                    let present = |v: Option<&Option<String>>| {
                        v.and_then(|v| v.clone()).filter(|v| !v.is_empty())
                    };
                    let new_value = present(e.current.get(name));
                    let original_value = present(e.original.get(name));
                    (new_value != original_value).then(|| AttributeChange {
                        name: name.clone(),
                        new_value,
                        original_value,
                    })
                })
                .collect();
        }
        DirtyChange::Seo(e) => {
            payload.new_value = e.current.clone();
            payload.original_value = e.original.clone();
            payload.seo_change = Some(SeoChange {
                new_value: e.current.clone(),
                original_value: e.original.clone(),
            });
        }
    }
    payload
}

/// Copy the source location from the manifest so the server can find the
/// exact spot when the same text appears more than once.
fn locate_source(payload: &mut ChangePayload, change: &DirtyChange, manifest: Option<&Manifest>) {
    let Some(manifest) = manifest else {
        return;
    };
    if let Some(entry) = manifest.entry(change.cms_id()) {
        payload.source_path = entry.source_path.clone();
        payload.source_line = entry.source_line;
        payload.source_snippet = entry.source_snippet.clone();
    } else if let Some(field) = manifest.seo.as_ref().and_then(|s| s.find(change.cms_id())) {
        payload.source_path = field.source_path.clone();
        payload.source_line = field.source_line;
        payload.source_snippet = field.source_snippet.clone();
    }
}
