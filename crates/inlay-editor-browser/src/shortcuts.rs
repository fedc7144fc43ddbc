//! Undo/redo keyboard bindings.

use gloo_events::{EventListener, EventListenerOptions};
use wasm_bindgen::JsCast;

use crate::overlay::EditorOverlay;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Undo,
    Redo,
}

/// Map a keydown to a history shortcut.
///
/// Cmd/Ctrl+Z undoes, Cmd/Ctrl+Shift+Z and Ctrl+Y redo.
pub fn shortcut_for(key: &str, ctrl: bool, meta: bool, shift: bool) -> Option<Shortcut> {
    if !(ctrl || meta) {
        return None;
    }
    match key.to_ascii_lowercase().as_str() {
        "z" if shift => Some(Shortcut::Redo),
        "z" => Some(Shortcut::Undo),
        "y" if ctrl && !shift => Some(Shortcut::Redo),
        _ => None,
    }
}

/// Route history shortcuts on the document to the overlay's history.
///
/// The browser's own contenteditable undo is suppressed so both stacks
/// never diverge. Dropping the returned listener uninstalls it.
pub fn install_shortcuts(overlay: EditorOverlay) -> Option<EventListener> {
    let document = web_sys::window()?.document()?;
    let options = EventListenerOptions::enable_prevent_default();
    let listener = EventListener::new_with_options(&document, "keydown", options, move |event| {
        let Some(event) = event.dyn_ref::<web_sys::KeyboardEvent>() else {
            return;
        };
        let Some(shortcut) =
            shortcut_for(&event.key(), event.ctrl_key(), event.meta_key(), event.shift_key())
        else {
            return;
        };
        event.prevent_default();
        let applied = match shortcut {
            Shortcut::Undo => overlay.undo(),
            Shortcut::Redo => overlay.redo(),
        };
        tracing::debug!(?shortcut, applied, "history shortcut");
    });
    Some(listener)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortcut_mapping() {
        assert_eq!(shortcut_for("z", true, false, false), Some(Shortcut::Undo));
        assert_eq!(shortcut_for("Z", false, true, true), Some(Shortcut::Redo));
        assert_eq!(shortcut_for("y", true, false, false), Some(Shortcut::Redo));
        assert_eq!(shortcut_for("y", false, true, false), None);
        assert_eq!(shortcut_for("z", false, false, false), None);
        assert_eq!(shortcut_for("s", true, false, false), None);
    }
}
