//! Browser DOM layer for the inlay editor.
//!
//! Binds the DOM-free state in `inlay-editor-core` to a live page. It
//! assumes a `wasm32-unknown-unknown` target environment.
//!
//! # Architecture
//!
//! - `dom`: `EditableElement` over `web_sys::HtmlElement`, element lookup by content id
//! - `storage`: `sessionStorage` backend for in-progress edits
//! - `overlay`: the shared session, debounced text flushing, save
//! - `shortcuts`: undo/redo keyboard bindings
//!
//! # Re-exports
//!
//! This crate re-exports `inlay-editor-core` for convenience, so consumers
//! only need to depend on `inlay-editor-browser`.

// Re-export core crate
pub use inlay_editor_core;
pub use inlay_editor_core::*;

pub mod dom;
pub mod overlay;
pub mod shortcuts;
pub mod storage;

pub use dom::{DomElement, find_element};
pub use overlay::EditorOverlay;
pub use shortcuts::{Shortcut, install_shortcuts, shortcut_for};
pub use storage::BrowserSessionStorage;
