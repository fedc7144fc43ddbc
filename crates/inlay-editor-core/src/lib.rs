//! inlay-editor-core: editor state without a DOM dependency.
//!
//! This crate provides:
//! - `EditableElement` trait standing in for live page elements
//! - `ChangeStore<C>` / `ChangeRegistry` - per-category dirty tracking with session write-through
//! - `History` - undo/redo with debounced text coalescing
//! - `EditorSession` - the operations the overlay UI calls
//! - `save_dirty_changes` - one batched save of everything dirty

pub mod category;
pub mod clock;
pub mod element;
pub mod history;
pub mod persist;
pub mod registry;
pub mod session;
pub mod storage;
pub mod store;

pub use category::{
    AttributeValue, BackgroundImageValue, Category, ChangeKind, ColorValue, ImageValue, TextValue,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use element::{EditableElement, ElementRef, MemoryElement};
pub use history::{Edit, History, HistoryAction, UndoManager};
pub use persist::{
    SaveOutcome, apply_save_result, build_save_request, failed_save, save_dirty_changes,
};
pub use registry::{ChangeRegistry, DirtyChange};
pub use session::EditorSession;
pub use smol_str::SmolStr;
pub use storage::{EphemeralStorage, MemoryStorage, StorageError};
pub use store::{ChangeEntry, ChangeStore};
