//! Undo/redo history across all change categories.
//!
//! Provides:
//! - `UndoManager` trait for abstracting undo implementations
//! - `History`, the linear undo/redo stacks with debounced text coalescing

use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use inlay_common::EditorConfig;
use smol_str::SmolStr;
use web_time::Instant;

use crate::category::{
    AttributeCategory, AttributeValue, BackgroundImageCategory, BackgroundImageValue, Category,
    ChangeKind, ColorCategory, ColorValue, ImageCategory, ImageValue, SeoCategory, TextCategory,
    TextValue, write_if_attached,
};
use crate::clock::Clock;
use crate::element::ElementRef;
use crate::registry::ChangeRegistry;

/// Trait for managing undo/redo operations.
///
/// Implementations must actually perform the undo/redo, not just track state.
pub trait UndoManager {
    /// Check if undo is available.
    fn can_undo(&self) -> bool;

    /// Check if redo is available.
    fn can_redo(&self) -> bool;

    /// Perform undo. Returns true if successful.
    fn undo(&mut self) -> bool;

    /// Perform redo. Returns true if successful.
    fn redo(&mut self) -> bool;

    /// Clear all undo/redo history.
    fn clear_history(&mut self);
}

/// One recorded edit of a single category value.
#[derive(Debug, Clone)]
pub struct Edit<V> {
    pub cms_id: SmolStr,
    pub element: Option<ElementRef>,
    pub before: V,
    pub after: V,
    /// Dirty flag of the entry before this edit, restored on undo.
    pub was_dirty: bool,
}

#[derive(Debug, Clone)]
pub enum HistoryAction {
    Text(Edit<TextValue>),
    Image(Edit<ImageValue>),
    Color(Edit<ColorValue>),
    BackgroundImage(Edit<BackgroundImageValue>),
    Attribute(Edit<AttributeValue>),
    Seo(Edit<String>),
}

impl HistoryAction {
    pub fn kind(&self) -> ChangeKind {
        match self {
            HistoryAction::Text(_) => ChangeKind::Text,
            HistoryAction::Image(_) => ChangeKind::Image,
            HistoryAction::Color(_) => ChangeKind::Color,
            HistoryAction::BackgroundImage(_) => ChangeKind::BackgroundImage,
            HistoryAction::Attribute(_) => ChangeKind::Attribute,
            HistoryAction::Seo(_) => ChangeKind::Seo,
        }
    }

    pub fn cms_id(&self) -> &str {
        match self {
            HistoryAction::Text(e) => &e.cms_id,
            HistoryAction::Image(e) => &e.cms_id,
            HistoryAction::Color(e) => &e.cms_id,
            HistoryAction::BackgroundImage(e) => &e.cms_id,
            HistoryAction::Attribute(e) => &e.cms_id,
            HistoryAction::Seo(e) => &e.cms_id,
        }
    }

    pub fn element(&self) -> Option<&ElementRef> {
        match self {
            HistoryAction::Text(e) => e.element.as_ref(),
            HistoryAction::Image(e) => e.element.as_ref(),
            HistoryAction::Color(e) => e.element.as_ref(),
            HistoryAction::BackgroundImage(e) => e.element.as_ref(),
            HistoryAction::Attribute(e) => e.element.as_ref(),
            HistoryAction::Seo(e) => e.element.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Undo,
    Redo,
}

#[derive(Debug)]
struct PendingText {
    edit: Edit<TextValue>,
    deadline: Instant,
}

/// Holds the replay flag for as long as it lives.
struct Applying(Rc<Cell<bool>>);

impl Applying {
    fn start(flag: &Rc<Cell<bool>>) -> Self {
        flag.set(true);
        Self(flag.clone())
    }
}

impl Drop for Applying {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Linear undo/redo history.
///
/// Discrete edits are pushed as they happen. Text edits go through a single
/// pending slot: keystrokes to the same element within the debounce window
/// coalesce into one action, which is pushed when the window passes without
/// input, when another element is typed into, or before any other history
/// operation. The host calls [`History::poll`] once [`History::next_deadline`]
/// has passed.
pub struct History {
    undo_stack: VecDeque<HistoryAction>,
    redo_stack: VecDeque<HistoryAction>,
    pending: Option<PendingText>,
    limit: usize,
    debounce: Duration,
    applying: Rc<Cell<bool>>,
    clock: Rc<dyn Clock>,
}

impl fmt::Debug for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("History")
            .field("undo", &self.undo_stack.len())
            .field("redo", &self.redo_stack.len())
            .field("pending", &self.pending)
            .field("limit", &self.limit)
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl History {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self::with_limits(
            EditorConfig::DEFAULT_HISTORY_LIMIT,
            EditorConfig::DEFAULT_TEXT_DEBOUNCE,
            clock,
        )
    }

    pub fn from_config(config: &EditorConfig, clock: Rc<dyn Clock>) -> Self {
        Self::with_limits(config.history_limit, config.text_debounce, clock)
    }

    pub fn with_limits(limit: usize, debounce: Duration, clock: Rc<dyn Clock>) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            pending: None,
            limit: limit.max(1),
            debounce,
            applying: Rc::new(Cell::new(false)),
            clock,
        }
    }

    /// Shared flag that is set while an undo or redo is being applied.
    ///
    /// Host input handlers check it to avoid recording the element mutations
    /// that replay itself causes.
    pub fn applying_flag(&self) -> Rc<Cell<bool>> {
        self.applying.clone()
    }

    pub fn is_applying_undo_redo(&self) -> bool {
        self.applying.get()
    }

    /// Record a discrete edit.
    pub fn record_change(&mut self, action: HistoryAction) {
        if self.is_applying_undo_redo() {
            return;
        }
        self.flush_pending();
        tracing::debug!(cms_id = action.cms_id(), kind = %action.kind(), "recorded change");
        push_bounded(&mut self.undo_stack, action, self.limit);
        self.redo_stack.clear();
    }

    /// Record one keystroke worth of text change.
    ///
    /// `before` and `was_dirty` only matter for the first keystroke of a
    /// burst; later keystrokes to the same element replace `after` and push
    /// the deadline out.
    pub fn record_text_change(
        &mut self,
        cms_id: &str,
        element: Option<ElementRef>,
        before: TextValue,
        after: TextValue,
        was_dirty: bool,
    ) {
        if self.is_applying_undo_redo() {
            return;
        }
        self.poll();
        let now = self.clock.now();
        self.redo_stack.clear();

        if let Some(pending) = self
            .pending
            .as_mut()
            .filter(|p| p.edit.cms_id.as_str() == cms_id)
        {
            pending.edit.after = after;
            if element.is_some() {
                pending.edit.element = element;
            }
            pending.deadline = now + self.debounce;
            return;
        }

        self.flush_pending();
        self.pending = Some(PendingText {
            edit: Edit {
                cms_id: cms_id.into(),
                element,
                before,
                after,
                was_dirty,
            },
            deadline: now + self.debounce,
        });
    }

    /// Flush the pending text edit if its debounce window has passed.
    pub fn poll(&mut self) -> bool {
        match &self.pending {
            Some(pending) if pending.deadline <= self.clock.now() => self.flush_pending(),
            _ => false,
        }
    }

    /// Push the pending text edit now, whatever its deadline.
    pub fn flush_pending(&mut self) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        tracing::debug!(cms_id = %pending.edit.cms_id, "flushed text edit");
        push_bounded(&mut self.undo_stack, HistoryAction::Text(pending.edit), self.limit);
        true
    }

    /// When the pending text edit is due, if there is one.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    pub fn has_pending_text(&self) -> bool {
        self.pending.is_some()
    }

    pub fn can_undo(&self) -> bool {
        self.pending.is_some() || !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Most recent undoable action.
    pub fn last_undo(&self) -> Option<&HistoryAction> {
        self.undo_stack.back()
    }

    pub fn undo(&mut self, registry: &mut ChangeRegistry) -> bool {
        self.flush_pending();
        let Some(action) = self.undo_stack.pop_back() else {
            return false;
        };
        self.replay(&action, Direction::Undo, registry);
        push_bounded(&mut self.redo_stack, action, self.limit);
        true
    }

    pub fn redo(&mut self, registry: &mut ChangeRegistry) -> bool {
        let Some(action) = self.redo_stack.pop_back() else {
            return false;
        };
        self.replay(&action, Direction::Redo, registry);
        push_bounded(&mut self.undo_stack, action, self.limit);
        true
    }

    /// Drop both stacks and any pending text edit.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.pending = None;
    }

    fn replay(&self, action: &HistoryAction, direction: Direction, registry: &mut ChangeRegistry) {
        let _applying = Applying::start(&self.applying);
        tracing::debug!(
            cms_id = action.cms_id(),
            kind = %action.kind(),
            ?direction,
            "replaying history action"
        );

        match action {
            HistoryAction::Text(edit) => replay_edit::<TextCategory>(registry, edit, direction),
            HistoryAction::Image(edit) => {
                replay_edit::<ImageCategory>(registry, edit, direction);
                // back at the original image, so its srcset is valid again
                if direction == Direction::Undo && !edit.was_dirty {
                    restore_srcset(edit);
                }
            }
            HistoryAction::Color(edit) => replay_edit::<ColorCategory>(registry, edit, direction),
            HistoryAction::BackgroundImage(edit) => {
                replay_edit::<BackgroundImageCategory>(registry, edit, direction)
            }
            HistoryAction::Attribute(edit) => {
                replay_edit::<AttributeCategory>(registry, edit, direction)
            }
            HistoryAction::Seo(edit) => replay_edit::<SeoCategory>(registry, edit, direction),
        }

        if let Some(element) = action.element() {
            if element.is_connected() && !element.is_in_viewport() {
                element.scroll_into_view();
            }
        }
    }
}

fn replay_edit<C: Category>(
    registry: &mut ChangeRegistry,
    edit: &Edit<C::Value>,
    direction: Direction,
) {
    let (value, replaced, dirty) = match direction {
        Direction::Undo => (&edit.before, &edit.after, edit.was_dirty),
        Direction::Redo => (&edit.after, &edit.before, true),
    };
    let store = C::store_mut(registry);
    let value = C::restore(store.get(&edit.cms_id).map(|e| &e.current), value);
    write_if_attached::<C>(edit.element.as_ref(), &value);
    store.replay(
        &edit.cms_id,
        edit.element.clone(),
        value,
        replaced.clone(),
        dirty,
    );
}

fn restore_srcset(edit: &Edit<ImageValue>) {
    let Some(element) = edit.element.as_ref().filter(|e| e.is_connected()) else {
        return;
    };
    if let Some(srcset) = &edit.before.srcset {
        element.set_attribute("srcset", srcset);
    }
}

fn push_bounded(stack: &mut VecDeque<HistoryAction>, action: HistoryAction, limit: usize) {
    if stack.len() >= limit {
        stack.pop_front();
    }
    stack.push_back(action);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::element::{EditableElement, MemoryElement};

    fn history() -> (History, Rc<ManualClock>) {
        let clock = Rc::new(ManualClock::new());
        (History::new(clock.clone()), clock)
    }

    fn seo_action(id: &str, before: &str, after: &str) -> HistoryAction {
        HistoryAction::Seo(Edit {
            cms_id: id.into(),
            element: None,
            before: before.into(),
            after: after.into(),
            was_dirty: false,
        })
    }

    fn text(s: &str) -> TextValue {
        TextValue::new(s, s)
    }

    #[test]
    fn test_keystrokes_coalesce_into_one_action() {
        let (mut history, clock) = history();
        for (before, after) in [("Hell", "Hello"), ("Hello", "Hello!"), ("Hello!", "Hello!!")] {
            history.record_text_change("cms-1", None, text(before), text(after), false);
            clock.advance(Duration::from_millis(200));
        }
        assert_eq!(history.undo_len(), 0);
        assert!(history.can_undo());

        clock.advance(Duration::from_millis(500));
        assert!(history.poll());
        assert_eq!(history.undo_len(), 1);
        let Some(HistoryAction::Text(edit)) = history.last_undo() else {
            panic!("expected a text action");
        };
        assert_eq!(edit.before, text("Hell"));
        assert_eq!(edit.after, text("Hello!!"));
    }

    #[test]
    fn test_typing_elsewhere_flushes_pending() {
        let (mut history, _clock) = history();
        history.record_text_change("cms-1", None, text("a"), text("ab"), false);
        history.record_text_change("cms-2", None, text("x"), text("xy"), false);
        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.last_undo().unwrap().cms_id(), "cms-1");
        assert!(history.has_pending_text());
    }

    #[test]
    fn test_keystroke_after_window_starts_new_action() {
        let (mut history, clock) = history();
        history.record_text_change("cms-1", None, text("a"), text("ab"), false);
        clock.advance(Duration::from_millis(600));
        history.record_text_change("cms-1", None, text("ab"), text("abc"), true);
        assert_eq!(history.undo_len(), 1);
        history.flush_pending();
        assert_eq!(history.undo_len(), 2);
    }

    #[test]
    fn test_discrete_change_flushes_text_and_clears_redo() {
        let (mut history, _clock) = history();
        let mut registry = ChangeRegistry::new();
        history.record_change(seo_action("seo-title", "A", "B"));
        history.undo(&mut registry);
        assert!(history.can_redo());

        history.record_text_change("cms-1", None, text("a"), text("ab"), false);
        assert!(!history.can_redo());

        history.record_change(seo_action("seo-title", "A", "C"));
        assert_eq!(history.undo_len(), 2);
        assert!(matches!(history.undo_stack[0], HistoryAction::Text(_)));
    }

    #[test]
    fn test_recording_is_ignored_while_applying() {
        let (mut history, _clock) = history();
        let flag = history.applying_flag();
        flag.set(true);
        history.record_change(seo_action("seo-title", "A", "B"));
        history.record_text_change("cms-1", None, text("a"), text("b"), false);
        assert!(!history.can_undo());
        flag.set(false);
    }

    #[test]
    fn test_stacks_are_bounded() {
        let (mut history, _clock) = history();
        for i in 0..105 {
            history.record_change(seo_action(&format!("seo-{i}"), "A", "B"));
        }
        assert_eq!(history.undo_len(), 100);
        assert_eq!(history.undo_stack.front().unwrap().cms_id(), "seo-5");
    }

    #[test]
    fn test_undo_flushes_pending_text() {
        let (mut history, _clock) = history();
        let mut registry = ChangeRegistry::new();
        let el = MemoryElement::with_text("p", "ab").into_ref();
        registry
            .text
            .edit("cms-1", Some(el.clone()), text("a"), text("ab"));
        history.record_text_change("cms-1", Some(el.clone()), text("a"), text("ab"), false);

        assert!(history.undo(&mut registry));
        assert_eq!(el.inner_html(), "a");
        assert!(!registry.text.get("cms-1").unwrap().dirty);
        assert!(!history.is_applying_undo_redo());
    }

    #[test]
    fn test_undo_restores_srcset_only_when_clean() {
        let (mut history, _clock) = history();
        let mut registry = ChangeRegistry::new();
        let mem = Rc::new(
            MemoryElement::new("img")
                .with_attribute("src", "/b.png")
                .with_attribute("alt", "B"),
        );
        let el: ElementRef = mem.clone();
        let original = ImageValue {
            src: "/a.png".into(),
            alt: "A".into(),
            srcset: Some("/a-2x.png 2x".into()),
        };
        let edited = ImageValue {
            src: "/b.png".into(),
            alt: "B".into(),
            srcset: None,
        };
        registry
            .image
            .edit("img-1", Some(el.clone()), original.clone(), edited.clone());
        history.record_change(HistoryAction::Image(Edit {
            cms_id: "img-1".into(),
            element: Some(el.clone()),
            before: original,
            after: edited,
            was_dirty: false,
        }));

        history.undo(&mut registry);
        assert_eq!(mem.attribute("src").as_deref(), Some("/a.png"));
        assert_eq!(mem.attribute("srcset").as_deref(), Some("/a-2x.png 2x"));

        history.redo(&mut registry);
        assert_eq!(mem.attribute("src").as_deref(), Some("/b.png"));
        assert_eq!(mem.attribute("srcset"), None);
        assert!(registry.image.get("img-1").unwrap().dirty);
    }

    #[test]
    fn test_replay_scrolls_only_when_out_of_view() {
        let (mut history, _clock) = history();
        let mut registry = ChangeRegistry::new();
        let mem = Rc::new(MemoryElement::new("meta"));
        let el: ElementRef = mem.clone();
        history.record_change(HistoryAction::Seo(Edit {
            cms_id: "seo-description".into(),
            element: Some(el),
            before: "old".into(),
            after: "new".into(),
            was_dirty: false,
        }));

        history.undo(&mut registry);
        assert_eq!(mem.scroll_count(), 0);

        mem.set_in_viewport(false);
        history.redo(&mut registry);
        assert_eq!(mem.scroll_count(), 1);

        // detached elements are neither written nor scrolled
        mem.set_connected(false);
        mem.set_in_viewport(false);
        history.undo(&mut registry);
        assert_eq!(mem.scroll_count(), 1);
        assert_eq!(mem.attribute("content").as_deref(), Some("new"));
        assert_eq!(registry.seo.get("seo-description").unwrap().current, "old");
    }
}
