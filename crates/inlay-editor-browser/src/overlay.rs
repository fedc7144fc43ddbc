//! The page-wide editing session and its timers.

use std::cell::RefCell;
use std::rc::Rc;

use gloo_timers::callback::Timeout;
use inlay_common::manifest::Manifest;
use inlay_common::{ApiClient, EditorConfig};
use inlay_editor_core::{
    Category, ChangeStore, Clock, EditorSession, ElementRef, SaveOutcome, SystemClock,
    UndoManager, apply_save_result, build_save_request, failed_save,
};
use web_time::Instant;

use crate::dom::find_element;
use crate::storage::BrowserSessionStorage;

/// One editing session per page.
///
/// Cheap to clone; clones share the session. Only one text-flush timer is
/// armed at a time and every keystroke re-arms it.
#[derive(Clone)]
pub struct EditorOverlay {
    session: Rc<RefCell<EditorSession>>,
    flush_timer: Rc<RefCell<Option<Timeout>>>,
    clock: Rc<dyn Clock>,
}

impl std::fmt::Debug for EditorOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorOverlay")
            .field("session", &self.session)
            .field("flush_armed", &self.flush_timer.borrow().is_some())
            .finish()
    }
}

impl EditorOverlay {
    /// Session backed by `sessionStorage`, with unsaved edits from before a
    /// reload restored.
    pub fn new(config: &EditorConfig) -> Self {
        let clock: Rc<dyn Clock> = Rc::new(SystemClock);
        let session =
            EditorSession::restore(config, Rc::new(BrowserSessionStorage::new()), clock.clone());
        Self::with_session(session, clock)
    }

    pub fn with_session(session: EditorSession, clock: Rc<dyn Clock>) -> Self {
        Self {
            session: Rc::new(RefCell::new(session)),
            flush_timer: Rc::new(RefCell::new(None)),
            clock,
        }
    }

    pub fn session(&self) -> &Rc<RefCell<EditorSession>> {
        &self.session
    }

    /// Reattach restored entries to the elements on the current page.
    pub fn bind_elements(&self) -> usize {
        let mut session = self.session.borrow_mut();
        let registry = session.registry_mut();
        let bound = bind_store(&mut registry.text)
            + bind_store(&mut registry.image)
            + bind_store(&mut registry.color)
            + bind_store(&mut registry.background_image)
            + bind_store(&mut registry.attribute)
            + bind_store(&mut registry.seo);
        tracing::debug!(bound, "bound restored entries to page elements");
        bound
    }

    /// The user focused an editable text element.
    pub fn focus_text(&self, cms_id: &str, element: &ElementRef) {
        self.session.borrow_mut().begin_text(cms_id, element);
    }

    /// An `input` event fired on an editable text element.
    pub fn text_input(&self, cms_id: &str, element: &ElementRef) {
        self.session.borrow_mut().text_input(cms_id, element);
        self.arm_flush_timer();
    }

    pub fn undo(&self) -> bool {
        self.cancel_flush_timer();
        self.session.borrow_mut().undo()
    }

    pub fn redo(&self) -> bool {
        self.cancel_flush_timer();
        self.session.borrow_mut().redo()
    }

    pub fn can_undo(&self) -> bool {
        self.session.borrow().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.session.borrow().can_redo()
    }

    pub fn discard_all(&self) {
        self.cancel_flush_timer();
        self.session.borrow_mut().discard_all();
    }

    /// Save every dirty change in one request.
    ///
    /// The session is not borrowed while the request is in flight, so the
    /// user can keep editing. Edits made meanwhile survive the save.
    pub async fn save(
        &self,
        client: &ApiClient,
        manifest: Option<&Manifest>,
        page_url: &str,
    ) -> SaveOutcome {
        self.cancel_flush_timer();
        let (changes, request) = {
            let mut session = self.session.borrow_mut();
            session.flush_pending();
            let changes = session.registry().dirty_changes();
            if changes.is_empty() {
                return SaveOutcome::default();
            }
            let request = build_save_request(&changes, manifest, page_url);
            (changes, request)
        };

        let result = client.save_changes(&request).await;

        let mut session = self.session.borrow_mut();
        match result {
            Ok(response) => apply_save_result(session.registry_mut(), &changes, response),
            Err(error) => failed_save(&changes, &error),
        }
    }

    /// Run [`save`](Self::save) on the browser's task queue.
    pub fn spawn_save(
        &self,
        client: ApiClient,
        manifest: Option<Manifest>,
        page_url: String,
        on_done: impl FnOnce(SaveOutcome) + 'static,
    ) {
        let overlay = self.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let outcome = overlay.save(&client, manifest.as_ref(), &page_url).await;
            on_done(outcome);
        });
    }

    fn arm_flush_timer(&self) {
        let Some(deadline) = self.session.borrow().history().next_deadline() else {
            self.cancel_flush_timer();
            return;
        };
        let delay = delay_millis(deadline, self.clock.now());
        let session = Rc::downgrade(&self.session);
        let timer = Timeout::new(delay, move || {
            let Some(session) = session.upgrade() else {
                return;
            };
            let Ok(mut session) = session.try_borrow_mut() else {
                tracing::debug!("session busy, text flush deferred to next input");
                return;
            };
            if session.tick() {
                tracing::trace!("flushed debounced text edit");
            }
        });
        // Replacing drops, and so cancels, the previous timer.
        self.flush_timer.replace(Some(timer));
    }

    fn cancel_flush_timer(&self) {
        drop(self.flush_timer.take());
    }
}

fn bind_store<C: Category>(store: &mut ChangeStore<C>) -> usize {
    let unbound: Vec<_> = store
        .iter()
        .filter(|entry| entry.element.is_none())
        .map(|entry| entry.cms_id.clone())
        .collect();
    unbound
        .into_iter()
        .filter_map(|cms_id| find_element(&cms_id).map(|element| (cms_id, element)))
        .filter(|(cms_id, element)| store.bind_element(cms_id, element.clone()))
        .count()
}

fn delay_millis(deadline: Instant, now: Instant) -> u32 {
    let remaining = deadline.saturating_duration_since(now);
    u32::try_from(remaining.as_millis()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_delay_never_negative() {
        let now = Instant::now();
        assert_eq!(delay_millis(now, now + Duration::from_secs(1)), 0);
        assert_eq!(delay_millis(now + Duration::from_millis(500), now), 500);
    }
}
