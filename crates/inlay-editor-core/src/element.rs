//! Abstraction over the live page elements being edited.
//!
//! Change entries and history actions hold an [`ElementRef`] to the element
//! they belong to. The browser crate implements [`EditableElement`] over
//! `web_sys::HtmlElement`; [`MemoryElement`] is a headless implementation for
//! tests and tooling.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::rc::Rc;

/// Operations the editor needs from a rendered element.
pub trait EditableElement: Debug {
    /// Lowercase tag name (`"img"`, `"meta"`, ...).
    fn tag_name(&self) -> String;

    fn inner_html(&self) -> String;

    fn set_inner_html(&self, html: &str);

    fn text_content(&self) -> String;

    fn set_text_content(&self, text: &str);

    fn attribute(&self, name: &str) -> Option<String>;

    fn set_attribute(&self, name: &str, value: &str);

    fn remove_attribute(&self, name: &str);

    /// Whether the element is still attached to the document.
    fn is_connected(&self) -> bool;

    /// Whether any part of the element is inside the viewport.
    fn is_in_viewport(&self) -> bool;

    /// Smoothly scroll the element to the center of the viewport.
    fn scroll_into_view(&self);

    /// Convenience for the `class` attribute.
    fn class_name(&self) -> String {
        self.attribute("class").unwrap_or_default()
    }

    fn set_class_name(&self, class_name: &str) {
        self.set_attribute("class", class_name);
    }

    /// Inline `style` attribute, verbatim.
    fn style_css(&self) -> String {
        self.attribute("style").unwrap_or_default()
    }

    fn set_style_css(&self, css: &str) {
        if css.is_empty() {
            self.remove_attribute("style");
        } else {
            self.set_attribute("style", css);
        }
    }
}

/// Shared handle to an element.
pub type ElementRef = Rc<dyn EditableElement>;

/// In-memory element.
#[derive(Debug)]
pub struct MemoryElement {
    tag: String,
    html: RefCell<String>,
    text: RefCell<String>,
    attributes: RefCell<BTreeMap<String, String>>,
    connected: Cell<bool>,
    in_viewport: Cell<bool>,
    scrolls: Cell<usize>,
}

impl MemoryElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            html: RefCell::new(String::new()),
            text: RefCell::new(String::new()),
            attributes: RefCell::new(BTreeMap::new()),
            connected: Cell::new(true),
            in_viewport: Cell::new(true),
            scrolls: Cell::new(0),
        }
    }

    /// Element whose html and text are both `text`.
    pub fn with_text(tag: impl Into<String>, text: &str) -> Self {
        let element = Self::new(tag);
        element.set_inner_html(text);
        element
    }

    pub fn with_attribute(self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn into_ref(self) -> ElementRef {
        Rc::new(self)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.set(connected);
    }

    pub fn set_in_viewport(&self, in_viewport: bool) {
        self.in_viewport.set(in_viewport);
    }

    /// How many times `scroll_into_view` was called.
    pub fn scroll_count(&self) -> usize {
        self.scrolls.get()
    }
}

impl EditableElement for MemoryElement {
    fn tag_name(&self) -> String {
        self.tag.clone()
    }

    fn inner_html(&self) -> String {
        self.html.borrow().clone()
    }

    fn set_inner_html(&self, html: &str) {
        *self.html.borrow_mut() = html.to_string();
        *self.text.borrow_mut() = strip_tags(html);
    }

    fn text_content(&self) -> String {
        self.text.borrow().clone()
    }

    fn set_text_content(&self, text: &str) {
        *self.text.borrow_mut() = text.to_string();
        *self.html.borrow_mut() = text.to_string();
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.borrow().get(name).cloned()
    }

    fn set_attribute(&self, name: &str, value: &str) {
        self.attributes
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
    }

    fn remove_attribute(&self, name: &str) {
        self.attributes.borrow_mut().remove(name);
    }

    fn is_connected(&self) -> bool {
        self.connected.get()
    }

    fn is_in_viewport(&self) -> bool {
        self.in_viewport.get()
    }

    fn scroll_into_view(&self) {
        self.scrolls.set(self.scrolls.get() + 1);
        self.in_viewport.set(true);
    }
}

fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_element_tracks_text_from_html() {
        let el = MemoryElement::new("p");
        el.set_inner_html("Hello <strong>world</strong>");
        assert_eq!(el.text_content(), "Hello world");
        assert_eq!(el.inner_html(), "Hello <strong>world</strong>");
    }

    #[test]
    fn test_empty_style_removes_attribute() {
        let el = MemoryElement::new("div").with_attribute("style", "color: red");
        el.set_style_css("");
        assert_eq!(el.attribute("style"), None);
        assert_eq!(el.style_css(), "");
    }
}
