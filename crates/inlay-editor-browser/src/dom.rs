//! Live page elements.

use std::rc::Rc;

use inlay_editor_core::{EditableElement, ElementRef};
use wasm_bindgen::JsCast;

/// Attribute carrying the content id on every editable element.
pub const CMS_ID_ATTR: &str = "data-cms-id";

/// An editable element on the page.
#[derive(Debug, Clone)]
pub struct DomElement(web_sys::HtmlElement);

impl DomElement {
    pub fn new(element: web_sys::HtmlElement) -> Self {
        Self(element)
    }

    pub fn into_ref(self) -> ElementRef {
        Rc::new(self)
    }

    pub fn inner(&self) -> &web_sys::HtmlElement {
        &self.0
    }
}

impl EditableElement for DomElement {
    fn tag_name(&self) -> String {
        self.0.tag_name().to_ascii_lowercase()
    }

    fn inner_html(&self) -> String {
        self.0.inner_html()
    }

    fn set_inner_html(&self, html: &str) {
        self.0.set_inner_html(html);
    }

    fn text_content(&self) -> String {
        self.0.text_content().unwrap_or_default()
    }

    fn set_text_content(&self, text: &str) {
        self.0.set_text_content(Some(text));
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0.get_attribute(name)
    }

    fn set_attribute(&self, name: &str, value: &str) {
        if let Err(e) = self.0.set_attribute(name, value) {
            tracing::warn!(name, "failed to set attribute: {:?}", e);
        }
    }

    fn remove_attribute(&self, name: &str) {
        if let Err(e) = self.0.remove_attribute(name) {
            tracing::warn!(name, "failed to remove attribute: {:?}", e);
        }
    }

    fn is_connected(&self) -> bool {
        self.0.is_connected()
    }

    fn is_in_viewport(&self) -> bool {
        let Some(window) = web_sys::window() else {
            return true;
        };
        let dimension = |value: Result<wasm_bindgen::JsValue, _>| {
            value.ok().and_then(|v| v.as_f64()).unwrap_or(0.0)
        };
        let width = dimension(window.inner_width());
        let height = dimension(window.inner_height());

        let rect = self.0.get_bounding_client_rect();
        rect.bottom() > 0.0 && rect.right() > 0.0 && rect.top() < height && rect.left() < width
    }

    fn scroll_into_view(&self) {
        let options = web_sys::ScrollIntoViewOptions::new();
        options.set_behavior(web_sys::ScrollBehavior::Smooth);
        options.set_block(web_sys::ScrollLogicalPosition::Center);
        self.0
            .scroll_into_view_with_scroll_into_view_options(&options);
    }
}

/// Look up the element carrying `cms_id` in the current document.
pub fn find_element(cms_id: &str) -> Option<ElementRef> {
    let document = web_sys::window()?.document()?;
    let selector = format!("[{CMS_ID_ATTR}=\"{}\"]", cms_id.replace('"', "\\\""));
    let element = document.query_selector(&selector).ok().flatten()?;
    let element = element.dyn_into::<web_sys::HtmlElement>().ok()?;
    Some(DomElement::new(element).into_ref())
}
