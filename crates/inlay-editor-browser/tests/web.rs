//! Browser tests, run with `wasm-pack test --headless --firefox`.
#![cfg(all(target_arch = "wasm32", target_os = "unknown"))]

use inlay_editor_browser::{BrowserSessionStorage, DomElement, EditableElement, find_element};
use inlay_editor_core::EphemeralStorage;
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn mount(html: &str) -> web_sys::HtmlElement {
    let document = web_sys::window().unwrap().document().unwrap();
    let host = document
        .create_element("div")
        .unwrap()
        .dyn_into::<web_sys::HtmlElement>()
        .unwrap();
    host.set_inner_html(html);
    document.body().unwrap().append_child(&host).unwrap();
    host
}

#[wasm_bindgen_test]
fn test_find_element_by_cms_id() {
    let host = mount(r#"<h1 data-cms-id="cms-7" class="title">Hello <b>you</b></h1>"#);
    let element = find_element("cms-7").unwrap();

    assert_eq!(element.tag_name(), "h1");
    assert_eq!(element.text_content(), "Hello you");
    assert_eq!(element.class_name(), "title");
    assert!(element.is_connected());

    host.remove();
    assert!(!element.is_connected());
    assert!(find_element("cms-7").is_none());
}

#[wasm_bindgen_test]
fn test_empty_style_removes_attribute() {
    let host = mount(r#"<p data-cms-id="cms-8" style="color: red">x</p>"#);
    let element = DomElement::new(host.first_element_child().unwrap().dyn_into().unwrap());
    element.set_style_css("");
    assert_eq!(element.attribute("style"), None);
    host.remove();
}

#[wasm_bindgen_test]
fn test_session_storage_round_trip() {
    let storage = BrowserSessionStorage::new();
    storage.set_item("inlay:test", "{}").unwrap();
    assert_eq!(storage.get_item("inlay:test").unwrap().as_deref(), Some("{}"));
    storage.remove_item("inlay:test").unwrap();
    assert_eq!(storage.get_item("inlay:test").unwrap(), None);
}
