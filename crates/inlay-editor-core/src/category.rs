//! The six change categories and their value shapes.
//!
//! Each category is a zero-sized marker implementing [`Category`]. The trait
//! ties a value shape to its store in the [`ChangeRegistry`], to its
//! [`HistoryAction`] variant, and to how the value is read from and written to
//! an element. The registry is exhaustive over [`ChangeKind`], so a new
//! category does not compile until every consumer handles it.

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::element::{EditableElement, ElementRef};
use crate::history::{Edit, HistoryAction};
use crate::registry::ChangeRegistry;
use crate::store::ChangeStore;

/// Closed set of change categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    Text,
    Image,
    Color,
    BackgroundImage,
    Attribute,
    Seo,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 6] = [
        ChangeKind::Text,
        ChangeKind::Image,
        ChangeKind::Color,
        ChangeKind::BackgroundImage,
        ChangeKind::Attribute,
        ChangeKind::Seo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Text => "text",
            ChangeKind::Image => "image",
            ChangeKind::Color => "color",
            ChangeKind::BackgroundImage => "bgImage",
            ChangeKind::Attribute => "attribute",
            ChangeKind::Seo => "seo",
        }
    }

    /// Session storage key holding the dirty entries of this kind.
    pub fn storage_key(self) -> String {
        format!("inlay:pending:{}", self.as_str())
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text content of an element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextValue {
    pub html: String,
    pub text: String,
}

impl TextValue {
    pub fn new(html: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageValue {
    pub src: String,
    pub alt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srcset: Option<String>,
}

/// Color classes of an element.
///
/// `classes` maps a slot (`"bg"`, `"text"`, `"border"`, ...) to the utility
/// class in use. `class_name` and `style` are the element's verbatim `class`
/// and `style` attributes, restored as-is on replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorValue {
    pub classes: BTreeMap<String, String>,
    pub class_name: String,
    pub style: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundImageValue {
    pub image_url: String,
    pub size: String,
    pub position: String,
    pub repeat: String,
    pub class_name: String,
    pub style: String,
}

/// Attribute name to value. `None` and `Some("")` both mean absent.
pub type AttributeValue = BTreeMap<String, Option<String>>;

/// A category of change with its own store, history variant and element I/O.
pub trait Category: Sized + 'static {
    type Value: Clone + Debug + Default + PartialEq + Serialize + DeserializeOwned;

    const KIND: ChangeKind;

    /// Whether `current` differs from `original` for dirty bookkeeping.
    fn is_changed(original: &Self::Value, current: &Self::Value) -> bool {
        original != current
    }

    fn store_mut(registry: &mut ChangeRegistry) -> &mut ChangeStore<Self>;

    fn into_action(edit: Edit<Self::Value>) -> HistoryAction;

    /// Read the element's current value. `like` supplies context the element
    /// cannot, such as which attribute names are tracked.
    fn read(element: &dyn EditableElement, like: &Self::Value) -> Self::Value;

    fn write(element: &dyn EditableElement, value: &Self::Value);

    /// Value to put back when history replays `snapshot` over `current`.
    fn restore(_current: Option<&Self::Value>, snapshot: &Self::Value) -> Self::Value {
        snapshot.clone()
    }
}

pub struct TextCategory;
pub struct ImageCategory;
pub struct ColorCategory;
pub struct BackgroundImageCategory;
pub struct AttributeCategory;
pub struct SeoCategory;

impl Category for TextCategory {
    type Value = TextValue;
    const KIND: ChangeKind = ChangeKind::Text;

    fn is_changed(original: &TextValue, current: &TextValue) -> bool {
        original.html != current.html
    }

    fn store_mut(registry: &mut ChangeRegistry) -> &mut ChangeStore<Self> {
        &mut registry.text
    }

    fn into_action(edit: Edit<TextValue>) -> HistoryAction {
        HistoryAction::Text(edit)
    }

    fn read(element: &dyn EditableElement, _like: &TextValue) -> TextValue {
        TextValue::new(element.inner_html(), element.text_content())
    }

    fn write(element: &dyn EditableElement, value: &TextValue) {
        element.set_inner_html(&value.html);
    }
}

impl Category for ImageCategory {
    type Value = ImageValue;
    const KIND: ChangeKind = ChangeKind::Image;

    /// `srcset` is derived from `src` at build time and never makes an image dirty.
    fn is_changed(original: &ImageValue, current: &ImageValue) -> bool {
        original.src != current.src || original.alt != current.alt
    }

    fn store_mut(registry: &mut ChangeRegistry) -> &mut ChangeStore<Self> {
        &mut registry.image
    }

    fn into_action(edit: Edit<ImageValue>) -> HistoryAction {
        HistoryAction::Image(edit)
    }

    fn read(element: &dyn EditableElement, _like: &ImageValue) -> ImageValue {
        ImageValue {
            src: element.attribute("src").unwrap_or_default(),
            alt: element.attribute("alt").unwrap_or_default(),
            srcset: element.attribute("srcset"),
        }
    }

    /// Writes src/alt and drops any `srcset`, which would otherwise keep
    /// showing the old image.
    fn write(element: &dyn EditableElement, value: &ImageValue) {
        element.set_attribute("src", &value.src);
        element.set_attribute("alt", &value.alt);
        element.remove_attribute("srcset");
    }
}

impl Category for ColorCategory {
    type Value = ColorValue;
    const KIND: ChangeKind = ChangeKind::Color;

    fn is_changed(original: &ColorValue, current: &ColorValue) -> bool {
        original.classes != current.classes || original.style != current.style
    }

    fn store_mut(registry: &mut ChangeRegistry) -> &mut ChangeStore<Self> {
        &mut registry.color
    }

    fn into_action(edit: Edit<ColorValue>) -> HistoryAction {
        HistoryAction::Color(edit)
    }

    fn read(element: &dyn EditableElement, _like: &ColorValue) -> ColorValue {
        ColorValue {
            classes: BTreeMap::new(),
            class_name: element.class_name(),
            style: element.style_css(),
        }
    }

    fn write(element: &dyn EditableElement, value: &ColorValue) {
        element.set_class_name(&value.class_name);
        element.set_style_css(&value.style);
    }
}

impl Category for BackgroundImageCategory {
    type Value = BackgroundImageValue;
    const KIND: ChangeKind = ChangeKind::BackgroundImage;

    fn is_changed(original: &BackgroundImageValue, current: &BackgroundImageValue) -> bool {
        original.image_url != current.image_url
            || original.size != current.size
            || original.position != current.position
            || original.repeat != current.repeat
    }

    fn store_mut(registry: &mut ChangeRegistry) -> &mut ChangeStore<Self> {
        &mut registry.background_image
    }

    fn into_action(edit: Edit<BackgroundImageValue>) -> HistoryAction {
        HistoryAction::BackgroundImage(edit)
    }

    fn read(element: &dyn EditableElement, like: &BackgroundImageValue) -> BackgroundImageValue {
        BackgroundImageValue {
            class_name: element.class_name(),
            style: element.style_css(),
            ..like.clone()
        }
    }

    fn write(element: &dyn EditableElement, value: &BackgroundImageValue) {
        element.set_class_name(&value.class_name);
        element.set_style_css(&value.style);
    }
}

impl Category for AttributeCategory {
    type Value = AttributeValue;
    const KIND: ChangeKind = ChangeKind::Attribute;

    fn is_changed(original: &AttributeValue, current: &AttributeValue) -> bool {
        normalize_attributes(original) != normalize_attributes(current)
    }

    fn store_mut(registry: &mut ChangeRegistry) -> &mut ChangeStore<Self> {
        &mut registry.attribute
    }

    fn into_action(edit: Edit<AttributeValue>) -> HistoryAction {
        HistoryAction::Attribute(edit)
    }

    fn read(element: &dyn EditableElement, like: &AttributeValue) -> AttributeValue {
        like.keys()
            .map(|name| (name.clone(), element.attribute(name)))
            .collect()
    }

    fn write(element: &dyn EditableElement, value: &AttributeValue) {
        for (name, value) in value {
            match value.as_deref() {
                Some(v) if !v.is_empty() => element.set_attribute(name, v),
                _ => element.remove_attribute(name),
            }
        }
    }

    /// Names tracked after the snapshot was taken keep their current value.
    fn restore(current: Option<&AttributeValue>, snapshot: &AttributeValue) -> AttributeValue {
        let mut restored = current.cloned().unwrap_or_default();
        restored.extend(snapshot.iter().map(|(k, v)| (k.clone(), v.clone())));
        restored
    }
}

impl Category for SeoCategory {
    type Value = String;
    const KIND: ChangeKind = ChangeKind::Seo;

    fn store_mut(registry: &mut ChangeRegistry) -> &mut ChangeStore<Self> {
        &mut registry.seo
    }

    fn into_action(edit: Edit<String>) -> HistoryAction {
        HistoryAction::Seo(edit)
    }

    /// `<title>` carries its value as text, `<meta>`/`<link>` in `content`.
    fn read(element: &dyn EditableElement, _like: &String) -> String {
        if element.tag_name() == "title" {
            element.text_content()
        } else {
            element.attribute("content").unwrap_or_default()
        }
    }

    fn write(element: &dyn EditableElement, value: &String) {
        if element.tag_name() == "title" {
            element.set_text_content(value);
        } else {
            element.set_attribute("content", value);
        }
    }
}

/// Present attributes only; absent and empty collapse together.
pub fn normalize_attributes(attrs: &AttributeValue) -> BTreeMap<&str, &str> {
    attrs
        .iter()
        .filter_map(|(name, value)| match value.as_deref() {
            Some(v) if !v.is_empty() => Some((name.as_str(), v)),
            _ => None,
        })
        .collect()
}

/// Write `value` to `element` if it is still in the document.
pub(crate) fn write_if_attached<C: Category>(element: Option<&ElementRef>, value: &C::Value) {
    if let Some(element) = element.filter(|e| e.is_connected()) {
        C::write(element.as_ref(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_ignores_srcset() {
        let original = ImageValue {
            src: "/a.png".into(),
            alt: "A".into(),
            srcset: Some("/a-2x.png 2x".into()),
        };
        let mut current = original.clone();
        current.srcset = None;
        assert!(!ImageCategory::is_changed(&original, &current));

        current.src = "/b.png".into();
        assert!(ImageCategory::is_changed(&original, &current));
        current.src = "/a.png".into();
        assert!(!ImageCategory::is_changed(&original, &current));
    }

    #[test]
    fn test_attribute_absent_and_empty_are_equal() {
        let original: AttributeValue = [("target".to_string(), None)].into();
        let current: AttributeValue = [
            ("target".to_string(), Some(String::new())),
            ("rel".to_string(), None),
        ]
        .into();
        assert!(!AttributeCategory::is_changed(&original, &current));

        let changed: AttributeValue = [("target".to_string(), Some("_blank".into()))].into();
        assert!(AttributeCategory::is_changed(&original, &changed));
    }

    #[test]
    fn test_storage_keys() {
        let keys: Vec<String> = ChangeKind::ALL.iter().map(|k| k.storage_key()).collect();
        assert_eq!(
            keys,
            vec![
                "inlay:pending:text",
                "inlay:pending:image",
                "inlay:pending:color",
                "inlay:pending:bgImage",
                "inlay:pending:attribute",
                "inlay:pending:seo",
            ]
        );
    }

    #[test]
    fn test_attribute_write_removes_empty() {
        use crate::element::MemoryElement;

        let el = MemoryElement::new("a").with_attribute("target", "_blank");
        let value: AttributeValue = [
            ("target".to_string(), Some(String::new())),
            ("href".to_string(), Some("/docs".into())),
        ]
        .into();
        AttributeCategory::write(&el, &value);
        assert_eq!(el.attribute("target"), None);
        assert_eq!(el.attribute("href").as_deref(), Some("/docs"));
    }
}
