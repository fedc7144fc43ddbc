//! Request and response bodies for the editor API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One edited entry in a batched save.
///
/// `source_path`/`source_line`/`source_snippet` and `original_value` let the
/// save service find the exact spot to patch when the same text appears more
/// than once in a source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePayload {
    pub cms_id: String,
    pub new_value: String,
    pub original_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_change: Option<ImageChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_change: Option<ColorChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_image_change: Option<BackgroundImageChange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_changes: Vec<AttributeChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seo_change: Option<SeoChange>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageChange {
    pub new_src: String,
    pub new_alt: String,
    pub original_src: String,
    pub original_alt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorChange {
    pub new_classes: BTreeMap<String, String>,
    pub original_classes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_style: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundImageChange {
    pub new_url: String,
    pub original_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeChange {
    pub name: String,
    /// `None` removes the attribute.
    pub new_value: Option<String>,
    pub original_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoChange {
    pub new_value: String,
    pub original_value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveMeta {
    pub source: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub changes: Vec<ChangePayload>,
    pub meta: SaveMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub updated: usize,
    #[serde(default)]
    pub errors: Option<Vec<SaveErrorEntry>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveErrorEntry {
    pub cms_id: String,
    pub error: String,
}

/// Where to put a new component relative to an existing one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertPosition {
    Before,
    #[default]
    After,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertComponentRequest {
    pub position: InsertPosition,
    pub reference_component_id: String,
    pub component_name: String,
    #[serde(default)]
    pub props: BTreeMap<String, serde_json::Value>,
    pub meta: SaveMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveComponentRequest {
    pub component_id: String,
    pub meta: SaveMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddArrayItemRequest {
    pub reference_component_id: String,
    pub position: InsertPosition,
    #[serde(default)]
    pub props: BTreeMap<String, serde_json::Value>,
    pub meta: SaveMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveArrayItemRequest {
    pub component_id: String,
    pub meta: SaveMeta,
}

/// Uniform response of the structural content operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cms_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistory {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_payload_wire_names() {
        let payload = ChangePayload {
            cms_id: "cms-3".into(),
            new_value: "Hi".into(),
            original_value: "Hello".into(),
            source_line: Some(12),
            ..Default::default()
        };
        let json = serde_json::to_string(&payload).unwrap();
        insta::assert_snapshot!(json, @r#"{"cmsId":"cms-3","newValue":"Hi","originalValue":"Hello","sourceLine":12}"#);
    }

    #[test]
    fn test_save_response_without_errors() {
        let resp: SaveResponse = serde_json::from_str(r#"{"updated":2}"#).unwrap();
        assert_eq!(resp.updated, 2);
        assert!(resp.errors.is_none());
    }
}
