//! Content manifest model and the page/site merge.
//!
//! Each built page ships a `/{page}.json` manifest describing the editable
//! entries and component instances on that page. The site additionally ships
//! `/cms-manifest.json` with site-wide data (component definitions, collection
//! schemas, color palette). The editor works against the merge of the two.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ManifestError;

/// One editable element on a page, keyed by its build-time `cms_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub id: String,
    #[serde(default)]
    pub tag: String,
    /// Plain text content at build time. Doubles as the text to replace in source.
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_classes: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srcset: Option<String>,
}

/// A rendered instance of a component on a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentInstance {
    pub id: String,
    pub component_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_line: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub props: BTreeMap<String, serde_json::Value>,
    /// Editable entries rendered by this instance, in document order.
    #[serde(default)]
    pub entry_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_tag: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDefinition {
    pub name: String,
    pub file: String,
    #[serde(default)]
    pub props: Vec<ComponentProp>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slots: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentProp {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDefinition {
    pub name: String,
    #[serde(default)]
    pub entry_count: usize,
    #[serde(default)]
    pub fields: Vec<CollectionField>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub required: bool,
}

/// A single collection entry rendered by a detail page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionEntry {
    pub collection_name: String,
    pub collection_slug: String,
    #[serde(default)]
    pub source_path: String,
    #[serde(default)]
    pub frontmatter: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_start_line: Option<u32>,
}

impl CollectionEntry {
    /// Composite key used in [`Manifest::collections`].
    pub fn key(&self) -> String {
        format!("{}/{}", self.collection_name, self.collection_slug)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableColors {
    #[serde(default)]
    pub colors: Vec<ColorPalette>,
    #[serde(default)]
    pub default_colors: Vec<String>,
    #[serde(default)]
    pub custom_colors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorPalette {
    pub name: String,
    /// Shade (e.g. "500") to CSS value.
    #[serde(default)]
    pub values: BTreeMap<String, String>,
    #[serde(default)]
    pub is_custom: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyleOption {
    pub class: String,
    pub label: String,
}

/// Text style options grouped by property ("fontWeight", "fontSize", ...).
pub type AvailableTextStyles = BTreeMap<String, Vec<TextStyleOption>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub pathname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestMetadata {
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
}

/// An editable SEO value (title, meta description, open graph tag...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoField {
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_snippet: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSeo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<SeoField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<SeoField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical: Option<SeoField>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub open_graph: BTreeMap<String, SeoField>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub twitter_card: BTreeMap<String, SeoField>,
}

impl PageSeo {
    /// Find a field by its cms id.
    pub fn find(&self, id: &str) -> Option<&SeoField> {
        self.title
            .iter()
            .chain(self.description.iter())
            .chain(self.canonical.iter())
            .chain(self.open_graph.values())
            .chain(self.twitter_card.values())
            .find(|field| field.id == id)
    }
}

/// Raw shape of both `/{page}.json` and `/cms-manifest.json`.
///
/// Every field is optional so either file can be decoded with the same type;
/// which fields are honored from which file is decided by [`merge_manifests`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManifestSource {
    pub entries: Option<BTreeMap<String, ManifestEntry>>,
    pub components: Option<BTreeMap<String, ComponentInstance>>,
    pub component_definitions: Option<BTreeMap<String, ComponentDefinition>>,
    pub collection_definitions: Option<BTreeMap<String, CollectionDefinition>>,
    pub collections: Option<BTreeMap<String, CollectionEntry>>,
    /// Detail pages carry the single entry they render.
    pub collection: Option<CollectionEntry>,
    pub available_colors: Option<AvailableColors>,
    pub available_text_styles: Option<AvailableTextStyles>,
    pub pages: Option<Vec<PageInfo>>,
    pub metadata: Option<ManifestMetadata>,
    pub seo: Option<PageSeo>,
}

/// The merged content manifest served to the editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub entries: BTreeMap<String, ManifestEntry>,
    pub components: BTreeMap<String, ComponentInstance>,
    pub component_definitions: BTreeMap<String, ComponentDefinition>,
    pub collection_definitions: BTreeMap<String, CollectionDefinition>,
    pub collections: BTreeMap<String, CollectionEntry>,
    pub available_colors: AvailableColors,
    pub available_text_styles: AvailableTextStyles,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<PageInfo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ManifestMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seo: Option<PageSeo>,
}

impl Manifest {
    pub fn entry(&self, cms_id: &str) -> Option<&ManifestEntry> {
        self.entries.get(cms_id)
    }
}

/// Combine a page manifest and the site-wide manifest.
///
/// Page-scoped fields (`entries`, `components`, `seo`, `metadata`) come only
/// from the page manifest. Site-scoped fields prefer the global manifest and
/// fall back to the page's copy when the global manifest lacks them.
/// `collections` is the union of both, page entries winning, with the page's
/// singular `collection` folded in under `"{name}/{slug}"`.
pub fn merge_manifests(
    page: Option<ManifestSource>,
    global: Option<ManifestSource>,
) -> Result<Manifest, ManifestError> {
    if page.is_none() && global.is_none() {
        return Err(ManifestError::AllSourcesFailed);
    }

    let mut page = page.unwrap_or_default();
    let global = global.unwrap_or_default();

    if let Some(entry) = page.collection.take() {
        page.collections
            .get_or_insert_with(BTreeMap::new)
            .insert(entry.key(), entry);
    }

    let mut collections = global.collections.unwrap_or_default();
    collections.extend(page.collections.unwrap_or_default());

    Ok(Manifest {
        entries: page.entries.unwrap_or_default(),
        components: page.components.unwrap_or_default(),
        seo: page.seo,
        metadata: page.metadata,
        component_definitions: global
            .component_definitions
            .or(page.component_definitions)
            .unwrap_or_default(),
        collection_definitions: global
            .collection_definitions
            .or(page.collection_definitions)
            .unwrap_or_default(),
        available_colors: global
            .available_colors
            .or(page.available_colors)
            .unwrap_or_default(),
        available_text_styles: global
            .available_text_styles
            .or(page.available_text_styles)
            .unwrap_or_default(),
        pages: global.pages.or(page.pages),
        collections,
    })
}

/// Site-relative path of the manifest for a page pathname.
///
/// `/` maps to `/index.json`, `/blog/post-1/` to `/blog/post-1.json`.
pub fn page_manifest_path(pathname: &str) -> String {
    let trimmed = pathname
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_matches('/');
    let trimmed = trimmed.strip_suffix(".html").unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("/index").unwrap_or(trimmed);
    if trimmed.is_empty() || trimmed == "index" {
        "/index.json".to_string()
    } else {
        format!("/{trimmed}.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(file: &str) -> BTreeMap<String, ComponentDefinition> {
        BTreeMap::from([(
            "Card".to_string(),
            ComponentDefinition {
                name: "Card".into(),
                file: file.into(),
                ..Default::default()
            },
        )])
    }

    fn page_with_entry() -> ManifestSource {
        ManifestSource {
            entries: Some(BTreeMap::from([(
                "cms-0".to_string(),
                ManifestEntry {
                    id: "cms-0".into(),
                    tag: "h1".into(),
                    text: "Hello".into(),
                    ..Default::default()
                },
            )])),
            component_definitions: Some(definition("src/components/PageCard.astro")),
            ..Default::default()
        }
    }

    #[test]
    fn test_component_definitions_fall_back_to_page() {
        let merged = merge_manifests(Some(page_with_entry()), None).unwrap();
        assert_eq!(
            merged.component_definitions["Card"].file,
            "src/components/PageCard.astro"
        );
        assert!(merged.entries.contains_key("cms-0"));
    }

    #[test]
    fn test_global_component_definitions_win() {
        let global = ManifestSource {
            component_definitions: Some(definition("src/components/Card.astro")),
            // page-scoped data in the global file is ignored
            entries: Some(BTreeMap::from([(
                "global-only".to_string(),
                ManifestEntry::default(),
            )])),
            ..Default::default()
        };
        let merged = merge_manifests(Some(page_with_entry()), Some(global)).unwrap();
        assert_eq!(
            merged.component_definitions["Card"].file,
            "src/components/Card.astro"
        );
        assert!(!merged.entries.contains_key("global-only"));
    }

    #[test]
    fn test_both_missing_fails() {
        let err = merge_manifests(None, None).unwrap_err();
        assert_eq!(err.to_string(), "Failed to load manifest from all sources");
    }

    #[test]
    fn test_global_only_has_empty_page_fields() {
        let global = ManifestSource {
            available_colors: Some(AvailableColors {
                default_colors: vec!["red".into()],
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge_manifests(None, Some(global)).unwrap();
        assert!(merged.entries.is_empty());
        assert_eq!(merged.available_colors.default_colors, vec!["red"]);
    }

    #[test]
    fn test_detail_page_collection_is_folded() {
        let json = r#"{
            "collection": {
                "collectionName": "blog",
                "collectionSlug": "post-1",
                "sourcePath": "src/content/blog/post-1.md",
                "frontmatter": { "title": "First" }
            }
        }"#;
        let page: ManifestSource = serde_json::from_str(json).unwrap();
        let expected = page.collection.clone().unwrap();

        let merged = merge_manifests(Some(page), None).unwrap();
        assert_eq!(merged.collections["blog/post-1"], expected);
    }

    #[test]
    fn test_page_collections_override_global() {
        let entry = |path: &str| CollectionEntry {
            collection_name: "blog".into(),
            collection_slug: "a".into(),
            source_path: path.into(),
            ..Default::default()
        };
        let page = ManifestSource {
            collections: Some(BTreeMap::from([("blog/a".to_string(), entry("page"))])),
            ..Default::default()
        };
        let global = ManifestSource {
            collections: Some(BTreeMap::from([
                ("blog/a".to_string(), entry("global")),
                ("blog/b".to_string(), entry("global-b")),
            ])),
            ..Default::default()
        };
        let merged = merge_manifests(Some(page), Some(global)).unwrap();
        assert_eq!(merged.collections["blog/a"].source_path, "page");
        assert_eq!(merged.collections.len(), 2);
    }

    #[test]
    fn test_seo_find_by_id() {
        let seo = PageSeo {
            title: Some(SeoField {
                id: "seo-title".into(),
                content: "Home".into(),
                ..Default::default()
            }),
            open_graph: BTreeMap::from([(
                "og:title".to_string(),
                SeoField {
                    id: "seo-og-title".into(),
                    ..Default::default()
                },
            )]),
            ..Default::default()
        };
        assert_eq!(seo.find("seo-title").unwrap().content, "Home");
        assert!(seo.find("seo-og-title").is_some());
        assert!(seo.find("missing").is_none());
    }

    #[test]
    fn test_page_manifest_path() {
        assert_eq!(page_manifest_path("/"), "/index.json");
        assert_eq!(page_manifest_path(""), "/index.json");
        assert_eq!(page_manifest_path("/about/"), "/about.json");
        assert_eq!(page_manifest_path("/blog/post-1"), "/blog/post-1.json");
        assert_eq!(page_manifest_path("/blog/index.html"), "/blog.json");
        assert_eq!(page_manifest_path("/docs/?tab=2"), "/docs.json");
    }
}
