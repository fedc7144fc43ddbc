//! Page scan: marked elements to manifest entries and component instances.

use std::collections::BTreeMap;

use inlay_common::manifest::{ComponentInstance, ImageMetadata, ManifestEntry, ManifestSource};

use crate::RenderError;
use crate::cluster::cluster_component_entries;
use crate::dom::{HtmlDocument, NodeRef};

pub const ID_ATTR: &str = "data-cms-id";
pub const COMPONENT_ATTR: &str = "data-cms-component";
pub const SOURCE_ATTR: &str = "data-cms-src";
pub const LINE_ATTR: &str = "data-cms-line";
pub const SNIPPET_ATTR: &str = "data-cms-snippet";

/// What one page contributes to its manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageScan {
    pub entries: BTreeMap<String, ManifestEntry>,
    pub components: BTreeMap<String, ComponentInstance>,
}

impl PageScan {
    pub fn into_manifest_source(self) -> ManifestSource {
        ManifestSource {
            entries: Some(self.entries),
            components: Some(self.components),
            ..Default::default()
        }
    }
}

pub fn scan_html(html: &str) -> Result<PageScan, RenderError> {
    let document = HtmlDocument::parse(html)?;
    Ok(scan_document(&document))
}

/// Collect every `data-cms-id` element, then cluster the markers of each
/// component name into instances. The first element wins when an id repeats.
pub fn scan_document(document: &HtmlDocument) -> PageScan {
    let mut entries = BTreeMap::new();
    let mut groups: Vec<ComponentMarkers> = Vec::new();

    for element in document.elements_with_attribute(ID_ATTR) {
        let Some(cms_id) = element.attribute(ID_ATTR).filter(|id| !id.is_empty()) else {
            continue;
        };
        if entries.contains_key(&cms_id) {
            tracing::warn!(cms_id, "duplicate content id, keeping the first");
            continue;
        }
        entries.insert(cms_id.clone(), manifest_entry(&element, &cms_id));

        if let Some(name) = element.attribute(COMPONENT_ATTR) {
            match groups.iter_mut().find(|g| g.name == name) {
                Some(group) => group.push(element, cms_id),
                None => {
                    let mut group = ComponentMarkers::new(name);
                    group.push(element, cms_id);
                    groups.push(group);
                }
            }
        }
    }

    let mut components = BTreeMap::new();
    for group in groups {
        let clusters = cluster_component_entries(&group.elements, &group.ids, document);
        for (index, cluster) in clusters.into_iter().enumerate() {
            let instance_id = format!("{}-{index}", group.name);
            for cms_id in &cluster.cluster_entry_ids {
                if let Some(entry) = entries.get_mut(cms_id) {
                    entry.component_id = Some(instance_id.clone());
                }
            }
            let file = cluster
                .cluster_entry_ids
                .first()
                .and_then(|id| entries.get(id))
                .and_then(|e| e.source_path.clone());
            components.insert(
                instance_id.clone(),
                ComponentInstance {
                    id: instance_id,
                    component_name: group.name.clone(),
                    file,
                    entry_ids: cluster.cluster_entry_ids,
                    container_tag: cluster.container_node.tag_name(),
                    ..Default::default()
                },
            );
        }
    }

    tracing::debug!(
        entries = entries.len(),
        components = components.len(),
        "scanned page"
    );
    PageScan {
        entries,
        components,
    }
}

struct ComponentMarkers {
    name: String,
    elements: Vec<NodeRef>,
    ids: Vec<String>,
}

impl ComponentMarkers {
    fn new(name: String) -> Self {
        Self {
            name,
            elements: Vec::new(),
            ids: Vec::new(),
        }
    }

    fn push(&mut self, element: NodeRef, cms_id: String) {
        self.elements.push(element);
        self.ids.push(cms_id);
    }
}

fn manifest_entry(element: &NodeRef, cms_id: &str) -> ManifestEntry {
    let tag = element.tag_name().unwrap_or_default();
    let mut entry = ManifestEntry {
        id: cms_id.to_string(),
        source_path: element.attribute(SOURCE_ATTR),
        source_line: element
            .attribute(LINE_ATTR)
            .and_then(|line| line.trim().parse().ok()),
        source_snippet: element.attribute(SNIPPET_ATTR),
        ..Default::default()
    };

    if tag == "img" {
        entry.image = Some(ImageMetadata {
            src: element.attribute("src").unwrap_or_default(),
            alt: element.attribute("alt").unwrap_or_default(),
            srcset: element.attribute("srcset"),
        });
    } else {
        let text = element.text_content().trim().to_string();
        let html = element.inner_html().trim().to_string();
        if html != text {
            entry.html = Some(html);
        }
        entry.text = text;
    }
    entry.tag = tag;
    entry
}
