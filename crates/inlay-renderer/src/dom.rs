//! Parsed HTML page with node handles that compare by identity.

use std::fmt;
use std::rc::{Rc, Weak};

use html5ever::serialize::{SerializeOpts, TraversalScope, serialize};
use html5ever::tendril::TendrilSink;
use html5ever::{ParseOpts, parse_document};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};

use crate::RenderError;
use crate::cluster::Tree;

/// Handle to a node of an [`HtmlDocument`]. Two handles are equal only when
/// they point at the same node.
#[derive(Clone)]
pub struct NodeRef(Handle);

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for NodeRef {}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.data {
            NodeData::Element { name, .. } => match self.attribute("data-cms-id") {
                Some(id) => write!(f, "<{} data-cms-id={id:?}>", name.local),
                None => write!(f, "<{}>", name.local),
            },
            NodeData::Document => f.write_str("#document"),
            NodeData::Text { .. } => f.write_str("#text"),
            _ => f.write_str("#other"),
        }
    }
}

impl NodeRef {
    fn node(&self) -> &Node {
        &self.0
    }

    pub fn is_element(&self) -> bool {
        matches!(self.node().data, NodeData::Element { .. })
    }

    /// Lowercase local name for elements.
    pub fn tag_name(&self) -> Option<String> {
        match &self.node().data {
            NodeData::Element { name, .. } => Some(name.local.to_string()),
            _ => None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        match &self.node().data {
            NodeData::Element { attrs, .. } => attrs
                .borrow()
                .iter()
                .find(|a| &*a.name.local == name)
                .map(|a| a.value.to_string()),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<NodeRef> {
        // rcdom keeps the parent in a Cell, so it has to be taken and put back
        let weak = self.node().parent.take();
        let parent = weak.as_ref().and_then(Weak::upgrade);
        self.node().parent.set(weak);
        parent.map(NodeRef)
    }

    pub fn children(&self) -> Vec<NodeRef> {
        self.node()
            .children
            .borrow()
            .iter()
            .cloned()
            .map(NodeRef)
            .collect()
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        collect_text(&self.0, &mut text);
        text
    }

    /// Serialized children.
    pub fn inner_html(&self) -> String {
        let mut bytes = Vec::new();
        let opts = SerializeOpts {
            traversal_scope: TraversalScope::ChildrenOnly(None),
            ..Default::default()
        };
        let handle = SerializableHandle::from(self.0.clone());
        if let Err(error) = serialize(&mut bytes, &handle, opts) {
            tracing::warn!(%error, "failed to serialize node");
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Elements below this node in document order, excluding itself.
    pub fn descendants(&self) -> Vec<NodeRef> {
        let mut out = Vec::new();
        collect_elements(&self.0, &mut out);
        out
    }
}

fn collect_text(handle: &Handle, out: &mut String) {
    for child in handle.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => out.push_str(&contents.borrow()),
            NodeData::Element { .. } => collect_text(child, out),
            _ => {}
        }
    }
}

fn collect_elements(handle: &Handle, out: &mut Vec<NodeRef>) {
    for child in handle.children.borrow().iter() {
        if let NodeData::Element { .. } = child.data {
            out.push(NodeRef(child.clone()));
        }
        collect_elements(child, out);
    }
}

/// A parsed HTML document.
pub struct HtmlDocument {
    dom: RcDom,
}

impl fmt::Debug for HtmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlDocument").finish_non_exhaustive()
    }
}

impl HtmlDocument {
    pub fn parse(html: &str) -> Result<Self, RenderError> {
        let dom = parse_document(RcDom::default(), ParseOpts::default())
            .from_utf8()
            .read_from(&mut html.as_bytes())
            .map_err(RenderError::Parse)?;
        Ok(Self { dom })
    }

    pub fn root(&self) -> NodeRef {
        NodeRef(self.dom.document.clone())
    }

    /// All elements in document order.
    pub fn elements(&self) -> Vec<NodeRef> {
        self.root().descendants()
    }

    /// Elements carrying `attribute`, in document order.
    pub fn elements_with_attribute(&self, attribute: &str) -> Vec<NodeRef> {
        self.elements()
            .into_iter()
            .filter(|e| e.attribute(attribute).is_some())
            .collect()
    }
}

impl Tree for HtmlDocument {
    type Node = NodeRef;

    fn parent(&self, node: &NodeRef) -> Option<NodeRef> {
        node.parent()
    }

    fn label(&self, node: &NodeRef) -> Option<String> {
        node.tag_name()
    }
}
