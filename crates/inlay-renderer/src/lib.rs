//! inlay renderer
//!
//! Build-time side of the editor: parses rendered pages, finds the elements
//! marked as editable and groups them into component instances for the page
//! manifest.

pub mod cluster;
pub mod dom;
pub mod scan;

pub use cluster::{Cluster, Tree, cluster_component_entries};
pub use dom::{HtmlDocument, NodeRef};
pub use scan::{PageScan, scan_document, scan_html};

#[derive(thiserror::Error, Debug, miette::Diagnostic)]
pub enum RenderError {
    #[error("failed to parse HTML: {0}")]
    #[diagnostic(code(inlay_renderer::parse))]
    Parse(#[source] std::io::Error),
}
