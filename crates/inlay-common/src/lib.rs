//! inlay-common: shared plumbing for the inlay visual editor.
//!
//! - `manifest`: content manifest model and the page/site merge
//! - `client`: HTTP client for manifests, batched saves, structural edits and AI chat
//! - `sse`: chat stream event parsing
//! - `wire`: request/response bodies
//! - `config`, `error`, `telemetry`: ambient setup

pub mod client;
pub mod config;
pub mod error;
pub mod manifest;
pub mod sse;
#[cfg(feature = "telemetry")]
pub mod telemetry;
pub mod wire;

pub use crate::client::ApiClient;
pub use crate::config::EditorConfig;
pub use crate::error::{ApiError, ConfigError, InlayError, ManifestError};
pub use crate::manifest::{Manifest, ManifestEntry, ManifestSource, merge_manifests};
pub use crate::sse::{ChatEvent, ChatStreamError, ChatStreamHandler, parse_sse_event};
pub use tokio_util::sync::CancellationToken;
