//! Error types shared by the inlay crates.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for inlay operations
#[derive(Debug, Error, Diagnostic)]
pub enum InlayError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    /// Serialization/deserialization error
    #[error(transparent)]
    #[diagnostic(code(inlay::serde))]
    Json(#[from] serde_json::Error),
}

/// Errors talking to the editor API or the site host.
#[derive(Debug, Error, Diagnostic)]
pub enum ApiError {
    #[error("request to {url} timed out after {timeout_ms}ms")]
    #[diagnostic(code(api::timeout), help("the save service may be overloaded; try again"))]
    Timeout { url: String, timeout_ms: u128 },

    #[error("request to {url} failed")]
    #[diagnostic(code(api::transport))]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with HTTP {status}")]
    #[diagnostic(code(api::status))]
    Status { url: String, status: u16, body: String },

    #[error("could not decode response from {url}")]
    #[diagnostic(code(api::decode))]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid endpoint path {path}")]
    #[diagnostic(code(api::url))]
    Url {
        path: String,
        #[source]
        source: url::ParseError,
    },
}

/// Manifest loading errors
#[derive(Debug, Error, Diagnostic)]
pub enum ManifestError {
    #[error("Failed to load manifest from all sources")]
    #[diagnostic(
        code(manifest::unavailable),
        help("neither the page manifest nor cms-manifest.json could be fetched")
    )]
    AllSourcesFailed,
}

/// Configuration errors
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("invalid URL {url}: {message}")]
    #[diagnostic(code(config::url))]
    UrlParse { url: String, message: String },

    #[error("invalid value for {var}: {value}")]
    #[diagnostic(code(config::value))]
    InvalidValue { var: &'static str, value: String },
}
