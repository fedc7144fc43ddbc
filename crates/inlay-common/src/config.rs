use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

/// Runtime configuration for the editor overlay and its API client.
#[derive(Debug, Clone)]
pub struct EditorConfig {
    /// Origin the static site (and its manifests) is served from.
    pub site_url: Url,
    /// Base URL of the editor API (`{base}/update`, `{base}/ai/chat`, ...).
    pub api_base: Url,
    /// Timeout applied to every non-streaming request.
    pub request_timeout: Duration,
    /// Upper bound on a single AI chat stream.
    pub stream_timeout: Duration,
    /// Quiet period before a burst of keystrokes becomes one undo step.
    pub text_debounce: Duration,
    /// Maximum entries kept on each of the undo and redo stacks.
    pub history_limit: usize,
}

impl EditorConfig {
    pub const DEFAULT_SITE_URL: &'static str = "http://localhost:4321";
    pub const DEFAULT_API_PATH: &'static str = "/_cms";
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(5 * 60);
    pub const DEFAULT_TEXT_DEBOUNCE: Duration = Duration::from_millis(500);
    pub const DEFAULT_HISTORY_LIMIT: usize = 100;

    /// Build a config for a site, with the API mounted at the default path.
    pub fn for_site(site_url: Url) -> Result<Self, ConfigError> {
        let api_base = parse_url(&format!(
            "{}{}",
            site_url.as_str().trim_end_matches('/'),
            Self::DEFAULT_API_PATH
        ))?;
        Ok(Self {
            site_url,
            api_base,
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            stream_timeout: Self::DEFAULT_STREAM_TIMEOUT,
            text_debounce: Self::DEFAULT_TEXT_DEBOUNCE,
            history_limit: Self::DEFAULT_HISTORY_LIMIT,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Optional env vars:
    /// - `INLAY_SITE_URL`: site origin (default: http://localhost:4321)
    /// - `INLAY_API_BASE`: API base URL (default: `{site}/_cms`)
    /// - `INLAY_TIMEOUT_MS`: request timeout in milliseconds (default: 10000)
    /// - `INLAY_STREAM_TIMEOUT_MS`: chat stream timeout in milliseconds (default: 300000)
    /// - `INLAY_DEBOUNCE_MS`: text edit coalescing window (default: 500)
    /// - `INLAY_HISTORY_LIMIT`: undo/redo stack bound (default: 100)
    pub fn from_env() -> Result<Self, ConfigError> {
        let site_str =
            std::env::var("INLAY_SITE_URL").unwrap_or_else(|_| Self::DEFAULT_SITE_URL.to_string());
        let mut config = Self::for_site(parse_url(&site_str)?)?;

        if let Ok(base) = std::env::var("INLAY_API_BASE") {
            config.api_base = parse_url(&base)?;
        }
        if let Some(ms) = env_number("INLAY_TIMEOUT_MS")? {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_number("INLAY_STREAM_TIMEOUT_MS")? {
            config.stream_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_number("INLAY_DEBOUNCE_MS")? {
            config.text_debounce = Duration::from_millis(ms);
        }
        if let Some(limit) = env_number("INLAY_HISTORY_LIMIT")? {
            config.history_limit = limit as usize;
        }

        Ok(config)
    }
}

fn parse_url(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::UrlParse {
        url: raw.to_string(),
        message: e.to_string(),
    })
}

fn env_number(var: &'static str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_site_mounts_api_under_site() {
        let config = EditorConfig::for_site(Url::parse("https://example.com/").unwrap()).unwrap();
        assert_eq!(config.api_base.as_str(), "https://example.com/_cms");
        assert_eq!(config.text_debounce, Duration::from_millis(500));
        assert_eq!(config.history_limit, 100);
    }

    #[test]
    fn test_parse_url_reports_input() {
        let err = parse_url("not a url").unwrap_err();
        assert!(matches!(err, ConfigError::UrlParse { ref url, .. } if url == "not a url"));
    }
}
