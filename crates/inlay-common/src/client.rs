//! HTTP client for the editor API and the site's manifests.

use std::time::Duration;

use n0_future::StreamExt;
use reqwest::RequestBuilder;
use reqwest::header::ACCEPT;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::EditorConfig;
use crate::error::{ApiError, ManifestError};
use crate::manifest::{Manifest, ManifestSource, merge_manifests, page_manifest_path};
use crate::sse::{ChatEvent, ChatStreamError, ChatStreamHandler, SseLineBuffer, parse_sse_event};
use crate::wire::{
    AddArrayItemRequest, ChatHistory, ChatRequest, DeploymentStatus, InsertComponentRequest,
    RemoveArrayItemRequest, RemoveComponentRequest, SaveRequest, SaveResponse,
    StructuralResponse,
};

const GLOBAL_MANIFEST_PATH: &str = "/cms-manifest.json";

/// Client for the editor API.
///
/// Every request carries a timeout; in the browser requests also include
/// credentials so the session cookie reaches the API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    site_url: Url,
    api_base: Url,
    request_timeout: Duration,
    stream_timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &EditorConfig) -> Self {
        Self::with_http(reqwest::Client::new(), config)
    }

    pub fn with_http(http: reqwest::Client, config: &EditorConfig) -> Self {
        Self {
            http,
            site_url: config.site_url.clone(),
            api_base: config.api_base.clone(),
            request_timeout: config.request_timeout,
            stream_timeout: config.stream_timeout,
        }
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// Resolve an endpoint below the API base (`"update"` -> `{base}/update`).
    pub fn api_url(&self, path: &str) -> Result<Url, ApiError> {
        let raw = format!(
            "{}/{}",
            self.api_base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&raw).map_err(|source| ApiError::Url {
            path: path.to_string(),
            source,
        })
    }

    fn site_path(&self, path: &str) -> Result<Url, ApiError> {
        self.site_url.join(path).map_err(|source| ApiError::Url {
            path: path.to_string(),
            source,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &Url,
    ) -> Result<T, ApiError> {
        let request = with_credentials(request);
        let exchange = async {
            let response = request.send().await.map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ApiError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                    body,
                });
            }

            let bytes = response.bytes().await.map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;
            serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode {
                url: url.to_string(),
                source,
            })
        };

        n0_future::time::timeout(self.request_timeout, exchange)
            .await
            .map_err(|_| ApiError::Timeout {
                url: url.to_string(),
                timeout_ms: self.request_timeout.as_millis(),
            })?
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        self.send_json(self.http.get(url.clone()), &url).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send_json(self.http.post(url.clone()).json(body), &url)
            .await
    }

    /// Fetch `/{page}.json` for a page pathname, bypassing any CDN cache.
    pub async fn fetch_page_manifest(&self, pathname: &str) -> Result<ManifestSource, ApiError> {
        let mut url = self.site_path(&page_manifest_path(pathname))?;
        cache_bust(&mut url);
        self.get_json(url).await
    }

    /// Fetch `/cms-manifest.json`, bypassing any CDN cache.
    pub async fn fetch_global_manifest(&self) -> Result<ManifestSource, ApiError> {
        let mut url = self.site_path(GLOBAL_MANIFEST_PATH)?;
        cache_bust(&mut url);
        self.get_json(url).await
    }

    /// Fetch both manifests concurrently and merge them.
    ///
    /// A failure of one source is logged and does not affect the other. Only
    /// when both fail is an error returned.
    pub async fn fetch_manifest(&self, pathname: &str) -> Result<Manifest, ManifestError> {
        let (page, global) = n0_future::future::zip(
            self.fetch_page_manifest(pathname),
            self.fetch_global_manifest(),
        )
        .await;

        let page = page
            .inspect_err(|e| tracing::warn!(error = %e, pathname, "page manifest unavailable"))
            .ok();
        let global = global
            .inspect_err(|e| tracing::warn!(error = %e, "global manifest unavailable"))
            .ok();

        merge_manifests(page, global)
    }

    /// `POST {base}/update` with a batch of changes.
    pub async fn save_changes(&self, request: &SaveRequest) -> Result<SaveResponse, ApiError> {
        tracing::debug!(changes = request.changes.len(), "saving batch");
        self.post_json(self.api_url("update")?, request).await
    }

    pub async fn insert_component(
        &self,
        request: &InsertComponentRequest,
    ) -> Result<StructuralResponse, ApiError> {
        self.post_json(self.api_url("insert-component")?, request)
            .await
    }

    pub async fn remove_component(
        &self,
        request: &RemoveComponentRequest,
    ) -> Result<StructuralResponse, ApiError> {
        self.post_json(self.api_url("remove-component")?, request)
            .await
    }

    pub async fn add_array_item(
        &self,
        request: &AddArrayItemRequest,
    ) -> Result<StructuralResponse, ApiError> {
        self.post_json(self.api_url("add-array-item")?, request)
            .await
    }

    pub async fn remove_array_item(
        &self,
        request: &RemoveArrayItemRequest,
    ) -> Result<StructuralResponse, ApiError> {
        self.post_json(self.api_url("remove-array-item")?, request)
            .await
    }

    pub async fn chat_history(&self, limit: usize) -> Result<ChatHistory, ApiError> {
        let mut url = self.api_url("ai/chat/history")?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        self.get_json(url).await
    }

    pub async fn deployment_status(&self) -> Result<DeploymentStatus, ApiError> {
        self.get_json(self.api_url("deployment/status")?).await
    }

    /// Stream an AI chat reply into `handler`.
    ///
    /// Ends on a `done` event, `data: [DONE]`, end of body, an `error` event,
    /// cancellation of `cancel`, or the stream timeout. `handler` sees exactly
    /// one terminal callback in every case.
    pub async fn stream_chat<H: ChatStreamHandler>(
        &self,
        request: &ChatRequest,
        handler: &mut H,
        cancel: &CancellationToken,
    ) {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ChatStreamError::Cancelled),
            _ = n0_future::time::sleep(self.stream_timeout) => Err(ChatStreamError::Timeout),
            result = self.pump_chat(request, handler) => result,
        };

        match outcome {
            Ok(summary) => handler.on_done(summary),
            Err(error) => {
                tracing::warn!(%error, "chat stream ended with error");
                handler.on_error(error);
            }
        }
    }

    async fn pump_chat<H: ChatStreamHandler>(
        &self,
        request: &ChatRequest,
        handler: &mut H,
    ) -> Result<Option<String>, ChatStreamError> {
        let url = self
            .api_url("ai/chat")
            .map_err(|e| ChatStreamError::Request(e.to_string()))?;
        let request = self
            .http
            .post(url)
            .header(ACCEPT, "text/event-stream")
            .json(request);
        let response = with_credentials(request)
            .send()
            .await
            .map_err(|e| ChatStreamError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatStreamError::Request(format!("HTTP {}", status.as_u16())));
        }

        let mut body = std::pin::pin!(response.bytes_stream());
        let mut lines = SseLineBuffer::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| ChatStreamError::Request(e.to_string()))?;
            for line in lines.push(&chunk) {
                if let StreamFlow::Done(summary) = dispatch_line(&line, handler)? {
                    return Ok(summary);
                }
            }
        }

        if let Some(line) = lines.finish() {
            if let StreamFlow::Done(summary) = dispatch_line(&line, handler)? {
                return Ok(summary);
            }
        }
        Ok(None)
    }
}

enum StreamFlow {
    Continue,
    Done(Option<String>),
}

fn dispatch_line<H: ChatStreamHandler>(
    line: &str,
    handler: &mut H,
) -> Result<StreamFlow, ChatStreamError> {
    let Some(event) = parse_sse_event(line) else {
        return Ok(StreamFlow::Continue);
    };
    match event {
        ChatEvent::Token { token, full_text } => handler.on_token(&token, &full_text),
        ChatEvent::Status { status, message } => handler.on_status(&status, message.as_deref()),
        ChatEvent::Action { action } => handler.on_action(&action),
        ChatEvent::Error { error, code } => return Err(ChatStreamError::Remote { error, code }),
        ChatEvent::Done { summary } => return Ok(StreamFlow::Done(summary)),
    }
    Ok(StreamFlow::Continue)
}

fn cache_bust(url: &mut Url) {
    let millis = web_time::SystemTime::now()
        .duration_since(web_time::SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    url.query_pairs_mut().append_pair("t", &millis.to_string());
}

#[cfg(all(target_family = "wasm", target_os = "unknown"))]
fn with_credentials(request: RequestBuilder) -> RequestBuilder {
    request.fetch_credentials_include()
}

#[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
fn with_credentials(request: RequestBuilder) -> RequestBuilder {
    request
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        let config = EditorConfig::for_site(Url::parse("https://site.test").unwrap()).unwrap();
        ApiClient::new(&config)
    }

    #[test]
    fn test_api_url_joins_under_base() {
        let client = client();
        assert_eq!(
            client.api_url("update").unwrap().as_str(),
            "https://site.test/_cms/update"
        );
        assert_eq!(
            client.api_url("/ai/chat").unwrap().as_str(),
            "https://site.test/_cms/ai/chat"
        );
    }

    #[test]
    fn test_cache_bust_appends_timestamp() {
        let mut url = Url::parse("https://site.test/index.json").unwrap();
        cache_bust(&mut url);
        let (key, value) = url.query_pairs().next().unwrap();
        assert_eq!(key, "t");
        assert!(value.parse::<u128>().unwrap() > 0);
    }
}
