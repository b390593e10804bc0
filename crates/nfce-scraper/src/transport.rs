//! HTTP transport capability.
//!
//! The engine talks to the portal only through [`PortalTransport`]. The
//! production implementation keeps one cookie jar per instance, so a
//! transport is one portal session.

use async_trait::async_trait;
use nfce_core::PortalConfig;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, REFERER};
use std::borrow::Cow;
use std::collections::BTreeMap;
use thiserror::Error;

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Build(String),

    /// Request did not complete in time
    #[error("request to {url} timed out")]
    Timeout {
        /// Requested URL
        url: String,
    },

    /// Server answered with a non-2xx status
    #[error("HTTP {status} from {url}")]
    Status {
        /// Response status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Any other request failure
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// A fetched page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// HTTP status code
    pub status: u16,
    /// `Content-Type` header, empty if absent
    pub content_type: String,
    /// Raw body
    pub body: Vec<u8>,
}

impl Page {
    /// Body decoded as UTF-8, lossily.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Session-bound access to the portal.
///
/// Paths are relative to the portal base URL; a referer is also a path.
#[async_trait]
pub trait PortalTransport: Send + Sync {
    /// GET `path` with query parameters.
    async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
        referer: Option<&str>,
    ) -> Result<Page, TransportError>;

    /// POST `fields` url-encoded to `path`.
    async fn post_form(
        &self,
        path: &str,
        fields: &BTreeMap<String, String>,
        referer: Option<&str>,
    ) -> Result<Page, TransportError>;
}

/// `reqwest`-backed transport with its own cookie store.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a client from portal settings.
    pub fn new(config: &PortalConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language)
                .map_err(|e| TransportError::Build(format!("invalid Accept-Language: {e}")))?,
        );

        if config.accept_invalid_certs {
            tracing::debug!("Accepting invalid certificates for {}", config.base_url);
        }

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: String) -> Result<Page, TransportError> {
        let response = request.send().await.map_err(|e| classify_error(e, &url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify_error(e, &url))?
            .to_vec();

        tracing::debug!("{} -> {} ({} bytes)", url, status, body.len());

        Ok(Page {
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

fn classify_error(error: reqwest::Error, url: &str) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else {
        TransportError::Request(error)
    }
}

#[async_trait]
impl PortalTransport for HttpTransport {
    async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
        referer: Option<&str>,
    ) -> Result<Page, TransportError> {
        let url = self.url(path);
        let mut request = self.client.get(&url).query(query);
        if let Some(referer) = referer {
            request = request.header(REFERER, self.url(referer));
        }
        self.send(request, url).await
    }

    async fn post_form(
        &self,
        path: &str,
        fields: &BTreeMap<String, String>,
        referer: Option<&str>,
    ) -> Result<Page, TransportError> {
        let url = self.url(path);
        let mut request = self.client.post(&url).form(fields);
        if let Some(referer) = referer {
            request = request.header(REFERER, self.url(referer));
        }
        self.send(request, url).await
    }
}
