//! Scrape request/response structures and URL validation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ScrapeError;

/// Request to scrape a single page.
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeRequest {
    /// Absolute URL to fetch. Must pass [`validate_url`] before any session
    /// work happens.
    pub url: String,

    /// Unconditional pause after a successful navigation, in milliseconds.
    #[serde(default)]
    pub wait_after_load: u64,

    /// Per-attempt timeout in milliseconds, applied separately to each
    /// navigation strategy and to the selector wait.
    #[serde(default = "default_timeout_ms")]
    pub timeout: u64,

    /// Extra HTTP headers applied to every request the page issues.
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,

    /// CSS selector that must match before the page counts as scraped.
    #[serde(default)]
    pub check_selector: Option<String>,
}

fn default_timeout_ms() -> u64 {
    15_000
}

/// Wire response for a completed fetch.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeResponse {
    pub content: String,

    /// Status code of the scraped target. Absent when navigation produced
    /// no response object at all.
    #[serde(rename = "pageStatusCode", skip_serializing_if = "Option::is_none")]
    pub page_status_code: Option<u16>,

    /// Advisory classification of a non-200 target status. Never affects
    /// the service's own response code.
    #[serde(rename = "pageError", skip_serializing_if = "Option::is_none")]
    pub page_error: Option<String>,
}

/// Result of driving a page through navigation and extraction.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub content: String,
    pub status_code: Option<u16>,
    pub headers: Option<HashMap<String, String>>,
}

/// Browser engine configuration, resolved from the service config.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Path to Chrome/Chromium binary (chromiumoxide auto-detects if unset).
    pub chrome_path: Option<String>,
    /// Fixed viewport applied to every page.
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Abort sub-requests for media files.
    pub block_media: bool,
    /// Outbound proxy server address, applied via `--proxy-server`.
    pub proxy_server: Option<String>,
    /// Proxy credentials, answered through CDP auth challenges. Only set
    /// when both username and password are configured.
    pub proxy_credentials: Option<(String, String)>,
    /// Additional Chrome arguments appended after the built-in flag set.
    pub chrome_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            viewport_width: 1280,
            viewport_height: 800,
            block_media: false,
            proxy_server: None,
            proxy_credentials: None,
            chrome_args: Vec::new(),
        }
    }
}

impl From<&scraperd_config::BrowserConfig> for BrowserConfig {
    fn from(cfg: &scraperd_config::BrowserConfig) -> Self {
        Self {
            chrome_path: cfg.chrome_path.clone(),
            viewport_width: cfg.viewport_width,
            viewport_height: cfg.viewport_height,
            block_media: cfg.block_media,
            proxy_server: cfg.proxy.as_ref().map(|p| p.server.clone()),
            proxy_credentials: cfg.proxy.as_ref().and_then(|p| {
                p.credentials()
                    .map(|(user, pass)| (user.to_string(), pass.to_string()))
            }),
            chrome_args: cfg.chrome_args.clone(),
        }
    }
}

/// Validate a URL before it reaches the browser session.
///
/// Checks for:
/// - Non-empty input
/// - Valid absolute-URL structure (can be parsed)
/// - Allowed schemes (http, https)
pub fn validate_url(url: &str) -> Result<(), ScrapeError> {
    if url.is_empty() {
        return Err(ScrapeError::InvalidUrl("url cannot be empty".to_string()));
    }

    let parsed = url::Url::parse(url)
        .map_err(|e| ScrapeError::InvalidUrl(format!("invalid url '{url}': {e}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ScrapeError::InvalidUrl(format!(
            "unsupported url scheme '{scheme}', only http/https allowed"
        ))),
    }
}
