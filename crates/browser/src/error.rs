//! Scraping error types.

use thiserror::Error;

/// Errors that can occur while serving a scrape request.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("browser session not ready: {0}")]
    SessionNotReady(String),

    #[error("browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("navigation failed: {0}")]
    FetchFailed(String),

    #[error("selector not found: {0}")]
    SelectorNotFound(String),

    #[error("CDP error: {0}")]
    Cdp(String),
}

impl From<chromiumoxide::error::CdpError> for ScrapeError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        ScrapeError::Cdp(err.to_string())
    }
}
