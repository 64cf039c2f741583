//! Headless Chrome/Chromium session management and page fetching for the
//! scrape API.
//!
//! One engine process serves the whole service. Each scrape request gets an
//! isolated page from [`SessionManager::acquire_page`], drives it through
//! [`fetch::run`], and closes it when done — on every path.
//!
//! # Example
//!
//! ```ignore
//! use scraperd_browser::{BrowserConfig, ScrapeRequest, SessionManager, fetch};
//!
//! let session = SessionManager::new(BrowserConfig::default());
//! session.ensure_ready().await?;
//!
//! let page = session.acquire_page().await?;
//! let outcome = fetch::run(&page, &request).await;
//! page.close().await?;
//! ```

pub mod classify;
pub mod error;
pub mod fetch;
pub mod health;
pub mod interception;
pub mod session;
pub mod types;

pub use {
    classify::{PageError, classify},
    error::ScrapeError,
    health::{Readiness, SessionState},
    interception::InterceptionPolicy,
    session::SessionManager,
    types::{BrowserConfig, FetchOutcome, ScrapeRequest, ScrapeResponse, validate_url},
};
