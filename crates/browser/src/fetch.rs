//! Drives a page through navigation, timed waits, the selector check, and
//! content extraction.

use std::time::{Duration, Instant};

use {
    base64::{Engine, engine::general_purpose::STANDARD as BASE64},
    chromiumoxide::{
        Page,
        cdp::browser_protocol::network::{
            GetResponseBodyParams, Headers, RequestId, SetExtraHttpHeadersParams,
        },
    },
    tokio::time::{sleep, timeout},
    tracing::debug,
};

use crate::{
    error::ScrapeError,
    types::{FetchOutcome, ScrapeRequest},
};

/// Predicate defining "navigation complete".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NavStrategy {
    /// Initial DOM and resources settled (the engine's load signal).
    Load,
    /// No network activity for a quiet window.
    NetworkIdle,
}

/// Run a scrape against an already-acquired page.
///
/// The caller owns the page and must close it on every path; nothing here
/// does, success or failure.
pub async fn run(page: &Page, request: &ScrapeRequest) -> Result<FetchOutcome, ScrapeError> {
    if let Some(ref headers) = request.headers
        && !headers.is_empty()
    {
        let value = serde_json::to_value(headers).map_err(|e| ScrapeError::Cdp(e.to_string()))?;
        page.execute(SetExtraHttpHeadersParams::new(Headers::new(value)))
            .await?;
    }

    // Two-strategy navigation: load first, then exactly one fallback to
    // network-idle with the same budget. Each attempt gets the full
    // timeout; there is no combined deadline across the two.
    let budget = Duration::from_millis(request.timeout);
    if let Err(first) = navigate(page, &request.url, NavStrategy::Load, budget).await {
        debug!(url = %request.url, error = %first, "load navigation failed, retrying with network-idle wait");
        if let Err(second) = navigate(page, &request.url, NavStrategy::NetworkIdle, budget).await {
            return Err(ScrapeError::FetchFailed(format!(
                "load: {first}; networkidle: {second}"
            )));
        }
    }

    if request.wait_after_load > 0 {
        sleep(Duration::from_millis(request.wait_after_load)).await;
    }

    // Evaluated strictly after the post-load pause; a missing selector
    // fails the whole operation even though navigation succeeded.
    if let Some(ref selector) = request.check_selector {
        wait_for_selector(page, selector, budget).await?;
    }

    extract(page).await
}

async fn navigate(
    page: &Page,
    url: &str,
    strategy: NavStrategy,
    budget: Duration,
) -> Result<(), String> {
    let attempt = async {
        page.goto(url).await?;
        if strategy == NavStrategy::NetworkIdle {
            page.wait_for_navigation().await?;
        }
        Ok::<_, chromiumoxide::error::CdpError>(())
    };

    match timeout(budget, attempt).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {}ms", budget.as_millis())),
    }
}

/// Poll for a matching element until the deadline.
async fn wait_for_selector(
    page: &Page,
    selector: &str,
    budget: Duration,
) -> Result<(), ScrapeError> {
    let quoted =
        serde_json::to_string(selector).map_err(|e| ScrapeError::Cdp(e.to_string()))?;
    let check_js = format!("document.querySelector({quoted}) !== null");

    let deadline = Instant::now() + budget;
    let interval = Duration::from_millis(100);

    while Instant::now() < deadline {
        let found: bool = page
            .evaluate(check_js.as_str())
            .await?
            .into_value()
            .unwrap_or(false);
        if found {
            return Ok(());
        }
        sleep(interval).await;
    }

    Err(ScrapeError::SelectorNotFound(selector.to_string()))
}

/// Pull content plus response metadata off the navigated page.
///
/// Structured payloads (json/plain) come from the raw response body;
/// rendering them through the HTML layer would corrupt them. Everything
/// else is the serialized rendered document.
async fn extract(page: &Page) -> Result<FetchOutcome, ScrapeError> {
    let Some(navigation) = page.wait_for_navigation_response().await? else {
        // No response object at all (rare; e.g. about:blank targets).
        return Ok(FetchOutcome {
            content: page.content().await?,
            status_code: None,
            headers: None,
        });
    };

    let Some(ref response) = navigation.response else {
        return Ok(FetchOutcome {
            content: page.content().await?,
            status_code: None,
            headers: None,
        });
    };

    let status_code = u16::try_from(response.status).ok();
    let headers = headers_to_map(&response.headers);

    let content = if is_raw_content_type(&response.mime_type) {
        match raw_body(page, navigation.request_id().clone()).await {
            Ok(body) => body,
            Err(e) => {
                debug!(error = %e, "raw body read failed, falling back to rendered document");
                page.content().await?
            },
        }
    } else {
        page.content().await?
    };

    Ok(FetchOutcome {
        content,
        status_code,
        headers,
    })
}

async fn raw_body(page: &Page, request_id: RequestId) -> Result<String, ScrapeError> {
    let body = page.execute(GetResponseBodyParams::new(request_id)).await?;
    if body.base64_encoded {
        let bytes = BASE64
            .decode(body.body.as_bytes())
            .map_err(|e| ScrapeError::Cdp(e.to_string()))?;
        // Lossy by choice: a stray byte should not turn a fetched page
        // into a hard error.
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    } else {
        Ok(body.body.clone())
    }
}

fn is_raw_content_type(mime_type: &str) -> bool {
    let mime_type = mime_type.to_ascii_lowercase();
    mime_type.contains("application/json") || mime_type.contains("text/plain")
}

fn headers_to_map(
    headers: &Headers,
) -> Option<std::collections::HashMap<String, String>> {
    let value = serde_json::to_value(headers).ok()?;
    let object = value.as_object()?;
    Some(
        object
            .iter()
            .map(|(k, v)| {
                let v = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                (k.clone(), v)
            })
            .collect(),
    )
}
