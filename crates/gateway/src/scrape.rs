//! The scrape endpoint: validation, session readiness, fetch, and the
//! error-to-status mapping.

use {
    axum::{
        extract::{State, rejection::JsonRejection},
        http::StatusCode,
        response::{IntoResponse, Json, Response},
    },
    tracing::{debug, error, warn},
};

use scraperd_browser::{
    ScrapeError, ScrapeRequest, ScrapeResponse, classify, fetch, validate_url,
};

use crate::state::AppState;

pub async fn scrape_handler(
    State(state): State<AppState>,
    body: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        },
    };

    if let Err(e) = validate_url(&request.url) {
        debug!(url = %request.url, error = %e, "rejected scrape request");
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }

    if let Err(e) = state.session.ensure_ready().await {
        error!(error = %e, "browser session unavailable");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    let page = match state.session.acquire_page().await {
        Ok(page) => page,
        Err(e) => {
            error!(error = %e, "failed to open page");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        },
    };

    let outcome = fetch::run(&page, &request).await;

    // The page is per-request; leak nothing regardless of how the fetch
    // went. Close failures are logged and otherwise ignored.
    if let Err(e) = page.close().await {
        warn!(error = %e, "failed to close page");
    }

    match outcome {
        Ok(outcome) => {
            let page_error = classify(outcome.status_code).map(|e| e.to_string());
            Json(ScrapeResponse {
                content: outcome.content,
                page_status_code: outcome.status_code,
                page_error,
            })
            .into_response()
        },
        Err(e @ (ScrapeError::FetchFailed(_) | ScrapeError::SelectorNotFound(_))) => {
            warn!(url = %request.url, error = %e, "scrape failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to fetch the page".to_string(),
            )
        },
        Err(e) => {
            error!(url = %request.url, error = %e, "scrape failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        },
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
