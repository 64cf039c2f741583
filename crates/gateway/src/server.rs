use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        extract::State,
        http::StatusCode,
        response::{IntoResponse, Json},
        routing::{get, post},
    },
    tower_http::cors::{Any, CorsLayer},
    tracing::info,
};

use scraperd_browser::Readiness;

use crate::{scrape::scrape_handler, state::AppState};

/// Build the router (shared between production startup and tests).
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health/liveness", get(liveness_handler))
        .route("/health/readiness", get(readiness_handler))
        .route("/scrape", post(scrape_handler))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the task is dropped or the listener fails.
pub async fn start_server(bind: &str, port: u16, state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "scrape API listening");
    axum::serve(listener, build_app(state)).await?;
    Ok(())
}

// ── Health probes ────────────────────────────────────────────────────────────

/// The process answering at all is the liveness signal, independent of
/// session state.
async fn liveness_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}

async fn readiness_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.readiness().await {
        Readiness::Ready => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "ready" })),
        ),
        Readiness::Initializing => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not ready",
                "message": "browser session is initializing",
            })),
        ),
        Readiness::Failed(reason) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not ready",
                "error": reason,
            })),
        ),
        Readiness::Unknown => {
            // Kick off initialization without making the probe wait on it;
            // the single-flight guard absorbs concurrent probes.
            let session = Arc::clone(&state.session);
            tokio::spawn(async move { session.initialize().await });

            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "not ready",
                    "message": "browser session not started",
                })),
            )
        },
    }
}
