//! HTTP boundary for the scraping service: health probes and the scrape
//! endpoint.

pub mod scrape;
pub mod server;
pub mod state;

pub use {
    server::{build_app, start_server},
    state::AppState,
};
