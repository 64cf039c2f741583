//! Configuration loading and env substitution for the scraping service.
//!
//! Config files: `scraperd.toml`, `scraperd.yaml`, or `scraperd.json`
//! Searched in `./` then `~/.config/scraperd/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values, plus plain
//! environment overrides for the knobs the service has always taken from
//! the environment (`PORT`, `BLOCK_MEDIA`, `PROXY_SERVER`, …).

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{apply_env_overrides, discover_and_load, load_config},
    schema::{BrowserConfig, ProxyConfig, ScraperdConfig, ServerConfig},
};
