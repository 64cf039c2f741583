//! Config schema types for the server and the browser engine.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperdConfig {
    pub server: ServerConfig,
    pub browser: BrowserConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "0.0.0.0" — the service is meant to
    /// sit behind an internal network boundary, not a public one.
    pub bind: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 3003,
        }
    }
}

/// Browser engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Path to Chrome/Chromium binary (chromiumoxide auto-detects if unset).
    pub chrome_path: Option<String>,
    /// Fixed viewport width applied to every page.
    pub viewport_width: u32,
    /// Fixed viewport height applied to every page.
    pub viewport_height: u32,
    /// Abort sub-requests for media files (images, audio, video).
    pub block_media: bool,
    /// Outbound proxy for all page traffic.
    pub proxy: Option<ProxyConfig>,
    /// Additional Chrome arguments appended after the built-in flag set.
    #[serde(default)]
    pub chrome_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            viewport_width: 1280,
            viewport_height: 800,
            block_media: false,
            proxy: None,
            chrome_args: Vec::new(),
        }
    }
}

/// Outbound proxy settings. Credentials are only used when both username
/// and password are present; otherwise the server address alone is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Proxy server address, e.g. `http://proxy.internal:8080`.
    pub server: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            username: None,
            password: None,
        }
    }
}

impl ProxyConfig {
    /// Username/password pair, present only when both are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = ScraperdConfig::default();
        assert_eq!(cfg.server.port, 3003);
        assert_eq!(cfg.browser.viewport_width, 1280);
        assert!(!cfg.browser.block_media);
        assert!(cfg.browser.proxy.is_none());
    }

    #[test]
    fn proxy_credentials_require_both_fields() {
        let mut proxy = ProxyConfig {
            server: "http://proxy:8080".into(),
            username: Some("u".into()),
            password: None,
        };
        assert!(proxy.credentials().is_none());

        proxy.password = Some("p".into());
        assert_eq!(proxy.credentials(), Some(("u", "p")));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: ScraperdConfig = toml::from_str(
            r#"
            [browser]
            block_media = true
            "#,
        )
        .expect("valid toml");
        assert!(cfg.browser.block_media);
        assert_eq!(cfg.server.bind, "0.0.0.0");
    }
}
