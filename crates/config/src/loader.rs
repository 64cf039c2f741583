use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    schema::{ProxyConfig, ScraperdConfig},
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "scraperd.toml",
    "scraperd.yaml",
    "scraperd.yml",
    "scraperd.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<ScraperdConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./scraperd.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/scraperd/scraperd.{toml,yaml,yml,json}` (user-global)
///
/// Returns defaults (with env overrides applied) if no file is found.
pub fn discover_and_load() -> ScraperdConfig {
    let mut config = if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                ScraperdConfig::default()
            },
        }
    } else {
        debug!("no config file found, using defaults");
        ScraperdConfig::default()
    };
    apply_env_overrides(&mut config);
    config
}

/// Apply the plain environment overrides the service has historically
/// consumed. These win over file values so a containerized deployment can
/// be configured entirely through the environment.
pub fn apply_env_overrides(config: &mut ScraperdConfig) {
    if let Ok(port) = std::env::var("PORT")
        && let Ok(port) = port.parse()
    {
        config.server.port = port;
    }

    if let Ok(block) = std::env::var("BLOCK_MEDIA") {
        config.browser.block_media = matches!(block.to_lowercase().as_str(), "true" | "1" | "yes");
    }

    if let Ok(path) = std::env::var("CHROME_PATH") {
        config.browser.chrome_path = Some(path);
    }

    if let Ok(server) = std::env::var("PROXY_SERVER") {
        let proxy = config.browser.proxy.get_or_insert_with(ProxyConfig::default);
        proxy.server = server;
        proxy.username = std::env::var("PROXY_USERNAME").ok().or(proxy.username.take());
        proxy.password = std::env::var("PROXY_PASSWORD").ok().or(proxy.password.take());
    }
}

fn find_config_file() -> Option<PathBuf> {
    // Project-local
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    // User-global: ~/.config/scraperd/
    if let Some(dirs) = directories::ProjectDirs::from("", "", "scraperd") {
        let config_dir = dirs.config_dir();
        for name in CONFIG_FILENAMES {
            let p = config_dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<ScraperdConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn loads_toml_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("scraperd.toml");
        let mut f = std::fs::File::create(&path).expect("create");
        writeln!(f, "[server]\nport = 9000\n[browser]\nblock_media = true").expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.server.port, 9000);
        assert!(cfg.browser.block_media);
    }

    #[test]
    fn loads_json_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("scraperd.json");
        std::fs::write(&path, r#"{"server": {"bind": "127.0.0.1"}}"#).expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.server.bind, "127.0.0.1");
        assert_eq!(cfg.server.port, 3003);
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("scraperd.ini");
        std::fs::write(&path, "port=1").expect("write");

        assert!(load_config(&path).is_err());
    }
}
