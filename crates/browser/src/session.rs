//! Browser session lifecycle: single engine process, single-flight
//! initialization, page acquisition, shutdown.

use std::time::Duration;

use {
    chromiumoxide::{
        Browser, BrowserConfig as CdpBrowserConfig, Page,
        cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams,
        handler::viewport::Viewport,
    },
    futures::StreamExt,
    tokio::{
        sync::{Mutex, RwLock},
        task::JoinHandle,
    },
    tracing::{debug, info, warn},
};

use crate::{
    error::ScrapeError,
    health::{HealthState, Readiness, SessionState},
    interception::InterceptionPolicy,
    types::BrowserConfig,
};

/// Realistic desktop client identities; one is picked per session launch.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.4; rv:125.0) Gecko/20100101 Firefox/125.0",
];

/// Transport-level CDP command timeout. The engine default is 30 s, which
/// would cap long per-request budgets before the caller's own timeout
/// fires; this must stay above any budget the service is expected to
/// honor.
const CDP_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// The launched engine process and its CDP event pump.
struct Engine {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

/// Owns the single browser process for the service lifetime.
///
/// All concurrent requests share the one engine; each gets its own isolated
/// page from [`acquire_page`](Self::acquire_page). Only `initialize` is
/// guarded; page-level operations rely on each page's natural isolation.
pub struct SessionManager {
    config: BrowserConfig,
    policy: InterceptionPolicy,
    health: HealthState,
    engine: RwLock<Option<Engine>>,
    init_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(config: BrowserConfig) -> Self {
        let policy =
            InterceptionPolicy::new(config.block_media, config.proxy_credentials.clone());
        Self {
            config,
            policy,
            health: HealthState::new(),
            engine: RwLock::new(None),
            init_lock: Mutex::new(()),
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        self.health.state().await
    }

    /// Readiness snapshot for the HTTP probe.
    pub async fn readiness(&self) -> Readiness {
        self.health.readiness().await
    }

    /// Launch the engine process and mark the session ready.
    ///
    /// Single-flight: a call made while another is in progress returns
    /// immediately without enqueueing or waiting. Failures are recorded in
    /// the session state, never propagated — callers inspect state.
    pub async fn initialize(&self) {
        let Ok(_guard) = self.init_lock.try_lock() else {
            debug!("browser initialization already in flight");
            return;
        };

        if self.health.state().await == SessionState::Ready {
            return;
        }
        self.health.begin_init().await;

        match self.launch().await {
            Ok(engine) => {
                *self.engine.write().await = Some(engine);
                self.health.mark_ready().await;
                info!("browser session ready");
            },
            Err(e) => {
                warn!(error = %e, "browser session initialization failed");
                self.health.mark_failed(e.to_string()).await;
            },
        }
    }

    /// No-op when ready; otherwise attempt one initialization and re-check.
    pub async fn ensure_ready(&self) -> Result<(), ScrapeError> {
        if self.health.state().await == SessionState::Ready {
            return Ok(());
        }

        self.initialize().await;

        match self.health.state().await {
            SessionState::Ready => Ok(()),
            SessionState::Failed(reason) => Err(ScrapeError::SessionNotReady(reason)),
            state => Err(ScrapeError::SessionNotReady(format!(
                "browser session is {state}"
            ))),
        }
    }

    /// Create a fresh isolated page with the interception policy installed.
    pub async fn acquire_page(&self) -> Result<Page, ScrapeError> {
        if self.health.state().await != SessionState::Ready {
            return Err(ScrapeError::SessionNotReady(
                "browser session is not ready".to_string(),
            ));
        }

        let guard = self.engine.read().await;
        let engine = guard.as_ref().ok_or_else(|| {
            ScrapeError::SessionNotReady("browser session is not ready".to_string())
        })?;

        let page = engine.browser.new_page("about:blank").await?;

        // Browser-level viewport is not always applied to new pages.
        let viewport_cmd = SetDeviceMetricsOverrideParams::builder()
            .width(self.config.viewport_width)
            .height(self.config.viewport_height)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(ScrapeError::Cdp)?;
        if let Err(e) = page.execute(viewport_cmd).await {
            warn!(error = %e, "failed to set page viewport");
        }

        // Policy goes in before any navigation on the page.
        self.policy.install(&page).await?;

        Ok(page)
    }

    /// Best-effort shutdown: close the browser connection, then the
    /// process. Idempotent; a failure of either step does not block the
    /// other.
    pub async fn shutdown(&self) {
        // Wait out any in-flight initialization first, so a freshly
        // launched engine cannot be written back after the teardown.
        let _guard = self.init_lock.lock().await;

        let engine = self.engine.write().await.take();
        if let Some(mut engine) = engine {
            if let Err(e) = engine.browser.close().await {
                warn!(error = %e, "failed to close browser cleanly");
            }
            if let Some(Err(e)) = engine.browser.kill().await {
                warn!(error = %e, "failed to kill browser process");
            }
            engine.handler_task.abort();
            info!("browser session shut down");
        }
        self.health.reset().await;
    }

    async fn launch(&self) -> Result<Engine, ScrapeError> {
        let user_agent = random_user_agent();
        info!(
            user_agent,
            viewport_width = self.config.viewport_width,
            viewport_height = self.config.viewport_height,
            proxy = self.config.proxy_server.as_deref().unwrap_or("none"),
            "launching browser"
        );

        let mut builder = CdpBrowserConfig::builder()
            .request_timeout(CDP_REQUEST_TIMEOUT)
            .viewport(Viewport {
                width: self.config.viewport_width,
                height: self.config.viewport_height,
                device_scale_factor: Some(1.0),
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            })
            .arg(format!("--user-agent={user_agent}"));

        if let Some(ref path) = self.config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        if let Some(ref server) = self.config.proxy_server {
            builder = builder.arg(format!("--proxy-server={server}"));
        }

        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        // Container-safe flag set: headless Chrome inside minimal images
        // has no usable GPU, sandbox helpers, or sizable /dev/shm.
        builder = builder
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-software-rasterizer")
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox");

        let config = builder.build().map_err(ScrapeError::LaunchFailed)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::LaunchFailed(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!(?event, "browser event");
            }
            // Handler exits when the connection closes.
        });

        Ok(Engine {
            browser,
            handler_task,
        })
    }
}

fn random_user_agent() -> &'static str {
    use rand::Rng;
    let mut rng = rand::rng();
    USER_AGENTS[rng.random_range(0..USER_AGENTS.len())]
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn unlaunchable_manager() -> SessionManager {
        let config = BrowserConfig {
            chrome_path: Some("/nonexistent/chrome-binary".to_string()),
            ..BrowserConfig::default()
        };
        SessionManager::new(config)
    }

    /// A fake engine binary that holds the launch in flight for a couple
    /// of seconds and then fails (never prints a devtools endpoint).
    #[cfg(unix)]
    fn slow_fake_engine(dir: &tempfile::TempDir) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("slow-engine");
        std::fs::write(&path, "#!/bin/sh\nsleep 2\n").expect("write script");
        let mut perms = std::fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("chmod");
        path.display().to_string()
    }

    #[test]
    fn cdp_transport_timeout_outlives_request_budgets() {
        // The transport must never be the thing that bounds a navigation;
        // per-request budgets are.
        assert!(CDP_REQUEST_TIMEOUT >= Duration::from_secs(120));
    }

    #[test]
    fn user_agents_look_like_browsers() {
        for _ in 0..20 {
            assert!(random_user_agent().starts_with("Mozilla/5.0"));
        }
    }

    #[tokio::test]
    async fn fresh_manager_reports_unknown() {
        let manager = unlaunchable_manager();
        assert_eq!(manager.readiness().await, Readiness::Unknown);
    }

    #[tokio::test]
    async fn acquire_page_requires_ready_session() {
        let manager = unlaunchable_manager();
        assert!(matches!(
            manager.acquire_page().await,
            Err(ScrapeError::SessionNotReady(_))
        ));
    }

    #[tokio::test]
    async fn failed_launch_recorded_not_propagated() {
        let manager = unlaunchable_manager();
        manager.initialize().await;
        assert!(matches!(
            manager.readiness().await,
            Readiness::Failed(_)
        ));
    }

    #[tokio::test]
    async fn ensure_ready_surfaces_failure_reason() {
        let manager = unlaunchable_manager();
        let err = manager.ensure_ready().await.expect_err("cannot launch");
        assert!(matches!(err, ScrapeError::SessionNotReady(_)));
    }

    #[tokio::test]
    async fn ensure_ready_retries_after_failure() {
        let manager = unlaunchable_manager();
        manager.initialize().await;
        // Failed state re-enters Initializing on the next attempt and
        // fails again with a fresh reason rather than giving up.
        let err = manager.ensure_ready().await.expect_err("cannot launch");
        assert!(matches!(err, ScrapeError::SessionNotReady(_)));
        assert!(matches!(manager.state().await, SessionState::Failed(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn concurrent_initialize_is_single_flight() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = Arc::new(SessionManager::new(BrowserConfig {
            chrome_path: Some(slow_fake_engine(&dir)),
            ..BrowserConfig::default()
        }));

        let leader = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.initialize().await })
        };
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(manager.state().await, SessionState::Initializing);

        // Late callers bounce off the in-flight attempt instead of
        // queueing a second launch; none of them may touch the state.
        let mut followers = Vec::new();
        for _ in 0..8 {
            let manager = Arc::clone(&manager);
            followers.push(tokio::spawn(async move { manager.initialize().await }));
        }
        for follower in followers {
            tokio::time::timeout(Duration::from_millis(500), follower)
                .await
                .expect("follower must not wait on the in-flight launch")
                .expect("join");
        }
        assert_eq!(manager.state().await, SessionState::Initializing);

        // Exactly one launch, exactly one recorded failure.
        leader.await.expect("join");
        assert!(matches!(manager.state().await, SessionState::Failed(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shutdown_waits_for_inflight_initialization() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = Arc::new(SessionManager::new(BrowserConfig {
            chrome_path: Some(slow_fake_engine(&dir)),
            ..BrowserConfig::default()
        }));

        let leader = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.initialize().await })
        };
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(manager.state().await, SessionState::Initializing);

        // Shutdown must block until the launch attempt settles, so an
        // engine can never be written back after the teardown.
        let started = std::time::Instant::now();
        manager.shutdown().await;
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(manager.state().await, SessionState::Uninitialized);

        leader.await.expect("join");
        assert_eq!(manager.state().await, SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn shutdown_without_engine_is_noop() {
        let manager = unlaunchable_manager();
        manager.shutdown().await;
        manager.shutdown().await;
        assert_eq!(manager.state().await, SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn shutdown_resets_failed_state() {
        let manager = unlaunchable_manager();
        manager.initialize().await;
        manager.shutdown().await;
        assert_eq!(manager.state().await, SessionState::Uninitialized);
    }

    #[tokio::test]
    #[ignore] // Needs a local Chrome/Chromium install.
    async fn full_session_lifecycle() {
        let manager = SessionManager::new(BrowserConfig::default());
        manager.ensure_ready().await.expect("launch");
        assert_eq!(manager.readiness().await, Readiness::Ready);

        let page = manager.acquire_page().await.expect("page");
        page.close().await.expect("close page");

        manager.shutdown().await;
        assert_eq!(manager.state().await, SessionState::Uninitialized);
    }
}
