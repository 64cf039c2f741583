use std::sync::Arc;

use scraperd_browser::SessionManager;

/// Shared app state injected into every handler. The session manager is
/// the one owned singleton — no ambient globals.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionManager>,
}

impl AppState {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }
}
