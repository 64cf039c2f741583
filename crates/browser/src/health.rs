//! Session lifecycle state machine backing the health probes.

use std::fmt;

use {tokio::sync::RwLock, tracing::debug};

/// Lifecycle state of the browser session.
///
/// Transitions are forward-only, with two exceptions: `Failed` may re-enter
/// `Initializing` (retry), and shutdown resets any state to
/// `Uninitialized`. Nothing else leaves `Ready`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Failed(String),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initializing => write!(f, "initializing"),
            Self::Ready => write!(f, "ready"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Readiness snapshot consumed by the HTTP probes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Initializing,
    Failed(String),
    /// Uninitialized with no initialization in flight. Observing this is
    /// the cue for the probe to kick off a background initialization.
    Unknown,
}

/// Guarded session state with transition enforcement.
///
/// Liveness is deliberately not represented here: the process answering at
/// all is the liveness signal, independent of session state.
#[derive(Debug, Default)]
pub struct HealthState {
    state: RwLock<SessionState>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Uninitialized
    }
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// Enter `Initializing`. Returns false (and leaves the state untouched)
    /// when the session is already initializing or ready.
    pub async fn begin_init(&self) -> bool {
        let mut state = self.state.write().await;
        match *state {
            SessionState::Uninitialized | SessionState::Failed(_) => {
                *state = SessionState::Initializing;
                true
            },
            ref current => {
                debug!(state = %current, "ignoring init transition");
                false
            },
        }
    }

    /// Complete initialization. Only valid from `Initializing`.
    pub async fn mark_ready(&self) {
        let mut state = self.state.write().await;
        if *state == SessionState::Initializing {
            *state = SessionState::Ready;
        } else {
            debug!(state = %&*state, "ignoring ready transition");
        }
    }

    /// Record an initialization failure. Only valid from `Initializing`.
    pub async fn mark_failed(&self, reason: impl Into<String>) {
        let mut state = self.state.write().await;
        if *state == SessionState::Initializing {
            *state = SessionState::Failed(reason.into());
        } else {
            debug!(state = %&*state, "ignoring failed transition");
        }
    }

    /// Shutdown reset: any state back to `Uninitialized`.
    pub async fn reset(&self) {
        *self.state.write().await = SessionState::Uninitialized;
    }

    pub async fn readiness(&self) -> Readiness {
        match self.state().await {
            SessionState::Ready => Readiness::Ready,
            SessionState::Initializing => Readiness::Initializing,
            SessionState::Failed(reason) => Readiness::Failed(reason),
            SessionState::Uninitialized => Readiness::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initial_state_is_unknown() {
        let health = HealthState::new();
        assert_eq!(health.state().await, SessionState::Uninitialized);
        assert_eq!(health.readiness().await, Readiness::Unknown);
    }

    #[tokio::test]
    async fn normal_lifecycle() {
        let health = HealthState::new();
        assert!(health.begin_init().await);
        assert_eq!(health.readiness().await, Readiness::Initializing);
        health.mark_ready().await;
        assert_eq!(health.readiness().await, Readiness::Ready);
    }

    #[tokio::test]
    async fn begin_init_refused_while_initializing() {
        let health = HealthState::new();
        assert!(health.begin_init().await);
        assert!(!health.begin_init().await);
        assert_eq!(health.state().await, SessionState::Initializing);
    }

    #[tokio::test]
    async fn begin_init_refused_when_ready() {
        let health = HealthState::new();
        health.begin_init().await;
        health.mark_ready().await;
        assert!(!health.begin_init().await);
        assert_eq!(health.state().await, SessionState::Ready);
    }

    #[tokio::test]
    async fn failed_can_retry() {
        let health = HealthState::new();
        health.begin_init().await;
        health.mark_failed("chrome exploded").await;
        assert_eq!(
            health.readiness().await,
            Readiness::Failed("chrome exploded".into())
        );
        assert!(health.begin_init().await);
    }

    #[tokio::test]
    async fn failure_outside_init_is_ignored() {
        let health = HealthState::new();
        health.begin_init().await;
        health.mark_ready().await;
        health.mark_failed("late failure").await;
        assert_eq!(health.state().await, SessionState::Ready);
    }

    #[tokio::test]
    async fn reset_returns_to_uninitialized() {
        let health = HealthState::new();
        health.begin_init().await;
        health.mark_ready().await;
        health.reset().await;
        assert_eq!(health.state().await, SessionState::Uninitialized);
    }
}
