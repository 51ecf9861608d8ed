//! Async bookkeeping shared by every page: the idle/loading/error state of an
//! action and the token that discards results once a view is gone.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

use crate::error::{PortalError, Result};

/// State of one async action on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Error(String),
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoadState::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// Marks a view as alive. Cancelling it tells pending loads to drop their
/// results instead of applying them to a view that has been replaced.
#[derive(Debug, Clone)]
pub struct LivenessToken {
    alive: Arc<AtomicBool>,
}

impl LivenessToken {
    pub fn new() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn cancel(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the view is gone.
    pub fn ensure_alive(&self) -> Result<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(PortalError::Cancelled)
        }
    }
}

impl Default for LivenessToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `action` with `state` showing `Loading`, then apply exactly one
/// transition: `Idle` on success, `Error(failure_message)` on failure.
///
/// If `token` was cancelled while the action ran, `state` is left alone and
/// `Err(Cancelled)` is returned; the result is discarded.
pub async fn track<T, F>(
    state: &mut LoadState,
    token: &LivenessToken,
    failure_message: &str,
    action: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    *state = LoadState::Loading;
    let outcome = action.await;

    if !token.is_alive() {
        debug!("view gone, discarding result");
        return Err(PortalError::Cancelled);
    }

    match outcome {
        Ok(value) => {
            *state = LoadState::Idle;
            Ok(value)
        }
        Err(err) => {
            warn!(error = %err, "{failure_message}");
            *state = LoadState::Error(failure_message.to_string());
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn success_clears_loading() {
        let mut state = LoadState::Idle;
        let token = LivenessToken::new();
        let value = track(&mut state, &token, "boom", async { Ok(3) }).await.unwrap();
        assert_eq!(value, 3);
        assert_eq!(state, LoadState::Idle);
    }

    #[tokio::test]
    async fn failure_clears_loading_and_records_message() {
        let mut state = LoadState::Idle;
        let token = LivenessToken::new();
        let result: Result<()> = track(&mut state, &token, "Errore nel caricamento", async {
            Err(PortalError::Network("down".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(state.error(), Some("Errore nel caricamento"));
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn cancelled_view_discards_result() {
        let mut state = LoadState::Idle;
        let token = LivenessToken::new();
        let inner = token.clone();
        let result = track(&mut state, &token, "boom", async move {
            inner.cancel();
            Ok(1)
        })
        .await;
        assert!(matches!(result, Err(PortalError::Cancelled)));
        assert!(token.ensure_alive().is_err());
    }
}
