//! Who is logged in for a browser session.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info};
use triage_flow::SessionStore;

use crate::api::TriageApi;
use crate::models::UserProfile;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "user", rename_all = "camelCase")]
pub enum AuthState {
    /// The session check has not answered yet
    Loading,
    Anonymous,
    Authenticated(UserProfile),
}

impl AuthState {
    pub fn user(&self) -> Option<&UserProfile> {
        match self {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, AuthState::Loading)
    }
}

/// Auth state for one browser session. Pages get read access through
/// [`state`](Self::state) and [`user`](Self::user); only the methods here
/// change it.
#[derive(Clone)]
pub struct AuthContext {
    state: Arc<RwLock<AuthState>>,
    checked: Arc<OnceCell<()>>,
}

impl AuthContext {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(AuthState::Loading)),
            checked: Arc::new(OnceCell::new()),
        }
    }

    /// Ask the backend whether this session already has a user. Runs once;
    /// later calls return immediately. Any failure counts as logged out.
    pub async fn initialize(&self, api: &dyn TriageApi) {
        self.checked
            .get_or_init(|| async move {
                let next = match api.current_user().await {
                    Ok(Some(user)) => {
                        info!(user_id = user.id, "existing session found");
                        AuthState::Authenticated(user)
                    }
                    Ok(None) => AuthState::Anonymous,
                    Err(err) => {
                        debug!(error = %err, "session check failed, treating as logged out");
                        AuthState::Anonymous
                    }
                };
                let mut state = self.state.write().await;
                // a login or logout that landed first wins
                if state.is_loading() {
                    *state = next;
                }
            })
            .await;
    }

    pub async fn state(&self) -> AuthState {
        self.state.read().await.clone()
    }

    pub async fn user(&self) -> Option<UserProfile> {
        self.state.read().await.user().cloned()
    }

    /// Record a user the caller has already authenticated with the backend.
    pub async fn login(&self, user: UserProfile) {
        info!(user_id = user.id, "user logged in");
        *self.state.write().await = AuthState::Authenticated(user);
    }

    /// Forget the user and everything this session stored. The backend is not
    /// told; its cookie simply stops being used for this user's data.
    pub async fn logout(&self, store: &SessionStore) {
        *self.state.write().await = AuthState::Anonymous;
        store.clear();
        info!("user logged out, session data cleared");
    }
}

impl Default for AuthContext {
    fn default() -> Self {
        Self::new()
    }
}
