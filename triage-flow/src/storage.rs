use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{error::Result, store::SessionStore};

/// One browser tab walking through a flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub flow_id: String,
    pub current_step_id: String,
    pub status_message: Option<String>,
    /// Steps visited before the current one, oldest first
    #[serde(default)]
    pub history: Vec<String>,
    /// Steps left behind by back navigation, nearest first
    #[serde(default)]
    pub forward: Vec<String>,
    #[serde(default)]
    pub store: SessionStore,
}

impl Session {
    pub fn new_from_step(sid: String, flow_id: &str, step_id: &str) -> Self {
        Self {
            id: sid,
            flow_id: flow_id.to_string(),
            current_step_id: step_id.to_string(),
            status_message: None,
            history: Vec::new(),
            forward: Vec::new(),
            store: SessionStore::new(),
        }
    }

    /// Move to `step_id`, remembering the current step for back navigation.
    /// A step that ran starts a new path, so forward steps are dropped.
    pub fn advance_to(&mut self, step_id: impl Into<String>) {
        let step_id = step_id.into();
        if step_id != self.current_step_id {
            let previous = std::mem::replace(&mut self.current_step_id, step_id);
            self.history.push(previous);
        }
        self.forward.clear();
    }

    /// Return to the previously visited step. Returns `false` at the first step.
    pub fn rewind(&mut self) -> bool {
        match self.history.pop() {
            Some(previous) => {
                let current = std::mem::replace(&mut self.current_step_id, previous);
                self.forward.insert(0, current);
                true
            }
            None => false,
        }
    }

    /// Whether `step_id` is the current step or one reachable through history.
    pub fn has_visited(&self, step_id: &str) -> bool {
        self.current_step_id == step_id
            || self.history.iter().any(|s| s == step_id)
            || self.forward.iter().any(|s| s == step_id)
    }

    /// Move back or forward along the visited path to `step_id`, keeping the
    /// rest of the path. Returns `false` when `step_id` is not on it.
    pub fn revisit(&mut self, step_id: &str) -> bool {
        if self.current_step_id == step_id {
            return true;
        }
        if let Some(pos) = self.history.iter().position(|s| s == step_id) {
            let mut ahead = self.history.split_off(pos + 1);
            self.history.truncate(pos);
            ahead.push(std::mem::replace(
                &mut self.current_step_id,
                step_id.to_string(),
            ));
            ahead.append(&mut self.forward);
            self.forward = ahead;
            return true;
        }
        if let Some(pos) = self.forward.iter().position(|s| s == step_id) {
            let rest = self.forward.split_off(pos + 1);
            self.forward.truncate(pos);
            let previous = std::mem::replace(&mut self.current_step_id, step_id.to_string());
            self.history.push(previous);
            self.history.append(&mut self.forward);
            self.forward = rest;
            return true;
        }
        false
    }

    /// Jump back to `step_id` and forget everything visited after it.
    pub fn restart_at(&mut self, step_id: impl Into<String>) {
        self.current_step_id = step_id.into();
        self.history.clear();
        self.forward.clear();
        self.status_message = None;
    }
}

/// Trait for storing and retrieving sessions
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save(&self, session: Session) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Session>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory implementation of SessionStorage
#[derive(Default)]
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, Session>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, session: Session) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}
