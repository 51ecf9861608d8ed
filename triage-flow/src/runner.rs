//! FlowRunner – loads a session, executes exactly **one** step, and persists the
//! updated session back to storage.
//!
//! One HTTP request maps to one step: the caller writes the user's input into the
//! session store, calls [`FlowRunner::run`], and renders whatever the session now
//! points at. Use [`Flow::execute_session`] directly when you need to inspect the
//! session before it is saved.

use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    error::{FlowError, Result},
    flow::{ExecutionResult, Flow},
    storage::{Session, SessionStorage},
};

/// Orchestrates the _load → execute → save_ pattern.
#[derive(Clone)]
pub struct FlowRunner {
    flow: Arc<Flow>,
    storage: Arc<dyn SessionStorage>,
}

impl FlowRunner {
    pub fn new(flow: Arc<Flow>, storage: Arc<dyn SessionStorage>) -> Self {
        Self { flow, storage }
    }

    pub fn flow(&self) -> &Arc<Flow> {
        &self.flow
    }

    pub fn storage(&self) -> &Arc<dyn SessionStorage> {
        &self.storage
    }

    /// Create and persist a session positioned on the flow's start step.
    pub async fn start(&self, session_id: String) -> Result<Session> {
        let start = self
            .flow
            .start_step_id()
            .ok_or_else(|| FlowError::StepNotFound("<start>".to_string()))?;
        let session = Session::new_from_step(session_id, &self.flow.id, &start);
        self.storage.save(session.clone()).await?;
        info!(session_id = %session.id, step = %start, "session started");
        Ok(session)
    }

    pub async fn load(&self, session_id: &str) -> Result<Session> {
        self.storage
            .get(session_id)
            .await?
            .ok_or_else(|| FlowError::SessionNotFound(session_id.to_string()))
    }

    /// Execute **exactly one** step for `session_id` and persist the session.
    ///
    /// When the step fails nothing is saved, so the session stays on the same
    /// step with its store as the step left it.
    pub async fn run(&self, session_id: &str) -> Result<ExecutionResult> {
        let mut session = self.load(session_id).await?;
        let result = self.flow.execute_session(&mut session).await?;
        self.storage.save(session).await?;
        Ok(result)
    }

    /// Browser-style back navigation without running any step.
    pub async fn go_back(&self, session_id: &str) -> Result<Session> {
        let mut session = self.load(session_id).await?;
        session.rewind();
        self.storage.save(session.clone()).await?;
        Ok(session)
    }

    /// Move the session to `step_id` if it was visited before (or is the start
    /// step). Steps on either side of it stay reachable, so a user can reopen
    /// an earlier page and come forward again.
    pub async fn navigate(&self, session_id: &str, step_id: &str) -> Result<Session> {
        let mut session = self.load(session_id).await?;
        if session.current_step_id != step_id {
            if session.revisit(step_id) {
                debug!(session_id, step = step_id, "revisited step");
            } else if self.flow.start_step_id().as_deref() == Some(step_id) {
                session.restart_at(step_id);
            } else {
                return Err(FlowError::Rejected(format!(
                    "step '{step_id}' has not been reached yet"
                )));
            }
            self.storage.save(session.clone()).await?;
        }
        Ok(session)
    }
}
