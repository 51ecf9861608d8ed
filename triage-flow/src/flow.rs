use dashmap::DashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use crate::{
    error::{FlowError, Result},
    step::{NextAction, Step, StepResult},
    storage::Session,
    store::SessionStore,
};

/// Type alias for edge condition functions
pub type EdgeCondition = Arc<dyn Fn(&SessionStore) -> bool + Send + Sync>;

/// Edge between steps in the flow
#[derive(Clone)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub condition: Option<EdgeCondition>,
}

/// A set of steps connected by edges
pub struct Flow {
    pub id: String,
    steps: DashMap<String, Arc<dyn Step>>,
    edges: RwLock<Vec<Edge>>,
    start_step_id: RwLock<Option<String>>,
}

impl Flow {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            steps: DashMap::new(),
            edges: RwLock::new(Vec::new()),
            start_step_id: RwLock::new(None),
        }
    }

    /// Add a step. The first step added becomes the start step.
    pub fn add_step(&self, step: Arc<dyn Step>) -> &Self {
        let step_id = step.id().to_string();
        let is_first = self.steps.is_empty();
        self.steps.insert(step_id.clone(), step);

        if is_first {
            if let Ok(mut start) = self.start_step_id.write() {
                *start = Some(step_id);
            }
        }
        self
    }

    pub fn set_start_step(&self, step_id: impl Into<String>) -> &Self {
        let step_id = step_id.into();
        if self.steps.contains_key(&step_id) {
            if let Ok(mut start) = self.start_step_id.write() {
                *start = Some(step_id);
            }
        }
        self
    }

    pub fn add_edge(&self, from: impl Into<String>, to: impl Into<String>) -> &Self {
        if let Ok(mut edges) = self.edges.write() {
            edges.push(Edge {
                from: from.into(),
                to: to.into(),
                condition: None,
            });
        }
        self
    }

    pub fn add_conditional_edge<F>(
        &self,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: F,
    ) -> &Self
    where
        F: Fn(&SessionStore) -> bool + Send + Sync + 'static,
    {
        if let Ok(mut edges) = self.edges.write() {
            edges.push(Edge {
                from: from.into(),
                to: to.into(),
                condition: Some(Arc::new(condition)),
            });
        }
        self
    }

    /// Run the session's current step and move the session according to its
    /// [`NextAction`]. A failing step leaves the session where it was.
    pub async fn execute_session(&self, session: &mut Session) -> Result<ExecutionResult> {
        let result = self
            .execute_single_step(&session.current_step_id, session.store.clone())
            .await?;

        session.status_message = result.status_message.clone();

        match &result.next_action {
            NextAction::Continue => {
                if let Some(next_step_id) = self.find_next_step(&result.step_id, &session.store) {
                    session.advance_to(next_step_id);
                    Ok(ExecutionResult::waiting(result.response))
                } else {
                    // nothing after this step: the flow is done
                    Ok(ExecutionResult::completed(result.response))
                }
            }
            NextAction::ContinueAndExecute => {
                if let Some(next_step_id) = self.find_next_step(&result.step_id, &session.store) {
                    session.advance_to(next_step_id);
                    Box::pin(self.execute_session(session)).await
                } else {
                    Ok(ExecutionResult::completed(result.response))
                }
            }
            NextAction::WaitForInput => Ok(ExecutionResult::waiting(result.response)),
            NextAction::End => Ok(ExecutionResult::completed(result.response)),
            NextAction::GoTo(target_id) => {
                if self.steps.contains_key(target_id) {
                    session.advance_to(target_id.clone());
                    Ok(ExecutionResult::waiting(result.response))
                } else {
                    Err(FlowError::StepNotFound(target_id.clone()))
                }
            }
            NextAction::GoBack => {
                if !session.rewind() {
                    warn!(step = %result.step_id, "GoBack requested at the first step");
                }
                Ok(ExecutionResult::waiting(result.response))
            }
        }
    }

    async fn execute_single_step(&self, step_id: &str, store: SessionStore) -> Result<StepResult> {
        let step = self
            .get_step(step_id)
            .ok_or_else(|| FlowError::StepNotFound(step_id.to_string()))?;

        debug!(flow = %self.id, step = %step_id, "running step");
        let mut result = step.run(store).await?;
        result.step_id = step_id.to_string();
        Ok(result)
    }

    /// Find the next step based on edges and conditions. Edges are checked in
    /// insertion order; an unconditional edge always matches.
    pub fn find_next_step(&self, current_step_id: &str, store: &SessionStore) -> Option<String> {
        let edges = self.edges.read().ok()?;
        edges
            .iter()
            .filter(|edge| edge.from == current_step_id)
            .find(|edge| edge.condition.as_ref().is_none_or(|condition| condition(store)))
            .map(|edge| edge.to.clone())
    }

    pub fn start_step_id(&self) -> Option<String> {
        self.start_step_id.read().ok().and_then(|start| start.clone())
    }

    pub fn get_step(&self, step_id: &str) -> Option<Arc<dyn Step>> {
        self.steps.get(step_id).map(|entry| entry.clone())
    }

    pub fn contains_step(&self, step_id: &str) -> bool {
        self.steps.contains_key(step_id)
    }
}

/// Builder for creating flows
pub struct FlowBuilder {
    flow: Flow,
}

impl FlowBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            flow: Flow::new(id),
        }
    }

    pub fn add_step(self, step: Arc<dyn Step>) -> Self {
        self.flow.add_step(step);
        self
    }

    pub fn add_edge(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.flow.add_edge(from, to);
        self
    }

    pub fn add_conditional_edge<F>(
        self,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: F,
    ) -> Self
    where
        F: Fn(&SessionStore) -> bool + Send + Sync + 'static,
    {
        self.flow.add_conditional_edge(from, to, condition);
        self
    }

    pub fn set_start_step(self, step_id: impl Into<String>) -> Self {
        self.flow.set_start_step(step_id);
        self
    }

    pub fn build(self) -> Flow {
        self.flow
    }
}

/// Outcome of running one step of a session
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub response: Option<String>,
    pub status: ExecutionStatus,
}

impl ExecutionResult {
    fn waiting(response: Option<String>) -> Self {
        Self {
            response,
            status: ExecutionStatus::WaitingForInput,
        }
    }

    fn completed(response: Option<String>) -> Self {
        Self {
            response,
            status: ExecutionStatus::Completed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Waiting for user input to continue
    WaitingForInput,
    /// Flow completed
    Completed,
}
