use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{error::Result, store::SessionStore};

/// Result of a step execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Message for the user, if any
    pub response: Option<String>,
    /// Next action to take
    pub next_action: NextAction,
    /// Id of the step that produced this result, filled in by the graph
    #[serde(default)]
    pub step_id: String,
    /// Short description of where the session stands
    pub status_message: Option<String>,
}

impl StepResult {
    pub fn new(response: Option<String>, next_action: NextAction) -> Self {
        Self {
            response,
            next_action,
            step_id: String::new(),
            status_message: None,
        }
    }

    pub fn new_with_status(
        response: Option<String>,
        next_action: NextAction,
        status_message: Option<String>,
    ) -> Self {
        Self {
            response,
            next_action,
            step_id: String::new(),
            status_message,
        }
    }
}

/// What the session should do once a step completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NextAction {
    /// Advance to the next step and hand control back to the caller
    Continue,
    /// Advance to the next step and run it right away
    ContinueAndExecute,
    /// Jump to a specific step by id
    GoTo(String),
    /// Return to the step visited before the current one
    GoBack,
    /// The flow is finished
    End,
    /// Stay on the current step until more input arrives
    WaitForInput,
}

/// A single step of a workflow.
///
/// Steps read their input from, and write their results to, the session
/// store. Returning an error leaves the session on the same step.
#[async_trait]
pub trait Step: Send + Sync {
    /// Unique identifier for this step
    fn id(&self) -> &str;

    /// Execute the step against the session store
    async fn run(&self, store: SessionStore) -> Result<StepResult>;
}
