//! The consultation flow's steps.
//!
//! A step reads the page input the HTTP layer left in the session store,
//! talks to the backend, and records a [`StepOutcome`] for the HTTP layer to
//! read back. Only `Advanced` moves the session on; every other outcome keeps
//! it on the same page with its input intact.

mod consult;
mod doctor_selection;
mod questionnaire;

pub use consult::ConsultStep;
pub use doctor_selection::DoctorSelectionStep;
pub use questionnaire::QuestionnaireStep;

use tracing::warn;
use triage_flow::{FlowError, NextAction, SessionStore, StepResult};

use crate::error::Result;
use crate::workflow_state::StepOutcome;

pub const QUESTIONNAIRE_STEP: &str = "questionario";
pub const DOCTOR_SELECTION_STEP: &str = "selezione-medico";
pub const CONSULT_STEP: &str = "consulto";

/// Record how a step went and tell the flow what to do next. `done` is the
/// action taken on success.
fn finish(
    store: &SessionStore,
    step_id: &str,
    result: Result<()>,
    done: NextAction,
) -> triage_flow::Result<StepResult> {
    let outcome = match result {
        Ok(()) => StepOutcome::Advanced,
        Err(err) => StepOutcome::from_error(err).map_err(|e| FlowError::StepFailed(e.to_string()))?,
    };
    outcome
        .record(store)
        .map_err(|e| FlowError::StoreError(e.to_string()))?;

    match outcome {
        StepOutcome::Advanced => Ok(StepResult::new(None, done)),
        other => {
            warn!(step = step_id, outcome = ?other, "step did not complete");
            let message = match &other {
                StepOutcome::Invalid { message, .. }
                | StepOutcome::Failed { message }
                | StepOutcome::Blocked { message } => Some(message.clone()),
                StepOutcome::Advanced => None,
            };
            Ok(StepResult::new_with_status(
                None,
                NextAction::WaitForInput,
                message,
            ))
        }
    }
}
