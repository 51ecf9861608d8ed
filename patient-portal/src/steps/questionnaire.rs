use async_trait::async_trait;
use chrono::Local;
use std::sync::Arc;
use tracing::info;
use triage_flow::{NextAction, SessionStore, Step, StepResult};

use super::{QUESTIONNAIRE_STEP, finish};
use crate::api::TriageApi;
use crate::error::Result;
use crate::liveness::{LivenessToken, LoadState, track};
use crate::questionnaire::{QuestionnaireForm, SUBMIT_FAILED};
use crate::workflow_state::{WorkflowState, session_keys};

/// Validates the saved questionnaire form and creates the consultation.
pub struct QuestionnaireStep {
    api: Arc<dyn TriageApi>,
    token: LivenessToken,
}

impl QuestionnaireStep {
    pub fn new(api: Arc<dyn TriageApi>, token: LivenessToken) -> Self {
        Self { api, token }
    }

    async fn submit(&self, store: &SessionStore) -> Result<()> {
        let form: QuestionnaireForm = store
            .get_json(session_keys::QUESTIONNAIRE_FORM)?
            .unwrap_or_default();
        let today = Local::now().date_naive();
        form.validate(today)?;

        let request = form.to_request(today);
        let mut state = LoadState::Idle;
        let response = track(
            &mut state,
            &self.token,
            SUBMIT_FAILED,
            self.api.submit_consultation(&request),
        )
        .await
        .map_err(|e| e.for_page(SUBMIT_FAILED))?;

        WorkflowState::begin_consultation(store, &response, &form.patient_display(today))?;
        info!(consultation_id = ?response.id, urgency = ?response.urgency, "consultation created");
        Ok(())
    }
}

#[async_trait]
impl Step for QuestionnaireStep {
    fn id(&self) -> &str {
        QUESTIONNAIRE_STEP
    }

    async fn run(&self, store: SessionStore) -> triage_flow::Result<StepResult> {
        let result = self.submit(&store).await;
        finish(&store, self.id(), result, NextAction::Continue)
    }
}
