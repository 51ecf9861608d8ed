use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use triage_flow::{NextAction, SessionStore, Step, StepResult};

use super::{CONSULT_STEP, finish};
use crate::api::TriageApi;
use crate::consult::{ConsultStatus, ConsultView};
use crate::error::Result;
use crate::liveness::LivenessToken;
use crate::workflow_state::session_keys;

/// Last step: refresh the consultation and keep the view for the page. The
/// flow completes once the doctor has answered.
pub struct ConsultStep {
    api: Arc<dyn TriageApi>,
    token: LivenessToken,
}

impl ConsultStep {
    pub fn new(api: Arc<dyn TriageApi>, token: LivenessToken) -> Self {
        Self { api, token }
    }

    async fn refresh(&self, store: &SessionStore) -> Result<ConsultStatus> {
        let view = ConsultView::load(store, self.api.as_ref(), &self.token).await?;
        store.set_json(session_keys::CONSULT_VIEW, &view)?;
        debug!(status = ?view.status, "consult view refreshed");
        Ok(view.status)
    }
}

#[async_trait]
impl Step for ConsultStep {
    fn id(&self) -> &str {
        CONSULT_STEP
    }

    async fn run(&self, store: SessionStore) -> triage_flow::Result<StepResult> {
        let result = self.refresh(&store).await;
        let done = match &result {
            Ok(ConsultStatus::ResponseReceived) => NextAction::End,
            _ => NextAction::WaitForInput,
        };
        finish(&store, self.id(), result.map(|_| ()), done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockApi;
    use crate::consult::NO_QUESTIONNAIRE;
    use crate::models::ConsultationResponse;
    use crate::workflow_state::{PatientDisplay, StepOutcome, WorkflowState};

    fn store_with_consultation() -> SessionStore {
        let store = SessionStore::new();
        WorkflowState::begin_consultation(
            &store,
            &ConsultationResponse {
                id: Some(42),
                ..Default::default()
            },
            &PatientDisplay::default(),
        )
        .unwrap();
        store
    }

    #[tokio::test]
    async fn waits_until_the_doctor_answers() {
        let api = MockApi::seeded();
        let store = store_with_consultation();
        let step = ConsultStep::new(api.clone(), LivenessToken::new());

        let result = step.run(store.clone()).await.unwrap();
        assert_eq!(result.next_action, NextAction::WaitForInput);
        assert_eq!(StepOutcome::take(&store), Some(StepOutcome::Advanced));
        let view: ConsultView = store.get_json(session_keys::CONSULT_VIEW).unwrap().unwrap();
        assert_eq!(view.status, ConsultStatus::Waiting);

        api.consultation.lock().unwrap().message = Some("Riposo e idratazione".into());
        let result = step.run(store.clone()).await.unwrap();
        assert_eq!(result.next_action, NextAction::End);
    }

    #[tokio::test]
    async fn without_a_questionnaire_the_step_is_blocked() {
        let api = MockApi::seeded();
        let store = SessionStore::new();
        let step = ConsultStep::new(api.clone(), LivenessToken::new());
        step.run(store.clone()).await.unwrap();
        assert_eq!(
            StepOutcome::take(&store),
            Some(StepOutcome::Blocked {
                message: NO_QUESTIONNAIRE.into()
            })
        );
        assert!(api.calls().is_empty());
    }
}
