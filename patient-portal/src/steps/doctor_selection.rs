use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use triage_flow::{NextAction, SessionStore, Step, StepResult};

use super::{DOCTOR_SELECTION_STEP, finish};
use crate::api::TriageApi;
use crate::doctor_selection::{DoctorSelection, NO_CONSULTATION, SUBMIT_FAILED};
use crate::error::{PortalError, Result};
use crate::liveness::{LivenessToken, track};
use crate::workflow_state::{WorkflowState, session_keys};

/// Assigns the chosen doctor and slot to the consultation created by the
/// questionnaire.
pub struct DoctorSelectionStep {
    api: Arc<dyn TriageApi>,
    token: LivenessToken,
}

impl DoctorSelectionStep {
    pub fn new(api: Arc<dyn TriageApi>, token: LivenessToken) -> Self {
        Self { api, token }
    }

    async fn assign(&self, selection: &mut DoctorSelection, store: &SessionStore) -> Result<()> {
        let (request, choice) = selection.prepare_assignment()?;
        let consultation_id = WorkflowState::load(store)?
            .consultation_id()
            .ok_or_else(|| PortalError::Precondition(NO_CONSULTATION.to_string()))?;

        let response = track(
            &mut selection.submit,
            &self.token,
            SUBMIT_FAILED,
            self.api.assign_doctor(consultation_id, &request),
        )
        .await
        .map_err(|e| e.for_page(SUBMIT_FAILED))?;

        if response.id.is_some() {
            WorkflowState::refresh_consultation(store, &response)?;
        }
        WorkflowState::record_appointment(store, &choice);
        info!(
            consultation_id,
            doctor_id = request.doctor_id,
            date = %request.appointment_date,
            time = %request.appointment_time,
            "doctor assigned"
        );
        Ok(())
    }
}

#[async_trait]
impl Step for DoctorSelectionStep {
    fn id(&self) -> &str {
        DOCTOR_SELECTION_STEP
    }

    async fn run(&self, store: SessionStore) -> triage_flow::Result<StepResult> {
        let mut selection: DoctorSelection = store
            .get_json(session_keys::DOCTOR_SELECTION)?
            .unwrap_or_default();
        let result = self.assign(&mut selection, &store).await;
        // keeps the choice and its error flags for the next render
        store.set_json(session_keys::DOCTOR_SELECTION, &selection)?;
        finish(&store, self.id(), result, NextAction::Continue)
    }
}
