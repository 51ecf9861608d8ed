//! Last step of the consultation: a read-only summary.

use serde::{Deserialize, Serialize};
use tracing::warn;
use triage_flow::SessionStore;

use crate::api::TriageApi;
use crate::error::{PortalError, Result};
use crate::liveness::{LivenessToken, LoadState, track};
use crate::models::ConsultationResponse;
use crate::workflow_state::{AppointmentChoice, WorkflowState};

pub const REFRESH_FAILED: &str = "Impossibile aggiornare lo stato del consulto.";
pub const NO_QUESTIONNAIRE: &str = "Nessun consulto in corso. Completa prima il questionario.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConsultStatus {
    /// Sent, no answer from the doctor yet
    Waiting,
    ResponseReceived,
}

/// A consultation counts as answered once it carries a message or at least
/// one recommendation.
pub fn response_received(response: &ConsultationResponse) -> bool {
    response
        .message
        .as_deref()
        .is_some_and(|m| !m.trim().is_empty())
        || !response.recommendations.is_empty()
}

/// Body mass index rounded to one decimal.
pub fn bmi(height_cm: f64, weight_kg: f64) -> Option<f64> {
    if !(height_cm > 0.0 && weight_kg > 0.0) {
        return None;
    }
    let meters = height_cm / 100.0;
    Some((weight_kg / (meters * meters) * 10.0).round() / 10.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    pub full_name: String,
    pub telefono: String,
    pub eta: Option<u32>,
    pub altezza: String,
    pub peso: String,
    pub bmi: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultView {
    pub consultation_id: Option<i64>,
    pub status: ConsultStatus,
    pub urgency: Option<String>,
    pub message: Option<String>,
    pub recommendations: Vec<String>,
    pub doctor_name: Option<String>,
    pub patient: Option<PatientSummary>,
    pub appointment: Option<AppointmentChoice>,
    pub refresh: LoadState,
}

impl ConsultView {
    /// Render from the session alone, with no network call.
    pub fn from_state(state: &WorkflowState) -> Result<Self> {
        let consultation = state
            .consultation
            .as_ref()
            .ok_or_else(|| PortalError::Precondition(NO_QUESTIONNAIRE.to_string()))?;

        let patient = state.patient.as_ref().map(|p| PatientSummary {
            full_name: format!("{} {}", p.nome, p.cognome).trim().to_string(),
            telefono: p.telefono.clone(),
            eta: p.eta,
            altezza: p.altezza.clone(),
            peso: p.peso.clone(),
            bmi: match (p.altezza.trim().parse(), p.peso.trim().parse()) {
                (Ok(h), Ok(w)) => bmi(h, w),
                _ => None,
            },
        });

        let doctor_name = state
            .appointment
            .as_ref()
            .map(|a| a.doctor_name.clone())
            .filter(|name| !name.is_empty())
            .or_else(|| consultation.doctor.as_ref().and_then(|d| d.display_name()));

        Ok(Self {
            consultation_id: consultation.id,
            status: if response_received(consultation) {
                ConsultStatus::ResponseReceived
            } else {
                ConsultStatus::Waiting
            },
            urgency: consultation.urgency.clone(),
            message: consultation.message.clone(),
            recommendations: consultation.recommendations.clone(),
            doctor_name,
            patient,
            appointment: state.appointment.clone(),
            refresh: LoadState::Idle,
        })
    }

    /// Re-read the consultation from the backend so a doctor's answer shows up.
    /// On failure the cached copy is rendered and `refresh` carries the error.
    pub async fn load(
        store: &SessionStore,
        api: &dyn TriageApi,
        token: &LivenessToken,
    ) -> Result<Self> {
        let state = WorkflowState::load(store)?;
        let mut refresh = LoadState::Idle;

        let Some(id) = state.consultation_id() else {
            return Self::from_state(&state);
        };

        match track(&mut refresh, token, REFRESH_FAILED, api.get_consultation(id)).await {
            Ok(fresh) => {
                WorkflowState::refresh_consultation(store, &fresh)?;
                Self::from_state(&WorkflowState::load(store)?)
            }
            Err(PortalError::Cancelled) => Err(PortalError::Cancelled),
            Err(err) => {
                warn!(consultation_id = id, error = %err, "showing cached consultation");
                let mut view = Self::from_state(&state)?;
                view.refresh = refresh;
                Ok(view)
            }
        }
    }
}
