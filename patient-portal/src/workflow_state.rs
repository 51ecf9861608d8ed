//! Typed view of the consultation workflow's session keys.
//!
//! Pages exchange data through flat string keys in the tab's session store.
//! [`WorkflowState`] is the only code that knows those key names; pages load it
//! when they open and save it when a step succeeds.

use serde::{Deserialize, Serialize};
use triage_flow::SessionStore;

use crate::error::{PortalError, Result};
use crate::models::ConsultationResponse;

/// Bumped whenever the key layout below changes.
pub const CURRENT_WORKFLOW_VERSION: u32 = 1;

pub mod session_keys {
    pub const WORKFLOW_VERSION: &str = "workflowVersion";
    pub const CONSULTATION_RESPONSE: &str = "consultationResponse";
    pub const PATIENT_NOME: &str = "patientNome";
    pub const PATIENT_COGNOME: &str = "patientCognome";
    pub const PATIENT_TELEFONO: &str = "patientTelefono";
    pub const PATIENT_ETA: &str = "patientEta";
    pub const PATIENT_ALTEZZA: &str = "patientAltezza";
    pub const PATIENT_PESO: &str = "patientPeso";
    pub const CONSULTO_DATE: &str = "consultoDate";
    pub const CONSULTO_TIME: &str = "consultoTime";
    pub const CONSULTO_DOCTOR_ID: &str = "consultoDoctorId";
    pub const CONSULTO_DOCTOR_NAME: &str = "consultoDoctorName";
    pub const CONSULTO_DOCTOR_SPECIALTY: &str = "consultoDoctorSpecialty";
    pub const CONSULTO_DOCTOR_ADDRESS: &str = "consultoDoctorAddress";

    // page state kept between requests
    pub const QUESTIONNAIRE_FORM: &str = "questionnaireForm";
    pub const DOCTOR_SELECTION: &str = "doctorSelection";
    pub const STEP_OUTCOME: &str = "stepOutcome";
    pub const CONSULT_VIEW: &str = "consultView";

    pub const APPOINTMENT_KEYS: &[&str] = &[
        CONSULTO_DATE,
        CONSULTO_TIME,
        CONSULTO_DOCTOR_ID,
        CONSULTO_DOCTOR_NAME,
        CONSULTO_DOCTOR_SPECIALTY,
        CONSULTO_DOCTOR_ADDRESS,
    ];
}

/// Patient fields shown on later pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PatientDisplay {
    pub nome: String,
    pub cognome: String,
    pub telefono: String,
    pub eta: Option<u32>,
    pub altezza: String,
    pub peso: String,
}

/// Doctor, date and slot confirmed on the selection step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentChoice {
    pub date: String,
    pub time: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub doctor_specialty: String,
    pub doctor_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    pub version: u32,
    pub consultation: Option<ConsultationResponse>,
    pub patient: Option<PatientDisplay>,
    pub appointment: Option<AppointmentChoice>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            version: CURRENT_WORKFLOW_VERSION,
            consultation: None,
            patient: None,
            appointment: None,
        }
    }
}

impl WorkflowState {
    /// Read the workflow keys out of `store`.
    ///
    /// A store written under another layout version is refused: the user has to
    /// start the questionnaire again rather than continue on misread keys.
    pub fn load(store: &SessionStore) -> Result<Self> {
        use session_keys::*;

        if let Some(raw) = store.get(WORKFLOW_VERSION) {
            let version: u32 = raw.parse().unwrap_or(0);
            if version != CURRENT_WORKFLOW_VERSION {
                return Err(PortalError::Precondition(format!(
                    "Dati della sessione non compatibili (versione {raw}). Ricomincia il questionario."
                )));
            }
        }

        let consultation = store
            .get_json::<ConsultationResponse>(CONSULTATION_RESPONSE)
            .map_err(|_| {
                PortalError::Precondition(
                    "Dati del consulto non leggibili. Ricomincia il questionario.".to_string(),
                )
            })?;

        let patient = store.get(PATIENT_NOME).map(|nome| PatientDisplay {
            nome,
            cognome: store.get(PATIENT_COGNOME).unwrap_or_default(),
            telefono: store.get(PATIENT_TELEFONO).unwrap_or_default(),
            eta: store.get(PATIENT_ETA).and_then(|v| v.parse().ok()),
            altezza: store.get(PATIENT_ALTEZZA).unwrap_or_default(),
            peso: store.get(PATIENT_PESO).unwrap_or_default(),
        });

        let appointment = match (store.get(CONSULTO_DATE), store.get(CONSULTO_TIME)) {
            (Some(date), Some(time)) => Some(AppointmentChoice {
                date,
                time,
                doctor_id: store.get(CONSULTO_DOCTOR_ID).unwrap_or_default(),
                doctor_name: store.get(CONSULTO_DOCTOR_NAME).unwrap_or_default(),
                doctor_specialty: store.get(CONSULTO_DOCTOR_SPECIALTY).unwrap_or_default(),
                doctor_address: store.get(CONSULTO_DOCTOR_ADDRESS).unwrap_or_default(),
            }),
            _ => None,
        };

        Ok(Self {
            version: CURRENT_WORKFLOW_VERSION,
            consultation,
            patient,
            appointment,
        })
    }

    /// Id the backend assigned to the consultation, if one was created.
    pub fn consultation_id(&self) -> Option<i64> {
        self.consultation.as_ref().and_then(|c| c.id)
    }

    /// Store a freshly created consultation. Whatever a previous consultation
    /// left behind (chosen doctor, slot, page state) is dropped.
    pub fn begin_consultation(
        store: &SessionStore,
        response: &ConsultationResponse,
        patient: &PatientDisplay,
    ) -> Result<()> {
        use session_keys::*;

        for key in APPOINTMENT_KEYS.iter().chain([&DOCTOR_SELECTION, &CONSULT_VIEW]) {
            store.remove(key);
        }
        store.set(WORKFLOW_VERSION, CURRENT_WORKFLOW_VERSION.to_string());
        store.set_json(CONSULTATION_RESPONSE, response)?;
        store.set(PATIENT_NOME, patient.nome.clone());
        store.set(PATIENT_COGNOME, patient.cognome.clone());
        store.set(PATIENT_TELEFONO, patient.telefono.clone());
        match patient.eta {
            Some(eta) => store.set(PATIENT_ETA, eta.to_string()),
            None => {
                store.remove(PATIENT_ETA);
            }
        }
        store.set(PATIENT_ALTEZZA, patient.altezza.clone());
        store.set(PATIENT_PESO, patient.peso.clone());
        Ok(())
    }

    pub fn record_appointment(store: &SessionStore, appointment: &AppointmentChoice) {
        use session_keys::*;

        store.set(WORKFLOW_VERSION, CURRENT_WORKFLOW_VERSION.to_string());
        store.set(CONSULTO_DATE, appointment.date.clone());
        store.set(CONSULTO_TIME, appointment.time.clone());
        store.set(CONSULTO_DOCTOR_ID, appointment.doctor_id.clone());
        store.set(CONSULTO_DOCTOR_NAME, appointment.doctor_name.clone());
        store.set(CONSULTO_DOCTOR_SPECIALTY, appointment.doctor_specialty.clone());
        store.set(CONSULTO_DOCTOR_ADDRESS, appointment.doctor_address.clone());
    }

    /// Replace the cached consultation with a fresher copy from the backend.
    pub fn refresh_consultation(store: &SessionStore, response: &ConsultationResponse) -> Result<()> {
        store.set_json(session_keys::CONSULTATION_RESPONSE, response)?;
        Ok(())
    }
}

/// What the last step run did, read back by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum StepOutcome {
    /// The step succeeded and the flow moved on
    Advanced,
    /// Required fields are missing or invalid
    Invalid { fields: Vec<String>, message: String },
    /// The backend call failed; input is kept for a retry
    Failed { message: String },
    /// An earlier step's data is missing
    Blocked { message: String },
}

impl StepOutcome {
    pub fn record(&self, store: &SessionStore) -> Result<()> {
        store.set_json(session_keys::STEP_OUTCOME, self)?;
        Ok(())
    }

    /// Read and clear the outcome left by the last step.
    pub fn take(store: &SessionStore) -> Option<Self> {
        let outcome = store.get_json(session_keys::STEP_OUTCOME).ok().flatten();
        store.remove(session_keys::STEP_OUTCOME);
        outcome
    }

    /// Outcome for an error the patient can act on. Anything else (a broken
    /// store, a missing session) is handed back unchanged.
    pub fn from_error(err: PortalError) -> std::result::Result<Self, PortalError> {
        match err {
            PortalError::Validation { fields, message } => {
                Ok(StepOutcome::Invalid { fields, message })
            }
            PortalError::Server { status, message } => Ok(StepOutcome::Failed {
                message: message.unwrap_or_else(|| format!("Backend returned {status}")),
            }),
            err @ (PortalError::Network(_) | PortalError::Decode(_)) => Ok(StepOutcome::Failed {
                message: err.to_string(),
            }),
            PortalError::Precondition(message) => Ok(StepOutcome::Blocked { message }),
            PortalError::Cancelled => Ok(StepOutcome::Blocked {
                message: PortalError::Cancelled.to_string(),
            }),
            other => Err(other),
        }
    }

    pub fn into_result(self) -> Result<()> {
        match self {
            StepOutcome::Advanced => Ok(()),
            StepOutcome::Invalid { fields, message } => {
                Err(PortalError::Validation { fields, message })
            }
            StepOutcome::Failed { message } => Err(PortalError::Server {
                status: 502,
                message: Some(message),
            }),
            StepOutcome::Blocked { message } => Err(PortalError::Precondition(message)),
        }
    }
}
