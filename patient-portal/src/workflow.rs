use serde::{Serialize, Serializer};
use std::sync::Arc;
use triage_flow::{Flow, FlowBuilder, FlowRunner, SessionStorage, Step};

use crate::account::AccountView;
use crate::api::TriageApi;
use crate::liveness::LivenessToken;
use crate::steps::{
    CONSULT_STEP, ConsultStep, DOCTOR_SELECTION_STEP, DoctorSelectionStep, QUESTIONNAIRE_STEP,
    QuestionnaireStep,
};

pub const CONSULTATION_FLOW: &str = "consultation";

/// questionario → selezione-medico → consulto
///
/// Steps are bound to one session's backend client and to the view that
/// triggered the run, so the flow is built per request.
pub fn build_consultation_flow(api: Arc<dyn TriageApi>, token: LivenessToken) -> Flow {
    let questionnaire = Arc::new(QuestionnaireStep::new(api.clone(), token.clone()));
    let questionnaire_id = questionnaire.id().to_string();

    let selection = Arc::new(DoctorSelectionStep::new(api.clone(), token.clone()));
    let selection_id = selection.id().to_string();

    let consult = Arc::new(ConsultStep::new(api, token));
    let consult_id = consult.id().to_string();

    FlowBuilder::new(CONSULTATION_FLOW)
        .add_step(questionnaire)
        .add_step(selection)
        .add_step(consult)
        .add_edge(&questionnaire_id, &selection_id)
        .add_edge(&selection_id, &consult_id)
        .build()
}

pub fn create_flow_runner(
    api: Arc<dyn TriageApi>,
    token: LivenessToken,
    session_storage: Arc<dyn SessionStorage>,
) -> FlowRunner {
    let flow = Arc::new(build_consultation_flow(api, token));
    FlowRunner::new(flow, session_storage)
}

/// Page the browser tab should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Questionnaire,
    DoctorSelection,
    Consult,
    Doctors,
    MyAccount(AccountView),
    ForgotPassword,
    Info,
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Questionnaire => format!("/{QUESTIONNAIRE_STEP}"),
            Route::DoctorSelection => format!("/{DOCTOR_SELECTION_STEP}"),
            Route::Consult => format!("/{CONSULT_STEP}"),
            Route::Doctors => "/medici".to_string(),
            Route::MyAccount(view) => {
                let view = match view {
                    AccountView::Selection => "selection",
                    AccountView::Login => "login",
                    AccountView::Signup => "signup",
                    AccountView::Forgot => "forgot",
                    AccountView::Dashboard => "dashboard",
                };
                format!("/my-account?view={view}")
            }
            Route::ForgotPassword => "/forgot-password".to_string(),
            Route::Info => "/info".to_string(),
        }
    }

    /// Page of a consultation step; unknown ids fall back to the home page.
    pub fn for_step(step_id: &str) -> Self {
        match step_id {
            QUESTIONNAIRE_STEP => Route::Questionnaire,
            DOCTOR_SELECTION_STEP => Route::DoctorSelection,
            CONSULT_STEP => Route::Consult,
            _ => Route::Home,
        }
    }
}

impl Serialize for Route {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.path())
    }
}
