use axum::{
    Router,
    extract::{Path, Query, State},
    http::{HeaderValue, Request},
    middleware::{Next, from_fn},
    response::{Json, Response},
    routing::{get, post},
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, info, warn};
use triage_flow::{ExecutionResult, FlowRunner, InMemorySessionStorage, Session, SessionStorage};
use uuid::Uuid;

use crate::account::{
    self, AccountPage, AccountView, EditProfileForm, ForgotPasswordForm, SignupForm,
};
use crate::api::{ApiConnector, HttpConnector, TriageApi};
use crate::auth::{AuthContext, AuthState};
use crate::config::PortalConfig;
use crate::consult::{ConsultView, NO_QUESTIONNAIRE};
use crate::content::InfoPage;
use crate::doctor_selection::{DoctorSelection, DoctorSelectionView, SelectionUpdate};
use crate::doctors_page::{self, DirectoryView, DoctorDirectory};
use crate::error::{PortalError, Result};
use crate::filter::SpecialtyFilter;
use crate::liveness::LivenessToken;
use crate::models::{LoginRequest, RegisterResponse, Review, UserProfile};
use crate::placement::{PlacementProvider, StaticPlacement};
use crate::questionnaire::{QuestionnaireForm, QuestionnaireView};
use crate::reviews::{self, ModalView, ReviewDraft, ReviewModal, preview};
use crate::steps::{CONSULT_STEP, DOCTOR_SELECTION_STEP, QUESTIONNAIRE_STEP};
use crate::workflow::{Route, create_flow_runner};
use crate::workflow_state::{StepOutcome, WorkflowState, session_keys};

type ApiResult<T> = std::result::Result<Json<PageResponse<T>>, PortalError>;

/// Every page answer: which client route to show, and its data.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub route: Route,
    pub page: T,
}

fn page<T>(session_id: &str, route: Route, page: T) -> ApiResult<T> {
    Ok(Json(PageResponse {
        session_id: Some(session_id.to_string()),
        route,
        page,
    }))
}

/// What one browser tab owns besides its flow session: the backend client
/// holding its cookie, who is logged in, and the view currently on screen.
pub struct SessionRuntime {
    pub api: Arc<dyn TriageApi>,
    pub auth: AuthContext,
    view: Mutex<LivenessToken>,
    /// Unix seconds of the last request for this tab
    last_seen: AtomicI64,
}

impl SessionRuntime {
    fn new(api: Arc<dyn TriageApi>) -> Self {
        Self {
            api,
            auth: AuthContext::new(),
            view: Mutex::new(LivenessToken::new()),
            last_seen: AtomicI64::new(chrono::Utc::now().timestamp()),
        }
    }

    fn touch(&self) {
        self.last_seen
            .store(chrono::Utc::now().timestamp(), Ordering::Relaxed);
    }

    fn idle_since(&self, cutoff: i64) -> bool {
        self.last_seen.load(Ordering::Relaxed) < cutoff
    }

    /// A new page replaces the old one; loads the old one started are dropped.
    async fn open_view(&self) -> LivenessToken {
        let mut view = self.view.lock().await;
        view.cancel();
        *view = LivenessToken::new();
        view.clone()
    }

    /// Token of the page on screen, for actions taken inside it.
    async fn current_view(&self) -> LivenessToken {
        self.view.lock().await.clone()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PortalConfig>,
    pub session_storage: Arc<dyn SessionStorage>,
    connector: Arc<dyn ApiConnector>,
    placement: Arc<dyn PlacementProvider>,
    runtimes: Arc<DashMap<String, Arc<SessionRuntime>>>,
}

impl AppState {
    pub fn new(
        config: PortalConfig,
        connector: Arc<dyn ApiConnector>,
        placement: Arc<dyn PlacementProvider>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            session_storage: Arc::new(InMemorySessionStorage::new()),
            connector,
            placement,
            runtimes: Arc::new(DashMap::new()),
        }
    }

    fn runtime(&self, session_id: &str) -> Result<Arc<SessionRuntime>> {
        let runtime = self
            .runtimes
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| PortalError::NotFound(format!("session {session_id}")))?;
        runtime.touch();
        Ok(runtime)
    }

    /// Drop every session idle for longer than the configured timeout, along
    /// with its backend client and cookies. Returns how many were dropped.
    pub async fn sweep_idle_sessions(&self) -> Result<usize> {
        let idle = i64::try_from(self.config.session_idle_timeout.as_secs()).unwrap_or(i64::MAX);
        let cutoff = chrono::Utc::now().timestamp().saturating_sub(idle);
        let candidates: Vec<String> = self
            .runtimes
            .iter()
            .filter(|entry| entry.value().idle_since(cutoff))
            .map(|entry| entry.key().clone())
            .collect();

        let mut dropped = 0;
        for session_id in &candidates {
            // a request may have touched it since the scan
            let Some((_, runtime)) = self
                .runtimes
                .remove_if(session_id, |_, runtime| runtime.idle_since(cutoff))
            else {
                continue;
            };
            runtime.open_view().await.cancel();
            self.session_storage.delete(session_id).await?;
            dropped += 1;
            info!(session_id = %session_id, "idle session dropped");
        }
        Ok(dropped)
    }

    /// Sweep idle sessions in the background, once per timeout period.
    pub fn spawn_idle_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let state = self.clone();
        let period = state
            .config
            .session_idle_timeout
            .max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = state.sweep_idle_sessions().await {
                    warn!(error = %err, "idle session sweep failed");
                }
            }
        })
    }

    fn runner(&self, runtime: &SessionRuntime, token: LivenessToken) -> FlowRunner {
        create_flow_runner(runtime.api.clone(), token, self.session_storage.clone())
    }
}

pub fn create_app(config: PortalConfig) -> Router {
    let connector = Arc::new(HttpConnector::new(&config));
    let state = AppState::new(config, connector, Arc::new(StaticPlacement));
    state.spawn_idle_sweeper();
    build_router(state)
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/info", get(info_page))
        .route("/sessions", post(create_session))
        .route("/sessions/{session_id}", get(get_session).delete(close_session))
        .route(
            "/sessions/{session_id}/questionario",
            get(open_questionnaire).post(submit_questionnaire),
        )
        .route(
            "/sessions/{session_id}/selezione-medico",
            get(open_doctor_selection).put(update_doctor_selection),
        )
        .route(
            "/sessions/{session_id}/selezione-medico/submit",
            post(submit_doctor_selection),
        )
        .route("/sessions/{session_id}/consulto", get(open_consult))
        .route("/sessions/{session_id}/medici", get(open_directory))
        .route(
            "/sessions/{session_id}/medici/{doctor_id}/reviews",
            get(open_reviews).post(post_review),
        )
        .route("/sessions/{session_id}/my-account", get(open_account))
        .route("/sessions/{session_id}/auth/login", post(login))
        .route("/sessions/{session_id}/auth/register", post(register))
        .route("/sessions/{session_id}/auth/logout", post(logout))
        .route("/sessions/{session_id}/forgot-password", post(forgot_password))
        .route(
            "/sessions/{session_id}/profile",
            get(open_profile).put(update_profile),
        )
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Tag each request with a correlation id, echoed back in the response.
async fn correlation_id_middleware(mut request: Request<axum::body::Body>, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let header = HeaderValue::from_str(&correlation_id).ok();
    if let Some(value) = header.clone() {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;
    if let Some(value) = header {
        response.headers_mut().insert("x-correlation-id", value);
    }
    response
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Patient Triage Portal",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Questionnaire, doctor selection and consult pages for one browser tab per session",
        "endpoints": {
            "POST /sessions": "Open a session for a browser tab",
            "GET /sessions/{session_id}": "Where the session stands",
            "POST /sessions/{session_id}/questionario": "Submit the symptom questionnaire",
            "GET|PUT /sessions/{session_id}/selezione-medico": "Doctor, date and slot choice",
            "POST /sessions/{session_id}/selezione-medico/submit": "Confirm the appointment",
            "GET /sessions/{session_id}/consulto": "Consultation summary",
            "GET /sessions/{session_id}/medici": "Doctor directory",
            "GET|POST /sessions/{session_id}/medici/{doctor_id}/reviews": "Doctor reviews",
            "GET /sessions/{session_id}/my-account?view=": "Account area",
            "GET /info": "Informational content",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn info_page(State(state): State<AppState>) -> ApiResult<InfoPage> {
    let api = state.connector.connect()?;
    let info = InfoPage::load(api.as_ref(), &LivenessToken::new()).await?;
    Ok(Json(PageResponse {
        session_id: None,
        route: Route::Info,
        page: info,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub current_step: String,
    pub history: Vec<String>,
    pub status_message: Option<String>,
    pub auth: AuthState,
    pub workflow: WorkflowState,
}

async fn summarize(session: &Session, runtime: &SessionRuntime) -> Result<SessionSummary> {
    Ok(SessionSummary {
        current_step: session.current_step_id.clone(),
        history: session.history.clone(),
        status_message: session.status_message.clone(),
        auth: runtime.auth.state().await,
        workflow: WorkflowState::load(&session.store)?,
    })
}

async fn create_session(State(state): State<AppState>) -> ApiResult<SessionSummary> {
    let session_id = Uuid::new_v4().to_string();
    let runtime = Arc::new(SessionRuntime::new(state.connector.connect()?));
    let runner = state.runner(&runtime, runtime.current_view().await);
    let session = runner.start(session_id.clone()).await?;
    state.runtimes.insert(session_id.clone(), runtime.clone());

    // pages see AuthState::Loading until the backend answers
    let auth = runtime.auth.clone();
    let api = runtime.api.clone();
    tokio::spawn(async move { auth.initialize(api.as_ref()).await });

    info!(session_id = %session_id, "session opened");
    page(&session_id, Route::Home, summarize(&session, &runtime).await?)
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionSummary> {
    let runtime = state.runtime(&session_id)?;
    let runner = state.runner(&runtime, runtime.current_view().await);
    let session = runner.load(&session_id).await?;
    let route = Route::for_step(&session.current_step_id);
    page(&session_id, route, summarize(&session, &runtime).await?)
}

async fn close_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Value> {
    let (_, runtime) = state
        .runtimes
        .remove(&session_id)
        .ok_or_else(|| PortalError::NotFound(format!("session {session_id}")))?;
    runtime.open_view().await.cancel();
    state.session_storage.delete(&session_id).await?;
    info!(session_id = %session_id, "session closed");
    page(&session_id, Route::Home, json!({ "closed": true }))
}

/// Run the session's current step and surface what it recorded. Input errors
/// come back as errors; the session has already been saved either way.
async fn run_step(runner: &FlowRunner, session_id: &str) -> Result<(Session, ExecutionResult)> {
    let result = runner.run(session_id).await?;
    let session = runner.load(session_id).await?;
    let outcome = StepOutcome::take(&session.store);
    runner.storage().save(session.clone()).await?;

    info!(
        session_id,
        step = %session.current_step_id,
        status = ?result.status,
        outcome = ?outcome,
        "step executed"
    );
    outcome.map(StepOutcome::into_result).transpose()?;
    Ok((session, result))
}

async fn open_questionnaire(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<QuestionnaireView> {
    let runtime = state.runtime(&session_id)?;
    let runner = state.runner(&runtime, runtime.open_view().await);
    let session = runner.navigate(&session_id, QUESTIONNAIRE_STEP).await?;
    let saved = session
        .store
        .get_json::<QuestionnaireForm>(session_keys::QUESTIONNAIRE_FORM)?;
    let user = runtime.auth.user().await;
    page(
        &session_id,
        Route::Questionnaire,
        QuestionnaireView::open(saved, user.as_ref()),
    )
}

async fn submit_questionnaire(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(mut form): Json<QuestionnaireForm>,
) -> ApiResult<WorkflowState> {
    let runtime = state.runtime(&session_id)?;
    let runner = state.runner(&runtime, runtime.current_view().await);
    let session = runner.navigate(&session_id, QUESTIONNAIRE_STEP).await?;

    if let Some(user) = runtime.auth.user().await {
        form.apply_locks(&user);
    }
    session
        .store
        .set_json(session_keys::QUESTIONNAIRE_FORM, &form)?;
    runner.storage().save(session).await?;

    let (session, _) = run_step(&runner, &session_id).await?;
    let route = Route::for_step(&session.current_step_id);
    page(&session_id, route, WorkflowState::load(&session.store)?)
}

async fn open_doctor_selection(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<DoctorSelectionView> {
    let runtime = state.runtime(&session_id)?;
    let token = runtime.open_view().await;
    let runner = state.runner(&runtime, token.clone());
    let session = runner.navigate(&session_id, DOCTOR_SELECTION_STEP).await?;

    let mut selection: DoctorSelection = session
        .store
        .get_json(session_keys::DOCTOR_SELECTION)?
        .unwrap_or_default();
    if selection.needs_load() {
        match selection
            .load_doctors(
                runtime.api.as_ref(),
                state.placement.as_ref(),
                state.config.doctor_selection_page_size,
                &token,
            )
            .await
        {
            Ok(()) => {}
            Err(PortalError::Cancelled) => return Err(PortalError::Cancelled),
            // the view carries the load error
            Err(err) => warn!(session_id = %session_id, error = %err, "doctor list unavailable"),
        }
    }

    session
        .store
        .set_json(session_keys::DOCTOR_SELECTION, &selection)?;
    runner.storage().save(session).await?;
    page(&session_id, Route::DoctorSelection, selection.view())
}

async fn update_doctor_selection(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(update): Json<SelectionUpdate>,
) -> ApiResult<DoctorSelectionView> {
    let runtime = state.runtime(&session_id)?;
    let runner = state.runner(&runtime, runtime.current_view().await);
    let session = runner.navigate(&session_id, DOCTOR_SELECTION_STEP).await?;

    let mut selection: DoctorSelection = session
        .store
        .get_json(session_keys::DOCTOR_SELECTION)?
        .unwrap_or_default();
    let applied = selection.apply(update);
    session
        .store
        .set_json(session_keys::DOCTOR_SELECTION, &selection)?;
    runner.storage().save(session).await?;

    applied?;
    page(&session_id, Route::DoctorSelection, selection.view())
}

async fn submit_doctor_selection(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<WorkflowState> {
    let runtime = state.runtime(&session_id)?;
    let runner = state.runner(&runtime, runtime.current_view().await);
    runner.navigate(&session_id, DOCTOR_SELECTION_STEP).await?;

    let (session, _) = run_step(&runner, &session_id).await?;
    let route = Route::for_step(&session.current_step_id);
    page(&session_id, route, WorkflowState::load(&session.store)?)
}

async fn open_consult(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<ConsultView> {
    let runtime = state.runtime(&session_id)?;
    let runner = state.runner(&runtime, runtime.open_view().await);
    runner.navigate(&session_id, CONSULT_STEP).await?;

    let (session, _) = run_step(&runner, &session_id).await?;
    let view = session
        .store
        .get_json::<ConsultView>(session_keys::CONSULT_VIEW)?
        .ok_or_else(|| PortalError::Precondition(NO_QUESTIONNAIRE.to_string()))?;
    page(&session_id, Route::Consult, view)
}

#[derive(Debug, Default, Deserialize)]
struct DirectoryParams {
    search: Option<String>,
    specialty: Option<String>,
}

async fn open_directory(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<DirectoryParams>,
) -> ApiResult<DirectoryView> {
    let runtime = state.runtime(&session_id)?;
    let token = runtime.open_view().await;
    let directory = DoctorDirectory::load(
        runtime.api.as_ref(),
        state.config.doctor_list_page_size,
        &token,
    )
    .await
    .map_err(|e| e.for_page(doctors_page::LOAD_FAILED))?;

    let view = directory.view(
        params.search.as_deref().unwrap_or_default(),
        SpecialtyFilter::parse(params.specialty.as_deref()),
    );
    page(&session_id, Route::Doctors, view)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewsPage {
    pub preview: Vec<Review>,
    pub modal: ReviewModal,
}

async fn open_reviews(
    State(state): State<AppState>,
    Path((session_id, doctor_id)): Path<(String, i64)>,
) -> ApiResult<ReviewsPage> {
    let runtime = state.runtime(&session_id)?;
    let token = runtime.current_view().await;
    let mut modal = ReviewModal::open(doctor_id, ModalView::List);
    match modal.load_reviews(runtime.api.as_ref(), &token).await {
        Ok(()) => {}
        Err(PortalError::Cancelled) => return Err(PortalError::Cancelled),
        Err(err) => warn!(doctor_id, error = %err, "reviews unavailable"),
    }
    page(
        &session_id,
        Route::Doctors,
        ReviewsPage {
            preview: preview(&modal.reviews).to_vec(),
            modal,
        },
    )
}

async fn post_review(
    State(state): State<AppState>,
    Path((session_id, doctor_id)): Path<(String, i64)>,
    Json(draft): Json<ReviewDraft>,
) -> ApiResult<ReviewModal> {
    let runtime = state.runtime(&session_id)?;
    let token = runtime.current_view().await;
    let user = runtime.auth.user().await;
    let mut modal = ReviewModal::open(doctor_id, ModalView::Form);
    modal
        .submit(draft, user.as_ref(), runtime.api.as_ref(), &token)
        .await
        .map_err(|e| e.for_page(reviews::SUBMIT_FAILED))?;
    page(&session_id, Route::Doctors, modal)
}

#[derive(Debug, Default, Deserialize)]
struct AccountParams {
    view: Option<String>,
}

async fn open_account(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<AccountParams>,
) -> ApiResult<AccountPage> {
    let runtime = state.runtime(&session_id)?;
    let token = runtime.open_view().await;
    let view = AccountView::parse(params.view.as_deref());
    let account = AccountPage::open(view, &runtime.auth, runtime.api.as_ref(), &token).await?;
    page(&session_id, Route::MyAccount(view), account)
}

async fn login(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<UserProfile> {
    let runtime = state.runtime(&session_id)?;
    let token = runtime.current_view().await;
    let user = account::login(runtime.api.as_ref(), &runtime.auth, request, &token).await?;
    page(&session_id, Route::MyAccount(AccountView::Dashboard), user)
}

async fn register(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(form): Json<SignupForm>,
) -> ApiResult<RegisterResponse> {
    let runtime = state.runtime(&session_id)?;
    let token = runtime.current_view().await;
    let response = account::register(runtime.api.as_ref(), &form, &token).await?;
    page(&session_id, Route::MyAccount(AccountView::Login), response)
}

async fn logout(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<AuthState> {
    let runtime = state.runtime(&session_id)?;
    let runner = state.runner(&runtime, runtime.open_view().await);
    let mut session = runner.load(&session_id).await?;

    runtime.auth.logout(&session.store).await;
    if let Some(start) = runner.flow().start_step_id() {
        session.restart_at(start);
    }
    runner.storage().save(session).await?;
    page(&session_id, Route::Home, runtime.auth.state().await)
}

async fn forgot_password(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(form): Json<ForgotPasswordForm>,
) -> ApiResult<Value> {
    let runtime = state.runtime(&session_id)?;
    let token = runtime.current_view().await;
    let message = account::reset_password(runtime.api.as_ref(), &form, &token).await?;
    page(&session_id, Route::ForgotPassword, json!({ "message": message }))
}

async fn open_profile(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<EditProfileForm> {
    let runtime = state.runtime(&session_id)?;
    let user = runtime
        .auth
        .user()
        .await
        .ok_or_else(|| PortalError::Precondition(account::LOGIN_REQUIRED.to_string()))?;
    page(
        &session_id,
        Route::MyAccount(AccountView::Dashboard),
        EditProfileForm::from_profile(&user),
    )
}

async fn update_profile(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(form): Json<EditProfileForm>,
) -> ApiResult<UserProfile> {
    let runtime = state.runtime(&session_id)?;
    let token = runtime.current_view().await;
    let user = account::update_profile(runtime.api.as_ref(), &runtime.auth, &form, &token).await?;
    page(&session_id, Route::MyAccount(AccountView::Dashboard), user)
}
