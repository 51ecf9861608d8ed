//! My-account area: login, registration, password reset, dashboard and
//! profile editing.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::TriageApi;
use crate::auth::AuthContext;
use crate::error::{PortalError, Result};
use crate::liveness::{LivenessToken, LoadState, track};
use crate::models::{
    ConsultationItem, LoginRequest, RegisterRequest, RegisterResponse, ResetPasswordRequest,
    UpdateUserRequest, UserProfile,
};

pub const LOGIN_FAILED: &str = "Credenziali non valide. Riprova.";
pub const REGISTER_FAILED: &str = "Errore durante la registrazione. Riprova.";
pub const FILL_ALL_FIELDS: &str = "Compila tutti i campi.";
pub const PASSWORDS_DIFFER: &str = "Le password non coincidono.";
pub const RESET_FAILED: &str = "Errore durante il reset della password.";
pub const RESET_DONE: &str = "Password aggiornata con successo.";
pub const DASHBOARD_FAILED: &str = "Errore nel caricamento dei dati dell'account.";
pub const UPDATE_FAILED: &str = "Errore nell'aggiornamento dei dati. Riprova.";
pub const LOGIN_REQUIRED: &str = "Accedi per visualizzare questa pagina.";

/// Sub-view of `/my-account`, from its `view` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountView {
    #[default]
    Selection,
    Login,
    Signup,
    Forgot,
    Dashboard,
}

impl AccountView {
    /// Unknown or missing values show the selection view.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("login") => AccountView::Login,
            Some("signup") => AccountView::Signup,
            Some("forgot") => AccountView::Forgot,
            Some("dashboard") => AccountView::Dashboard,
            _ => AccountView::Selection,
        }
    }
}

fn require(fields: &[(&str, &str)]) -> Result<()> {
    let missing: Vec<String> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PortalError::Validation {
            fields: missing,
            message: FILL_ALL_FIELDS.to_string(),
        })
    }
}

/// Backend message when there is one, `fallback` otherwise.
fn page_error(err: PortalError, fallback: &str) -> PortalError {
    let message = err.backend_message().unwrap_or(fallback).to_string();
    err.for_page(&message)
}

/// Log in against the backend, then record the user in `auth`.
pub async fn login(
    api: &dyn TriageApi,
    auth: &AuthContext,
    request: LoginRequest,
    token: &LivenessToken,
) -> Result<UserProfile> {
    require(&[
        ("identifier", &request.identifier),
        ("password", &request.password),
    ])?;
    let request = LoginRequest {
        identifier: request.identifier.trim().to_string(),
        password: request.password,
    };

    let mut state = LoadState::Idle;
    let user = track(&mut state, token, LOGIN_FAILED, api.login(&request))
        .await
        .map_err(|e| page_error(e, LOGIN_FAILED))?;
    auth.login(user.clone()).await;
    Ok(user)
}

/// Sign-up form as typed; height is free text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignupForm {
    pub first_name: String,
    pub last_name: String,
    pub mobile_number: String,
    pub codice_fiscale: String,
    pub birth_date: String,
    pub height_cm: String,
    pub password: String,
}

impl SignupForm {
    pub fn to_request(&self) -> Result<RegisterRequest> {
        require(&[
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("mobileNumber", &self.mobile_number),
            ("codiceFiscale", &self.codice_fiscale),
            ("birthDate", &self.birth_date),
            ("password", &self.password),
        ])?;
        Ok(RegisterRequest {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            mobile_number: self.mobile_number.trim().to_string(),
            codice_fiscale: self.codice_fiscale.trim().to_uppercase(),
            birth_date: self.birth_date.trim().to_string(),
            height_cm: optional_height(&self.height_cm)?,
            password: self.password.clone(),
        })
    }
}

pub async fn register(
    api: &dyn TriageApi,
    form: &SignupForm,
    token: &LivenessToken,
) -> Result<RegisterResponse> {
    let request = form.to_request()?;
    let mut state = LoadState::Idle;
    let response = track(&mut state, token, REGISTER_FAILED, api.register(&request))
        .await
        .map_err(|e| page_error(e, REGISTER_FAILED))?;
    info!(user_id = ?response.user.as_ref().and_then(|u| u.id), "account registered");
    Ok(response)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForgotPasswordForm {
    pub identifier: String,
    pub new_password: String,
    pub repeat_password: String,
}

/// Reset a password and return the confirmation to show. A backend refusal is
/// reported with the backend's own message when it sent one; its confirmation
/// text is not shown.
pub async fn reset_password(
    api: &dyn TriageApi,
    form: &ForgotPasswordForm,
    token: &LivenessToken,
) -> Result<String> {
    let missing: Vec<String> = [
        ("identifier", form.identifier.trim()),
        ("newPassword", form.new_password.as_str()),
        ("repeatPassword", form.repeat_password.as_str()),
    ]
    .iter()
    .filter(|(_, value)| value.is_empty())
    .map(|(name, _)| name.to_string())
    .collect();
    if !missing.is_empty() {
        return Err(PortalError::Validation {
            fields: missing,
            message: FILL_ALL_FIELDS.to_string(),
        });
    }
    if form.new_password != form.repeat_password {
        return Err(PortalError::validation("repeatPassword", PASSWORDS_DIFFER));
    }

    let request = ResetPasswordRequest {
        identifier: form.identifier.trim().to_string(),
        new_password: form.new_password.clone(),
    };
    let mut state = LoadState::Idle;
    let confirmation = track(&mut state, token, RESET_FAILED, api.reset_password(&request))
        .await
        .map_err(|e| page_error(e, RESET_FAILED))?;
    info!(backend_message = ?confirmation, "password reset");
    Ok(RESET_DONE.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub profile: UserProfile,
    pub consultations: Vec<ConsultationItem>,
}

impl Dashboard {
    /// Profile and consultation history, fetched together.
    pub async fn load(api: &dyn TriageApi, user_id: i64, token: &LivenessToken) -> Result<Self> {
        let mut state = LoadState::Idle;
        let (profile, consultations) = track(&mut state, token, DASHBOARD_FAILED, async {
            tokio::try_join!(
                api.fetch_user(user_id),
                api.fetch_user_consultations(user_id)
            )
        })
        .await
        .map_err(|e| e.for_page(DASHBOARD_FAILED))?;
        Ok(Self {
            profile,
            consultations,
        })
    }
}

/// What `/my-account` shows for a given view and auth state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "view", content = "data", rename_all = "camelCase")]
pub enum AccountPage {
    /// The session check is still running
    Loading,
    Selection,
    Login,
    Signup,
    Forgot,
    Dashboard(Dashboard),
}

impl AccountPage {
    pub async fn open(
        view: AccountView,
        auth: &AuthContext,
        api: &dyn TriageApi,
        token: &LivenessToken,
    ) -> Result<Self> {
        let state = auth.state().await;
        if state.is_loading() {
            return Ok(AccountPage::Loading);
        }
        Ok(match view {
            AccountView::Selection => AccountPage::Selection,
            AccountView::Login => AccountPage::Login,
            AccountView::Signup => AccountPage::Signup,
            AccountView::Forgot => AccountPage::Forgot,
            AccountView::Dashboard => {
                let user = state
                    .user()
                    .ok_or_else(|| PortalError::Precondition(LOGIN_REQUIRED.to_string()))?;
                AccountPage::Dashboard(Dashboard::load(api, user.id, token).await?)
            }
        })
    }
}

/// Edit-profile form as typed. Empty birth date or height are sent as null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditProfileForm {
    pub first_name: String,
    pub last_name: String,
    pub mobile_number: String,
    pub codice_fiscale: String,
    pub birth_date: String,
    pub height_cm: String,
}

impl EditProfileForm {
    pub fn from_profile(user: &UserProfile) -> Self {
        Self {
            first_name: user.first_name.clone().unwrap_or_default(),
            last_name: user.last_name.clone().unwrap_or_default(),
            mobile_number: user.mobile_number.clone().unwrap_or_default(),
            codice_fiscale: user.codice_fiscale.clone().unwrap_or_default(),
            birth_date: user.birth_date.clone().unwrap_or_default(),
            height_cm: user.height_cm.map(|h| h.to_string()).unwrap_or_default(),
        }
    }

    pub fn to_request(&self) -> Result<UpdateUserRequest> {
        let birth_date = self.birth_date.trim();
        Ok(UpdateUserRequest {
            first_name: Some(self.first_name.trim().to_string()),
            last_name: Some(self.last_name.trim().to_string()),
            mobile_number: Some(self.mobile_number.trim().to_string()),
            codice_fiscale: Some(self.codice_fiscale.trim().to_string()),
            birth_date: (!birth_date.is_empty()).then(|| birth_date.to_string()),
            height_cm: optional_height(&self.height_cm)?,
        })
    }
}

/// Save the profile of the logged-in user and refresh `auth` with the result.
pub async fn update_profile(
    api: &dyn TriageApi,
    auth: &AuthContext,
    form: &EditProfileForm,
    token: &LivenessToken,
) -> Result<UserProfile> {
    let user = auth
        .user()
        .await
        .ok_or_else(|| PortalError::Precondition(LOGIN_REQUIRED.to_string()))?;
    let request = form.to_request()?;

    let mut state = LoadState::Idle;
    let updated = track(
        &mut state,
        token,
        UPDATE_FAILED,
        api.update_user(user.id, &request),
    )
    .await
    .map_err(|e| e.for_page(UPDATE_FAILED))?;
    auth.login(updated.clone()).await;
    info!(user_id = updated.id, "profile updated");
    Ok(updated)
}

fn optional_height(raw: &str) -> Result<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|h| h.is_finite() && *h > 0.0)
        .map(Some)
        .ok_or_else(|| PortalError::validation("heightCm", "Altezza non valida."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockApi;

    #[test]
    fn view_parameter_defaults_to_selection() {
        assert_eq!(AccountView::parse(None), AccountView::Selection);
        assert_eq!(AccountView::parse(Some("signup")), AccountView::Signup);
        assert_eq!(AccountView::parse(Some("Dashboard")), AccountView::Dashboard);
        assert_eq!(AccountView::parse(Some("admin")), AccountView::Selection);
    }

    #[tokio::test]
    async fn login_records_the_user() {
        let api = MockApi::new();
        let auth = AuthContext::new();
        let user = login(
            api.as_ref(),
            &auth,
            LoginRequest {
                identifier: " 3331234567 ".into(),
                password: "segreta".into(),
            },
            &LivenessToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(auth.user().await, Some(user));
    }

    #[tokio::test]
    async fn login_with_blank_fields_is_not_sent() {
        let api = MockApi::new();
        let err = login(
            api.as_ref(),
            &AuthContext::new(),
            LoginRequest {
                identifier: "".into(),
                password: "x".into(),
            },
            &LivenessToken::new(),
        )
        .await
        .unwrap_err();
        match err {
            PortalError::Validation { fields, .. } => assert_eq!(fields, vec!["identifier"]),
            other => panic!("unexpected {other:?}"),
        }
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn forgot_password_checks_locally_first() {
        let api = MockApi::new();
        let token = LivenessToken::new();
        let mut form = ForgotPasswordForm {
            identifier: "RSSMRA85M01H501Z".into(),
            new_password: "nuova".into(),
            repeat_password: "".into(),
        };
        match reset_password(api.as_ref(), &form, &token).await.unwrap_err() {
            PortalError::Validation { fields, message } => {
                assert_eq!(fields, vec!["repeatPassword"]);
                assert_eq!(message, FILL_ALL_FIELDS);
            }
            other => panic!("unexpected {other:?}"),
        }

        form.repeat_password = "diversa".into();
        match reset_password(api.as_ref(), &form, &token).await.unwrap_err() {
            PortalError::Validation { message, .. } => assert_eq!(message, PASSWORDS_DIFFER),
            other => panic!("unexpected {other:?}"),
        }
        assert!(api.calls().is_empty());

        form.repeat_password = "nuova".into();
        assert_eq!(
            reset_password(api.as_ref(), &form, &token).await.unwrap(),
            RESET_DONE
        );
    }

    #[tokio::test]
    async fn forgot_password_surfaces_backend_message() {
        let api = MockApi::new();
        api.fail("reset_password");
        let form = ForgotPasswordForm {
            identifier: "x".into(),
            new_password: "a".into(),
            repeat_password: "a".into(),
        };
        let err = reset_password(api.as_ref(), &form, &LivenessToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.backend_message(), Some("reset_password failed"));
    }

    #[tokio::test]
    async fn dashboard_needs_a_user_and_fetches_both_parts() {
        let api = MockApi::new();
        let auth = AuthContext::new();
        auth.initialize(api.as_ref()).await;
        let err = AccountPage::open(
            AccountView::Dashboard,
            &auth,
            api.as_ref(),
            &LivenessToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PortalError::Precondition(_)));

        let profile = UserProfile {
            id: 7,
            first_name: Some("Mario".into()),
            ..Default::default()
        };
        *api.user.lock().unwrap() = Some(profile.clone());
        *api.consultations.lock().unwrap() = vec![ConsultationItem {
            id: 1,
            doctor_name: "Dr. Luca Rossi".into(),
            ..Default::default()
        }];
        auth.login(profile.clone()).await;
        match AccountPage::open(
            AccountView::Dashboard,
            &auth,
            api.as_ref(),
            &LivenessToken::new(),
        )
        .await
        .unwrap()
        {
            AccountPage::Dashboard(dashboard) => {
                assert_eq!(dashboard.profile, profile);
                assert_eq!(dashboard.consultations.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(api.call_count("fetch_user"), 1);
        assert_eq!(api.call_count("fetch_user_consultations"), 1);
    }

    #[tokio::test]
    async fn account_page_waits_for_the_session_check() {
        let api = MockApi::new();
        let page = AccountPage::open(
            AccountView::Dashboard,
            &AuthContext::new(),
            api.as_ref(),
            &LivenessToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(page, AccountPage::Loading);
    }

    #[tokio::test]
    async fn profile_update_sends_nulls_and_refreshes_auth() {
        let api = MockApi::new();
        let auth = AuthContext::new();
        auth.login(UserProfile {
            id: 3,
            height_cm: Some(170.0),
            ..Default::default()
        })
        .await;
        let form = EditProfileForm {
            first_name: "Anna".into(),
            last_name: "Conti".into(),
            ..Default::default()
        };
        let updated = update_profile(api.as_ref(), &auth, &form, &LivenessToken::new())
            .await
            .unwrap();
        let (id, request) = api.last_update.lock().unwrap().clone().unwrap();
        assert_eq!(id, 3);
        assert_eq!(request.height_cm, None);
        assert_eq!(request.birth_date, None);
        assert_eq!(auth.user().await, Some(updated));
    }

    #[test]
    fn signup_requires_identity_and_checks_height() {
        let form = SignupForm {
            first_name: "Anna".into(),
            ..Default::default()
        };
        match form.to_request().unwrap_err() {
            PortalError::Validation { fields, .. } => assert_eq!(fields.len(), 5),
            other => panic!("unexpected {other:?}"),
        }
        let form = SignupForm {
            first_name: "Anna".into(),
            last_name: "Conti".into(),
            mobile_number: "333".into(),
            codice_fiscale: "cntnna90a41f205x".into(),
            birth_date: "1990-01-01".into(),
            height_cm: "centosessanta".into(),
            password: "p".into(),
        };
        assert!(form.to_request().is_err());
        let request = SignupForm {
            height_cm: "".into(),
            ..form
        }
        .to_request()
        .unwrap();
        assert_eq!(request.codice_fiscale, "CNTNNA90A41F205X");
        assert_eq!(request.height_cm, None);
    }
}
