use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::{ApiConnector, TriageApi};
use crate::config::PortalConfig;
use crate::error::{PortalError, Result};
use crate::models::{
    AssignDoctorRequest, ConsultationItem, ConsultationRequest, ConsultationResponse,
    DoctorQuery, LoginRequest, NewReview, RawDoctorPage, RegisterRequest, RegisterResponse,
    ResetPasswordRequest, SiteContent, UpdateUserRequest, UserProfile,
};
use crate::normalize::unwrap_doctor_page;

/// Builds one [`HttpTriageApi`] per browser session.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    base_url: String,
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(config: &PortalConfig) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            timeout: config.api_timeout,
        }
    }
}

impl ApiConnector for HttpConnector {
    fn connect(&self) -> Result<Arc<dyn TriageApi>> {
        Ok(Arc::new(HttpTriageApi::new(&self.base_url, self.timeout)?))
    }
}

/// reqwest client with its own cookie jar, so the backend's session cookie
/// stays with the browser session that logged in.
#[derive(Debug, Clone)]
pub struct HttpTriageApi {
    client: Client,
    base_url: String,
}

impl HttpTriageApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| PortalError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = backend_message(&body);
        warn!(status = status.as_u16(), message = ?message, "backend request failed");
        Err(PortalError::Server {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        Ok(response.json::<T>().await?)
    }

    /// Body as JSON, `Value::Null` when the backend answered with nothing.
    async fn send_value(&self, request: RequestBuilder) -> Result<Value> {
        let response = self.send(request).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| PortalError::Decode(e.to_string()))
    }
}

/// The `message` (or `error`) field of an error body, else the body itself
/// when it is short plain text.
pub(crate) fn backend_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => ["message", "error"]
            .iter()
            .find_map(|key| value.get(key).and_then(Value::as_str))
            .map(str::to_string),
        Err(_) if trimmed.len() <= 200 && !trimmed.starts_with('<') => Some(trimmed.to_string()),
        Err(_) => None,
    }
}

#[async_trait]
impl TriageApi for HttpTriageApi {
    #[instrument(skip_all)]
    async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse> {
        self.send_json(self.client.post(self.url("/auth/register")).json(request))
            .await
    }

    #[instrument(skip_all)]
    async fn login(&self, request: &LoginRequest) -> Result<UserProfile> {
        self.send_json(self.client.post(self.url("/auth/login")).json(request))
            .await
    }

    #[instrument(skip_all)]
    async fn reset_password(&self, request: &ResetPasswordRequest) -> Result<Option<String>> {
        let body = self
            .send_value(self.client.post(self.url("/auth/forgot-password")).json(request))
            .await?;
        Ok(body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    #[instrument(skip_all)]
    async fn current_user(&self) -> Result<Option<UserProfile>> {
        match self.send_value(self.client.get(self.url("/auth/me"))).await {
            Ok(Value::Null) => Ok(None),
            Ok(body) => Ok(Some(
                serde_json::from_value(body).map_err(|e| PortalError::Decode(e.to_string()))?,
            )),
            Err(PortalError::Server { status, .. })
                if status == StatusCode::UNAUTHORIZED.as_u16()
                    || status == StatusCode::FORBIDDEN.as_u16() =>
            {
                debug!("no backend session");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    #[instrument(skip(self), fields(page = query.page, size = query.size))]
    async fn fetch_doctors(&self, query: &DoctorQuery) -> Result<RawDoctorPage> {
        let body = self
            .send_value(self.client.get(self.url("/doctors")).query(query))
            .await?;
        let page = unwrap_doctor_page(body);
        debug!(count = page.doctors.len(), "doctors fetched");
        Ok(page)
    }

    #[instrument(skip(self))]
    async fn fetch_reviews(&self, doctor_id: i64) -> Result<Value> {
        self.send_value(
            self.client
                .get(self.url(&format!("/doctors/{doctor_id}/reviews"))),
        )
        .await
    }

    #[instrument(skip(self, review))]
    async fn post_review(&self, doctor_id: i64, review: &NewReview) -> Result<Value> {
        self.send_value(
            self.client
                .post(self.url(&format!("/doctors/{doctor_id}/reviews")))
                .json(review),
        )
        .await
    }

    #[instrument(skip_all)]
    async fn submit_consultation(
        &self,
        request: &ConsultationRequest,
    ) -> Result<ConsultationResponse> {
        self.send_json(self.client.post(self.url("/consultations")).json(request))
            .await
    }

    #[instrument(skip(self, request))]
    async fn assign_doctor(
        &self,
        consultation_id: i64,
        request: &AssignDoctorRequest,
    ) -> Result<ConsultationResponse> {
        self.send_json(
            self.client
                .put(self.url(&format!("/consultations/{consultation_id}/doctor")))
                .json(request),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn get_consultation(&self, consultation_id: i64) -> Result<ConsultationResponse> {
        self.send_json(
            self.client
                .get(self.url(&format!("/consultations/{consultation_id}"))),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn fetch_user(&self, user_id: i64) -> Result<UserProfile> {
        self.send_json(self.client.get(self.url(&format!("/users/{user_id}"))))
            .await
    }

    #[instrument(skip(self))]
    async fn fetch_user_consultations(&self, user_id: i64) -> Result<Vec<ConsultationItem>> {
        let body = self
            .send_value(
                self.client
                    .get(self.url(&format!("/users/{user_id}/consultations"))),
            )
            .await?;
        let rows = match body {
            Value::Array(rows) => rows,
            Value::Object(mut page) => match page.remove("content") {
                Some(Value::Array(rows)) => rows,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| PortalError::Decode(e.to_string())))
            .collect()
    }

    #[instrument(skip(self, request))]
    async fn update_user(&self, user_id: i64, request: &UpdateUserRequest) -> Result<UserProfile> {
        self.send_json(
            self.client
                .put(self.url(&format!("/users/{user_id}")))
                .json(request),
        )
        .await
    }

    #[instrument(skip_all)]
    async fn fetch_content(&self) -> Result<Vec<SiteContent>> {
        self.send_json(self.client.get(self.url("/content"))).await
    }
}
