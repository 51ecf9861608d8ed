//! Client side of the triage backend's REST API.

mod http;
#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{
    AssignDoctorRequest, ConsultationItem, ConsultationRequest, ConsultationResponse,
    DoctorQuery, LoginRequest, NewReview, RawDoctorPage, RegisterRequest, RegisterResponse,
    ResetPasswordRequest, SiteContent, UpdateUserRequest, UserProfile,
};

pub use http::{HttpConnector, HttpTriageApi};

/// Every backend call the portal makes. One instance belongs to one browser
/// session, since the backend keeps its login in a session cookie.
#[async_trait]
pub trait TriageApi: Send + Sync {
    async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse>;

    async fn login(&self, request: &LoginRequest) -> Result<UserProfile>;

    /// Returns the confirmation message the backend sent, if any.
    async fn reset_password(&self, request: &ResetPasswordRequest) -> Result<Option<String>>;

    /// `Ok(None)` when the backend has no logged-in user for this session.
    async fn current_user(&self) -> Result<Option<UserProfile>>;

    async fn fetch_doctors(&self, query: &DoctorQuery) -> Result<RawDoctorPage>;

    /// Raw review records, normalized by the caller.
    async fn fetch_reviews(&self, doctor_id: i64) -> Result<Value>;

    async fn post_review(&self, doctor_id: i64, review: &NewReview) -> Result<Value>;

    async fn submit_consultation(
        &self,
        request: &ConsultationRequest,
    ) -> Result<ConsultationResponse>;

    async fn assign_doctor(
        &self,
        consultation_id: i64,
        request: &AssignDoctorRequest,
    ) -> Result<ConsultationResponse>;

    async fn get_consultation(&self, consultation_id: i64) -> Result<ConsultationResponse>;

    async fn fetch_user(&self, user_id: i64) -> Result<UserProfile>;

    async fn fetch_user_consultations(&self, user_id: i64) -> Result<Vec<ConsultationItem>>;

    async fn update_user(&self, user_id: i64, request: &UpdateUserRequest) -> Result<UserProfile>;

    async fn fetch_content(&self) -> Result<Vec<SiteContent>>;
}

/// Hands out a fresh API client for each new browser session.
pub trait ApiConnector: Send + Sync {
    fn connect(&self) -> Result<Arc<dyn TriageApi>>;
}
