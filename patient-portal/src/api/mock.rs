//! Recording stand-in for the backend used by unit and router tests.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use super::{ApiConnector, TriageApi};
use crate::error::{PortalError, Result};
use crate::models::{
    AssignDoctorRequest, ConsultationItem, ConsultationRequest, ConsultationResponse,
    DoctorQuery, LoginRequest, NewReview, RawDoctorPage, RegisterRequest, RegisterResponse,
    ResetPasswordRequest, SiteContent, UpdateUserRequest, UserProfile,
};

#[derive(Default)]
pub struct MockApi {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
    pub doctors: Mutex<Vec<Value>>,
    pub reviews: Mutex<Vec<Value>>,
    pub consultation: Mutex<ConsultationResponse>,
    pub user: Mutex<Option<UserProfile>>,
    pub consultations: Mutex<Vec<ConsultationItem>>,
    pub content: Mutex<Vec<SiteContent>>,
    pub last_consultation: Mutex<Option<ConsultationRequest>>,
    pub last_assignment: Mutex<Option<(i64, AssignDoctorRequest)>>,
    pub last_review: Mutex<Option<(i64, NewReview)>>,
    pub last_query: Mutex<Option<DoctorQuery>>,
    pub last_update: Mutex<Option<(i64, UpdateUserRequest)>>,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Three doctors and a consultation with id 42.
    pub fn seeded() -> Arc<Self> {
        let api = Self::new();
        *api.doctors.lock().unwrap() = vec![
            json!({ "id": 1, "fullName": "Dr. Luca Rossi", "specialty": "Medicina Generale", "city": "Milano", "rating": 4.5 }),
            json!({ "id": 2, "firstName": "Giuseppe", "lastName": "Bianchi", "specialty": "Cardiologia", "city": "Roma", "rating": "4.8" }),
            json!({ "id": 3, "fullName": "Dr.ssa Anna Conti", "specialty": "Dermatologia", "city": "Torino" }),
        ];
        *api.consultation.lock().unwrap() = ConsultationResponse {
            id: Some(42),
            urgency: Some("MEDIUM".into()),
            ..Default::default()
        };
        api
    }

    pub fn fail(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|c| *c == operation).count()
    }

    fn record(&self, operation: &'static str) -> Result<()> {
        self.calls.lock().unwrap().push(operation.to_string());
        if self.failing.lock().unwrap().contains(operation) {
            return Err(PortalError::Server {
                status: 500,
                message: Some(format!("{operation} failed")),
            });
        }
        Ok(())
    }
}

pub struct MockConnector(pub Arc<MockApi>);

impl ApiConnector for MockConnector {
    fn connect(&self) -> Result<Arc<dyn TriageApi>> {
        Ok(self.0.clone())
    }
}

#[async_trait]
impl TriageApi for MockApi {
    async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse> {
        self.record("register")?;
        Ok(RegisterResponse {
            user: Some(crate::models::RegisteredUser {
                id: Some(9),
                first_name: Some(request.first_name.clone()),
                last_name: Some(request.last_name.clone()),
                ..Default::default()
            }),
            consultations: Vec::new(),
        })
    }

    async fn login(&self, _request: &LoginRequest) -> Result<UserProfile> {
        self.record("login")?;
        Ok(self.user.lock().unwrap().clone().unwrap_or(UserProfile {
            id: 9,
            first_name: Some("Mario".into()),
            last_name: Some("Rossi".into()),
            ..Default::default()
        }))
    }

    async fn reset_password(&self, _request: &ResetPasswordRequest) -> Result<Option<String>> {
        self.record("reset_password")?;
        Ok(Some("Password aggiornata".into()))
    }

    async fn current_user(&self) -> Result<Option<UserProfile>> {
        self.record("current_user")?;
        Ok(self.user.lock().unwrap().clone())
    }

    async fn fetch_doctors(&self, query: &DoctorQuery) -> Result<RawDoctorPage> {
        self.record("fetch_doctors")?;
        *self.last_query.lock().unwrap() = Some(query.clone());
        Ok(RawDoctorPage {
            doctors: self.doctors.lock().unwrap().clone(),
            ..Default::default()
        })
    }

    async fn fetch_reviews(&self, _doctor_id: i64) -> Result<Value> {
        self.record("fetch_reviews")?;
        Ok(Value::Array(self.reviews.lock().unwrap().clone()))
    }

    async fn post_review(&self, doctor_id: i64, review: &NewReview) -> Result<Value> {
        self.record("post_review")?;
        *self.last_review.lock().unwrap() = Some((doctor_id, review.clone()));
        Ok(json!({ "id": "new" }))
    }

    async fn submit_consultation(
        &self,
        request: &ConsultationRequest,
    ) -> Result<ConsultationResponse> {
        self.record("submit_consultation")?;
        *self.last_consultation.lock().unwrap() = Some(request.clone());
        Ok(self.consultation.lock().unwrap().clone())
    }

    async fn assign_doctor(
        &self,
        consultation_id: i64,
        request: &AssignDoctorRequest,
    ) -> Result<ConsultationResponse> {
        self.record("assign_doctor")?;
        *self.last_assignment.lock().unwrap() = Some((consultation_id, request.clone()));
        let mut consultation = self.consultation.lock().unwrap().clone();
        consultation.doctor_id = Some(request.doctor_id);
        consultation.appointment_date = Some(request.appointment_date.clone());
        consultation.appointment_time = Some(request.appointment_time.clone());
        Ok(consultation)
    }

    async fn get_consultation(&self, _consultation_id: i64) -> Result<ConsultationResponse> {
        self.record("get_consultation")?;
        Ok(self.consultation.lock().unwrap().clone())
    }

    async fn fetch_user(&self, user_id: i64) -> Result<UserProfile> {
        self.record("fetch_user")?;
        self.user
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| PortalError::NotFound(format!("user {user_id}")))
    }

    async fn fetch_user_consultations(&self, _user_id: i64) -> Result<Vec<ConsultationItem>> {
        self.record("fetch_user_consultations")?;
        Ok(self.consultations.lock().unwrap().clone())
    }

    async fn update_user(&self, user_id: i64, request: &UpdateUserRequest) -> Result<UserProfile> {
        self.record("update_user")?;
        *self.last_update.lock().unwrap() = Some((user_id, request.clone()));
        Ok(UserProfile {
            id: user_id,
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            mobile_number: request.mobile_number.clone(),
            codice_fiscale: request.codice_fiscale.clone(),
            birth_date: request.birth_date.clone(),
            height_cm: request.height_cm,
            ..Default::default()
        })
    }

    async fn fetch_content(&self) -> Result<Vec<SiteContent>> {
        self.record("fetch_content")?;
        Ok(self.content.lock().unwrap().clone())
    }
}
