//! Wire types exchanged with the triage backend.
//!
//! Response types are deliberately loose: every field is optional and ids are
//! accepted as numbers or numeric strings, since the backend is not consistent
//! about either.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Accept `12`, `"12"` or `null` for an optional numeric id.
pub fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(id_from_value))
}

/// Accept a missing or `null` list as empty.
pub fn lenient_list<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) fn id_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationRequest {
    pub first_name: String,
    pub last_name: String,
    pub codice_fiscale: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub age: u32,
    pub gender: String,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub activity_level: String,
    pub has_past_diseases: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_medications: Option<String>,
    pub nausea: bool,
    pub headache: bool,
    pub fever: bool,
    pub dizziness: bool,
    pub chest_pain: bool,
    pub shortness_of_breath: bool,
    pub fatigue: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub systolic_pressure: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diastolic_pressure: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symptoms_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symptoms_duration: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsultationDoctor {
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub specialty: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
}

impl ConsultationDoctor {
    pub fn display_name(&self) -> Option<String> {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        (!name.is_empty()).then_some(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsultationResponse {
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<i64>,
    #[serde(deserialize_with = "lenient_id")]
    pub doctor_id: Option<i64>,
    pub urgency: Option<String>,
    pub message: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub recommendations: Vec<String>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub codice_fiscale: Option<String>,
    pub phone_number: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity_level: Option<String>,
    pub has_medical_history: Option<bool>,
    pub current_medications: Option<String>,
    pub nausea: Option<bool>,
    pub headache: Option<bool>,
    pub fever: Option<bool>,
    pub dizziness: Option<bool>,
    pub chest_pain: Option<bool>,
    pub fatigue: Option<bool>,
    pub shortness_of_breath: Option<bool>,
    pub systolic_pressure: Option<f64>,
    pub diastolic_pressure: Option<f64>,
    pub symptoms_description: Option<String>,
    pub symptoms_duration: Option<String>,
    pub doctor: Option<ConsultationDoctor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignDoctorRequest {
    pub doctor_id: i64,
    /// ISO date, `yyyy-MM-dd`
    pub appointment_date: String,
    /// `HH:mm`
    pub appointment_time: String,
}

/// Query parameters of `GET /doctors`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoctorQuery {
    pub page: u32,
    pub size: u32,
    pub city: String,
    pub specialty: String,
    pub name: String,
}

impl Default for DoctorQuery {
    fn default() -> Self {
        Self {
            page: 0,
            size: 6,
            city: String::new(),
            specialty: String::new(),
            name: String::new(),
        }
    }
}

impl DoctorQuery {
    pub fn with_size(size: u32) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }
}

/// Doctor records as the backend sent them, after unwrapping the page shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDoctorPage {
    pub doctors: Vec<Value>,
    pub total_pages: Option<u32>,
    pub total_elements: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub patient_name: String,
    pub rating: f64,
    pub comment: Option<String>,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub rating: u8,
    pub comment: String,
    pub patient_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub mobile_number: String,
    pub codice_fiscale: String,
    pub birth_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<f64>,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisteredUser {
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mobile_number: Option<String>,
    pub codice_fiscale: Option<String>,
    pub birth_date: Option<String>,
    pub height_cm: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RegisterResponse {
    pub user: Option<RegisteredUser>,
    #[serde(deserialize_with = "lenient_list")]
    pub consultations: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Mobile number or codice fiscale
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub identifier: String,
    pub new_password: String,
}

/// The authenticated user as returned by `/auth/login`, `/auth/me` and `/users/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub mobile_number: Option<String>,
    #[serde(default)]
    pub codice_fiscale: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub gender: Option<String>,
}

impl UserProfile {
    /// `first last`, trimmed; empty when neither name is known.
    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }
}

/// Body of `PUT /users/{id}`. Unset optional values are sent as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mobile_number: Option<String>,
    pub codice_fiscale: Option<String>,
    pub birth_date: Option<String>,
    pub height_cm: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsultationItem {
    pub id: i64,
    pub doctor_name: String,
    pub doctor_specialty: Option<String>,
    pub doctor_city: Option<String>,
    pub problem_summary: Option<String>,
    pub request_date_time: Option<String>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub request_date: Option<String>,
    pub problem: Option<String>,
    #[serde(deserialize_with = "lenient_id")]
    pub doctor_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteContent {
    pub id: i64,
    pub section_key: String,
    pub title: String,
    pub content: String,
    pub display_order: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn consultation_response_tolerates_string_ids_and_missing_fields() {
        let response: ConsultationResponse = serde_json::from_value(json!({
            "id": "17",
            "urgency": "LOW",
            "doctor": { "id": 3, "firstName": "Giuseppe", "lastName": "Bianchi" }
        }))
        .unwrap();

        assert_eq!(response.id, Some(17));
        assert!(response.recommendations.is_empty());
        let doctor = response.doctor.unwrap();
        assert_eq!(doctor.id, Some(3));
        assert_eq!(doctor.display_name().as_deref(), Some("Giuseppe Bianchi"));
    }

    #[test]
    fn null_lists_decode_as_empty() {
        let response: ConsultationResponse = serde_json::from_value(json!({
            "id": 7,
            "urgency": "LOW",
            "recommendations": null,
            "message": null
        }))
        .unwrap();
        assert_eq!(response.id, Some(7));
        assert!(response.recommendations.is_empty());
        assert_eq!(response.message, None);

        let registered: RegisterResponse =
            serde_json::from_value(json!({ "user": null, "consultations": null })).unwrap();
        assert!(registered.consultations.is_empty());
    }

    #[test]
    fn consultation_request_skips_unset_optionals() {
        let request = ConsultationRequest {
            first_name: "Mario".into(),
            systolic_pressure: None,
            ..Default::default()
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["firstName"], "Mario");
        assert!(value.get("systolicPressure").is_none());
        assert_eq!(value["shortnessOfBreath"], false);
    }

    #[test]
    fn update_user_sends_nulls() {
        let value = serde_json::to_value(UpdateUserRequest::default()).unwrap();
        assert!(value["heightCm"].is_null());
        assert!(value["birthDate"].is_null());
    }
}
