//! First step of the consultation: the symptom questionnaire.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{PortalError, Result};
use crate::models::{ConsultationRequest, UserProfile};
use crate::workflow_state::PatientDisplay;

pub const SUBMIT_FAILED: &str = "Errore nell'invio del questionario. Riprova tra poco.";
pub const REQUIRED_MISSING: &str = "Compila tutti i campi obbligatori.";

/// Symptom toggles offered by the form, by id.
pub const SYMPTOM_IDS: &[&str] = &[
    "mal-di-testa",
    "dolore-al-petto",
    "febbre",
    "stanchezza",
    "vertigini",
    "mancanza-respiro",
];

/// Form values exactly as the patient typed them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionnaireForm {
    pub nome: String,
    pub cognome: String,
    pub codice_fiscale: String,
    pub telefono: String,
    /// `m`, `f` or `altro`
    pub sesso: String,
    /// `yyyy-mm-dd`
    pub birth_date: String,
    pub altezza: String,
    pub peso: String,
    pub attivita: String,
    pub durata_sintomi: String,
    pub farmaci: String,
    pub descrizione_sintomi: String,
    pub pressione_sistolica: String,
    pub pressione_diastolica: String,
    pub symptoms: BTreeSet<String>,
    pub has_past_diseases: bool,
    pub has_nausea: bool,
}

impl Default for QuestionnaireForm {
    fn default() -> Self {
        Self {
            nome: String::new(),
            cognome: String::new(),
            codice_fiscale: String::new(),
            telefono: String::new(),
            sesso: String::new(),
            birth_date: String::new(),
            altezza: String::new(),
            peso: String::new(),
            attivita: String::new(),
            durata_sintomi: String::new(),
            farmaci: String::new(),
            descrizione_sintomi: String::new(),
            pressione_sistolica: String::new(),
            pressione_diastolica: String::new(),
            symptoms: BTreeSet::new(),
            has_past_diseases: true,
            has_nausea: false,
        }
    }
}

impl QuestionnaireForm {
    fn required(&self) -> [(&'static str, &str); 10] {
        [
            ("nome", &self.nome),
            ("cognome", &self.cognome),
            ("codiceFiscale", &self.codice_fiscale),
            ("telefono", &self.telefono),
            ("sesso", &self.sesso),
            ("birthDate", &self.birth_date),
            ("altezza", &self.altezza),
            ("peso", &self.peso),
            ("attivita", &self.attivita),
            ("durataSintomi", &self.durata_sintomi),
        ]
    }

    /// Every empty required field, in form order.
    pub fn missing_fields(&self) -> Vec<String> {
        self.required()
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Filled fields whose value cannot be used: non-numeric vitals, a birth
    /// date that is not a past `yyyy-mm-dd` date.
    pub fn invalid_fields(&self, today: NaiveDate) -> Vec<String> {
        let mut invalid = Vec::new();
        if !self.birth_date.trim().is_empty() && calculate_age(&self.birth_date, today).is_none() {
            invalid.push("birthDate".to_string());
        }
        // empty values are reported as missing, not invalid
        for (name, value) in [
            ("altezza", &self.altezza),
            ("peso", &self.peso),
            ("pressioneSistolica", &self.pressione_sistolica),
            ("pressioneDiastolica", &self.pressione_diastolica),
        ] {
            if !value.trim().is_empty() && parse_measure(value).is_none() {
                invalid.push(name.to_string());
            }
        }
        for symptom in &self.symptoms {
            if !SYMPTOM_IDS.contains(&symptom.as_str()) {
                invalid.push(format!("symptoms.{symptom}"));
            }
        }
        invalid
    }

    /// All missing fields are flagged in one go; nothing is sent until the
    /// whole form is usable.
    pub fn validate(&self, today: NaiveDate) -> Result<()> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(PortalError::Validation {
                fields: missing,
                message: REQUIRED_MISSING.to_string(),
            });
        }
        let invalid = self.invalid_fields(today);
        if !invalid.is_empty() {
            return Err(PortalError::Validation {
                fields: invalid,
                message: "Controlla i valori evidenziati.".to_string(),
            });
        }
        Ok(())
    }

    /// Payload for `POST /consultations`. Call after [`validate`](Self::validate).
    pub fn to_request(&self, today: NaiveDate) -> ConsultationRequest {
        ConsultationRequest {
            first_name: self.nome.trim().to_string(),
            last_name: self.cognome.trim().to_string(),
            codice_fiscale: self.codice_fiscale.trim().to_string(),
            phone_number: non_empty(&self.telefono),
            age: calculate_age(&self.birth_date, today).unwrap_or(0),
            gender: map_gender(&self.sesso),
            height_cm: parse_measure(&self.altezza).unwrap_or_default(),
            weight_kg: parse_measure(&self.peso).unwrap_or_default(),
            activity_level: map_activity(&self.attivita),
            has_past_diseases: self.has_past_diseases,
            current_medications: non_empty(&self.farmaci),
            nausea: self.has_nausea,
            headache: self.symptoms.contains("mal-di-testa"),
            fever: self.symptoms.contains("febbre"),
            dizziness: self.symptoms.contains("vertigini"),
            chest_pain: self.symptoms.contains("dolore-al-petto"),
            shortness_of_breath: self.symptoms.contains("mancanza-respiro"),
            fatigue: self.symptoms.contains("stanchezza"),
            systolic_pressure: parse_measure(&self.pressione_sistolica),
            diastolic_pressure: parse_measure(&self.pressione_diastolica),
            symptoms_description: non_empty(&self.descrizione_sintomi),
            symptoms_duration: non_empty(&self.durata_sintomi),
        }
    }

    pub fn patient_display(&self, today: NaiveDate) -> PatientDisplay {
        PatientDisplay {
            nome: self.nome.trim().to_string(),
            cognome: self.cognome.trim().to_string(),
            telefono: self.telefono.trim().to_string(),
            eta: calculate_age(&self.birth_date, today),
            altezza: self.altezza.trim().to_string(),
            peso: self.peso.trim().to_string(),
        }
    }

    /// Fill the form from the logged-in user's profile. Values the profile
    /// lacks are left as they are.
    pub fn prefill(&mut self, user: &UserProfile) {
        fill(&mut self.nome, user.first_name.as_deref());
        fill(&mut self.cognome, user.last_name.as_deref());
        fill(&mut self.codice_fiscale, user.codice_fiscale.as_deref());
        fill(&mut self.birth_date, user.birth_date.as_deref());
        if let Some(height) = user.height_cm.filter(|h| h.is_finite()) {
            self.altezza = format_measure(height);
        }
        if let Some(weight) = user.weight_kg.filter(|w| w.is_finite()) {
            self.peso = format_measure(weight);
        }
        if let Some(gender) = user.gender.as_deref() {
            self.sesso = gender_from_profile(gender);
        }
    }

    /// A logged-in patient cannot change their identity: name, codice fiscale,
    /// birth date and height always come from the profile.
    pub fn apply_locks(&mut self, user: &UserProfile) {
        let locked = {
            let mut profile_form = QuestionnaireForm::default();
            profile_form.prefill(user);
            profile_form
        };
        for (field, value) in [
            (&mut self.nome, locked.nome),
            (&mut self.cognome, locked.cognome),
            (&mut self.codice_fiscale, locked.codice_fiscale),
            (&mut self.birth_date, locked.birth_date),
            (&mut self.altezza, locked.altezza),
        ] {
            if !value.is_empty() {
                *field = value;
            }
        }
    }
}

/// Page model returned when the questionnaire is opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireView {
    pub form: QuestionnaireForm,
    pub locked_personal_info: bool,
    pub symptom_ids: Vec<String>,
}

impl QuestionnaireView {
    pub fn open(saved: Option<QuestionnaireForm>, user: Option<&UserProfile>) -> Self {
        let mut form = saved.unwrap_or_default();
        if let Some(user) = user {
            form.prefill(user);
        }
        Self {
            form,
            locked_personal_info: user.is_some(),
            symptom_ids: SYMPTOM_IDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Whole years between `birth_date` (`yyyy-mm-dd`) and `today`, counting a
/// year only once the birthday has passed. `None` for unparseable or future
/// dates.
pub fn calculate_age(birth_date: &str, today: NaiveDate) -> Option<u32> {
    let birth = NaiveDate::parse_from_str(birth_date.trim(), "%Y-%m-%d").ok()?;
    if birth > today {
        return None;
    }
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    u32::try_from(age).ok()
}

pub fn map_gender(sesso: &str) -> String {
    match sesso {
        "m" => "MALE".to_string(),
        "f" => "FEMALE".to_string(),
        "altro" => "OTHER".to_string(),
        other => other.to_string(),
    }
}

pub fn map_activity(attivita: &str) -> String {
    match attivita {
        "sedentario" => "SEDENTARIO".to_string(),
        "leggera" => "LEGGERA".to_string(),
        "moderata" => "MODERATA".to_string(),
        "attiva" => "ATTIVA".to_string(),
        "molto-attivo" => "MOLTO_ATTIVO".to_string(),
        other => other.to_string(),
    }
}

/// Backend gender back to the form's select value; unknown values clear it.
pub fn gender_from_profile(gender: &str) -> String {
    match gender.trim().to_uppercase().as_str() {
        "MALE" | "M" => "m".to_string(),
        "FEMALE" | "F" => "f".to_string(),
        "OTHER" | "ALTRO" => "altro".to_string(),
        _ => String::new(),
    }
}

fn parse_measure(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite() && *v > 0.0)
}

fn format_measure(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn fill(target: &mut String, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        *target = value.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn filled_form() -> QuestionnaireForm {
        QuestionnaireForm {
            nome: "Mario".into(),
            cognome: "Rossi".into(),
            codice_fiscale: "RSSMRA85M01H501Z".into(),
            telefono: "3331234567".into(),
            sesso: "m".into(),
            birth_date: "1985-08-01".into(),
            altezza: "180".into(),
            peso: "78.5".into(),
            attivita: "molto-attivo".into(),
            durata_sintomi: "1-2-giorni".into(),
            symptoms: ["febbre".to_string(), "mal-di-testa".to_string()].into(),
            ..Default::default()
        }
    }

    #[test]
    fn empty_form_flags_every_required_field_at_once() {
        let err = QuestionnaireForm::default().validate(today()).unwrap_err();
        match err {
            PortalError::Validation { fields, message } => {
                assert_eq!(fields.len(), 10);
                assert_eq!(fields[0], "nome");
                assert!(fields.contains(&"durataSintomi".to_string()));
                assert_eq!(message, REQUIRED_MISSING);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn partially_filled_form_flags_only_the_gaps() {
        let mut form = filled_form();
        form.telefono.clear();
        form.peso = "  ".into();
        assert_eq!(form.missing_fields(), vec!["telefono", "peso"]);
    }

    #[test]
    fn non_numeric_vitals_are_invalid() {
        let mut form = filled_form();
        form.altezza = "alto".into();
        form.pressione_sistolica = "120/80".into();
        match form.validate(today()).unwrap_err() {
            PortalError::Validation { fields, .. } => {
                assert_eq!(fields, vec!["altezza", "pressioneSistolica"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn request_uses_backend_enums_and_symptom_flags() {
        let form = filled_form();
        form.validate(today()).unwrap();
        let request = form.to_request(today());
        assert_eq!(request.first_name, "Mario");
        assert_eq!(request.gender, "MALE");
        assert_eq!(request.activity_level, "MOLTO_ATTIVO");
        assert_eq!(request.age, 39);
        assert_eq!(request.weight_kg, 78.5);
        assert!(request.fever && request.headache);
        assert!(!request.chest_pain && !request.nausea);
        assert!(request.has_past_diseases);
        assert_eq!(request.systolic_pressure, None);
        assert_eq!(request.current_medications, None);
    }

    #[test]
    fn unknown_enum_values_pass_through() {
        assert_eq!(map_gender("x"), "x");
        assert_eq!(map_activity("estremo"), "estremo");
    }

    #[test]
    fn age_counts_birthdays() {
        assert_eq!(calculate_age("2000-06-15", today()), Some(25));
        assert_eq!(calculate_age("2000-06-16", today()), Some(24));
        assert_eq!(calculate_age("2030-01-01", today()), None);
        assert_eq!(calculate_age("15/06/2000", today()), None);
    }

    #[test]
    fn profile_prefills_and_locks_identity() {
        let user = UserProfile {
            id: 1,
            first_name: Some("Giulia".into()),
            last_name: Some("Verdi".into()),
            codice_fiscale: Some("VRDGLI90A41F205X".into()),
            birth_date: Some("1990-01-01".into()),
            height_cm: Some(165.0),
            weight_kg: Some(58.5),
            gender: Some("FEMALE".into()),
            ..Default::default()
        };
        let view = QuestionnaireView::open(None, Some(&user));
        assert!(view.locked_personal_info);
        assert_eq!(view.form.altezza, "165");
        assert_eq!(view.form.peso, "58.5");
        assert_eq!(view.form.sesso, "f");

        let mut submitted = filled_form();
        submitted.apply_locks(&user);
        assert_eq!(submitted.nome, "Giulia");
        assert_eq!(submitted.altezza, "165");
        // weight and gender stay editable
        assert_eq!(submitted.peso, "78.5");
        assert_eq!(submitted.sesso, "m");
    }

    #[test]
    fn anonymous_view_is_unlocked() {
        let view = QuestionnaireView::open(None, None);
        assert!(!view.locked_personal_info);
        assert!(view.form.has_past_diseases);
        assert_eq!(view.symptom_ids.len(), 6);
    }
}
