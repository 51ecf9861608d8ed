//! Second step of the consultation: pick a doctor, a date and a slot.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::TriageApi;
use crate::error::{PortalError, Result};
use crate::filter::filter_cards;
use crate::liveness::{LivenessToken, LoadState, track};
use crate::models::{AssignDoctorRequest, DoctorQuery};
use crate::normalize::{DoctorCardData, normalize_cards};
use crate::placement::{DEFAULT_MAP_CENTER, GeoPoint, PlacementProvider};
use crate::workflow_state::AppointmentChoice;

pub const LOAD_FAILED: &str = "Errore nel caricamento dei medici. Riprova più tardi.";
pub const SUBMIT_FAILED: &str = "Errore nel salvataggio dell'appuntamento. Riprova.";
pub const NO_CONSULTATION: &str =
    "Nessun consultationId disponibile. Completa prima il questionario.";
pub const FIELD_REQUIRED: &str = "Campo obbligatorio";

/// Everything the selection page remembers between requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DoctorSelection {
    pub doctors: Vec<DoctorCardData>,
    pub selected_id: Option<String>,
    pub search_term: String,
    /// `yyyy-mm-dd`, empty until chosen
    pub date: String,
    /// One of the selected doctor's slots, empty until chosen
    pub time: String,
    pub show_map: bool,
    pub show_errors: bool,
    pub load: LoadState,
    pub submit: LoadState,
}

impl Default for DoctorSelection {
    fn default() -> Self {
        Self {
            doctors: Vec::new(),
            selected_id: None,
            search_term: String::new(),
            date: String::new(),
            time: String::new(),
            show_map: true,
            show_errors: false,
            load: LoadState::Idle,
            submit: LoadState::Idle,
        }
    }
}

/// Partial update sent by the page. Fields are applied in declaration order,
/// so a search runs before the doctor choice it may invalidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectionUpdate {
    pub search_term: Option<String>,
    pub doctor_id: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub show_map: Option<bool>,
}

impl DoctorSelection {
    pub fn needs_load(&self) -> bool {
        self.doctors.is_empty() || self.load.error().is_some()
    }

    /// Replace the doctor list with a fresh fetch and select the first match.
    pub fn set_doctors(&mut self, doctors: Vec<DoctorCardData>) {
        self.doctors = doctors;
        self.selected_id = None;
        self.reconcile_selection();
    }

    pub fn filtered(&self) -> Vec<&DoctorCardData> {
        filter_cards(&self.doctors, &self.search_term)
    }

    /// The selected doctor, if it is still in the list.
    pub fn selected(&self) -> Option<&DoctorCardData> {
        let id = self.selected_id.as_deref()?;
        self.doctors.iter().find(|doctor| doctor.id == id)
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
        self.reconcile_selection();
    }

    /// Keep the selection inside the filtered list: nothing when the list is
    /// empty, the first entry when the current doctor was filtered out.
    fn reconcile_selection(&mut self) {
        let first = {
            let filtered = self.filtered();
            let keep = self
                .selected_id
                .as_deref()
                .is_some_and(|id| filtered.iter().any(|d| d.id == id));
            if keep {
                return;
            }
            filtered.first().map(|d| d.id.clone())
        };
        self.change_doctor(first);
    }

    fn change_doctor(&mut self, id: Option<String>) {
        if self.selected_id == id {
            return;
        }
        self.selected_id = id;
        let slot_still_offered = self
            .selected()
            .is_some_and(|doctor| doctor.slots.contains(&self.time));
        if !slot_still_offered {
            self.time.clear();
        }
    }

    pub fn select_doctor(&mut self, id: &str) -> Result<()> {
        if !self.filtered().iter().any(|d| d.id == id) {
            return Err(PortalError::validation(
                "doctor",
                "Medico non presente nella lista.",
            ));
        }
        self.change_doctor(Some(id.to_string()));
        Ok(())
    }

    /// Any date change drops the chosen slot. An empty value clears the date.
    pub fn set_date(&mut self, date: &str) -> Result<()> {
        let date = date.trim();
        if !date.is_empty() && NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
            return Err(PortalError::validation("date", "Data non valida."));
        }
        self.date = date.to_string();
        self.time.clear();
        Ok(())
    }

    pub fn set_time(&mut self, time: &str) -> Result<()> {
        let time = time.trim();
        if time.is_empty() {
            self.time.clear();
            return Ok(());
        }
        if !self.time_options().iter().any(|slot| slot == time) {
            return Err(PortalError::validation(
                "time",
                "Orario non disponibile per il medico scelto.",
            ));
        }
        self.time = time.to_string();
        Ok(())
    }

    /// Slots offered to the patient: none before a date is chosen, otherwise
    /// exactly the selected doctor's slots.
    pub fn time_options(&self) -> Vec<String> {
        if self.date.is_empty() {
            return Vec::new();
        }
        self.selected()
            .map(|doctor| doctor.slots.clone())
            .unwrap_or_default()
    }

    pub fn apply(&mut self, update: SelectionUpdate) -> Result<()> {
        if let Some(term) = update.search_term {
            self.set_search(term);
        }
        if let Some(id) = update.doctor_id {
            self.select_doctor(&id)?;
        }
        if let Some(date) = update.date {
            self.set_date(&date)?;
        }
        if let Some(time) = update.time {
            self.set_time(&time)?;
        }
        if let Some(show_map) = update.show_map {
            self.show_map = show_map;
        }
        Ok(())
    }

    /// Missing doctor, date or time, each flagged separately.
    pub fn missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.selected().is_none() {
            missing.push("doctor".to_string());
        }
        if self.date.is_empty() {
            missing.push("date".to_string());
        }
        if self.time.is_empty() {
            missing.push("time".to_string());
        }
        missing
    }

    /// Assignment payload plus what the consult page shows about it. Fails with
    /// per-field errors when the choice is incomplete.
    pub fn prepare_assignment(&mut self) -> Result<(AssignDoctorRequest, AppointmentChoice)> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            self.show_errors = true;
            return Err(PortalError::Validation {
                fields: missing,
                message: FIELD_REQUIRED.to_string(),
            });
        }
        let doctor = self
            .selected()
            .ok_or_else(|| PortalError::validation("doctor", FIELD_REQUIRED))?;
        let doctor_id: i64 = doctor.id.parse().map_err(|_| {
            PortalError::validation("doctor", "Questo medico non può essere prenotato.")
        })?;

        let request = AssignDoctorRequest {
            doctor_id,
            appointment_date: self.date.clone(),
            appointment_time: self.time.clone(),
        };
        let choice = AppointmentChoice {
            date: self.date.clone(),
            time: self.time.clone(),
            doctor_id: doctor.id.clone(),
            doctor_name: doctor.name.clone(),
            doctor_specialty: doctor.role.clone(),
            doctor_address: doctor.address.clone(),
        };
        self.show_errors = false;
        Ok((request, choice))
    }

    /// Fetch and normalize the doctor list, replacing whatever was shown.
    pub async fn load_doctors(
        &mut self,
        api: &dyn TriageApi,
        placement: &dyn PlacementProvider,
        page_size: u32,
        token: &LivenessToken,
    ) -> Result<()> {
        let query = DoctorQuery::with_size(page_size);
        let page = track(&mut self.load, token, LOAD_FAILED, api.fetch_doctors(&query)).await?;
        let cards = normalize_cards(&page.doctors, placement);
        info!(count = cards.len(), "doctor list loaded");
        self.set_doctors(cards);
        Ok(())
    }

    pub fn view(&self) -> DoctorSelectionView {
        let filtered: Vec<DoctorCardData> = self.filtered().into_iter().cloned().collect();
        let map_center = self
            .selected()
            .filter(|d| filtered.iter().any(|f| f.id == d.id))
            .map(|d| d.position)
            .unwrap_or(DEFAULT_MAP_CENTER);
        let field_errors = if self.show_errors {
            self.missing_fields()
        } else {
            Vec::new()
        };
        debug!(shown = filtered.len(), total = self.doctors.len(), "selection view");
        DoctorSelectionView {
            result_count: filtered.len(),
            doctors: filtered,
            selected_id: self.selected_id.clone(),
            search_term: self.search_term.clone(),
            date: self.date.clone(),
            time: self.time.clone(),
            time_options: self.time_options(),
            map_center,
            show_map: self.show_map,
            field_errors,
            load: self.load.clone(),
            submit: self.submit.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorSelectionView {
    pub doctors: Vec<DoctorCardData>,
    pub result_count: usize,
    pub selected_id: Option<String>,
    pub search_term: String,
    pub date: String,
    pub time: String,
    pub time_options: Vec<String>,
    pub map_center: GeoPoint,
    pub show_map: bool,
    pub field_errors: Vec<String>,
    pub load: LoadState,
    pub submit: LoadState,
}
