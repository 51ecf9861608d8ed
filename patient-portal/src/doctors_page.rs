//! Public doctor directory, outside the consultation flow.

use serde::{Deserialize, Serialize};

use crate::api::TriageApi;
use crate::error::Result;
use crate::filter::{SpecialtyFilter, distinct_specialties, filter_directory};
use crate::liveness::{LivenessToken, LoadState, track};
use crate::models::DoctorQuery;
use crate::normalize::{Doctor, normalize_doctors};

pub const LOAD_FAILED: &str = "Errore nel caricamento dei medici. Riprova più tardi.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "doctors", rename_all = "camelCase")]
pub enum DirectoryResult {
    Doctors(Vec<Doctor>),
    /// The search matched nobody
    NoResults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryView {
    pub specialties: Vec<String>,
    pub search_term: String,
    pub specialty: SpecialtyFilter,
    pub total: usize,
    pub result: DirectoryResult,
}

/// The fetched directory. Filtering works on this list only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DoctorDirectory {
    pub doctors: Vec<Doctor>,
    pub load: LoadState,
}

impl DoctorDirectory {
    pub async fn load(
        api: &dyn TriageApi,
        page_size: u32,
        token: &LivenessToken,
    ) -> Result<Self> {
        let mut directory = Self::default();
        let query = DoctorQuery::with_size(page_size);
        let page = track(&mut directory.load, token, LOAD_FAILED, api.fetch_doctors(&query)).await?;
        directory.doctors = normalize_doctors(&page.doctors);
        Ok(directory)
    }

    pub fn view(&self, search_term: &str, specialty: SpecialtyFilter) -> DirectoryView {
        let matches: Vec<Doctor> = filter_directory(&self.doctors, search_term, &specialty)
            .into_iter()
            .cloned()
            .collect();
        DirectoryView {
            specialties: distinct_specialties(&self.doctors),
            search_term: search_term.to_string(),
            specialty,
            total: self.doctors.len(),
            result: if matches.is_empty() {
                DirectoryResult::NoResults
            } else {
                DirectoryResult::Doctors(matches)
            },
        }
    }
}
