//! Informational sections shown on the info page.

use serde::{Deserialize, Serialize};

use crate::api::TriageApi;
use crate::error::Result;
use crate::liveness::{LivenessToken, LoadState, track};
use crate::models::SiteContent;

pub const LOAD_FAILED: &str = "Errore nel caricamento dei contenuti.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoPage {
    pub sections: Vec<SiteContent>,
    pub load: LoadState,
}

impl InfoPage {
    /// Sections in display order; ties keep the backend's order.
    pub async fn load(api: &dyn TriageApi, token: &LivenessToken) -> Result<Self> {
        let mut page = Self::default();
        let mut sections = track(&mut page.load, token, LOAD_FAILED, api.fetch_content())
            .await
            .map_err(|e| e.for_page(LOAD_FAILED))?;
        sections.sort_by_key(|section| section.display_order);
        page.sections = sections;
        Ok(page)
    }

    pub fn section(&self, key: &str) -> Option<&SiteContent> {
        self.sections.iter().find(|s| s.section_key == key)
    }
}
