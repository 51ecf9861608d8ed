//! Client-side search over already-fetched doctor lists.

use serde::{Deserialize, Serialize};

use crate::normalize::{Doctor, DoctorCardData};

/// Cards whose name, specialty or address contain `term` (trimmed,
/// case-insensitive). An empty term keeps every card.
pub fn filter_cards<'a>(cards: &'a [DoctorCardData], term: &str) -> Vec<&'a DoctorCardData> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return cards.iter().collect();
    }
    cards
        .iter()
        .filter(|card| {
            [card.name.as_str(), card.role.as_str(), card.address.as_str()]
                .join(" ")
                .to_lowercase()
                .contains(&term)
        })
        .collect()
}

/// Specialty dropdown of the directory page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum SpecialtyFilter {
    #[default]
    All,
    Only(String),
}

impl SpecialtyFilter {
    /// `"all"` or empty selects everything, any other value an exact specialty.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") | Some("all") => SpecialtyFilter::All,
            Some(specialty) => SpecialtyFilter::Only(specialty.to_string()),
        }
    }

    pub fn matches(&self, specialty: &str) -> bool {
        match self {
            SpecialtyFilter::All => true,
            SpecialtyFilter::Only(wanted) => wanted == specialty,
        }
    }
}

/// Distinct specialties in order of first appearance.
pub fn distinct_specialties(doctors: &[Doctor]) -> Vec<String> {
    let mut seen = Vec::new();
    for doctor in doctors {
        if !seen.contains(&doctor.specialty) {
            seen.push(doctor.specialty.clone());
        }
    }
    seen
}

/// Directory search: the term must occur in the full name, city or specialty,
/// and the specialty must pass `specialty`.
pub fn filter_directory<'a>(
    doctors: &'a [Doctor],
    term: &str,
    specialty: &SpecialtyFilter,
) -> Vec<&'a Doctor> {
    let term = term.to_lowercase();
    doctors
        .iter()
        .filter(|doctor| {
            let full_name = format!("{} {}", doctor.first_name, doctor.last_name).to_lowercase();
            let matches_search = full_name.contains(&term)
                || doctor.city.to_lowercase().contains(&term)
                || doctor.specialty.to_lowercase().contains(&term);
            matches_search && specialty.matches(&doctor.specialty)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{normalize_cards, normalize_doctors};
    use crate::placement::StaticPlacement;
    use serde_json::json;

    fn cards() -> Vec<DoctorCardData> {
        normalize_cards(
            &[
                json!({ "id": 1, "fullName": "Dr. Luca Rossi", "specialty": "Medicina Generale", "city": "Milano" }),
                json!({ "id": 2, "fullName": "Dr. Giuseppe Bianchi", "specialty": "Cardiologia", "city": "Roma" }),
                json!({ "id": 3, "fullName": "Dr.ssa Anna Conti", "specialty": "Dermatologia", "city": "Torino" }),
                json!({ "id": 4, "fullName": "Dr. Marco Ferrari", "specialty": "Pediatria", "address": "Via Manzoni 3" }),
            ],
            &StaticPlacement,
        )
    }

    #[test]
    fn search_by_surname_finds_one_doctor() {
        let cards = cards();
        let found = filter_cards(&cards, "Bianchi");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Dr. Giuseppe Bianchi");
    }

    #[test]
    fn search_covers_specialty_and_address() {
        let cards = cards();
        assert_eq!(filter_cards(&cards, "  cardio ").len(), 1);
        let by_address = filter_cards(&cards, "via manzoni");
        assert_eq!(by_address.len(), 1);
        assert_eq!(by_address[0].id, "4");
        assert_eq!(filter_cards(&cards, "torino")[0].id, "3");
        assert_eq!(filter_cards(&cards, "").len(), 4);
        assert!(filter_cards(&cards, "oncologia").is_empty());
    }

    fn directory() -> Vec<Doctor> {
        normalize_doctors(&[
            json!({ "id": 1, "firstName": "Luca", "lastName": "Rossi", "specialty": "Cardiologia", "city": "Milano" }),
            json!({ "id": 2, "firstName": "Anna", "lastName": "Conti", "specialty": "Dermatologia", "city": "Roma" }),
            json!({ "id": 3, "firstName": "Paolo", "lastName": "Verdi", "specialty": "Cardiologia", "city": "Roma" }),
        ])
    }

    #[test]
    fn specialties_are_distinct_in_order() {
        assert_eq!(
            distinct_specialties(&directory()),
            vec!["Cardiologia".to_string(), "Dermatologia".to_string()]
        );
    }

    #[test]
    fn directory_combines_text_and_specialty() {
        let doctors = directory();
        let cardiology = SpecialtyFilter::parse(Some("Cardiologia"));
        assert_eq!(filter_directory(&doctors, "roma", &cardiology).len(), 1);
        assert_eq!(filter_directory(&doctors, "roma", &SpecialtyFilter::All).len(), 2);
        assert_eq!(filter_directory(&doctors, "LUCA ROSSI", &SpecialtyFilter::All).len(), 1);
        assert!(filter_directory(&doctors, "napoli", &SpecialtyFilter::All).is_empty());
        assert_eq!(SpecialtyFilter::parse(Some("all")), SpecialtyFilter::All);
    }
}
