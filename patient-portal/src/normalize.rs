//! Conversion of loosely-typed backend records into fully-populated view models.
//!
//! Every function here is total: missing, null or oddly-typed fields fall back
//! to a placeholder instead of failing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{RawDoctorPage, Review};
use crate::placement::{GeoPoint, PlacementProvider};

/// Name shown for a doctor with no usable name fields.
pub const FALLBACK_DOCTOR_NAME: &str = "Medico";

const AVAILABILITY_MESSAGE: &str =
    "Questo medico è attualmente disponibile e potrà rispondere al tuo consulto entro poche ore.";

/// A doctor as listed on the directory page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub specialty: String,
    pub city: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub rating: f64,
    pub reviews_count: u64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A doctor as shown on the selection step: card, map marker and slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorCardData {
    pub id: String,
    pub name: String,
    /// Specialty
    pub role: String,
    pub address: String,
    pub distance_km: f64,
    pub rating: f64,
    pub available: bool,
    pub message: Option<String>,
    pub position: GeoPoint,
    pub slots: Vec<String>,
}

/// Unwrap the shapes `GET /doctors` is known to answer with: a Spring-style
/// page (`content` + totals), a bare array, a single object, or anything else.
pub fn unwrap_doctor_page(body: Value) -> RawDoctorPage {
    match body {
        Value::Object(mut map) if map.get("content").is_some_and(Value::is_array) => {
            let total_pages = map
                .get("totalPages")
                .and_then(Value::as_u64)
                .map(|n| n as u32);
            let total_elements = map.get("totalElements").and_then(Value::as_u64);
            let doctors = match map.remove("content") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            RawDoctorPage {
                doctors,
                total_pages,
                total_elements,
            }
        }
        Value::Array(items) => RawDoctorPage {
            doctors: items,
            ..RawDoctorPage::default()
        },
        Value::Object(map) => RawDoctorPage {
            doctors: vec![Value::Object(map)],
            ..RawDoctorPage::default()
        },
        _ => RawDoctorPage::default(),
    }
}

fn fields(record: &Value) -> Option<&Map<String, Value>> {
    record.as_object()
}

/// Non-empty string field.
fn text(record: &Value, key: &str) -> Option<String> {
    match fields(record)?.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Finite number, or a string holding one.
fn number(record: &Value, key: &str) -> Option<f64> {
    let parsed = match fields(record)?.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

/// A missing or blank id falls back to the record's position in the list.
fn record_id(record: &Value, index: usize) -> String {
    match fields(record).and_then(|map| map.get("id")) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => index.to_string(),
    }
}

/// Full name, else `first last`, else [`FALLBACK_DOCTOR_NAME`].
pub fn doctor_name(record: &Value) -> String {
    if let Some(full) = text(record, "fullName") {
        return full;
    }
    let joined = [text(record, "firstName"), text(record, "lastName")]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        FALLBACK_DOCTOR_NAME.to_string()
    } else {
        joined
    }
}

pub fn normalize_doctor(record: &Value, index: usize) -> Doctor {
    let full_name = doctor_name(record);
    let (first_from_full, rest_from_full) = match full_name.split_once(' ') {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (full_name.clone(), String::new()),
    };

    let reviews_count = number(record, "reviewsCount")
        .or_else(|| number(record, "totalReviews"))
        .map(|n| n.max(0.0) as u64)
        .unwrap_or(0);

    Doctor {
        id: record_id(record, index),
        first_name: text(record, "firstName").unwrap_or(first_from_full),
        last_name: text(record, "lastName").unwrap_or(rest_from_full),
        full_name,
        specialty: text(record, "specialty").unwrap_or_default(),
        city: text(record, "city").unwrap_or_default(),
        address: text(record, "address").unwrap_or_default(),
        phone: text(record, "phone").unwrap_or_default(),
        email: text(record, "email").unwrap_or_default(),
        rating: number(record, "rating").unwrap_or(0.0),
        reviews_count,
        latitude: number(record, "latitude"),
        longitude: number(record, "longitude"),
    }
}

pub fn normalize_doctors(records: &[Value]) -> Vec<Doctor> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| normalize_doctor(record, index))
        .collect()
}

/// Map position for the doctor at `index`: the record's own coordinates when
/// it has both, otherwise a point on a small circle around its city centre so
/// doctors of the same city do not overlap.
pub fn doctor_position(
    record: &Value,
    index: usize,
    placement: &dyn PlacementProvider,
) -> GeoPoint {
    if let (Some(lat), Some(lon)) = (number(record, "latitude"), number(record, "longitude")) {
        return (lat, lon);
    }

    let city = text(record, "city").unwrap_or_default();
    let (base_lat, base_lon) = placement
        .city_center(&city)
        .unwrap_or_else(|| placement.default_center());
    let angle = index as f64;
    (base_lat + 0.02 * angle.cos(), base_lon + 0.02 * angle.sin())
}

pub fn normalize_card(
    record: &Value,
    index: usize,
    placement: &dyn PlacementProvider,
) -> DoctorCardData {
    let id = record_id(record, index);
    let address = [text(record, "address"), text(record, "city")]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ");

    DoctorCardData {
        name: doctor_name(record),
        role: text(record, "specialty").unwrap_or_default(),
        address,
        distance_km: placement.distance_km(index),
        rating: number(record, "rating").unwrap_or(0.0),
        available: true,
        message: Some(AVAILABILITY_MESSAGE.to_string()),
        position: doctor_position(record, index, placement),
        slots: placement.slots_for(&id),
        id,
    }
}

pub fn normalize_cards(records: &[Value], placement: &dyn PlacementProvider) -> Vec<DoctorCardData> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| normalize_card(record, index, placement))
        .collect()
}

pub fn normalize_review(record: &Value, index: usize) -> Review {
    Review {
        id: text(record, "id")
            .or_else(|| number(record, "id").map(|n| (n as i64).to_string()))
            .unwrap_or_else(|| index.to_string()),
        patient_name: text(record, "patientName").unwrap_or_default(),
        rating: number(record, "rating").unwrap_or(0.0),
        comment: text(record, "comment"),
        date: text(record, "date").unwrap_or_default(),
    }
}

/// Reviews from a response body; anything but an array yields no reviews.
pub fn normalize_reviews(body: &Value) -> Vec<Review> {
    match body {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, record)| normalize_review(record, index))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::StaticPlacement;
    use serde_json::json;

    #[test]
    fn records_without_names_become_medico() {
        let records = vec![
            json!({}),
            json!({ "fullName": null, "firstName": "", "lastName": "   " }),
            json!({ "firstName": 12, "specialty": "Cardiologia" }),
            json!(null),
            json!("not even an object"),
        ];
        for card in normalize_cards(&records, &StaticPlacement) {
            assert_eq!(card.name, "Medico");
        }
        for doctor in normalize_doctors(&records) {
            assert_eq!(doctor.full_name, "Medico");
            assert_eq!(doctor.first_name, "Medico");
            assert_eq!(doctor.last_name, "");
        }
    }

    #[test]
    fn blank_ids_fall_back_to_the_position() {
        let records = vec![json!({ "id": "" }), json!({ "id": " 9 " }), json!({ "id": 4 })];
        let ids: Vec<String> = normalize_doctors(&records)
            .into_iter()
            .map(|doctor| doctor.id)
            .collect();
        assert_eq!(ids, ["0", "9", "4"]);
    }

    #[test]
    fn name_resolution_order() {
        assert_eq!(
            doctor_name(&json!({ "fullName": "Dr. Anna Conti", "firstName": "X" })),
            "Dr. Anna Conti"
        );
        assert_eq!(
            doctor_name(&json!({ "firstName": "Luca", "lastName": "Rossi" })),
            "Luca Rossi"
        );
        assert_eq!(doctor_name(&json!({ "lastName": "Ferrari" })), "Ferrari");
    }

    #[test]
    fn explicit_coordinates_are_kept_exactly() {
        let record = json!({ "latitude": 41.12345, "longitude": 16.54321, "city": "Milano" });
        for index in [0, 1, 7] {
            assert_eq!(
                doctor_position(&record, index, &StaticPlacement),
                (41.12345, 16.54321)
            );
        }
    }

    #[test]
    fn half_coordinates_fall_back_to_city() {
        let record = json!({ "latitude": 41.0, "longitude": null, "city": "Roma" });
        let (lat, lon) = doctor_position(&record, 0, &StaticPlacement);
        assert!((lat - (41.9028 + 0.02)).abs() < 1e-9);
        assert!((lon - 12.4964).abs() < 1e-9);
    }

    #[test]
    fn same_city_positions_never_collide() {
        let records: Vec<Value> = (0..50).map(|_| json!({ "city": "Bologna" })).collect();
        let cards = normalize_cards(&records, &StaticPlacement);
        for (i, a) in cards.iter().enumerate() {
            for b in cards.iter().skip(i + 1) {
                assert_ne!(a.position, b.position);
            }
        }
    }

    #[test]
    fn unknown_city_uses_default_center() {
        let card = normalize_card(&json!({ "city": "Gotham" }), 0, &StaticPlacement);
        assert!((card.position.0 - (45.4642 + 0.02)).abs() < 1e-9);
        assert!((card.position.1 - 9.19).abs() < 1e-9);
    }

    #[test]
    fn card_fields_have_safe_defaults() {
        let card = normalize_card(
            &json!({ "id": 9, "address": "Via Roma 1", "city": "Torino", "rating": "4.5" }),
            2,
            &StaticPlacement,
        );
        assert_eq!(card.id, "9");
        assert_eq!(card.address, "Via Roma 1, Torino");
        assert_eq!(card.rating, 4.5);
        assert_eq!(card.distance_km, 2.0);
        assert_eq!(card.slots, vec!["09:00", "11:00", "14:00", "16:00"]);
        assert!(card.available);

        let bare = normalize_card(&json!({ "rating": "great" }), 3, &StaticPlacement);
        assert_eq!(bare.id, "3");
        assert_eq!(bare.address, "");
        assert_eq!(bare.rating, 0.0);
    }

    #[test]
    fn slot_table_is_keyed_by_doctor_id() {
        let card = normalize_card(&json!({ "id": "rossi" }), 0, &StaticPlacement);
        assert_eq!(card.slots, vec!["09:00", "10:30", "12:00", "15:00", "16:30"]);
    }

    #[test]
    fn listing_splits_full_name() {
        let doctor = normalize_doctor(
            &json!({ "fullName": "Giuseppe Maria Bianchi", "totalReviews": 4 }),
            0,
        );
        assert_eq!(doctor.first_name, "Giuseppe");
        assert_eq!(doctor.last_name, "Maria Bianchi");
        assert_eq!(doctor.reviews_count, 4);
    }

    #[test]
    fn page_shapes() {
        let paged = unwrap_doctor_page(json!({
            "content": [{ "id": 1 }, { "id": 2 }],
            "totalPages": 3,
            "totalElements": 14
        }));
        assert_eq!(paged.doctors.len(), 2);
        assert_eq!(paged.total_pages, Some(3));
        assert_eq!(paged.total_elements, Some(14));

        assert_eq!(unwrap_doctor_page(json!([{ "id": 1 }])).doctors.len(), 1);
        assert_eq!(unwrap_doctor_page(json!({ "id": 1 })).doctors.len(), 1);
        assert!(unwrap_doctor_page(json!("nope")).doctors.is_empty());
        assert!(unwrap_doctor_page(Value::Null).doctors.is_empty());
    }

    #[test]
    fn reviews_from_non_array_are_empty() {
        assert!(normalize_reviews(&json!({ "reviews": [] })).is_empty());
        let reviews = normalize_reviews(&json!([
            { "id": 5, "patientName": "Paziente", "rating": 4, "date": "2025-01-02" },
            { "comment": "Gentile" }
        ]));
        assert_eq!(reviews[0].id, "5");
        assert_eq!(reviews[0].rating, 4.0);
        assert_eq!(reviews[1].comment.as_deref(), Some("Gentile"));
        assert_eq!(reviews[1].id, "1");
    }
}
