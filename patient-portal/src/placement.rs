//! Stand-in data for map placement, distances and bookable slots.
//!
//! The backend has no geolocation or scheduling service yet. Everything here is
//! fictional and sits behind [`PlacementProvider`] so a real service can
//! replace it without touching the normalization code.

/// (latitude, longitude)
pub type GeoPoint = (f64, f64);

/// Where the map centres when nothing is selected.
pub const DEFAULT_MAP_CENTER: GeoPoint = (45.4668, 9.19);

pub trait PlacementProvider: Send + Sync {
    /// Centre of a known city, looked up case-insensitively.
    fn city_center(&self, city: &str) -> Option<GeoPoint>;

    /// Centre used when the city is unknown or missing.
    fn default_center(&self) -> GeoPoint;

    /// Distance shown on the doctor card for the doctor at `index`.
    fn distance_km(&self, index: usize) -> f64;

    /// Bookable slots for a doctor. Never empty.
    fn slots_for(&self, doctor_id: &str) -> Vec<String>;
}

const CITY_CENTERS: &[(&str, GeoPoint)] = &[
    ("milano", (45.4642, 9.19)),
    ("roma", (41.9028, 12.4964)),
    ("napoli", (40.8518, 14.2681)),
    ("torino", (45.0703, 7.6869)),
    ("bologna", (44.4949, 11.3426)),
    ("firenze", (43.7696, 11.2558)),
    ("trieste", (45.6495, 13.7768)),
    ("venezia", (45.4408, 12.3155)),
    ("verona", (45.4384, 10.9916)),
    ("genova", (44.4056, 8.9463)),
    ("palermo", (38.1157, 13.3615)),
    ("bari", (41.1171, 16.8719)),
    ("catania", (37.5079, 15.083)),
    ("padova", (45.4064, 11.8768)),
    ("brescia", (45.5416, 10.2118)),
    ("parma", (44.8015, 10.3279)),
    ("modena", (44.6471, 10.9252)),
    ("reggio_emilia", (44.6989, 10.6297)),
    ("perugia", (43.1107, 12.3908)),
    ("udine", (46.0625, 13.2346)),
];

const DOCTOR_SLOTS: &[(&str, &[&str])] = &[
    ("rossi", &["09:00", "10:30", "12:00", "15:00", "16:30"]),
    ("bianchi", &["09:30", "11:00", "14:00", "15:30", "17:00"]),
    ("conti", &["10:00", "11:30", "13:30", "16:00"]),
    ("ferrari", &["09:00", "10:00", "11:00", "14:30", "16:30"]),
];

const FALLBACK_SLOTS: &[&str] = &["09:00", "11:00", "14:00", "16:00"];

/// Static tables of Italian city centres and a handful of doctor calendars.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPlacement;

impl PlacementProvider for StaticPlacement {
    fn city_center(&self, city: &str) -> Option<GeoPoint> {
        let key = city.trim().to_lowercase();
        CITY_CENTERS
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, center)| *center)
    }

    fn default_center(&self) -> GeoPoint {
        // milano
        CITY_CENTERS[0].1
    }

    fn distance_km(&self, index: usize) -> f64 {
        let raw = 0.8 + (index % 4) as f64 * 0.6;
        (raw * 10.0).round() / 10.0
    }

    fn slots_for(&self, doctor_id: &str) -> Vec<String> {
        DOCTOR_SLOTS
            .iter()
            .find(|(id, _)| *id == doctor_id)
            .map(|(_, slots)| *slots)
            .unwrap_or(FALLBACK_SLOTS)
            .iter()
            .map(|slot| slot.to_string())
            .collect()
    }
}
