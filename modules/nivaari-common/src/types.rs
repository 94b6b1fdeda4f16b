use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Incident types ---

/// Canonical incident categories. Every free-form label a citizen or
/// moderator enters is normalized into one of these before it reaches a
/// filter or a map surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentType {
    Danger,
    Potholes,
    Traffic,
    Garbage,
    Streetlight,
    Water,
    Trees,
    Other,
}

/// Synonym table: lowercased label -> canonical type. Covers the canonical
/// ids themselves plus the citizen-facing labels the report form offers.
const SYNONYMS: &[(&str, IncidentType)] = &[
    // canonical ids
    ("danger", IncidentType::Danger),
    ("potholes", IncidentType::Potholes),
    ("traffic", IncidentType::Traffic),
    ("garbage", IncidentType::Garbage),
    ("streetlight", IncidentType::Streetlight),
    ("water", IncidentType::Water),
    ("trees", IncidentType::Trees),
    ("other", IncidentType::Other),
    // citizen-facing labels
    ("road damage", IncidentType::Potholes),
    ("water supply", IncidentType::Water),
    ("electricity", IncidentType::Streetlight),
    ("healthcare", IncidentType::Other),
    ("flooding", IncidentType::Water),
];

impl IncidentType {
    /// Normalize a free-form label into a canonical type.
    /// Empty, missing or unknown input maps to `Other`. Idempotent.
    pub fn normalize(input: Option<&str>) -> Self {
        let Some(input) = input else {
            return IncidentType::Other;
        };
        let s = input.trim().to_lowercase();
        SYNONYMS
            .iter()
            .find(|(label, _)| *label == s)
            .map(|(_, t)| *t)
            .unwrap_or(IncidentType::Other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentType::Danger => "danger",
            IncidentType::Potholes => "potholes",
            IncidentType::Traffic => "traffic",
            IncidentType::Garbage => "garbage",
            IncidentType::Streetlight => "streetlight",
            IncidentType::Water => "water",
            IncidentType::Trees => "trees",
            IncidentType::Other => "other",
        }
    }

    /// Strict parse of a canonical id. Unlike `normalize`, unknown input is
    /// rejected rather than widened to `Other`.
    pub fn from_id(s: &str) -> Option<Self> {
        match s {
            "danger" => Some(IncidentType::Danger),
            "potholes" => Some(IncidentType::Potholes),
            "traffic" => Some(IncidentType::Traffic),
            "garbage" => Some(IncidentType::Garbage),
            "streetlight" => Some(IncidentType::Streetlight),
            "water" => Some(IncidentType::Water),
            "trees" => Some(IncidentType::Trees),
            "other" => Some(IncidentType::Other),
            _ => None,
        }
    }

    /// Parse a comma-separated list of canonical ids; unknown entries are
    /// dropped. Returns `None` when nothing usable remains, meaning
    /// "no type filter".
    pub fn parse_set(csv: &str) -> Option<Vec<IncidentType>> {
        let types: Vec<IncidentType> = csv
            .split(',')
            .map(str::trim)
            .filter_map(IncidentType::from_id)
            .collect();
        if types.is_empty() {
            None
        } else {
            Some(types)
        }
    }

    /// All known raw labels that normalize into this type.
    pub fn raw_labels(&self) -> Vec<&'static str> {
        SYNONYMS
            .iter()
            .filter(|(_, t)| t == self)
            .map(|(label, _)| *label)
            .collect()
    }

    /// All known raw labels that normalize into something other than `Other`.
    /// A filter selecting `Other` matches any label *not* in this set.
    pub fn known_concrete_labels() -> Vec<&'static str> {
        SYNONYMS
            .iter()
            .filter(|(_, t)| *t != IncidentType::Other)
            .map(|(label, _)| *label)
            .collect()
    }
}

impl std::fmt::Display for IncidentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// --- Geo types ---

/// A point that is guaranteed to have numeric coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Report location as submitted: the form may only have a free-text address,
/// so coordinates are optional. Rows without numeric lat/lng never appear on
/// a map surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Location {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        }
    }
}

/// Viewport bounding box. Corners are normalized so min <= max on both axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn new(lat_a: f64, lng_a: f64, lat_b: f64, lng_b: f64) -> Self {
        Self {
            min_lat: lat_a.min(lat_b),
            max_lat: lat_a.max(lat_b),
            min_lng: lng_a.min(lng_b),
            max_lng: lng_a.max(lng_b),
        }
    }

    /// Parse `"minLat,minLng,maxLat,maxLng"`. Returns `None` unless exactly
    /// four finite numbers are present — a malformed bbox means "no bbox
    /// filter", not an error.
    pub fn parse(raw: &str) -> Option<Self> {
        let parts: Vec<f64> = raw
            .split(',')
            .map(|n| n.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .ok()?;
        if parts.len() != 4 || !parts.iter().all(|n| n.is_finite()) {
            return None;
        }
        Some(Self::new(parts[0], parts[1], parts[2], parts[3]))
    }

    /// Closed-interval containment on both axes.
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lng >= self.min_lng && lng <= self.max_lng
    }
}

// --- Map feed parameters ---

/// Which slice of the map the client is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    /// Moderator-dropped pins.
    Current,
    /// Reviewed reports (moderator decisions).
    Past,
    /// Citizen reports awaiting review.
    Incoming,
}

impl TimeWindow {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "past" => TimeWindow::Past,
            "incoming" => TimeWindow::Incoming,
            _ => TimeWindow::Current,
        }
    }
}

/// Decision-status filter for the `past` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewedFilter {
    #[default]
    All,
    Accepted,
    Rejected,
}

impl ViewedFilter {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "accepted" => ViewedFilter::Accepted,
            "rejected" => ViewedFilter::Rejected,
            _ => ViewedFilter::All,
        }
    }

    /// The decision statuses this filter selects. "Fixed" decisions were
    /// accepted first, so they count as accepted.
    pub fn statuses(&self) -> &'static [&'static str] {
        match self {
            ViewedFilter::All => &["approved", "rejected", "fixed"],
            ViewedFilter::Accepted => &["approved", "fixed"],
            ViewedFilter::Rejected => &["rejected"],
        }
    }
}

// --- Map pin view ---

/// Which collection a map pin was assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinSource {
    Current,
    Past,
    Incoming,
}

/// The homogeneous pin shape the unified map feed hands to clients,
/// regardless of source collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapPinView {
    pub id: Uuid,
    pub source: PinSource,
    pub label: String,
    pub type_id: IncidentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub location: Coordinates,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_canonical_ids_are_fixed_points() {
        for t in [
            "danger",
            "potholes",
            "traffic",
            "garbage",
            "streetlight",
            "water",
            "trees",
            "other",
        ] {
            assert_eq!(IncidentType::normalize(Some(t)).as_str(), t);
        }
    }

    #[test]
    fn normalize_is_idempotent() {
        for input in ["Road Damage", "WATER SUPPLY", "electricity", "nonsense", "", "  Flooding  "] {
            let once = IncidentType::normalize(Some(input));
            let twice = IncidentType::normalize(Some(once.as_str()));
            assert_eq!(once, twice, "normalize(normalize({input:?}))");
        }
    }

    #[test]
    fn normalize_synonyms_collapse() {
        assert_eq!(IncidentType::normalize(Some("Road Damage")), IncidentType::Potholes);
        assert_eq!(
            IncidentType::normalize(Some("Road Damage")),
            IncidentType::normalize(Some("potholes"))
        );
        assert_eq!(IncidentType::normalize(Some("Water Supply")), IncidentType::Water);
        assert_eq!(IncidentType::normalize(Some("Flooding")), IncidentType::Water);
        assert_eq!(IncidentType::normalize(Some("Electricity")), IncidentType::Streetlight);
        assert_eq!(IncidentType::normalize(Some("Healthcare")), IncidentType::Other);
    }

    #[test]
    fn normalize_unknown_and_empty_fall_back_to_other() {
        assert_eq!(IncidentType::normalize(None), IncidentType::Other);
        assert_eq!(IncidentType::normalize(Some("")), IncidentType::Other);
        assert_eq!(IncidentType::normalize(Some("   ")), IncidentType::Other);
        assert_eq!(IncidentType::normalize(Some("ufo sighting")), IncidentType::Other);
    }

    #[test]
    fn parse_set_drops_unknown_entries() {
        let set = IncidentType::parse_set("potholes, water ,bogus").unwrap();
        assert_eq!(set, vec![IncidentType::Potholes, IncidentType::Water]);
        assert!(IncidentType::parse_set("bogus,??").is_none());
        assert!(IncidentType::parse_set("").is_none());
    }

    #[test]
    fn raw_labels_cover_synonyms() {
        let labels = IncidentType::Water.raw_labels();
        assert!(labels.contains(&"water"));
        assert!(labels.contains(&"water supply"));
        assert!(labels.contains(&"flooding"));
        assert!(!labels.contains(&"potholes"));
    }

    #[test]
    fn known_concrete_labels_exclude_other() {
        let labels = IncidentType::known_concrete_labels();
        assert!(labels.contains(&"road damage"));
        assert!(!labels.contains(&"other"));
        assert!(!labels.contains(&"healthcare"));
    }

    #[test]
    fn bbox_parses_and_normalizes_swapped_corners() {
        let a = BoundingBox::parse("12.0,77.0,13.0,78.0").unwrap();
        let b = BoundingBox::parse("13.0,78.0,12.0,77.0").unwrap();
        assert_eq!(a, b);
        assert!(a.contains(12.5, 77.5));
        assert!(a.contains(12.0, 77.0)); // closed interval
        assert!(a.contains(13.0, 78.0));
        assert!(!a.contains(11.99, 77.5));
    }

    #[test]
    fn bbox_rejects_malformed_input() {
        assert!(BoundingBox::parse("").is_none());
        assert!(BoundingBox::parse("1,2,3").is_none());
        assert!(BoundingBox::parse("1,2,3,4,5").is_none());
        assert!(BoundingBox::parse("1,2,three,4").is_none());
        assert!(BoundingBox::parse("1,2,NaN,4").is_none());
        assert!(BoundingBox::parse("1,2,inf,4").is_none());
    }

    #[test]
    fn viewed_filter_status_sets() {
        assert_eq!(ViewedFilter::parse("accepted").statuses(), &["approved", "fixed"]);
        assert_eq!(ViewedFilter::parse("rejected").statuses(), &["rejected"]);
        assert_eq!(ViewedFilter::parse("anything").statuses(), &["approved", "rejected", "fixed"]);
    }

    #[test]
    fn time_window_defaults_to_current() {
        assert_eq!(TimeWindow::parse("past"), TimeWindow::Past);
        assert_eq!(TimeWindow::parse("incoming"), TimeWindow::Incoming);
        assert_eq!(TimeWindow::parse("whatever"), TimeWindow::Current);
    }
}
