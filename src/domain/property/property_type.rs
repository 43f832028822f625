use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical property categories understood by the valuation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    House,
    Unit,
    Townhouse,
    Other,
}

/// Listing-site property type strings and the bucket each one consolidates into.
/// Anything not listed here (or empty) is `PropertyType::Other`.
const PROPERTY_TYPE_TABLE: &[(&str, PropertyType)] = &[
    ("house", PropertyType::House),
    ("free-standing", PropertyType::House),
    ("duplex", PropertyType::House),
    ("semi-detached", PropertyType::House),
    ("terrace", PropertyType::House),
    ("villa", PropertyType::House),
    ("acreage", PropertyType::House),
    ("rural", PropertyType::House),
    ("unit", PropertyType::Unit),
    ("apartment", PropertyType::Unit),
    ("apartment-unit-flat", PropertyType::Unit),
    ("studio", PropertyType::Unit),
    ("pent-house", PropertyType::Unit),
    ("penthouse", PropertyType::Unit),
    ("flat", PropertyType::Unit),
    ("serviced-apartment", PropertyType::Unit),
    ("townhouse", PropertyType::Townhouse),
    ("town-house", PropertyType::Townhouse),
];

impl PropertyType {
    /// Consolidates a free-form property type string into one of the four buckets.
    pub fn normalize(raw: &str) -> Self {
        let key = raw.trim().to_lowercase();
        PROPERTY_TYPE_TABLE
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, bucket)| *bucket)
            .unwrap_or(PropertyType::Other)
    }

    /// Land size assumed when a house or townhouse is listed without one.
    /// Strata and unrecognized stock carry no land.
    pub fn default_land_size(self) -> f64 {
        match self {
            PropertyType::House => 450.0,
            PropertyType::Townhouse => 200.0,
            PropertyType::Unit | PropertyType::Other => 0.0,
        }
    }

    /// Whether a land size is meaningful for this bucket.
    pub fn has_land(self) -> bool {
        matches!(self, PropertyType::House | PropertyType::Townhouse)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PropertyType::House => "house",
            PropertyType::Unit => "unit",
            PropertyType::Townhouse => "townhouse",
            PropertyType::Other => "other",
        }
    }

    /// All raw strings recognized by `normalize`, sorted.
    pub fn known_synonyms() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = PROPERTY_TYPE_TABLE.iter().map(|(n, _)| *n).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
