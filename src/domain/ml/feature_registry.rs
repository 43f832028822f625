use serde::{Deserialize, Serialize};

/// Ordered list of feature names.
/// This order MUST match the order the persisted model was trained with.
/// Any change here is a breaking change for saved models.
pub const FEATURE_NAMES: &[&str] = &[
    "land_size_numeric",
    "beds",
    "baths",
    "cars",
    "bedroom_to_land_ratio",
    "bathroom_to_bedroom_ratio",
    "suburb_castle_hill",
    "property_type_house",
    "property_type_unit",
    "property_type_townhouse",
    "is_house_large_land",
    "has_real_land_size",
    "is_spring",
    "is_summer",
    "is_autumn",
    "is_winter",
    "years_since_sale",
    "rolling_avg_price_per_m2",
];

pub const FEATURE_COUNT: usize = 18;

// Column positions, named for readability at call sites.
pub const IDX_LAND_SIZE: usize = 0;
pub const IDX_BEDS: usize = 1;
pub const IDX_BATHS: usize = 2;
pub const IDX_CARS: usize = 3;
pub const IDX_BEDROOM_TO_LAND: usize = 4;
pub const IDX_BATHROOM_TO_BEDROOM: usize = 5;
pub const IDX_SUBURB_CASTLE_HILL: usize = 6;
pub const IDX_TYPE_HOUSE: usize = 7;
pub const IDX_TYPE_UNIT: usize = 8;
pub const IDX_TYPE_TOWNHOUSE: usize = 9;
pub const IDX_HOUSE_LARGE_LAND: usize = 10;
pub const IDX_HAS_REAL_LAND: usize = 11;
pub const IDX_SPRING: usize = 12;
pub const IDX_SUMMER: usize = 13;
pub const IDX_AUTUMN: usize = 14;
pub const IDX_WINTER: usize = 15;
pub const IDX_YEARS_SINCE_SALE: usize = 16;
pub const IDX_ROLLING_AVG: usize = 17;

/// Fixed-order numeric input to the regressor. Every slot is always populated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.to_vec()
    }

    pub fn get(&self, index: usize) -> f64 {
        self.0[index]
    }

    /// Looks up a feature by its registry name.
    pub fn by_name(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|idx| self.0[idx])
    }

    /// Name of the first non-finite feature, if any.
    pub fn first_non_finite(&self) -> Option<&'static str> {
        self.0
            .iter()
            .position(|v| !v.is_finite())
            .map(|idx| FEATURE_NAMES[idx])
    }

    /// Values that are legal but unusual for the two suburbs. Never fatal.
    pub fn sanity_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.0[IDX_BEDS] > 10.0 {
            warnings.push(format!("Unusual bedroom count: {}", self.0[IDX_BEDS]));
        }
        if self.0[IDX_BATHS] > 8.0 {
            warnings.push(format!("Unusual bathroom count: {}", self.0[IDX_BATHS]));
        }
        if self.0[IDX_LAND_SIZE] > 10_000.0 {
            warnings.push(format!("Unusual land size: {}", self.0[IDX_LAND_SIZE]));
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_length() {
        assert_eq!(FEATURE_NAMES.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_index_constants_match_names() {
        assert_eq!(FEATURE_NAMES[IDX_LAND_SIZE], "land_size_numeric");
        assert_eq!(FEATURE_NAMES[IDX_HAS_REAL_LAND], "has_real_land_size");
        assert_eq!(FEATURE_NAMES[IDX_SPRING], "is_spring");
        assert_eq!(FEATURE_NAMES[IDX_WINTER], "is_winter");
        assert_eq!(FEATURE_NAMES[IDX_ROLLING_AVG], "rolling_avg_price_per_m2");
    }

    #[test]
    fn test_by_name_and_warnings() {
        let mut values = [0.0; FEATURE_COUNT];
        values[IDX_BEDS] = 12.0;
        values[IDX_LAND_SIZE] = 600.0;
        let fv = FeatureVector::from_array(values);

        assert_eq!(fv.by_name("beds"), Some(12.0));
        assert_eq!(fv.by_name("nonexistent"), None);
        assert_eq!(fv.sanity_warnings().len(), 1);
        assert!(fv.first_non_finite().is_none());
    }
}
