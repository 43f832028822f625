use super::property_type::PropertyType;
use crate::domain::errors::ValuationError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_BATHROOMS: u32 = 2;
pub const DEFAULT_CAR_SPACES: u32 = 1;

/// The two tracked suburbs. Baulkham Hills is the baseline for the suburb one-hot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Suburb {
    #[serde(rename = "BAULKHAM HILLS")]
    BaulkhamHills,
    #[serde(rename = "CASTLE HILL")]
    CastleHill,
}

impl Suburb {
    pub const ALL: [Suburb; 2] = [Suburb::BaulkhamHills, Suburb::CastleHill];

    pub fn as_str(self) -> &'static str {
        match self {
            Suburb::BaulkhamHills => "BAULKHAM HILLS",
            Suburb::CastleHill => "CASTLE HILL",
        }
    }
}

impl fmt::Display for Suburb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Suburb {
    type Err = ValuationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        if upper.contains("CASTLE") {
            Ok(Suburb::CastleHill)
        } else if upper.contains("BAULKHAM") {
            Ok(Suburb::BaulkhamHills)
        } else {
            Err(ValuationError::validation(
                "suburb",
                format!("'{}' is not a tracked suburb", s),
            ))
        }
    }
}

/// Raw description of a property to be valued.
///
/// Optional inputs get their defaults here, at construction time, and
/// `property_type` is normalized once on the way in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyAttributes {
    pub suburb: Suburb,
    pub property_type: PropertyType,
    /// The caller's original type string, kept for the input snapshot.
    pub property_type_raw: String,
    pub beds: u32,
    pub bathrooms: u32,
    pub car_spaces: u32,
    /// Square metres. `None` for strata stock or when the listing omitted it.
    pub land_size: Option<f64>,
    pub sale_or_list_date: Option<NaiveDate>,
}

impl PropertyAttributes {
    pub fn new(suburb: Suburb, property_type: &str, beds: u32) -> Self {
        Self {
            suburb,
            property_type: PropertyType::normalize(property_type),
            property_type_raw: property_type.to_string(),
            beds,
            bathrooms: DEFAULT_BATHROOMS,
            car_spaces: DEFAULT_CAR_SPACES,
            land_size: None,
            sale_or_list_date: None,
        }
    }

    pub fn with_bathrooms(mut self, bathrooms: u32) -> Self {
        self.bathrooms = bathrooms;
        self
    }

    pub fn with_car_spaces(mut self, car_spaces: u32) -> Self {
        self.car_spaces = car_spaces;
        self
    }

    /// Zero or negative sizes are treated as "not supplied".
    pub fn with_land_size(mut self, land_size: Option<f64>) -> Self {
        self.land_size = land_size.filter(|v| *v > 0.0);
        self
    }

    pub fn with_date(mut self, date: Option<NaiveDate>) -> Self {
        self.sale_or_list_date = date;
        self
    }

    /// Rejects attributes the encoder cannot turn into a meaningful vector.
    pub fn validate(&self) -> Result<(), ValuationError> {
        if self.beds == 0 {
            return Err(ValuationError::validation("beds", "must be at least 1"));
        }
        if self.bathrooms == 0 {
            return Err(ValuationError::validation("bathrooms", "must be at least 1"));
        }
        if let Some(land) = self.land_size
            && (!land.is_finite() || land <= 0.0)
        {
            return Err(ValuationError::validation(
                "land_size",
                format!("must be a positive finite number, got {}", land),
            ));
        }
        Ok(())
    }

    /// True when the caller supplied a usable land size.
    pub fn has_real_land_size(&self) -> bool {
        self.land_size.is_some_and(|v| v.is_finite() && v > 0.0)
    }
}
