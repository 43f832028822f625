//! Record shapes exchanged with the listing store.
//!
//! These mirror what the scraper persists: loosely typed, with most fields
//! optional. Conversion into `PropertyAttributes` is where the core applies
//! its own rules.

use super::attributes::{PropertyAttributes, Suburb};
use crate::domain::errors::ValuationError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Listing status as stored in `listing_history.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Sale,
    Sold,
}

impl ListingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ListingStatus::Sale => "sale",
            ListingStatus::Sold => "sold",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sale" => Ok(ListingStatus::Sale),
            "sold" => Ok(ListingStatus::Sold),
            _ => anyhow::bail!("Invalid listing status: {}. Must be 'sale' or 'sold'", s),
        }
    }
}

/// A sold property from the historical record source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoldRecord {
    pub property_id: String,
    pub suburb: String,
    pub sale_price: Option<i64>,
    /// ISO 8601 date as stored; anything else is unresolvable.
    pub sale_date: Option<String>,
    pub beds: Option<i64>,
    pub baths: Option<i64>,
    pub cars: Option<i64>,
    pub land_size: Option<f64>,
    pub property_type: Option<String>,
}

impl SoldRecord {
    /// Sale date when it resolves to a calendar date.
    pub fn resolved_sale_date(&self) -> Option<NaiveDate> {
        self.sale_date.as_deref().and_then(parse_iso_date)
    }

    /// Price per square metre, only defined for records with a real land size.
    pub fn price_per_area(&self) -> Option<f64> {
        let price = self.sale_price.filter(|p| *p > 0)? as f64;
        let land = self.land_size.filter(|l| l.is_finite() && *l > 0.0)?;
        Some(price / land)
    }

    /// Builds encoder input from this record, dated at its sale.
    pub fn to_attributes(&self) -> Result<PropertyAttributes, ValuationError> {
        let suburb = Suburb::from_str(&self.suburb)?;
        let attrs = PropertyAttributes::new(
            suburb,
            self.property_type.as_deref().unwrap_or_default(),
            count_field("beds", self.beds)?,
        );
        let attrs = match self.baths {
            Some(b) => attrs.with_bathrooms(count_field("baths", Some(b))?),
            None => attrs,
        };
        let attrs = match self.cars {
            Some(c) => attrs.with_car_spaces(count_field("cars", Some(c))?),
            None => attrs,
        };
        Ok(attrs
            .with_land_size(self.land_size)
            .with_date(self.resolved_sale_date()))
    }
}

/// The latest snapshot of a property currently on the market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSnapshot {
    pub property_id: String,
    pub suburb: String,
    pub property_type: Option<String>,
    pub beds: Option<i64>,
    pub baths: Option<i64>,
    pub cars: Option<i64>,
    /// Raw land size text (e.g. "450m²").
    pub land_size: Option<String>,
    pub list_date: Option<String>,
}

impl TryFrom<&ListingSnapshot> for PropertyAttributes {
    type Error = ValuationError;

    fn try_from(listing: &ListingSnapshot) -> Result<Self, Self::Error> {
        let suburb = Suburb::from_str(&listing.suburb)?;
        let mut attrs = PropertyAttributes::new(
            suburb,
            listing.property_type.as_deref().unwrap_or_default(),
            count_field("beds", listing.beds)?,
        );
        if listing.baths.is_some() {
            attrs = attrs.with_bathrooms(count_field("baths", listing.baths)?);
        }
        if listing.cars.is_some() {
            attrs = attrs.with_car_spaces(count_field("cars", listing.cars)?);
        }
        Ok(attrs
            .with_land_size(listing.land_size.as_deref().and_then(parse_land_size))
            .with_date(listing.list_date.as_deref().and_then(parse_iso_date)))
    }
}

fn count_field(field: &str, value: Option<i64>) -> Result<u32, ValuationError> {
    let value = value.ok_or_else(|| ValuationError::validation(field, "missing"))?;
    u32::try_from(value)
        .map_err(|_| ValuationError::validation(field, format!("must be non-negative, got {}", value)))
}

/// Extracts a positive land size from listing text such as `"450m²"` or `"1,200 m2"`.
pub fn parse_land_size(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("na") || trimmed == "-" {
        return None;
    }

    let number: String = trimmed
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .filter(|c| *c != ',')
        .collect();

    number.parse::<f64>().ok().filter(|v| *v > 0.0)
}

/// Parses `YYYY-MM-DD`, tolerating a trailing `T...` time component.
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.trim().split('T').next()?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}
