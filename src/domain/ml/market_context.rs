//! Suburb-level smoothed price-per-area series.
//!
//! Built by the historical aggregator, read by the feature encoder. Lookups
//! are strictly historical: the value for a date comes from the latest period
//! that ended before that date's month began.

use crate::domain::property::Suburb;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Self {
        debug_assert!((1..=12).contains(&month));
        Self { year, month }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month())
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }

    /// Whole months from `earlier` to `self` (negative if `earlier` is later).
    pub fn months_since(self, earlier: Period) -> i64 {
        (self.year as i64 - earlier.year as i64) * 12 + (self.month as i64 - earlier.month as i64)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// One point of a suburb series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketPoint {
    pub period: Period,
    pub avg_price_per_area: f64,
    /// True when the trailing window held no observations and the previous value was reused.
    pub carried_forward: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    series: BTreeMap<Suburb, Vec<MarketPoint>>,
}

impl MarketContext {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Points must be sorted by period with no duplicates.
    pub fn from_series(series: BTreeMap<Suburb, Vec<MarketPoint>>) -> Self {
        debug_assert!(
            series
                .values()
                .all(|pts| pts.windows(2).all(|w| w[0].period < w[1].period))
        );
        Self { series }
    }

    pub fn series(&self, suburb: Suburb) -> &[MarketPoint] {
        self.series.get(&suburb).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(Vec::is_empty)
    }

    /// Smoothed $/m² known as of `date`, from the latest period strictly
    /// before `date`'s month. Past the end of the series the last value holds.
    pub fn lookup(&self, suburb: Suburb, date: NaiveDate) -> Option<f64> {
        let target = Period::from_date(date);
        let points = self.series(suburb);
        let idx = points.partition_point(|p| p.period < target);
        idx.checked_sub(1).map(|i| points[i].avg_price_per_area)
    }

    /// Most recent period across all suburbs.
    pub fn latest_period(&self) -> Option<Period> {
        self.series
            .values()
            .filter_map(|pts| pts.last().map(|p| p.period))
            .max()
    }
}
