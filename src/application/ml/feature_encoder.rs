use crate::domain::clock::{Clock, SystemClock};
use crate::domain::errors::ValuationError;
use crate::domain::ml::feature_registry::*;
use crate::domain::ml::market_context::MarketContext;
use crate::domain::property::{PropertyAttributes, PropertyType, Suburb};
use chrono::{Datelike, NaiveDate};
use std::sync::Arc;
use tracing::warn;

/// Land above this size marks a house as "large land" (only when the size was supplied).
const LARGE_LAND_THRESHOLD_M2: f64 = 500.0;
const DAYS_PER_YEAR: f64 = 365.25;

/// Southern-Hemisphere meteorological seasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub fn of(date: NaiveDate) -> Self {
        match date.month() {
            9..=11 => Season::Spring,
            12 | 1 | 2 => Season::Summer,
            3..=5 => Season::Autumn,
            _ => Season::Winter,
        }
    }
}

/// Turns property attributes into the model's 18-feature vector.
///
/// Only the current date comes from outside (via the clock, for undated
/// inputs); everything else is a pure function of the arguments.
#[derive(Clone)]
pub struct FeatureEncoder {
    clock: Arc<dyn Clock>,
}

impl Default for FeatureEncoder {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl FeatureEncoder {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn encode(
        &self,
        attrs: &PropertyAttributes,
        context: &MarketContext,
        as_of: NaiveDate,
    ) -> Result<FeatureVector, ValuationError> {
        let features = encode_at(attrs, context, as_of, self.clock.today())?;
        for warning in features.sanity_warnings() {
            warn!("FeatureEncoder: {} ({} {})", warning, attrs.suburb, attrs.property_type);
        }
        Ok(features)
    }
}

/// Land size the model sees, and whether it came from the caller.
pub fn effective_land_size(attrs: &PropertyAttributes) -> (f64, bool) {
    let real = attrs.has_real_land_size();
    let land = match (attrs.property_type.has_land(), attrs.land_size) {
        (false, _) => 0.0,
        (true, Some(land)) if real => land,
        (true, _) => attrs.property_type.default_land_size(),
    };
    (land, real)
}

/// Encodes with an explicit "today" used to date undated inputs.
pub fn encode_at(
    attrs: &PropertyAttributes,
    context: &MarketContext,
    as_of: NaiveDate,
    today: NaiveDate,
) -> Result<FeatureVector, ValuationError> {
    attrs.validate()?;

    let property_type = attrs.property_type;
    let (land, has_real_land) = effective_land_size(attrs);
    let beds = attrs.beds as f64;
    let baths = attrs.bathrooms as f64;

    let mut v = [0.0; FEATURE_COUNT];
    v[IDX_LAND_SIZE] = land;
    v[IDX_BEDS] = beds;
    v[IDX_BATHS] = baths;
    v[IDX_CARS] = attrs.car_spaces as f64;
    v[IDX_BEDROOM_TO_LAND] = if land > 0.0 { beds / land } else { 0.0 };
    v[IDX_BATHROOM_TO_BEDROOM] = baths / beds;
    v[IDX_SUBURB_CASTLE_HILL] = flag(attrs.suburb == Suburb::CastleHill);
    v[IDX_TYPE_HOUSE] = flag(property_type == PropertyType::House);
    v[IDX_TYPE_UNIT] = flag(property_type == PropertyType::Unit);
    v[IDX_TYPE_TOWNHOUSE] = flag(property_type == PropertyType::Townhouse);
    v[IDX_HOUSE_LARGE_LAND] = flag(
        property_type == PropertyType::House && has_real_land && land > LARGE_LAND_THRESHOLD_M2,
    );
    v[IDX_HAS_REAL_LAND] = flag(has_real_land);

    let season = Season::of(attrs.sale_or_list_date.unwrap_or(today));
    v[IDX_SPRING] = flag(season == Season::Spring);
    v[IDX_SUMMER] = flag(season == Season::Summer);
    v[IDX_AUTUMN] = flag(season == Season::Autumn);
    v[IDX_WINTER] = flag(season == Season::Winter);

    v[IDX_YEARS_SINCE_SALE] = attrs
        .sale_or_list_date
        .map(|date| (as_of - date).num_days() as f64 / DAYS_PER_YEAR)
        .unwrap_or(0.0);

    let market_date = attrs.sale_or_list_date.unwrap_or(as_of);
    v[IDX_ROLLING_AVG] = context.lookup(attrs.suburb, market_date).unwrap_or(0.0);

    let features = FeatureVector::from_array(v);
    if let Some(name) = features.first_non_finite() {
        return Err(ValuationError::encoding(name, "value is not finite"));
    }
    Ok(features)
}

fn flag(condition: bool) -> f64 {
    if condition { 1.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::FixedClock;
    use crate::domain::ml::market_context::{MarketPoint, Period};
    use std::collections::BTreeMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn context() -> MarketContext {
        let mut series = BTreeMap::new();
        series.insert(
            Suburb::BaulkhamHills,
            vec![MarketPoint {
                period: Period::new(2024, 5),
                avg_price_per_area: 2450.0,
                carried_forward: false,
            }],
        );
        MarketContext::from_series(series)
    }

    fn all_types() -> Vec<&'static str> {
        vec!["house", "unit", "townhouse", "other", "villa", "apartment", "weird"]
    }

    #[test]
    fn test_house_with_known_land() {
        let attrs = PropertyAttributes::new(Suburb::BaulkhamHills, "house", 4)
            .with_bathrooms(2)
            .with_car_spaces(2)
            .with_land_size(Some(600.0));
        let fv = encode_at(&attrs, &context(), date(2024, 6, 1), date(2024, 6, 1)).unwrap();

        assert_eq!(fv.get(IDX_LAND_SIZE), 600.0);
        assert_eq!(fv.get(IDX_HOUSE_LARGE_LAND), 1.0);
        assert_eq!(fv.get(IDX_HAS_REAL_LAND), 1.0);
        assert_eq!(fv.get(IDX_SUBURB_CASTLE_HILL), 0.0);
        assert!((fv.get(IDX_BEDROOM_TO_LAND) - 4.0 / 600.0).abs() < 1e-12);
        assert_eq!(fv.get(IDX_BATHROOM_TO_BEDROOM), 0.5);
    }

    #[test]
    fn test_unit_default() {
        let attrs = PropertyAttributes::new(Suburb::CastleHill, "unit", 2)
            .with_bathrooms(1)
            .with_car_spaces(1);
        let fv = encode_at(&attrs, &context(), date(2024, 6, 1), date(2024, 6, 1)).unwrap();

        assert_eq!(fv.get(IDX_LAND_SIZE), 0.0);
        assert_eq!(fv.get(IDX_BEDROOM_TO_LAND), 0.0);
        assert_eq!(fv.get(IDX_TYPE_UNIT), 1.0);
        assert_eq!(fv.get(IDX_TYPE_HOUSE), 0.0);
        assert_eq!(fv.get(IDX_TYPE_TOWNHOUSE), 0.0);
        assert_eq!(fv.get(IDX_HOUSE_LARGE_LAND), 0.0);
        assert_eq!(fv.get(IDX_HAS_REAL_LAND), 0.0);
        assert_eq!(fv.get(IDX_SUBURB_CASTLE_HILL), 1.0);
    }

    #[test]
    fn test_imputed_land_never_counts_as_large() {
        let house = PropertyAttributes::new(Suburb::BaulkhamHills, "house", 3);
        let fv = encode_at(&house, &context(), date(2024, 6, 1), date(2024, 6, 1)).unwrap();
        assert_eq!(fv.get(IDX_LAND_SIZE), 450.0);
        assert_eq!(fv.get(IDX_HAS_REAL_LAND), 0.0);
        assert_eq!(fv.get(IDX_HOUSE_LARGE_LAND), 0.0);

        let townhouse = PropertyAttributes::new(Suburb::BaulkhamHills, "town-house", 3);
        let fv = encode_at(&townhouse, &context(), date(2024, 6, 1), date(2024, 6, 1)).unwrap();
        assert_eq!(fv.get(IDX_LAND_SIZE), 200.0);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let attrs = PropertyAttributes::new(Suburb::BaulkhamHills, "villa", 3)
            .with_land_size(Some(512.5))
            .with_date(Some(date(2023, 11, 20)));
        let as_of = date(2024, 7, 1);

        let a = encode_at(&attrs, &context(), as_of, as_of).unwrap();
        let b = encode_at(&attrs, &context(), as_of, as_of).unwrap();
        let bits_a: Vec<u64> = a.as_slice().iter().map(|v| v.to_bits()).collect();
        let bits_b: Vec<u64> = b.as_slice().iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits_a, bits_b);
    }

    #[test]
    fn test_every_dimension_finite_for_all_types() {
        for raw in all_types() {
            for land in [None, Some(320.0)] {
                let attrs = PropertyAttributes::new(Suburb::CastleHill, raw, 1).with_land_size(land);
                let fv = encode_at(&attrs, &MarketContext::empty(), date(2024, 1, 1), date(2024, 1, 1))
                    .unwrap();
                assert_eq!(fv.as_slice().len(), FEATURE_COUNT);
                assert!(fv.as_slice().iter().all(|v| v.is_finite()), "type {}", raw);
            }
        }
    }

    #[test]
    fn test_type_one_hot_exclusivity() {
        for (raw, expected) in [
            ("house", Some(IDX_TYPE_HOUSE)),
            ("unit", Some(IDX_TYPE_UNIT)),
            ("townhouse", Some(IDX_TYPE_TOWNHOUSE)),
            ("retirement", None),
        ] {
            let attrs = PropertyAttributes::new(Suburb::CastleHill, raw, 3);
            let fv = encode_at(&attrs, &MarketContext::empty(), date(2024, 1, 1), date(2024, 1, 1))
                .unwrap();
            let flags = [IDX_TYPE_HOUSE, IDX_TYPE_UNIT, IDX_TYPE_TOWNHOUSE];
            let set: Vec<usize> = flags.into_iter().filter(|i| fv.get(*i) == 1.0).collect();
            match expected {
                Some(idx) => assert_eq!(set, vec![idx]),
                None => assert!(set.is_empty()),
            }
        }
    }

    #[test]
    fn test_season_boundaries() {
        let encode_on = |d: NaiveDate| {
            let attrs = PropertyAttributes::new(Suburb::CastleHill, "house", 3).with_date(Some(d));
            encode_at(&attrs, &MarketContext::empty(), d, d).unwrap()
        };

        let sep1 = encode_on(date(2024, 9, 1));
        assert_eq!(sep1.get(IDX_SPRING), 1.0);
        let aug31 = encode_on(date(2024, 8, 31));
        assert_eq!(aug31.get(IDX_WINTER), 1.0);

        for month in 1..=12 {
            let fv = encode_on(date(2024, month, 15));
            let set = [IDX_SPRING, IDX_SUMMER, IDX_AUTUMN, IDX_WINTER]
                .iter()
                .filter(|i| fv.get(**i) == 1.0)
                .count();
            assert_eq!(set, 1, "month {}", month);
        }
    }

    #[test]
    fn test_missing_date_uses_clock_and_zero_years() {
        let clock = Arc::new(FixedClock::on(date(2025, 1, 10)));
        let encoder = FeatureEncoder::new(clock);
        let attrs = PropertyAttributes::new(Suburb::CastleHill, "house", 3);

        let fv = encoder.encode(&attrs, &MarketContext::empty(), date(2024, 6, 1)).unwrap();
        assert_eq!(fv.get(IDX_YEARS_SINCE_SALE), 0.0);
        assert_eq!(fv.get(IDX_SUMMER), 1.0);
        assert_eq!(fv.get(IDX_WINTER), 0.0);
    }

    #[test]
    fn test_years_since_sale() {
        let attrs = PropertyAttributes::new(Suburb::CastleHill, "house", 3)
            .with_date(Some(date(2022, 6, 1)));
        let fv = encode_at(&attrs, &MarketContext::empty(), date(2024, 6, 1), date(2024, 6, 1))
            .unwrap();
        assert!((fv.get(IDX_YEARS_SINCE_SALE) - 731.0 / 365.25).abs() < 1e-12);
    }

    #[test]
    fn test_rolling_avg_lookup_and_fallback() {
        let attrs = PropertyAttributes::new(Suburb::BaulkhamHills, "house", 3)
            .with_date(Some(date(2024, 6, 20)));
        let fv = encode_at(&attrs, &context(), date(2024, 7, 1), date(2024, 7, 1)).unwrap();
        assert_eq!(fv.get(IDX_ROLLING_AVG), 2450.0);

        let other = PropertyAttributes::new(Suburb::CastleHill, "house", 3)
            .with_date(Some(date(2024, 6, 20)));
        let fv = encode_at(&other, &context(), date(2024, 7, 1), date(2024, 7, 1)).unwrap();
        assert_eq!(fv.get(IDX_ROLLING_AVG), 0.0);
    }

    #[test]
    fn test_invalid_beds_rejected() {
        let attrs = PropertyAttributes::new(Suburb::CastleHill, "house", 0);
        let err = encode_at(&attrs, &context(), date(2024, 1, 1), date(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, ValuationError::Validation { .. }));
    }
}
