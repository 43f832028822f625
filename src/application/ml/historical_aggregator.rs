use crate::domain::ml::market_context::{MarketContext, MarketPoint, Period};
use crate::domain::property::{SoldRecord, Suburb};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::debug;

/// Trailing window for the smoothed price-per-area series.
pub const ROLLING_WINDOW_MONTHS: usize = 6;

/// One sold-price observation feeding the market context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketObservation {
    pub suburb: Suburb,
    pub period: Period,
    pub price_per_area: f64,
}

/// Observations derivable from sold records: those with a known suburb,
/// a resolvable sale date and a real land size.
pub fn observations_from_sold(records: &[SoldRecord]) -> Vec<MarketObservation> {
    records
        .iter()
        .filter_map(|r| {
            let suburb = Suburb::from_str(&r.suburb).ok()?;
            let date = r.resolved_sale_date()?;
            let price_per_area = r.price_per_area()?;
            Some(MarketObservation {
                suburb,
                period: Period::from_date(date),
                price_per_area,
            })
        })
        .collect()
}

pub fn build_context(history: &[MarketObservation]) -> MarketContext {
    build_context_with_window(history, ROLLING_WINDOW_MONTHS)
}

/// Groups by suburb and emits one point per calendar month from the first
/// to the last observed month. Each point is the mean of every observation
/// in the `window` months ending at that month; an empty window carries the
/// previous value forward.
pub fn build_context_with_window(history: &[MarketObservation], window: usize) -> MarketContext {
    let window = window.max(1) as i64;

    let mut buckets: BTreeMap<Suburb, BTreeMap<Period, (f64, usize)>> = BTreeMap::new();
    for obs in history
        .iter()
        .filter(|o| o.price_per_area.is_finite() && o.price_per_area > 0.0)
    {
        let slot = buckets
            .entry(obs.suburb)
            .or_default()
            .entry(obs.period)
            .or_insert((0.0, 0));
        slot.0 += obs.price_per_area;
        slot.1 += 1;
    }

    let mut series = BTreeMap::new();
    for (suburb, periods) in buckets {
        let (Some(first), Some(last)) = (
            periods.keys().next().copied(),
            periods.keys().next_back().copied(),
        ) else {
            continue;
        };

        let mut points: Vec<MarketPoint> = Vec::new();
        let mut current = first;
        loop {
            let (sum, count) = periods
                .range(..=current)
                .rev()
                .take_while(|(p, _)| current.months_since(**p) < window)
                .fold((0.0, 0usize), |acc, (_, (s, c))| (acc.0 + s, acc.1 + c));

            let point = match (count, points.last()) {
                (0, Some(prev)) => MarketPoint {
                    period: current,
                    avg_price_per_area: prev.avg_price_per_area,
                    carried_forward: true,
                },
                _ => MarketPoint {
                    period: current,
                    avg_price_per_area: sum / count.max(1) as f64,
                    carried_forward: false,
                },
            };
            points.push(point);

            if current == last {
                break;
            }
            current = current.next();
        }

        debug!(
            "HistoricalAggregator: {} series {}..{} ({} points)",
            suburb,
            first,
            last,
            points.len()
        );
        series.insert(suburb, points);
    }

    MarketContext::from_series(series)
}
