use super::predictor::PriceRegressor;
use crate::domain::errors::ValuationError;
use crate::domain::ml::feature_registry::{FEATURE_COUNT, FEATURE_NAMES, FeatureVector};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use statrs::statistics::{Data, Distribution};
use std::collections::BTreeMap;

/// Hold-out error measures. `mape` is a fraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionScores {
    pub r2: f64,
    pub mae: f64,
    pub mape: f64,
}

pub fn score(actual: &[f64], predicted: &[f64]) -> RegressionScores {
    RegressionScores {
        r2: r2_score(actual, predicted),
        mae: mean_absolute_error(actual, predicted),
        mape: mean_absolute_percentage_error(actual, predicted),
    }
}

/// Coefficient of determination. Zero when the actuals have no variance.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let mean = Data::new(actual.to_vec()).mean().unwrap_or(0.0);
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 }
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    let errors: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .collect();
    Data::new(errors).mean().unwrap_or(0.0)
}

/// Mean of `|actual - predicted| / |actual|`, skipping zero actuals.
pub fn mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> f64 {
    let ratios: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| a.abs() > f64::EPSILON)
        .map(|(a, p)| ((a - p) / a).abs())
        .collect();
    if ratios.is_empty() {
        return 0.0;
    }
    Data::new(ratios).mean().unwrap_or(0.0)
}

/// Permutation importance: the increase in MAE after shuffling one column,
/// clipped at zero and normalized so the weights sum to 1.
pub fn permutation_importance(
    model: &dyn PriceRegressor,
    features: &[FeatureVector],
    targets: &[f64],
    seed: u64,
) -> Result<BTreeMap<String, f64>, ValuationError> {
    let baseline = mean_absolute_error(targets, &model.predict(features)?);
    let mut rng = StdRng::seed_from_u64(seed);

    let mut increases = [0.0; FEATURE_COUNT];
    for (column, increase) in increases.iter_mut().enumerate() {
        let mut shuffled: Vec<f64> = features.iter().map(|f| f.get(column)).collect();
        shuffled.shuffle(&mut rng);

        let permuted: Vec<FeatureVector> = features
            .iter()
            .zip(shuffled)
            .map(|(f, value)| {
                let mut values = [0.0; FEATURE_COUNT];
                values.copy_from_slice(f.as_slice());
                values[column] = value;
                FeatureVector::from_array(values)
            })
            .collect();

        let mae = mean_absolute_error(targets, &model.predict(&permuted)?);
        *increase = (mae - baseline).max(0.0);
    }

    let total: f64 = increases.iter().sum();
    Ok(FEATURE_NAMES
        .iter()
        .zip(increases)
        .map(|(name, inc)| {
            let weight = if total > 0.0 { inc / total } else { 0.0 };
            (name.to_string(), weight)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ml::feature_registry::IDX_BEDS;

    /// Price driven purely by bedroom count.
    struct BedroomModel;

    impl PriceRegressor for BedroomModel {
        fn predict(&self, features: &[FeatureVector]) -> Result<Vec<f64>, ValuationError> {
            Ok(features.iter().map(|f| f.get(IDX_BEDS) * 250_000.0).collect())
        }

        fn name(&self) -> &str {
            "bedroom"
        }
    }

    #[test]
    fn test_perfect_predictions() {
        let actual = vec![500_000.0, 750_000.0, 1_000_000.0];
        let scores = score(&actual, &actual);
        assert_eq!(scores.r2, 1.0);
        assert_eq!(scores.mae, 0.0);
        assert_eq!(scores.mape, 0.0);
    }

    #[test]
    fn test_mape_is_fraction() {
        let actual = vec![1_000_000.0, 500_000.0];
        let predicted = vec![900_000.0, 550_000.0];
        let mape = mean_absolute_percentage_error(&actual, &predicted);
        assert!((mape - 0.1).abs() < 1e-12);
        assert!((mean_absolute_error(&actual, &predicted) - 75_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_r2_of_mean_predictor_is_zero() {
        let actual = vec![1.0, 2.0, 3.0];
        let predicted = vec![2.0, 2.0, 2.0];
        assert!(r2_score(&actual, &predicted).abs() < 1e-12);
    }

    #[test]
    fn test_importance_concentrates_on_used_feature() {
        let features: Vec<FeatureVector> = (1..=12)
            .map(|i| {
                let mut values = [0.0; FEATURE_COUNT];
                values[IDX_BEDS] = (i % 6 + 1) as f64;
                values[0] = i as f64 * 10.0;
                FeatureVector::from_array(values)
            })
            .collect();
        let targets: Vec<f64> = features.iter().map(|f| f.get(IDX_BEDS) * 250_000.0).collect();

        let importance = permutation_importance(&BedroomModel, &features, &targets, 3).unwrap();
        assert_eq!(importance.len(), FEATURE_COUNT);
        assert!((importance["beds"] - 1.0).abs() < 1e-12);
        assert_eq!(importance["land_size_numeric"], 0.0);
    }
}
