use super::predictor::PriceRegressor;
use crate::domain::errors::ValuationError;
use crate::domain::ml::feature_registry::FeatureVector;
use crate::domain::ml::model::BoostingParameters;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};
use std::fmt;
use tracing::debug;

type RegressionTree = DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Squared-error gradient boosting over SmartCore CART regression trees.
///
/// Each stage fits a tree to the current residuals on a seeded row
/// subsample; predictions are `base_score + learning_rate * Σ tree(x)`.
#[derive(Serialize, Deserialize)]
pub struct GradientBoostedRegressor {
    base_score: f64,
    learning_rate: f64,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl fmt::Debug for GradientBoostedRegressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GradientBoostedRegressor")
            .field("base_score", &self.base_score)
            .field("learning_rate", &self.learning_rate)
            .field("n_features", &self.n_features)
            .field("n_trees", &self.trees.len())
            .finish()
    }
}

impl GradientBoostedRegressor {
    pub fn fit(
        x: &[Vec<f64>],
        y: &[f64],
        params: &BoostingParameters,
    ) -> Result<Self, ValuationError> {
        if x.is_empty() || x.len() != y.len() {
            return Err(training_error(format!(
                "expected matching non-empty inputs, got {} rows and {} targets",
                x.len(),
                y.len()
            )));
        }
        let n_features = x[0].len();
        if x.iter().any(|row| row.len() != n_features) {
            return Err(training_error("feature rows have inconsistent lengths"));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(training_error("target contains non-finite values"));
        }
        if !(params.learning_rate > 0.0) || !(params.subsample > 0.0 && params.subsample <= 1.0) {
            return Err(training_error(format!(
                "invalid parameters: learning_rate={}, subsample={}",
                params.learning_rate, params.subsample
            )));
        }

        let n = y.len();
        let base_score = y.iter().sum::<f64>() / n as f64;
        if y.iter().all(|v| (v - base_score).abs() < f64::EPSILON * base_score.abs().max(1.0)) {
            return Err(training_error("degenerate target: every sale price is identical"));
        }

        let full = to_matrix(x)?;
        let tree_params = DecisionTreeRegressorParameters::default()
            .with_max_depth(params.max_depth)
            .with_min_samples_split(params.min_samples_split)
            .with_min_samples_leaf(params.min_samples_leaf);

        let sample_size = ((n as f64 * params.subsample).round() as usize).clamp(1, n);
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut indices: Vec<usize> = (0..n).collect();
        let mut fitted = vec![base_score; n];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for stage in 0..params.n_estimators {
            indices.shuffle(&mut rng);
            let rows: Vec<Vec<f64>> = indices[..sample_size].iter().map(|&i| x[i].clone()).collect();
            let residuals: Vec<f64> = indices[..sample_size]
                .iter()
                .map(|&i| y[i] - fitted[i])
                .collect();

            let tree = RegressionTree::fit(&to_matrix(&rows)?, &residuals, tree_params.clone())
                .map_err(|e| training_error(format!("stage {}: {}", stage, e)))?;
            let update = tree
                .predict(&full)
                .map_err(|e| training_error(format!("stage {}: {}", stage, e)))?;

            for (f, u) in fitted.iter_mut().zip(update.iter()) {
                *f += params.learning_rate * u;
            }
            trees.push(tree);
        }

        debug!(
            "GradientBoostedRegressor: fitted {} trees on {} rows (base {:.0})",
            trees.len(),
            n,
            base_score
        );

        Ok(Self {
            base_score,
            learning_rate: params.learning_rate,
            n_features,
            trees,
        })
    }

    pub fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ValuationError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != self.n_features) {
            return Err(ValuationError::Prediction {
                reason: format!("expected {} features, got {}", self.n_features, bad.len()),
            });
        }

        let matrix = to_matrix(rows).map_err(|e| ValuationError::Prediction {
            reason: e.to_string(),
        })?;
        let mut out = vec![self.base_score; rows.len()];
        for tree in &self.trees {
            let update = tree.predict(&matrix).map_err(|e| ValuationError::Prediction {
                reason: format!("tree evaluation failed: {}", e),
            })?;
            for (o, u) in out.iter_mut().zip(update.iter()) {
                *o += self.learning_rate * u;
            }
        }
        Ok(out)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }
}

impl PriceRegressor for GradientBoostedRegressor {
    fn predict(&self, features: &[FeatureVector]) -> Result<Vec<f64>, ValuationError> {
        let rows: Vec<Vec<f64>> = features.iter().map(FeatureVector::to_vec).collect();
        self.predict_rows(&rows)
    }

    fn name(&self) -> &str {
        "SmartCore Gradient Boosted Trees"
    }
}

fn to_matrix(rows: &[Vec<f64>]) -> Result<DenseMatrix<f64>, ValuationError> {
    DenseMatrix::from_2d_vec(&rows.to_vec())
        .map_err(|e| training_error(format!("Matrix creation failed: {}", e)))
}

fn training_error(reason: impl Into<String>) -> ValuationError {
    ValuationError::Training {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(n_estimators: usize) -> BoostingParameters {
        BoostingParameters {
            n_estimators,
            learning_rate: 0.3,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            seed: 7,
        }
    }

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let y: Vec<f64> = (0..40).map(|i| if i < 20 { 500_000.0 } else { 900_000.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_zero_stages_predicts_mean() {
        let (x, y) = step_data();
        let model = GradientBoostedRegressor::fit(&x, &y, &params(0)).unwrap();
        let preds = model.predict_rows(&x).unwrap();
        assert!(preds.iter().all(|p| (p - 700_000.0).abs() < 1e-6));
    }

    #[test]
    fn test_boosting_learns_step_function() {
        let (x, y) = step_data();
        let model = GradientBoostedRegressor::fit(&x, &y, &params(30)).unwrap();
        let preds = model.predict_rows(&[vec![5.0, 2.0], vec![35.0, 2.0]]).unwrap();
        assert!((preds[0] - 500_000.0).abs() < 20_000.0, "low side {}", preds[0]);
        assert!((preds[1] - 900_000.0).abs() < 20_000.0, "high side {}", preds[1]);
    }

    #[test]
    fn test_degenerate_target_fails() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let y = vec![750_000.0; 10];
        let err = GradientBoostedRegressor::fit(&x, &y, &params(5)).unwrap_err();
        assert!(matches!(err, ValuationError::Training { .. }));
    }

    #[test]
    fn test_seeded_fit_is_reproducible() {
        let (x, y) = step_data();
        let mut p = params(10);
        p.subsample = 0.7;
        let a = GradientBoostedRegressor::fit(&x, &y, &p).unwrap();
        let b = GradientBoostedRegressor::fit(&x, &y, &p).unwrap();
        assert_eq!(a.predict_rows(&x).unwrap(), b.predict_rows(&x).unwrap());
    }

    #[test]
    fn test_serde_roundtrip_preserves_predictions() {
        let (x, y) = step_data();
        let model = GradientBoostedRegressor::fit(&x, &y, &params(5)).unwrap();
        let bytes = serde_json::to_vec(&model).unwrap();
        let restored: GradientBoostedRegressor = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(restored.n_trees(), 5);
        let before = model.predict_rows(&x).unwrap();
        let after = restored.predict_rows(&x).unwrap();
        for (a, b) in before.iter().zip(after.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_wrong_width_rejected() {
        let (x, y) = step_data();
        let model = GradientBoostedRegressor::fit(&x, &y, &params(2)).unwrap();
        assert!(model.predict_rows(&[vec![1.0]]).is_err());
    }
}
