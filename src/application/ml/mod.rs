pub mod evaluation;
pub mod feature_encoder;
pub mod gradient_boosting;
pub mod historical_aggregator;
pub mod predictor;
pub mod training;
pub mod valuation_service;
