pub mod feature_registry;
pub mod market_context;
pub mod model;
