// Injected time source
pub mod clock;

// Domain-specific error types
pub mod errors;

// Feature schema, market context and model metadata
pub mod ml;

// Prediction outputs and lifecycle
pub mod prediction;

// Property attributes and store records
pub mod property;

// Repository traits
pub mod repositories;
