pub mod csv_history;
pub mod model_store;
pub mod persistence;
pub mod repositories;

pub use csv_history::CsvHistoricalSource;
pub use model_store::FileModelStore;
pub use repositories::{InMemoryListingStore, InMemoryModelStore, InMemoryPredictionSink};
