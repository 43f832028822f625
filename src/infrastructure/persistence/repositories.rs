pub mod listing_repository;
pub mod prediction_repository;

pub use listing_repository::{ListingHistoryEntry, SqliteListingRepository};
pub use prediction_repository::SqlitePredictionRepository;
