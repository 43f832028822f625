mod attributes;
mod property_type;
mod records;

pub use attributes::{DEFAULT_BATHROOMS, DEFAULT_CAR_SPACES, PropertyAttributes, Suburb};
pub use property_type::PropertyType;
pub use records::{ListingSnapshot, ListingStatus, SoldRecord, parse_iso_date, parse_land_size};
