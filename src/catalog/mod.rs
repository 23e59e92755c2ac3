//! Client-side catalog engine: filtering, sorting, derived ranges,
//! selection sets, and the state holder tying them together.

pub mod filter;
pub mod ranges;
pub mod selection;
pub mod sort;
pub mod store;

pub use filter::{apply_filter, FilterKey, FilterSpec};
pub use ranges::{get_most_viewed_cars, get_price_range, get_unique_values, get_year_range, ValueRange, VehicleField};
pub use selection::{SelectionSet, ToggleOutcome, COMPARE_LIMIT};
pub use sort::{collate_sorted, sort_vehicles, SortKey};
pub use store::{CatalogSnapshot, CatalogStore};
