//! Sort-option mapping and comparators.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::models::Vehicle;

/// Sort option selected in the catalog toolbar.
///
/// Unknown identifiers are kept verbatim so they round-trip through query
/// strings; they sort by brand, then model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SortKey {
    #[default]
    Popularity,
    PriceAsc,
    PriceDesc,
    YearDesc,
    YearAsc,
    NameAsc,
    NameDesc,
    Unrecognized(String),
}

impl SortKey {
    pub fn parse(s: &str) -> Self {
        match s {
            "popularity" => Self::Popularity,
            "priceAsc" => Self::PriceAsc,
            "priceDesc" => Self::PriceDesc,
            "yearDesc" => Self::YearDesc,
            "yearAsc" => Self::YearAsc,
            "nameAsc" => Self::NameAsc,
            "nameDesc" => Self::NameDesc,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Popularity => "popularity",
            Self::PriceAsc => "priceAsc",
            Self::PriceDesc => "priceDesc",
            Self::YearDesc => "yearDesc",
            Self::YearAsc => "yearAsc",
            Self::NameAsc => "nameAsc",
            Self::NameDesc => "nameDesc",
            Self::Unrecognized(s) => s,
        }
    }

    /// The selectable options, in toolbar order.
    pub fn options() -> [SortKey; 7] {
        [
            Self::Popularity,
            Self::PriceAsc,
            Self::PriceDesc,
            Self::YearDesc,
            Self::YearAsc,
            Self::NameAsc,
            Self::NameDesc,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Popularity => "Most popular",
            Self::PriceAsc => "Price: low to high",
            Self::PriceDesc => "Price: high to low",
            Self::YearDesc => "Newest first",
            Self::YearAsc => "Oldest first",
            Self::NameAsc => "Name: A to Z",
            Self::NameDesc => "Name: Z to A",
            Self::Unrecognized(_) => "Brand and model",
        }
    }

    fn compare(&self, a: &Vehicle, b: &Vehicle) -> Ordering {
        match self {
            Self::Popularity => b.views().cmp(&a.views()),
            Self::PriceAsc => a.effective_price().total_cmp(&b.effective_price()),
            Self::PriceDesc => b.effective_price().total_cmp(&a.effective_price()),
            Self::YearDesc => b.year.cmp(&a.year),
            Self::YearAsc => a.year.cmp(&b.year),
            Self::NameAsc => collate(&a.display_name(), &b.display_name()),
            // Same collation, negated, so NameAsc and NameDesc are exact inverses
            Self::NameDesc => collate(&a.display_name(), &b.display_name()).reverse(),
            Self::Unrecognized(_) => {
                collate(&a.brand, &b.brand).then_with(|| collate(&a.model, &b.model))
            }
        }
    }
}

impl From<String> for SortKey {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<SortKey> for String {
    fn from(key: SortKey) -> Self {
        key.as_str().to_string()
    }
}

/// Case-insensitive ordering with a byte-wise tie-break, so the result is a
/// total order and equal only for identical strings.
pub fn collate(a: &str, b: &str) -> Ordering {
    let folded = a
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase));
    folded.then_with(|| a.cmp(b))
}

/// Sorts display values (facet options) with the same collation as names.
pub fn collate_sorted(mut values: Vec<String>) -> Vec<String> {
    values.sort_by(|a, b| collate(a, b));
    values
}

/// Returns a sorted copy; equal elements keep their relative order.
pub fn sort_vehicles(vehicles: &[Vehicle], key: &SortKey) -> Vec<Vehicle> {
    let mut sorted = vehicles.to_vec();
    // slice::sort_by is stable
    sorted.sort_by(|a, b| key.compare(a, b));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Price;

    fn car(id: &str, brand: &str, model: &str, year: i32, base: f64, views: Option<u64>) -> Vehicle {
        Vehicle {
            id: id.into(),
            brand: brand.into(),
            model: model.into(),
            year,
            price: Price { base, discount: None },
            view_count: views,
            ..Default::default()
        }
    }

    fn ids(vehicles: &[Vehicle]) -> Vec<&str> {
        vehicles.iter().map(|v| v.id.as_str()).collect()
    }

    fn fleet() -> Vec<Vehicle> {
        vec![
            car("1", "Toyota", "Camry", 2020, 1_800_000.0, Some(3)),
            car("2", "BMW", "X5", 2022, 5_000_000.0, None),
            car("3", "audi", "A4", 2018, 2_500_000.0, Some(10)),
            car("4", "Toyota", "Corolla", 2020, 1_500_000.0, Some(3)),
        ]
    }

    #[test]
    fn parses_known_keys_and_keeps_unknown_ones() {
        assert_eq!(SortKey::parse("priceAsc"), SortKey::PriceAsc);
        assert_eq!(SortKey::parse("mileage"), SortKey::Unrecognized("mileage".into()));
        assert_eq!(SortKey::parse("mileage").as_str(), "mileage");
        let json = serde_json::to_string(&SortKey::YearDesc).unwrap();
        assert_eq!(json, "\"yearDesc\"");
    }

    #[test]
    fn popularity_is_descending_views_with_stable_ties() {
        let sorted = sort_vehicles(&fleet(), &SortKey::Popularity);
        assert_eq!(ids(&sorted), vec!["3", "1", "4", "2"]);
    }

    #[test]
    fn price_and_year_orders() {
        let v = fleet();
        assert_eq!(ids(&sort_vehicles(&v, &SortKey::PriceAsc)), vec!["4", "1", "3", "2"]);
        assert_eq!(ids(&sort_vehicles(&v, &SortKey::PriceDesc)), vec!["2", "3", "1", "4"]);
        assert_eq!(ids(&sort_vehicles(&v, &SortKey::YearDesc)), vec!["2", "1", "4", "3"]);
        assert_eq!(ids(&sort_vehicles(&v, &SortKey::YearAsc)), vec!["3", "1", "4", "2"]);
    }

    #[test]
    fn name_sort_is_case_insensitive_and_desc_is_exact_reverse() {
        let v = fleet();
        let asc = sort_vehicles(&v, &SortKey::NameAsc);
        assert_eq!(ids(&asc), vec!["3", "2", "1", "4"]);

        let desc = sort_vehicles(&asc, &SortKey::NameDesc);
        let mut asc_names: Vec<String> = asc.iter().map(Vehicle::display_name).collect();
        asc_names.reverse();
        let desc_names: Vec<String> = desc.iter().map(Vehicle::display_name).collect();
        assert_eq!(desc_names, asc_names);
    }

    #[test]
    fn unrecognized_key_falls_back_to_brand_then_model() {
        let sorted = sort_vehicles(&fleet(), &SortKey::parse("whatever"));
        assert_eq!(ids(&sorted), vec!["3", "2", "1", "4"]);
    }

    #[test]
    fn collate_sorted_orders_case_insensitively() {
        let values = vec!["toyota".to_string(), "BMW".to_string(), "Audi".to_string()];
        assert_eq!(collate_sorted(values), vec!["Audi", "BMW", "toyota"]);
    }

    #[test]
    fn sorting_does_not_mutate_input() {
        let v = fleet();
        let before = v.clone();
        let _ = sort_vehicles(&v, &SortKey::PriceDesc);
        assert_eq!(v, before);
    }
}
