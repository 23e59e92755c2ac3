//! Derived values over the whole collection: bounds for the range sliders,
//! option lists for the multi-selects, and the "most viewed" strip.

use chrono::Datelike;
use serde::Serialize;
use std::collections::HashSet;

use crate::error::ValidationError;
use crate::models::Vehicle;

pub const DEFAULT_MIN_PRICE: f64 = 0.0;
pub const DEFAULT_MAX_PRICE: f64 = 10_000_000.0;
pub const DEFAULT_MIN_YEAR: i32 = 1990;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueRange<T> {
    pub min: T,
    pub max: T,
}

/// Vehicle attributes that can feed an option list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleField {
    Brand,
    Model,
    BodyType,
    Country,
    Drivetrain,
    FuelType,
    EngineType,
    TransmissionType,
    PrimaryColor,
}

impl VehicleField {
    /// Accepts both the flat names and dotted nested paths (`engine.fuelType`).
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "brand" => Ok(Self::Brand),
            "model" => Ok(Self::Model),
            "bodyType" => Ok(Self::BodyType),
            "country" => Ok(Self::Country),
            "drivetrain" => Ok(Self::Drivetrain),
            "fuelType" | "engine.fuelType" => Ok(Self::FuelType),
            "engineType" | "engine.type" => Ok(Self::EngineType),
            "transmissionType" | "transmission.type" => Ok(Self::TransmissionType),
            "color" | "colors" => Ok(Self::PrimaryColor),
            other => Err(ValidationError::UnknownField(other.to_string())),
        }
    }

    fn extract<'a>(&self, vehicle: &'a Vehicle) -> Option<&'a str> {
        let value = match self {
            Self::Brand => vehicle.brand.as_str(),
            Self::Model => vehicle.model.as_str(),
            Self::BodyType => vehicle.body_type.as_str(),
            Self::Country => vehicle.country.as_deref()?,
            Self::Drivetrain => vehicle.drivetrain.as_str(),
            Self::FuelType => vehicle.engine.fuel_type.as_str(),
            Self::EngineType => vehicle.engine.engine_type.as_str(),
            Self::TransmissionType => vehicle.transmission.transmission_type.as_str(),
            Self::PrimaryColor => vehicle.primary_color()?,
        };
        let value = value.trim();
        (!value.is_empty()).then_some(value)
    }
}

/// Min/max effective price; `0..10_000_000` for an empty collection.
pub fn get_price_range(vehicles: &[Vehicle]) -> ValueRange<f64> {
    let mut prices = vehicles.iter().map(Vehicle::effective_price).filter(|p| p.is_finite());
    let Some(first) = prices.next() else {
        return ValueRange { min: DEFAULT_MIN_PRICE, max: DEFAULT_MAX_PRICE };
    };
    prices.fold(ValueRange { min: first, max: first }, |range, p| ValueRange {
        min: range.min.min(p),
        max: range.max.max(p),
    })
}

/// Min/max model year; `1990..current year` when no vehicle has a year.
pub fn get_year_range(vehicles: &[Vehicle]) -> ValueRange<i32> {
    // Rows without a year deserialize to 0
    let years = || vehicles.iter().map(|v| v.year).filter(|&y| y > 0);
    let min = years().min();
    let max = years().max();
    match (min, max) {
        (Some(min), Some(max)) => ValueRange { min, max },
        _ => ValueRange {
            min: DEFAULT_MIN_YEAR,
            max: chrono::Local::now().year(),
        },
    }
}

/// Distinct non-empty values of `field`, in first-seen order.
pub fn get_unique_values(vehicles: &[Vehicle], field: VehicleField) -> Vec<String> {
    let mut seen = HashSet::new();
    vehicles
        .iter()
        .filter_map(|v| field.extract(v))
        .filter(|value| seen.insert(*value))
        .map(str::to_string)
        .collect()
}

/// Vehicles with at least one view, most viewed first, truncated to `limit`.
pub fn get_most_viewed_cars(vehicles: &[Vehicle], limit: usize) -> Vec<Vehicle> {
    let mut viewed: Vec<Vehicle> = vehicles.iter().filter(|v| v.views() > 0).cloned().collect();
    viewed.sort_by(|a, b| b.views().cmp(&a.views()));
    viewed.truncate(limit);
    viewed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Engine, Price};

    fn car(id: &str, brand: &str, year: i32, base: f64, discount: Option<f64>, views: Option<u64>) -> Vehicle {
        Vehicle {
            id: id.into(),
            brand: brand.into(),
            year,
            price: Price { base, discount },
            view_count: views,
            ..Default::default()
        }
    }

    #[test]
    fn empty_collection_uses_documented_defaults() {
        assert_eq!(get_price_range(&[]), ValueRange { min: 0.0, max: 10_000_000.0 });
        let years = get_year_range(&[]);
        assert_eq!(years.min, 1990);
        assert_eq!(years.max, chrono::Local::now().year());
        assert!(get_most_viewed_cars(&[], 5).is_empty());
        assert!(get_unique_values(&[], VehicleField::Brand).is_empty());
    }

    #[test]
    fn price_range_uses_effective_price() {
        let v = vec![
            car("a", "Toyota", 2020, 2_000_000.0, Some(200_000.0), None),
            car("b", "BMW", 2022, 5_000_000.0, None, None),
        ];
        assert_eq!(get_price_range(&v), ValueRange { min: 1_800_000.0, max: 5_000_000.0 });
        assert_eq!(get_year_range(&v), ValueRange { min: 2020, max: 2022 });
    }

    #[test]
    fn year_range_ignores_rows_without_a_year() {
        let v = vec![
            car("a", "Toyota", 0, 1.0, None, None),
            car("b", "BMW", 2019, 1.0, None, None),
            car("c", "Kia", 2021, 1.0, None, None),
        ];
        assert_eq!(get_year_range(&v), ValueRange { min: 2019, max: 2021 });

        let sparse = get_year_range(&[car("a", "Toyota", 0, 1.0, None, None)]);
        assert_eq!(sparse.min, 1990);
    }

    #[test]
    fn unique_values_skip_missing_and_duplicates() {
        let v = vec![
            car("a", "Toyota", 2020, 1.0, None, None),
            car("b", "Toyota", 2020, 1.0, None, None),
            car("c", "BMW", 2020, 1.0, None, None),
            car("d", "", 2020, 1.0, None, None),
        ];
        assert_eq!(get_unique_values(&v, VehicleField::Brand), vec!["Toyota", "BMW"]);
    }

    #[test]
    fn nested_unique_values_tolerate_absent_sub_properties() {
        let mut a = car("a", "Toyota", 2020, 1.0, None, None);
        a.engine = Engine { fuel_type: "diesel".into(), ..Default::default() };
        let b = car("b", "BMW", 2020, 1.0, None, None);
        let mut c = car("c", "Kia", 2020, 1.0, None, None);
        c.country = Some("Korea".into());
        let v = vec![a, b, c];

        let field = VehicleField::parse("engine.fuelType").unwrap();
        assert_eq!(get_unique_values(&v, field), vec!["diesel"]);
        assert_eq!(get_unique_values(&v, VehicleField::Country), vec!["Korea"]);
        assert!(get_unique_values(&v, VehicleField::PrimaryColor).is_empty());
        assert!(matches!(VehicleField::parse("vin"), Err(ValidationError::UnknownField(_))));
    }

    #[test]
    fn most_viewed_excludes_unviewed_cars() {
        let v = vec![
            car("none", "A", 2020, 1.0, None, None),
            car("five", "B", 2020, 1.0, None, Some(5)),
            car("zero", "C", 2020, 1.0, None, Some(0)),
            car("nine", "D", 2020, 1.0, None, Some(9)),
        ];
        let top = get_most_viewed_cars(&v, 5);
        let ids: Vec<&str> = top.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["nine", "five"]);
        assert_eq!(get_most_viewed_cars(&v, 1).len(), 1);
    }
}
