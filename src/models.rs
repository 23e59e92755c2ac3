// Catalog data structures shared by the filter engine, the repositories and the API.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// A vehicle listing as stored by the backend.
// Every field except `id` tolerates being absent in stored rows; missing text
// fields deserialize as empty strings and are treated as "unset" by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")] // Match the backend's column/JSON keys
pub struct Vehicle {
    pub id: String,

    // Classification
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub body_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default)]
    pub drivetrain: String,

    #[serde(default)]
    pub price: Price,

    // Mechanical / physical / performance specs
    #[serde(default)]
    pub engine: Engine,
    #[serde(default)]
    pub transmission: Transmission,
    #[serde(default)]
    pub dimensions: Dimensions,
    #[serde(default)]
    pub performance: Performance,

    // Presentation-only, never filtered on
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub images: Vec<VehicleImage>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,
}

impl Vehicle {
    /// Price used for filtering and sorting: base minus a positive discount.
    pub fn effective_price(&self) -> f64 {
        self.price.effective()
    }

    /// Missing view counts count as zero.
    pub fn views(&self) -> u64 {
        self.view_count.unwrap_or(0)
    }

    pub fn has_discount(&self) -> bool {
        self.price.discount.is_some_and(|d| d > 0.0)
    }

    /// "Brand Model", the key used by name sorting and free-text search.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.brand, self.model)
    }

    pub fn primary_color(&self) -> Option<&str> {
        self.colors.first().map(String::as_str)
    }

    /// Checks the pricing invariants enforced on admin writes.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.price.base >= 0.0) {
            return Err(ValidationError::InvalidPrice(format!(
                "base price must be >= 0, got {}",
                self.price.base
            )));
        }
        if let Some(discount) = self.price.discount {
            if !(discount >= 0.0) {
                return Err(ValidationError::InvalidPrice(format!(
                    "discount must be >= 0, got {}",
                    discount
                )));
            }
            if discount >= self.price.base && discount > 0.0 {
                return Err(ValidationError::InvalidPrice(format!(
                    "discount {} must be lower than base price {}",
                    discount, self.price.base
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    #[serde(default)]
    pub base: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
}

impl Price {
    pub fn effective(&self) -> f64 {
        match self.discount {
            Some(d) if d > 0.0 => self.base - d,
            _ => self.base,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engine {
    #[serde(rename = "type", default)]
    pub engine_type: String,
    #[serde(default)]
    pub displacement: f64,
    #[serde(default)]
    pub power: f64,
    #[serde(default)]
    pub torque: f64,
    #[serde(default)]
    pub fuel_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transmission {
    #[serde(rename = "type", default)]
    pub transmission_type: String,
    #[serde(default)]
    pub gears: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimensions {
    #[serde(default)]
    pub length: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub wheelbase: f64,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub trunk_volume: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    #[serde(default)]
    pub acceleration: f64,
    #[serde(default)]
    pub top_speed: f64,
    #[serde(default)]
    pub fuel_consumption: FuelConsumption,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelConsumption {
    #[serde(default)]
    pub city: f64,
    #[serde(default)]
    pub highway: f64,
    #[serde(default)]
    pub combined: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub is_standard: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleImage {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub alt: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priced(base: f64, discount: Option<f64>) -> Vehicle {
        Vehicle {
            id: "v1".into(),
            price: Price { base, discount },
            ..Default::default()
        }
    }

    #[test]
    fn effective_price_subtracts_positive_discount_only() {
        assert_eq!(priced(2_000_000.0, Some(200_000.0)).effective_price(), 1_800_000.0);
        assert_eq!(priced(2_000_000.0, None).effective_price(), 2_000_000.0);
        assert_eq!(priced(2_000_000.0, Some(0.0)).effective_price(), 2_000_000.0);
    }

    #[test]
    fn validate_rejects_discount_not_below_base() {
        assert!(priced(100.0, Some(100.0)).validate().is_err());
        assert!(priced(100.0, Some(-1.0)).validate().is_err());
        assert!(priced(-5.0, None).validate().is_err());
        assert!(priced(100.0, Some(99.0)).validate().is_ok());
        assert!(priced(0.0, Some(0.0)).validate().is_ok());
    }

    #[test]
    fn deserializes_sparse_backend_rows() {
        let json = r#"{
            "id": "abc",
            "brand": "Toyota",
            "model": "Camry",
            "year": 2020,
            "price": { "base": 2000000, "discount": 200000 },
            "engine": { "type": "petrol", "fuelType": "AI-95" },
            "viewCount": 7
        }"#;
        let vehicle: Vehicle = serde_json::from_str(json).unwrap();
        assert_eq!(vehicle.engine.engine_type, "petrol");
        assert_eq!(vehicle.engine.fuel_type, "AI-95");
        assert_eq!(vehicle.views(), 7);
        assert!(vehicle.has_discount());
        assert!(vehicle.country.is_none());
        assert_eq!(vehicle.display_name(), "Toyota Camry");
    }
}
