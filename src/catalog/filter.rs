//! Filter specification and the predicate engine.
//!
//! A [`FilterSpec`] is an immutable value: every `with_*` call returns a new
//! spec, and [`FilterSpec::without`] drops a single key. Keys that are unset
//! impose no constraint. Present keys are AND-ed; list keys match when the
//! vehicle's value is one of the listed values.
//!
//! Legacy singular keys (`brand`, `bodyType`, ...) coexist with their list
//! counterparts. A non-empty list always wins over the singular value.

use serde::{Deserialize, Serialize};

use super::sort::SortKey;
use crate::error::ValidationError;
use crate::models::Vehicle;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    brands: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fuel_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fuel_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transmission_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transmission_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    countries: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    drivetrains: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    engine_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_new: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    only_new: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    discount: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort_by: Option<SortKey>,
}

/// Names a single key of a [`FilterSpec`], for [`FilterSpec::without`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKey {
    Search,
    Brand,
    Brands,
    BodyType,
    BodyTypes,
    MinPrice,
    MaxPrice,
    MinYear,
    MaxYear,
    FuelType,
    FuelTypes,
    TransmissionType,
    TransmissionTypes,
    Country,
    Countries,
    Drivetrains,
    EngineTypes,
    IsNew,
    OnlyNew,
    Discount,
    SortBy,
}

impl FilterKey {
    /// Wire name used in JSON bodies and URL query strings.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Brand => "brand",
            Self::Brands => "brands",
            Self::BodyType => "bodyType",
            Self::BodyTypes => "bodyTypes",
            Self::MinPrice => "minPrice",
            Self::MaxPrice => "maxPrice",
            Self::MinYear => "minYear",
            Self::MaxYear => "maxYear",
            Self::FuelType => "fuelType",
            Self::FuelTypes => "fuelTypes",
            Self::TransmissionType => "transmissionType",
            Self::TransmissionTypes => "transmissionTypes",
            Self::Country => "country",
            Self::Countries => "countries",
            Self::Drivetrains => "drivetrains",
            Self::EngineTypes => "engineTypes",
            Self::IsNew => "isNew",
            Self::OnlyNew => "onlyNew",
            Self::Discount => "discount",
            Self::SortBy => "sortBy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        const ALL: [FilterKey; 21] = [
            FilterKey::Search,
            FilterKey::Brand,
            FilterKey::Brands,
            FilterKey::BodyType,
            FilterKey::BodyTypes,
            FilterKey::MinPrice,
            FilterKey::MaxPrice,
            FilterKey::MinYear,
            FilterKey::MaxYear,
            FilterKey::FuelType,
            FilterKey::FuelTypes,
            FilterKey::TransmissionType,
            FilterKey::TransmissionTypes,
            FilterKey::Country,
            FilterKey::Countries,
            FilterKey::Drivetrains,
            FilterKey::EngineTypes,
            FilterKey::IsNew,
            FilterKey::OnlyNew,
            FilterKey::Discount,
            FilterKey::SortBy,
        ];
        ALL.into_iter().find(|k| k.as_str() == s)
    }
}

fn owned_list<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(Into::into).collect()
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no key is set, i.e. the spec matches every vehicle.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_brands<I, S>(mut self, brands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.brands = Some(owned_list(brands));
        self
    }

    pub fn with_body_type(mut self, body_type: impl Into<String>) -> Self {
        self.body_type = Some(body_type.into());
        self
    }

    pub fn with_body_types<I, S>(mut self, body_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.body_types = Some(owned_list(body_types));
        self
    }

    pub fn with_min_price(mut self, min: f64) -> Self {
        self.min_price = Some(min);
        self
    }

    pub fn with_max_price(mut self, max: f64) -> Self {
        self.max_price = Some(max);
        self
    }

    pub fn with_min_year(mut self, min: i32) -> Self {
        self.min_year = Some(min);
        self
    }

    pub fn with_max_year(mut self, max: i32) -> Self {
        self.max_year = Some(max);
        self
    }

    pub fn with_fuel_type(mut self, fuel_type: impl Into<String>) -> Self {
        self.fuel_type = Some(fuel_type.into());
        self
    }

    pub fn with_fuel_types<I, S>(mut self, fuel_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fuel_types = Some(owned_list(fuel_types));
        self
    }

    pub fn with_transmission_type(mut self, transmission: impl Into<String>) -> Self {
        self.transmission_type = Some(transmission.into());
        self
    }

    pub fn with_transmission_types<I, S>(mut self, transmissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.transmission_types = Some(owned_list(transmissions));
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.countries = Some(owned_list(countries));
        self
    }

    pub fn with_drivetrains<I, S>(mut self, drivetrains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.drivetrains = Some(owned_list(drivetrains));
        self
    }

    pub fn with_engine_types<I, S>(mut self, engine_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.engine_types = Some(owned_list(engine_types));
        self
    }

    pub fn with_is_new(mut self, is_new: bool) -> Self {
        self.is_new = Some(is_new);
        self
    }

    pub fn with_only_new(mut self, only_new: bool) -> Self {
        self.only_new = Some(only_new);
        self
    }

    pub fn with_discount(mut self, discount: bool) -> Self {
        self.discount = Some(discount);
        self
    }

    pub fn with_sort_by(mut self, sort_by: SortKey) -> Self {
        self.sort_by = Some(sort_by);
        self
    }

    /// Returns a copy with `key` unset.
    pub fn without(mut self, key: FilterKey) -> Self {
        match key {
            FilterKey::Search => self.search = None,
            FilterKey::Brand => self.brand = None,
            FilterKey::Brands => self.brands = None,
            FilterKey::BodyType => self.body_type = None,
            FilterKey::BodyTypes => self.body_types = None,
            FilterKey::MinPrice => self.min_price = None,
            FilterKey::MaxPrice => self.max_price = None,
            FilterKey::MinYear => self.min_year = None,
            FilterKey::MaxYear => self.max_year = None,
            FilterKey::FuelType => self.fuel_type = None,
            FilterKey::FuelTypes => self.fuel_types = None,
            FilterKey::TransmissionType => self.transmission_type = None,
            FilterKey::TransmissionTypes => self.transmission_types = None,
            FilterKey::Country => self.country = None,
            FilterKey::Countries => self.countries = None,
            FilterKey::Drivetrains => self.drivetrains = None,
            FilterKey::EngineTypes => self.engine_types = None,
            FilterKey::IsNew => self.is_new = None,
            FilterKey::OnlyNew => self.only_new = None,
            FilterKey::Discount => self.discount = None,
            FilterKey::SortBy => self.sort_by = None,
        }
        self
    }

    /// `{...self, ...partial}`: every key set in `partial` overrides ours.
    pub fn merged(&self, partial: &FilterSpec) -> FilterSpec {
        let p = partial.clone();
        FilterSpec {
            search: p.search.or_else(|| self.search.clone()),
            brand: p.brand.or_else(|| self.brand.clone()),
            brands: p.brands.or_else(|| self.brands.clone()),
            body_type: p.body_type.or_else(|| self.body_type.clone()),
            body_types: p.body_types.or_else(|| self.body_types.clone()),
            min_price: p.min_price.or(self.min_price),
            max_price: p.max_price.or(self.max_price),
            min_year: p.min_year.or(self.min_year),
            max_year: p.max_year.or(self.max_year),
            fuel_type: p.fuel_type.or_else(|| self.fuel_type.clone()),
            fuel_types: p.fuel_types.or_else(|| self.fuel_types.clone()),
            transmission_type: p.transmission_type.or_else(|| self.transmission_type.clone()),
            transmission_types: p.transmission_types.or_else(|| self.transmission_types.clone()),
            country: p.country.or_else(|| self.country.clone()),
            countries: p.countries.or_else(|| self.countries.clone()),
            drivetrains: p.drivetrains.or_else(|| self.drivetrains.clone()),
            engine_types: p.engine_types.or_else(|| self.engine_types.clone()),
            is_new: p.is_new.or(self.is_new),
            only_new: p.only_new.or(self.only_new),
            discount: p.discount.or(self.discount),
            sort_by: p.sort_by.or_else(|| self.sort_by.clone()),
        }
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn sort_by(&self) -> Option<&SortKey> {
        self.sort_by.as_ref()
    }

    /// Sort key with the unset case resolved to popularity.
    pub fn sort_key(&self) -> SortKey {
        self.sort_by.clone().unwrap_or_default()
    }

    pub fn price_bounds(&self) -> (Option<f64>, Option<f64>) {
        (self.min_price, self.max_price)
    }

    pub fn year_bounds(&self) -> (Option<i32>, Option<i32>) {
        (self.min_year, self.max_year)
    }

    /// Brands the engine filters by, after resolving list-vs-singular precedence.
    pub fn effective_brands(&self) -> Option<Vec<&str>> {
        resolve(&self.brands, &self.brand)
    }

    pub fn effective_body_types(&self) -> Option<Vec<&str>> {
        resolve(&self.body_types, &self.body_type)
    }

    pub fn effective_fuel_types(&self) -> Option<Vec<&str>> {
        resolve(&self.fuel_types, &self.fuel_type)
    }

    pub fn effective_transmission_types(&self) -> Option<Vec<&str>> {
        resolve(&self.transmission_types, &self.transmission_type)
    }

    pub fn effective_countries(&self) -> Option<Vec<&str>> {
        resolve(&self.countries, &self.country)
    }

    pub fn only_new_requested(&self) -> bool {
        self.is_new == Some(true) || self.only_new == Some(true)
    }

    /// Reports inverted ranges and non-finite prices. The engine itself never
    /// fails on them; it ignores the offending constraint instead.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for price in [self.min_price, self.max_price].into_iter().flatten() {
            if !price.is_finite() {
                return Err(ValidationError::InvalidPrice(format!(
                    "price bound must be a finite number, got {}",
                    price
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(ValidationError::InvertedRange { field: "price", min, max });
            }
        }
        if let (Some(min), Some(max)) = (self.min_year, self.max_year) {
            if min > max {
                return Err(ValidationError::InvertedRange {
                    field: "year",
                    min: f64::from(min),
                    max: f64::from(max),
                });
            }
        }
        Ok(())
    }

    /// Builds a spec from URL query parameters.
    ///
    /// List keys accept repeated keys and/or comma-separated values; booleans
    /// accept `true`/`1`. Unknown keys and unparsable or non-finite numbers
    /// are skipped.
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut spec = FilterSpec::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref().trim());
            let Some(filter_key) = FilterKey::parse(key) else {
                tracing::debug!(key, "Ignoring unknown filter query parameter");
                continue;
            };
            if value.is_empty() {
                continue;
            }
            match filter_key {
                FilterKey::Search => spec.search = Some(value.to_string()),
                FilterKey::Brand => spec.brand = Some(value.to_string()),
                FilterKey::Brands => push_list(&mut spec.brands, value),
                FilterKey::BodyType => spec.body_type = Some(value.to_string()),
                FilterKey::BodyTypes => push_list(&mut spec.body_types, value),
                FilterKey::MinPrice => spec.min_price = parse_price(key, value),
                FilterKey::MaxPrice => spec.max_price = parse_price(key, value),
                FilterKey::MinYear => spec.min_year = parse_number(key, value),
                FilterKey::MaxYear => spec.max_year = parse_number(key, value),
                FilterKey::FuelType => spec.fuel_type = Some(value.to_string()),
                FilterKey::FuelTypes => push_list(&mut spec.fuel_types, value),
                FilterKey::TransmissionType => spec.transmission_type = Some(value.to_string()),
                FilterKey::TransmissionTypes => push_list(&mut spec.transmission_types, value),
                FilterKey::Country => spec.country = Some(value.to_string()),
                FilterKey::Countries => push_list(&mut spec.countries, value),
                FilterKey::Drivetrains => push_list(&mut spec.drivetrains, value),
                FilterKey::EngineTypes => push_list(&mut spec.engine_types, value),
                FilterKey::IsNew => spec.is_new = Some(parse_flag(value)),
                FilterKey::OnlyNew => spec.only_new = Some(parse_flag(value)),
                FilterKey::Discount => spec.discount = Some(parse_flag(value)),
                FilterKey::SortBy => spec.sort_by = Some(SortKey::parse(value)),
            }
        }
        spec
    }

    /// Inverse of [`FilterSpec::from_query_pairs`], for shareable catalog links.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        let mut text = |key: FilterKey, value: &Option<String>| {
            if let Some(v) = value {
                pairs.push((key.as_str(), v.clone()));
            }
        };
        text(FilterKey::Search, &self.search);
        text(FilterKey::Brand, &self.brand);
        text(FilterKey::BodyType, &self.body_type);
        text(FilterKey::FuelType, &self.fuel_type);
        text(FilterKey::TransmissionType, &self.transmission_type);
        text(FilterKey::Country, &self.country);

        let lists = [
            (FilterKey::Brands, &self.brands),
            (FilterKey::BodyTypes, &self.body_types),
            (FilterKey::FuelTypes, &self.fuel_types),
            (FilterKey::TransmissionTypes, &self.transmission_types),
            (FilterKey::Countries, &self.countries),
            (FilterKey::Drivetrains, &self.drivetrains),
            (FilterKey::EngineTypes, &self.engine_types),
        ];
        for (key, list) in lists {
            if let Some(values) = list.as_ref().filter(|v| !v.is_empty()) {
                pairs.push((key.as_str(), values.join(",")));
            }
        }

        let numbers = [
            (FilterKey::MinPrice, self.min_price.map(|v| v.to_string())),
            (FilterKey::MaxPrice, self.max_price.map(|v| v.to_string())),
            (FilterKey::MinYear, self.min_year.map(|v| v.to_string())),
            (FilterKey::MaxYear, self.max_year.map(|v| v.to_string())),
            (FilterKey::IsNew, self.is_new.map(|v| v.to_string())),
            (FilterKey::OnlyNew, self.only_new.map(|v| v.to_string())),
            (FilterKey::Discount, self.discount.map(|v| v.to_string())),
            (FilterKey::SortBy, self.sort_by.as_ref().map(|v| v.as_str().to_string())),
        ];
        for (key, value) in numbers {
            if let Some(v) = value {
                pairs.push((key.as_str(), v));
            }
        }
        pairs
    }
}

fn resolve<'a>(list: &'a Option<Vec<String>>, single: &'a Option<String>) -> Option<Vec<&'a str>> {
    match list {
        Some(values) if !values.is_empty() => Some(values.iter().map(String::as_str).collect()),
        _ => single
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| vec![s]),
    }
}

fn push_list(target: &mut Option<Vec<String>>, raw: &str) {
    let values = target.get_or_insert_with(Vec::new);
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !values.iter().any(|v| v == item) {
            values.push(item.to_string());
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::debug!(key, raw, "Ignoring unparsable numeric filter value");
            None
        }
    }
}

// "NaN" and "inf" parse as f64 but would make every comparison false
fn parse_price(key: &str, raw: &str) -> Option<f64> {
    let price = parse_number::<f64>(key, raw)?;
    if !price.is_finite() {
        tracing::debug!(key, raw, "Ignoring non-finite price filter value");
        return None;
    }
    Some(price)
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn matches_search(vehicle: &Vehicle, needle: &str) -> bool {
    let brand = vehicle.brand.to_lowercase();
    let model = vehicle.model.to_lowercase();
    brand.contains(needle)
        || model.contains(needle)
        || format!("{} {}", brand, model).contains(needle)
}

fn in_range<T: PartialOrd>(value: T, min: Option<T>, max: Option<T>) -> bool {
    min.is_none_or(|m| value >= m) && max.is_none_or(|m| value <= m)
}

// An inverted pair (min > max) is dropped as a whole rather than matching nothing.
fn usable_bounds<T: PartialOrd>(min: Option<T>, max: Option<T>) -> Option<(Option<T>, Option<T>)> {
    match (min, max) {
        (None, None) => None,
        (Some(lo), Some(hi)) if lo > hi => None,
        bounds => Some(bounds),
    }
}

/// Narrows `vehicles` to the ones satisfying every key present in `spec`.
///
/// Pure and stable: surviving vehicles keep their input order, and an empty
/// spec returns the input unchanged.
pub fn apply_filter(vehicles: &[Vehicle], spec: &FilterSpec) -> Vec<Vehicle> {
    let mut predicates: Vec<Box<dyn Fn(&Vehicle) -> bool + '_>> = Vec::new();

    if let Some(needle) = spec.search().map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()) {
        predicates.push(Box::new(move |v: &Vehicle| matches_search(v, &needle)));
    }
    if let Some(brands) = spec.effective_brands() {
        predicates.push(Box::new(move |v: &Vehicle| brands.contains(&v.brand.as_str())));
    }
    if let Some(body_types) = spec.effective_body_types() {
        predicates.push(Box::new(move |v: &Vehicle| body_types.contains(&v.body_type.as_str())));
    }
    let finite = |p: Option<f64>| p.filter(|p| p.is_finite());
    if let Some((min, max)) = usable_bounds(finite(spec.min_price), finite(spec.max_price)) {
        predicates.push(Box::new(move |v: &Vehicle| in_range(v.effective_price(), min, max)));
    }
    if let Some((min, max)) = usable_bounds(spec.min_year, spec.max_year) {
        predicates.push(Box::new(move |v: &Vehicle| in_range(v.year, min, max)));
    }
    if let Some(fuel_types) = spec.effective_fuel_types() {
        predicates.push(Box::new(move |v: &Vehicle| fuel_types.contains(&v.engine.fuel_type.as_str())));
    }
    if let Some(transmissions) = spec.effective_transmission_types() {
        predicates.push(Box::new(move |v: &Vehicle| {
            transmissions.contains(&v.transmission.transmission_type.as_str())
        }));
    }
    if let Some(countries) = spec.effective_countries() {
        predicates.push(Box::new(move |v: &Vehicle| {
            v.country.as_deref().is_some_and(|c| countries.contains(&c))
        }));
    }
    if let Some(drivetrains) = spec.drivetrains.as_ref().filter(|d| !d.is_empty()) {
        predicates.push(Box::new(move |v: &Vehicle| drivetrains.iter().any(|d| *d == v.drivetrain)));
    }
    if let Some(engine_types) = spec.engine_types.as_ref().filter(|e| !e.is_empty()) {
        predicates.push(Box::new(move |v: &Vehicle| engine_types.iter().any(|e| *e == v.engine.engine_type)));
    }
    if spec.only_new_requested() {
        predicates.push(Box::new(|v: &Vehicle| v.is_new));
    }
    // discount=false is "no constraint", not "no discount"
    if spec.discount == Some(true) {
        predicates.push(Box::new(Vehicle::has_discount));
    }

    vehicles
        .iter()
        .filter(|v| predicates.iter().all(|p| p(v)))
        .cloned()
        .collect()
}
