// Handlers for the catalog API endpoints

use axum::{
    body::Bytes,
    extract::{Json as JsonExtract, Path, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

use crate::{
    catalog::{collate_sorted, FilterSpec, SortKey, ToggleOutcome, ValueRange, VehicleField},
    error::{AppError, AppResult},
    models::Vehicle,
    AppState,
};

const DEFAULT_POPULAR_LIMIT: usize = 5;
const FILE_NAME_HEADER: &str = "x-file-name";

// --- Response Wrappers ---

#[derive(Serialize)]
struct GenericResponse {
    success: bool,
    message: Option<String>,
    id: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToggleResponse {
    id: String,
    outcome: ToggleOutcome,
    active: bool,
}

#[derive(Serialize)]
struct SortOption {
    value: String,
    label: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FacetsResponse {
    price_range: ValueRange<f64>,
    year_range: ValueRange<i32>,
    brands: Vec<String>,
    body_types: Vec<String>,
    fuel_types: Vec<String>,
    transmission_types: Vec<String>,
    countries: Vec<String>,
    drivetrains: Vec<String>,
    engine_types: Vec<String>,
    sort_options: Vec<SortOption>,
}

// --- Request Structs ---

#[derive(Deserialize)]
pub struct PopularQuery {
    limit: Option<usize>,
}

// --- Catalog ---

// Entering the catalog with query parameters replaces the current filter;
// without them the current filter is kept.
pub async fn list_cars(
    State(app_state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<impl IntoResponse> {
    if !params.is_empty() {
        let filter = FilterSpec::from_query_pairs(params);
        if let Err(e) = filter.validate() {
            tracing::warn!("Applying filter with {}", e);
        }
        app_state.catalog.set_filter(filter);
    }
    let snapshot = app_state.catalog.snapshot();
    tracing::debug!(
        "GET /api/cars - {} of {} vehicles match",
        snapshot.filtered_vehicles.len(),
        snapshot.total
    );
    Ok(Json(snapshot))
}

pub async fn get_car(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    match app_state.catalog.record_view(&id).await {
        Some(vehicle) => Ok(Json(vehicle)),
        None => Err(AppError::NotFound(format!("Vehicle not found: {}", id))),
    }
}

pub async fn create_car(
    State(app_state): State<AppState>,
    JsonExtract(vehicle): JsonExtract<Vehicle>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("API call: create_car {} {}", vehicle.brand, vehicle.model);
    let created = app_state.catalog.create_vehicle(vehicle).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_car(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
    JsonExtract(mut vehicle): JsonExtract<Vehicle>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("API call: update_car {}", id);
    vehicle.id = id; // the path decides which vehicle is written
    let updated = app_state.catalog.update_vehicle(vehicle).await?;
    Ok(Json(updated))
}

pub async fn delete_car(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("API call: delete_car {}", id);
    app_state.catalog.delete_vehicle(&id).await?;
    Ok(Json(GenericResponse {
        success: true,
        message: Some("Vehicle deleted.".to_string()),
        id: Some(id),
        error: None,
    }))
}

pub async fn upload_car_image(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let file_name = headers
        .get(FILE_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or("upload");
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");
    tracing::info!("API call: upload_car_image {} ({} bytes)", id, body.len());

    let vehicle = app_state
        .catalog
        .upload_image(&id, file_name, body.to_vec(), content_type)
        .await?;
    Ok(Json(vehicle))
}

pub async fn reload(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    // Failures land in the snapshot's `error` field; the previous view stays.
    if let Err(e) = app_state.catalog.reload().await {
        tracing::warn!("Reload requested via API failed: {}", e);
    }
    Ok(Json(app_state.catalog.snapshot()))
}

// --- Filter state ---

pub async fn get_filter(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(app_state.catalog.filter()))
}

pub async fn set_filter(
    State(app_state): State<AppState>,
    JsonExtract(filter): JsonExtract<FilterSpec>,
) -> AppResult<impl IntoResponse> {
    if let Err(e) = filter.validate() {
        tracing::warn!("Applying filter with {}", e);
    }
    app_state.catalog.set_filter(filter);
    Ok(Json(app_state.catalog.snapshot()))
}

pub async fn update_filter(
    State(app_state): State<AppState>,
    JsonExtract(partial): JsonExtract<FilterSpec>,
) -> AppResult<impl IntoResponse> {
    app_state.catalog.update_filter(&partial);
    Ok(Json(app_state.catalog.snapshot()))
}

pub async fn clear_filter(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    app_state.catalog.clear_filter();
    Ok(Json(app_state.catalog.snapshot()))
}

// --- Facets ---

pub async fn get_facets(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let catalog = &app_state.catalog;
    let values = |field| collate_sorted(catalog.unique_values(field));
    Ok(Json(FacetsResponse {
        price_range: catalog.price_range(),
        year_range: catalog.year_range(),
        brands: values(VehicleField::Brand),
        body_types: values(VehicleField::BodyType),
        fuel_types: values(VehicleField::FuelType),
        transmission_types: values(VehicleField::TransmissionType),
        countries: values(VehicleField::Country),
        drivetrains: values(VehicleField::Drivetrain),
        engine_types: values(VehicleField::EngineType),
        sort_options: SortKey::options()
            .iter()
            .map(|key| SortOption {
                value: key.as_str().to_string(),
                label: key.display_name(),
            })
            .collect(),
    }))
}

pub async fn get_facet_values(
    State(app_state): State<AppState>,
    Path(field): Path<String>,
) -> AppResult<impl IntoResponse> {
    let field = VehicleField::parse(&field)?;
    Ok(Json(collate_sorted(app_state.catalog.unique_values(field))))
}

pub async fn get_popular(
    State(app_state): State<AppState>,
    Query(query): Query<PopularQuery>,
) -> AppResult<impl IntoResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_POPULAR_LIMIT);
    Ok(Json(app_state.catalog.most_viewed(limit)))
}

// --- Favorites & compare ---

pub async fn get_favorites(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(app_state.catalog.favorite_vehicles()))
}

pub async fn toggle_favorite(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let outcome = app_state.catalog.toggle_favorite(&id);
    let active = app_state.catalog.is_favorite(&id);
    Ok(Json(ToggleResponse { id, outcome, active }))
}

pub async fn get_compare(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(app_state.catalog.comparison_vehicles()))
}

pub async fn toggle_compare(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let outcome = app_state.catalog.toggle_compare(&id);
    if outcome == ToggleOutcome::Rejected {
        return Err(AppError::Conflict(
            "Compare list is full; remove a vehicle first.".to_string(),
        ));
    }
    let active = app_state.catalog.is_in_compare(&id);
    Ok(Json(ToggleResponse { id, outcome, active }))
}

pub async fn clear_compare(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    app_state.catalog.clear_compare();
    Ok(Json(GenericResponse {
        success: true,
        message: Some("Compare list cleared.".to_string()),
        id: None,
        error: None,
    }))
}
