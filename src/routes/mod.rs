// Route definitions

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::AppState;

mod api;

// Uploaded photos can exceed axum's 2 MB default body limit
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        // Catalog browsing & admin
        .route("/cars", get(api::list_cars).post(api::create_car))
        .route(
            "/cars/:id",
            get(api::get_car).put(api::update_car).delete(api::delete_car),
        )
        .route(
            "/cars/:id/images",
            post(api::upload_car_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/reload", post(api::reload))
        // Filter state
        .route(
            "/filter",
            get(api::get_filter)
                .put(api::set_filter)
                .patch(api::update_filter)
                .delete(api::clear_filter),
        )
        // Filter widget data
        .route("/facets", get(api::get_facets))
        .route("/facets/:field", get(api::get_facet_values))
        .route("/popular", get(api::get_popular))
        // Selections
        .route("/favorites", get(api::get_favorites))
        .route("/favorites/:id", post(api::toggle_favorite))
        .route("/compare", get(api::get_compare).delete(api::clear_compare))
        .route("/compare/:id", post(api::toggle_compare));

    Router::new()
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
