// Car dealership catalog: filtering/sorting engine, selection sets,
// backend repository, and the HTTP API serving them.

use axum::extract::FromRef;
use std::sync::Arc;

pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod routes;
pub mod selection_store;

use crate::catalog::CatalogStore;

// Shared state handed to every handler
#[derive(Clone, FromRef)]
pub struct AppState {
    pub catalog: Arc<CatalogStore>,
}
