use anyhow::{Context, Result};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dealer_catalog::{
    backend::BackendRepository,
    catalog::CatalogStore,
    config::Settings,
    repository::{InMemoryVehicleRepository, VehicleRepository},
    routes,
    selection_store::SelectionStore,
    AppState,
};

// Picks the remote backend when one is configured, otherwise an in-process
// repository (optionally seeded from a JSON file).
fn build_repository(settings: &Settings) -> Result<Arc<dyn VehicleRepository>> {
    if settings.backend_url.is_some() {
        let backend = BackendRepository::from_settings(settings)
            .context("Failed to configure backend repository")?;
        tracing::info!("Using backend repository at {}", backend.base_url());
        return Ok(Arc::new(backend));
    }

    let repository = match &settings.seed_file {
        Some(path) => InMemoryVehicleRepository::from_seed_file(path)?,
        None => {
            tracing::warn!("No backend_url configured; serving an empty in-memory catalog.");
            InMemoryVehicleRepository::new()
        }
    };
    Ok(Arc::new(repository))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first. Ignore errors (e.g., file not found)
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dealer_catalog=info,tower_http=info".into()),
        )
        .with(fmt::layer())
        .init();

    tracing::info!("Initializing dealer catalog server...");

    let settings = Settings::new().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded successfully.");

    let repository = build_repository(&settings)?;
    let selection_store = SelectionStore::open(&settings.selection_dir).with_context(|| {
        format!(
            "Failed to open selection directory {}",
            settings.selection_dir.display()
        )
    })?;
    let catalog = CatalogStore::new(repository).with_selection_store(selection_store);

    // A failed first load leaves the catalog empty with the error recorded;
    // POST /api/reload retries.
    match catalog.reload().await {
        Ok(()) => tracing::info!("Loaded {} vehicles.", catalog.vehicles().len()),
        Err(e) => tracing::error!("Initial catalog load failed: {}", e),
    }

    let addr: SocketAddr = settings.server_address.parse().with_context(|| {
        format!("Invalid server address format: {}", settings.server_address)
    })?;

    let app_state = AppState {
        catalog: Arc::new(catalog),
    };
    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address {}", addr))?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
