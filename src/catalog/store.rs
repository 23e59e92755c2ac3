//! Catalog state holder: the source collection, the current filter, load status,
//! and the favorites/compare selections.
//!
//! State is only ever replaced as a whole under a write lock, and no lock is
//! held across an `.await`. The derived view is recomputed from the current
//! state on every read (filter first, then sort).

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::filter::{apply_filter, FilterSpec};
use super::ranges::{self, ValueRange, VehicleField};
use super::selection::{SelectionSet, ToggleOutcome};
use super::sort::sort_vehicles;
use crate::error::{CatalogError, RepositoryError, ValidationError};
use crate::models::{Vehicle, VehicleImage};
use crate::repository::VehicleRepository;
use crate::selection_store::{SelectionStore, COMPARE_KEY, FAVORITES_KEY};

type SharedReload = Shared<BoxFuture<'static, Result<(), RepositoryError>>>;

#[derive(Debug, Default)]
struct CatalogState {
    vehicles: Arc<Vec<Vehicle>>,
    filter: FilterSpec,
    loading: bool,
    error: Option<String>,
}

#[derive(Debug)]
struct Selections {
    favorites: SelectionSet,
    compare: SelectionSet,
}

/// Read-only view handed to presentation code.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    pub filtered_vehicles: Vec<Vehicle>,
    pub filter: FilterSpec,
    pub loading: bool,
    pub error: Option<String>,
    /// Size of the unfiltered collection.
    pub total: usize,
}

pub struct CatalogStore {
    repository: Arc<dyn VehicleRepository>,
    state: Arc<RwLock<CatalogState>>,
    in_flight: Arc<Mutex<Option<SharedReload>>>,
    selections: RwLock<Selections>,
    selection_store: Option<SelectionStore>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl CatalogStore {
    pub fn new(repository: Arc<dyn VehicleRepository>) -> Self {
        Self {
            repository,
            state: Arc::new(RwLock::new(CatalogState::default())),
            in_flight: Arc::new(Mutex::new(None)),
            selections: RwLock::new(Selections {
                favorites: SelectionSet::favorites(),
                compare: SelectionSet::compare(),
            }),
            selection_store: None,
        }
    }

    /// Restores persisted selections and persists every later toggle.
    pub fn with_selection_store(mut self, store: SelectionStore) -> Self {
        let favorites = SelectionSet::favorites().with_ids(store.load(FAVORITES_KEY));
        let compare = SelectionSet::compare().with_ids(store.load(COMPARE_KEY));
        tracing::info!(
            "Restored {} favorites and {} compare entries from {}",
            favorites.len(),
            compare.len(),
            store.dir().display()
        );
        self.selections = RwLock::new(Selections { favorites, compare });
        self.selection_store = Some(store);
        self
    }

    // --- Loading ---

    /// Re-fetches the collection. While a reload is in flight, further calls
    /// await that same fetch instead of starting another one.
    ///
    /// Failures are also recorded in the `error` state; the previous
    /// collection stays in place.
    pub async fn reload(&self) -> Result<(), RepositoryError> {
        let pending = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(pending) => {
                    tracing::debug!("Reload already in flight, joining it");
                    pending.clone()
                }
                None => {
                    let pending = self.start_reload();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    // The fetch runs on its own task, so it completes (and clears `loading`)
    // even when every caller awaiting it has been dropped.
    fn start_reload(&self) -> SharedReload {
        let repository = Arc::clone(&self.repository);
        let state = Arc::clone(&self.state);
        let in_flight = Arc::clone(&self.in_flight);
        write(&self.state).loading = true;

        let task = tokio::spawn(async move {
            tracing::info!("Reloading vehicle collection");
            let result = repository.list().await;
            let outcome = {
                let mut state = write(&state);
                state.loading = false;
                match result {
                    Ok(vehicles) => {
                        tracing::info!("Loaded {} vehicles", vehicles.len());
                        state.vehicles = Arc::new(vehicles);
                        state.error = None;
                        Ok(())
                    }
                    Err(e) => {
                        tracing::error!("Failed to reload vehicles: {}", e);
                        state.error = Some(e.to_string());
                        Err(e)
                    }
                }
            };
            in_flight.lock().unwrap_or_else(PoisonError::into_inner).take();
            outcome
        });

        let state = Arc::clone(&self.state);
        let in_flight = Arc::clone(&self.in_flight);
        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    // The task panicked before it could settle the state
                    tracing::error!("Reload task failed: {}", e);
                    let message = format!("reload task failed: {}", e);
                    {
                        let mut state = write(&state);
                        state.loading = false;
                        state.error = Some(message.clone());
                    }
                    in_flight.lock().unwrap_or_else(PoisonError::into_inner).take();
                    Err(RepositoryError::Network(message))
                }
            }
        }
        .boxed()
        .shared()
    }

    // --- Reads ---

    pub fn vehicles(&self) -> Arc<Vec<Vehicle>> {
        Arc::clone(&read(&self.state).vehicles)
    }

    pub fn filter(&self) -> FilterSpec {
        read(&self.state).filter.clone()
    }

    pub fn loading(&self) -> bool {
        read(&self.state).loading
    }

    pub fn error(&self) -> Option<String> {
        read(&self.state).error.clone()
    }

    /// Lookup against the last fetched collection; never hits the network.
    pub fn get_by_id(&self, id: &str) -> Option<Vehicle> {
        read(&self.state).vehicles.iter().find(|v| v.id == id).cloned()
    }

    pub fn filtered_vehicles(&self) -> Vec<Vehicle> {
        let (vehicles, filter) = {
            let state = read(&self.state);
            (Arc::clone(&state.vehicles), state.filter.clone())
        };
        derive_view(&vehicles, &filter)
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        let (vehicles, filter, loading, error) = {
            let state = read(&self.state);
            (
                Arc::clone(&state.vehicles),
                state.filter.clone(),
                state.loading,
                state.error.clone(),
            )
        };
        CatalogSnapshot {
            filtered_vehicles: derive_view(&vehicles, &filter),
            total: vehicles.len(),
            filter,
            loading,
            error,
        }
    }

    // --- Filter updates ---

    /// Replaces the filter wholesale; no merging happens here.
    pub fn set_filter(&self, filter: FilterSpec) {
        tracing::debug!(?filter, "Filter replaced");
        write(&self.state).filter = filter;
    }

    pub fn update_filter(&self, partial: &FilterSpec) {
        let mut state = write(&self.state);
        state.filter = state.filter.merged(partial);
        tracing::debug!(filter = ?state.filter, "Filter updated");
    }

    pub fn clear_filter(&self) {
        write(&self.state).filter = FilterSpec::default();
    }

    // --- Derived values over the whole collection ---

    pub fn price_range(&self) -> ValueRange<f64> {
        ranges::get_price_range(&self.vehicles())
    }

    pub fn year_range(&self) -> ValueRange<i32> {
        ranges::get_year_range(&self.vehicles())
    }

    pub fn unique_values(&self, field: VehicleField) -> Vec<String> {
        ranges::get_unique_values(&self.vehicles(), field)
    }

    pub fn most_viewed(&self, limit: usize) -> Vec<Vehicle> {
        ranges::get_most_viewed_cars(&self.vehicles(), limit)
    }

    // --- Admin mutations ---

    pub async fn create_vehicle(&self, mut vehicle: Vehicle) -> Result<Vehicle, CatalogError> {
        if vehicle.id.trim().is_empty() {
            vehicle.id = uuid::Uuid::new_v4().to_string();
        }
        validate_listing(&vehicle)?;

        if let Err(e) = self.repository.create(&vehicle).await {
            return Err(self.record_failure("create", e.into()));
        }
        let created = vehicle.clone();
        self.commit(move |vehicles| vehicles.push(vehicle));
        tracing::info!("Vehicle {} added to catalog", created.id);
        Ok(created)
    }

    pub async fn update_vehicle(&self, vehicle: Vehicle) -> Result<Vehicle, CatalogError> {
        validate_listing(&vehicle)?;
        if self.get_by_id(&vehicle.id).is_none() {
            return Err(CatalogError::NotFound(vehicle.id));
        }

        if let Err(e) = self.repository.update(&vehicle).await {
            return Err(self.record_failure("update", e.into()));
        }
        let updated = vehicle.clone();
        self.commit(move |vehicles| {
            if let Some(slot) = vehicles.iter_mut().find(|v| v.id == vehicle.id) {
                *slot = vehicle;
            }
        });
        Ok(updated)
    }

    /// Deleting an id the backend no longer has counts as success.
    pub async fn delete_vehicle(&self, id: &str) -> Result<(), CatalogError> {
        match self.repository.delete(id).await {
            Ok(()) => {}
            Err(RepositoryError::NotFound(_)) => {
                tracing::debug!("Vehicle {} was already removed upstream", id);
            }
            Err(e) => return Err(self.record_failure("delete", e.into())),
        }
        self.commit(|vehicles| vehicles.retain(|v| v.id != id));
        tracing::info!("Vehicle {} removed from catalog", id);
        Ok(())
    }

    /// Uploads an image and appends it to the vehicle's gallery.
    pub async fn upload_image(
        &self,
        vehicle_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<Vehicle, CatalogError> {
        let mut vehicle = self
            .get_by_id(vehicle_id)
            .ok_or_else(|| CatalogError::NotFound(vehicle_id.to_string()))?;

        let url = match self.repository.upload_image(file_name, bytes, content_type).await {
            Ok(url) => url,
            Err(e) => return Err(self.record_failure("upload", e.into())),
        };
        vehicle.images.push(VehicleImage {
            id: uuid::Uuid::new_v4().to_string(),
            url,
            alt: vehicle.display_name(),
        });
        self.update_vehicle(vehicle).await
    }

    /// Bumps the view counter on a detail view. The local count is kept even
    /// if persisting it fails.
    pub async fn record_view(&self, id: &str) -> Option<Vehicle> {
        let updated = {
            let mut state = write(&self.state);
            let vehicles = Arc::make_mut(&mut state.vehicles);
            let vehicle = vehicles.iter_mut().find(|v| v.id == id)?;
            vehicle.view_count = Some(vehicle.views().saturating_add(1));
            vehicle.clone()
        };
        if let Err(e) = self.repository.update(&updated).await {
            tracing::warn!("Failed to persist view count for {}: {}", id, e);
        }
        Some(updated)
    }

    // Applies a successful mutation to a fresh copy of the collection.
    fn commit(&self, apply: impl FnOnce(&mut Vec<Vehicle>)) {
        let mut state = write(&self.state);
        apply(Arc::make_mut(&mut state.vehicles));
        state.error = None;
    }

    fn record_failure(&self, operation: &str, error: CatalogError) -> CatalogError {
        tracing::error!("Vehicle {} failed: {}", operation, error);
        write(&self.state).error = Some(error.to_string());
        error
    }

    // --- Selections ---

    pub fn toggle_favorite(&self, id: &str) -> ToggleOutcome {
        let mut selections = write(&self.selections);
        let outcome = selections.favorites.toggle(id);
        if outcome.changed() {
            self.persist(FAVORITES_KEY, selections.favorites.ids());
        }
        outcome
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        read(&self.selections).favorites.is_member(id)
    }

    pub fn favorite_vehicles(&self) -> Vec<Vehicle> {
        read(&self.selections).favorites.hydrate(&self.vehicles())
    }

    /// Adds or removes `id` from the compare list. A full list rejects new ids.
    pub fn toggle_compare(&self, id: &str) -> ToggleOutcome {
        let mut selections = write(&self.selections);
        let outcome = selections.compare.toggle(id);
        match outcome {
            ToggleOutcome::Rejected => {
                tracing::debug!("Compare list full, rejected {}", id);
            }
            _ => self.persist(COMPARE_KEY, selections.compare.ids()),
        }
        outcome
    }

    pub fn is_in_compare(&self, id: &str) -> bool {
        read(&self.selections).compare.is_member(id)
    }

    pub fn comparison_vehicles(&self) -> Vec<Vehicle> {
        read(&self.selections).compare.hydrate(&self.vehicles())
    }

    pub fn clear_compare(&self) {
        let mut selections = write(&self.selections);
        selections.compare.clear();
        self.persist(COMPARE_KEY, selections.compare.ids());
    }

    fn persist(&self, key: &str, ids: &[String]) {
        if let Some(store) = &self.selection_store {
            if let Err(e) = store.save(key, ids) {
                tracing::warn!("Failed to persist {} selection: {}", key, e);
            }
        }
    }
}

fn derive_view(vehicles: &[Vehicle], filter: &FilterSpec) -> Vec<Vehicle> {
    sort_vehicles(&apply_filter(vehicles, filter), &filter.sort_key())
}

fn validate_listing(vehicle: &Vehicle) -> Result<(), ValidationError> {
    if vehicle.brand.trim().is_empty() {
        return Err(ValidationError::Missing("brand"));
    }
    if vehicle.model.trim().is_empty() {
        return Err(ValidationError::Missing("model"));
    }
    vehicle.validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::sort::SortKey;
    use crate::error::UploadError;
    use crate::models::Price;
    use crate::repository::InMemoryVehicleRepository;
    use std::time::Duration;

    fn car(id: &str, brand: &str, model: &str, base: f64, views: Option<u64>) -> Vehicle {
        Vehicle {
            id: id.into(),
            brand: brand.into(),
            model: model.into(),
            year: 2020,
            price: Price { base, discount: None },
            view_count: views,
            ..Default::default()
        }
    }

    fn store_with(vehicles: Vec<Vehicle>) -> (Arc<InMemoryVehicleRepository>, CatalogStore) {
        let repo = Arc::new(InMemoryVehicleRepository::with_vehicles(vehicles));
        let store = CatalogStore::new(repo.clone());
        (repo, store)
    }

    fn ids(vehicles: &[Vehicle]) -> Vec<&str> {
        vehicles.iter().map(|v| v.id.as_str()).collect()
    }

    #[tokio::test]
    async fn filter_then_sort_view() {
        let (_, store) = store_with(vec![
            car("a", "Toyota", "Camry", 1_800_000.0, Some(1)),
            car("b", "BMW", "X5", 5_000_000.0, Some(9)),
            car("c", "Toyota", "RAV4", 3_000_000.0, None),
        ]);
        store.reload().await.unwrap();
        assert_eq!(ids(&store.filtered_vehicles()), vec!["b", "a", "c"]);

        store.set_filter(FilterSpec::new().with_brands(["Toyota"]).with_sort_by(SortKey::PriceDesc));
        assert_eq!(ids(&store.filtered_vehicles()), vec!["c", "a"]);

        store.update_filter(&FilterSpec::new().with_max_price(2_000_000.0));
        assert_eq!(ids(&store.filtered_vehicles()), vec!["a"]);

        // set_filter replaces, it does not merge
        store.set_filter(FilterSpec::new().with_max_price(2_000_000.0));
        assert_eq!(store.filter().effective_brands(), None);

        store.clear_filter();
        assert!(store.filter().is_empty());
        assert_eq!(store.snapshot().filtered_vehicles.len(), 3);
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_view() {
        let (repo, store) = store_with(vec![car("a", "Kia", "Rio", 1.0, None)]);
        store.reload().await.unwrap();

        repo.fail_with(Some(RepositoryError::Network("offline".into())));
        assert!(store.reload().await.is_err());
        let snapshot = store.snapshot();
        assert_eq!(ids(&snapshot.filtered_vehicles), vec!["a"]);
        assert!(!snapshot.loading);
        assert!(snapshot.error.unwrap().contains("offline"));

        repo.fail_with(None);
        store.reload().await.unwrap();
        assert!(store.error().is_none());
    }

    #[tokio::test]
    async fn mutations_update_local_collection() {
        let (repo, store) = store_with(vec![car("a", "Kia", "Rio", 1.0, None)]);
        store.reload().await.unwrap();

        let created = store.create_vehicle(car("", "Lada", "Niva", 2.0, None)).await.unwrap();
        assert!(!created.id.is_empty());
        assert_eq!(store.vehicles().len(), 2);
        assert_eq!(repo.snapshot().len(), 2);

        let mut renamed = created.clone();
        renamed.model = "Niva Legend".into();
        store.update_vehicle(renamed).await.unwrap();
        assert_eq!(store.get_by_id(&created.id).unwrap().model, "Niva Legend");

        store.delete_vehicle("a").await.unwrap();
        assert!(store.get_by_id("a").is_none());

        let missing = store.update_vehicle(car("zzz", "Kia", "Rio", 1.0, None)).await;
        assert_eq!(missing, Err(CatalogError::NotFound("zzz".into())));

        let invalid = store.create_vehicle(car("", "", "Rio", 1.0, None)).await;
        assert_eq!(invalid, Err(CatalogError::Validation(ValidationError::Missing("brand"))));
    }

    #[tokio::test]
    async fn mutation_failure_is_recorded_and_returned() {
        let (repo, store) = store_with(vec![car("a", "Kia", "Rio", 1.0, None)]);
        store.reload().await.unwrap();
        repo.fail_with(Some(RepositoryError::Status { status: 500, body: "boom".into() }));

        assert!(store.delete_vehicle("a").await.is_err());
        assert!(store.error().is_some());
        assert!(store.get_by_id("a").is_some());
    }

    #[tokio::test]
    async fn record_view_increments_and_persists() {
        let (repo, store) = store_with(vec![car("a", "Kia", "Rio", 1.0, None)]);
        store.reload().await.unwrap();

        assert_eq!(store.record_view("a").await.unwrap().view_count, Some(1));
        assert_eq!(store.record_view("a").await.unwrap().view_count, Some(2));
        assert_eq!(repo.snapshot()[0].view_count, Some(2));
        assert!(store.record_view("missing").await.is_none());

        // Persistence failure keeps the local increment
        repo.fail_with(Some(RepositoryError::Network("offline".into())));
        assert_eq!(store.record_view("a").await.unwrap().view_count, Some(3));
        assert_eq!(store.most_viewed(5)[0].views(), 3);
    }

    #[tokio::test]
    async fn upload_appends_image() {
        let (_, store) = store_with(vec![car("a", "Kia", "Rio", 1.0, None)]);
        store.reload().await.unwrap();

        let vehicle = store.upload_image("a", "front.jpg", vec![1, 2, 3], "image/jpeg").await.unwrap();
        assert_eq!(vehicle.images.len(), 1);
        assert_eq!(vehicle.images[0].url, "memory://uploads/front.jpg");
        assert_eq!(vehicle.images[0].alt, "Kia Rio");

        let empty = store.upload_image("a", "empty.jpg", Vec::new(), "image/jpeg").await;
        assert!(matches!(empty, Err(CatalogError::Upload(_))));
        assert!(matches!(
            store.upload_image("nope", "x.jpg", vec![1], "image/jpeg").await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn upload_failure_is_recorded_and_gallery_untouched() {
        let (repo, store) = store_with(vec![car("a", "Kia", "Rio", 1.0, None)]);
        store.reload().await.unwrap();
        repo.fail_uploads_with(Some(UploadError::Status { status: 413, body: "too large".into() }));

        let result = store.upload_image("a", "front.jpg", vec![1, 2, 3], "image/jpeg").await;
        assert_eq!(
            result,
            Err(CatalogError::Upload(UploadError::Status { status: 413, body: "too large".into() }))
        );
        assert!(store.error().unwrap().contains("413"));
        assert!(store.get_by_id("a").unwrap().images.is_empty());

        repo.fail_uploads_with(None);
        store.upload_image("a", "front.jpg", vec![1], "image/jpeg").await.unwrap();
        assert!(store.error().is_none());
    }

    #[tokio::test]
    async fn dropped_reload_still_settles_state() {
        let repo = Arc::new(
            InMemoryVehicleRepository::with_vehicles(vec![car("a", "Kia", "Rio", 1.0, None)])
                .with_latency(Duration::from_millis(200)),
        );
        let store = CatalogStore::new(repo.clone());

        let cancelled = tokio::time::timeout(Duration::from_millis(10), store.reload()).await;
        assert!(cancelled.is_err());
        assert!(store.loading());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!store.loading());
        assert_eq!(store.vehicles().len(), 1);
        assert_eq!(repo.list_calls(), 1);

        // The in-flight slot was released, so the next reload fetches again
        store.reload().await.unwrap();
        assert_eq!(repo.list_calls(), 2);
    }

    #[tokio::test]
    async fn deleting_a_vanished_vehicle_is_not_an_error() {
        let (repo, store) = store_with(vec![
            car("a", "Kia", "Rio", 1.0, None),
            car("b", "BMW", "X5", 2.0, None),
        ]);
        store.reload().await.unwrap();

        // Removed upstream after our last fetch
        repo.delete("a").await.unwrap();
        store.delete_vehicle("a").await.unwrap();
        assert!(store.get_by_id("a").is_none());
        assert!(store.error().is_none());

        store.delete_vehicle("never-existed").await.unwrap();
        assert_eq!(store.vehicles().len(), 1);
        assert!(store.error().is_none());
    }

    #[tokio::test]
    async fn selections_hydrate_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let (_, store) = store_with(vec![
            car("a", "Kia", "Rio", 1.0, None),
            car("b", "BMW", "X5", 2.0, None),
        ]);
        let store = store.with_selection_store(SelectionStore::open(dir.path()).unwrap());
        store.reload().await.unwrap();

        assert_eq!(store.toggle_favorite("b"), ToggleOutcome::Added);
        assert_eq!(store.toggle_favorite("gone"), ToggleOutcome::Added);
        assert!(store.is_favorite("b"));
        assert_eq!(ids(&store.favorite_vehicles()), vec!["b"]);

        for id in ["a", "b", "c"] {
            assert_eq!(store.toggle_compare(id), ToggleOutcome::Added);
        }
        assert_eq!(store.toggle_compare("d"), ToggleOutcome::Rejected);
        assert!(store.is_in_compare("a"));
        assert_eq!(ids(&store.comparison_vehicles()), vec!["a", "b"]);

        // A second store over the same directory sees the persisted sets
        let (_, reopened) = store_with(vec![car("b", "BMW", "X5", 2.0, None)]);
        let reopened = reopened.with_selection_store(SelectionStore::open(dir.path()).unwrap());
        assert!(reopened.is_favorite("gone"));
        assert!(reopened.is_in_compare("c"));

        store.clear_compare();
        assert!(store.comparison_vehicles().is_empty());
    }
}
