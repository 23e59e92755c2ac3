// Data-access contract for the vehicle backend, plus an in-memory implementation
// used for local development, seeding, and tests.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

use crate::error::{RepositoryError, UploadError};
use crate::models::Vehicle;

#[async_trait]
pub trait VehicleRepository: Send + Sync {
    /// Fetches the full vehicle collection.
    async fn list(&self) -> Result<Vec<Vehicle>, RepositoryError>;

    async fn create(&self, vehicle: &Vehicle) -> Result<(), RepositoryError>;

    async fn update(&self, vehicle: &Vehicle) -> Result<(), RepositoryError>;

    async fn delete(&self, id: &str) -> Result<(), RepositoryError>;

    /// Stores an image and returns its public URL.
    async fn upload_image(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, UploadError>;
}

#[derive(Default)]
pub struct InMemoryVehicleRepository {
    vehicles: RwLock<Vec<Vehicle>>,
    list_calls: AtomicUsize,
    latency: Option<Duration>,
    failure: Mutex<Option<RepositoryError>>,
    upload_failure: Mutex<Option<UploadError>>,
}

impl InMemoryVehicleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vehicles(vehicles: Vec<Vehicle>) -> Self {
        Self {
            vehicles: RwLock::new(vehicles),
            ..Default::default()
        }
    }

    /// Loads a JSON array of vehicles from disk.
    pub fn from_seed_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        let vehicles: Vec<Vehicle> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse seed file {}", path.display()))?;
        tracing::info!("Seeded in-memory repository with {} vehicles", vehicles.len());
        Ok(Self::with_vehicles(vehicles))
    }

    /// Delays every `list` call, so overlapping reloads can be observed.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes every subsequent call fail with `error` (None restores normal behavior).
    pub fn fail_with(&self, error: Option<RepositoryError>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = error;
    }

    pub fn fail_uploads_with(&self, error: Option<UploadError>) {
        *self.upload_failure.lock().unwrap_or_else(PoisonError::into_inner) = error;
    }

    /// Number of `list` calls that reached the repository.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Vec<Vehicle> {
        self.vehicles.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn check_failure(&self) -> Result<(), RepositoryError> {
        match self.failure.lock().unwrap_or_else(PoisonError::into_inner).clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl VehicleRepository for InMemoryVehicleRepository {
    async fn list(&self) -> Result<Vec<Vehicle>, RepositoryError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.check_failure()?;
        Ok(self.snapshot())
    }

    async fn create(&self, vehicle: &Vehicle) -> Result<(), RepositoryError> {
        self.check_failure()?;
        let mut vehicles = self.vehicles.write().unwrap_or_else(PoisonError::into_inner);
        if vehicles.iter().any(|v| v.id == vehicle.id) {
            return Err(RepositoryError::Status {
                status: 409,
                body: format!("duplicate id {}", vehicle.id),
            });
        }
        vehicles.push(vehicle.clone());
        Ok(())
    }

    async fn update(&self, vehicle: &Vehicle) -> Result<(), RepositoryError> {
        self.check_failure()?;
        let mut vehicles = self.vehicles.write().unwrap_or_else(PoisonError::into_inner);
        let slot = vehicles
            .iter_mut()
            .find(|v| v.id == vehicle.id)
            .ok_or_else(|| RepositoryError::NotFound(vehicle.id.clone()))?;
        *slot = vehicle.clone();
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        self.check_failure()?;
        let mut vehicles = self.vehicles.write().unwrap_or_else(PoisonError::into_inner);
        let before = vehicles.len();
        vehicles.retain(|v| v.id != id);
        if vehicles.len() == before {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn upload_image(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, UploadError> {
        if let Some(error) = self.upload_failure.lock().unwrap_or_else(PoisonError::into_inner).clone() {
            return Err(error);
        }
        if bytes.is_empty() {
            return Err(UploadError::Rejected("empty file".into()));
        }
        Ok(format!("memory://uploads/{}", file_name))
    }
}
