// VehicleRepository backed by the managed backend's REST API
// (PostgREST-style table endpoints plus object storage).

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde_json::Value;

use crate::config::Settings;
use crate::error::{RepositoryError, UploadError};
use crate::models::Vehicle;
use crate::repository::VehicleRepository;

pub struct BackendRepository {
    client: Client,
    base_url: String,
    table: String,
    bucket: String,
}

impl BackendRepository {
    // Builds a client carrying the API key on every request.
    pub fn from_settings(settings: &Settings) -> Result<Self, RepositoryError> {
        let base_url = settings
            .backend_url
            .as_deref()
            .ok_or_else(|| RepositoryError::Config("backend_url not configured".into()))?
            .trim_end_matches('/')
            .to_string();

        let mut headers = HeaderMap::new();
        if let Some(key) = settings.backend_api_key.as_deref() {
            let api_key = HeaderValue::from_str(key)
                .map_err(|e| RepositoryError::Config(format!("Invalid API key header: {}", e)))?;
            let bearer = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| RepositoryError::Config(format!("Invalid Authorization header: {}", e)))?;
            headers.insert("apikey", api_key);
            headers.insert(AUTHORIZATION, bearer);
        } else {
            tracing::warn!("No backend API key configured; requests will be anonymous.");
        }

        let mut builder = Client::builder().default_headers(headers);
        if let Some(proxy_url) = settings.proxy_url.as_deref().filter(|p| !p.is_empty()) {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| RepositoryError::Config(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
            tracing::info!("Routing backend traffic through configured proxy.");
        }
        let client = builder
            .build()
            .map_err(|e| RepositoryError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            table: settings.vehicles_table.clone(),
            bucket: settings.storage_bucket.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn row_url(&self, id: &str) -> String {
        format!("{}?id=eq.{}", self.table_url(), id)
    }

    fn object_path(file_name: &str) -> String {
        let sanitized: String = file_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        format!(
            "{}_{}_{}",
            chrono::Utc::now().format("%Y%m%d%H%M%S"),
            uuid::Uuid::new_v4().simple(),
            sanitized
        )
    }
}

// Turns a non-2xx response into RepositoryError::Status with the body attached.
async fn check_status(response: Response) -> Result<Response, RepositoryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(RepositoryError::NotFound(response.url().to_string()));
    }
    let body = response.text().await.unwrap_or_default();
    Err(RepositoryError::Status { status: status.as_u16(), body })
}

// Rows that do not match the Vehicle shape are skipped, not fatal.
fn decode_rows(rows: Vec<Value>) -> Vec<Vehicle> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.get("id").map(Value::to_string).unwrap_or_default();
            match serde_json::from_value::<Vehicle>(row) {
                Ok(vehicle) => Some(vehicle),
                Err(e) => {
                    tracing::warn!("Skipping malformed vehicle row {}: {}", id, e);
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl VehicleRepository for BackendRepository {
    async fn list(&self) -> Result<Vec<Vehicle>, RepositoryError> {
        let url = format!("{}?select=*", self.table_url());
        tracing::debug!(url = %url, "Fetching vehicle collection");
        let response = check_status(self.client.get(&url).send().await?).await?;
        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let total = rows.len();
        let vehicles = decode_rows(rows);
        tracing::info!("Fetched {} vehicles ({} rows)", vehicles.len(), total);
        Ok(vehicles)
    }

    async fn create(&self, vehicle: &Vehicle) -> Result<(), RepositoryError> {
        check_status(
            self.client
                .post(self.table_url())
                .header("Prefer", "return=minimal")
                .json(vehicle)
                .send()
                .await?,
        )
        .await?;
        tracing::info!("Created vehicle {}", vehicle.id);
        Ok(())
    }

    async fn update(&self, vehicle: &Vehicle) -> Result<(), RepositoryError> {
        check_status(
            self.client
                .patch(self.row_url(&vehicle.id))
                .header("Prefer", "return=minimal")
                .json(vehicle)
                .send()
                .await?,
        )
        .await?;
        tracing::debug!("Updated vehicle {}", vehicle.id);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        check_status(self.client.delete(self.row_url(id)).send().await?).await?;
        tracing::info!("Deleted vehicle {}", id);
        Ok(())
    }

    async fn upload_image(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Rejected("empty file".into()));
        }
        let path = Self::object_path(file_name);
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path);

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Status { status: status.as_u16(), body });
        }

        tracing::info!("Uploaded image {}", path);
        Ok(format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, path
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn settings(url: Option<&str>) -> Settings {
        Settings {
            server_address: "127.0.0.1:0".into(),
            backend_url: url.map(String::from),
            backend_api_key: Some("anon-key".into()),
            vehicles_table: "cars".into(),
            storage_bucket: "car-images".into(),
            proxy_url: None,
            selection_dir: PathBuf::from("data"),
            seed_file: None,
        }
    }

    #[test]
    fn requires_backend_url() {
        assert!(matches!(
            BackendRepository::from_settings(&settings(None)),
            Err(RepositoryError::Config(_))
        ));
    }

    #[test]
    fn builds_table_and_row_urls() {
        let repo = BackendRepository::from_settings(&settings(Some("https://db.example.com/"))).unwrap();
        assert_eq!(repo.table_url(), "https://db.example.com/rest/v1/cars");
        assert_eq!(repo.row_url("42"), "https://db.example.com/rest/v1/cars?id=eq.42");
    }

    #[test]
    fn object_paths_are_sanitized_and_unique() {
        let a = BackendRepository::object_path("front view (1).jpg");
        let b = BackendRepository::object_path("front view (1).jpg");
        assert!(a.ends_with("_front_view__1_.jpg"));
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let rows = vec![
            serde_json::json!({ "id": "1", "brand": "Kia", "year": 2021 }),
            serde_json::json!({ "id": "2", "year": "twenty" }),
            serde_json::json!({ "brand": "no id" }),
        ];
        let vehicles = decode_rows(rows);
        assert_eq!(vehicles.len(), 1);
        assert_eq!(vehicles[0].brand, "Kia");
    }
}
