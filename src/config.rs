// Application configuration, layered defaults -> config.toml -> APP_* environment.

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_address: String,
    // Base URL of the managed backend. Without it the catalog runs in memory.
    pub backend_url: Option<String>,
    pub backend_api_key: Option<String>,
    pub vehicles_table: String,
    pub storage_bucket: String,
    pub proxy_url: Option<String>,
    pub selection_dir: PathBuf,
    // JSON array of vehicles used to seed the in-memory repository
    pub seed_file: Option<PathBuf>,
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let builder = Config::builder()
            .set_default("server_address", "127.0.0.1:3000")?
            .set_default("vehicles_table", "cars")?
            .set_default("storage_bucket", "car-images")?
            .set_default("selection_dir", "data")?
            .add_source(File::with_name("config").required(false))
            // e.g. APP_BACKEND_URL; "__" keeps single underscores inside field names
            .add_source(Environment::with_prefix("APP").prefix_separator("_").separator("__"));

        let settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }
}
