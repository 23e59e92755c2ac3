// Persists selection sets as JSON arrays of vehicle ids, one file per set.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::error::PersistError;

pub const FAVORITES_KEY: &str = "favorites";
pub const COMPARE_KEY: &str = "compare";

#[derive(Debug, Clone)]
pub struct SelectionStore {
    dir: PathBuf,
}

impl SelectionStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Loads the ids stored under `key`. A missing or unreadable file is an empty set.
    pub fn load(&self, key: &str) -> Vec<String> {
        let path = self.path_for(key);
        if !path.exists() {
            return Vec::new();
        }
        let parsed: Result<Vec<String>, PersistError> = File::open(&path)
            .map_err(PersistError::from)
            .and_then(|file| serde_json::from_reader(BufReader::new(file)).map_err(PersistError::from));
        match parsed {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!("Ignoring corrupt selection file {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }

    pub fn save(&self, key: &str, ids: &[String]) -> Result<(), PersistError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        {
            let writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(writer, ids)?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SelectionStore::open(dir.path().join("selections")).unwrap();
        let ids = vec!["a".to_string(), "b".to_string()];
        store.save(FAVORITES_KEY, &ids).unwrap();
        assert_eq!(store.load(FAVORITES_KEY), ids);
        assert!(store.load(COMPARE_KEY).is_empty());
    }

    #[test]
    fn corrupt_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SelectionStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("favorites.json"), "{not an array").unwrap();
        assert!(store.load(FAVORITES_KEY).is_empty());

        fs::write(dir.path().join("compare.json"), r#"{"ids":["a"]}"#).unwrap();
        assert!(store.load(COMPARE_KEY).is_empty());
    }
}
