use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tr_core::{KeyValueStorage, StorageError};

/// One `<key>.json` file per record inside a data directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.record_path(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io {
                key: key.to_string(),
                message: format!("Failed to read '{}': {}", path.display(), e),
            }),
        }
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        let path = self.record_path(key);
        write_file(&path, value.as_bytes()).map_err(|message| StorageError::Io {
            key: key.to_string(),
            message,
        })
    }
}

pub fn write_file(path: &Path, bytes: &[u8]) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
    }
    fs::write(path, bytes)
        .map_err(|e| format!("Failed to write '{}': {}", path.display(), e))?;
    Ok(())
}

pub fn read_file(path: &Path) -> Result<String, String> {
    fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tr_core::{Store, SETTINGS_KEY, STATS_KEY};

    #[test]
    fn test_missing_record_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        assert_eq!(storage.get(SETTINGS_KEY).unwrap(), None);
    }

    #[test]
    fn test_set_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path().join("nested").join("data"));
        storage.set(STATS_KEY, "{}".to_string()).unwrap();
        assert!(storage.dir().join("stats.json").exists());
        assert_eq!(storage.get(STATS_KEY).unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_store_survives_restart() {
        let dir = tempfile::tempdir().unwrap();

        let mut store = Store::load(FileStorage::new(dir.path()));
        store.process_navigation("https://www.google.com/search?q=a&ei=1&oq=a");

        let store = Store::load(FileStorage::new(dir.path()));
        let google = store.stats().get("google.com").unwrap();
        assert_eq!(google.total_cleaned, 1);
        assert_eq!(google.params_removed, 2);
    }
}
