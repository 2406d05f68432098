use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value;

use crate::domain::AppError;

const PREFERENCES_FILE: &str = "preferences.json";

/// Small durable key-value store backed by a JSON file.
///
/// Every write replaces the file atomically and is fsynced before returning,
/// so a value written before a crash is still there on the next start.
pub struct Preferences {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Preferences {
    pub fn open(dir: &Path) -> Result<Self, AppError> {
        fs::create_dir_all(dir).map_err(|e| {
            AppError::Persistence(format!("Failed to create {}: {}", dir.display(), e))
        })?;
        Ok(Self {
            path: dir.join(PREFERENCES_FILE),
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        let _guard = self.lock.lock();
        self.read_all()
            .get(key)
            .and_then(Value::as_i64)
            .unwrap_or(default)
    }

    pub fn put_i64(&self, key: &str, value: i64) -> Result<(), AppError> {
        let _guard = self.lock.lock();
        let mut values = self.read_all();
        values.insert(key.to_string(), Value::from(value));
        self.write_all(&values)
    }

    fn read_all(&self) -> BTreeMap<String, Value> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                log::warn!("Failed to read {}: {}", self.path.display(), e);
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&data).unwrap_or_else(|e| {
            log::warn!("Ignoring corrupt preferences {}: {}", self.path.display(), e);
            BTreeMap::new()
        })
    }

    fn write_all(&self, values: &BTreeMap<String, Value>) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(values)
            .map_err(|e| AppError::Persistence(format!("Failed to serialize preferences: {}", e)))?;
        atomic_write(&self.path, json.as_bytes()).map_err(|e| {
            AppError::Persistence(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or(path);
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_key_returns_default() {
        let dir = TempDir::new().unwrap();
        let prefs = Preferences::open(dir.path()).unwrap();
        assert_eq!(prefs.get_i64("absent", 7), 7);
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        Preferences::open(dir.path())
            .unwrap()
            .put_i64("answer", 42)
            .unwrap();
        let reopened = Preferences::open(dir.path()).unwrap();
        assert_eq!(reopened.get_i64("answer", -1), 42);
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let prefs = Preferences::open(dir.path()).unwrap();
        fs::write(prefs.path(), "{not json").unwrap();
        assert_eq!(prefs.get_i64("answer", -1), -1);
        prefs.put_i64("answer", 1).unwrap();
        assert_eq!(prefs.get_i64("answer", -1), 1);
    }
}
