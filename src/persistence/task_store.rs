use std::path::Path;

use crate::domain::{AppError, TaskHandle, NO_TASK};

use super::Preferences;

pub const APP_UPDATE_TASK_ID: &str = "app_update_task_id";

/// Remembers the one outstanding download task across process restarts.
pub struct TaskStore {
    preferences: Preferences,
}

impl TaskStore {
    pub fn new(preferences: Preferences) -> Self {
        Self { preferences }
    }

    pub fn open(dir: &Path) -> Result<Self, AppError> {
        Ok(Self::new(Preferences::open(dir)?))
    }

    pub fn get_task(&self) -> Option<TaskHandle> {
        TaskHandle::from_raw(self.preferences.get_i64(APP_UPDATE_TASK_ID, NO_TASK))
    }

    pub fn set_task(&self, handle: TaskHandle) -> Result<(), AppError> {
        self.preferences.put_i64(APP_UPDATE_TASK_ID, handle.id())
    }

    pub fn clear_task(&self) -> Result<(), AppError> {
        self.preferences.put_i64(APP_UPDATE_TASK_ID, NO_TASK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_no_task_before_first_download() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        assert_eq!(store.get_task(), None);
    }

    #[test]
    fn test_set_then_clear() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        store.set_task(TaskHandle::new(42)).unwrap();
        assert_eq!(store.get_task(), Some(TaskHandle::new(42)));

        store.clear_task().unwrap();
        assert_eq!(store.get_task(), None);

        let raw = std::fs::read_to_string(dir.path().join("preferences.json")).unwrap();
        assert!(raw.contains("\"app_update_task_id\": -1"));
    }

    #[test]
    fn test_task_survives_restart() {
        let dir = TempDir::new().unwrap();
        TaskStore::open(dir.path())
            .unwrap()
            .set_task(TaskHandle::new(9))
            .unwrap();
        assert_eq!(
            TaskStore::open(dir.path()).unwrap().get_task(),
            Some(TaskHandle::new(9))
        );
    }
}
