use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Raw value stored when no download task is outstanding.
pub const NO_TASK: i64 = -1;

/// Byte counter value meaning "not known yet".
pub const UNKNOWN_SIZE: i64 = -1;

/// Version metadata supplied by the caller for one check-and-update cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDescriptor {
    pub name: String,
    pub description: String,
    pub url: String,
    /// Expected MD5 digest of the package, hex encoded.
    pub checksum: String,
}

/// Identifier issued by the host download service for an enqueued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(i64);

impl TaskHandle {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Maps the persisted raw value back to a handle, `NO_TASK` meaning none.
    pub fn from_raw(raw: i64) -> Option<Self> {
        (raw != NO_TASK).then_some(Self(raw))
    }

    pub fn id(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Running,
    Paused,
    Succeeded,
    Failed,
}

impl TaskStatus {
    /// Still transferring; the orchestrator keeps polling.
    pub fn is_active(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Running | TaskStatus::Paused)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }
}

/// Point-in-time view of a task as reported by the host download service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub handle: TaskHandle,
    pub status: TaskStatus,
    pub bytes_downloaded: i64,
    pub bytes_total: i64,
    pub reason: Option<String>,
    pub local_path: Option<PathBuf>,
}

impl TaskSnapshot {
    pub fn failed(handle: TaskHandle, reason: impl Into<String>) -> Self {
        Self {
            handle,
            status: TaskStatus::Failed,
            bytes_downloaded: UNKNOWN_SIZE,
            bytes_total: UNKNOWN_SIZE,
            reason: Some(reason.into()),
            local_path: None,
        }
    }

    /// Snapshot used when the service no longer knows about a handle.
    pub fn missing(handle: TaskHandle) -> Self {
        Self::failed(handle, "download task no longer exists")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub destination: PathBuf,
}

/// A verified package ready to be handed to the platform installer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPackage {
    pub path: PathBuf,
    pub uri: String,
    pub mime_type: String,
    /// Installer must be able to read the file even if it runs as another user.
    pub grant_read: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_maps_to_none() {
        assert_eq!(TaskHandle::from_raw(NO_TASK), None);
        assert_eq!(TaskHandle::from_raw(42), Some(TaskHandle::new(42)));
    }

    #[test]
    fn test_status_classification() {
        assert!(TaskStatus::Paused.is_active());
        assert!(TaskStatus::Succeeded.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
    }
}
