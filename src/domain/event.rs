use super::model::{TaskHandle, TaskSnapshot};

/// Messages delivered, in order, to the orchestrator's UI-side consumer.
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    QueryProgress,
    ShowProgress(TaskSnapshot),
    Error(String),
    DownloadComplete(TaskHandle),
}
