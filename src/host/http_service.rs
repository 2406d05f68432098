use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::domain::{
    AppError, DownloadRequest, TaskHandle, TaskSnapshot, TaskStatus, UNKNOWN_SIZE,
};

use super::{CompletionObserver, DownloadService, ListenerId};

const TASKS_FILE: &str = "downloads.json";

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Download request failed: {0}")]
    Status(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DownloadError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TaskRecord {
    id: i64,
    url: String,
    destination: PathBuf,
    status: TaskStatus,
    bytes_downloaded: i64,
    bytes_total: i64,
    #[serde(default)]
    reason: Option<String>,
}

impl TaskRecord {
    fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            handle: TaskHandle::new(self.id),
            status: self.status,
            bytes_downloaded: self.bytes_downloaded,
            bytes_total: self.bytes_total,
            reason: self.reason.clone(),
            local_path: (self.status == TaskStatus::Succeeded).then(|| self.destination.clone()),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TaskTable {
    next_id: i64,
    tasks: BTreeMap<i64, TaskRecord>,
}

/// In-process download service: streams each task over HTTP into its
/// destination and keeps a task table on disk so finished tasks can still be
/// queried after a restart.
#[derive(Clone)]
pub struct HttpDownloadService {
    inner: Arc<Inner>,
}

struct Inner {
    client: Client,
    runtime: Handle,
    enabled: AtomicBool,
    table_path: PathBuf,
    table: Mutex<TaskTable>,
    transfers: Mutex<HashMap<i64, JoinHandle<()>>>,
    observers: Mutex<Vec<(ListenerId, Arc<dyn CompletionObserver>)>>,
    next_listener: AtomicU64,
}

impl HttpDownloadService {
    /// Loads the task table from `state_dir`. Transfers interrupted by the
    /// previous shutdown are started again from the beginning.
    pub fn open(
        state_dir: &Path,
        runtime: Handle,
        enabled: bool,
    ) -> std::result::Result<Self, AppError> {
        fs::create_dir_all(state_dir)?;
        let table_path = state_dir.join(TASKS_FILE);
        let mut table = load_table(&table_path);
        let max_id = table.tasks.keys().next_back().copied().unwrap_or(0);
        table.next_id = table.next_id.max(max_id + 1).max(1);

        let interrupted: Vec<TaskRecord> = table
            .tasks
            .values_mut()
            .filter(|r| r.status.is_active())
            .map(|r| {
                r.status = TaskStatus::Pending;
                r.bytes_downloaded = UNKNOWN_SIZE;
                r.clone()
            })
            .collect();

        let service = Self {
            inner: Arc::new(Inner {
                client: Client::new(),
                runtime,
                enabled: AtomicBool::new(enabled),
                table_path,
                table: Mutex::new(table),
                transfers: Mutex::new(HashMap::new()),
                observers: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(1),
            }),
        };

        for record in interrupted {
            log::info!("Restarting interrupted download #{}", record.id);
            service.spawn_transfer(record.id, record.url, record.destination);
        }

        Ok(service)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
    }

    fn spawn_transfer(&self, id: i64, url: String, destination: PathBuf) {
        let inner = self.inner.clone();
        // Held across the spawn so `finish` cannot remove the entry before it exists.
        let mut transfers = self.inner.transfers.lock();
        let transfer = self.inner.runtime.spawn(async move {
            let result = inner.transfer(id, &url, &destination).await;
            inner.finish(id, result);
        });
        transfers.insert(id, transfer);
    }
}

impl Inner {
    async fn transfer(&self, id: i64, url: &str, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(destination).await?;

        let response = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| DownloadError::Status(e.to_string()))?;

        let total = response
            .content_length()
            .map(|t| t as i64)
            .unwrap_or(UNKNOWN_SIZE);
        self.update_record(id, |record| {
            record.status = TaskStatus::Running;
            record.bytes_total = total;
            record.bytes_downloaded = 0;
        });

        let mut stream = response.bytes_stream();
        let mut downloaded = 0i64;
        while let Some(chunk) = stream.next().await {
            let chunk: bytes::Bytes = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as i64;
            self.update_record(id, |record| record.bytes_downloaded = downloaded);
        }

        file.sync_all().await?;
        Ok(())
    }

    fn finish(&self, id: i64, result: Result<()>) {
        self.transfers.lock().remove(&id);
        let known = self.update_record(id, |record| match &result {
            Ok(()) => {
                record.status = TaskStatus::Succeeded;
                record.reason = None;
            }
            Err(e) => {
                record.status = TaskStatus::Failed;
                record.reason = Some(e.to_string());
            }
        });
        if !known {
            // Removed while the transfer was still running.
            return;
        }
        match &result {
            Ok(()) => log::info!("Download #{} finished", id),
            Err(e) => log::warn!("Download #{} failed: {}", id, e),
        }
        self.save();

        let observers: Vec<Arc<dyn CompletionObserver>> = self
            .observers
            .lock()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        for observer in observers {
            observer.on_download_complete(TaskHandle::new(id));
        }
    }

    fn update_record(&self, id: i64, f: impl FnOnce(&mut TaskRecord)) -> bool {
        match self.table.lock().tasks.get_mut(&id) {
            Some(record) => {
                f(record);
                true
            }
            None => false,
        }
    }

    fn save(&self) {
        if let Err(e) = self.try_save() {
            log::warn!("Failed to save {}: {}", self.table_path.display(), e);
        }
    }

    fn try_save(&self) -> std::result::Result<(), AppError> {
        let json = {
            let table = self.table.lock();
            serde_json::to_string_pretty(&*table)
                .map_err(|e| AppError::Persistence(e.to_string()))?
        };
        let dir = self.table_path.parent().unwrap_or(&self.table_path);
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut tmp, json.as_bytes())?;
        tmp.persist(&self.table_path).map_err(|e| AppError::Io(e.error.to_string()))?;
        Ok(())
    }
}

impl DownloadService for HttpDownloadService {
    fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    fn enqueue(&self, request: DownloadRequest) -> std::result::Result<TaskHandle, AppError> {
        if !self.is_enabled() {
            return Err(AppError::Service("download service is disabled".to_string()));
        }
        let id = {
            let mut table = self.inner.table.lock();
            let id = table.next_id;
            table.next_id += 1;
            table.tasks.insert(
                id,
                TaskRecord {
                    id,
                    url: request.url.clone(),
                    destination: request.destination.clone(),
                    status: TaskStatus::Pending,
                    bytes_downloaded: UNKNOWN_SIZE,
                    bytes_total: UNKNOWN_SIZE,
                    reason: None,
                },
            );
            id
        };
        if let Err(e) = self.inner.try_save() {
            self.inner.table.lock().tasks.remove(&id);
            return Err(e);
        }
        log::info!("Enqueued download #{} from {}", id, request.url);
        self.spawn_transfer(id, request.url, request.destination);
        Ok(TaskHandle::new(id))
    }

    fn query(&self, handle: TaskHandle) -> std::result::Result<Option<TaskSnapshot>, AppError> {
        Ok(self
            .inner
            .table
            .lock()
            .tasks
            .get(&handle.id())
            .map(TaskRecord::snapshot))
    }

    fn remove(&self, handle: TaskHandle) -> std::result::Result<(), AppError> {
        if let Some(transfer) = self.inner.transfers.lock().remove(&handle.id()) {
            transfer.abort();
        }
        let removed = self.inner.table.lock().tasks.remove(&handle.id());
        let Some(record) = removed else {
            return Ok(());
        };
        self.inner.save();
        match fs::remove_file(&record.destination) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        log::debug!("Removed download {}", handle);
        Ok(())
    }

    fn register_completion(&self, observer: Arc<dyn CompletionObserver>) -> ListenerId {
        let id = self.inner.next_listener.fetch_add(1, Ordering::SeqCst);
        self.inner.observers.lock().push((id, observer));
        id
    }

    fn unregister_completion(&self, id: ListenerId) {
        self.inner.observers.lock().retain(|(listener, _)| *listener != id);
    }
}

fn load_table(path: &Path) -> TaskTable {
    match fs::read_to_string(path) {
        Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
            log::warn!("Ignoring corrupt task table {}: {}", path.display(), e);
            TaskTable::default()
        }),
        Err(_) => TaskTable::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn watch(service: &HttpDownloadService) -> mpsc::UnboundedReceiver<TaskHandle> {
        let (tx, rx) = mpsc::unbounded_channel();
        service.register_completion(Arc::new(move |handle: TaskHandle| {
            let _ = tx.send(handle);
        }));
        rx
    }

    async fn next_completion(rx: &mut mpsc::UnboundedReceiver<TaskHandle>) -> TaskHandle {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no completion notification")
            .expect("observer dropped")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_downloads_body_to_destination() {
        let mut server = mockito::Server::new_async().await;
        let body = b"package-bytes".repeat(200);
        let mock = server
            .mock("GET", "/app.apk")
            .with_status(200)
            .with_body(&body)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let service = HttpDownloadService::open(dir.path(), Handle::current(), true).unwrap();
        let mut completions = watch(&service);
        let destination = dir.path().join("downloads/app.apk");

        let handle = service
            .enqueue(DownloadRequest {
                url: format!("{}/app.apk", server.url()),
                destination: destination.clone(),
            })
            .unwrap();

        assert_eq!(next_completion(&mut completions).await, handle);
        let snapshot = service.query(handle).unwrap().unwrap();
        assert_eq!(snapshot.status, TaskStatus::Succeeded);
        assert_eq!(snapshot.bytes_downloaded, body.len() as i64);
        assert_eq!(snapshot.bytes_total, body.len() as i64);
        assert_eq!(snapshot.local_path.as_deref(), Some(destination.as_path()));
        assert_eq!(fs::read(&destination).unwrap(), body);
        mock.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_http_error_marks_task_failed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing.apk")
            .with_status(404)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let service = HttpDownloadService::open(dir.path(), Handle::current(), true).unwrap();
        let mut completions = watch(&service);

        let handle = service
            .enqueue(DownloadRequest {
                url: format!("{}/missing.apk", server.url()),
                destination: dir.path().join("missing.apk"),
            })
            .unwrap();

        assert_eq!(next_completion(&mut completions).await, handle);
        let snapshot = service.query(handle).unwrap().unwrap();
        assert_eq!(snapshot.status, TaskStatus::Failed);
        assert!(snapshot.reason.is_some());
        assert_eq!(snapshot.local_path, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_finished_transfers_are_forgotten() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/quick.apk")
            .with_status(404)
            .expect_at_least(1)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let service = HttpDownloadService::open(dir.path(), Handle::current(), true).unwrap();
        let mut completions = watch(&service);

        for i in 0..8 {
            service
                .enqueue(DownloadRequest {
                    url: format!("{}/quick.apk", server.url()),
                    destination: dir.path().join(format!("quick-{}.apk", i)),
                })
                .unwrap();
        }
        for _ in 0..8 {
            next_completion(&mut completions).await;
        }

        assert!(service.inner.transfers.lock().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_enqueue_rolls_back_when_table_cannot_be_saved() {
        let dir = TempDir::new().unwrap();
        let state_dir = dir.path().join("state");
        let service = HttpDownloadService::open(&state_dir, Handle::current(), true).unwrap();
        fs::remove_dir_all(&state_dir).unwrap();

        let result = service.enqueue(DownloadRequest {
            url: "http://127.0.0.1:1/app.apk".to_string(),
            destination: dir.path().join("app.apk"),
        });

        assert!(result.is_err());
        assert!(service.inner.table.lock().tasks.is_empty());
        assert!(service.inner.transfers.lock().is_empty());
        assert_eq!(service.query(TaskHandle::new(1)).unwrap(), None);
    }

    // Single-threaded on purpose: the restarted transfer cannot run before
    // the observer below is registered.
    #[tokio::test]
    async fn test_interrupted_task_restarts_on_reopen() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/resume.apk")
            .with_status(200)
            .with_body("fresh body")
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("resume.apk");
        fs::write(&destination, b"stale").unwrap();
        let table = serde_json::json!({
            "next_id": 4,
            "tasks": {
                "3": {
                    "id": 3,
                    "url": format!("{}/resume.apk", server.url()),
                    "destination": destination,
                    "status": "Running",
                    "bytes_downloaded": 5,
                    "bytes_total": 10
                }
            }
        });
        fs::write(dir.path().join(TASKS_FILE), table.to_string()).unwrap();

        let service = HttpDownloadService::open(dir.path(), Handle::current(), true).unwrap();
        let mut completions = watch(&service);
        let restarted = service.query(TaskHandle::new(3)).unwrap().unwrap();
        assert_eq!(restarted.status, TaskStatus::Pending);
        assert_eq!(restarted.bytes_downloaded, UNKNOWN_SIZE);

        assert_eq!(next_completion(&mut completions).await, TaskHandle::new(3));
        let snapshot = service.query(TaskHandle::new(3)).unwrap().unwrap();
        assert_eq!(snapshot.status, TaskStatus::Succeeded);
        assert_eq!(snapshot.bytes_downloaded, 10);
        assert_eq!(fs::read(&destination).unwrap(), b"fresh body");
        mock.assert_async().await;

        let saved = fs::read_to_string(dir.path().join(TASKS_FILE)).unwrap();
        assert!(saved.contains("Succeeded"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_disabled_service_refuses_work() {
        let dir = TempDir::new().unwrap();
        let service = HttpDownloadService::open(dir.path(), Handle::current(), false).unwrap();
        assert!(!service.is_enabled());
        let result = service.enqueue(DownloadRequest {
            url: "http://127.0.0.1:1/app.apk".to_string(),
            destination: dir.path().join("app.apk"),
        });
        assert!(matches!(result, Err(AppError::Service(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_finished_tasks_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("app.apk");
        let table = serde_json::json!({
            "next_id": 5,
            "tasks": {
                "4": {
                    "id": 4,
                    "url": "http://example.com/app.apk",
                    "destination": destination,
                    "status": "Succeeded",
                    "bytes_downloaded": 10,
                    "bytes_total": 10
                }
            }
        });
        fs::write(dir.path().join(TASKS_FILE), table.to_string()).unwrap();

        let service = HttpDownloadService::open(dir.path(), Handle::current(), true).unwrap();
        let snapshot = service.query(TaskHandle::new(4)).unwrap().unwrap();
        assert_eq!(snapshot.status, TaskStatus::Succeeded);
        assert_eq!(snapshot.local_path, Some(destination));
        assert_eq!(service.query(TaskHandle::new(99)).unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remove_forgets_task_and_file() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("app.apk");
        fs::write(&destination, b"partial").unwrap();
        let table = serde_json::json!({
            "next_id": 2,
            "tasks": {
                "1": {
                    "id": 1,
                    "url": "http://example.com/app.apk",
                    "destination": destination,
                    "status": "Failed",
                    "bytes_downloaded": 7,
                    "bytes_total": 10,
                    "reason": "network lost"
                }
            }
        });
        fs::write(dir.path().join(TASKS_FILE), table.to_string()).unwrap();

        let service = HttpDownloadService::open(dir.path(), Handle::current(), true).unwrap();
        service.remove(TaskHandle::new(1)).unwrap();
        assert_eq!(service.query(TaskHandle::new(1)).unwrap(), None);
        assert!(!destination.exists());
        service.remove(TaskHandle::new(1)).unwrap();
    }
}
