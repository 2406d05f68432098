//! Seams to the host platform: the download service that performs transfers,
//! the installer the verified package is handed to, and the launcher used for
//! remediation when the download service is turned off.

mod http_service;
mod installer;
mod launcher;

use std::sync::Arc;

use crate::domain::{AppError, DownloadRequest, InstallPackage, TaskHandle, TaskSnapshot};

pub use http_service::{DownloadError, HttpDownloadService};
pub use installer::CommandInstaller;
pub use launcher::ShellLauncher;

pub type ListenerId = u64;

/// Receives the "download finished" notification for any task of the service.
pub trait CompletionObserver: Send + Sync {
    fn on_download_complete(&self, handle: TaskHandle);
}

impl<F> CompletionObserver for F
where
    F: Fn(TaskHandle) + Send + Sync,
{
    fn on_download_complete(&self, handle: TaskHandle) {
        self(handle)
    }
}

pub trait DownloadService: Send + Sync {
    /// False when the service has been administratively turned off.
    fn is_enabled(&self) -> bool;

    fn enqueue(&self, request: DownloadRequest) -> Result<TaskHandle, AppError>;

    /// `Ok(None)` when the service has no record of the handle.
    fn query(&self, handle: TaskHandle) -> Result<Option<TaskSnapshot>, AppError>;

    fn remove(&self, handle: TaskHandle) -> Result<(), AppError>;

    fn register_completion(&self, observer: Arc<dyn CompletionObserver>) -> ListenerId;

    fn unregister_completion(&self, id: ListenerId);
}

pub trait Installer: Send + Sync {
    /// Whether some handler can take the package.
    fn can_handle(&self, package: &InstallPackage) -> bool;

    fn launch(&self, package: &InstallPackage) -> Result<(), AppError>;
}

pub trait SystemLauncher: Send + Sync {
    fn open_download_settings(&self) -> Result<(), AppError>;

    fn open_url(&self, url: &str) -> Result<(), AppError>;
}

/// Everything the orchestrator needs from the host, bundled.
#[derive(Clone)]
pub struct HostServices {
    pub downloads: Arc<dyn DownloadService>,
    pub installer: Arc<dyn Installer>,
    pub launcher: Arc<dyn SystemLauncher>,
}
