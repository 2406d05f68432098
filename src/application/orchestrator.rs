use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use url::Url;

use crate::{
    config::UpdaterConfig,
    domain::{
        AppError, DownloadRequest, InstallPackage, TaskHandle, TaskSnapshot, TaskStatus,
        UpdateDescriptor, UpdateEvent,
    },
    host::{DownloadService, HostServices, Installer, ListenerId},
    persistence::TaskStore,
    ui::{
        dialogs::live, strings, DialogAction, DialogButton, DialogKind, DialogPresenter,
        DialogSpec, ProgressView, ScreenHandle,
    },
    utils::{compute_digest, digest_matches, package_file_name},
};

use super::{completion::CompletionListener, worker::Worker};

/// Drives one update session: confirm, download, poll, verify, install.
///
/// All state transitions happen in [`handle_event`](Self::handle_event) and
/// [`handle_action`](Self::handle_action), which the host calls from its UI
/// loop. Blocking work (status queries, hashing) runs on a single background
/// worker and comes back through [`next_event`](Self::next_event).
pub struct UpdateOrchestrator {
    descriptor: UpdateDescriptor,
    config: UpdaterConfig,
    host: HostServices,
    store: TaskStore,
    presenter: DialogPresenter,
    runtime: Handle,
    worker: Worker,
    events_tx: UnboundedSender<UpdateEvent>,
    events_rx: Arc<tokio::sync::Mutex<UnboundedReceiver<UpdateEvent>>>,
    task: Option<TaskHandle>,
    completion_listener: Option<ListenerId>,
    scheduled_polls: Vec<JoinHandle<()>>,
    polling: bool,
    cleared: bool,
}

impl UpdateOrchestrator {
    pub fn create(
        screen: ScreenHandle,
        descriptor: UpdateDescriptor,
        host: HostServices,
        store: TaskStore,
        config: UpdaterConfig,
        runtime: Handle,
    ) -> Result<Self, AppError> {
        let worker = Worker::spawn(config.worker_queue_capacity)?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            descriptor,
            config,
            host,
            store,
            presenter: DialogPresenter::new(screen),
            runtime,
            worker,
            events_tx,
            events_rx: Arc::new(tokio::sync::Mutex::new(events_rx)),
            task: None,
            completion_listener: None,
            scheduled_polls: Vec::new(),
            polling: false,
            cleared: false,
        })
    }

    pub fn descriptor(&self) -> &UpdateDescriptor {
        &self.descriptor
    }

    pub fn task(&self) -> Option<TaskHandle> {
        self.task
    }

    pub fn is_polling(&self) -> bool {
        self.polling
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    /// Resolves with the next event for [`handle_event`](Self::handle_event).
    pub fn next_event(&self) -> impl Future<Output = Option<UpdateEvent>> + Send + 'static {
        let events = self.events_rx.clone();
        async move { events.lock().await.recv().await }
    }

    /// Entry point: checks the download service, resumes an outstanding task
    /// or asks the user to confirm a new download.
    pub fn update(&mut self) -> &mut Self {
        if self.cleared {
            log::warn!("update() called on a cleared orchestrator");
            return self;
        }
        if !self.host.downloads.is_enabled() {
            log::info!("Download service is disabled");
            self.show_disabled_dialog();
            return self;
        }
        if let Some(handle) = self.store.get_task() {
            log::debug!("Resuming outstanding download {}", handle);
            self.task = Some(handle);
            self.register_completion_listener();
            self.start_polling();
            return self;
        }
        self.show_confirm_dialog();
        self
    }

    /// Cancels scheduled work, stops the worker and removes every dialog.
    /// Safe to call more than once.
    pub fn clear(&mut self) {
        self.unregister_completion_listener();
        self.stop_polling();
        self.worker.shutdown();
        self.presenter.clear();
        if !self.cleared {
            log::debug!("Update orchestrator cleared");
        }
        self.cleared = true;
    }

    pub fn handle_event(&mut self, event: UpdateEvent) {
        if self.cleared {
            log::debug!("Ignoring {:?} after clear", event);
            return;
        }
        match event {
            UpdateEvent::QueryProgress => self.query_progress(),
            UpdateEvent::ShowProgress(snapshot) => self.show_progress(snapshot),
            UpdateEvent::Error(message) => self.show_retry_dialog(&message),
            UpdateEvent::DownloadComplete(handle) => {
                if self.task == Some(handle) {
                    self.on_download_completed();
                } else {
                    log::debug!("Ignoring completion of foreign download {}", handle);
                }
            }
        }
    }

    pub fn handle_action(&mut self, action: DialogAction) {
        if self.cleared {
            return;
        }
        match (action.kind, action.button) {
            (DialogKind::Confirm, DialogButton::Positive) => {
                self.presenter.dismiss(DialogKind::Confirm);
                self.start_download();
            }
            (DialogKind::Progress, DialogButton::Negative) => self.cancel_download(),
            (DialogKind::Progress, DialogButton::Positive) => {}
            (DialogKind::Retry, DialogButton::Positive) => {
                self.presenter.dismiss(DialogKind::Retry);
                self.discard_task();
                self.update();
            }
            (DialogKind::Install, DialogButton::Positive) => {
                self.presenter.dismiss(DialogKind::Install);
                self.on_download_completed();
            }
            (DialogKind::Disabled, DialogButton::Positive) => {
                let opened = self.host.launcher.open_download_settings();
                self.report_launch(opened);
                self.presenter.dismiss(DialogKind::Disabled);
            }
            (DialogKind::Disabled, DialogButton::Negative) => {
                let opened = self.host.launcher.open_url(&self.descriptor.url);
                self.report_launch(opened);
                self.presenter.dismiss(DialogKind::Disabled);
            }
            (kind, DialogButton::Negative) => self.presenter.dismiss(kind),
        }
    }

    fn start_download(&mut self) {
        if self.presenter.live_screen().is_none() {
            return;
        }
        self.register_completion_listener();

        let file_name = package_file_name(
            &self.config.app_name,
            &self.descriptor.name,
            &self.config.package_extension,
        );
        let request = DownloadRequest {
            url: self.descriptor.url.clone(),
            destination: self.config.download_dir.join(file_name),
        };

        match self.host.downloads.enqueue(request) {
            Ok(handle) => {
                log::info!("Started download {} of {}", handle, self.descriptor.name);
                self.task = Some(handle);
                if let Err(e) = self.store.set_task(handle) {
                    log::error!("Failed to remember download {}: {}", handle, e);
                }
                self.start_polling();
            }
            Err(e) => {
                log::error!("Failed to enqueue download: {}", e);
                self.unregister_completion_listener();
                self.show_retry_dialog(strings::DOWNLOAD_MANAGER_FAILED_TIPS);
            }
        }
    }

    fn cancel_download(&mut self) {
        log::info!("Download cancelled by user");
        self.stop_polling();
        self.unregister_completion_listener();
        self.discard_task();
        self.presenter.dismiss(DialogKind::Progress);
    }

    /// Forgets the current task, here and in the download service.
    fn discard_task(&mut self) {
        if let Some(handle) = self.task.take() {
            if let Err(e) = self.host.downloads.remove(handle) {
                log::warn!("Failed to remove download {}: {}", handle, e);
            }
        }
        self.forget_persisted_task();
    }

    fn start_polling(&mut self) {
        if self.polling {
            return;
        }
        self.polling = true;
        self.send(UpdateEvent::QueryProgress);
    }

    fn stop_polling(&mut self) {
        self.polling = false;
        for poll in self.scheduled_polls.drain(..) {
            poll.abort();
        }
    }

    fn schedule_poll(&mut self) {
        self.scheduled_polls.retain(|poll| !poll.is_finished());
        let events = self.events_tx.clone();
        let delay = self.config.poll_interval();
        self.scheduled_polls.push(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(UpdateEvent::QueryProgress);
        }));
    }

    fn query_progress(&mut self) {
        if !self.polling {
            return;
        }
        let Some(handle) = self.task else {
            return;
        };
        let downloads = self.host.downloads.clone();
        let events = self.events_tx.clone();
        let submitted = self.worker.execute(move || {
            let snapshot = match downloads.query(handle) {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => TaskSnapshot::missing(handle),
                Err(e) => {
                    log::warn!("Failed to query download {}: {}", handle, e);
                    TaskSnapshot::failed(handle, e.to_string())
                }
            };
            let _ = events.send(UpdateEvent::ShowProgress(snapshot));
        });
        match submitted {
            Ok(()) => {}
            Err(AppError::QueueFull) => {
                log::warn!("Worker queue full, delaying progress query for {}", handle);
                self.schedule_poll();
            }
            Err(e) => log::warn!("Dropped progress query for {}: {}", handle, e),
        }
    }

    fn show_progress(&mut self, snapshot: TaskSnapshot) {
        if !self.polling || self.task != Some(snapshot.handle) {
            log::debug!("Ignoring stale progress for {}", snapshot.handle);
            return;
        }
        match snapshot.status {
            TaskStatus::Pending | TaskStatus::Running | TaskStatus::Paused => {
                let view = ProgressView::new(snapshot.bytes_downloaded, snapshot.bytes_total);
                self.presenter.show_progress(view, progress_dialog);
                self.schedule_poll();
            }
            TaskStatus::Succeeded => {
                self.stop_polling();
                self.presenter.dismiss(DialogKind::Progress);
                self.forget_persisted_task();
                self.show_install_dialog();
            }
            TaskStatus::Failed => {
                log::warn!(
                    "Download {} failed: {}",
                    snapshot.handle,
                    snapshot.reason.as_deref().unwrap_or("unknown reason")
                );
                self.stop_polling();
                self.unregister_completion_listener();
                self.presenter.dismiss(DialogKind::Progress);
                self.forget_persisted_task();
                self.show_retry_dialog(&download_failed_message(snapshot.reason.as_deref()));
            }
        }
    }

    fn on_download_completed(&mut self) {
        if self.presenter.live_screen().is_none() {
            return;
        }
        self.unregister_completion_listener();
        self.stop_polling();
        self.presenter.dismiss(DialogKind::Progress);
        self.presenter.dismiss(DialogKind::Install);
        self.forget_persisted_task();

        let Some(handle) = self.task else {
            log::warn!("Download completed without an outstanding task");
            return;
        };
        if self.worker.is_shutdown() {
            return;
        }
        let job = VerifyJob {
            downloads: self.host.downloads.clone(),
            installer: self.host.installer.clone(),
            screen: self.presenter.screen(),
            expected_checksum: self.descriptor.checksum.clone(),
            mime_type: self.config.install_mime_type.clone(),
            events: self.events_tx.clone(),
        };
        if let Err(e) = self.worker.execute(move || job.run(handle)) {
            log::warn!("Dropped verification of {}: {}", handle, e);
        }
    }

    fn show_confirm_dialog(&mut self) {
        let description = self.descriptor.description.clone();
        self.presenter.show(DialogKind::Confirm, move || DialogSpec {
            title: strings::NEW_VERSION_READY.to_string(),
            message: description,
            positive: Some(strings::UPDATE),
            negative: Some(strings::CANCEL),
        });
    }

    fn show_retry_dialog(&mut self, reason: &str) {
        self.presenter.show_message(DialogKind::Retry, reason, || DialogSpec {
            title: strings::PROMPT.to_string(),
            message: String::new(),
            positive: Some(strings::RETRY),
            negative: Some(strings::CANCEL),
        });
    }

    fn show_install_dialog(&mut self) {
        let title = strings::update_app_tips_title(&self.descriptor.name);
        self.presenter.show(DialogKind::Install, move || DialogSpec {
            title,
            message: strings::UPDATE_APP_TIPS_DESC.to_string(),
            positive: Some(strings::INSTALL),
            negative: Some(strings::CANCEL),
        });
    }

    fn show_disabled_dialog(&mut self) {
        self.presenter.show(DialogKind::Disabled, || DialogSpec {
            title: strings::PROMPT.to_string(),
            message: strings::DOWNLOAD_MANAGER_DISABLE_TIPS.to_string(),
            positive: Some(strings::GO_TO_SETTINGS),
            negative: Some(strings::DOWNLOAD_BY_BROWSER),
        });
    }

    fn report_launch(&self, result: Result<(), AppError>) {
        if let Err(e) = result {
            log::warn!("Remediation failed: {}", e);
            self.presenter.toast(strings::DOWNLOAD_APK_FAILED_TIPS);
        }
    }

    fn register_completion_listener(&mut self) {
        if self.completion_listener.is_none() {
            let listener = CompletionListener::new(self.events_tx.clone());
            self.completion_listener = Some(self.host.downloads.register_completion(Arc::new(listener)));
        }
    }

    fn unregister_completion_listener(&mut self) {
        if let Some(id) = self.completion_listener.take() {
            self.host.downloads.unregister_completion(id);
        }
    }

    fn forget_persisted_task(&self) {
        if let Err(e) = self.store.clear_task() {
            log::error!("Failed to clear the outstanding download: {}", e);
        }
    }

    fn send(&self, event: UpdateEvent) {
        // The receiver lives as long as `self`.
        let _ = self.events_tx.send(event);
    }
}

impl Drop for UpdateOrchestrator {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Generic download failure text, followed by the service's reason if any.
fn download_failed_message(reason: Option<&str>) -> String {
    match reason {
        Some(reason) => format!("{}: {}", strings::DOWNLOAD_MANAGER_FAILED_TIPS, reason),
        None => strings::DOWNLOAD_MANAGER_FAILED_TIPS.to_string(),
    }
}

fn progress_dialog() -> DialogSpec {
    DialogSpec {
        title: strings::DOWNLOAD_APP.to_string(),
        message: String::new(),
        positive: None,
        negative: Some(strings::CANCEL),
    }
}

/// Locates the finished download, checks its digest and hands it to the
/// installer. Runs on the worker thread.
struct VerifyJob {
    downloads: Arc<dyn DownloadService>,
    installer: Arc<dyn Installer>,
    screen: ScreenHandle,
    expected_checksum: String,
    mime_type: String,
    events: UnboundedSender<UpdateEvent>,
}

impl VerifyJob {
    fn run(self, handle: TaskHandle) {
        match self.verify_and_install(handle) {
            Ok(()) => {}
            Err(AppError::DownloadFailed { reason }) => {
                log::warn!(
                    "Download {} failed: {}",
                    handle,
                    reason.as_deref().unwrap_or("unknown reason")
                );
                self.report(&download_failed_message(reason.as_deref()));
            }
            Err(e @ AppError::ChecksumMismatch { .. }) => {
                log::error!("Download {} rejected: {}", handle, e);
                self.report(strings::CHECK_FILES_FAILED_TIPS);
            }
            Err(e) => {
                log::error!("Failed to install download {}: {}", handle, e);
                self.report(strings::DOWNLOAD_APK_FAILED_TIPS);
            }
        }
    }

    fn verify_and_install(&self, handle: TaskHandle) -> Result<(), AppError> {
        if live(&self.screen).is_none() {
            return Ok(());
        }
        let snapshot = self
            .downloads
            .query(handle)?
            .unwrap_or_else(|| TaskSnapshot::missing(handle));
        if snapshot.status == TaskStatus::Failed {
            return Err(AppError::DownloadFailed {
                reason: snapshot.reason,
            });
        }
        if snapshot.status != TaskStatus::Succeeded {
            return Err(AppError::Service(format!(
                "download {} ended as {:?}: {}",
                handle,
                snapshot.status,
                snapshot.reason.as_deref().unwrap_or("no reason given")
            )));
        }
        let path = snapshot
            .local_path
            .ok_or_else(|| AppError::Service(format!("download {} has no local file", handle)))?;

        let actual = compute_digest(&path);
        if !digest_matches(actual.as_deref(), &self.expected_checksum) {
            return Err(AppError::ChecksumMismatch {
                expected: self.expected_checksum.clone(),
                actual: actual.unwrap_or_default(),
            });
        }

        let uri = Url::from_file_path(&path)
            .map_err(|_| AppError::Io(format!("{} is not an absolute path", path.display())))?;
        let package = InstallPackage {
            path,
            uri: uri.to_string(),
            mime_type: self.mime_type.clone(),
            grant_read: true,
        };
        if !self.installer.can_handle(&package) {
            log::info!("No installer can handle {}", package.uri);
            return Ok(());
        }
        if live(&self.screen).is_none() {
            return Ok(());
        }
        log::info!("Handing {} to the installer", package.uri);
        self.installer.launch(&package)
    }

    fn report(&self, message: &str) {
        let _ = self.events.send(UpdateEvent::Error(message.to_string()));
    }
}
