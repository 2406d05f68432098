use std::sync::Arc;

use app_update_manager::{
    domain::{AppError, UpdateEvent},
    host::{CommandInstaller, HostServices, HttpDownloadService, ShellLauncher},
    persistence::TaskStore,
    ui::{Screen, UpdateView, ViewMessage},
    UpdateOrchestrator, UpdaterConfig,
};
use iced::{window, Subscription, Task};
use tokio::runtime::Handle;

pub struct UpdaterApp {
    view: UpdateView,
    screen: Arc<Screen>,
    config: UpdaterConfig,
    runtime: Handle,
    host: Option<HostServices>,
    // One orchestrator per session, created on the first check
    orchestrator: Option<UpdateOrchestrator>,
}

impl UpdaterApp {
    pub fn new(config: UpdaterConfig, runtime: Handle) -> Self {
        Self {
            view: UpdateView::default(),
            screen: Screen::new(),
            config,
            runtime,
            host: None,
            orchestrator: None,
        }
    }

    fn host_services(&mut self) -> Result<HostServices, AppError> {
        if let Some(host) = &self.host {
            return Ok(host.clone());
        }
        let downloads = HttpDownloadService::open(
            &self.config.state_dir,
            self.runtime.clone(),
            self.config.download_service_enabled,
        )?;
        let settings = UpdaterConfig::config_path().unwrap_or_else(|| self.config.state_dir.clone());
        let host = HostServices {
            downloads: Arc::new(downloads),
            installer: Arc::new(CommandInstaller::new(self.config.installer_program.as_deref())),
            launcher: Arc::new(ShellLauncher::new(settings)),
        };
        self.host = Some(host.clone());
        Ok(host)
    }

    fn create_orchestrator(&mut self) -> Result<UpdateOrchestrator, AppError> {
        let host = self.host_services()?;
        let store = TaskStore::open(&self.config.state_dir)?;
        UpdateOrchestrator::create(
            Arc::downgrade(&self.screen),
            self.config.update.clone(),
            host,
            store,
            self.config.clone(),
            self.runtime.clone(),
        )
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    Ui(ViewMessage),
    Orchestrator(Option<UpdateEvent>),
    CloseRequested(window::Id),
}

pub fn update(app: &mut UpdaterApp, message: Message) -> Task<Message> {
    match message {
        Message::Ui(ViewMessage::CheckPressed) => {
            let created = app.orchestrator.is_none();
            if created {
                match app.create_orchestrator() {
                    Ok(orchestrator) => app.orchestrator = Some(orchestrator),
                    Err(e) => {
                        log::error!("Failed to start the update: {}", e);
                        app.view.status_message = format!("Failed to start the update: {}", e);
                        return Task::none();
                    }
                }
            }
            if let Some(orchestrator) = app.orchestrator.as_mut() {
                orchestrator.update();
                app.view.status_message =
                    format!("Checking update {}", orchestrator.descriptor().name);
                // Only the first check starts the event loop
                if created {
                    return listen(orchestrator);
                }
            }
        }
        Message::Ui(ViewMessage::Dialog(action)) => {
            if let Some(orchestrator) = app.orchestrator.as_mut() {
                orchestrator.handle_action(action);
            }
        }
        Message::Ui(ViewMessage::DismissNotices) => app.screen.dismiss_notices(),
        Message::Orchestrator(Some(event)) => {
            if let Some(orchestrator) = app.orchestrator.as_mut() {
                orchestrator.handle_event(event);
                return listen(orchestrator);
            }
        }
        Message::Orchestrator(None) => {}
        Message::CloseRequested(id) => {
            if let Some(mut orchestrator) = app.orchestrator.take() {
                orchestrator.clear();
            }
            app.screen.finish();
            return window::close(id);
        }
    }
    Task::none()
}

fn listen(orchestrator: &UpdateOrchestrator) -> Task<Message> {
    Task::perform(orchestrator.next_event(), Message::Orchestrator)
}

pub fn view(app: &UpdaterApp) -> iced::Element<'_, Message> {
    app.view.view(&app.screen).map(Message::Ui)
}

pub fn subscription(_app: &UpdaterApp) -> Subscription<Message> {
    window::close_requests().map(Message::CloseRequested)
}
