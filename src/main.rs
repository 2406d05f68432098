mod app;

use app_update_manager::UpdaterConfig;
use iced::window;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = UpdaterConfig::load_default().unwrap_or_else(|e| {
        log::warn!("{}; using default configuration", e);
        UpdaterConfig::default()
    });

    // Status polls and transfers run here, independent of the UI executor.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("update-runtime")
        .enable_all()
        .build()?;
    let handle = runtime.handle().clone();

    iced::application(
        move || app::UpdaterApp::new(config.clone(), handle.clone()),
        app::update,
        app::view,
    )
    .title("App Update Manager")
    .subscription(app::subscription)
    .window(window::Settings {
        exit_on_close_request: false,
        ..Default::default()
    })
    .run()?;

    Ok(())
}
