use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{AppError, UpdateDescriptor};

const APP_DIR: &str = "app-update-manager";

/// Environment variable pointing at an alternative config file.
pub const CONFIG_ENV: &str = "APP_UPDATER_CONFIG";

pub const APK_MIME_TYPE: &str = "application/vnd.android.package-archive";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Prefix of the downloaded package file name.
    pub app_name: String,
    pub poll_interval_ms: u64,
    pub worker_queue_capacity: usize,
    pub download_dir: PathBuf,
    /// Where the task id preference and the download table are kept.
    pub state_dir: PathBuf,
    pub package_extension: String,
    pub install_mime_type: String,
    pub download_service_enabled: bool,
    pub installer_program: Option<PathBuf>,
    pub update: UpdateDescriptor,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            app_name: "AppUpdateManager".to_string(),
            poll_interval_ms: 500,
            worker_queue_capacity: 1024,
            download_dir: dirs::download_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR),
            state_dir: dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR),
            package_extension: "apk".to_string(),
            install_mime_type: APK_MIME_TYPE.to_string(),
            download_service_enabled: true,
            installer_program: None,
            update: UpdateDescriptor {
                name: "V8.0.8".to_string(),
                description: "- Long-press an empty area of a chat to preview multiple windows\n\
                              - Group chats can now add bots as helpful assistants"
                    .to_string(),
                url: "https://example.com/app-release.apk".to_string(),
                checksum: "be3575f52431fecb2b40d9c948bf33e6".to_string(),
            },
        }
    }
}

impl UpdaterConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// `$APP_UPDATER_CONFIG`, else `<config dir>/app-update-manager/config.json`.
    pub fn config_path() -> Option<PathBuf> {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.json")))
    }

    /// Reads the config file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AppError::Config(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        serde_json::from_str(&data)
            .map_err(|e| AppError::Config(format!("Invalid config {}: {}", path.display(), e)))
    }

    pub fn load_default() -> Result<Self, AppError> {
        match Self::config_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }
}
