pub const NEW_VERSION_READY: &str = "New version ready";
pub const UPDATE: &str = "Update";
pub const CANCEL: &str = "Cancel";
pub const DOWNLOAD_APP: &str = "Downloading update";
pub const PROMPT: &str = "Notice";
pub const RETRY: &str = "Retry";
pub const INSTALL: &str = "Install";
pub const GO_TO_SETTINGS: &str = "Go to settings";
pub const DOWNLOAD_BY_BROWSER: &str = "Download in browser";

pub const UPDATE_APP_TIPS_DESC: &str =
    "The new version has been downloaded. Install it now?";
pub const DOWNLOAD_MANAGER_DISABLE_TIPS: &str =
    "The system download service is disabled. Enable it in settings, or download the update in your browser.";
pub const DOWNLOAD_MANAGER_FAILED_TIPS: &str = "Failed to download the update";
pub const DOWNLOAD_APK_FAILED_TIPS: &str = "Failed to install the update, please try again later";
pub const CHECK_FILES_FAILED_TIPS: &str =
    "File integrity check failed, the downloaded package may be damaged";

pub fn update_app_tips_title(version_name: &str) -> String {
    format!("Update to {}", version_name)
}
