use std::path::PathBuf;
use std::process::Command;

use url::Url;

use crate::domain::AppError;

use super::SystemLauncher;

/// Opens URLs and files with the platform's default handler.
pub struct ShellLauncher {
    settings_target: PathBuf,
}

impl ShellLauncher {
    /// `settings_target` is what "go to settings" opens, usually the
    /// updater's configuration file.
    pub fn new(settings_target: PathBuf) -> Self {
        Self { settings_target }
    }

    fn open(&self, target: &str) -> Result<(), AppError> {
        let (program, args) = platform_opener();
        let program = which::which(program)
            .map_err(|e| AppError::Launch(format!("{} is not available: {}", program, e)))?;
        Command::new(program)
            .args(args)
            .arg(target)
            .spawn()
            .map_err(|e| AppError::Launch(format!("Failed to open {}: {}", target, e)))?;
        Ok(())
    }
}

impl SystemLauncher for ShellLauncher {
    fn open_download_settings(&self) -> Result<(), AppError> {
        if !self.settings_target.exists() {
            return Err(AppError::Launch(format!(
                "{} does not exist",
                self.settings_target.display()
            )));
        }
        self.open(&self.settings_target.to_string_lossy())
    }

    fn open_url(&self, url: &str) -> Result<(), AppError> {
        let url = Url::parse(url).map_err(|e| AppError::Launch(format!("Invalid URL: {}", e)))?;
        if url.host_str().is_none() {
            return Err(AppError::Launch(format!("URL has no host: {}", url)));
        }
        self.open(url.as_str())
    }
}

#[cfg(target_os = "macos")]
fn platform_opener() -> (&'static str, &'static [&'static str]) {
    ("open", &[])
}

#[cfg(target_os = "windows")]
fn platform_opener() -> (&'static str, &'static [&'static str]) {
    ("cmd", &["/C", "start", ""])
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_opener() -> (&'static str, &'static [&'static str]) {
    ("xdg-open", &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_url_without_host() {
        let launcher = ShellLauncher::new(PathBuf::from("/nonexistent"));
        assert!(matches!(launcher.open_url("https://"), Err(AppError::Launch(_))));
        assert!(matches!(launcher.open_url("not a url"), Err(AppError::Launch(_))));
    }

    #[test]
    fn test_missing_settings_target_fails() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = ShellLauncher::new(dir.path().join("missing.json"));
        assert!(launcher.open_download_settings().is_err());
    }
}
