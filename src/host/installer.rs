use std::path::{Path, PathBuf};
use std::process::Command;

use crate::domain::{AppError, InstallPackage};

use super::Installer;

/// Hands packages to an external installer program: `<program> <package path>`.
pub struct CommandInstaller {
    program: Option<PathBuf>,
}

impl CommandInstaller {
    /// Resolves `program` on `PATH`; an unresolvable program leaves the
    /// installer without a handler.
    pub fn new(program: Option<&Path>) -> Self {
        let program = program.and_then(|p| match which::which(p) {
            Ok(resolved) => Some(resolved),
            Err(e) => {
                log::warn!("Installer program {} not found: {}", p.display(), e);
                None
            }
        });
        Self { program }
    }

    pub fn unavailable() -> Self {
        Self { program: None }
    }
}

impl Installer for CommandInstaller {
    fn can_handle(&self, package: &InstallPackage) -> bool {
        self.program.is_some() && package.path.is_file()
    }

    fn launch(&self, package: &InstallPackage) -> Result<(), AppError> {
        let program = self
            .program
            .as_ref()
            .ok_or_else(|| AppError::Install("no installer available".to_string()))?;

        if package.grant_read {
            grant_read_permission(&package.path)?;
        }

        log::info!(
            "Launching installer {} for {} ({})",
            program.display(),
            package.uri,
            package.mime_type
        );
        Command::new(program)
            .arg(&package.path)
            .spawn()
            .map_err(|e| AppError::Install(format!("Failed to start installer: {}", e)))?;
        Ok(())
    }
}

#[cfg(unix)]
fn grant_read_permission(path: &Path) -> Result<(), AppError> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o444);
    std::fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn grant_read_permission(_path: &Path) -> Result<(), AppError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(path: PathBuf) -> InstallPackage {
        InstallPackage {
            uri: format!("file://{}", path.display()),
            path,
            mime_type: "application/vnd.android.package-archive".to_string(),
            grant_read: true,
        }
    }

    #[test]
    fn test_unavailable_installer_cannot_handle() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let installer = CommandInstaller::unavailable();
        assert!(!installer.can_handle(&package(file.path().to_path_buf())));
        assert!(installer.launch(&package(file.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_unknown_program_is_unresolved() {
        let installer =
            CommandInstaller::new(Some(Path::new("definitely-not-an-installer-4f2a9c")));
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(!installer.can_handle(&package(file.path().to_path_buf())));
    }
}
