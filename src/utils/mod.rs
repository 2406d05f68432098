mod checksum;
mod format;

pub use checksum::{compute_digest, digest_matches};
pub use format::{format_file_size, progress_percent};

/// Sanitize filename to remove invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// File name the package is downloaded to: app name + version name + extension.
pub fn package_file_name(app_name: &str, version_name: &str, extension: &str) -> String {
    let stem = sanitize_filename(&format!("{}{}", app_name, version_name));
    format!(
        "{}.{}",
        stem.trim_matches(|c| c == '.' || c == ' '),
        extension.trim_start_matches('.')
    )
}
