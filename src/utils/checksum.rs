use std::fs::File;
use std::io::Read;
use std::path::Path;

const CHUNK_SIZE: usize = 1024;

/// MD5 of a file as lowercase hex, or `None` if the file cannot be read.
pub fn compute_digest(path: &Path) -> Option<String> {
    match digest_file(path) {
        Ok(digest) => Some(digest),
        Err(e) => {
            log::warn!("Failed to compute checksum of {}: {}", path.display(), e);
            None
        }
    }
}

fn digest_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut context = md5::Context::new();
    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        context.consume(&buffer[..n]);
    }
    Ok(format!("{:x}", context.compute()))
}

/// Compares a computed digest against the expected one, ignoring hex case.
pub fn digest_matches(actual: Option<&str>, expected: &str) -> bool {
    match actual {
        Some(actual) => !expected.is_empty() && actual.eq_ignore_ascii_case(expected.trim()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_digest_of_known_content() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        assert_eq!(
            compute_digest(file.path()).as_deref(),
            Some("5eb63bbbe01eeed093cb22bb8f5acdc3")
        );
    }

    #[test]
    fn test_digest_of_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(
            compute_digest(file.path()).as_deref(),
            Some("d41d8cd98f00b204e9800998ecf8427e")
        );
    }

    #[test]
    fn test_digest_spanning_several_chunks() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();
        let expected = format!("{:x}", md5::compute(&data));
        assert_eq!(compute_digest(file.path()), Some(expected));
    }

    #[test]
    fn test_missing_file_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(compute_digest(&dir.path().join("absent.apk")), None);
    }

    #[test]
    fn test_digest_matches() {
        assert!(digest_matches(Some("abc123"), "ABC123"));
        assert!(!digest_matches(Some("abc123"), "abc124"));
        assert!(!digest_matches(None, "abc123"));
        assert!(!digest_matches(Some(""), ""));
    }
}
