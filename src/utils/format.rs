use crate::domain::UNKNOWN_SIZE;

/// Download progress in `[0, 100]`; 0 whenever either counter is unknown.
pub fn progress_percent(bytes: i64, total: i64) -> u8 {
    if bytes == UNKNOWN_SIZE || total == UNKNOWN_SIZE || total <= 0 || bytes < 0 {
        return 0;
    }
    let percent = (bytes as f64 / total as f64 * 100.0).floor();
    percent.clamp(0.0, 100.0) as u8
}

/// Human readable size such as "1.50 MB"; unknown sizes render as "--".
pub fn format_file_size(bytes: i64) -> String {
    if bytes < 0 {
        return "--".to_string();
    }
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_of_known_counters() {
        assert_eq!(progress_percent(500, 1000), 50);
        assert_eq!(progress_percent(1000, 1000), 100);
        assert_eq!(progress_percent(0, 1000), 0);
    }

    #[test]
    fn test_percent_is_zero_when_unknown() {
        assert_eq!(progress_percent(-1, 1000), 0);
        assert_eq!(progress_percent(500, -1), 0);
        assert_eq!(progress_percent(-1, -1), 0);
        assert_eq!(progress_percent(10, 0), 0);
    }

    #[test]
    fn test_percent_is_clamped() {
        assert_eq!(progress_percent(3000, 1000), 100);
        assert_eq!(progress_percent(i64::MAX, 1), 100);
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(-1), "--");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1536), "1.50 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.00 MB");
    }
}
