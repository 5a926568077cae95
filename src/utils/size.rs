//! File size formatting and limits

/// Default size above which inputs are flagged as too large (MB)
pub const DEFAULT_MAX_SIZE_MB: u64 = 500;

/// Format a byte count as e.g. `1.5 KB`, rounded to two decimals
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;
    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    let rounded = (size * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit_index])
}

/// Whether `bytes` exceeds `max_size_mb` megabytes
pub fn is_file_too_large(bytes: u64, max_size_mb: u64) -> bool {
    bytes as f64 / (1024.0 * 1024.0) > max_size_mb as f64
}
