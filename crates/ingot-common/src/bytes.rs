//! Human-readable byte formatting for run summaries.

const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

/// Format a byte count with a binary-scaled unit suffix.
pub fn format_bytes(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Format a throughput value in bytes per second.
///
/// Non-finite or negative inputs render as a zero rate, which is what a
/// summary for an empty run should show.
pub fn format_rate(bytes_per_sec: f64) -> String {
    if !bytes_per_sec.is_finite() || bytes_per_sec <= 0.0 {
        return "0 B/s".to_string();
    }

    let mut rate = bytes_per_sec;
    let mut unit_idx = 0;

    while rate >= 1024.0 && unit_idx < UNITS.len() - 1 {
        rate /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}/s", rate, UNITS[unit_idx])
}
