use std::time::Duration;

pub fn format_size(size: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{:.0} {}", size, UNITS[unit_idx])
    } else {
        format!("{:.1} {}", size, UNITS[unit_idx])
    }
}

pub fn format_percentage(numerator: usize, denominator: usize) -> String {
    if denominator == 0 {
        "N/A".to_string()
    } else {
        let percentage = (numerator as f64 / denominator as f64) * 100.0;
        format!("{:.1}%", percentage)
    }
}

/// Decimal megabytes per second
pub fn throughput_mb_per_s(bytes: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs == 0.0 {
        return 0.0;
    }
    bytes as f64 / secs / 1e6
}

/// Bit offset as approximate bytes, e.g. `~25614 B`
pub fn format_bit_offset(bits: usize) -> String {
    format!("~{} B", bits / 8)
}
