//! Human-readable size and duration formatting for the row and header views.

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;
const TIB: u64 = GIB * 1024;

/// Format a byte count with the largest unit whose threshold it meets.
/// Bytes render without fractional digits, everything above with two.
pub fn format_size(bytes: u64) -> String {
    if bytes >= TIB {
        format!("{:.2} TB", bytes as f64 / TIB as f64)
    } else if bytes >= GIB {
        format!("{:.2} GB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.2} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.2} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format a millisecond duration as `h`/`min`/`s`/`ms` components,
/// omitting zero components. An all-zero input renders as `"0ms"` so the
/// caller always gets a displayable string.
pub fn format_duration(millis: u64) -> String {
    let total_secs = millis / 1000;
    let hrs = total_secs / 3600;
    let min = (total_secs / 60) % 60;
    let sec = total_secs % 60;
    let ms = millis % 1000;

    let mut parts = Vec::new();
    if hrs > 0 {
        parts.push(format!("{}h", hrs));
    }
    if min > 0 {
        parts.push(format!("{}min", min));
    }
    if sec > 0 {
        parts.push(format!("{}s", sec));
    }
    if ms > 0 {
        parts.push(format!("{}ms", ms));
    }

    if parts.is_empty() {
        return "0ms".to_string();
    }
    parts.join(" ")
}

/// Percentage of `size` relative to `parent_size`, clamped to [0, 100].
/// Zero when the parent has no size.
pub fn size_percentage(size: u64, parent_size: u64) -> f64 {
    if parent_size == 0 {
        return 0.0;
    }
    (size as f64 / parent_size as f64 * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_unit_thresholds() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1024 * 1024), "1.00 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.00 GB");
        assert_eq!(format_size(1024_u64.pow(4)), "1.00 TB");
    }

    #[test]
    fn size_fractional_digits() {
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(2_621_440), "2.50 MB");
    }

    #[test]
    fn duration_components() {
        assert_eq!(format_duration(61_000), "1min 1s");
        assert_eq!(format_duration(3_661_000), "1h 1min 1s");
        assert_eq!(format_duration(500), "500ms");
        assert_eq!(format_duration(3_600_005), "1h 5ms");
    }

    #[test]
    fn zero_duration_is_0ms() {
        assert_eq!(format_duration(0), "0ms");
    }

    #[test]
    fn percentage_bounds() {
        assert_eq!(size_percentage(0, 0), 0.0);
        assert_eq!(size_percentage(50, 0), 0.0);
        assert_eq!(size_percentage(100, 100), 100.0);
        assert_eq!(size_percentage(50, 200), 25.0);
        // Backend races can momentarily report a child bigger than its parent.
        assert_eq!(size_percentage(300, 200), 100.0);
    }
}
