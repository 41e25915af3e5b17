const TIME_UNITS: &[(&str, f64)] = &[
    ("ns", 1.0),
    ("us", 1e3),
    ("ms", 1e6),
    ("s", 1e9),
    ("mins", 60e9),
    ("hrs", 3600e9),
];

const MEMORY_UNITS: &[(&str, f64)] = &[
    ("B", 1.0),
    ("kB", 1024.0),
    ("MB", 1024.0 * 1024.0),
    ("GB", 1024.0 * 1024.0 * 1024.0),
    ("TB", 1024.0 * 1024.0 * 1024.0 * 1024.0),
];

/// Formats a sample value with the largest unit that keeps it above one, e.g. `1.50s` or `12MB`.
///
/// Units other than time and memory units are printed as plain numbers.
#[allow(clippy::cast_precision_loss, reason = "Values are only displayed")]
pub fn format_value(value: i64, unit: &str) -> String {
    let (base, units) = match unit {
        "nanoseconds" | "ns" => (1.0, TIME_UNITS),
        "microseconds" | "us" => (1e3, TIME_UNITS),
        "milliseconds" | "ms" => (1e6, TIME_UNITS),
        "seconds" | "s" => (1e9, TIME_UNITS),
        "bytes" | "B" => (1.0, MEMORY_UNITS),
        _ => return value.to_string(),
    };

    let scaled = value as f64 * base;
    let (suffix, factor) = units
        .iter()
        .rev()
        .find(|(_, factor)| scaled.abs() >= *factor)
        .unwrap_or(&units[0]);
    let number = format!("{:.2}", scaled / factor);
    let number = number.strip_suffix(".00").unwrap_or(&number);
    format!("{number}{suffix}")
}

/// Formats `value` as a percentage of `total`, right aligned to six characters.
#[allow(clippy::cast_precision_loss, reason = "Values are only displayed")]
pub fn percentage(value: i64, total: i64) -> String {
    let ratio = if total == 0 {
        0.0
    } else {
        (value as f64 / total as f64).abs() * 100.0
    };
    if (99.95..=100.05).contains(&ratio) {
        "  100%".to_owned()
    } else {
        format!("{ratio:5.2}%")
    }
}
