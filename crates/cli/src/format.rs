//! Fixed-width SI formatting for the result table.

/// Render a value to at most three significant digits.
fn format_value(value: f64) -> String {
    if value >= 10.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

/// Byte count with an SI prefix and a `b` unit (`605b`, `1.2kb`, `25Mb`).
pub fn format_size(bytes: u64) -> String {
    const PREFIXES: [&str; 5] = ["", "k", "M", "G", "T"];

    if bytes < 1000 {
        return format!("{bytes}b");
    }
    let mut value = bytes as f64;
    let mut prefix = 0;
    while value >= 1000.0 && prefix + 1 < PREFIXES.len() {
        value /= 1000.0;
        prefix += 1;
    }
    format!("{}{}b", format_value(value), PREFIXES[prefix])
}

/// Seconds with a sub-unit SI prefix (`1.5s`, `340ms`, `25µs`).
pub fn format_seconds(seconds: f64) -> String {
    const UNITS: [(f64, &str); 4] = [(1.0, "s"), (1e-3, "ms"), (1e-6, "µs"), (1e-9, "ns")];

    for (scale, unit) in UNITS {
        if seconds >= scale {
            return format!("{}{}", format_value(seconds / scale), unit);
        }
    }
    "0s".to_string()
}

/// Number of decimal digits in `value`, for column sizing.
pub fn digit_width(value: u64) -> usize {
    value.max(1).ilog10() as usize + 1
}
