//! Number formatting shared by every presentation surface.
//!
//! Kamas and experience totals are large integers; the game itself prints
//! them with space-grouped thousands (`1 500 000`), so that is the default.

/// Format a large number with K/M suffix for compact display.
///
/// - Values >= 1,000,000 are formatted as `X.XXM`
/// - Values >= 1,000 are formatted as `X.XXK`
/// - Values below 1,000 are formatted as-is
///
/// # Examples
/// ```
/// use wakmeter_types::formatting::format_compact;
/// assert_eq!(format_compact(500), "500");
/// assert_eq!(format_compact(1_500), "1.50K");
/// assert_eq!(format_compact(1_500_000), "1.50M");
/// ```
pub fn format_compact(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.2}K", n as f64 / 1_000.0)
    } else {
        format!("{}", n)
    }
}

/// Format a number with a thousands separator.
///
/// # Examples
/// ```
/// use wakmeter_types::formatting::format_grouped;
/// assert_eq!(format_grouped(0, ' '), "0");
/// assert_eq!(format_grouped(1_500, ' '), "1 500");
/// assert_eq!(format_grouped(1_500_000, ','), "1,500,000");
/// ```
pub fn format_grouped(n: u64, separator: char) -> String {
    let digits = n.to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(separator);
        }
        result.push(c);
    }
    result
}

/// Format a duration as `H:MM:SS`, or `M:SS` below one hour.
///
/// # Examples
/// ```
/// use wakmeter_types::formatting::format_duration;
/// assert_eq!(format_duration(125), "2:05");
/// assert_eq!(format_duration(3_725), "1:02:05");
/// ```
pub fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_compact() {
        assert_eq!(format_compact(0), "0");
        assert_eq!(format_compact(999), "999");
        assert_eq!(format_compact(1_000), "1.00K");
        assert_eq!(format_compact(15_000), "15.00K");
        assert_eq!(format_compact(999_999), "1000.00K");
        assert_eq!(format_compact(1_000_000), "1.00M");
    }

    #[test]
    fn test_format_grouped() {
        assert_eq!(format_grouped(7, ' '), "7");
        assert_eq!(format_grouped(999, ' '), "999");
        assert_eq!(format_grouped(1_000, ' '), "1 000");
        assert_eq!(format_grouped(12_345_678, ' '), "12 345 678");
        assert_eq!(format_grouped(100_000, '.'), "100.000");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(3_600), "1:00:00");
    }
}
