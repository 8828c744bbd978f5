/// Characters the client uses to group thousands.
const GROUP_SEPARATORS: [char; 5] = [' ', '\u{00a0}', '\u{202f}', '\u{2007}', ','];

/// Parse an integer that may contain thousands separators
/// (space, non-breaking space, narrow no-break space, figure space, comma).
///
/// Returns `None` instead of failing so a bad number makes the whole line non-matching.
pub fn parse_grouped_u64(raw: &str) -> Option<u64> {
    let digits: String = raw
        .trim()
        .chars()
        .filter(|c| !GROUP_SEPARATORS.contains(c))
        .collect();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separator_variants() {
        assert_eq!(parse_grouped_u64("1500"), Some(1500));
        assert_eq!(parse_grouped_u64("1 500"), Some(1500));
        assert_eq!(parse_grouped_u64("1\u{00a0}500"), Some(1500));
        assert_eq!(parse_grouped_u64("1\u{202f}500\u{202f}000"), Some(1_500_000));
        assert_eq!(parse_grouped_u64("12\u{2007}345"), Some(12_345));
        assert_eq!(parse_grouped_u64("1,500"), Some(1500));
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(parse_grouped_u64(""), None);
        assert_eq!(parse_grouped_u64("  "), None);
        assert_eq!(parse_grouped_u64("12a"), None);
        assert_eq!(parse_grouped_u64("99999999999999999999999"), None);
    }
}
