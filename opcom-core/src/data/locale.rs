//! Romanian-locale number parsing.
//!
//! The report formats numbers with `.` as thousands separator and `,` as
//! decimal separator, e.g. `2.005,2` for 2005.2.

/// Parse a locale-formatted number.
///
/// Strips every `.`, turns `,` into `.`, then parses. Returns `None` for
/// empty input or anything that does not parse to a finite value.
pub fn parse_locale_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized: String = trimmed
        .chars()
        .filter(|&c| c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}
