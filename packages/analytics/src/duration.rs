//! Stop duration parsing.

use std::sync::LazyLock;

use regex::Regex;

/// First number, an optional dash, and an optional second number.
static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)-?(\d+)?").expect("valid regex"));

/// Minutes represented by a free-form duration such as `"6-15 minutes"`.
///
/// Uses the first match only and averages the captured bounds, so
/// `"6-15 minutes"` is `10.5` and `"30+ Min"` is `30.0`. Returns `None`
/// when the text has no digits.
#[must_use]
pub fn parse_minutes(text: &str) -> Option<f64> {
    let caps = DURATION_RE.captures(text)?;

    let values: Vec<f64> = [caps.get(1), caps.get(2)]
        .into_iter()
        .flatten()
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .collect();

    if values.is_empty() {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_a_range() {
        assert_eq!(parse_minutes("6-15 minutes"), Some(10.5));
        assert_eq!(parse_minutes("16-30 Min"), Some(23.0));
    }

    #[test]
    fn single_bound() {
        assert_eq!(parse_minutes("30+ Min"), Some(30.0));
        assert_eq!(parse_minutes("about 5 minutes"), Some(5.0));
    }

    #[test]
    fn only_the_first_match_counts() {
        assert_eq!(parse_minutes("0-15 Min, then 40-60"), Some(7.5));
    }

    #[test]
    fn no_digits_is_missing() {
        assert_eq!(parse_minutes(""), None);
        assert_eq!(parse_minutes("N/A"), None);
    }
}
