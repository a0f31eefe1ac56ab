/// Parses a score or coefficient delivered as text. Anything that is not a
/// plain finite decimal (locale separators, blanks, `NaN`, `inf`) becomes
/// `None` instead of an error.
pub fn parse_or_null(raw: Option<&str>) -> Option<f64> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit() || b"+-.eE".contains(&b)) {
        return None;
    }

    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Coefficient that may take part in a weighted computation.
pub fn usable_coefficient(raw: Option<&str>) -> Option<f64> {
    parse_or_null(raw).filter(|value| *value > 0.0)
}

/// Half-up rounding to two decimals, applied only when a value is reported.
/// Works on the shortest decimal text of `value`, so `1.005` rounds to `1.01`
/// even though its binary form sits just below the midpoint.
pub fn round_2(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let text = value.abs().to_string();
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));
    let mut digits = fraction.bytes().map(|b| u128::from(b - b'0'));
    let tenths = digits.next().unwrap_or(0);
    let hundredths = digits.next().unwrap_or(0);
    let next = digits.next().unwrap_or(0);

    let Ok(whole) = whole.parse::<u128>() else {
        return value;
    };
    let mut cents = whole * 100 + tenths * 10 + hundredths;
    if next >= 5 {
        cents += 1;
    }
    let rounded = cents as f64 / 100.0;
    if value.is_sign_negative() {
        -rounded
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_decimals() {
        assert_eq!(parse_or_null(Some("14")), Some(14.0));
        assert_eq!(parse_or_null(Some(" 12.75 ")), Some(12.75));
        assert_eq!(parse_or_null(Some("-0.5")), Some(-0.5));
    }

    #[test]
    fn malformed_text_degrades_to_none() {
        assert_eq!(parse_or_null(None), None);
        assert_eq!(parse_or_null(Some("")), None);
        assert_eq!(parse_or_null(Some("12,5")), None);
        assert_eq!(parse_or_null(Some("abs")), None);
        assert_eq!(parse_or_null(Some("NaN")), None);
        assert_eq!(parse_or_null(Some("inf")), None);
        assert_eq!(parse_or_null(Some("1e400")), None);
    }

    #[test]
    fn non_positive_coefficients_are_unusable() {
        assert_eq!(usable_coefficient(Some("3")), Some(3.0));
        assert_eq!(usable_coefficient(Some("0")), None);
        assert_eq!(usable_coefficient(Some("-2")), None);
        assert_eq!(usable_coefficient(Some("two")), None);
    }

    #[test]
    fn rounds_half_up_to_two_places() {
        assert_eq!(round_2(0.0), 0.0);
        assert_eq!(round_2(12.125), 12.13);
        assert_eq!(round_2(12.124), 12.12);
        assert_eq!(round_2(13.0), 13.0);
        assert_eq!(round_2(200.0 / 3.0), 66.67);
    }

    #[test]
    fn decimal_midpoints_round_up() {
        assert_eq!(round_2(1.005), 1.01);
        assert_eq!(round_2(2.675), 2.68);
        assert_eq!(round_2(8.345), 8.35);
        assert_eq!(round_2(-2.675), -2.68);
    }
}
