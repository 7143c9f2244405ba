//! Lenient parsing of currency-like cells and fixed-precision ratio output.
//!
//! Cells in the dataset hold formatted text such as `$5,000`, `150` or an
//! empty string. Parsing here never fails: anything that is not a number
//! after stripping `$` and thousands separators counts as zero.

use std::{str::FromStr, sync::OnceLock};

use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};

pub const DEFAULT_RATIO_PLACES: u32 = 4;

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^-?(?:\d+(?:\.\d*)?|\.\d+)$").expect("amount pattern is valid")
    })
}

fn strip_amount(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect()
}

fn parse_strict(raw: &str) -> Option<Decimal> {
    let cleaned = strip_amount(raw);
    if !number_pattern().is_match(&cleaned) {
        return None;
    }
    let cleaned = cleaned.trim_end_matches('.');
    Decimal::from_str(cleaned).ok()
}

/// Parses `$5,000`, `500`, `-12.5` and friends; empty or malformed input is zero.
pub fn parse_amount(raw: &str) -> Decimal {
    parse_strict(raw).unwrap_or(Decimal::ZERO)
}

/// Parses a stored ratio cell. Unlike amounts, an empty or malformed cell is
/// reported as absent rather than zero.
pub fn parse_ratio(raw: &str) -> Option<Decimal> {
    parse_strict(raw)
}

/// `numerator / denominator`, or `None` when the denominator is not positive
/// or the quotient does not fit in a `Decimal`.
pub fn ratio(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    if denominator <= Decimal::ZERO {
        return None;
    }
    numerator.checked_div(denominator)
}

pub fn format_ratio(value: Decimal, places: u32) -> String {
    let mut rounded = value.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(places);
    rounded.to_string()
}

/// Renders an amount as `$1,234` (fraction kept only when non-zero).
pub fn format_amount(value: Decimal) -> String {
    let normalized = value.normalize();
    let text = normalized.abs().to_string();
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole.to_string(), Some(fraction.to_string())),
        None => (text, None),
    };
    let digits = whole.as_bytes();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, digit) in digits.iter().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*digit as char);
    }
    let sign = if normalized.is_sign_negative() && !normalized.is_zero() {
        "-"
    } else {
        ""
    };
    match fraction {
        Some(fraction) => format!("{sign}${grouped}.{fraction}"),
        None => format!("{sign}${grouped}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn parse_amount_strips_currency_formatting() {
        assert_eq!(parse_amount("$5,000"), Decimal::from(5000));
        assert_eq!(parse_amount("150"), Decimal::from(150));
        assert_eq!(parse_amount(" $ 1,500.50 "), Decimal::new(150050, 2));
        assert_eq!(parse_amount("-20"), Decimal::from(-20));
        assert_eq!(parse_amount("4."), Decimal::from(4));
    }

    #[test]
    fn parse_amount_coerces_garbage_to_zero() {
        assert_eq!(parse_amount(""), Decimal::ZERO);
        assert_eq!(parse_amount("n/a"), Decimal::ZERO);
        assert_eq!(parse_amount("5k"), Decimal::ZERO);
        assert_eq!(parse_amount("$"), Decimal::ZERO);
    }

    #[test]
    fn parse_ratio_distinguishes_absent_from_zero() {
        assert_eq!(parse_ratio(""), None);
        assert_eq!(parse_ratio("abc"), None);
        assert_eq!(parse_ratio("0"), Some(Decimal::ZERO));
        assert_eq!(parse_ratio("0.1250"), Some(Decimal::new(1250, 4)));
    }

    #[test]
    fn ratio_requires_positive_denominator() {
        assert_eq!(ratio(Decimal::from(750), Decimal::ZERO), None);
        assert_eq!(ratio(Decimal::from(750), Decimal::from(-5)), None);
        assert_eq!(
            ratio(Decimal::from(750), Decimal::from(6000)),
            Some(Decimal::new(125, 3))
        );
    }

    #[test]
    fn ratio_is_none_on_overflow() {
        let huge = Decimal::MAX;
        let tiny = Decimal::new(1, 10);
        assert_eq!(ratio(huge, tiny), None);
    }

    #[test]
    fn format_ratio_pads_and_rounds() {
        assert_eq!(format_ratio(Decimal::new(125, 3), 4), "0.1250");
        assert_eq!(format_ratio(Decimal::ZERO, 4), "0.0000");
        assert_eq!(format_ratio(Decimal::new(2, 1) / Decimal::from(3), 4), "0.0667");
        assert_eq!(format_ratio(Decimal::new(12345, 5), 4), "0.1234");
        assert_eq!(format_ratio(Decimal::from(2), 2), "2.00");
    }

    #[test]
    fn format_amount_groups_thousands() {
        assert_eq!(format_amount(Decimal::from(5000)), "$5,000");
        assert_eq!(format_amount(Decimal::from(500)), "$500");
        assert_eq!(format_amount(Decimal::new(1234567, 1)), "$123,456.7");
        assert_eq!(format_amount(Decimal::new(50000, 1)), "$5,000");
        assert_eq!(format_amount(Decimal::from(-1200)), "-$1,200");
    }
}
