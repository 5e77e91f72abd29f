//! Currency string parsing and formatting

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Default currency symbol used for display
pub const DEFAULT_CURRENCY_SYMBOL: &str = "₹";

/// Strip currency formatting (symbols, grouping separators, spaces) from an
/// amount string, leaving only digits, the sign and the decimal point.
pub fn strip_currency(raw: &str) -> String {
    let mut cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    // "Rs. 100.50" leaves a stray leading dot from the symbol
    while cleaned.matches('.').count() > 1 && cleaned.starts_with('.') {
        cleaned.remove(0);
    }
    cleaned
}

/// Parse a formatted amount; anything unparseable counts as zero.
pub fn parse_amount(raw: &str) -> Decimal {
    parse_amount_strict(raw).unwrap_or(Decimal::ZERO)
}

/// Parse a formatted amount, returning `None` when it is not a number.
///
/// Blank input parses as `None` as well; callers decide whether blank is
/// allowed.
pub fn parse_amount_strict(raw: &str) -> Option<Decimal> {
    let cleaned = strip_currency(raw);
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Parse a percentage such as `"18"` or `"18%"`; invalid input is zero.
pub fn parse_rate(raw: &str) -> Decimal {
    parse_amount(raw)
}

/// Round to two decimal places, half away from zero. The result always
/// carries exactly two decimals (`4750.5` becomes `4750.50`).
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Plain two-decimal string for the wire (`"5000.00"`)
pub fn money_string(value: Decimal) -> String {
    round_money(value).to_string()
}

/// Format as a fixed two-decimal currency string (`₹150.50`)
pub fn format_currency(symbol: &str, value: Decimal) -> String {
    let rounded = round_money(value);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-{}{:.2}", symbol, rounded.abs())
    } else {
        format!("{}{:.2}", symbol, rounded.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_currency() {
        assert_eq!(strip_currency("₹1,234.50"), "1234.50");
        assert_eq!(strip_currency("Rs. 100.50"), "100.50");
        assert_eq!(strip_currency(" $ 12 "), "12");
        assert_eq!(strip_currency("-₹5.00"), "-5.00");
    }

    #[test]
    fn test_parse_amount_tolerates_garbage() {
        assert_eq!(parse_amount("₹100.00"), Decimal::new(10000, 2));
        assert_eq!(parse_amount(""), Decimal::ZERO);
        assert_eq!(parse_amount("abc"), Decimal::ZERO);
        assert_eq!(parse_amount("1.2.3"), Decimal::ZERO);
    }

    #[test]
    fn test_parse_amount_strict() {
        assert_eq!(parse_amount_strict("₹50.50"), Some(Decimal::new(5050, 2)));
        assert_eq!(parse_amount_strict("  "), None);
        assert_eq!(parse_amount_strict("twelve"), None);
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("18"), Decimal::new(18, 0));
        assert_eq!(parse_rate("12.5%"), Decimal::new(125, 1));
        assert_eq!(parse_rate("n/a"), Decimal::ZERO);
    }

    #[test]
    fn test_round_money_keeps_two_places() {
        assert_eq!(money_string(Decimal::new(47505, 1)), "4750.50");
        assert_eq!(money_string(Decimal::new(27085, 3)), "27.09");
        assert_eq!(money_string(Decimal::new(-27085, 3)), "-27.09");
        assert_eq!(money_string(Decimal::new(5, 0)), "5.00");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency("₹", Decimal::new(15050, 2)), "₹150.50");
        assert_eq!(format_currency("₹", Decimal::new(5, 0)), "₹5.00");
        assert_eq!(format_currency("₹", Decimal::new(27085, 3)), "₹27.09");
        assert_eq!(format_currency("$", Decimal::new(-1000, 2)), "-$10.00");
        assert_eq!(format_currency("₹", Decimal::ZERO), "₹0.00");
    }
}
