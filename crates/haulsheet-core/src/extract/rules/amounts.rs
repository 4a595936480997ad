//! Monetary amount parsing.

use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::{MONEY, PAREN_MONEY};

/// Parse a statement amount: strips currency markers, thousands
/// separators, and parentheses. Parenthesized amounts are the accounting
/// convention for a deduction and parse as a positive magnitude, never a
/// negative value.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    Decimal::from_str(&cleaned).ok()
}

/// All plain monetary amounts on a line, in order of appearance.
pub fn amounts_on_line(line: &str) -> Vec<Decimal> {
    MONEY
        .captures_iter(line)
        .filter_map(|caps| parse_amount(&caps[1]))
        .collect()
}

/// All parenthesized amounts on a line, in order of appearance.
pub fn paren_amounts_on_line(line: &str) -> Vec<Decimal> {
    PAREN_MONEY
        .captures_iter(line)
        .filter_map(|caps| parse_amount(&caps[1]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_amount_forms() {
        assert_eq!(parse_amount("2,119.07"), Some(d("2119.07")));
        assert_eq!(parse_amount("$ 600.00"), Some(d("600.00")));
        assert_eq!(parse_amount("($ 211.91)"), Some(d("211.91")));
        assert_eq!(parse_amount("795.0"), Some(d("795.0")));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("n/a"), None);
    }

    #[test]
    fn test_parenthesized_is_positive_magnitude() {
        // Deduction convention, not a sign.
        let parsed = parse_amount("($ 1,234.56)").unwrap();
        assert!(parsed > Decimal::ZERO);
        assert_eq!(parsed, d("1234.56"));
    }

    #[test]
    fn test_amounts_on_line_ordered() {
        let line = "B-7KQ2 Smith VW9327 $412.50 $120.00 Fuel $88.10";
        assert_eq!(
            amounts_on_line(line),
            vec![d("412.50"), d("120.00"), d("88.10")]
        );
    }

    #[test]
    fn test_paren_amounts_on_line() {
        let line = "DISPATCH FEE 10% ($ 211.91) ($ 39.00)";
        assert_eq!(paren_amounts_on_line(line), vec![d("211.91"), d("39.00")]);
    }
}
