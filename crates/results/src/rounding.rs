//! Display-oriented rounding and number formatting.

use rust_decimal::{Decimal, RoundingStrategy};

const SIGNIFICANT_DIGITS: u32 = 7;

/// Rounds a value to something sensible for display: two decimal places above
/// 1000 in magnitude, otherwise seven significant digits. Trailing zeros are
/// dropped.
pub fn smart_round(value: Decimal) -> Decimal {
    let value = value.normalize();
    if value.abs() > Decimal::ONE_THOUSAND {
        return value.round_dp(2).normalize();
    }
    value.round_sf(SIGNIFICANT_DIGITS).unwrap_or(value).normalize()
}

/// Two decimal places with `,` thousands grouping, e.g. `-1,234.50`.
pub fn format_number(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{sign}{grouped}.{fraction}")
}

/// A ratio rendered as a percentage with two decimals, e.g. `0.0125` → `1.25%`.
pub fn format_percent(ratio: Decimal) -> String {
    let pct = (ratio * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{pct:.2}%")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn large_values_keep_two_decimals() {
        assert_eq!(smart_round(dec!(4521.3389)), dec!(4521.34));
        assert_eq!(smart_round(dec!(-1500.005)), dec!(-1500));
        assert_eq!(smart_round(dec!(1200.10)).to_string(), "1200.1");
    }

    #[test]
    fn small_values_keep_seven_significant_digits() {
        assert_eq!(smart_round(dec!(1.23456789)), dec!(1.234568));
        assert_eq!(smart_round(dec!(0.000123456789)), dec!(0.0001234568));
        assert_eq!(smart_round(dec!(999.123456)), dec!(999.1235));
        assert_eq!(smart_round(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn numbers_are_grouped_by_thousands() {
        assert_eq!(format_number(dec!(100000)), "100,000.00");
        assert_eq!(format_number(dec!(1234567.891)), "1,234,567.89");
        assert_eq!(format_number(dec!(999.995)), "1,000.00");
        assert_eq!(format_number(dec!(-1234.5)), "-1,234.50");
        assert_eq!(format_number(dec!(-0.001)), "0.00");
        assert_eq!(format_number(dec!(12)), "12.00");
    }

    #[test]
    fn percentages_have_two_decimals() {
        assert_eq!(format_percent(dec!(0.0125)), "1.25%");
        assert_eq!(format_percent(Decimal::ZERO), "0.00%");
        assert_eq!(format_percent(dec!(-0.5)), "-50.00%");
    }
}
