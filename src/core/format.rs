//! Display formatting for market values

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FormatError {
    #[error("not a finite number: {value}")]
    NonFinite { value: f64 },
}

/// Direction of a 24h change, used for color coding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Positive,
    Negative,
    Neutral,
}

/// Classifies a percentage change. Zero is neutral, not positive.
pub fn trend(change: f64) -> Result<Trend, FormatError> {
    if !change.is_finite() {
        return Err(FormatError::NonFinite { value: change });
    }
    if change > 0.0 {
        Ok(Trend::Positive)
    } else if change < 0.0 {
        Ok(Trend::Negative)
    } else {
        Ok(Trend::Neutral)
    }
}

/// Renders a value as US-locale currency with two fractional digits.
pub fn format_currency(value: f64) -> Result<String, FormatError> {
    if !value.is_finite() {
        return Err(FormatError::NonFinite { value });
    }

    let fixed = format!("{:.2}", value.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if value < 0.0 { "-" } else { "" };
    Ok(format!("{sign}${}.{frac}", group_thousands(whole)))
}

/// Renders a value with a T/B/M suffix, falling back to plain currency
/// below one million. Tier bounds are inclusive and checked largest first.
pub fn format_large_number(value: f64) -> Result<String, FormatError> {
    if !value.is_finite() {
        return Err(FormatError::NonFinite { value });
    }

    if value >= 1e12 {
        Ok(format!("${:.2}T", value / 1e12))
    } else if value >= 1e9 {
        Ok(format!("${:.2}B", value / 1e9))
    } else if value >= 1e6 {
        Ok(format!("${:.2}M", value / 1e6))
    } else {
        format_currency(value)
    }
}

fn group_thousands(digits: &str) -> String {
    let reversed: String = digits
        .chars()
        .rev()
        .enumerate()
        .flat_map(|(i, c)| {
            if i > 0 && i % 3 == 0 {
                vec![',', c]
            } else {
                vec![c]
            }
        })
        .collect();
    reversed.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0).unwrap(), "$0.00");
        assert_eq!(format_currency(0.5).unwrap(), "$0.50");
        assert_eq!(format_currency(1234.56).unwrap(), "$1,234.56");
        assert_eq!(format_currency(1234567.891).unwrap(), "$1,234,567.89");
        assert_eq!(format_currency(-1234.5).unwrap(), "-$1,234.50");
    }

    #[test]
    fn test_format_currency_rejects_non_finite() {
        assert!(matches!(
            format_currency(f64::NAN),
            Err(FormatError::NonFinite { .. })
        ));
        assert!(format_currency(f64::INFINITY).is_err());
        assert!(format_currency(f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn test_format_large_number_tiers() {
        assert_eq!(format_large_number(2.45e12).unwrap(), "$2.45T");
        assert_eq!(format_large_number(1e12).unwrap(), "$1.00T");
        assert_eq!(format_large_number(89e9).unwrap(), "$89.00B");
        assert_eq!(format_large_number(1e9).unwrap(), "$1.00B");
        assert_eq!(format_large_number(5.1e6).unwrap(), "$5.10M");
        assert_eq!(format_large_number(1e6).unwrap(), "$1.00M");
    }

    #[test]
    fn test_format_large_number_prefix_rounding() {
        assert_eq!(format_large_number(1.234e12).unwrap(), "$1.23T");
        assert_eq!(format_large_number(1.239e12).unwrap(), "$1.24T");
    }

    #[test]
    fn test_format_large_number_falls_back_below_a_million() {
        for v in [0.01, 42.0, 999.99, 54321.0, 999999.99] {
            assert_eq!(
                format_large_number(v).unwrap(),
                format_currency(v).unwrap()
            );
        }
    }

    #[test]
    fn test_format_large_number_rejects_non_finite() {
        assert!(format_large_number(f64::NAN).is_err());
        assert!(format_large_number(f64::INFINITY).is_err());
    }

    #[test]
    fn test_trend_classification() {
        assert_eq!(trend(2.4).unwrap(), Trend::Positive);
        assert_eq!(trend(-0.01).unwrap(), Trend::Negative);
        assert_eq!(trend(0.0).unwrap(), Trend::Neutral);
        assert!(trend(f64::NAN).is_err());
    }
}
