//! Number rounding and display helpers for gauge and series values.

/// Round to `decimals` places, ties away from zero.
///
/// Non-finite values are returned as-is.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Format an accumulated reading: two decimals, trailing zeros trimmed,
/// thousands separators on the integer part.
pub fn display_reading(value: f64) -> String {
    display_formatted_string(format!("{:.2}", round_to(value, 2)))
}

/// Trims trailing zeros, adds thousands separators.
fn display_formatted_string(formatted: String) -> String {
    let trimmed = if formatted.contains('.') {
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        formatted
    };

    let (sign, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", trimmed.as_str()),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if grouped == "0" && fraction.is_none() { "" } else { sign };
    match fraction {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to_ties_away_from_zero() {
        assert_eq!(round_to(0.125, 2), 0.13);
        assert_eq!(round_to(-0.125, 2), -0.13);
        assert_eq!(round_to(2.5, 0), 3.0);
        assert_eq!(round_to(-2.5, 0), -3.0);
    }

    #[test]
    fn test_round_to_small_values_collapse() {
        assert_eq!(round_to(1.5 / 3600.0, 2), 0.0);
        assert_eq!(round_to(0.004, 2), 0.0);
        assert_eq!(round_to(0.005, 3), 0.005);
    }

    #[test]
    fn test_round_to_non_finite_passthrough() {
        assert!(round_to(f64::NAN, 2).is_nan());
        assert_eq!(round_to(f64::INFINITY, 2), f64::INFINITY);
    }

    #[test]
    fn test_display_reading_trims_and_groups() {
        assert_eq!(display_reading(0.0), "0");
        assert_eq!(display_reading(1.5), "1.5");
        assert_eq!(display_reading(1000.0), "1,000");
        assert_eq!(display_reading(1234567.25), "1,234,567.25");
        assert_eq!(display_reading(-1234.5), "-1,234.5");
    }
}
