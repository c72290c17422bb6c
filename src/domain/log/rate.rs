//! Impulse rate derived from the series.

use super::LogEntry;
use crate::shared::round_to;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// How entries-per-elapsed-hour is scaled into the displayed metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateScale {
    /// Entries per elapsed hour, divided once more by 3600. This is what the
    /// collector's own page has always shown on its gauge.
    #[default]
    Legacy,
    /// Entries per elapsed hour.
    PerHour,
}

/// Rate metric on the [`RateScale::Legacy`] scale.
pub fn compute_rate(series: &[LogEntry]) -> f64 {
    compute_rate_with(series, RateScale::Legacy)
}

/// Rate metric over an ordered series, rounded to two decimals.
///
/// Fewer than two entries, or first and last sharing a timestamp, yield 0.
pub fn compute_rate_with(series: &[LogEntry], scale: RateScale) -> f64 {
    let (first, last) = match (series.first(), series.last()) {
        (Some(first), Some(last)) if series.len() >= 2 => (first, last),
        _ => return 0.0,
    };

    // Subtract in f64: the i64 difference overflows for extreme timestamps.
    let span_hours = (last.time as f64 - first.time as f64) / SECONDS_PER_HOUR;
    if span_hours == 0.0 {
        return 0.0;
    }

    let per_hour = series.len() as f64 / span_hours;
    let rate = match scale {
        RateScale::Legacy => per_hour / SECONDS_PER_HOUR,
        RateScale::PerHour => per_hour,
    };
    round_to(rate, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(times: &[i64]) -> Vec<LogEntry> {
        times
            .iter()
            .enumerate()
            .map(|(i, t)| LogEntry::new(*t, i as f64))
            .collect()
    }

    #[test]
    fn test_empty_and_singleton_are_zero() {
        assert_eq!(compute_rate(&[]), 0.0);
        assert_eq!(compute_rate(&series(&[100])), 0.0);
        assert_eq!(compute_rate_with(&series(&[100]), RateScale::PerHour), 0.0);
    }

    #[test]
    fn test_zero_span_is_zero() {
        assert_eq!(compute_rate(&series(&[0, 0])), 0.0);
        assert_eq!(compute_rate_with(&series(&[0, 0]), RateScale::PerHour), 0.0);
    }

    #[test]
    fn test_three_entries_over_two_hours() {
        let s = series(&[0, 3600, 7200]);
        assert_eq!(compute_rate(&s), 0.0);
        assert_eq!(compute_rate_with(&s, RateScale::PerHour), 1.5);
    }

    #[test]
    fn test_legacy_scale_becomes_visible_at_high_rates() {
        // 3601 pulses, one per second, over one hour.
        let times: Vec<i64> = (0..=3600).collect();
        let s = series(&times);
        assert_eq!(compute_rate(&s), 1.0);
        assert_eq!(compute_rate_with(&s, RateScale::PerHour), 3601.0);
    }

    #[test]
    fn test_per_hour_rounds_to_two_decimals() {
        // 3 entries over 7 hours = 0.428571...
        let s = series(&[0, 3600, 25200]);
        assert_eq!(compute_rate_with(&s, RateScale::PerHour), 0.43);
    }

    #[test]
    fn test_only_endpoints_define_span() {
        let s = series(&[0, 10, 20, 3600]);
        assert_eq!(compute_rate_with(&s, RateScale::PerHour), 4.0);
    }

    #[test]
    fn test_extreme_span_does_not_overflow() {
        let series = [LogEntry::new(i64::MIN, 0.0), LogEntry::new(i64::MAX, 1.0)];
        assert_eq!(compute_rate(&series), 0.0);
        assert_eq!(compute_rate_with(&series, RateScale::PerHour), 0.0);
    }
}
