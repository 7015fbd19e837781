//! Calendar-date window math for attribution runs.

use chrono::{Days, NaiveDate};

use crate::EngineError;

/// Lookback window length used when the caller does not supply one.
pub const DEFAULT_DAYS_BACK: u32 = 7;

/// The inclusive date range `[end - days_back, end]` over which orders and
/// ad spend are considered for one run. Calendar dates only — order
/// timestamps are truncated to their UTC date before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributionWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl AttributionWindow {
    /// Builds the window ending at `end` and reaching `days_back` days into
    /// the past. `days_back = 0` yields the single-day window `[end, end]`.
    #[must_use]
    pub fn lookback(end: NaiveDate, days_back: u32) -> Self {
        let start = end
            .checked_sub_days(Days::new(u64::from(days_back)))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Validates a caller-supplied `days_back`, substituting the default only
/// when the value is absent.
///
/// # Errors
///
/// Returns [`EngineError::InvalidDaysBack`] for negative values.
pub fn validate_days_back(raw: Option<i64>) -> Result<u32, EngineError> {
    match raw {
        None => Ok(DEFAULT_DAYS_BACK),
        Some(n) => u32::try_from(n).map_err(|_| EngineError::InvalidDaysBack(n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().expect("date literal")
    }

    #[test]
    fn lookback_window_is_inclusive_on_both_ends() {
        let w = AttributionWindow::lookback(d("2026-03-10"), 7);
        assert_eq!(w.start, d("2026-03-03"));
        assert!(w.contains(d("2026-03-03")));
        assert!(w.contains(d("2026-03-10")));
        assert!(!w.contains(d("2026-03-02")));
        assert!(!w.contains(d("2026-03-11")));
    }

    #[test]
    fn zero_days_back_is_a_single_day_window() {
        let w = AttributionWindow::lookback(d("2026-03-10"), 0);
        assert_eq!(w.start, w.end);
        assert!(w.contains(d("2026-03-10")));
        assert!(!w.contains(d("2026-03-09")));
    }

    #[test]
    fn validate_days_back_defaults_when_absent() {
        assert_eq!(validate_days_back(None).expect("default"), DEFAULT_DAYS_BACK);
    }

    #[test]
    fn validate_days_back_accepts_zero_and_positive() {
        assert_eq!(validate_days_back(Some(0)).expect("zero"), 0);
        assert_eq!(validate_days_back(Some(30)).expect("thirty"), 30);
    }

    #[test]
    fn validate_days_back_rejects_negative() {
        let err = validate_days_back(Some(-1)).expect_err("negative must fail");
        assert!(matches!(err, EngineError::InvalidDaysBack(-1)));
    }
}
