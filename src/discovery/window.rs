//! Usage query window.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::Serialize;

use crate::config::DiscoveryConfig;

/// Half-open date interval `[start, end)` passed to the usage API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeWindow {
    /// Window for a discovery run on `today`.
    ///
    /// Covers the previous calendar month, or the current month up to and
    /// including today when `include_current_month` is set. The start is
    /// moved back by `lookback_months - 1` further whole months.
    pub fn for_discovery(today: NaiveDate, config: &DiscoveryConfig) -> Self {
        let month_start = first_of_month(today);
        let (start, end) = if config.include_current_month {
            let end = today.checked_add_days(Days::new(1)).unwrap_or(today);
            (month_start, end)
        } else {
            (months_before(month_start, 1), month_start)
        };
        let extra = config.lookback_months.saturating_sub(1);
        Self {
            start: months_before(start, extra),
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// Number of days covered.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn months_before(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(months)).unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_previous_month_by_default() {
        let window = TimeWindow::for_discovery(date(2026, 3, 15), &DiscoveryConfig::default());
        assert_eq!(window.start, date(2026, 2, 1));
        assert_eq!(window.end, date(2026, 3, 1));
        assert_eq!(window.days(), 28);
        assert!(window.contains(date(2026, 2, 28)));
        assert!(!window.contains(date(2026, 3, 1)));
    }

    #[test]
    fn test_previous_month_across_year_boundary() {
        let window = TimeWindow::for_discovery(date(2026, 1, 1), &DiscoveryConfig::default());
        assert_eq!(window.start, date(2025, 12, 1));
        assert_eq!(window.end, date(2026, 1, 1));
    }

    #[test]
    fn test_current_month_to_date() {
        let config = DiscoveryConfig {
            include_current_month: true,
            ..Default::default()
        };
        let window = TimeWindow::for_discovery(date(2026, 3, 15), &config);
        assert_eq!(window.start, date(2026, 3, 1));
        assert_eq!(window.end, date(2026, 3, 16));
        assert!(window.contains(date(2026, 3, 15)));
    }

    #[test]
    fn test_lookback_extends_start() {
        let config = DiscoveryConfig {
            lookback_months: 3,
            ..Default::default()
        };
        let window = TimeWindow::for_discovery(date(2026, 3, 15), &config);
        assert_eq!(window.start, date(2025, 12, 1));
        assert_eq!(window.end, date(2026, 3, 1));
    }
}
