// src/ingest/window.rs
use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::SourceError;

/// Half-open calendar range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeWindow {
    /// The last `days` days up to and including `today`.
    pub fn last_days(days: u32, today: NaiveDate) -> Result<Self, SourceError> {
        if days == 0 {
            return Err(SourceError::InvalidRequest {
                source_name: "window",
                message: "day count must be at least 1".into(),
            });
        }
        let start = today
            .checked_sub_days(Days::new(u64::from(days)))
            .ok_or_else(|| out_of_range(days))?;
        let end = today
            .checked_add_days(Days::new(1))
            .ok_or_else(|| out_of_range(days))?;
        Ok(Self { start, end })
    }

    /// Last date covered by the window (inclusive).
    pub fn last(&self) -> NaiveDate {
        self.end.pred_opt().unwrap_or(self.end)
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        let d = ts.date();
        d >= self.start && d < self.end
    }

    pub fn start_ts(&self) -> NaiveDateTime {
        self.start.and_time(NaiveTime::MIN)
    }

    pub fn end_ts(&self) -> NaiveDateTime {
        self.end.and_time(NaiveTime::MIN)
    }

    /// Deterministic key used in artifact file names.
    pub fn key(&self) -> String {
        format!("{}_{}", self.start.format("%Y-%m-%d"), self.last().format("%Y-%m-%d"))
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

fn out_of_range(days: u32) -> SourceError {
    SourceError::InvalidRequest {
        source_name: "window",
        message: format!("{days} days is out of the supported date range"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn two_days_includes_today() {
        let w = TimeWindow::last_days(2, d(2026, 10, 16)).unwrap();
        assert_eq!(w.start, d(2026, 10, 14));
        assert_eq!(w.end, d(2026, 10, 17));
        assert_eq!(w.last(), d(2026, 10, 16));
        assert_eq!(w.key(), "2026-10-14_2026-10-16");
        assert_eq!(w.days(), 3);
    }

    #[test]
    fn zero_days_is_rejected() {
        assert!(TimeWindow::last_days(0, d(2026, 1, 1)).is_err());
    }

    #[test]
    fn contains_is_half_open() {
        let w = TimeWindow::last_days(1, d(2026, 3, 1)).unwrap();
        assert!(w.contains(d(2026, 2, 28).and_hms_opt(0, 0, 0).unwrap()));
        assert!(w.contains(d(2026, 3, 1).and_hms_opt(23, 59, 59).unwrap()));
        assert!(!w.contains(d(2026, 3, 2).and_hms_opt(0, 0, 0).unwrap()));
        assert!(!w.contains(d(2026, 2, 27).and_hms_opt(23, 0, 0).unwrap()));
    }
}
