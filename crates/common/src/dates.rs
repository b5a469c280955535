//! Calendar helpers for date-picker inputs
//!
//! All arithmetic is on `NaiveDate`, so there is no timezone to drift
//! between computing a value and typing it into the form.
//!
//! Adding a month clamps to the last day of the target month when the
//! reference day does not exist there: Jan 31 becomes Feb 28 (Feb 29 in
//! leap years) and Mar 31 becomes Apr 30.

use chrono::{Days, Local, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Day/month/year, the format every date input in the application expects
pub const DISPLAY_FORMAT: &str = "%d/%m/%Y";

pub fn next_day(date: NaiveDate) -> Result<NaiveDate> {
    date.checked_add_days(Days::new(1))
        .ok_or_else(|| Error::DateOutOfRange(format!("{} + 1 day", date)))
}

pub fn previous_day(date: NaiveDate) -> Result<NaiveDate> {
    date.checked_sub_days(Days::new(1))
        .ok_or_else(|| Error::DateOutOfRange(format!("{} - 1 day", date)))
}

/// Same day next month, clamped to the end of a shorter month.
pub fn one_month_after(date: NaiveDate) -> Result<NaiveDate> {
    date.checked_add_months(Months::new(1))
        .ok_or_else(|| Error::DateOutOfRange(format!("{} + 1 month", date)))
}

pub fn format_display(date: NaiveDate) -> String {
    date.format(DISPLAY_FORMAT).to_string()
}

pub fn parse_display(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), DISPLAY_FORMAT).map_err(|_| Error::DateParse {
        input: input.to_string(),
    })
}

/// The "today" a suite run computes relative dates from.
///
/// Built once per run so that every stage agrees on the same calendar day,
/// even when the run crosses midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateContext {
    today: NaiveDate,
}

impl DateContext {
    pub fn now() -> Self {
        Self {
            today: Local::now().date_naive(),
        }
    }

    pub fn fixed(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn tomorrow(&self) -> Result<NaiveDate> {
        next_day(self.today)
    }

    pub fn yesterday(&self) -> Result<NaiveDate> {
        previous_day(self.today)
    }

    pub fn month_ahead(&self) -> Result<NaiveDate> {
        one_month_after(self.today)
    }

    /// Resolve one of the named relative dates into its display string.
    pub fn display(&self, name: &str) -> Option<Result<String>> {
        let date = match name {
            "today" => Ok(self.today),
            "tomorrow" => self.tomorrow(),
            "yesterday" => self.yesterday(),
            "month_ahead" => self.month_ahead(),
            _ => return None,
        };
        Some(date.map(format_display))
    }
}

impl Default for DateContext {
    fn default() -> Self {
        Self::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_next_and_previous_day_roll_over() {
        assert_eq!(next_day(d(2024, 1, 31)).unwrap(), d(2024, 2, 1));
        assert_eq!(next_day(d(2024, 2, 28)).unwrap(), d(2024, 2, 29));
        assert_eq!(next_day(d(2023, 2, 28)).unwrap(), d(2023, 3, 1));
        assert_eq!(next_day(d(2024, 12, 31)).unwrap(), d(2025, 1, 1));

        assert_eq!(previous_day(d(2024, 3, 1)).unwrap(), d(2024, 2, 29));
        assert_eq!(previous_day(d(2023, 3, 1)).unwrap(), d(2023, 2, 28));
        assert_eq!(previous_day(d(2025, 1, 1)).unwrap(), d(2024, 12, 31));
    }

    #[test]
    fn test_one_month_after_clamps_to_month_end() {
        assert_eq!(one_month_after(d(2024, 1, 15)).unwrap(), d(2024, 2, 15));
        assert_eq!(one_month_after(d(2024, 1, 29)).unwrap(), d(2024, 2, 29));
        assert_eq!(one_month_after(d(2024, 1, 31)).unwrap(), d(2024, 2, 29));
        assert_eq!(one_month_after(d(2023, 1, 31)).unwrap(), d(2023, 2, 28));
        assert_eq!(one_month_after(d(2023, 1, 30)).unwrap(), d(2023, 2, 28));
        assert_eq!(one_month_after(d(2024, 3, 31)).unwrap(), d(2024, 4, 30));
        assert_eq!(one_month_after(d(2024, 8, 31)).unwrap(), d(2024, 9, 30));
        assert_eq!(one_month_after(d(2024, 12, 31)).unwrap(), d(2025, 1, 31));
    }

    #[test]
    fn test_out_of_range_is_an_error() {
        assert!(next_day(NaiveDate::MAX).is_err());
        assert!(previous_day(NaiveDate::MIN).is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let date = d(2024, 2, 9);
        let shown = format_display(date);
        assert_eq!(shown, "09/02/2024");
        assert_eq!(parse_display(&shown).unwrap(), date);
    }

    #[test]
    fn test_parse_rejects_other_formats() {
        assert!(parse_display("2024-02-09").is_err());
        assert!(parse_display("31/02/2024").is_err());
        assert!(matches!(parse_display("x"), Err(Error::DateParse { .. })));
    }

    #[test]
    fn test_date_context_named_dates() {
        let ctx = DateContext::fixed(d(2024, 1, 31));
        assert_eq!(ctx.display("today").unwrap().unwrap(), "31/01/2024");
        assert_eq!(ctx.display("tomorrow").unwrap().unwrap(), "01/02/2024");
        assert_eq!(ctx.display("yesterday").unwrap().unwrap(), "30/01/2024");
        assert_eq!(ctx.display("month_ahead").unwrap().unwrap(), "29/02/2024");
        assert!(ctx.display("next_week").is_none());
    }
}
