// 📅 Calendar helpers - calendar months and trailing windows
//
// All ledger dates are plain calendar dates (no time zone); "today" is the
// local date of the machine running the ledger.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Local calendar date
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// `date` moved back `months` calendar months (day clamped to month length).
/// Saturates at the earliest representable date.
pub fn months_before(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN)
}

/// `date` moved forward `months` calendar months (day clamped to month length)
pub fn months_after(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

/// One calendar month, e.g. 2024-01
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
}

impl CalendarMonth {
    /// None unless `month` is 1..=12
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| CalendarMonth { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        CalendarMonth {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parse a "YYYY-MM" key as produced by SQLite's strftime('%Y-%m')
    pub fn parse_key(key: &str) -> Option<Self> {
        let (year, month) = key.split_once('-')?;
        Self::new(year.parse().ok()?, month.parse().ok()?)
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.plus(1)
            .first_day()
            .pred_opt()
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    pub fn plus(&self, months: u32) -> Self {
        Self::containing(months_after(self.first_day(), months))
    }

    pub fn minus(&self, months: u32) -> Self {
        Self::containing(months_before(self.first_day(), months))
    }

    /// "2024-01"
    pub fn key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    /// "Jan"
    pub fn name(&self) -> String {
        self.first_day().format("%b").to_string()
    }

    /// "Jan 24"
    pub fn short_label(&self) -> String {
        self.first_day().format("%b %y").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_bounds() {
        let feb = CalendarMonth::new(2024, 2).unwrap();
        assert_eq!(feb.first_day(), date(2024, 2, 1));
        assert_eq!(feb.last_day(), date(2024, 2, 29));

        let dec = CalendarMonth::new(2023, 12).unwrap();
        assert_eq!(dec.last_day(), date(2023, 12, 31));
        assert!(CalendarMonth::new(2024, 13).is_none());
        assert!(CalendarMonth::new(2024, 0).is_none());
    }

    #[test]
    fn test_month_arithmetic_crosses_years() {
        let nov = CalendarMonth::new(2024, 11).unwrap();
        assert_eq!(nov.plus(3), CalendarMonth::new(2025, 2).unwrap());
        assert_eq!(nov.minus(11), CalendarMonth::new(2023, 12).unwrap());
    }

    #[test]
    fn test_labels_and_keys() {
        let jan = CalendarMonth::new(2025, 1).unwrap();
        assert_eq!(jan.key(), "2025-01");
        assert_eq!(jan.name(), "Jan");
        assert_eq!(jan.short_label(), "Jan 25");
        assert_eq!(CalendarMonth::parse_key("2025-01"), Some(jan));
        assert_eq!(CalendarMonth::parse_key("garbage"), None);
    }

    #[test]
    fn test_months_before_clamps_day() {
        assert_eq!(months_before(date(2024, 3, 31), 1), date(2024, 2, 29));
        assert_eq!(months_after(date(2024, 1, 31), 1), date(2024, 2, 29));
    }
}
