use crate::api::data::DateRange;
use crate::error::InvalidPeriodError;
use chrono::{Duration, Local, Months, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Date range for report queries.
///
/// Immutable once created; `start` never lies after `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl Period {
    /// Creates a period from explicit bounds.
    ///
    /// # Errors
    /// Returns `InvalidPeriodError` if `start` is after `end`.
    pub fn create(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, InvalidPeriodError> {
        if start > end {
            return Err(InvalidPeriodError);
        }
        Ok(Period { start, end })
    }

    /// The last `days` days, ending now.
    pub fn days(days: u32) -> Self {
        Self::days_before(now(), days)
    }

    /// The last `months` months, ending now.
    pub fn months(months: u32) -> Self {
        Self::months_before(now(), months)
    }

    /// The last `years` years, ending now.
    pub fn years(years: u32) -> Self {
        Self::months_before(now(), years.saturating_mul(12))
    }

    /// Period of `days` days ending at `reference`, start at midnight.
    pub fn days_before(reference: NaiveDateTime, days: u32) -> Self {
        let start = reference
            .checked_sub_signed(Duration::days(i64::from(days)))
            .unwrap_or(NaiveDateTime::MIN);
        Period {
            start: midnight(start),
            end: reference,
        }
    }

    /// Period of `months` calendar months ending at `reference`, start at midnight.
    pub fn months_before(reference: NaiveDateTime, months: u32) -> Self {
        let start = reference
            .checked_sub_months(Months::new(months))
            .unwrap_or(NaiveDateTime::MIN);
        Period {
            start: midnight(start),
            end: reference,
        }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// Date range in the shape the Data API expects (`YYYY-MM-DD` bounds).
    pub fn to_range(&self) -> DateRange {
        DateRange {
            start_date: self.start.format("%Y-%m-%d").to_string(),
            end_date: self.end.format("%Y-%m-%d").to_string(),
        }
    }

    /// Compact start bound used in cache keys.
    pub fn start_key(&self) -> String {
        self.start.format("%Y%m%d").to_string()
    }

    /// Compact end bound used in cache keys.
    pub fn end_key(&self) -> String {
        self.end.format("%Y%m%d").to_string()
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn midnight(value: NaiveDateTime) -> NaiveDateTime {
    value.date().and_time(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_create_valid_period() {
        let period = Period::create(at(2024, 1, 1, 0), at(2024, 1, 31, 0)).unwrap();
        let range = period.to_range();
        assert_eq!(range.start_date, "2024-01-01");
        assert_eq!(range.end_date, "2024-01-31");
    }

    #[test]
    fn test_create_same_day_is_valid() {
        let moment = at(2024, 3, 5, 12);
        assert!(Period::create(moment, moment).is_ok());
    }

    #[test]
    fn test_create_rejects_inverted_bounds() {
        let result = Period::create(at(2024, 2, 1, 0), at(2024, 1, 1, 0));
        assert_eq!(result, Err(InvalidPeriodError));
    }

    #[test]
    fn test_days_before_zeroes_start_time() {
        let reference = at(2024, 3, 31, 15);
        let period = Period::days_before(reference, 30);
        assert_eq!(period.end(), reference);
        assert_eq!(
            period.start(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_time(NaiveTime::MIN)
        );
    }

    #[test]
    fn test_months_before_uses_calendar_months() {
        let period = Period::months_before(at(2024, 3, 31, 9), 1);
        assert_eq!(period.start_key(), "20240229");
        assert_eq!(period.end_key(), "20240331");
    }

    #[test]
    fn test_years_covers_twelve_months_per_year() {
        let period = Period::years(2);
        let expected = Period::months(24);
        assert_eq!(period.start().date(), expected.start().date());
    }

    #[test]
    fn test_days_ends_now() {
        let period = Period::days(7);
        assert!(period.start() <= period.end());
        assert_eq!(period.start().time(), NaiveTime::MIN);
    }
}
