use chrono::{Duration, NaiveDate, Utc};
use thiserror::Error;

pub trait Clock {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Day,
    Hour,
    FifteenMinute,
}

impl Interval {
    pub fn code(self) -> &'static str {
        match self {
            Self::Day => "d",
            Self::Hour => "h",
            Self::FifteenMinute => "mi",
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown usage interval '{0}'; expected one of: d, h, mi")]
pub struct IntervalParseError(String);

impl std::str::FromStr for Interval {
    type Err = IntervalParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "d" => Ok(Self::Day),
            "h" => Ok(Self::Hour),
            "mi" => Ok(Self::FifteenMinute),
            other => Err(IntervalParseError(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateRangeError {
    #[error("'start' date {start} can't be after 'end' date {end}")]
    StartAfterEnd { start: NaiveDate, end: NaiveDate },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if start > end {
            return Err(DateRangeError::StartAfterEnd { start, end });
        }

        Ok(Self { start, end })
    }

    /// Inclusive range covering the last `days_back` days up to today.
    pub fn ending_today<C: Clock>(clock: &C, days_back: i64) -> Result<Self, DateRangeError> {
        let end = clock.today();
        let start = end - Duration::days(days_back - 1);
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}
