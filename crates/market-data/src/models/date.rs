use std::fmt;

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;

/// Accepted textual date layouts, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%m/%d/%Y", "%d-%b-%Y"];

/// A calendar date as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateInput {
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Text(String),
}

impl DateInput {
    /// Resolve to a calendar date. Unparseable text is an `InvalidArgument`.
    pub fn to_date(&self) -> Result<NaiveDate, MarketDataError> {
        match self {
            Self::Date(date) => Ok(*date),
            Self::DateTime(dt) => Ok(dt.date_naive()),
            Self::Text(text) => parse_date(text),
        }
    }
}

impl From<NaiveDate> for DateInput {
    fn from(date: NaiveDate) -> Self {
        Self::Date(date)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for DateInput {
    fn from(dt: DateTime<Tz>) -> Self {
        Self::DateTime(dt.with_timezone(&Utc))
    }
}

impl From<&str> for DateInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for DateInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&String> for DateInput {
    fn from(text: &String) -> Self {
        Self::Text(text.clone())
    }
}

fn parse_date(text: &str) -> Result<NaiveDate, MarketDataError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(MarketDataError::InvalidArgument(
            "date must not be empty".to_string(),
        ));
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.date_naive())
        })
        .ok_or_else(|| MarketDataError::InvalidArgument(format!("unparseable date: {}", text)))
}

/// Inclusive calendar range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range from two dates in either order.
    pub fn new(a: NaiveDate, b: NaiveDate) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    /// Build a range from caller-supplied inputs.
    pub fn parse(
        start: impl Into<DateInput>,
        end: impl Into<DateInput>,
    ) -> Result<Self, MarketDataError> {
        Ok(Self::new(start.into().to_date()?, end.into().to_date()?))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of calendar days covered, both ends included.
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Every calendar day in the range, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    /// Split into consecutive sub-ranges of at most `max_days` days each.
    pub fn windows(&self, max_days: u64) -> Vec<DateRange> {
        let span = max_days.max(1);
        let mut windows = Vec::new();
        let mut cursor = self.start;
        while cursor <= self.end {
            let window_end = cursor
                .checked_add_days(Days::new(span - 1))
                .map_or(self.end, |d| d.min(self.end));
            windows.push(DateRange::new(cursor, window_end));
            match window_end.succ_opt() {
                Some(next) => cursor = next,
                None => break,
            }
        }
        windows
    }

    /// Start of the first day, UTC.
    pub fn start_utc(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.start.and_time(chrono::NaiveTime::MIN))
    }

    /// Start of the day after `end`, UTC. Exclusive upper bound for APIs
    /// that treat their end parameter as open.
    pub fn end_exclusive_utc(&self) -> DateTime<Utc> {
        let next = self.end.succ_opt().unwrap_or(self.end);
        Utc.from_utc_datetime(&next.and_time(chrono::NaiveTime::MIN))
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}
