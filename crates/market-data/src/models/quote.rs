use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::DateRange;

/// Live price snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Moment the upstream observed the price, in UTC.
    pub timestamp: DateTime<Utc>,

    /// Last traded (or after-hours) price.
    pub price: Decimal,

    /// Percent change against the previous close, rounded to 2 dp.
    /// `None` when the source gives no prior close.
    pub change_percent: Option<Decimal>,
}

impl Quote {
    pub fn new(timestamp: DateTime<Utc>, price: Decimal) -> Self {
        Self {
            timestamp,
            price,
            change_percent: None,
        }
    }

    /// Set the percent change
    pub fn with_change_percent(mut self, change_percent: Option<Decimal>) -> Self {
        self.change_percent = change_percent;
        self
    }
}

/// One trading day of OHLCV data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
}

impl HistoricalRecord {
    pub fn new(
        date: NaiveDate,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Option<u64>,
    ) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Historical records ordered ascending by date, one record per date.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Series(Vec<HistoricalRecord>);

impl Series {
    /// Build a series from raw upstream records.
    ///
    /// Records outside `range` are dropped, the rest sorted ascending. When
    /// the upstream repeats a date the record that came last wins.
    pub fn from_records(records: impl IntoIterator<Item = HistoricalRecord>, range: &DateRange) -> Self {
        let mut by_date = BTreeMap::new();
        for record in records {
            if range.contains(record.date) {
                by_date.insert(record.date, record);
            }
        }
        Self(by_date.into_values().collect())
    }

    pub fn records(&self) -> &[HistoricalRecord] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&HistoricalRecord> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&HistoricalRecord> {
        self.0.last()
    }

    pub fn into_records(self) -> Vec<HistoricalRecord> {
        self.0
    }
}

impl IntoIterator for Series {
    type Item = HistoricalRecord;
    type IntoIter = std::vec::IntoIter<HistoricalRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a HistoricalRecord;
    type IntoIter = std::slice::Iter<'a, HistoricalRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
