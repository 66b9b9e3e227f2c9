//! Market data models
//!
//! This module contains the core data types:
//! - `market` - The national market a client is bound to (Market)
//! - `source` - Source identifiers and caller selections (SourceId, SourceChoice, SourceSelection)
//! - `quote` - Price data (Quote, HistoricalRecord, Series)
//! - `profile` - Descriptive instrument data (InstrumentInfo)
//! - `date` - Caller date inputs and inclusive ranges (DateInput, DateRange)

mod date;
mod market;
mod profile;
mod quote;
mod source;

pub use date::{DateInput, DateRange};
pub use market::Market;
pub use profile::InstrumentInfo;
pub use quote::{HistoricalRecord, Quote, Series};
pub use source::{SourceChoice, SourceId, SourceSelection};
