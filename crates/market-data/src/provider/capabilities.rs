//! Adapter capabilities.
//!
//! This module describes what a source adapter can do so the aggregator can
//! skip it without a network call when it cannot serve a request.

use std::fmt;

use crate::models::Market;

/// The three operations a caller can resolve through the fallback chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    LivePrice,
    HistoricalPrices,
    InstrumentInfo,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LivePrice => "live_price",
            Self::HistoricalPrices => "historical_prices",
            Self::InstrumentInfo => "instrument_info",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Describes the capabilities of a source adapter.
#[derive(Clone, Debug)]
pub struct AdapterCapabilities {
    /// Markets the adapter can serve.
    pub markets: &'static [Market],

    /// Whether the adapter can fetch a live quote.
    pub supports_live: bool,

    /// Whether the adapter supports historical daily bars.
    pub supports_historical: bool,

    /// Whether the adapter can describe an instrument.
    pub supports_info: bool,
}

impl AdapterCapabilities {
    pub fn serves(&self, market: Market) -> bool {
        self.markets.contains(&market)
    }

    pub fn supports(&self, operation: Operation) -> bool {
        match operation {
            Operation::LivePrice => self.supports_live,
            Operation::HistoricalPrices => self.supports_historical,
            Operation::InstrumentInfo => self.supports_info,
        }
    }
}
