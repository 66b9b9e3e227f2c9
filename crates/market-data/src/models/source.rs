use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Market;
use crate::errors::MarketDataError;

/// Identifier of a concrete upstream data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    /// Yahoo Finance, the general-purpose source.
    YFinance,
    AlphaVantage,
    Nasdaq,
    Nse,
    Bse,
    Nyse,
}

impl SourceId {
    pub const ALL: [SourceId; 6] = [
        SourceId::YFinance,
        SourceId::AlphaVantage,
        SourceId::Nasdaq,
        SourceId::Nse,
        SourceId::Bse,
        SourceId::Nyse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::YFinance => "yfinance",
            Self::AlphaVantage => "alphavantage",
            Self::Nasdaq => "nasdaq",
            Self::Nse => "nse",
            Self::Bse => "bse",
            Self::Nyse => "nyse",
        }
    }

    /// Markets this source is legally applicable to.
    pub fn markets(&self) -> &'static [Market] {
        match self {
            Self::YFinance | Self::AlphaVantage => &[Market::India, Market::Usa],
            Self::Nasdaq | Self::Nyse => &[Market::Usa],
            Self::Nse | Self::Bse => &[Market::India],
        }
    }

    pub fn serves(&self, market: Market) -> bool {
        self.markets().contains(&market)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == normalized)
            .ok_or_else(|| MarketDataError::InvalidSource(s.to_string()))
    }
}

/// One entry of a caller's source selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceChoice {
    /// Every source eligible for the market, in the fixed default order.
    Auto,
    Source(SourceId),
}

impl fmt::Display for SourceChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Source(id) => id.fmt(f),
        }
    }
}

impl FromStr for SourceChoice {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            Ok(Self::Auto)
        } else {
            s.parse().map(Self::Source)
        }
    }
}

impl From<SourceId> for SourceChoice {
    fn from(id: SourceId) -> Self {
        Self::Source(id)
    }
}

/// Ordered list of sources chosen at construction time. Defaults to `[auto]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSelection(Vec<SourceChoice>);

impl SourceSelection {
    pub fn auto() -> Self {
        Self(vec![SourceChoice::Auto])
    }

    /// Build a selection from typed choices. An empty list means `[auto]`.
    pub fn new(choices: Vec<SourceChoice>) -> Self {
        if choices.is_empty() {
            Self::auto()
        } else {
            Self(choices)
        }
    }

    /// Parse a selection from source names, failing on the first unknown name.
    pub fn parse<I, S>(names: I) -> Result<Self, MarketDataError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let choices = names
            .into_iter()
            .map(|name| name.as_ref().parse())
            .collect::<Result<Vec<SourceChoice>, _>>()?;
        Ok(Self::new(choices))
    }

    pub fn choices(&self) -> &[SourceChoice] {
        &self.0
    }

    pub fn is_auto(&self) -> bool {
        self.0 == [SourceChoice::Auto]
    }
}

impl Default for SourceSelection {
    fn default() -> Self {
        Self::auto()
    }
}

impl fmt::Display for SourceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", names.join(", "))
    }
}
