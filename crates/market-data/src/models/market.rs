use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;

/// National exchange jurisdiction a client is bound to.
///
/// The market gates which sources are eligible and drives each adapter's
/// symbol-variant rules (e.g. `.NS`/`.BO` suffixes for India).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    India,
    Usa,
}

impl Market {
    pub const ALL: [Market; 2] = [Market::India, Market::Usa];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::India => "india",
            Self::Usa => "usa",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "india" => Ok(Self::India),
            "usa" => Ok(Self::Usa),
            _ => Err(MarketDataError::InvalidMarket(s.to_string())),
        }
    }
}
