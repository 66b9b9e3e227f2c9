use std::time::Duration;

use clap::{Parser, Subcommand};

/// Live and historical equity prices for India and the USA.
#[derive(Debug, Parser)]
#[command(name = "quotehub", version, about)]
pub struct Cli {
    /// Market to query (usa or india).
    #[arg(long, env = "QUOTEHUB_MARKET", default_value = "usa")]
    pub market: String,

    /// Source to try, in order. Repeat or comma-separate; `auto` expands to
    /// the market's default order.
    #[arg(long = "source", env = "QUOTEHUB_SOURCES", value_delimiter = ',')]
    pub sources: Vec<String>,

    /// Alpha Vantage API key.
    #[arg(long, env = "ALPHAVANTAGE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Per-source timeout in milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Total time budget for one lookup in milliseconds; 0 disables it.
    #[arg(long)]
    pub deadline_ms: Option<u64>,

    /// Include the answering source and per-source diagnostics in the output.
    #[arg(long)]
    pub diagnostics: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Resolve deadline, with `fallback` used when no flag was given.
    ///
    /// `--deadline-ms 0` means no deadline, matching `QUOTEHUB_RESOLVE_TIMEOUT_MS=0`.
    pub fn resolve_deadline(&self, fallback: Option<Duration>) -> Option<Duration> {
        match self.deadline_ms {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => fallback,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Current price and percent change.
    Live { symbol: String },

    /// Daily bars between two dates (inclusive, either order).
    History {
        symbol: String,
        start: String,
        end: String,
    },

    /// Instrument profile (name, sector, industry, ...).
    Info { symbol: String },
}
