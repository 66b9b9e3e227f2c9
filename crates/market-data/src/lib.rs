//! Quotehub Market Data Crate
//!
//! This crate retrieves live and historical equity prices for the Indian
//! and US markets from several upstream sources, normalizes them into one
//! record format and resolves every request through a fallback chain.
//!
//! # Overview
//!
//! The market data crate supports:
//! - Two markets: India and USA
//! - Six sources: Yahoo Finance, Alpha Vantage, Nasdaq, NYSE, NSE, BSE
//! - Country policy deciding which sources may answer, and in what order
//! - First-success-wins fallback with per-source diagnostics
//!
//! # Architecture
//!
//! ```text
//!                          +------------------+
//!                          | StockPriceClient |  (facade, argument checks)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |    Aggregator    |  (policy, gating, timeouts)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |  SourceAdapter   |  (Yahoo, NSE, BSE, etc.)
//!                          +------------------+
//!                                  |
//!                                  v
//!                     +---------------------------+
//!                     | Quote / Series / Instrument|  (normalized data)
//!                     +---------------------------+
//! ```
//!
//! # Example
//!
//! ```no_run
//! use quotehub_market_data::{ClientConfig, StockPriceClient};
//!
//! # async fn run() -> Result<(), quotehub_market_data::errors::MarketDataError> {
//! let config = ClientConfig::builder().market("india").sources(["nse", "auto"]).build()?;
//! let client = StockPriceClient::new(config);
//!
//! if let Some(quote) = client.get_live_price("RELIANCE").await? {
//!     println!("{} at {}", quote.price, quote.timestamp);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Core Types
//!
//! - [`Quote`] - Live price with percent change
//! - [`HistoricalRecord`] / [`Series`] - Daily OHLCV bars
//! - [`InstrumentInfo`] - Provider-sourced profile data (sector, industry, etc.)
//! - [`SourceId`] / [`SourceSelection`] - Which sources to consult
//! - [`FetchDiagnostics`] - What each source did during a resolution

pub mod client;
pub mod config;
pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;

pub use client::StockPriceClient;
pub use config::{ClientConfig, ClientConfigBuilder, Credentials};
pub use errors::{FailureClass, MarketDataError};

// Re-export all public types from models
pub use models::{
    DateInput, DateRange, HistoricalRecord, InstrumentInfo, Market, Quote, Series, SourceChoice,
    SourceId, SourceSelection,
};

// Re-export provider types
pub use provider::alpha_vantage::AlphaVantageAdapter;
pub use provider::bse::BseAdapter;
pub use provider::nasdaq::NasdaqAdapter;
pub use provider::nse::NseAdapter;
pub use provider::nyse::NyseAdapter;
pub use provider::yahoo::YahooAdapter;
pub use provider::{AdapterCapabilities, AdapterResult, FetchContext, Operation, SourceAdapter};

// Re-export registry types
pub use registry::{
    eligible_sources, Aggregator, AttemptOutcome, FetchDiagnostics, QuoteValidator, SkipReason,
    Sourced,
};
