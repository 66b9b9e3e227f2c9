//! Stock price client - facade over the aggregator.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        StockPriceClient                          │
//! │                                                                  │
//! │  symbol ─▶ validate ─▶ Aggregator ─▶ Option<Sourced<T>>          │
//! │                           │                                      │
//! │            ClientConfig ──┘  (market, selection, credentials)    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use log::{debug, warn};

use crate::config::ClientConfig;
use crate::errors::MarketDataError;
use crate::models::{DateInput, DateRange, InstrumentInfo, Market, Quote, Series};
use crate::provider::alpha_vantage::AlphaVantageAdapter;
use crate::provider::bse::BseAdapter;
use crate::provider::nasdaq::NasdaqAdapter;
use crate::provider::nse::NseAdapter;
use crate::provider::nyse::NyseAdapter;
use crate::provider::yahoo::YahooAdapter;
use crate::provider::SourceAdapter;
use crate::registry::{Aggregator, FetchDiagnostics, ResolveScope, Sourced};

/// Entry point for price lookups in one market.
///
/// Configuration errors surface from [`ClientConfig`] construction. Per-call
/// `Err` means a malformed argument; `Ok(None)` means no eligible source had
/// an answer.
pub struct StockPriceClient {
    config: ClientConfig,
    aggregator: Aggregator,
}

impl StockPriceClient {
    /// Create a client wired to the six built-in adapters.
    ///
    /// An adapter that cannot be initialized is left out and reported as
    /// not registered in diagnostics.
    pub fn new(config: ClientConfig) -> Self {
        let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::with_capacity(6);

        match YahooAdapter::new() {
            Ok(yahoo) => adapters.push(Arc::new(yahoo)),
            Err(e) => warn!("Failed to initialize yfinance adapter: {}", e),
        }
        adapters.push(Arc::new(AlphaVantageAdapter::new()));
        adapters.push(Arc::new(NasdaqAdapter::new()));
        adapters.push(Arc::new(NyseAdapter::new()));
        adapters.push(Arc::new(NseAdapter::new()));
        adapters.push(Arc::new(BseAdapter::new()));

        Self::with_adapters(config, adapters)
    }

    /// Create a client over an explicit adapter set.
    pub fn with_adapters(config: ClientConfig, adapters: Vec<Arc<dyn SourceAdapter>>) -> Self {
        let aggregator = Aggregator::new(adapters)
            .with_adapter_timeout(config.adapter_timeout())
            .with_resolve_timeout(config.resolve_timeout());

        debug!(
            "StockPriceClient for {} with sources {} (registered: {:?})",
            config.market(),
            config.selection(),
            aggregator.registered()
        );

        Self { config, aggregator }
    }

    pub fn market(&self) -> Market {
        self.config.market()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn scope(&self) -> ResolveScope<'_> {
        ResolveScope {
            market: self.config.market(),
            selection: self.config.selection(),
            credentials: self.config.credentials(),
        }
    }

    /// Current price of `symbol`.
    pub async fn get_live_price(&self, symbol: &str) -> Result<Option<Quote>, MarketDataError> {
        let (result, _) = self.get_live_price_with_diagnostics(symbol).await?;
        Ok(result.map(|sourced| sourced.value))
    }

    /// Daily bars of `symbol` between `start` and `end`, both inclusive and
    /// in either order.
    pub async fn get_historical_prices(
        &self,
        symbol: &str,
        start: impl Into<DateInput>,
        end: impl Into<DateInput>,
    ) -> Result<Option<Series>, MarketDataError> {
        let (result, _) = self
            .get_historical_prices_with_diagnostics(symbol, start, end)
            .await?;
        Ok(result.map(|sourced| sourced.value))
    }

    /// Descriptive data about `symbol`.
    pub async fn get_instrument_info(
        &self,
        symbol: &str,
    ) -> Result<Option<InstrumentInfo>, MarketDataError> {
        let (result, _) = self.get_instrument_info_with_diagnostics(symbol).await?;
        Ok(result.map(|sourced| sourced.value))
    }

    pub async fn get_live_price_with_diagnostics(
        &self,
        symbol: &str,
    ) -> Result<(Option<Sourced<Quote>>, FetchDiagnostics), MarketDataError> {
        let symbol = normalize_symbol(symbol)?;
        Ok(self.aggregator.resolve_live(self.scope(), &symbol).await)
    }

    pub async fn get_historical_prices_with_diagnostics(
        &self,
        symbol: &str,
        start: impl Into<DateInput>,
        end: impl Into<DateInput>,
    ) -> Result<(Option<Sourced<Series>>, FetchDiagnostics), MarketDataError> {
        let symbol = normalize_symbol(symbol)?;
        let range = DateRange::parse(start, end)?;
        Ok(self
            .aggregator
            .resolve_historical(self.scope(), &symbol, &range)
            .await)
    }

    pub async fn get_instrument_info_with_diagnostics(
        &self,
        symbol: &str,
    ) -> Result<(Option<Sourced<InstrumentInfo>>, FetchDiagnostics), MarketDataError> {
        let symbol = normalize_symbol(symbol)?;
        Ok(self
            .aggregator
            .resolve_instrument_info(self.scope(), &symbol)
            .await)
    }
}

/// Trimmed, upper-cased symbol. Blank input is an argument error.
fn normalize_symbol(symbol: &str) -> Result<String, MarketDataError> {
    let trimmed = symbol.trim();
    if trimmed.is_empty() {
        return Err(MarketDataError::InvalidArgument(
            "symbol must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_ascii_uppercase())
}
