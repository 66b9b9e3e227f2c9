//! Yahoo Finance source adapter.
//!
//! Serves both markets:
//! - Live quotes from the 5-day daily chart (last close vs prior close)
//! - Daily history from the chart API
//! - Instrument info from quoteSummary, falling back to ticker search
//!
//! For India, bare symbols are tried as `SYM.NS`, `SYM.BO`, then `SYM`.

mod models;

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header;
use time::OffsetDateTime;
use tracing::{debug, warn};
use urlencoding::encode;
use yahoo_finance_api as yahoo;

use crate::errors::MarketDataError;
use crate::models::{DateRange, HistoricalRecord, InstrumentInfo, Market, Quote, SourceId};
use crate::provider::{
    decimal_from_f64, has_exchange_suffix, percent_change, try_variants, AdapterCapabilities,
    AdapterResult, FetchContext, SourceAdapter, BROWSER_USER_AGENT, REQUEST_TIMEOUT,
};

use models::{RawNumber, SummaryEnvelope, SummaryModules};

const PROVIDER: SourceId = SourceId::YFinance;

const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_URL: &str = "https://query1.finance.yahoo.com/v1/test/getcrumb";
const QUOTE_SUMMARY_URL: &str = "https://query1.finance.yahoo.com/v10/finance/quoteSummary";

// ============================================================================
// Crumb/Cookie Authentication
// ============================================================================

/// Cached Yahoo authentication data
#[derive(Debug, Clone)]
struct CrumbData {
    cookie: String,
    crumb: String,
}

// ============================================================================
// Yahoo Adapter
// ============================================================================

/// Yahoo Finance source adapter.
pub struct YahooAdapter {
    connector: yahoo::YahooConnector,
    client: reqwest::Client,
    crumb: RwLock<Option<CrumbData>>,
}

impl YahooAdapter {
    /// Create a new Yahoo Finance adapter.
    pub fn new() -> Result<Self, MarketDataError> {
        let connector = yahoo::YahooConnector::new().map_err(|e| {
            MarketDataError::provider(
                PROVIDER.as_str(),
                format!("Failed to initialize Yahoo connector: {}", e),
            )
        })?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(BROWSER_USER_AGENT)
            .build()?;

        Ok(Self {
            connector,
            client,
            crumb: RwLock::default(),
        })
    }

    /// Symbols to try for `symbol` in `market`.
    pub fn symbol_variants(symbol: &str, market: Market) -> Vec<String> {
        match market {
            Market::India if !has_exchange_suffix(symbol) => vec![
                format!("{}.NS", symbol),
                format!("{}.BO", symbol),
                symbol.to_string(),
            ],
            _ => vec![symbol.to_string()],
        }
    }

    fn map_yahoo_error(symbol: &str, e: yahoo::YahooError) -> MarketDataError {
        if matches!(e, yahoo::YahooError::NoQuotes | yahoo::YahooError::NoResult) {
            MarketDataError::SymbolNotFound(symbol.to_string())
        } else {
            MarketDataError::provider(PROVIDER.as_str(), e.to_string())
        }
    }

    // ========================================================================
    // Crumb/Cookie Authentication
    // ========================================================================

    fn read_crumb(&self) -> RwLockReadGuard<'_, Option<CrumbData>> {
        self.crumb.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_crumb(&self) -> RwLockWriteGuard<'_, Option<CrumbData>> {
        self.crumb.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Ensure we have a valid Yahoo authentication crumb.
    async fn ensure_crumb(&self) -> AdapterResult<CrumbData> {
        if let Some(crumb) = self.read_crumb().as_ref() {
            return Ok(crumb.clone());
        }

        self.fetch_crumb().await
    }

    /// Fetch a new Yahoo authentication crumb.
    async fn fetch_crumb(&self) -> AdapterResult<CrumbData> {
        // Step 1: Get cookie from fc.yahoo.com
        let response = self.client.get(COOKIE_URL).send().await.map_err(|e| {
            MarketDataError::provider(PROVIDER.as_str(), format!("Failed to get cookie: {}", e))
        })?;

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split_once(';').map(|(v, _)| v.to_string()))
            .ok_or_else(|| {
                MarketDataError::provider(PROVIDER.as_str(), "Failed to parse Yahoo cookie")
            })?;

        // Step 2: Get crumb using cookie
        let crumb = self
            .client
            .get(CRUMB_URL)
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .map_err(|e| {
                MarketDataError::provider(PROVIDER.as_str(), format!("Failed to get crumb: {}", e))
            })?
            .text()
            .await
            .map_err(|e| {
                MarketDataError::provider(PROVIDER.as_str(), format!("Failed to read crumb: {}", e))
            })?;

        let crumb_data = CrumbData { cookie, crumb };
        *self.write_crumb() = Some(crumb_data.clone());

        Ok(crumb_data)
    }

    /// Clear the cached crumb (used when authentication fails)
    fn clear_crumb(&self) {
        *self.write_crumb() = None;
    }

    // ========================================================================
    // Quote Fetching
    // ========================================================================

    /// Convert chrono DateTime<Utc> to time::OffsetDateTime for the Yahoo API.
    fn chrono_to_offset_datetime(dt: DateTime<Utc>) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(dt.timestamp())
            .unwrap_or_else(|_| OffsetDateTime::now_utc())
    }

    async fn fetch_live_variant(&self, symbol: String) -> AdapterResult<Quote> {
        debug!("Fetching 5d chart for {} from Yahoo", symbol);

        let response = self
            .connector
            .get_quote_range(&symbol, "1d", "5d")
            .await
            .map_err(|e| Self::map_yahoo_error(&symbol, e))?;

        let bars = response
            .quotes()
            .map_err(|e| Self::map_yahoo_error(&symbol, e))?;

        let closes: Vec<(i64, f64)> = bars
            .iter()
            .map(|q| (q.timestamp as i64, q.close))
            .collect();

        live_quote_from_closes(&symbol, &closes)
    }

    async fn fetch_history_variant(
        &self,
        symbol: String,
        range: DateRange,
    ) -> AdapterResult<Vec<HistoricalRecord>> {
        debug!("Fetching history for {} over {} from Yahoo", symbol, range);

        let start = Self::chrono_to_offset_datetime(range.start_utc());
        // Yahoo treats the end bound as exclusive
        let end = Self::chrono_to_offset_datetime(range.end_exclusive_utc());

        let response = self
            .connector
            .get_quote_history(&symbol, start, end)
            .await
            .map_err(|e| Self::map_yahoo_error(&symbol, e))?;

        let bars = match response.quotes() {
            Ok(bars) => bars,
            Err(yahoo::YahooError::NoQuotes) => {
                warn!("No historical quotes returned for '{}' over {}", symbol, range);
                return Err(MarketDataError::NoDataForRange);
            }
            Err(e) => return Err(Self::map_yahoo_error(&symbol, e)),
        };

        let records: Vec<HistoricalRecord> = bars
            .iter()
            .filter_map(|q| {
                bar_to_record(q.timestamp as i64, q.open, q.high, q.low, q.close, q.volume)
            })
            .collect();

        if records.is_empty() {
            return Err(MarketDataError::NoDataForRange);
        }

        Ok(records)
    }

    // ========================================================================
    // Instrument Info
    // ========================================================================

    /// Fetch profile using quoteSummary API (richest data source).
    async fn fetch_quote_summary_info(&self, symbol: &str) -> AdapterResult<InstrumentInfo> {
        let crumb = self.ensure_crumb().await?;

        let url = format!(
            "{}/{}?modules=price,summaryProfile,summaryDetail&crumb={}",
            QUOTE_SUMMARY_URL,
            encode(symbol),
            encode(&crumb.crumb)
        );

        let response = self
            .client
            .get(&url)
            .header(header::COOKIE, &crumb.cookie)
            .send()
            .await
            .map_err(|e| {
                MarketDataError::provider(PROVIDER.as_str(), format!("Profile request failed: {}", e))
            })?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.clear_crumb();
            return Err(MarketDataError::provider(
                PROVIDER.as_str(),
                "Yahoo authentication expired",
            ));
        }
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
        }

        let data: SummaryEnvelope = response.json().await.map_err(|e| {
            MarketDataError::provider(
                PROVIDER.as_str(),
                format!("Failed to parse profile response: {}", e),
            )
        })?;

        if let Some(error) = &data.quote_summary.error {
            debug!(
                "quoteSummary error for {}: {} {}",
                symbol,
                error.code.as_deref().unwrap_or("-"),
                error.description.as_deref().unwrap_or("")
            );
        }

        let result = data
            .quote_summary
            .into_first()
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        Ok(map_quote_summary_to_info(symbol, &result))
    }

    /// Fetch profile using search (last resort, minimal data).
    async fn fetch_search_info(&self, symbol: &str) -> AdapterResult<InstrumentInfo> {
        let result = self
            .connector
            .search_ticker(&encode(symbol))
            .await
            .map_err(|e| MarketDataError::provider(PROVIDER.as_str(), e.to_string()))?;

        let item = result
            .quotes
            .iter()
            .find(|q| q.symbol.eq_ignore_ascii_case(symbol))
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let mut info = InstrumentInfo::new(symbol)
            .name(format_name(
                Some(item.long_name.as_str()),
                &item.quote_type,
                Some(item.short_name.as_str()),
                symbol,
            ))
            .source(PROVIDER.as_str());
        info.quote_type = Some(item.quote_type.to_uppercase());
        info.exchange = Some(item.exchange.clone());
        Ok(info)
    }

    async fn fetch_info_variant(&self, symbol: String) -> AdapterResult<InstrumentInfo> {
        match self.fetch_quote_summary_info(&symbol).await {
            Ok(info) => return Ok(info),
            Err(e) => {
                debug!(
                    "quoteSummary failed for {}: {}, trying search fallback",
                    symbol, e
                );
            }
        }

        self.fetch_search_info(&symbol).await
    }
}

// ============================================================================
// SourceAdapter Implementation
// ============================================================================

#[async_trait]
impl SourceAdapter for YahooAdapter {
    fn id(&self) -> SourceId {
        PROVIDER
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            markets: &[Market::India, Market::Usa],
            supports_live: true,
            supports_historical: true,
            supports_info: true,
        }
    }

    async fn fetch_live(&self, ctx: &FetchContext, symbol: &str) -> AdapterResult<Quote> {
        let variants = Self::symbol_variants(symbol, ctx.market());
        try_variants(&variants, move |s| self.fetch_live_variant(s)).await
    }

    async fn fetch_historical(
        &self,
        ctx: &FetchContext,
        symbol: &str,
        range: &DateRange,
    ) -> AdapterResult<Vec<HistoricalRecord>> {
        let variants = Self::symbol_variants(symbol, ctx.market());
        let range = *range;
        try_variants(&variants, move |s| self.fetch_history_variant(s, range)).await
    }

    async fn fetch_instrument_info(
        &self,
        ctx: &FetchContext,
        symbol: &str,
    ) -> AdapterResult<InstrumentInfo> {
        debug!("Fetching profile for {} from Yahoo", symbol);

        let variants = Self::symbol_variants(symbol, ctx.market());
        let mut info = try_variants(&variants, move |s| self.fetch_info_variant(s)).await?;
        info.symbol = symbol.to_string();
        Ok(info)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Build a live quote from chart closes, oldest first.
///
/// The last bar is the current price; the bar before it is the prior close.
fn live_quote_from_closes(symbol: &str, closes: &[(i64, f64)]) -> AdapterResult<Quote> {
    let points: Vec<(i64, rust_decimal::Decimal)> = closes
        .iter()
        .filter_map(|(ts, close)| decimal_from_f64(*close).map(|c| (*ts, c)))
        .filter(|(_, c)| c.is_sign_positive() && !c.is_zero())
        .collect();

    let (ts, price) = *points
        .last()
        .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

    let timestamp = Utc
        .timestamp_opt(ts, 0)
        .single()
        .ok_or_else(|| MarketDataError::ValidationFailed {
            message: format!("Invalid timestamp: {}", ts),
        })?;

    let previous = points.len().checked_sub(2).map(|i| points[i].1);

    Ok(Quote::new(timestamp, price).with_change_percent(percent_change(price, previous)))
}

/// Convert one chart bar; bars with non-finite prices are dropped.
fn bar_to_record(
    timestamp: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
) -> Option<HistoricalRecord> {
    let date = Utc.timestamp_opt(timestamp, 0).single()?.date_naive();
    Some(HistoricalRecord::new(
        date,
        decimal_from_f64(open)?,
        decimal_from_f64(high)?,
        decimal_from_f64(low)?,
        decimal_from_f64(close)?,
        Some(volume),
    ))
}

/// Map quoteSummary result to InstrumentInfo.
fn map_quote_summary_to_info(symbol: &str, result: &SummaryModules) -> InstrumentInfo {
    let price = result.price.as_ref();
    let summary = result.summary_profile.as_ref();
    let detail = result.summary_detail.as_ref();

    let quote_type = price
        .and_then(|p| p.quote_type.as_deref())
        .unwrap_or("");

    let name = format_name(
        price.and_then(|p| p.long_name.as_deref()),
        quote_type,
        price.and_then(|p| p.short_name.as_deref()),
        symbol,
    );

    let raw = RawNumber::value;

    InstrumentInfo {
        symbol: symbol.to_string(),
        source: Some(PROVIDER.to_string()),
        name: Some(name),
        quote_type: price
            .and_then(|p| p.quote_type.clone())
            .map(|t| t.to_uppercase()),
        exchange: price.and_then(|p| p.exchange_name.clone()),
        currency: price.and_then(|p| p.currency.clone()),
        sector: summary.and_then(|s| s.sector.as_deref()).map(format_sector),
        industry: summary.and_then(|s| s.industry.clone()),
        website: summary.and_then(|s| s.website.clone()),
        description: summary
            .and_then(|s| s.long_business_summary.clone().or(s.description.clone())),
        country: summary.and_then(|s| s.country.clone()),
        employees: summary.and_then(|s| s.full_time_employees),
        market_cap: raw(detail.and_then(|d| d.market_cap.as_ref()))
            .or(raw(price.and_then(|p| p.market_cap.as_ref()))),
        pe_ratio: raw(detail.and_then(|d| d.trailing_pe.as_ref())),
        dividend_yield: raw(detail.and_then(|d| d.dividend_yield.as_ref())),
        week_52_high: raw(detail.and_then(|d| d.fifty_two_week_high.as_ref())),
        week_52_low: raw(detail.and_then(|d| d.fifty_two_week_low.as_ref())),
    }
}

/// Clean up fund names by removing common prefixes.
fn format_name(
    long_name: Option<&str>,
    quote_type: &str,
    short_name: Option<&str>,
    symbol: &str,
) -> String {
    let mut name = long_name.unwrap_or("").to_string();

    if !name.is_empty() {
        let replacements = [
            ("&amp;", "&"),
            ("iShares III Public Limited Company - ", ""),
            ("iShares VII PLC - ", ""),
            ("Vanguard Index Funds - ", ""),
            ("Vanguard Funds Public Limited Company - ", ""),
        ];

        for (from, to) in &replacements {
            name = name.replace(from, to);
        }
    }

    // Futures carry a date suffix in the short name
    if quote_type.eq_ignore_ascii_case("FUTURE") {
        if let Some(sn) = short_name {
            if sn.len() >= 7 && sn.is_char_boundary(sn.len() - 7) {
                return sn[..sn.len() - 7].to_string();
            }
        }
    }

    if name.is_empty() {
        short_name
            .filter(|s| !s.is_empty())
            .unwrap_or(symbol)
            .to_string()
    } else {
        name
    }
}

/// Convert snake_case sector to Title Case.
fn format_sector(sector: &str) -> String {
    sector
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_india_variants() {
        assert_eq!(
            YahooAdapter::symbol_variants("RELIANCE", Market::India),
            vec!["RELIANCE.NS", "RELIANCE.BO", "RELIANCE"]
        );
        assert_eq!(
            YahooAdapter::symbol_variants("TCS.NS", Market::India),
            vec!["TCS.NS"]
        );
        assert_eq!(
            YahooAdapter::symbol_variants("AAPL", Market::Usa),
            vec!["AAPL"]
        );
    }

    #[test]
    fn test_live_quote_uses_prior_close() {
        let quote = live_quote_from_closes(
            "AAPL",
            &[(1_709_560_200, 170.0), (1_709_646_600, 175.0), (1_709_733_000, 182.0)],
        )
        .unwrap();

        assert_eq!(quote.price, dec!(182));
        assert_eq!(quote.change_percent, Some(dec!(4.00)));
        assert_eq!(quote.timestamp.timestamp(), 1_709_733_000);
    }

    #[test]
    fn test_live_quote_single_bar_has_unknown_change() {
        let quote = live_quote_from_closes("NEW", &[(1_709_733_000, 10.5)]).unwrap();
        assert_eq!(quote.price, dec!(10.5));
        assert_eq!(quote.change_percent, None);
    }

    #[test]
    fn test_live_quote_skips_nan_bars() {
        let quote =
            live_quote_from_closes("X", &[(1_709_646_600, 100.0), (1_709_733_000, f64::NAN)])
                .unwrap();
        assert_eq!(quote.price, dec!(100));
    }

    #[test]
    fn test_live_quote_empty_is_not_found() {
        let err = live_quote_from_closes("X", &[]).unwrap_err();
        assert!(matches!(err, MarketDataError::SymbolNotFound(_)));
    }

    #[test]
    fn test_bar_to_record() {
        // 2024-03-05 14:30 UTC
        let record = bar_to_record(1_709_649_000, 170.0, 172.5, 169.0, 171.25, 1_000).unwrap();
        assert_eq!(record.date.to_string(), "2024-03-05");
        assert_eq!(record.close, dec!(171.25));
        assert_eq!(record.volume, Some(1_000));

        assert!(bar_to_record(1_709_649_000, f64::NAN, 1.0, 1.0, 1.0, 0).is_none());
    }

    #[test]
    fn test_map_quote_summary() {
        let json = r#"{
            "price": {"longName": "Apple Inc.", "quoteType": "equity", "currency": "USD", "exchangeName": "NasdaqGS"},
            "summaryProfile": {"sector": "technology", "industry": "Consumer Electronics", "country": "United States", "fullTimeEmployees": 161000},
            "summaryDetail": {"trailingPE": {"raw": 28.5}, "marketCap": {"raw": 2.8e12}}
        }"#;
        let result: SummaryModules = serde_json::from_str(json).unwrap();
        let info = map_quote_summary_to_info("AAPL", &result);

        assert_eq!(info.symbol, "AAPL");
        assert_eq!(info.name.as_deref(), Some("Apple Inc."));
        assert_eq!(info.quote_type.as_deref(), Some("EQUITY"));
        assert_eq!(info.sector.as_deref(), Some("Technology"));
        assert_eq!(info.exchange.as_deref(), Some("NasdaqGS"));
        assert_eq!(info.pe_ratio, Some(28.5));
        assert_eq!(info.employees, Some(161000));
        assert_eq!(info.source.as_deref(), Some("yfinance"));
    }

    #[test]
    fn test_format_name() {
        assert_eq!(
            format_name(
                Some("iShares VII PLC - iShares Core S&P 500"),
                "ETF",
                None,
                "IVV"
            ),
            "iShares Core S&P 500"
        );
        assert_eq!(
            format_name(Some("Apple Inc &amp; Co"), "EQUITY", None, "AAPL"),
            "Apple Inc & Co"
        );
        assert_eq!(format_name(None, "EQUITY", Some("AAPL Inc"), "AAPL"), "AAPL Inc");
        assert_eq!(format_name(None, "EQUITY", None, "AAPL"), "AAPL");
    }

    #[test]
    fn test_format_sector() {
        assert_eq!(format_sector("technology"), "Technology");
        assert_eq!(format_sector("basic_materials"), "Basic Materials");
        assert_eq!(format_sector("real_estate"), "Real Estate");
    }
}
