//! Alpha Vantage source adapter.
//!
//! This module provides market data from the Alpha Vantage API:
//! - Live quotes via the GLOBAL_QUOTE endpoint
//! - Daily history via the TIME_SERIES_DAILY endpoint
//!
//! Requires an API key (`ALPHAVANTAGE_API_KEY`). The free tier is limited to
//! 5 API calls per minute, so requests are paced by an adapter-owned throttle.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use log::{debug, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::MarketDataError;
use crate::models::{DateRange, HistoricalRecord, Market, Quote, SourceId};
use crate::provider::{
    parse_percent, parse_price, parse_volume, percent_change, strip_suffix, try_variants,
    AdapterCapabilities, AdapterResult, FetchContext, SourceAdapter, Throttle, REQUEST_TIMEOUT,
};

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER: SourceId = SourceId::AlphaVantage;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "ALPHAVANTAGE_API_KEY";

/// Calendar days covered by a `compact` (latest 100 bars) time series.
const COMPACT_WINDOW_DAYS: i64 = 140;

/// Alpha Vantage source adapter.
pub struct AlphaVantageAdapter {
    client: Client,
    throttle: Throttle,
}

// ============================================================================
// Response structures for Alpha Vantage API
// ============================================================================

/// GLOBAL_QUOTE response
#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<HashMap<String, String>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

/// TIME_SERIES_DAILY response for equities
#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<HashMap<String, DailyBar>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DailyBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: Option<String>,
}

impl AlphaVantageAdapter {
    /// Create a new Alpha Vantage adapter.
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            throttle: Throttle::new("alphavantage", 5, 5),
        }
    }

    /// Symbols to try for `symbol` in `market`.
    pub fn symbol_variants(symbol: &str, market: Market) -> Vec<String> {
        match market {
            Market::India => {
                let base = strip_suffix(symbol, &[".NS", ".BO", ".BSE"]);
                let mut variants = vec![format!("{}.BSE", base)];
                if !variants.iter().any(|v| v.eq_ignore_ascii_case(symbol)) {
                    variants.push(symbol.to_string());
                }
                variants
            }
            Market::Usa => vec![symbol.to_string()],
        }
    }

    /// Make a request to the Alpha Vantage API.
    async fn fetch(&self, api_key: &str, params: &[(&str, &str)]) -> AdapterResult<String> {
        let mut all_params: Vec<(&str, &str)> = params.to_vec();
        all_params.push(("apikey", api_key));

        let url = reqwest::Url::parse_with_params(BASE_URL, &all_params).map_err(|e| {
            MarketDataError::provider(PROVIDER.as_str(), format!("Failed to build URL: {}", e))
        })?;

        debug!(
            "Alpha Vantage request: {}",
            url.as_str().replace(api_key, "***")
        );

        self.throttle.acquire().await;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER.to_string(),
                }
            } else {
                // reqwest errors carry the URL, which holds the key
                MarketDataError::provider(PROVIDER.as_str(), e.without_url().to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER.to_string(),
            });
        }

        if !status.is_success() {
            return Err(MarketDataError::provider(
                PROVIDER.as_str(),
                format!("HTTP {}", status),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| MarketDataError::provider(PROVIDER.as_str(), e.without_url().to_string()))
    }

    async fn fetch_live_variant(&self, api_key: &str, symbol: String) -> AdapterResult<Quote> {
        let params = [("function", "GLOBAL_QUOTE"), ("symbol", symbol.as_str())];
        let text = self.fetch(api_key, &params).await?;
        parse_global_quote(&text, &symbol)
    }

    async fn fetch_history_variant(
        &self,
        api_key: &str,
        symbol: String,
        outputsize: &str,
    ) -> AdapterResult<Vec<HistoricalRecord>> {
        let params = [
            ("function", "TIME_SERIES_DAILY"),
            ("symbol", symbol.as_str()),
            ("outputsize", outputsize),
        ];
        let text = self.fetch(api_key, &params).await?;
        let records = parse_time_series(&text, &symbol)?;

        debug!(
            "Alpha Vantage: fetched {} daily bars for {}",
            records.len(),
            symbol
        );

        Ok(records)
    }
}

impl Default for AlphaVantageAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Check for API-level errors in the response.
fn check_api_error(
    error_message: &Option<String>,
    note: &Option<String>,
    information: &Option<String>,
) -> AdapterResult<()> {
    if let Some(ref msg) = error_message {
        if msg.contains("Invalid API call") || msg.contains("not found") {
            return Err(MarketDataError::SymbolNotFound(msg.clone()));
        }
        return Err(MarketDataError::provider(PROVIDER.as_str(), msg.clone()));
    }

    for msg in [note, information].into_iter().flatten() {
        if msg.contains("API call frequency") || msg.contains("rate limit") {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER.to_string(),
            });
        }
        if msg.contains("premium") {
            return Err(MarketDataError::NotSupported {
                operation: "premium endpoint".to_string(),
                provider: PROVIDER.to_string(),
            });
        }
        warn!("Alpha Vantage notice: {}", msg);
    }

    Ok(())
}

fn parse_response<'de, T: Deserialize<'de>>(text: &'de str) -> AdapterResult<T> {
    serde_json::from_str(text).map_err(|e| {
        MarketDataError::provider(PROVIDER.as_str(), format!("Failed to parse response: {}", e))
    })
}

/// Parse a GLOBAL_QUOTE payload.
fn parse_global_quote(text: &str, symbol: &str) -> AdapterResult<Quote> {
    let response: GlobalQuoteResponse = parse_response(text)?;
    check_api_error(
        &response.error_message,
        &response.note,
        &response.information,
    )?;

    let fields = response
        .global_quote
        .filter(|q| !q.is_empty())
        .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

    let price = fields
        .get("05. price")
        .and_then(|p| parse_price(p))
        .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

    let timestamp = fields
        .get("07. latest trading day")
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .unwrap_or_else(Utc::now);

    let change_percent = fields
        .get("10. change percent")
        .and_then(|p| parse_percent(p))
        .or_else(|| {
            let previous = fields.get("08. previous close").and_then(|p| parse_price(p));
            percent_change(price, previous)
        });

    Ok(Quote::new(timestamp, price).with_change_percent(change_percent))
}

/// Parse a TIME_SERIES_DAILY payload.
fn parse_time_series(text: &str, symbol: &str) -> AdapterResult<Vec<HistoricalRecord>> {
    let response: TimeSeriesResponse = parse_response(text)?;
    check_api_error(
        &response.error_message,
        &response.note,
        &response.information,
    )?;

    let time_series = response
        .time_series
        .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

    let mut records: Vec<HistoricalRecord> = time_series
        .into_iter()
        .filter_map(|(date_str, bar)| {
            Some(HistoricalRecord::new(
                NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").ok()?,
                Decimal::from_str(&bar.open).ok()?,
                Decimal::from_str(&bar.high).ok()?,
                Decimal::from_str(&bar.low).ok()?,
                Decimal::from_str(&bar.close).ok()?,
                bar.volume.as_deref().and_then(parse_volume),
            ))
        })
        .collect();

    records.sort_by_key(|r| r.date);
    Ok(records)
}

/// `compact` covers roughly the last 100 trading days; older ranges need `full`.
fn output_size(range: &DateRange, today: NaiveDate) -> &'static str {
    if (today - range.start).num_days() <= COMPACT_WINDOW_DAYS {
        "compact"
    } else {
        "full"
    }
}

// ============================================================================
// SourceAdapter Implementation
// ============================================================================

#[async_trait]
impl SourceAdapter for AlphaVantageAdapter {
    fn id(&self) -> SourceId {
        PROVIDER
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            markets: &[Market::India, Market::Usa],
            supports_live: true,
            supports_historical: true,
            supports_info: false,
        }
    }

    fn credential_env_var(&self) -> Option<&'static str> {
        Some(API_KEY_ENV)
    }

    async fn fetch_live(&self, ctx: &FetchContext, symbol: &str) -> AdapterResult<Quote> {
        let api_key = ctx.require_credential(PROVIDER)?;
        let variants = Self::symbol_variants(symbol, ctx.market());
        try_variants(&variants, move |s| self.fetch_live_variant(api_key, s)).await
    }

    async fn fetch_historical(
        &self,
        ctx: &FetchContext,
        symbol: &str,
        range: &DateRange,
    ) -> AdapterResult<Vec<HistoricalRecord>> {
        let api_key = ctx.require_credential(PROVIDER)?;
        let outputsize = output_size(range, Utc::now().date_naive());
        let variants = Self::symbol_variants(symbol, ctx.market());
        try_variants(&variants, move |s| {
            self.fetch_history_variant(api_key, s, outputsize)
        })
        .await
    }
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
            AlphaVantageAdapter::symbol_variants("RELIANCE", Market::India),
            vec!["RELIANCE.BSE", "RELIANCE"]
        );
        assert_eq!(
            AlphaVantageAdapter::symbol_variants("TCS.NS", Market::India),
            vec!["TCS.BSE", "TCS.NS"]
        );
        assert_eq!(
            AlphaVantageAdapter::symbol_variants("TCS.BSE", Market::India),
            vec!["TCS.BSE"]
        );
        assert_eq!(
            AlphaVantageAdapter::symbol_variants("IBM", Market::Usa),
            vec!["IBM"]
        );
    }

    #[test]
    fn test_parse_global_quote() {
        let json = r#"{
            "Global Quote": {
                "01. symbol": "IBM",
                "05. price": "191.2500",
                "07. latest trading day": "2024-03-05",
                "08. previous close": "190.0000",
                "10. change percent": "0.6579%"
            }
        }"#;
        let quote = parse_global_quote(json, "IBM").unwrap();
        assert_eq!(quote.price, dec!(191.25));
        assert_eq!(quote.change_percent, Some(dec!(0.66)));
        assert_eq!(quote.timestamp.date_naive().to_string(), "2024-03-05");
    }

    #[test]
    fn test_parse_global_quote_derives_change_from_previous_close() {
        let json = r#"{"Global Quote": {"05. price": "110.00", "08. previous close": "100.00"}}"#;
        let quote = parse_global_quote(json, "X").unwrap();
        assert_eq!(quote.change_percent, Some(dec!(10.00)));
    }

    #[test]
    fn test_parse_global_quote_empty_is_not_found() {
        let err = parse_global_quote(r#"{"Global Quote": {}}"#, "NOPE").unwrap_err();
        assert!(matches!(err, MarketDataError::SymbolNotFound(_)));
    }

    #[test]
    fn test_rate_limit_notice() {
        let json = r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}"#;
        let err = parse_global_quote(json, "IBM").unwrap_err();
        assert!(matches!(err, MarketDataError::RateLimited { .. }));
        assert!(!err.is_not_available());
    }

    #[test]
    fn test_invalid_api_call_is_not_found() {
        let json = r#"{"Error Message": "Invalid API call. Please retry or visit the documentation."}"#;
        let err = parse_time_series(json, "ZZZZ").unwrap_err();
        assert!(err.is_not_available());
    }

    #[test]
    fn test_parse_time_series_sorted() {
        let json = r#"{
            "Meta Data": {"2. Symbol": "IBM"},
            "Time Series (Daily)": {
                "2024-03-05": {"1. open": "190.0", "2. high": "192.0", "3. low": "189.5", "4. close": "191.25", "5. volume": "4000000"},
                "2024-03-04": {"1. open": "188.0", "2. high": "190.5", "3. low": "187.0", "4. close": "190.0", "5. volume": "3500000"}
            }
        }"#;
        let records = parse_time_series(json, "IBM").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date.to_string(), "2024-03-04");
        assert_eq!(records[1].close, dec!(191.25));
        assert_eq!(records[1].volume, Some(4_000_000));
    }

    #[test]
    fn test_output_size() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let recent = DateRange::new(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), today);
        let old = DateRange::new(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), today);
        assert_eq!(output_size(&recent, today), "compact");
        assert_eq!(output_size(&old, today), "full");
    }

    #[test]
    fn test_adapter_is_credential_gated() {
        let adapter = AlphaVantageAdapter::new();
        assert_eq!(adapter.credential_env_var(), Some("ALPHAVANTAGE_API_KEY"));
        assert_eq!(adapter.id(), SourceId::AlphaVantage);
        assert!(adapter.capabilities().serves(Market::India));
    }
}
