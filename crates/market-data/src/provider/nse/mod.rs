//! NSE (National Stock Exchange of India) source adapter.
//!
//! NSE's JSON API only answers clients holding the session cookies that the
//! public site hands out, so the adapter visits the home page once per
//! instance before its first API call. The warm-up is guarded by a
//! `tokio::sync::OnceCell`; a failed warm-up is retried on the next call.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use log::{debug, warn};
use reqwest::{header, Client};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use urlencoding::encode;

use crate::errors::MarketDataError;
use crate::models::{DateRange, HistoricalRecord, Market, Quote, SourceId};
use crate::provider::{
    decimal_from_f64, parse_price, parse_volume, percent_change, strip_suffix,
    AdapterCapabilities, AdapterResult, FetchContext, Operation, SourceAdapter, Throttle,
    BROWSER_USER_AGENT, REQUEST_TIMEOUT,
};

const BASE_URL: &str = "https://www.nseindia.com";
const PROVIDER: SourceId = SourceId::Nse;

/// The historical endpoint rejects spans longer than a year.
const MAX_HISTORY_WINDOW_DAYS: u64 = 365;

/// India Standard Time, UTC+05:30.
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// NSE source adapter.
pub struct NseAdapter {
    client: Client,
    base_url: String,
    session: OnceCell<()>,
    throttle: Throttle,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteEquityResponse {
    price_info: Option<PriceInfo>,
    metadata: Option<QuoteMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceInfo {
    last_price: Option<Value>,
    previous_close: Option<Value>,
    p_change: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteMetadata {
    last_update_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoricalResponse {
    #[serde(default)]
    data: Vec<HistoricalRow>,
}

#[derive(Debug, Deserialize)]
struct HistoricalRow {
    #[serde(rename = "CH_TIMESTAMP")]
    timestamp: Option<String>,
    #[serde(rename = "CH_OPENING_PRICE")]
    open: Option<Value>,
    #[serde(rename = "CH_TRADE_HIGH_PRICE")]
    high: Option<Value>,
    #[serde(rename = "CH_TRADE_LOW_PRICE")]
    low: Option<Value>,
    #[serde(rename = "CH_CLOSING_PRICE")]
    close: Option<Value>,
    #[serde(rename = "CH_TOT_TRADED_QTY")]
    volume: Option<Value>,
}

impl NseAdapter {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static("en-US,en;q=0.9"),
        );
        headers.insert(
            header::REFERER,
            header::HeaderValue::from_static("https://www.nseindia.com/"),
        );

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .cookie_store(true)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into(),
            session: OnceCell::new(),
            throttle: Throttle::new("nse", 120, 3),
        }
    }

    /// NSE symbols carry no suffix.
    pub fn normalize_symbol(symbol: &str) -> String {
        strip_suffix(symbol.trim(), &[".NS"]).to_uppercase()
    }

    async fn warm_up(&self) -> AdapterResult<()> {
        debug!("NSE: acquiring session cookies");
        let response = self
            .client
            .get(&self.base_url)
            .header(header::ACCEPT, "text/html")
            .send()
            .await
            .map_err(|e| {
                MarketDataError::provider(PROVIDER.as_str(), format!("Session warm-up failed: {}", e))
            })?;

        if !response.status().is_success() {
            warn!("NSE: warm-up returned HTTP {}", response.status());
            return Err(MarketDataError::provider(
                PROVIDER.as_str(),
                format!("Session warm-up returned HTTP {}", response.status()),
            ));
        }
        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path_and_query: &str) -> AdapterResult<T> {
        self.session.get_or_try_init(|| self.warm_up()).await?;
        self.throttle.acquire().await;

        let url = format!("{}{}", self.base_url, path_and_query);
        debug!("NSE request: {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER.to_string(),
                }
            } else {
                MarketDataError::provider(PROVIDER.as_str(), e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(MarketDataError::SymbolNotFound(path_and_query.to_string()));
        }
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

        response.json::<T>().await.map_err(|e| {
            MarketDataError::provider(PROVIDER.as_str(), format!("Failed to parse response: {}", e))
        })
    }
}

impl Default for NseAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// NSE reports numbers either as JSON numbers or as formatted strings.
fn value_decimal(value: Option<&Value>) -> Option<Decimal> {
    match value? {
        Value::Number(n) => n.as_f64().and_then(decimal_from_f64),
        Value::String(s) => parse_price(s),
        _ => None,
    }
}

fn value_volume(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => parse_volume(s),
        _ => None,
    }
}

/// Parse `"05-Mar-2024 16:00:00"` in IST.
fn parse_ist_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let ist = FixedOffset::east_opt(IST_OFFSET_SECS)?;
    let local = NaiveDateTime::parse_from_str(raw.trim(), "%d-%b-%Y %H:%M:%S").ok()?;
    local
        .and_local_timezone(ist)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn quote_from_response(symbol: &str, response: QuoteEquityResponse) -> AdapterResult<Quote> {
    let price_info = response
        .price_info
        .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

    let price = value_decimal(price_info.last_price.as_ref())
        .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

    let previous = value_decimal(price_info.previous_close.as_ref());
    let change_percent = percent_change(price, previous).or_else(|| {
        value_decimal(price_info.p_change.as_ref()).map(|p| p.round_dp(2))
    });

    let timestamp = response
        .metadata
        .and_then(|m| m.last_update_time)
        .as_deref()
        .and_then(parse_ist_timestamp)
        .unwrap_or_else(Utc::now);

    Ok(Quote::new(timestamp, price).with_change_percent(change_percent))
}

fn records_from_rows(rows: Vec<HistoricalRow>) -> Vec<HistoricalRecord> {
    rows.into_iter()
        .filter_map(|row| {
            let date = row.timestamp.as_deref()?;
            let date = NaiveDate::parse_from_str(date.get(..10)?, "%Y-%m-%d").ok()?;
            Some(HistoricalRecord::new(
                date,
                value_decimal(row.open.as_ref())?,
                value_decimal(row.high.as_ref())?,
                value_decimal(row.low.as_ref())?,
                value_decimal(row.close.as_ref())?,
                value_volume(row.volume.as_ref()),
            ))
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for NseAdapter {
    fn id(&self) -> SourceId {
        PROVIDER
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            markets: &[Market::India],
            supports_live: true,
            supports_historical: true,
            supports_info: false,
        }
    }

    /// One request per yearly window, each allowed the full default.
    fn invocation_timeout(
        &self,
        operation: Operation,
        range: Option<&DateRange>,
        default: Duration,
    ) -> Duration {
        match (operation, range) {
            (Operation::HistoricalPrices, Some(range)) => {
                let windows = range.windows(MAX_HISTORY_WINDOW_DAYS).len().max(1) as u32;
                default * windows
            }
            _ => default,
        }
    }

    async fn fetch_live(&self, _ctx: &FetchContext, symbol: &str) -> AdapterResult<Quote> {
        let symbol = Self::normalize_symbol(symbol);
        let response: QuoteEquityResponse = self
            .get_json(&format!("/api/quote-equity?symbol={}", encode(&symbol)))
            .await?;
        quote_from_response(&symbol, response)
    }

    async fn fetch_historical(
        &self,
        _ctx: &FetchContext,
        symbol: &str,
        range: &DateRange,
    ) -> AdapterResult<Vec<HistoricalRecord>> {
        let symbol = Self::normalize_symbol(symbol);
        let mut records = Vec::new();

        for window in range.windows(MAX_HISTORY_WINDOW_DAYS) {
            let path = format!(
                "/api/historical/cm/equity?symbol={}&series={}&from={}&to={}",
                encode(&symbol),
                encode("[\"EQ\"]"),
                window.start.format("%d-%m-%Y"),
                window.end.format("%d-%m-%Y"),
            );
            let response: HistoricalResponse = self.get_json(&path).await?;
            records.extend(records_from_rows(response.data));
        }

        if records.is_empty() {
            return Err(MarketDataError::NoDataForRange);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(NseAdapter::normalize_symbol("reliance.ns"), "RELIANCE");
        assert_eq!(NseAdapter::normalize_symbol("TCS"), "TCS");
        assert_eq!(NseAdapter::normalize_symbol("M&M.NS"), "M&M");
    }

    #[test]
    fn test_quote_equity() {
        let response: QuoteEquityResponse = serde_json::from_str(
            r#"{
                "info": {"symbol": "RELIANCE"},
                "metadata": {"lastUpdateTime": "05-Mar-2024 16:00:00"},
                "priceInfo": {"lastPrice": 2970.5, "previousClose": 2950.0, "pChange": 0.6949}
            }"#,
        )
        .unwrap();
        let quote = quote_from_response("RELIANCE", response).unwrap();
        assert_eq!(quote.price, dec!(2970.5));
        assert_eq!(quote.change_percent, Some(dec!(0.69)));
        // 16:00 IST = 10:30 UTC
        assert_eq!(quote.timestamp.to_rfc3339(), "2024-03-05T10:30:00+00:00");
    }

    #[test]
    fn test_empty_quote_is_not_found() {
        let response: QuoteEquityResponse = serde_json::from_str("{}").unwrap();
        assert!(quote_from_response("NOPE", response)
            .unwrap_err()
            .is_not_available());
    }

    #[test]
    fn test_historical_rows() {
        let response: HistoricalResponse = serde_json::from_str(
            r#"{"data": [
                {"CH_TIMESTAMP": "2024-03-05", "CH_OPENING_PRICE": 2950, "CH_TRADE_HIGH_PRICE": 2985.5,
                 "CH_TRADE_LOW_PRICE": 2940, "CH_CLOSING_PRICE": 2970.5, "CH_TOT_TRADED_QTY": 5123456},
                {"CH_TIMESTAMP": "2024-03-04", "CH_OPENING_PRICE": "2,930.00", "CH_TRADE_HIGH_PRICE": "2,955.00",
                 "CH_TRADE_LOW_PRICE": "2,925.00", "CH_CLOSING_PRICE": "2,950.00", "CH_TOT_TRADED_QTY": "4,000,000"},
                {"CH_TIMESTAMP": null, "CH_CLOSING_PRICE": 1}
            ]}"#,
        )
        .unwrap();
        let records = records_from_rows(response.data);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].close, dec!(2970.5));
        assert_eq!(records[0].volume, Some(5_123_456));
        assert_eq!(records[1].open, dec!(2930));
        assert_eq!(records[1].volume, Some(4_000_000));
    }

    #[test]
    fn test_history_budget_per_window() {
        let adapter = NseAdapter::new();
        let default = Duration::from_secs(8);
        let three_years = DateRange::new(
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
        );
        let one_month = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        );

        assert_eq!(
            adapter.invocation_timeout(Operation::HistoricalPrices, Some(&three_years), default),
            default * 3
        );
        assert_eq!(
            adapter.invocation_timeout(Operation::HistoricalPrices, Some(&one_month), default),
            default
        );
    }
}
