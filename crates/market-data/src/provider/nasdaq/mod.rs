//! Nasdaq source adapter (USA only).
//!
//! Uses the public `api.nasdaq.com` quote endpoints. Each request is tried as
//! a stock first and then as an ETF. When the after-hours (secondary) quote is
//! present it is preferred over the regular-session price.

mod models;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use log::debug;
use reqwest::{header, Client};
use rust_decimal::Decimal;
use urlencoding::encode;

use crate::errors::MarketDataError;
use crate::models::{DateRange, HistoricalRecord, Market, Quote, SourceId};
use crate::provider::{
    parse_percent, parse_price, parse_volume, percent_change, try_variants, AdapterCapabilities,
    AdapterResult, FetchContext, SourceAdapter, BROWSER_USER_AGENT, REQUEST_TIMEOUT,
};

use models::{NasdaqHistoricalResponse, NasdaqInfoResponse, NasdaqTradeData};

const BASE_URL: &str = "https://api.nasdaq.com/api/quote";
const PROVIDER: SourceId = SourceId::Nasdaq;

/// Asset classes tried in order.
const ASSET_CLASSES: [&str; 2] = ["stocks", "etf"];

/// Nasdaq source adapter.
pub struct NasdaqAdapter {
    client: Client,
    base_url: String,
}

impl NasdaqAdapter {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    /// Point the adapter at another host (used by tests and proxies).
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
            header::ORIGIN,
            header::HeaderValue::from_static("https://www.nasdaq.com"),
        );
        headers.insert(
            header::REFERER,
            header::HeaderValue::from_static("https://www.nasdaq.com/"),
        );

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> AdapterResult<T> {
        debug!("Nasdaq request: {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER.to_string(),
                }
            } else {
                MarketDataError::provider(PROVIDER.as_str(), e.to_string())
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

        response.json::<T>().await.map_err(|e| {
            MarketDataError::provider(PROVIDER.as_str(), format!("Failed to parse response: {}", e))
        })
    }

    async fn fetch_live_for_class(&self, symbol: &str, asset_class: String) -> AdapterResult<Quote> {
        let url = format!(
            "{}/{}/info?assetclass={}",
            self.base_url,
            encode(symbol),
            asset_class
        );
        let response: NasdaqInfoResponse = self.get_json(&url).await?;
        quote_from_info(symbol, response)
    }

    async fn fetch_history_for_class(
        &self,
        symbol: &str,
        range: DateRange,
        asset_class: String,
    ) -> AdapterResult<Vec<HistoricalRecord>> {
        let url = format!(
            "{}/{}/historical?assetclass={}&fromdate={}&limit=9999&todate={}",
            self.base_url,
            encode(symbol),
            asset_class,
            range.start.format("%Y-%m-%d"),
            range.end.format("%Y-%m-%d"),
        );
        let response: NasdaqHistoricalResponse = self.get_json(&url).await?;
        records_from_history(symbol, response)
    }
}

impl Default for NasdaqAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn asset_classes() -> Vec<String> {
    ASSET_CLASSES.iter().map(|c| c.to_string()).collect()
}

// ============================================================================
// Payload mapping
// ============================================================================

/// Build a quote from an info payload, preferring the after-hours price.
fn quote_from_info(symbol: &str, response: NasdaqInfoResponse) -> AdapterResult<Quote> {
    let data = response
        .data
        .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

    let primary = data.primary_data.as_ref();
    let secondary = data.secondary_data.as_ref();

    let (trade, price) = priced(secondary)
        .or_else(|| priced(primary))
        .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

    // Regular close minus its net change is the previous session's close
    let previous_close = primary.and_then(|p| {
        let close = p.last_sale_price.as_deref().and_then(parse_price)?;
        let change = p.net_change.as_deref().and_then(parse_price)?;
        Some(close - change)
    });

    let change_percent = percent_change(price, previous_close).or_else(|| {
        primary
            .and_then(|p| p.percentage_change.as_deref())
            .and_then(parse_percent)
    });

    let timestamp = trade
        .last_trade_timestamp
        .as_deref()
        .and_then(parse_trade_timestamp)
        .unwrap_or_else(Utc::now);

    Ok(Quote::new(timestamp, price).with_change_percent(change_percent))
}

/// The trade and its parsed last sale price, when it has one.
fn priced(trade: Option<&NasdaqTradeData>) -> Option<(&NasdaqTradeData, Decimal)> {
    let trade = trade?;
    let price = trade.last_sale_price.as_deref().and_then(parse_price)?;
    Some((trade, price))
}

fn records_from_history(
    symbol: &str,
    response: NasdaqHistoricalResponse,
) -> AdapterResult<Vec<HistoricalRecord>> {
    let rows = response
        .data
        .and_then(|d| d.trades_table)
        .and_then(|t| t.rows)
        .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

    let records: Vec<HistoricalRecord> = rows
        .into_iter()
        .filter_map(|row| {
            Some(HistoricalRecord::new(
                NaiveDate::parse_from_str(row.date.as_deref()?, "%m/%d/%Y").ok()?,
                parse_price(row.open.as_deref()?)?,
                parse_price(row.high.as_deref()?)?,
                parse_price(row.low.as_deref()?)?,
                parse_price(row.close.as_deref()?)?,
                row.volume.as_deref().and_then(parse_volume),
            ))
        })
        .collect();

    if records.is_empty() {
        return Err(MarketDataError::NoDataForRange);
    }
    Ok(records)
}

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Parse Nasdaq's display timestamps, e.g. `"Mar 5, 2024 4:00 PM ET"`,
/// `"DATA AS OF Mar 5, 2024"` or `"Closed at Mar 5, 2024 7:59 PM ET - AFTER HOURS"`.
///
/// Times are US Eastern. A bare date is taken as the 4:00 PM close.
fn parse_trade_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let lower = raw.to_ascii_lowercase();
    let start = MONTHS
        .iter()
        .filter_map(|m| lower.find(&format!("{} ", m)))
        .min()?;
    let rest = &raw[start..];
    let rest = rest.split(" ET").next().unwrap_or(rest).trim();

    let local = NaiveDateTime::parse_from_str(rest, "%b %d, %Y %I:%M %p")
        .or_else(|_| {
            NaiveDate::parse_from_str(rest, "%b %d, %Y")
                .map(|d| d.and_time(NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN)))
        })
        .ok()?;

    let offset_hours = eastern_utc_offset_hours(local.date());
    Some(Utc.from_utc_datetime(&(local - Duration::hours(offset_hours))))
}

/// UTC offset of US Eastern time on `date`: -4 during daylight saving
/// (second Sunday of March to first Sunday of November), otherwise -5.
fn eastern_utc_offset_hours(date: NaiveDate) -> i64 {
    let year = date.year();
    let dst_start = NaiveDate::from_weekday_of_month_opt(year, 3, Weekday::Sun, 2);
    let dst_end = NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Sun, 1);
    match (dst_start, dst_end) {
        (Some(start), Some(end)) if date >= start && date < end => -4,
        _ => -5,
    }
}

// ============================================================================
// SourceAdapter Implementation
// ============================================================================

#[async_trait]
impl SourceAdapter for NasdaqAdapter {
    fn id(&self) -> SourceId {
        PROVIDER
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            markets: &[Market::Usa],
            supports_live: true,
            supports_historical: true,
            supports_info: false,
        }
    }

    async fn fetch_live(&self, _ctx: &FetchContext, symbol: &str) -> AdapterResult<Quote> {
        let symbol = symbol.trim().to_uppercase();
        let symbol = symbol.as_str();
        try_variants(&asset_classes(), move |class| {
            self.fetch_live_for_class(symbol, class)
        })
        .await
    }

    async fn fetch_historical(
        &self,
        _ctx: &FetchContext,
        symbol: &str,
        range: &DateRange,
    ) -> AdapterResult<Vec<HistoricalRecord>> {
        let symbol = symbol.trim().to_uppercase();
        let symbol = symbol.as_str();
        let range = *range;
        try_variants(&asset_classes(), move |class| {
            self.fetch_history_for_class(symbol, range, class)
        })
        .await
    }
}

// ============================================================================
// Tests
// ============================================================================
