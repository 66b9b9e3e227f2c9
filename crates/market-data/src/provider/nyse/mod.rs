//! NYSE source adapter (USA only).
//!
//! Resolves the caller's symbol through the NYSE listing filter, then reads
//! the daily chart for that listing. Share-class symbols are tried in the
//! spellings different venues use: `BRK.B`, `BRK B`, `BRK-B`.

mod models;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use log::debug;
use reqwest::Client;
use urlencoding::encode;

use crate::errors::MarketDataError;
use crate::models::{DateRange, HistoricalRecord, Market, Quote, SourceId};
use crate::provider::{
    decimal_from_f64, percent_change, try_variants, AdapterCapabilities, AdapterResult,
    FetchContext, SourceAdapter, BROWSER_USER_AGENT, REQUEST_TIMEOUT,
};

use models::{NyseChartResponse, NyseFilterRequest, NyseListing};

const PROVIDER: SourceId = SourceId::Nyse;

/// Calendar days of chart requested for a live quote.
const LIVE_LOOKBACK_DAYS: u64 = 10;

/// Endpoints used by the NYSE adapter.
#[derive(Clone, Debug)]
pub struct NyseEndpoints {
    /// POST target of the quote listing filter.
    pub filter_url: String,
    /// GET target of the daily chart, queried with `symbol`, `from` and `to`.
    pub chart_url: String,
}

impl Default for NyseEndpoints {
    fn default() -> Self {
        Self {
            filter_url: "https://www.nyse.com/api/quotes/filter".to_string(),
            chart_url: "https://www.nyse.com/api/chart/daily".to_string(),
        }
    }
}

/// NYSE source adapter.
pub struct NyseAdapter {
    client: Client,
    endpoints: NyseEndpoints,
}

impl NyseAdapter {
    pub fn new() -> Self {
        Self::with_endpoints(NyseEndpoints::default())
    }

    pub fn with_endpoints(endpoints: NyseEndpoints) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, endpoints }
    }

    /// Share-class spellings to try, e.g. `BRK.B` -> `BRK.B`, `BRK B`, `BRK-B`.
    pub fn symbol_variants(symbol: &str) -> Vec<String> {
        let symbol = symbol.trim().to_uppercase();
        let Some(split) = symbol.find(['.', ' ', '-']) else {
            return vec![symbol];
        };

        let (base, class) = (&symbol[..split], &symbol[split + 1..]);
        if base.is_empty() || class.is_empty() {
            return vec![symbol];
        }

        let mut variants = vec![symbol.clone()];
        for sep in ['.', ' ', '-'] {
            let candidate = format!("{}{}{}", base, sep, class);
            if !variants.contains(&candidate) {
                variants.push(candidate);
            }
        }
        variants
    }

    fn map_send_error(e: reqwest::Error) -> MarketDataError {
        if e.is_timeout() {
            MarketDataError::Timeout {
                provider: PROVIDER.to_string(),
            }
        } else {
            MarketDataError::provider(PROVIDER.as_str(), e.to_string())
        }
    }

    fn check_status(status: reqwest::StatusCode) -> AdapterResult<()> {
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
        Ok(())
    }

    /// Find the NYSE listing ticker for `symbol`.
    async fn lookup(&self, symbol: &str) -> AdapterResult<String> {
        let body = NyseFilterRequest {
            instrument_type: "EQUITY",
            page_number: 1,
            sort_column: "NORMALIZED_TICKER",
            sort_order: "ASC",
            max_results_per_page: 10,
            filter_token: symbol,
        };

        debug!("NYSE listing filter for {}", symbol);

        let response = self
            .client
            .post(&self.endpoints.filter_url)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;
        Self::check_status(response.status())?;

        let listings: Vec<NyseListing> = response.json().await.map_err(|e| {
            MarketDataError::provider(PROVIDER.as_str(), format!("Failed to parse listings: {}", e))
        })?;

        match_listing(symbol, &listings)
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))
    }

    async fn chart(&self, ticker: &str, range: &DateRange) -> AdapterResult<Vec<HistoricalRecord>> {
        let url = format!(
            "{}?symbol={}&from={}&to={}",
            self.endpoints.chart_url,
            encode(ticker),
            range.start.format("%Y-%m-%d"),
            range.end.format("%Y-%m-%d"),
        );

        debug!("NYSE chart request: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::map_send_error)?;
        Self::check_status(response.status())?;

        let chart: NyseChartResponse = response.json().await.map_err(|e| {
            MarketDataError::provider(PROVIDER.as_str(), format!("Failed to parse chart: {}", e))
        })?;

        records_from_chart(chart)
    }

    async fn fetch_live_variant(&self, symbol: String) -> AdapterResult<Quote> {
        let ticker = self.lookup(&symbol).await?;
        let today = Utc::now().date_naive();
        let start = today
            .checked_sub_days(Days::new(LIVE_LOOKBACK_DAYS))
            .unwrap_or(today);
        let records = self.chart(&ticker, &DateRange::new(start, today)).await?;
        quote_from_bars(&symbol, records)
    }

    async fn fetch_history_variant(
        &self,
        symbol: String,
        range: DateRange,
    ) -> AdapterResult<Vec<HistoricalRecord>> {
        let ticker = self.lookup(&symbol).await?;
        self.chart(&ticker, &range).await
    }
}

impl Default for NyseAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the listing whose ticker matches `symbol` exactly.
fn match_listing(symbol: &str, listings: &[NyseListing]) -> Option<String> {
    listings.iter().find_map(|listing| {
        let tickers = [
            listing.symbol_ticker.as_deref(),
            listing.normalized_ticker.as_deref(),
            listing.symbol_exchange_ticker.as_deref(),
        ];
        tickers
            .into_iter()
            .flatten()
            .any(|t| t.eq_ignore_ascii_case(symbol))
            .then(|| {
                listing
                    .normalized_ticker
                    .clone()
                    .or_else(|| listing.symbol_ticker.clone())
                    .unwrap_or_else(|| symbol.to_string())
            })
    })
}

fn records_from_chart(chart: NyseChartResponse) -> AdapterResult<Vec<HistoricalRecord>> {
    let records: Vec<HistoricalRecord> = chart
        .data
        .unwrap_or_default()
        .into_iter()
        .filter_map(|bar| {
            Some(HistoricalRecord::new(
                NaiveDate::parse_from_str(&bar.date, "%Y-%m-%d").ok()?,
                decimal_from_f64(bar.open?)?,
                decimal_from_f64(bar.high?)?,
                decimal_from_f64(bar.low?)?,
                decimal_from_f64(bar.close?)?,
                bar.volume,
            ))
        })
        .collect();

    if records.is_empty() {
        return Err(MarketDataError::NoDataForRange);
    }
    Ok(records)
}

/// Latest bar close is the price; the bar before it is the prior close.
fn quote_from_bars(symbol: &str, mut records: Vec<HistoricalRecord>) -> AdapterResult<Quote> {
    records.sort_by_key(|r| r.date);
    let last = records
        .last()
        .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;
    let previous = records.len().checked_sub(2).map(|i| records[i].close);

    Ok(Quote::new(session_close_utc(last.date), last.close)
        .with_change_percent(percent_change(last.close, previous)))
}

/// NYSE closes at 16:00 Eastern; 21:00 UTC is used for the bar's timestamp.
fn session_close_utc(date: NaiveDate) -> DateTime<Utc> {
    let close = NaiveTime::from_hms_opt(21, 0, 0).unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&date.and_time(close))
}

#[async_trait]
impl SourceAdapter for NyseAdapter {
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
        let variants = Self::symbol_variants(symbol);
        try_variants(&variants, move |s| self.fetch_live_variant(s)).await
    }

    async fn fetch_historical(
        &self,
        _ctx: &FetchContext,
        symbol: &str,
        range: &DateRange,
    ) -> AdapterResult<Vec<HistoricalRecord>> {
        let variants = Self::symbol_variants(symbol);
        let range = *range;
        try_variants(&variants, move |s| self.fetch_history_variant(s, range)).await
    }
}
