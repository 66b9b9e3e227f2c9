//! BSE (Bombay Stock Exchange) source adapter.
//!
//! - Live quotes come from `getScripHeaderData`, keyed by the numeric scrip
//!   code. Tickers are mapped to codes through the exchange's scrip directory,
//!   downloaded once per adapter instance.
//! - History is assembled from the daily equity bhavcopy CSV, one file per
//!   trading day. Weekends are skipped and days without a file are ignored.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Utc, Weekday};
use log::{debug, warn};
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::errors::MarketDataError;
use crate::models::{DateRange, HistoricalRecord, Market, Quote, SourceId};
use crate::provider::{
    parse_percent, parse_price, parse_volume, percent_change, strip_suffix, AdapterCapabilities,
    AdapterResult, FetchContext, Operation, SourceAdapter, Throttle, BROWSER_USER_AGENT,
    REQUEST_TIMEOUT,
};

const PROVIDER: SourceId = SourceId::Bse;

/// Budget per bhavcopy download: throttle pacing (2/s) plus transfer.
const PER_DAY_BUDGET: Duration = Duration::from_secs(1);

/// India Standard Time, UTC+05:30.
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Endpoints used by the BSE adapter.
#[derive(Clone, Debug)]
pub struct BseEndpoints {
    pub api_base: String,
    /// Bhavcopy URL template; `{date}` is replaced by `YYYYMMDD`.
    pub bhavcopy_template: String,
}

impl Default for BseEndpoints {
    fn default() -> Self {
        Self {
            api_base: "https://api.bseindia.com/BseIndiaAPI/api".to_string(),
            bhavcopy_template:
                "https://www.bseindia.com/download/BhavCopy/Equity/BhavCopy_BSE_CM_0_0_0_{date}_F_0000.CSV"
                    .to_string(),
        }
    }
}

/// BSE source adapter.
pub struct BseAdapter {
    client: Client,
    endpoints: BseEndpoints,
    /// Upper-cased ticker -> scrip code.
    directory: OnceCell<HashMap<String, String>>,
    throttle: Throttle,
}

#[derive(Debug, Deserialize)]
struct ScripDirectoryEntry {
    #[serde(rename = "SCRIP_CD")]
    scrip_code: Option<String>,
    #[serde(rename = "scrip_id")]
    scrip_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScripHeaderResponse {
    #[serde(rename = "Header")]
    header: Option<ScripHeader>,
    #[serde(rename = "CurrRate")]
    curr_rate: Option<CurrentRate>,
}

#[derive(Debug, Deserialize)]
struct ScripHeader {
    #[serde(rename = "PrevClose")]
    prev_close: Option<String>,
    #[serde(rename = "LTP")]
    ltp: Option<String>,
    #[serde(rename = "Ason")]
    as_on: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CurrentRate {
    #[serde(rename = "LTP")]
    ltp: Option<String>,
    #[serde(rename = "PcChg")]
    pc_chg: Option<String>,
}

/// One row of the UDiFF equity bhavcopy.
#[derive(Debug, Deserialize)]
struct BhavcopyRow {
    #[serde(rename = "TradDt")]
    trade_date: Option<String>,
    #[serde(rename = "FinInstrmId")]
    scrip_code: Option<String>,
    #[serde(rename = "TckrSymb")]
    ticker: Option<String>,
    #[serde(rename = "OpnPric")]
    open: Option<String>,
    #[serde(rename = "HghPric")]
    high: Option<String>,
    #[serde(rename = "LwPric")]
    low: Option<String>,
    #[serde(rename = "ClsPric")]
    close: Option<String>,
    #[serde(rename = "LastPric")]
    last: Option<String>,
    #[serde(rename = "TtlTradgVol")]
    volume: Option<String>,
}

impl BseAdapter {
    pub fn new() -> Self {
        Self::with_endpoints(BseEndpoints::default())
    }

    pub fn with_endpoints(endpoints: BseEndpoints) -> Self {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(
            header::REFERER,
            header::HeaderValue::from_static("https://www.bseindia.com/"),
        );
        headers.insert(
            header::ORIGIN,
            header::HeaderValue::from_static("https://www.bseindia.com"),
        );

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoints,
            directory: OnceCell::new(),
            throttle: Throttle::new("bse", 120, 4),
        }
    }

    /// BSE tickers carry no `.BO`/`.BSE` suffix.
    pub fn normalize_symbol(symbol: &str) -> String {
        strip_suffix(symbol.trim(), &[".BO", ".BSE"]).to_uppercase()
    }

    async fn get(&self, url: &str) -> AdapterResult<reqwest::Response> {
        self.throttle.acquire().await;
        debug!("BSE request: {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER.to_string(),
                }
            } else {
                MarketDataError::provider(PROVIDER.as_str(), e.to_string())
            }
        })?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER.to_string(),
            });
        }
        Ok(response)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> AdapterResult<T> {
        let response = self.get(url).await?;
        let status = response.status();
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

    async fn load_directory(&self) -> AdapterResult<HashMap<String, String>> {
        let url = format!(
            "{}/ListofScripData/w?Group=&Scripcode=&industry=&segment=Equity&status=Active",
            self.endpoints.api_base
        );
        let entries: Vec<ScripDirectoryEntry> = self.get_json(&url).await?;
        let directory = build_directory(entries);
        debug!("BSE: loaded {} scrips", directory.len());
        Ok(directory)
    }

    /// Resolve a ticker or numeric code to a scrip code.
    async fn scrip_code(&self, symbol: &str) -> AdapterResult<String> {
        if is_scrip_code(symbol) {
            return Ok(symbol.to_string());
        }

        let directory = self
            .directory
            .get_or_try_init(|| self.load_directory())
            .await?;

        directory
            .get(symbol)
            .cloned()
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))
    }

    /// Fetch one day's bhavcopy. `None` when the exchange published no file.
    async fn bhavcopy(&self, day: NaiveDate) -> AdapterResult<Option<String>> {
        let url = self
            .endpoints
            .bhavcopy_template
            .replace("{date}", &day.format("%Y%m%d").to_string());
        let response = self.get(&url).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(MarketDataError::provider(
                PROVIDER.as_str(),
                format!("HTTP {}", status),
            ));
        }

        Ok(Some(response.text().await?))
    }
}

impl Default for BseAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn is_scrip_code(symbol: &str) -> bool {
    !symbol.is_empty() && symbol.chars().all(|c| c.is_ascii_digit())
}

fn build_directory(entries: Vec<ScripDirectoryEntry>) -> HashMap<String, String> {
    entries
        .into_iter()
        .filter_map(|e| Some((e.scrip_id?.trim().to_uppercase(), e.scrip_code?.trim().to_string())))
        .collect()
}

fn trading_days(range: &DateRange) -> impl Iterator<Item = NaiveDate> {
    range.days().filter(|d| !is_weekend(*d))
}

fn is_weekend(day: NaiveDate) -> bool {
    matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Parse the header's `"05 Mar 24 | 16:00"` style timestamp (IST).
fn parse_as_on(raw: &str) -> Option<DateTime<Utc>> {
    let ist = FixedOffset::east_opt(IST_OFFSET_SECS)?;
    let cleaned = raw.replace('|', " ");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let local = NaiveDateTime::parse_from_str(&cleaned, "%d %b %y %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(&cleaned, "%d %b %Y %H:%M"))
        .ok()?;
    local
        .and_local_timezone(ist)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn quote_from_header(symbol: &str, response: ScripHeaderResponse) -> AdapterResult<Quote> {
    let header = response.header;
    let rate = response.curr_rate;

    let price = rate
        .as_ref()
        .and_then(|r| r.ltp.as_deref())
        .and_then(parse_price)
        .or_else(|| header.as_ref().and_then(|h| h.ltp.as_deref()).and_then(parse_price))
        .filter(|p| !p.is_zero())
        .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

    let previous = header
        .as_ref()
        .and_then(|h| h.prev_close.as_deref())
        .and_then(parse_price);

    // A missing previous close stays unknown rather than 0%
    let change_percent = percent_change(price, previous).or_else(|| {
        rate.as_ref()
            .and_then(|r| r.pc_chg.as_deref())
            .and_then(parse_percent)
    });

    let timestamp = header
        .as_ref()
        .and_then(|h| h.as_on.as_deref())
        .and_then(parse_as_on)
        .unwrap_or_else(Utc::now);

    Ok(Quote::new(timestamp, price).with_change_percent(change_percent))
}

/// Find the row for `code` (or `ticker` when no code is known) in a bhavcopy.
fn parse_bhavcopy(
    csv_text: &str,
    code: Option<&str>,
    ticker: &str,
    day: NaiveDate,
) -> AdapterResult<Option<HistoricalRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    for row in reader.deserialize::<BhavcopyRow>() {
        let row = row.map_err(|e| {
            MarketDataError::provider(PROVIDER.as_str(), format!("Bad bhavcopy row: {}", e))
        })?;

        let matches = match code {
            Some(code) => row.scrip_code.as_deref() == Some(code),
            None => row
                .ticker
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case(ticker)),
        };
        if !matches {
            continue;
        }

        let date = row
            .trade_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .unwrap_or(day);
        let close = row
            .close
            .as_deref()
            .and_then(parse_price)
            .or_else(|| row.last.as_deref().and_then(parse_price));

        let record = (|| {
            Some(HistoricalRecord::new(
                date,
                row.open.as_deref().and_then(parse_price)?,
                row.high.as_deref().and_then(parse_price)?,
                row.low.as_deref().and_then(parse_price)?,
                close?,
                row.volume.as_deref().and_then(parse_volume),
            ))
        })();
        return Ok(record);
    }

    Ok(None)
}

#[async_trait]
impl SourceAdapter for BseAdapter {
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

    /// History downloads one file per weekday, so the budget grows with the range.
    fn invocation_timeout(
        &self,
        operation: Operation,
        range: Option<&DateRange>,
        default: Duration,
    ) -> Duration {
        match (operation, range) {
            (Operation::HistoricalPrices, Some(range)) => {
                let days = trading_days(range).count() as u32;
                default + PER_DAY_BUDGET * days
            }
            _ => default,
        }
    }

    async fn fetch_live(&self, _ctx: &FetchContext, symbol: &str) -> AdapterResult<Quote> {
        let symbol = Self::normalize_symbol(symbol);
        let code = self.scrip_code(&symbol).await?;
        let url = format!(
            "{}/getScripHeaderData/w?Debtflag=&scripcode={}&seriesid=",
            self.endpoints.api_base, code
        );
        let response: ScripHeaderResponse = self.get_json(&url).await?;
        quote_from_header(&symbol, response)
    }

    async fn fetch_historical(
        &self,
        _ctx: &FetchContext,
        symbol: &str,
        range: &DateRange,
    ) -> AdapterResult<Vec<HistoricalRecord>> {
        let symbol = Self::normalize_symbol(symbol);
        let code = match self.scrip_code(&symbol).await {
            Ok(code) => Some(code),
            Err(e) if e.is_not_available() => None,
            Err(e) => {
                warn!("BSE: scrip lookup failed for {}: {}", symbol, e);
                None
            }
        };

        let mut records = Vec::new();
        for day in trading_days(range) {
            let csv_text = match self.bhavcopy(day).await {
                Ok(Some(text)) => text,
                Ok(None) => {
                    debug!("BSE: no bhavcopy for {}", day);
                    continue;
                }
                Err(e) if e.is_not_available() => continue,
                Err(e) => {
                    warn!("BSE: bhavcopy for {} failed: {}", day, e);
                    continue;
                }
            };

            match parse_bhavcopy(&csv_text, code.as_deref(), &symbol, day) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!("BSE: skipping bhavcopy for {}: {}", day, e),
            }
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

    const BHAVCOPY: &str = "\
TradDt,BizDt,Sgmt,Src,FinInstrmTp,FinInstrmId,ISIN,TckrSymb,SctySrs,OpnPric,HghPric,LwPric,ClsPric,LastPric,PrvsClsgPric,TtlTradgVol,TtlTrfVal
2024-03-05,2024-03-05,CM,BSE,STK,500325,INE002A01018,RELIANCE,A,2950.00,2985.50,2940.00,2970.50,2971.00,2950.00,123456,366000000
2024-03-05,2024-03-05,CM,BSE,STK,532540,INE467B01029,TCS,A,4100.00,4120.00,4080.00,4110.00,4111.00,4095.00,45678,187000000
";

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(BseAdapter::normalize_symbol("reliance.bo"), "RELIANCE");
        assert_eq!(BseAdapter::normalize_symbol("TCS.BSE"), "TCS");
        assert_eq!(BseAdapter::normalize_symbol("500325"), "500325");
    }

    #[test]
    fn test_scrip_code_detection() {
        assert!(is_scrip_code("500325"));
        assert!(!is_scrip_code("RELIANCE"));
        assert!(!is_scrip_code(""));
    }

    #[test]
    fn test_build_directory() {
        let entries: Vec<ScripDirectoryEntry> = serde_json::from_str(
            r#"[
                {"SCRIP_CD": "500325", "Scrip_Name": "Reliance Industries Ltd", "scrip_id": "RELIANCE"},
                {"SCRIP_CD": "532540", "scrip_id": "tcs"},
                {"SCRIP_CD": "999999"}
            ]"#,
        )
        .unwrap();
        let directory = build_directory(entries);
        assert_eq!(directory.len(), 2);
        assert_eq!(directory.get("TCS").map(String::as_str), Some("532540"));
    }

    #[test]
    fn test_bhavcopy_by_code() {
        let record = parse_bhavcopy(BHAVCOPY, Some("532540"), "TCS", day())
            .unwrap()
            .unwrap();
        assert_eq!(record.close, dec!(4110));
        assert_eq!(record.volume, Some(45678));
        assert_eq!(record.date, day());
    }

    #[test]
    fn test_bhavcopy_by_ticker() {
        let record = parse_bhavcopy(BHAVCOPY, None, "reliance", day())
            .unwrap()
            .unwrap();
        assert_eq!(record.open, dec!(2950));
        assert_eq!(record.high, dec!(2985.50));
    }

    #[test]
    fn test_bhavcopy_missing_symbol() {
        assert!(parse_bhavcopy(BHAVCOPY, Some("1"), "X", day())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_quote_from_header() {
        let response: ScripHeaderResponse = serde_json::from_str(
            r#"{
                "Header": {"PrevClose": "2,950.00", "LTP": "2,970.50", "Ason": "05 Mar 24 | 16:00"},
                "CurrRate": {"LTP": "2970.50", "Chg": "20.50", "PcChg": "0.69"}
            }"#,
        )
        .unwrap();
        let quote = quote_from_header("RELIANCE", response).unwrap();
        assert_eq!(quote.price, dec!(2970.50));
        assert_eq!(quote.change_percent, Some(dec!(0.69)));
        assert_eq!(quote.timestamp.to_rfc3339(), "2024-03-05T10:30:00+00:00");
    }

    #[test]
    fn test_missing_previous_close_is_unknown_change() {
        let response: ScripHeaderResponse =
            serde_json::from_str(r#"{"CurrRate": {"LTP": "101.00"}}"#).unwrap();
        let quote = quote_from_header("X", response).unwrap();
        assert_eq!(quote.price, dec!(101));
        assert_eq!(quote.change_percent, None);
    }

    #[test]
    fn test_weekend_detection() {
        assert!(is_weekend(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()));
        assert!(!is_weekend(day()));
    }

    #[test]
    fn test_history_budget_scales_with_trading_days() {
        let adapter = BseAdapter::new();
        let default = Duration::from_secs(8);
        let january = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        );

        assert_eq!(
            adapter.invocation_timeout(Operation::HistoricalPrices, Some(&january), default),
            default + Duration::from_secs(23)
        );
        assert_eq!(
            adapter.invocation_timeout(Operation::LivePrice, None, default),
            default
        );
    }
}
