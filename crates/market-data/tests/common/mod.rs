//! Scripted adapters shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;

use quotehub_market_data::errors::MarketDataError;
use quotehub_market_data::{
    AdapterCapabilities, AdapterResult, ClientConfig, DateRange, FetchContext, HistoricalRecord,
    InstrumentInfo, Quote, SourceAdapter, SourceId, StockPriceClient,
};

/// What a mock answers with, whatever it is asked.
#[derive(Clone, Debug)]
pub enum Reply {
    Quote(Quote),
    Records(Vec<HistoricalRecord>),
    Info(InstrumentInfo),
    NotAvailable,
    Error,
}

pub struct MockAdapter {
    id: SourceId,
    reply: Reply,
    credential_env_var: Option<&'static str>,
    call_count: AtomicUsize,
    seen_credential: Mutex<Option<String>>,
}

impl MockAdapter {
    pub fn new(id: SourceId, reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            id,
            reply,
            credential_env_var: None,
            call_count: AtomicUsize::new(0),
            seen_credential: Mutex::new(None),
        })
    }

    /// A credential-gated mock reading `env_var`.
    pub fn gated(id: SourceId, env_var: &'static str, reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            id,
            reply,
            credential_env_var: Some(env_var),
            call_count: AtomicUsize::new(0),
            seen_credential: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn seen_credential(&self) -> Option<String> {
        self.seen_credential.lock().unwrap().clone()
    }

    fn record_call(&self, ctx: &FetchContext) {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        *self.seen_credential.lock().unwrap() = ctx.credential().map(str::to_string);
    }

    fn failure<T>(&self) -> AdapterResult<T> {
        match self.reply {
            Reply::Error => Err(MarketDataError::provider(self.id.as_str(), "HTTP 503")),
            _ => Err(MarketDataError::SymbolNotFound("scripted".to_string())),
        }
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn id(&self) -> SourceId {
        self.id
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            markets: self.id.markets(),
            supports_live: true,
            supports_historical: true,
            supports_info: true,
        }
    }

    fn credential_env_var(&self) -> Option<&'static str> {
        self.credential_env_var
    }

    async fn fetch_live(&self, ctx: &FetchContext, _symbol: &str) -> AdapterResult<Quote> {
        self.record_call(ctx);
        match &self.reply {
            Reply::Quote(quote) => Ok(quote.clone()),
            _ => self.failure(),
        }
    }

    async fn fetch_historical(
        &self,
        ctx: &FetchContext,
        _symbol: &str,
        _range: &DateRange,
    ) -> AdapterResult<Vec<HistoricalRecord>> {
        self.record_call(ctx);
        match &self.reply {
            Reply::Records(records) => Ok(records.clone()),
            _ => self.failure(),
        }
    }

    async fn fetch_instrument_info(
        &self,
        ctx: &FetchContext,
        _symbol: &str,
    ) -> AdapterResult<InstrumentInfo> {
        self.record_call(ctx);
        match &self.reply {
            Reply::Info(info) => Ok(info.clone()),
            _ => self.failure(),
        }
    }
}

pub fn client(config: ClientConfig, adapters: &[Arc<MockAdapter>]) -> StockPriceClient {
    StockPriceClient::with_adapters(
        config,
        adapters
            .iter()
            .map(|a| a.clone() as Arc<dyn SourceAdapter>)
            .collect(),
    )
}

pub fn config(market: &str, sources: &[&str]) -> ClientConfig {
    ClientConfig::builder()
        .market(market)
        .sources(sources.iter().copied())
        .env_fallback(false)
        .build()
        .unwrap()
}

pub fn fixed_quote(price: Decimal, change: Option<Decimal>) -> Quote {
    Quote::new(Utc.with_ymd_and_hms(2024, 3, 5, 20, 0, 0).unwrap(), price).with_change_percent(change)
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

pub fn bar(d: u32, close: Decimal) -> HistoricalRecord {
    HistoricalRecord::new(day(d), close, close, close, close, Some(1_000))
}
