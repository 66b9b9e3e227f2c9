//! Fallback aggregator.
//!
//! The aggregator walks the eligible sources for a market in order, skipping
//! the ones that cannot serve the request and returning the first accepted
//! answer. It handles:
//! - Country policy and capability gating
//! - Credential gating without invoking the adapter
//! - Per-invocation timeouts and an optional resolve-level deadline
//! - Panic containment inside adapters
//! - Data validation and series normalization
//! - Diagnostic tracking for every source considered

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::time::Instant;

use super::{eligible_sources, FetchDiagnostics, QuoteValidator, SkipReason};
use crate::config::{Credentials, DEFAULT_ADAPTER_TIMEOUT};
use crate::errors::MarketDataError;
use crate::models::{
    DateRange, HistoricalRecord, InstrumentInfo, Market, Quote, Series, SourceId, SourceSelection,
};
use crate::provider::{AdapterResult, FetchContext, Operation, SourceAdapter};

/// A resolved value paired with the source that produced it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Sourced<T> {
    pub source: SourceId,
    pub value: T,
}

/// Market, selection and credentials a resolution runs under.
#[derive(Clone, Copy, Debug)]
pub struct ResolveScope<'a> {
    pub market: Market,
    pub selection: &'a SourceSelection,
    pub credentials: &'a Credentials,
}

/// One of the three operations, bound to its parameters.
#[async_trait]
trait Resolvable: Send + Sync {
    type Raw: Send;
    type Output: Send;

    fn operation(&self) -> Operation;

    /// Date range the request covers, for operations that have one.
    fn range(&self) -> Option<&DateRange> {
        None
    }

    async fn fetch(
        &self,
        adapter: &dyn SourceAdapter,
        ctx: &FetchContext,
        symbol: &str,
    ) -> AdapterResult<Self::Raw>;

    /// Turn what the adapter returned into an accepted answer, or reject it.
    fn accept(
        &self,
        validator: &QuoteValidator,
        source: SourceId,
        raw: Self::Raw,
    ) -> AdapterResult<Self::Output>;
}

struct LivePrice;

#[async_trait]
impl Resolvable for LivePrice {
    type Raw = Quote;
    type Output = Quote;

    fn operation(&self) -> Operation {
        Operation::LivePrice
    }

    async fn fetch(
        &self,
        adapter: &dyn SourceAdapter,
        ctx: &FetchContext,
        symbol: &str,
    ) -> AdapterResult<Quote> {
        adapter.fetch_live(ctx, symbol).await
    }

    fn accept(&self, validator: &QuoteValidator, _source: SourceId, raw: Quote) -> AdapterResult<Quote> {
        validator.validate_quote(&raw)?;
        Ok(raw)
    }
}

struct HistoricalPrices<'r> {
    range: &'r DateRange,
}

#[async_trait]
impl<'r> Resolvable for HistoricalPrices<'r> {
    type Raw = Vec<HistoricalRecord>;
    type Output = Series;

    fn operation(&self) -> Operation {
        Operation::HistoricalPrices
    }

    fn range(&self) -> Option<&DateRange> {
        Some(self.range)
    }

    async fn fetch(
        &self,
        adapter: &dyn SourceAdapter,
        ctx: &FetchContext,
        symbol: &str,
    ) -> AdapterResult<Vec<HistoricalRecord>> {
        adapter.fetch_historical(ctx, symbol, self.range).await
    }

    fn accept(
        &self,
        validator: &QuoteValidator,
        source: SourceId,
        raw: Vec<HistoricalRecord>,
    ) -> AdapterResult<Series> {
        let (valid, invalid) = validator.validate_batch(raw);
        if !invalid.is_empty() {
            warn!(
                "Dropped {} invalid records from {} (first: {} on {})",
                invalid.len(),
                source,
                invalid[0].1,
                invalid[0].0.date
            );
        }

        let series = Series::from_records(valid, self.range);
        if series.is_empty() {
            return Err(MarketDataError::NoDataForRange);
        }
        Ok(series)
    }
}

struct InstrumentDetails;

#[async_trait]
impl Resolvable for InstrumentDetails {
    type Raw = InstrumentInfo;
    type Output = InstrumentInfo;

    fn operation(&self) -> Operation {
        Operation::InstrumentInfo
    }

    async fn fetch(
        &self,
        adapter: &dyn SourceAdapter,
        ctx: &FetchContext,
        symbol: &str,
    ) -> AdapterResult<InstrumentInfo> {
        adapter.fetch_instrument_info(ctx, symbol).await
    }

    fn accept(
        &self,
        _validator: &QuoteValidator,
        source: SourceId,
        mut raw: InstrumentInfo,
    ) -> AdapterResult<InstrumentInfo> {
        if raw.is_empty() {
            return Err(MarketDataError::SymbolNotFound(raw.symbol));
        }
        raw.source.get_or_insert_with(|| source.to_string());
        Ok(raw)
    }
}

/// Fallback aggregator over a fixed set of adapters.
///
/// Holds only immutable state; concurrent resolutions need no locking here.
pub struct Aggregator {
    adapters: HashMap<SourceId, Arc<dyn SourceAdapter>>,
    validator: QuoteValidator,
    adapter_timeout: Duration,
    resolve_timeout: Option<Duration>,
}

impl Aggregator {
    /// Create an aggregator over `adapters`.
    ///
    /// When two adapters report the same id, the first one is kept.
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>) -> Self {
        let mut by_id: HashMap<SourceId, Arc<dyn SourceAdapter>> = HashMap::new();
        for adapter in adapters {
            let id = adapter.id();
            if by_id.contains_key(&id) {
                warn!("Ignoring duplicate adapter registration for '{}'", id);
                continue;
            }
            by_id.insert(id, adapter);
        }

        Self {
            adapters: by_id,
            validator: QuoteValidator::new(),
            adapter_timeout: DEFAULT_ADAPTER_TIMEOUT,
            resolve_timeout: None,
        }
    }

    pub fn with_validator(mut self, validator: QuoteValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_adapter_timeout(mut self, timeout: Duration) -> Self {
        self.adapter_timeout = timeout;
        self
    }

    pub fn with_resolve_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    /// Ids of the registered adapters.
    pub fn registered(&self) -> Vec<SourceId> {
        SourceId::ALL
            .into_iter()
            .filter(|id| self.adapters.contains_key(id))
            .collect()
    }

    pub async fn resolve_live(
        &self,
        scope: ResolveScope<'_>,
        symbol: &str,
    ) -> (Option<Sourced<Quote>>, FetchDiagnostics) {
        self.resolve(&LivePrice, scope, symbol).await
    }

    pub async fn resolve_historical(
        &self,
        scope: ResolveScope<'_>,
        symbol: &str,
        range: &DateRange,
    ) -> (Option<Sourced<Series>>, FetchDiagnostics) {
        self.resolve(&HistoricalPrices { range }, scope, symbol).await
    }

    pub async fn resolve_instrument_info(
        &self,
        scope: ResolveScope<'_>,
        symbol: &str,
    ) -> (Option<Sourced<InstrumentInfo>>, FetchDiagnostics) {
        self.resolve(&InstrumentDetails, scope, symbol).await
    }

    async fn resolve<R: Resolvable>(
        &self,
        request: &R,
        scope: ResolveScope<'_>,
        symbol: &str,
    ) -> (Option<Sourced<R::Output>>, FetchDiagnostics) {
        let operation = request.operation();
        let mut diagnostics = FetchDiagnostics::new();
        let started = Instant::now();

        for source in eligible_sources(scope.market, scope.selection) {
            let remaining = match self.resolve_timeout {
                Some(budget) => match budget.checked_sub(started.elapsed()) {
                    Some(left) if !left.is_zero() => Some(left),
                    _ => {
                        diagnostics.record_skip(source, SkipReason::DeadlineExceeded);
                        continue;
                    }
                },
                None => None,
            };

            let Some(adapter) = self.adapters.get(&source) else {
                diagnostics.record_skip(source, SkipReason::NotRegistered);
                continue;
            };

            let capabilities = adapter.capabilities();
            if !capabilities.serves(scope.market) {
                diagnostics.record_skip(source, SkipReason::MarketNotServed);
                continue;
            }
            if !capabilities.supports(operation) {
                diagnostics.record_skip(
                    source,
                    SkipReason::CapabilityUnsupported {
                        operation: operation.to_string(),
                    },
                );
                continue;
            }

            let env_var = adapter.credential_env_var();
            let credential = scope.credentials.resolve(source, env_var);
            if env_var.is_some() && credential.is_none() {
                debug!("Skipping '{}': no credential configured", source);
                diagnostics.record_skip(source, SkipReason::MissingCredential);
                continue;
            }

            let ctx = FetchContext::new(scope.market).with_credential(credential);
            let budget =
                adapter.invocation_timeout(operation, request.range(), self.adapter_timeout);
            let limit = remaining.map_or(budget, |left| left.min(budget));

            debug!(
                "Trying '{}' for {} of '{}' (limit {:?})",
                source, operation, symbol, limit
            );

            let outcome = self
                .invoke(request, adapter.as_ref(), &ctx, symbol, limit)
                .await
                .and_then(|raw| request.accept(&self.validator, source, raw));

            match outcome {
                Ok(value) => {
                    diagnostics.record_success(source);
                    info!(
                        "Resolved {} of '{}' from '{}'. Diagnostics: {}",
                        operation,
                        symbol,
                        source,
                        diagnostics.summary()
                    );
                    return (Some(Sourced { source, value }), diagnostics);
                }
                Err(e) if e.is_not_available() => {
                    debug!("'{}' has no {} for '{}': {}", source, operation, symbol, e);
                    diagnostics.record_not_available(source, e.to_string());
                }
                Err(e) => {
                    warn!("'{}' failed {} for '{}': {}", source, operation, symbol, e);
                    diagnostics.record_error(source, e.to_string());
                }
            }
        }

        warn!(
            "No source could serve {} of '{}' ({} {}). Diagnostics: {}",
            operation,
            symbol,
            scope.market,
            scope.selection,
            diagnostics.summary()
        );
        (None, diagnostics)
    }

    /// Run one adapter call under `limit`, converting timeouts and panics
    /// into adapter errors.
    async fn invoke<R: Resolvable>(
        &self,
        request: &R,
        adapter: &dyn SourceAdapter,
        ctx: &FetchContext,
        symbol: &str,
        limit: Duration,
    ) -> AdapterResult<R::Raw> {
        let provider = adapter.id().to_string();
        let call = AssertUnwindSafe(request.fetch(adapter, ctx, symbol)).catch_unwind();

        match tokio::time::timeout(limit, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(MarketDataError::provider(
                    &provider,
                    format!("adapter panicked: {}", message),
                ))
            }
            Err(_) => Err(MarketDataError::Timeout { provider }),
        }
    }
}
