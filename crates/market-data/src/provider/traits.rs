//! Source adapter trait definitions.
//!
//! This module defines the `SourceAdapter` trait that every upstream
//! integration implements, and the per-call `FetchContext`.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{DateRange, HistoricalRecord, InstrumentInfo, Market, Quote, SourceId};

use super::capabilities::{AdapterCapabilities, Operation};

/// Outcome of a single adapter call.
pub type AdapterResult<T> = Result<T, MarketDataError>;

/// Per-call context handed to an adapter.
#[derive(Clone)]
pub struct FetchContext {
    market: Market,
    credential: Option<String>,
}

impl FetchContext {
    pub fn new(market: Market) -> Self {
        Self {
            market,
            credential: None,
        }
    }

    pub fn with_credential(mut self, credential: Option<String>) -> Self {
        self.credential = credential;
        self
    }

    pub fn market(&self) -> Market {
        self.market
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    /// The credential, or `MissingCredential` for `provider`.
    pub fn require_credential(&self, provider: SourceId) -> AdapterResult<&str> {
        self.credential()
            .ok_or_else(|| MarketDataError::MissingCredential {
                provider: provider.to_string(),
            })
    }
}

impl fmt::Debug for FetchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchContext")
            .field("market", &self.market)
            .field("credential", &self.credential.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Trait for upstream price sources.
///
/// Implement this trait to add a new source. The aggregator consults
/// [`capabilities`](Self::capabilities) and
/// [`credential_env_var`](Self::credential_env_var) before invoking any fetch
/// method, so adapters never see a request they declared they cannot serve.
///
/// Adapters return `NotAvailable`-class errors (`SymbolNotFound`,
/// `NoDataForRange`, ...) when the upstream has nothing, and `AdapterError`-class
/// errors for transport or parse faults. Both make the aggregator move on.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use quotehub_market_data::provider::{AdapterCapabilities, AdapterResult, FetchContext, SourceAdapter};
///
/// struct MySource;
///
/// #[async_trait]
/// impl SourceAdapter for MySource {
///     fn id(&self) -> SourceId {
///         SourceId::Nyse
///     }
///
///     fn capabilities(&self) -> AdapterCapabilities {
///         AdapterCapabilities {
///             markets: &[Market::Usa],
///             supports_live: true,
///             supports_historical: false,
///             supports_info: false,
///         }
///     }
///
///     // ... implement fetch methods
/// }
/// ```
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Identifier of the upstream this adapter talks to.
    fn id(&self) -> SourceId;

    /// Describes what this adapter can do.
    fn capabilities(&self) -> AdapterCapabilities;

    /// Environment variable holding the credential, for credential-gated
    /// sources. `None` means the adapter needs no credential.
    fn credential_env_var(&self) -> Option<&'static str> {
        None
    }

    /// Time the aggregator allows one invocation of `operation`.
    ///
    /// `default` is the configured per-adapter timeout. Adapters that make one
    /// upstream request per day or per window scale it with `range`; the
    /// resolve-level deadline still caps the result.
    fn invocation_timeout(
        &self,
        operation: Operation,
        range: Option<&DateRange>,
        default: Duration,
    ) -> Duration {
        let _ = (operation, range);
        default
    }

    /// Fetch the current quote for `symbol`.
    async fn fetch_live(&self, ctx: &FetchContext, symbol: &str) -> AdapterResult<Quote>;

    /// Fetch daily bars for `symbol` within `range` (both ends inclusive).
    ///
    /// Records may come back unsorted or slightly outside the range; the
    /// aggregator normalizes them.
    async fn fetch_historical(
        &self,
        ctx: &FetchContext,
        symbol: &str,
        range: &DateRange,
    ) -> AdapterResult<Vec<HistoricalRecord>>;

    /// Fetch descriptive data for `symbol`.
    ///
    /// Default implementation returns `NotSupported`.
    async fn fetch_instrument_info(
        &self,
        ctx: &FetchContext,
        symbol: &str,
    ) -> AdapterResult<InstrumentInfo> {
        let _ = (ctx, symbol);
        Err(MarketDataError::NotSupported {
            operation: "instrument_info".to_string(),
            provider: self.id().to_string(),
        })
    }
}
