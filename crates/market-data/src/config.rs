//! Client configuration.
//!
//! [`ClientConfig`] is validated once, at build time. Unknown markets and
//! sources fail here so per-call operations only ever see argument errors.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::errors::MarketDataError;
use crate::models::{Market, SourceId, SourceSelection};

/// Per-adapter ceiling when none is configured.
pub const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(8);

/// Credentials for credential-gated sources.
///
/// Explicit keys win. When `env_fallback` is on, the adapter's environment
/// variable is read at call time, so a key exported after construction is
/// picked up.
#[derive(Clone, Default)]
pub struct Credentials {
    explicit: HashMap<SourceId, String>,
    env_fallback: bool,
}

impl Credentials {
    pub fn new(env_fallback: bool) -> Self {
        Self {
            explicit: HashMap::new(),
            env_fallback,
        }
    }

    /// Store an explicit key. Blank keys are ignored.
    pub fn insert(&mut self, source: SourceId, key: impl Into<String>) {
        let key = key.into().trim().to_string();
        if !key.is_empty() {
            self.explicit.insert(source, key);
        }
    }

    pub fn env_fallback(&self) -> bool {
        self.env_fallback
    }

    /// Credential for `source`, looking at `env_var` when nothing explicit
    /// is set.
    pub fn resolve(&self, source: SourceId, env_var: Option<&str>) -> Option<String> {
        if let Some(key) = self.explicit.get(&source) {
            return Some(key.clone());
        }
        if !self.env_fallback {
            return None;
        }
        env_var
            .and_then(|name| std::env::var(name).ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources: Vec<&SourceId> = self.explicit.keys().collect();
        f.debug_struct("Credentials")
            .field("explicit", &sources)
            .field("env_fallback", &self.env_fallback)
            .finish()
    }
}

/// Validated configuration of a [`StockPriceClient`](crate::StockPriceClient).
#[derive(Clone, Debug)]
pub struct ClientConfig {
    market: Market,
    selection: SourceSelection,
    credentials: Credentials,
    adapter_timeout: Duration,
    resolve_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Shorthand for a config with `[auto]` sources and defaults elsewhere.
    pub fn for_market(market: &str) -> Result<Self, MarketDataError> {
        Self::builder().market(market).build()
    }

    pub fn market(&self) -> Market {
        self.market
    }

    pub fn selection(&self) -> &SourceSelection {
        &self.selection
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn adapter_timeout(&self) -> Duration {
        self.adapter_timeout
    }

    pub fn resolve_timeout(&self) -> Option<Duration> {
        self.resolve_timeout
    }
}

/// Builder for [`ClientConfig`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use quotehub_market_data::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .market("india")
///     .sources(["nse", "auto"])
///     .adapter_timeout(Duration::from_secs(5))
///     .build()
///     .unwrap();
/// assert_eq!(config.market().as_str(), "india");
/// ```
#[derive(Debug)]
pub struct ClientConfigBuilder {
    market: Option<String>,
    sources: Vec<String>,
    credentials: Vec<(SourceId, String)>,
    adapter_timeout: Duration,
    resolve_timeout: Option<Duration>,
    env_fallback: bool,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self {
            market: None,
            sources: Vec::new(),
            credentials: Vec::new(),
            adapter_timeout: DEFAULT_ADAPTER_TIMEOUT,
            resolve_timeout: None,
            env_fallback: true,
        }
    }
}

impl ClientConfigBuilder {
    /// Market code (`usa` or `india`, any case). Required.
    pub fn market(mut self, market: impl Into<String>) -> Self {
        self.market = Some(market.into());
        self
    }

    /// Ordered source names; `auto` may appear anywhere. Empty means `[auto]`.
    pub fn sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    pub fn alpha_vantage_api_key(self, key: impl Into<String>) -> Self {
        self.credential(SourceId::AlphaVantage, key)
    }

    pub fn credential(mut self, source: SourceId, key: impl Into<String>) -> Self {
        self.credentials.push((source, key.into()));
        self
    }

    /// Ceiling for a single adapter invocation.
    pub fn adapter_timeout(mut self, timeout: Duration) -> Self {
        self.adapter_timeout = timeout;
        self
    }

    /// Total budget for one resolution across all sources.
    pub fn resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = Some(timeout);
        self
    }

    /// Whether credentials may come from environment variables. On by default.
    pub fn env_fallback(mut self, enabled: bool) -> Self {
        self.env_fallback = enabled;
        self
    }

    pub fn build(self) -> Result<ClientConfig, MarketDataError> {
        let market = self
            .market
            .as_deref()
            .ok_or_else(|| MarketDataError::InvalidMarket("(none)".to_string()))?
            .parse::<Market>()?;

        let selection = SourceSelection::parse(&self.sources)?;

        if self.adapter_timeout.is_zero() {
            return Err(MarketDataError::InvalidArgument(
                "adapter timeout must be greater than zero".to_string(),
            ));
        }

        let mut credentials = Credentials::new(self.env_fallback);
        for (source, key) in self.credentials {
            credentials.insert(source, key);
        }

        Ok(ClientConfig {
            market,
            selection,
            credentials,
            adapter_timeout: self.adapter_timeout,
            resolve_timeout: self.resolve_timeout,
        })
    }
}
