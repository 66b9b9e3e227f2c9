//! Source adapter abstractions and implementations.
//!
//! This module contains:
//! - The `SourceAdapter` trait that every upstream integration implements
//! - Adapter capabilities and the per-call `FetchContext`
//! - Shared helpers: symbol-variant retries, payload normalization, request pacing
//! - The six concrete adapters (Yahoo, Alpha Vantage, Nasdaq, NYSE, NSE, BSE)
//!
//! # Symbol variants
//!
//! Symbol rewriting is owned by each adapter, not centralized. Yahoo tries
//! `.NS`/`.BO` suffixes for India, NYSE tries share-class spellings, NSE and
//! BSE strip suffixes they do not understand. The shared loop is
//! [`try_variants`].

mod capabilities;
mod normalize;
mod throttle;
mod traits;
mod variants;

pub mod alpha_vantage;
pub mod bse;
pub mod nasdaq;
pub mod nse;
pub mod nyse;
pub mod yahoo;

pub use capabilities::{AdapterCapabilities, Operation};
pub use normalize::{decimal_from_f64, parse_percent, parse_price, parse_volume, percent_change};
pub use throttle::Throttle;
pub use traits::{AdapterResult, FetchContext, SourceAdapter};
pub use variants::{has_exchange_suffix, strip_suffix, try_variants};

/// Browser-like user agent; several exchanges reject default client agents.
pub(crate) const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Upper bound for a single HTTP request inside an adapter.
pub(crate) const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
