//! Symbol-variant helpers shared by adapters.

use std::future::Future;

use log::debug;

use super::traits::AdapterResult;
use crate::errors::MarketDataError;

/// Try each symbol variant in order and return the first success.
///
/// When every variant fails, the last `AdapterError`-class failure is
/// returned if there was one; otherwise the last `NotAvailable` failure.
/// An empty variant list yields `SymbolNotFound`.
pub async fn try_variants<T, F, Fut>(variants: &[String], mut attempt: F) -> AdapterResult<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = AdapterResult<T>>,
{
    let mut not_available: Option<MarketDataError> = None;
    let mut adapter_error: Option<MarketDataError> = None;

    for variant in variants {
        match attempt(variant.clone()).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                debug!("Variant '{}' failed: {}", variant, e);
                if e.is_not_available() {
                    not_available = Some(e);
                } else {
                    adapter_error = Some(e);
                }
            }
        }
    }

    Err(adapter_error.or(not_available).unwrap_or_else(|| {
        MarketDataError::SymbolNotFound(variants.first().cloned().unwrap_or_default())
    }))
}

/// Strip the first matching exchange suffix (case-insensitive).
pub fn strip_suffix<'a>(symbol: &'a str, suffixes: &[&str]) -> &'a str {
    for suffix in suffixes {
        if symbol.len() > suffix.len() {
            let split = symbol.len() - suffix.len();
            if symbol.is_char_boundary(split) && symbol[split..].eq_ignore_ascii_case(suffix) {
                return &symbol[..split];
            }
        }
    }
    symbol
}

/// Whether the symbol already carries an exchange suffix such as `.NS`.
pub fn has_exchange_suffix(symbol: &str) -> bool {
    symbol.contains('.')
}
