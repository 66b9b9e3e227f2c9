//! Error types and failure classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`FailureClass`]: Classification deciding how the aggregator treats an error

mod class;

pub use class::FailureClass;

use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// Each variant is classified into a [`FailureClass`] via the
/// [`failure_class`](Self::failure_class) method, which determines whether the
/// error is surfaced to the caller or absorbed by the fallback chain.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The market code is not one of the supported markets.
    #[error("Unknown market: {0}. Valid options are: india, usa")]
    InvalidMarket(String),

    /// A requested source is not one of the known sources.
    #[error("Unknown source: {0}. Valid options are: yfinance, alphavantage, nasdaq, nse, bse, nyse, auto")]
    InvalidSource(String),

    /// A per-call argument (symbol, date) is malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested symbol was not found by the provider.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// No data available for the requested date range.
    /// The symbol exists but has no quotes in the specified period.
    #[error("No data for date range")]
    NoDataForRange,

    /// The provider does not implement the requested operation.
    #[error("Operation '{operation}' not supported by {provider}")]
    NotSupported {
        /// The operation that was requested
        operation: String,
        /// The provider that does not support it
        provider: String,
    },

    /// The provider needs a credential and none is configured.
    #[error("Missing credential for {provider}")]
    MissingCredential {
        /// The credential-gated provider
        provider: String,
    },

    /// The provider rate limited the request (HTTP 429 or an API notice).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// A provider-specific error occurred (HTTP status, parse fault, panic).
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// Data validation failed.
    /// The provider returned data that failed validation checks.
    #[error("Validation failed: {message}")]
    ValidationFailed {
        /// Description of the validation failure
        message: String,
    },

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    /// Shorthand for a [`MarketDataError::ProviderError`].
    pub fn provider(provider: &str, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Returns the failure classification for this error.
    ///
    /// - [`FailureClass::Configuration`]: invalid construction parameters
    /// - [`FailureClass::Validation`]: malformed per-call arguments
    /// - [`FailureClass::NotAvailable`]: the source ran but had no data
    /// - [`FailureClass::AdapterError`]: transport/parse fault inside one source
    ///
    /// # Examples
    ///
    /// ```
    /// use quotehub_market_data::errors::{FailureClass, MarketDataError};
    ///
    /// let error = MarketDataError::RateLimited { provider: "alphavantage".to_string() };
    /// assert_eq!(error.failure_class(), FailureClass::AdapterError);
    ///
    /// let error = MarketDataError::SymbolNotFound("INVALID".to_string());
    /// assert_eq!(error.failure_class(), FailureClass::NotAvailable);
    /// ```
    pub fn failure_class(&self) -> FailureClass {
        match self {
            Self::InvalidMarket(_) | Self::InvalidSource(_) => FailureClass::Configuration,

            Self::InvalidArgument(_) => FailureClass::Validation,

            Self::SymbolNotFound(_)
            | Self::NoDataForRange
            | Self::NotSupported { .. }
            | Self::MissingCredential { .. } => FailureClass::NotAvailable,

            Self::RateLimited { .. }
            | Self::Timeout { .. }
            | Self::ProviderError { .. }
            | Self::ValidationFailed { .. }
            | Self::Network(_) => FailureClass::AdapterError,
        }
    }

    /// Whether this error means "the source ran but found nothing".
    pub fn is_not_available(&self) -> bool {
        self.failure_class() == FailureClass::NotAvailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_market_is_configuration() {
        let error = MarketDataError::InvalidMarket("mars".to_string());
        assert_eq!(error.failure_class(), FailureClass::Configuration);
        assert!(error.failure_class().is_fatal());
    }

    #[test]
    fn test_invalid_source_is_configuration() {
        let error = MarketDataError::InvalidSource("bloomberg".to_string());
        assert_eq!(error.failure_class(), FailureClass::Configuration);
    }

    #[test]
    fn test_invalid_argument_is_validation() {
        let error = MarketDataError::InvalidArgument("bad date".to_string());
        assert_eq!(error.failure_class(), FailureClass::Validation);
        assert!(error.failure_class().is_fatal());
    }

    #[test]
    fn test_symbol_not_found_is_not_available() {
        let error = MarketDataError::SymbolNotFound("INVALID".to_string());
        assert!(error.is_not_available());
        assert!(!error.failure_class().is_fatal());
    }

    #[test]
    fn test_no_data_for_range_is_not_available() {
        assert!(MarketDataError::NoDataForRange.is_not_available());
    }

    #[test]
    fn test_missing_credential_is_not_available() {
        let error = MarketDataError::MissingCredential {
            provider: "alphavantage".to_string(),
        };
        assert!(error.is_not_available());
    }

    #[test]
    fn test_timeout_is_adapter_error() {
        let error = MarketDataError::Timeout {
            provider: "nse".to_string(),
        };
        assert_eq!(error.failure_class(), FailureClass::AdapterError);
    }

    #[test]
    fn test_validation_failed_is_adapter_error() {
        let error = MarketDataError::ValidationFailed {
            message: "Negative close price".to_string(),
        };
        assert_eq!(error.failure_class(), FailureClass::AdapterError);
    }

    #[test]
    fn test_error_display() {
        let error = MarketDataError::SymbolNotFound("INVALID".to_string());
        assert_eq!(format!("{}", error), "Symbol not found: INVALID");

        let error = MarketDataError::RateLimited {
            provider: "alphavantage".to_string(),
        };
        assert_eq!(format!("{}", error), "Rate limited: alphavantage");

        let error = MarketDataError::provider("nasdaq", "HTTP 503");
        assert_eq!(format!("{}", error), "Provider error: nasdaq - HTTP 503");

        let error = MarketDataError::InvalidMarket("mars".to_string());
        assert!(format!("{}", error).starts_with("Unknown market: mars"));
    }
}
