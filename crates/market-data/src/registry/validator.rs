//! Price data validation.
//!
//! Validates what adapters return before the aggregator accepts it:
//! - Live quotes: positive price within a sanity ceiling
//! - Daily bars: OHLC invariants (high >= low, open/close between high/low)
//! - Non-negative values
//! - Future: staleness checks

use log::warn;
use rust_decimal::Decimal;

use crate::errors::MarketDataError;
use crate::models::{HistoricalRecord, Quote};

/// Validation severity levels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationSeverity {
    /// Hard failure - reject the data, try next source.
    Hard,
    /// Soft warning - accept but log warning.
    Soft,
}

/// Validation result details.
#[derive(Clone, Debug)]
pub struct ValidationIssue {
    /// Severity of the issue.
    pub severity: ValidationSeverity,
    /// Description of the issue.
    pub message: String,
}

impl ValidationIssue {
    fn hard(message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Hard,
            message: message.into(),
        }
    }

    fn soft(message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Soft,
            message: message.into(),
        }
    }
}

/// Validator configuration.
#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    /// Whether to reject negative prices.
    pub reject_negative_prices: bool,
    /// Whether to reject bars where high < low.
    pub reject_invalid_ohlc: bool,
    /// Maximum believable price. Hard for live quotes, a warning for bars.
    pub max_price: Option<Decimal>,
    /// Whether to warn on zero volume.
    pub warn_on_zero_volume: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            reject_negative_prices: true,
            reject_invalid_ohlc: true,
            max_price: Some(Decimal::from(1_000_000_000i64)), // 1 billion as sanity check
            warn_on_zero_volume: true,
        }
    }
}

/// Price data validator.
///
/// Configuration allows for different validation strictness levels.
pub struct QuoteValidator {
    config: ValidatorConfig,
}

impl QuoteValidator {
    /// Create a new validator with default configuration.
    pub fn new() -> Self {
        Self {
            config: ValidatorConfig::default(),
        }
    }

    /// Create a validator with custom configuration.
    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validate a live quote.
    ///
    /// A zero price is always rejected: upstreams report it when they have
    /// no trade, not as a real price.
    pub fn validate_quote(&self, quote: &Quote) -> Result<(), MarketDataError> {
        let mut issues = Vec::new();

        if quote.price.is_zero() {
            issues.push(ValidationIssue::hard("Zero price"));
        } else if self.config.reject_negative_prices && quote.price.is_sign_negative() {
            issues.push(ValidationIssue::hard(format!(
                "Negative price: {}",
                quote.price
            )));
        }

        if let Some(max) = self.config.max_price {
            if quote.price > max {
                issues.push(ValidationIssue::hard(format!(
                    "Price {} exceeds sanity limit {}",
                    quote.price, max
                )));
            }
        }

        self.finish(issues, || quote.timestamp.to_string())
    }

    /// Validate one daily bar.
    ///
    /// Returns Ok(()) if the bar is usable, or Err with details if invalid.
    /// Warnings are logged but do not cause rejection.
    pub fn validate_record(&self, record: &HistoricalRecord) -> Result<(), MarketDataError> {
        let mut issues: Vec<ValidationIssue> = Vec::new();

        self.validate_ohlc_invariants(record, &mut issues);
        self.validate_price_range(record, &mut issues);
        self.validate_volume(record, &mut issues);

        self.finish(issues, || record.date.to_string())
    }

    /// Validate all bars in a batch.
    ///
    /// Returns a tuple of (valid_records, invalid_records_with_errors).
    pub fn validate_batch(
        &self,
        records: Vec<HistoricalRecord>,
    ) -> (
        Vec<HistoricalRecord>,
        Vec<(HistoricalRecord, MarketDataError)>,
    ) {
        let mut valid = Vec::with_capacity(records.len());
        let mut invalid = Vec::new();

        for record in records {
            match self.validate_record(&record) {
                Ok(()) => valid.push(record),
                Err(e) => invalid.push((record, e)),
            }
        }

        (valid, invalid)
    }

    fn finish(
        &self,
        issues: Vec<ValidationIssue>,
        label: impl Fn() -> String,
    ) -> Result<(), MarketDataError> {
        let errors: Vec<&str> = issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Hard)
            .map(|i| i.message.as_str())
            .collect();

        if !errors.is_empty() {
            return Err(MarketDataError::ValidationFailed {
                message: errors.join("; "),
            });
        }

        for issue in issues.iter().filter(|i| i.severity == ValidationSeverity::Soft) {
            warn!("Validation warning for {}: {}", label(), issue.message);
        }

        Ok(())
    }

    /// - High must be >= Low
    /// - Open must be between Low and High
    /// - Close must be between Low and High
    fn validate_ohlc_invariants(&self, record: &HistoricalRecord, issues: &mut Vec<ValidationIssue>) {
        let HistoricalRecord {
            open,
            high,
            low,
            close,
            ..
        } = *record;

        if self.config.reject_negative_prices {
            for (label, value) in [("open", open), ("high", high), ("low", low), ("close", close)] {
                if value < Decimal::ZERO {
                    issues.push(ValidationIssue::hard(format!(
                        "Negative {} price: {}",
                        label, value
                    )));
                }
            }
        }

        if close.is_zero() {
            issues.push(ValidationIssue::hard("Zero close price"));
        }

        if self.config.reject_invalid_ohlc && high < low {
            issues.push(ValidationIssue::hard(format!(
                "High ({}) is less than Low ({})",
                high, low
            )));
            return;
        }

        if open < low || open > high {
            issues.push(ValidationIssue::soft(format!(
                "Open ({}) is outside High/Low range ({}-{})",
                open, low, high
            )));
        }

        if close < low || close > high {
            issues.push(ValidationIssue::soft(format!(
                "Close ({}) is outside High/Low range ({}-{})",
                close, low, high
            )));
        }
    }

    fn validate_price_range(&self, record: &HistoricalRecord, issues: &mut Vec<ValidationIssue>) {
        if let Some(max_price) = self.config.max_price {
            if record.high > max_price {
                issues.push(ValidationIssue::soft(format!(
                    "High price ({}) exceeds max threshold ({})",
                    record.high, max_price
                )));
            }
        }
    }

    fn validate_volume(&self, record: &HistoricalRecord, issues: &mut Vec<ValidationIssue>) {
        if self.config.warn_on_zero_volume && record.volume == Some(0) {
            issues.push(ValidationIssue::soft("Zero volume"));
        }
    }
}

impl Default for QuoteValidator {
    fn default() -> Self {
        Self::new()
    }
}
