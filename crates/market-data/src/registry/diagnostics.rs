//! Per-resolution diagnostics: what each source did.

use std::fmt;

use serde::Serialize;

use crate::models::SourceId;

/// Why a source was passed over without being invoked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum SkipReason {
    /// No adapter instance is registered for this source.
    NotRegistered,

    /// The adapter does not implement the requested operation.
    CapabilityUnsupported { operation: String },

    /// The source needs a credential and none was configured.
    MissingCredential,

    /// The adapter does not serve the configured market.
    MarketNotServed,

    /// The resolve-level deadline ran out before this source was reached.
    DeadlineExceeded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRegistered => f.write_str("not registered"),
            Self::CapabilityUnsupported { operation } => write!(f, "{} unsupported", operation),
            Self::MissingCredential => f.write_str("missing credential"),
            Self::MarketNotServed => f.write_str("market not served"),
            Self::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

/// What happened when a source was considered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum AttemptOutcome {
    Success,
    /// The source ran but had nothing for the request.
    NotAvailable(String),
    /// The source failed (transport, parse, timeout, panic, rejected data).
    AdapterError(String),
    /// The source was never invoked.
    Skipped(SkipReason),
}

impl AttemptOutcome {
    /// Whether the source contributed nothing without failing.
    ///
    /// Skipped sources count here alongside `NotAvailable`.
    pub fn is_not_available(&self) -> bool {
        matches!(self, Self::NotAvailable(_) | Self::Skipped(_))
    }
}

/// Record of a single source during a resolution.
#[derive(Clone, Debug, Serialize)]
pub struct SourceAttempt {
    pub source: SourceId,
    pub outcome: AttemptOutcome,
}

/// Detailed record of a resolution, one entry per eligible source.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FetchDiagnostics {
    pub attempts: Vec<SourceAttempt>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self {
            attempts: Vec::new(),
        }
    }

    fn push(&mut self, source: SourceId, outcome: AttemptOutcome) {
        self.attempts.push(SourceAttempt { source, outcome });
    }

    pub fn record_skip(&mut self, source: SourceId, reason: SkipReason) {
        self.push(source, AttemptOutcome::Skipped(reason));
    }

    pub fn record_not_available(&mut self, source: SourceId, reason: impl Into<String>) {
        self.push(source, AttemptOutcome::NotAvailable(reason.into()));
    }

    pub fn record_error(&mut self, source: SourceId, error: impl Into<String>) {
        self.push(source, AttemptOutcome::AdapterError(error.into()));
    }

    pub fn record_success(&mut self, source: SourceId) {
        self.push(source, AttemptOutcome::Success);
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        if self.attempts.is_empty() {
            return "no eligible sources".to_string();
        }

        self.attempts
            .iter()
            .map(|a| match &a.outcome {
                AttemptOutcome::Success => format!("{}: SUCCESS", a.source),
                AttemptOutcome::NotAvailable(reason) => {
                    format!("{}: NOT_AVAILABLE ({})", a.source, reason)
                }
                AttemptOutcome::AdapterError(err) => format!("{}: ERROR ({})", a.source, err),
                AttemptOutcome::Skipped(skip) => format!("{}: SKIPPED ({})", a.source, skip),
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// The source that answered, if any.
    pub fn successful_source(&self) -> Option<SourceId> {
        self.attempts
            .iter()
            .find(|a| a.outcome == AttemptOutcome::Success)
            .map(|a| a.source)
    }

    pub fn has_success(&self) -> bool {
        self.successful_source().is_some()
    }

    /// Sources passed over without an invocation, with the reason.
    pub fn skip_reasons(&self) -> Vec<(SourceId, &SkipReason)> {
        self.attempts
            .iter()
            .filter_map(|a| match &a.outcome {
                AttemptOutcome::Skipped(reason) => Some((a.source, reason)),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<(SourceId, &str)> {
        self.attempts
            .iter()
            .filter_map(|a| match &a.outcome {
                AttemptOutcome::AdapterError(err) => Some((a.source, err.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Sources that were actually invoked, in order.
    pub fn invoked(&self) -> Vec<SourceId> {
        self.attempts
            .iter()
            .filter(|a| !matches!(a.outcome, AttemptOutcome::Skipped(_)))
            .map(|a| a.source)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_summary() {
        let mut diag = FetchDiagnostics::new();
        diag.record_skip(SourceId::AlphaVantage, SkipReason::MissingCredential);
        diag.record_error(SourceId::Nse, "Timeout: nse");
        diag.record_not_available(SourceId::Bse, "Symbol not found: XYZ");
        diag.record_success(SourceId::YFinance);

        let summary = diag.summary();
        assert_eq!(
            summary,
            "alphavantage: SKIPPED (missing credential) -> nse: ERROR (Timeout: nse) -> \
             bse: NOT_AVAILABLE (Symbol not found: XYZ) -> yfinance: SUCCESS"
        );
    }

    #[test]
    fn test_has_success() {
        let mut diag = FetchDiagnostics::new();
        diag.record_skip(SourceId::Nasdaq, SkipReason::DeadlineExceeded);
        assert!(!diag.has_success());

        diag.record_success(SourceId::Nyse);
        assert!(diag.has_success());
        assert_eq!(diag.successful_source(), Some(SourceId::Nyse));
    }

    #[test]
    fn test_invoked_excludes_skips() {
        let mut diag = FetchDiagnostics::new();
        diag.record_skip(SourceId::AlphaVantage, SkipReason::MissingCredential);
        diag.record_error(SourceId::Nasdaq, "HTTP 503");
        diag.record_not_available(SourceId::Nyse, "no bars");

        assert_eq!(diag.invoked(), vec![SourceId::Nasdaq, SourceId::Nyse]);
        assert_eq!(diag.errors(), vec![(SourceId::Nasdaq, "HTTP 503")]);
        assert_eq!(diag.skip_reasons().len(), 1);
    }

    #[test]
    fn test_skips_count_as_not_available() {
        assert!(AttemptOutcome::Skipped(SkipReason::MissingCredential).is_not_available());
        assert!(AttemptOutcome::Skipped(SkipReason::NotRegistered).is_not_available());
        assert!(AttemptOutcome::NotAvailable("no bars".to_string()).is_not_available());
        assert!(!AttemptOutcome::AdapterError("HTTP 503".to_string()).is_not_available());
        assert!(!AttemptOutcome::Success.is_not_available());
    }

    #[test]
    fn test_empty_summary() {
        assert_eq!(FetchDiagnostics::new().summary(), "no eligible sources");
    }

    #[test]
    fn test_serializes_outcomes() {
        let mut diag = FetchDiagnostics::new();
        diag.record_skip(
            SourceId::Bse,
            SkipReason::CapabilityUnsupported {
                operation: "instrument_info".to_string(),
            },
        );
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["attempts"][0]["source"], "bse");
        assert_eq!(json["attempts"][0]["outcome"]["status"], "skipped");
        assert_eq!(
            json["attempts"][0]["outcome"]["detail"]["reason"],
            "capability_unsupported"
        );
    }
}
