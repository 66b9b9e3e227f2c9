/// Classification of a [`MarketDataError`](super::MarketDataError).
///
/// Used to determine how the aggregator should respond to an error.
///
/// # Behavior Summary
///
/// | Class | Surfaced to caller? | Try next source? | Log level |
/// |-------|--------------------|------------------|-----------|
/// | `Configuration` | Yes, at construction | - | - |
/// | `Validation` | Yes, per call | - | - |
/// | `NotAvailable` | No | Yes | debug |
/// | `AdapterError` | No | Yes | warn |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureClass {
    /// Invalid market or source at construction time.
    Configuration,

    /// Malformed symbol or date arguments for a single call.
    Validation,

    /// The source ran but found no data (unknown symbol, empty payload,
    /// unsupported capability, missing credential).
    NotAvailable,

    /// Transport or parse fault inside one source, including timeouts,
    /// rate limiting and rejected data.
    AdapterError,
}

impl FailureClass {
    /// Whether errors of this class end the request instead of falling through.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Configuration | Self::Validation)
    }
}
