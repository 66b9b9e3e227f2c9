//! Source registry module.
//!
//! This module provides orchestration over the source adapters, including:
//! - Country policy: eligible sources and their order per market
//! - The fallback aggregator
//! - Data validation
//! - Per-resolution diagnostics

mod aggregator;
mod diagnostics;
mod policy;
mod validator;

pub use aggregator::{Aggregator, ResolveScope, Sourced};
pub use diagnostics::{AttemptOutcome, FetchDiagnostics, SkipReason, SourceAttempt};
pub use policy::{default_order, eligible_sources};
pub use validator::{QuoteValidator, ValidationIssue, ValidationSeverity, ValidatorConfig};
