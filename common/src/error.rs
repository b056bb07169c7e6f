//! Error taxonomy shared across the validation pipeline
//!
//! Propagation policy: only `Impossibility` may zero a domain's confidence
//! and discard its data. Everything else degrades gracefully and the
//! top-level call still returns a usable, lower-confidence result.
//! `InvalidInput` is the one variant surfaced to the caller as an error.

use crate::types::Domain;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    /// A domain check exceeded its time budget; the domain is skipped.
    #[error("{domain} validation timed out after {budget_ms}ms")]
    Timeout { domain: Domain, budget_ms: u64 },

    /// A secondary cross-check source failed; degrade to single-source
    /// scoring for the affected domain.
    #[error("secondary provider {provider} unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    /// Logically contradictory data. Fatal: the domain's data is discarded.
    #[error("impossible {domain} data: {detail}")]
    Impossibility { domain: Domain, detail: String },

    /// Divergent but plausible data. Warning-level; data is retained.
    #[error("inconsistent {domain} data: {detail}")]
    Inconsistency { domain: Domain, detail: String },

    /// Alert delivery failed. Retried by the notifier, never surfaced
    /// to the validation caller.
    #[error("notification delivery failed: {0}")]
    NotificationFailure(String),

    /// Malformed request, e.g. a missing symbol. The only client error.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ValidationError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ValidationError::Impossibility { .. })
    }
}
