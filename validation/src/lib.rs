//! Veritas validation engine
//!
//! Cross-source validation for aggregated market signals. Given one symbol
//! and a bundle of already-fetched domain data, the engine decides whether
//! the combined picture is internally consistent before it reaches a
//! downstream summarizer. It includes:
//! - Per-domain validators (market price, social sentiment, on-chain flow)
//! - A source-reliability tracker with dynamic trust weighting
//! - A deterministic confidence-score aggregator
//! - An orchestrator that runs applicable validators concurrently under
//!   per-domain timeouts and always returns a best-effort report

pub mod config;
pub mod confidence;
pub mod market;
pub mod onchain;
pub mod orchestrator;
pub mod reliability;
pub mod social;
pub mod validator;

pub use config::{
    MarketValidatorConfig, OnChainValidatorConfig, OrchestratorConfig, SocialValidatorConfig,
    ValidationConfig,
};
pub use confidence::ConfidenceCalculator;
pub use market::MarketValidator;
pub use onchain::{AddressBook, FlowCategory, OnChainValidator};
pub use orchestrator::{ValidationOrchestrator, ValidationOptions};
pub use reliability::{
    InMemoryReliabilityStore, PgReliabilityStore, ReliabilityStore, TrustSnapshot,
    DEFAULT_TRUST_SCORE, MAX_ADJUSTMENT_STEP,
};
pub use social::{KeywordRescorer, SentimentEstimate, SentimentRescorer, SocialValidator};
pub use validator::DomainValidator;

// Re-export the shared model for convenience
pub use common::{
    ConfidenceScoreBreakdown, DataQualitySummary, Discrepancy, Domain, DomainDataset,
    DomainQuality, DomainResult, Severity, ValidationAlert, ValidationError, ValidationReport,
};
