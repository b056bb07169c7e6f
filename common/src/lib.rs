//! Shared types for the Veritas validation pipeline
//!
//! This crate defines the data model exchanged between the validation
//! engine, the monitoring subsystem, and the API surface:
//! - Domain datasets handed in by the upstream collector
//! - Alerts, discrepancies, and quality summaries produced by validators
//! - The confidence breakdown and final validation report
//! - The error taxonomy shared by every layer

pub mod error;
pub mod types;

pub use error::ValidationError;
pub use types::{
    AggregatedMetrics, ConfidenceScoreBreakdown, DataQualitySummary, Discrepancy, Domain,
    DomainDataset, DomainQuality, DomainResult, MarketQuote, NewsItem, OnChainSummary,
    SentimentDistribution, Severity, SocialMetrics, SourceReading, ValidationAlert,
    ValidationMetricsRecord, ValidationReport,
};
