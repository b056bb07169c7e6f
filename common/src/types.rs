//! Core data model for cross-source validation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One category of validated data
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Market,
    Social,
    OnChain,
    News,
}

impl Domain {
    /// The domains the engine actually scores. News items are carried
    /// through to the summarizer but never validated.
    pub const SCORED: [Domain; 3] = [Domain::Market, Domain::Social, Domain::OnChain];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Market => "market",
            Domain::Social => "social",
            Domain::OnChain => "onchain",
            Domain::News => "news",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity, ordered from least to most severe
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// One provider's value for a single metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReading {
    pub provider: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// A price/volume quote from one market data provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub provider: String,
    pub price: f64,
    /// 24h traded volume in USD notional reported by this provider
    pub volume_24h: f64,
    pub timestamp: DateTime<Utc>,
}

impl MarketQuote {
    /// The price leg of this quote as a generic per-provider reading.
    pub fn price_reading(&self) -> SourceReading {
        SourceReading {
            provider: self.provider.clone(),
            value: self.price,
            timestamp: self.timestamp,
        }
    }
}

/// Positive/negative/neutral share of mentions, each 0-100
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SentimentDistribution {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
}

impl SentimentDistribution {
    pub fn total(&self) -> f64 {
        self.positive + self.negative + self.neutral
    }

    pub fn is_nonzero(&self) -> bool {
        self.positive > 0.0 || self.negative > 0.0 || self.neutral > 0.0
    }
}

/// Aggregated social sentiment from the primary provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialMetrics {
    pub provider: String,
    /// Aggregate sentiment on a 0-100 scale (50 = neutral)
    pub sentiment_score: f64,
    pub mention_count: u64,
    pub distribution: SentimentDistribution,
    /// Sample of raw post text, used for independent re-scoring
    #[serde(default)]
    pub raw_sample: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Categorized on-chain transaction flow for one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnChainSummary {
    pub provider: String,
    /// USD notional moved into known exchange-custodied addresses
    pub exchange_deposits: f64,
    /// USD notional moved out of known exchange-custodied addresses
    pub exchange_withdrawals: f64,
    /// Transfers not matching any known exchange address
    pub peer_transfers: f64,
    /// Trading volume reported for the same window, USD notional
    pub reported_volume: f64,
    pub window_hours: u32,
}

impl OnChainSummary {
    pub fn total_flow(&self) -> f64 {
        self.exchange_deposits + self.exchange_withdrawals + self.peer_transfers
    }
}

/// A news item carried through to the summarizer, unvalidated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub source: String,
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
}

/// One bundle of already-collected data for a symbol.
///
/// Assembled by the upstream collector; immutable input to a single
/// validation call. Missing domains are skipped, not errored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainDataset {
    #[serde(default)]
    pub market: Vec<MarketQuote>,
    #[serde(default)]
    pub social: Option<SocialMetrics>,
    #[serde(default)]
    pub onchain: Option<OnChainSummary>,
    #[serde(default)]
    pub news: Vec<NewsItem>,
}

impl DomainDataset {
    pub fn is_empty(&self) -> bool {
        self.market.is_empty() && self.social.is_none() && self.onchain.is_none()
            && self.news.is_empty()
    }

    /// Scored domains actually present in this bundle
    pub fn present_domains(&self) -> Vec<Domain> {
        let mut domains = Vec::new();
        if !self.market.is_empty() {
            domains.push(Domain::Market);
        }
        if self.social.is_some() {
            domains.push(Domain::Social);
        }
        if self.onchain.is_some() {
            domains.push(Domain::OnChain);
        }
        domains
    }
}

/// A specific numeric mismatch between two sources, attached to an
/// alert for traceability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub metric: String,
    pub source_a: String,
    pub value_a: f64,
    pub source_b: String,
    pub value_b: f64,
    /// Relative delta in percent of the smaller value
    pub delta_pct: f64,
    /// The configured threshold that was exceeded
    pub threshold: f64,
}

/// An alert raised by a validator during one validation call.
///
/// Fatal alerts are immutable once emitted: downstream consumers clone
/// them, never rewrite them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationAlert {
    pub id: Uuid,
    pub severity: Severity,
    pub domain: Domain,
    pub message: String,
    pub affected_sources: Vec<String>,
    pub recommendation: String,
    #[serde(default)]
    pub discrepancy: Option<Discrepancy>,
    pub timestamp: DateTime<Utc>,
}

impl ValidationAlert {
    pub fn new(severity: Severity, domain: Domain, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            severity,
            domain,
            message: message.into(),
            affected_sources: Vec::new(),
            recommendation: String::new(),
            discrepancy: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.affected_sources = sources;
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = recommendation.into();
        self
    }

    pub fn with_discrepancy(mut self, discrepancy: Discrepancy) -> Self {
        self.discrepancy = Some(discrepancy);
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

/// Per-domain quality score plus check counts
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DomainQuality {
    /// 0-100; explicitly 0 for domains not evaluated
    pub score: f64,
    pub checks_passed: u32,
    pub checks_failed: u32,
}

impl DomainQuality {
    pub fn new(score: f64, checks_passed: u32, checks_failed: u32) -> Self {
        Self { score: score.clamp(0.0, 100.0), checks_passed, checks_failed }
    }

    /// Zero score means an unevaluated or discarded domain, not "unknown",
    /// so downstream averaging is never biased upward.
    pub fn unevaluated() -> Self {
        Self::default()
    }
}

/// Per-domain quality for one validation call, keyed by scored domain
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataQualitySummary {
    pub domains: BTreeMap<Domain, DomainQuality>,
}

impl DataQualitySummary {
    pub fn score(&self, domain: Domain) -> f64 {
        self.domains.get(&domain).map(|q| q.score).unwrap_or(0.0)
    }
}

/// Output of one domain validator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainResult {
    pub domain: Domain,
    pub quality: DomainQuality,
    pub alerts: Vec<ValidationAlert>,
    pub discrepancies: Vec<Discrepancy>,
    /// True when an impossibility forces the domain data out of any
    /// downstream-usable output
    pub discard_data: bool,
}

impl DomainResult {
    pub fn skipped(domain: Domain) -> Self {
        Self {
            domain,
            quality: DomainQuality::unevaluated(),
            alerts: Vec::new(),
            discrepancies: Vec::new(),
            discard_data: false,
        }
    }

    pub fn has_fatal(&self) -> bool {
        self.alerts.iter().any(ValidationAlert::is_fatal)
    }
}

/// Overall confidence plus per-domain sub-scores; created once per
/// validation call and never mutated afterwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScoreBreakdown {
    /// 0-100 aggregate over all scored domains
    pub overall: f64,
    pub per_domain: BTreeMap<Domain, f64>,
    /// IDs of the alerts that reduced the score
    pub penalizing_alerts: Vec<Uuid>,
}

/// The structured report returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub symbol: String,
    pub is_valid: bool,
    pub confidence_score: f64,
    pub breakdown: ConfidenceScoreBreakdown,
    pub alerts: Vec<ValidationAlert>,
    pub discrepancies: Vec<Discrepancy>,
    pub data_quality: DataQualitySummary,
    /// The input data minus any discarded domains; what downstream
    /// consumers are allowed to use
    pub usable_data: DomainDataset,
    pub duration_ms: u64,
    /// Set when the validation layer is disabled at deployment level
    #[serde(default)]
    pub validation_skipped: bool,
    pub timestamp: DateTime<Utc>,
}

/// One validation attempt as seen by the monitoring subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetricsRecord {
    pub symbol: String,
    pub success: bool,
    pub duration_ms: u64,
    pub confidence: f64,
    pub alert_count: u32,
    pub fatal_count: u32,
    pub timestamp: DateTime<Utc>,
}

/// Time-windowed counters computed from the metrics ring buffer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    pub total_validations: u64,
    pub success_rate: f64,
    pub avg_duration_ms: f64,
    pub avg_confidence: f64,
    pub alert_count: u64,
    pub fatal_count: u64,
    /// Share of validations that failed outright, 0.0-1.0
    pub error_rate: f64,
    /// Share of validations that raised at least one fatal alert, 0.0-1.0
    pub fatal_rate: f64,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn present_domains_reflects_dataset_shape() {
        let mut dataset = DomainDataset::default();
        assert!(dataset.present_domains().is_empty());
        assert!(dataset.is_empty());

        dataset.market.push(MarketQuote {
            provider: "binance".into(),
            price: 90_000.0,
            volume_24h: 1.0e9,
            timestamp: Utc::now(),
        });
        assert_eq!(dataset.present_domains(), vec![Domain::Market]);
    }

    #[test]
    fn quality_score_is_clamped() {
        assert_eq!(DomainQuality::new(140.0, 1, 0).score, 100.0);
        assert_eq!(DomainQuality::new(-5.0, 0, 1).score, 0.0);
    }

    #[test]
    fn severity_orders_by_escalation() {
        assert!(Severity::Fatal > Severity::Error);
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn distribution_nonzero_detection() {
        let zero = SentimentDistribution::default();
        assert!(!zero.is_nonzero());

        let skewed = SentimentDistribution { positive: 40.0, negative: 10.0, neutral: 50.0 };
        assert!(skewed.is_nonzero());
        assert!((skewed.total() - 100.0).abs() < f64::EPSILON);
    }
}
