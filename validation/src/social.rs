//! Social sentiment validator
//!
//! Cross-checks an aggregated sentiment metric against an independently
//! derived estimate. A nonzero sentiment distribution over zero mentions is
//! a logical contradiction: fatal, confidence 0, dataset discarded. Score
//! mismatch between the two estimates is only a warning, since sentiment is
//! inherently noisier than price.

use crate::config::SocialValidatorConfig;
use crate::reliability::TrustSnapshot;
use crate::validator::DomainValidator;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use common::{
    Discrepancy, Domain, DomainDataset, DomainQuality, DomainResult, Severity, SocialMetrics,
    ValidationAlert,
};
use tracing::{debug, warn};

/// Independently derived sentiment for the same window
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentEstimate {
    pub provider: String,
    /// 0-100, same scale as the primary metric (50 = neutral)
    pub score: f64,
    pub sample_size: usize,
}

/// Secondary sentiment source used for the consistency cross-check.
///
/// This is the one I/O-bound call a social validation may make; the
/// orchestrator bounds it with the per-domain timeout.
#[async_trait]
pub trait SentimentRescorer: Send + Sync {
    async fn rescore(&self, symbol: &str, texts: &[String]) -> Result<SentimentEstimate>;
}

/// Keyword/tone re-scorer over the raw post sample. Cheap, local, and
/// independent of the primary provider's model, which is all the
/// consistency check needs.
pub struct KeywordRescorer;

const POSITIVE_WORDS: &[&str] = &[
    "bullish", "moon", "pump", "rally", "breakout", "surge", "gain", "ath", "buy", "long",
    "strong", "adoption", "upgrade", "partnership",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bearish", "dump", "crash", "rug", "scam", "hack", "exploit", "sell", "short", "fear",
    "liquidation", "lawsuit", "ban", "delist",
];

impl KeywordRescorer {
    fn score_text(text: &str) -> Option<f64> {
        let lower = text.to_lowercase();
        let positives = POSITIVE_WORDS.iter().filter(|w| lower.contains(**w)).count();
        let negatives = NEGATIVE_WORDS.iter().filter(|w| lower.contains(**w)).count();
        let total = positives + negatives;
        if total == 0 {
            return None;
        }
        let tone = (positives as f64 - negatives as f64) / total as f64;
        Some(50.0 + tone * 50.0)
    }
}

#[async_trait]
impl SentimentRescorer for KeywordRescorer {
    async fn rescore(&self, symbol: &str, texts: &[String]) -> Result<SentimentEstimate> {
        let scores: Vec<f64> = texts.iter().filter_map(|t| Self::score_text(t)).collect();
        if scores.is_empty() {
            return Err(anyhow!("no scorable text in sample for {}", symbol));
        }

        let score = scores.iter().sum::<f64>() / scores.len() as f64;
        debug!(
            "Re-scored {} posts for {}: {:.1}",
            scores.len(),
            symbol,
            score
        );

        Ok(SentimentEstimate {
            provider: "keyword-rescorer".to_string(),
            score,
            sample_size: scores.len(),
        })
    }
}

pub struct SocialValidator {
    config: SocialValidatorConfig,
    rescorer: Box<dyn SentimentRescorer>,
}

impl SocialValidator {
    pub fn new(config: SocialValidatorConfig, rescorer: Box<dyn SentimentRescorer>) -> Self {
        Self { config, rescorer }
    }

    fn impossibility(&self, metrics: &SocialMetrics) -> Option<ValidationAlert> {
        if metrics.mention_count == 0 && metrics.distribution.is_nonzero() {
            Some(
                ValidationAlert::new(
                    Severity::Fatal,
                    Domain::Social,
                    format!(
                        "Nonzero sentiment distribution ({:.0}/{:.0}/{:.0}) over zero mentions",
                        metrics.distribution.positive,
                        metrics.distribution.negative,
                        metrics.distribution.neutral
                    ),
                )
                .with_sources(vec![metrics.provider.clone()])
                .with_recommendation("Discard social data for this call and review the provider"),
            )
        } else {
            None
        }
    }

    fn check_distribution_sum(
        &self,
        metrics: &SocialMetrics,
        alerts: &mut Vec<ValidationAlert>,
    ) -> bool {
        let total = metrics.distribution.total();
        if total > 100.0 + self.config.distribution_sum_tolerance {
            alerts.push(
                ValidationAlert::new(
                    Severity::Error,
                    Domain::Social,
                    format!("Sentiment distribution sums to {:.1}%", total),
                )
                .with_sources(vec![metrics.provider.clone()])
                .with_recommendation("Treat the distribution as unreliable"),
            );
            false
        } else {
            true
        }
    }

    async fn check_consistency(
        &self,
        symbol: &str,
        metrics: &SocialMetrics,
        alerts: &mut Vec<ValidationAlert>,
        discrepancies: &mut Vec<Discrepancy>,
    ) -> ConsistencyOutcome {
        if metrics.raw_sample.is_empty() {
            debug!("No raw sample for {}; skipping sentiment cross-check", symbol);
            return ConsistencyOutcome::Unavailable;
        }

        let estimate = match self.rescorer.rescore(symbol, &metrics.raw_sample).await {
            Ok(estimate) => estimate,
            Err(e) => {
                // provider-unavailable: degrade to single-source scoring.
                warn!("Sentiment rescorer unavailable for {}: {}", symbol, e);
                return ConsistencyOutcome::Unavailable;
            }
        };

        let diff = (metrics.sentiment_score - estimate.score).abs();
        if diff > self.config.sentiment_mismatch_points {
            let discrepancy = Discrepancy {
                metric: "sentiment_score".into(),
                source_a: metrics.provider.clone(),
                value_a: metrics.sentiment_score,
                source_b: estimate.provider.clone(),
                value_b: estimate.score,
                delta_pct: diff,
                threshold: self.config.sentiment_mismatch_points,
            };
            discrepancies.push(discrepancy.clone());
            alerts.push(
                ValidationAlert::new(
                    Severity::Warning,
                    Domain::Social,
                    format!(
                        "Sentiment mismatch: {} scored {:.0}, {} scored {:.0}",
                        metrics.provider, metrics.sentiment_score, estimate.provider, estimate.score
                    ),
                )
                .with_sources(vec![metrics.provider.clone(), estimate.provider.clone()])
                .with_recommendation("Keep the data but down-weight sentiment in summaries")
                .with_discrepancy(discrepancy),
            );
            ConsistencyOutcome::Mismatch
        } else {
            ConsistencyOutcome::Consistent
        }
    }
}

enum ConsistencyOutcome {
    Consistent,
    Mismatch,
    /// Rescorer failed or nothing to re-score; single-source degradation
    Unavailable,
}

#[async_trait]
impl DomainValidator for SocialValidator {
    fn domain(&self) -> Domain {
        Domain::Social
    }

    async fn validate(
        &self,
        symbol: &str,
        dataset: &DomainDataset,
        _trust: &TrustSnapshot,
    ) -> Result<DomainResult> {
        let metrics = match &dataset.social {
            Some(metrics) => metrics,
            None => return Ok(DomainResult::skipped(Domain::Social)),
        };

        // Impossibility first: contradictory data is discarded outright and
        // nothing else about it is worth checking.
        if let Some(fatal) = self.impossibility(metrics) {
            warn!("Social impossibility for {}: {}", symbol, fatal.message);
            return Ok(DomainResult {
                domain: Domain::Social,
                quality: DomainQuality::new(0.0, 0, 1),
                alerts: vec![fatal],
                discrepancies: Vec::new(),
                discard_data: true,
            });
        }

        let mut alerts = Vec::new();
        let mut discrepancies = Vec::new();
        let mut checks_passed = 1u32; // the impossibility check
        let mut checks_failed = 0u32;

        if self.check_distribution_sum(metrics, &mut alerts) {
            checks_passed += 1;
        } else {
            checks_failed += 1;
        }

        let mut unavailable_deduction = 0.0;
        match self
            .check_consistency(symbol, metrics, &mut alerts, &mut discrepancies)
            .await
        {
            ConsistencyOutcome::Consistent => checks_passed += 1,
            ConsistencyOutcome::Mismatch => checks_failed += 1,
            ConsistencyOutcome::Unavailable => {
                unavailable_deduction = self.config.single_source_deduction;
            }
        }

        let penalized = alerts
            .iter()
            .filter(|a| a.severity >= Severity::Warning)
            .count() as f64;
        let score =
            (100.0 - penalized * self.config.alert_penalty - unavailable_deduction).max(0.0);

        Ok(DomainResult {
            domain: Domain::Social,
            quality: DomainQuality::new(score, checks_passed, checks_failed),
            alerts,
            discrepancies,
            discard_data: false,
        })
    }
}
