//! Validation orchestrator
//!
//! Entry point for one validation call: runs the validators for the domains
//! present in the dataset concurrently, each under its own timeout, then
//! aggregates confidence and ships alerts/metrics to the monitoring side
//! channel. Validation is always best-effort: a timed-out or failed domain
//! contributes zero quality, it never fails the call. Only malformed input
//! returns an error to the caller.

use crate::config::ValidationConfig;
use crate::confidence::ConfidenceCalculator;
use crate::market::MarketValidator;
use crate::onchain::OnChainValidator;
use crate::reliability::ReliabilityStore;
use crate::social::{KeywordRescorer, SentimentRescorer, SocialValidator};
use crate::validator::DomainValidator;
use anyhow::Result;
use chrono::Utc;
use common::{
    Domain, DomainDataset, DomainResult, Severity, ValidationAlert, ValidationError,
    ValidationMetricsRecord, ValidationReport,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Per-call options supplied by the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationOptions {
    /// Per-domain budget override in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Restrict validation to these domains; `None` means all present
    #[serde(default)]
    pub enabled_domains: Option<Vec<Domain>>,
}

pub struct ValidationOrchestrator {
    config: ValidationConfig,
    validators: Vec<Arc<dyn DomainValidator>>,
    reliability: Arc<dyn ReliabilityStore>,
    alert_tx: Option<mpsc::Sender<ValidationAlert>>,
    metrics_tx: Option<mpsc::Sender<ValidationMetricsRecord>>,
}

impl ValidationOrchestrator {
    /// Build an orchestrator with the default keyword-based sentiment
    /// rescorer as the secondary social source
    pub fn new(config: ValidationConfig, reliability: Arc<dyn ReliabilityStore>) -> Self {
        Self::with_rescorer(config, reliability, Box::new(KeywordRescorer))
    }

    pub fn with_rescorer(
        config: ValidationConfig,
        reliability: Arc<dyn ReliabilityStore>,
        rescorer: Box<dyn SentimentRescorer>,
    ) -> Self {
        let validators: Vec<Arc<dyn DomainValidator>> = vec![
            Arc::new(MarketValidator::new(config.market.clone(), reliability.clone())),
            Arc::new(SocialValidator::new(config.social.clone(), rescorer)),
            Arc::new(OnChainValidator::new(config.onchain.clone())),
        ];

        Self {
            config,
            validators,
            reliability,
            alert_tx: None,
            metrics_tx: None,
        }
    }

    /// Route a copy of every raised alert to the monitoring subsystem
    pub fn with_alert_sink(mut self, tx: mpsc::Sender<ValidationAlert>) -> Self {
        self.alert_tx = Some(tx);
        self
    }

    /// Record every validation attempt into the metrics ring buffer
    pub fn with_metrics_sink(mut self, tx: mpsc::Sender<ValidationMetricsRecord>) -> Self {
        self.metrics_tx = Some(tx);
        self
    }

    fn domain_enabled(&self, domain: Domain, options: &ValidationOptions) -> bool {
        match &options.enabled_domains {
            Some(enabled) => enabled.contains(&domain),
            None => true,
        }
    }

    /// Validate one symbol's dataset. Never fails for domain-level
    /// problems; `Err` means the request itself was malformed.
    pub async fn validate(
        &self,
        symbol: &str,
        dataset: DomainDataset,
        options: ValidationOptions,
    ) -> Result<ValidationReport, ValidationError> {
        if symbol.trim().is_empty() {
            return Err(ValidationError::InvalidInput("missing symbol".into()));
        }
        if dataset.is_empty() {
            return Err(ValidationError::InvalidInput("empty dataset".into()));
        }

        if !self.config.enabled {
            debug!("Validation layer disabled; passing {} through unvalidated", symbol);
            return Ok(Self::skipped_report(symbol, dataset));
        }

        let started = Instant::now();
        let budget_ms = options.timeout_ms.unwrap_or(self.config.orchestrator.domain_timeout_ms);
        let budget = Duration::from_millis(budget_ms);

        // One immutable trust snapshot per call keeps validators pure in
        // (data, snapshot); a store failure degrades to default weights.
        let trust = match self.reliability.snapshot().await {
            Ok(trust) => Arc::new(trust),
            Err(e) => {
                warn!("Reliability snapshot failed, using defaults: {}", e);
                Arc::new(Default::default())
            }
        };

        let present = dataset.present_domains();
        let dataset = Arc::new(dataset);
        let symbol_owned = symbol.to_string();

        let tasks: Vec<_> = self
            .validators
            .iter()
            .filter(|v| present.contains(&v.domain()) && self.domain_enabled(v.domain(), &options))
            .map(|validator| {
                let validator = validator.clone();
                let dataset = dataset.clone();
                let trust = trust.clone();
                let symbol = symbol_owned.clone();
                let domain = validator.domain();

                let handle = tokio::spawn(async move {
                    let outcome = tokio::time::timeout(
                        budget,
                        validator.validate(&symbol, &dataset, &trust),
                    )
                    .await;

                    match outcome {
                        Ok(Ok(result)) => result,
                        Ok(Err(e)) => {
                            // Internal fault: domain not validated, call
                            // proceeds with zero quality for it.
                            warn!("{} validator failed for {}: {}", domain, symbol, e);
                            DomainResult::skipped(domain)
                        }
                        Err(_) => {
                            warn!(
                                "{} validation for {} timed out after {}ms",
                                domain, symbol, budget_ms
                            );
                            DomainResult::skipped(domain)
                        }
                    }
                });
                (domain, handle)
            })
            .collect();

        let (domains, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
        let mut results = Vec::with_capacity(domains.len());
        for (joined, domain) in join_all(handles).await.into_iter().zip(domains) {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => {
                    // A panicked validator is treated like a timeout.
                    warn!("{} validator task panicked: {}", domain, e);
                    results.push(DomainResult::skipped(domain));
                }
            }
        }

        let (breakdown, quality) = ConfidenceCalculator::calculate(&results);

        let mut usable_data = dataset.as_ref().clone();
        for result in &results {
            if result.discard_data {
                match result.domain {
                    Domain::Market => usable_data.market.clear(),
                    Domain::Social => usable_data.social = None,
                    Domain::OnChain => usable_data.onchain = None,
                    Domain::News => usable_data.news.clear(),
                }
            }
        }

        let alerts: Vec<ValidationAlert> =
            results.iter().flat_map(|r| r.alerts.iter().cloned()).collect();
        let discrepancies = results
            .iter()
            .flat_map(|r| r.discrepancies.iter().cloned())
            .collect();

        let has_fatal = alerts.iter().any(ValidationAlert::is_fatal);
        let is_valid =
            !has_fatal && breakdown.overall >= self.config.orchestrator.min_valid_confidence;

        let duration_ms = started.elapsed().as_millis() as u64;
        self.dispatch_side_effects(&symbol_owned, &alerts, breakdown.overall, duration_ms, is_valid);

        info!(
            "Validated {}: confidence {:.1}, {} alerts, valid={}, {}ms",
            symbol,
            breakdown.overall,
            alerts.len(),
            is_valid,
            duration_ms
        );

        Ok(ValidationReport {
            symbol: symbol_owned,
            is_valid,
            confidence_score: breakdown.overall,
            breakdown,
            alerts,
            discrepancies,
            data_quality: quality,
            usable_data,
            duration_ms,
            validation_skipped: false,
            timestamp: Utc::now(),
        })
    }

    /// Best-effort side channel to monitoring. `try_send` keeps the hot
    /// path from ever blocking on a slow consumer.
    fn dispatch_side_effects(
        &self,
        symbol: &str,
        alerts: &[ValidationAlert],
        confidence: f64,
        duration_ms: u64,
        is_valid: bool,
    ) {
        if let Some(tx) = &self.alert_tx {
            for alert in alerts.iter().filter(|a| a.severity >= Severity::Warning) {
                if tx.try_send(alert.clone()).is_err() {
                    warn!("Alert channel full, dropped {} alert {}", alert.severity, alert.id);
                }
            }
        }

        if let Some(tx) = &self.metrics_tx {
            let record = ValidationMetricsRecord {
                symbol: symbol.to_string(),
                success: is_valid,
                duration_ms,
                confidence,
                alert_count: alerts.len() as u32,
                fatal_count: alerts.iter().filter(|a| a.is_fatal()).count() as u32,
                timestamp: Utc::now(),
            };
            if tx.try_send(record).is_err() {
                warn!("Metrics channel full, dropped record for {}", symbol);
            }
        }
    }

    fn skipped_report(symbol: &str, dataset: DomainDataset) -> ValidationReport {
        ValidationReport {
            symbol: symbol.to_string(),
            is_valid: true,
            confidence_score: 0.0,
            breakdown: common::ConfidenceScoreBreakdown {
                overall: 0.0,
                per_domain: Default::default(),
                penalizing_alerts: Vec::new(),
            },
            alerts: Vec::new(),
            discrepancies: Vec::new(),
            data_quality: Default::default(),
            usable_data: dataset,
            duration_ms: 0,
            validation_skipped: true,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationConfig;
    use crate::reliability::InMemoryReliabilityStore;
    use crate::social::SentimentEstimate;
    use async_trait::async_trait;
    use common::{MarketQuote, OnChainSummary, SentimentDistribution, SocialMetrics};

    fn quote(provider: &str, price: f64) -> MarketQuote {
        MarketQuote {
            provider: provider.to_string(),
            price,
            volume_24h: 1.0e9,
            timestamp: Utc::now(),
        }
    }

    fn social(score: f64, mentions: u64, dist: SentimentDistribution) -> SocialMetrics {
        SocialMetrics {
            provider: "lunarcrush".into(),
            sentiment_score: score,
            mention_count: mentions,
            distribution: dist,
            raw_sample: vec!["bullish rally".into()],
            timestamp: Utc::now(),
        }
    }

    fn onchain(flow_each: f64, volume: f64) -> OnChainSummary {
        OnChainSummary {
            provider: "glassnode".into(),
            exchange_deposits: flow_each,
            exchange_withdrawals: flow_each,
            peer_transfers: flow_each,
            reported_volume: volume,
            window_hours: 24,
        }
    }

    fn clean_dataset() -> DomainDataset {
        DomainDataset {
            market: vec![quote("binance", 90_000.0), quote("coinbase", 90_900.0)],
            social: Some(social(
                70.0,
                1500,
                SentimentDistribution { positive: 60.0, negative: 10.0, neutral: 30.0 },
            )),
            // 20% flow ratio, in band.
            onchain: Some(onchain(2.0e9 / 3.0, 10.0e9)),
            news: Vec::new(),
        }
    }

    fn orchestrator() -> ValidationOrchestrator {
        ValidationOrchestrator::new(
            ValidationConfig::default(),
            Arc::new(InMemoryReliabilityStore::new()),
        )
    }

    struct HangingRescorer;

    #[async_trait]
    impl SentimentRescorer for HangingRescorer {
        async fn rescore(
            &self,
            _symbol: &str,
            _texts: &[String],
        ) -> anyhow::Result<SentimentEstimate> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            unreachable!()
        }
    }

    #[tokio::test]
    async fn clean_multi_domain_dataset_validates() {
        let report = orchestrator()
            .validate("BTC", clean_dataset(), ValidationOptions::default())
            .await
            .unwrap();

        assert!(report.is_valid);
        assert!(report
            .alerts
            .iter()
            .all(|a| a.severity < Severity::Warning));
        assert!(report.confidence_score > 90.0);
        assert!(!report.validation_skipped);
    }

    #[tokio::test]
    async fn missing_symbol_is_the_only_client_error() {
        let err = orchestrator()
            .validate("  ", clean_dataset(), ValidationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn social_impossibility_discards_social_data() {
        let mut dataset = clean_dataset();
        dataset.social = Some(social(
            70.0,
            0,
            SentimentDistribution { positive: 40.0, negative: 10.0, neutral: 50.0 },
        ));

        let report = orchestrator()
            .validate("BTC", dataset, ValidationOptions::default())
            .await
            .unwrap();

        assert!(!report.is_valid);
        assert!(report.alerts.iter().any(ValidationAlert::is_fatal));
        assert_eq!(report.breakdown.per_domain[&Domain::Social], 0.0);
        // Discarded: absent from any downstream-usable output.
        assert!(report.usable_data.social.is_none());
        // Other domains are unaffected by the social fatal.
        assert!(!report.usable_data.market.is_empty());
    }

    #[tokio::test]
    async fn onchain_impossibility_is_fatal_regardless_of_other_domains() {
        let mut dataset = clean_dataset();
        dataset.onchain = Some(onchain(0.0, 25.0e9));

        let report = orchestrator()
            .validate("BTC", dataset, ValidationOptions::default())
            .await
            .unwrap();

        assert!(report
            .alerts
            .iter()
            .any(|a| a.is_fatal() && a.domain == Domain::OnChain));
        assert!(report.usable_data.onchain.is_none());
    }

    #[tokio::test]
    async fn market_only_dataset_scores_missing_domains_zero() {
        let market_only = DomainDataset {
            market: vec![quote("binance", 90_000.0), quote("coinbase", 90_450.0)],
            ..Default::default()
        };

        let partial = orchestrator()
            .validate("BTC", market_only, ValidationOptions::default())
            .await
            .unwrap();
        let full = orchestrator()
            .validate("BTC", clean_dataset(), ValidationOptions::default())
            .await
            .unwrap();

        assert_eq!(partial.data_quality.score(Domain::Social), 0.0);
        assert_eq!(partial.data_quality.score(Domain::OnChain), 0.0);
        assert!(partial.confidence_score < full.confidence_score);
    }

    #[tokio::test]
    async fn identical_input_yields_identical_breakdown() {
        let orchestrator = orchestrator();
        let a = orchestrator
            .validate("BTC", clean_dataset(), ValidationOptions::default())
            .await
            .unwrap();
        let b = orchestrator
            .validate("BTC", clean_dataset(), ValidationOptions::default())
            .await
            .unwrap();

        assert_eq!(a.breakdown.overall, b.breakdown.overall);
        assert_eq!(a.breakdown.per_domain, b.breakdown.per_domain);
    }

    #[tokio::test]
    async fn hung_rescorer_is_bounded_by_the_domain_timeout() {
        let orchestrator = ValidationOrchestrator::with_rescorer(
            ValidationConfig::default(),
            Arc::new(InMemoryReliabilityStore::new()),
            Box::new(HangingRescorer),
        );

        let started = Instant::now();
        let report = orchestrator
            .validate(
                "BTC",
                clean_dataset(),
                ValidationOptions { timeout_ms: Some(100), enabled_domains: None },
            )
            .await
            .unwrap();

        // Returns within the budget plus small overhead, social scored as
        // best-effort rather than thrown.
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(report.data_quality.score(Domain::Social), 0.0);
        assert!(report.alerts.iter().all(|a| a.domain != Domain::Social));
    }

    #[tokio::test]
    async fn enabled_domains_option_restricts_validation() {
        let report = orchestrator()
            .validate(
                "BTC",
                clean_dataset(),
                ValidationOptions {
                    timeout_ms: None,
                    enabled_domains: Some(vec![Domain::Market]),
                },
            )
            .await
            .unwrap();

        assert_eq!(report.data_quality.score(Domain::Social), 0.0);
        assert_eq!(report.data_quality.score(Domain::OnChain), 0.0);
        assert!(report.data_quality.score(Domain::Market) > 0.0);
    }

    #[tokio::test]
    async fn disabled_layer_passes_data_through_untouched() {
        let mut config = ValidationConfig::default();
        config.enabled = false;
        let orchestrator = ValidationOrchestrator::new(
            config,
            Arc::new(InMemoryReliabilityStore::new()),
        );

        let dataset = clean_dataset();
        let report = orchestrator
            .validate("BTC", dataset.clone(), ValidationOptions::default())
            .await
            .unwrap();

        assert!(report.validation_skipped);
        assert!(report.is_valid);
        assert!(report.alerts.is_empty());
        assert_eq!(report.usable_data, dataset);
    }

    #[tokio::test]
    async fn warning_alerts_reach_the_alert_sink() {
        let (tx, mut rx) = mpsc::channel(16);
        let orchestrator = ValidationOrchestrator::new(
            ValidationConfig::default(),
            Arc::new(InMemoryReliabilityStore::new()),
        )
        .with_alert_sink(tx);

        let mut dataset = clean_dataset();
        // 3.3% divergence: warning territory.
        dataset.market = vec![quote("binance", 90_000.0), quote("coinbase", 93_000.0)];

        let report = orchestrator
            .validate("BTC", dataset, ValidationOptions::default())
            .await
            .unwrap();
        assert!(report.alerts.iter().any(|a| a.severity == Severity::Warning));

        let forwarded = rx.recv().await.expect("alert should be forwarded");
        assert_eq!(forwarded.severity, Severity::Warning);
        assert_eq!(forwarded.domain, Domain::Market);
    }
}
