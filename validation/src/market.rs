//! Market validator
//!
//! Cross-checks price and volume across independent price sources. Pairwise
//! divergence between reliable sources raises a warning; a gap no real
//! cross-exchange spread could sustain raises an error. Single-source data
//! is usable but untrusted: best-effort output with a capped quality score.

use crate::config::MarketValidatorConfig;
use crate::reliability::{ReliabilityStore, TrustSnapshot};
use crate::validator::DomainValidator;
use anyhow::Result;
use async_trait::async_trait;
use common::{
    Discrepancy, Domain, DomainDataset, DomainQuality, DomainResult, MarketQuote, Severity,
    ValidationAlert,
};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct MarketValidator {
    config: MarketValidatorConfig,
    reliability: Arc<dyn ReliabilityStore>,
}

impl MarketValidator {
    pub fn new(config: MarketValidatorConfig, reliability: Arc<dyn ReliabilityStore>) -> Self {
        Self { config, reliability }
    }

    /// Relative gap between two prices, in percent of the smaller one
    fn divergence_pct(a: f64, b: f64) -> f64 {
        let base = a.min(b);
        if base <= 0.0 {
            return 0.0;
        }
        ((a - b).abs() / base) * 100.0
    }

    /// Trust-weighted consensus price across all quotes
    fn consensus_price(quotes: &[MarketQuote], trust: &TrustSnapshot) -> f64 {
        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for reading in quotes.iter().map(MarketQuote::price_reading) {
            let weight = trust.weight(&reading.provider);
            weighted_sum += reading.value * weight;
            weight_sum += weight;
        }
        if weight_sum > 0.0 {
            weighted_sum / weight_sum
        } else {
            0.0
        }
    }

    fn check_price_divergence(
        &self,
        quotes: &[MarketQuote],
        trust: &TrustSnapshot,
        alerts: &mut Vec<ValidationAlert>,
        discrepancies: &mut Vec<Discrepancy>,
    ) -> bool {
        let mut clean = true;

        for i in 0..quotes.len() {
            for j in (i + 1)..quotes.len() {
                let (a, b) = (&quotes[i], &quotes[j]);
                let delta = Self::divergence_pct(a.price, b.price);

                if delta > self.config.arbitrage_error_pct {
                    // A same-asset gap this wide would be free money; one of
                    // the two feeds is wrong.
                    let discrepancy = Discrepancy {
                        metric: "price".into(),
                        source_a: a.provider.clone(),
                        value_a: a.price,
                        source_b: b.provider.clone(),
                        value_b: b.price,
                        delta_pct: delta,
                        threshold: self.config.arbitrage_error_pct,
                    };
                    discrepancies.push(discrepancy.clone());
                    alerts.push(
                        ValidationAlert::new(
                            Severity::Error,
                            Domain::Market,
                            format!(
                                "Arbitrage-implausible price gap: {} at {:.2} vs {} at {:.2} ({:.2}%)",
                                a.provider, a.price, b.provider, b.price, delta
                            ),
                        )
                        .with_sources(vec![a.provider.clone(), b.provider.clone()])
                        .with_recommendation("Verify both feeds before trusting either price")
                        .with_discrepancy(discrepancy),
                    );
                    clean = false;
                } else if delta > self.config.divergence_warn_pct {
                    let both_reliable = trust.weight(&a.provider)
                        >= self.config.min_reliable_weight
                        && trust.weight(&b.provider) >= self.config.min_reliable_weight;

                    if both_reliable {
                        let discrepancy = Discrepancy {
                            metric: "price".into(),
                            source_a: a.provider.clone(),
                            value_a: a.price,
                            source_b: b.provider.clone(),
                            value_b: b.price,
                            delta_pct: delta,
                            threshold: self.config.divergence_warn_pct,
                        };
                        discrepancies.push(discrepancy.clone());
                        alerts.push(
                            ValidationAlert::new(
                                Severity::Warning,
                                Domain::Market,
                                format!(
                                    "Price divergence {:.2}% between {} and {}",
                                    delta, a.provider, b.provider
                                ),
                            )
                            .with_sources(vec![a.provider.clone(), b.provider.clone()])
                            .with_recommendation("Prefer the consensus-side source for this window")
                            .with_discrepancy(discrepancy),
                        );
                        clean = false;
                    } else {
                        debug!(
                            "Ignoring {:.2}% divergence involving low-trust source ({} / {})",
                            delta, a.provider, b.provider
                        );
                    }
                }
            }
        }

        clean
    }

    fn check_volume_concentration(
        &self,
        quotes: &[MarketQuote],
        alerts: &mut Vec<ValidationAlert>,
    ) -> bool {
        let total: f64 = quotes.iter().map(|q| q.volume_24h).sum();
        if total <= 0.0 {
            return true;
        }

        let mut clean = true;
        for quote in quotes {
            let share = quote.volume_24h / total;
            if share > self.config.volume_concentration_max {
                // Anomalous, not fatal: thin listings legitimately trade
                // mostly on one venue.
                alerts.push(
                    ValidationAlert::new(
                        Severity::Warning,
                        Domain::Market,
                        format!(
                            "{} reports {:.0}% of aggregate 24h volume",
                            quote.provider,
                            share * 100.0
                        ),
                    )
                    .with_sources(vec![quote.provider.clone()])
                    .with_recommendation("Treat aggregate volume as single-venue volume"),
                );
                clean = false;
            }
        }
        clean
    }

    /// Feed agreement/disagreement with the trust-weighted consensus back
    /// into the reliability store. Best-effort: a store failure is logged
    /// and never fails the validation call.
    async fn update_reliability(&self, quotes: &[MarketQuote], trust: &TrustSnapshot) {
        if quotes.len() < 2 {
            return;
        }
        let consensus = Self::consensus_price(quotes, trust);
        if consensus <= 0.0 {
            return;
        }

        for quote in quotes {
            let delta = Self::divergence_pct(quote.price, consensus);
            let result = if delta > self.config.divergence_warn_pct {
                self.reliability
                    .record_disagreement(&quote.provider, self.config.reliability_step)
                    .await
            } else {
                self.reliability
                    .record_agreement(&quote.provider, self.config.reliability_step)
                    .await
            };
            if let Err(e) = result {
                warn!("Failed to update reliability for {}: {}", quote.provider, e);
            }
        }
    }
}

#[async_trait]
impl DomainValidator for MarketValidator {
    fn domain(&self) -> Domain {
        Domain::Market
    }

    async fn validate(
        &self,
        symbol: &str,
        dataset: &DomainDataset,
        trust: &TrustSnapshot,
    ) -> Result<DomainResult> {
        let quotes = &dataset.market;
        if quotes.is_empty() {
            return Ok(DomainResult::skipped(Domain::Market));
        }

        let mut alerts = Vec::new();
        let mut discrepancies = Vec::new();
        let mut checks_passed = 0u32;
        let mut checks_failed = 0u32;

        if quotes.len() == 1 {
            // Usable but untrusted: no cross-check is possible.
            alerts.push(
                ValidationAlert::new(
                    Severity::Info,
                    Domain::Market,
                    format!("Only one price source responded ({})", quotes[0].provider),
                )
                .with_sources(vec![quotes[0].provider.clone()])
                .with_recommendation("Treat price as unconfirmed"),
            );
            return Ok(DomainResult {
                domain: Domain::Market,
                quality: DomainQuality::new(self.config.single_source_quality_cap, 0, 0),
                alerts,
                discrepancies,
                discard_data: false,
            });
        }

        if self.check_price_divergence(quotes, trust, &mut alerts, &mut discrepancies) {
            checks_passed += 1;
        } else {
            checks_failed += 1;
        }

        if self.check_volume_concentration(quotes, &mut alerts) {
            checks_passed += 1;
        } else {
            checks_failed += 1;
        }

        self.update_reliability(quotes, trust).await;

        let penalized = alerts
            .iter()
            .filter(|a| a.severity >= Severity::Warning)
            .count() as f64;
        let score = (100.0 - penalized * self.config.alert_penalty).max(0.0);

        debug!(
            "Market validation for {}: {} sources, {} alerts, score {:.0}",
            symbol,
            quotes.len(),
            alerts.len(),
            score
        );

        Ok(DomainResult {
            domain: Domain::Market,
            quality: DomainQuality::new(score, checks_passed, checks_failed),
            alerts,
            discrepancies,
            discard_data: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reliability::InMemoryReliabilityStore;
    use chrono::Utc;

    fn quote(provider: &str, price: f64, volume: f64) -> MarketQuote {
        MarketQuote {
            provider: provider.to_string(),
            price,
            volume_24h: volume,
            timestamp: Utc::now(),
        }
    }

    fn validator() -> (MarketValidator, Arc<InMemoryReliabilityStore>) {
        let store = Arc::new(InMemoryReliabilityStore::new());
        let validator = MarketValidator::new(MarketValidatorConfig::default(), store.clone());
        (validator, store)
    }

    fn dataset(quotes: Vec<MarketQuote>) -> DomainDataset {
        DomainDataset { market: quotes, ..Default::default() }
    }

    #[tokio::test]
    async fn clean_prices_raise_no_alerts() {
        let (validator, store) = validator();
        // 1.0% divergence, under the 2% default threshold.
        let data = dataset(vec![
            quote("binance", 90_000.0, 1.0e9),
            quote("coinbase", 90_900.0, 0.8e9),
        ]);
        let trust = store.snapshot().await.unwrap();

        let result = validator.validate("BTC", &data, &trust).await.unwrap();
        assert!(result
            .alerts
            .iter()
            .all(|a| a.severity < Severity::Warning));
        assert_eq!(result.quality.score, 100.0);
        assert!(!result.discard_data);
    }

    #[tokio::test]
    async fn divergence_between_reliable_sources_warns() {
        let (validator, store) = validator();
        let data = dataset(vec![
            quote("binance", 90_000.0, 1.0e9),
            quote("coinbase", 93_000.0, 0.8e9),
        ]);
        let trust = store.snapshot().await.unwrap();

        let result = validator.validate("BTC", &data, &trust).await.unwrap();
        let warning = result
            .alerts
            .iter()
            .find(|a| a.severity == Severity::Warning)
            .expect("expected a divergence warning");
        assert!(warning.discrepancy.is_some());
        assert_eq!(result.discrepancies.len(), 1);
        assert!(result.quality.score < 100.0);
    }

    #[tokio::test]
    async fn arbitrage_implausible_gap_is_an_error() {
        let (validator, store) = validator();
        let data = dataset(vec![
            quote("binance", 90_000.0, 1.0e9),
            quote("rogue", 99_000.0, 0.1e9),
        ]);
        let trust = store.snapshot().await.unwrap();

        let result = validator.validate("BTC", &data, &trust).await.unwrap();
        assert!(result.alerts.iter().any(|a| a.severity == Severity::Error));
        // Errors never discard market data; confidence handles the rest.
        assert!(!result.discard_data);
    }

    #[tokio::test]
    async fn single_source_is_best_effort_with_capped_quality() {
        let (validator, store) = validator();
        let data = dataset(vec![quote("binance", 90_000.0, 1.0e9)]);
        let trust = store.snapshot().await.unwrap();

        let result = validator.validate("BTC", &data, &trust).await.unwrap();
        assert_eq!(result.quality.score, 60.0);
        assert!(result.alerts.iter().all(|a| a.severity == Severity::Info));
    }

    #[tokio::test]
    async fn volume_concentration_is_flagged_not_fatal() {
        let (validator, store) = validator();
        let data = dataset(vec![
            quote("megaexchange", 90_000.0, 9.5e9),
            quote("coinbase", 90_100.0, 0.3e9),
        ]);
        let trust = store.snapshot().await.unwrap();

        let result = validator.validate("BTC", &data, &trust).await.unwrap();
        let concentration = result
            .alerts
            .iter()
            .find(|a| a.message.contains("aggregate 24h volume"))
            .expect("expected a concentration warning");
        assert_eq!(concentration.severity, Severity::Warning);
        assert!(!result.discard_data);
    }

    #[tokio::test]
    async fn outlier_source_loses_trust() {
        let (validator, store) = validator();
        let data = dataset(vec![
            quote("binance", 90_000.0, 1.0e9),
            quote("coinbase", 90_050.0, 0.8e9),
            quote("rogue", 94_000.0, 0.1e9),
        ]);
        let trust = store.snapshot().await.unwrap();

        validator.validate("BTC", &data, &trust).await.unwrap();

        let after = store.snapshot().await.unwrap();
        assert!(after.score("rogue") < crate::reliability::DEFAULT_TRUST_SCORE);
        assert!(after.score("binance") > crate::reliability::DEFAULT_TRUST_SCORE);
    }

    #[tokio::test]
    async fn missing_market_data_is_skipped() {
        let (validator, store) = validator();
        let trust = store.snapshot().await.unwrap();
        let result = validator
            .validate("BTC", &DomainDataset::default(), &trust)
            .await
            .unwrap();
        assert_eq!(result.quality.score, 0.0);
        assert!(result.alerts.is_empty());
    }
}
