//! On-chain flow validator
//!
//! Reconciles categorized blockchain flow (exchange deposits, withdrawals,
//! peer transfers) against reported trading volume. Healthy markets move
//! roughly 10-30% of traded volume on-chain; heavy volume with literally
//! zero flow cannot happen and is treated as fatal.

use crate::config::OnChainValidatorConfig;
use crate::reliability::TrustSnapshot;
use crate::validator::DomainValidator;
use anyhow::Result;
use async_trait::async_trait;
use common::{
    Domain, DomainDataset, DomainQuality, DomainResult, OnChainSummary, Severity, ValidationAlert,
};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Bucket a transfer lands in after address categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowCategory {
    ExchangeDeposit,
    ExchangeWithdrawal,
    /// Default for anything not matching a known exchange address
    PeerTransfer,
}

/// Static list of known exchange-custodied addresses.
///
/// Maintained out-of-band; the validator only consults it, never updates it.
#[derive(Debug, Clone, Default)]
pub struct AddressBook {
    exchange_addresses: HashSet<String>,
}

impl AddressBook {
    pub fn new(exchange_addresses: HashSet<String>) -> Self {
        Self { exchange_addresses }
    }

    pub fn is_exchange(&self, address: &str) -> bool {
        self.exchange_addresses.contains(address)
    }

    /// Categorize one transfer by its endpoints. Unknown on both ends
    /// defaults to a peer/cold-wallet transfer.
    pub fn categorize(&self, from: &str, to: &str) -> FlowCategory {
        if self.is_exchange(to) {
            FlowCategory::ExchangeDeposit
        } else if self.is_exchange(from) {
            FlowCategory::ExchangeWithdrawal
        } else {
            FlowCategory::PeerTransfer
        }
    }
}

pub struct OnChainValidator {
    config: OnChainValidatorConfig,
    address_book: AddressBook,
}

impl OnChainValidator {
    pub fn new(config: OnChainValidatorConfig) -> Self {
        let address_book = AddressBook::new(config.known_exchange_addresses.clone());
        Self { config, address_book }
    }

    pub fn address_book(&self) -> &AddressBook {
        &self.address_book
    }

    /// Score the actual flow/volume ratio against the expected band
    fn score_flow_ratio(&self, ratio: f64) -> f64 {
        let c = &self.config;
        if ratio >= c.expected_flow_ratio_min && ratio <= c.expected_flow_ratio_max {
            100.0
        } else if ratio >= c.moderate_flow_ratio_min && ratio <= c.moderate_flow_ratio_max {
            80.0
        } else {
            // Falls off linearly with distance from the moderate band.
            let distance = if ratio < c.moderate_flow_ratio_min {
                (c.moderate_flow_ratio_min - ratio) / c.moderate_flow_ratio_min.max(f64::EPSILON)
            } else {
                (ratio - c.moderate_flow_ratio_max) / c.moderate_flow_ratio_max.max(f64::EPSILON)
            };
            (80.0 - distance * 60.0).clamp(0.0, 79.0)
        }
    }

    fn impossibility(&self, summary: &OnChainSummary) -> Option<ValidationAlert> {
        if summary.reported_volume > self.config.impossible_volume_floor
            && summary.total_flow() == 0.0
        {
            Some(
                ValidationAlert::new(
                    Severity::Fatal,
                    Domain::OnChain,
                    format!(
                        "${:.1}B reported volume with zero categorized on-chain flow",
                        summary.reported_volume / 1.0e9
                    ),
                )
                .with_sources(vec![summary.provider.clone()])
                .with_recommendation(
                    "Discard on-chain data for this call; no trading happens without transfers",
                ),
            )
        } else {
            None
        }
    }
}

#[async_trait]
impl DomainValidator for OnChainValidator {
    fn domain(&self) -> Domain {
        Domain::OnChain
    }

    async fn validate(
        &self,
        symbol: &str,
        dataset: &DomainDataset,
        _trust: &TrustSnapshot,
    ) -> Result<DomainResult> {
        let summary = match &dataset.onchain {
            Some(summary) => summary,
            None => return Ok(DomainResult::skipped(Domain::OnChain)),
        };

        if let Some(fatal) = self.impossibility(summary) {
            warn!("On-chain impossibility for {}: {}", symbol, fatal.message);
            return Ok(DomainResult {
                domain: Domain::OnChain,
                quality: DomainQuality::new(0.0, 0, 1),
                alerts: vec![fatal],
                discrepancies: Vec::new(),
                discard_data: true,
            });
        }

        let mut alerts = Vec::new();
        let mut checks_passed = 1u32; // impossibility check
        let mut checks_failed = 0u32;

        let score = if summary.reported_volume <= 0.0 {
            // Nothing reported to reconcile against; flow alone proves
            // nothing either way.
            debug!("No reported volume for {}; flow ratio not evaluated", symbol);
            alerts.push(
                ValidationAlert::new(
                    Severity::Info,
                    Domain::OnChain,
                    "No reported trading volume for the window",
                )
                .with_sources(vec![summary.provider.clone()]),
            );
            self.config.warn_score_floor
        } else {
            let ratio = summary.total_flow() / summary.reported_volume;
            let score = self.score_flow_ratio(ratio);
            debug!(
                "Flow ratio for {}: {:.3} (deposits {:.0}, withdrawals {:.0}, peer {:.0}) -> {:.0}",
                symbol,
                ratio,
                summary.exchange_deposits,
                summary.exchange_withdrawals,
                summary.peer_transfers,
                score
            );

            if score < self.config.warn_score_floor {
                checks_failed += 1;
                alerts.push(
                    ValidationAlert::new(
                        Severity::Warning,
                        Domain::OnChain,
                        format!(
                            "Flow/volume ratio {:.3} far outside expected {:.2}-{:.2} band",
                            ratio,
                            self.config.expected_flow_ratio_min,
                            self.config.expected_flow_ratio_max
                        ),
                    )
                    .with_sources(vec![summary.provider.clone()])
                    .with_recommendation("Cross-check reported volume against a second source"),
                );
            } else {
                checks_passed += 1;
            }
            score
        };

        Ok(DomainResult {
            domain: Domain::OnChain,
            quality: DomainQuality::new(score, checks_passed, checks_failed),
            alerts,
            discrepancies: Vec::new(),
            discard_data: false,
        })
    }
}
