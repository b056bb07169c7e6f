//! Confidence aggregation
//!
//! Folds per-domain validation outputs into one overall confidence score.
//! Alert penalties are already applied at the domain level, so this layer
//! only averages; it never re-penalizes. Domains that were not evaluated
//! contribute an explicit 0 so missing data visibly drags the score down
//! instead of being averaged away.

use common::{
    ConfidenceScoreBreakdown, DataQualitySummary, Domain, DomainQuality, DomainResult, Severity,
};
use std::collections::BTreeMap;

pub struct ConfidenceCalculator;

impl ConfidenceCalculator {
    /// Pure and deterministic: same results always yield the same breakdown.
    pub fn calculate(results: &[DomainResult]) -> (ConfidenceScoreBreakdown, DataQualitySummary) {
        let mut per_domain = BTreeMap::new();
        let mut quality = BTreeMap::new();
        let mut penalizing_alerts = Vec::new();

        for domain in Domain::SCORED {
            let result = results.iter().find(|r| r.domain == domain);
            match result {
                Some(result) => {
                    per_domain.insert(domain, result.quality.score);
                    quality.insert(domain, result.quality);
                    penalizing_alerts.extend(
                        result
                            .alerts
                            .iter()
                            .filter(|a| a.severity >= Severity::Warning)
                            .map(|a| a.id),
                    );
                }
                None => {
                    per_domain.insert(domain, 0.0);
                    quality.insert(domain, DomainQuality::unevaluated());
                }
            }
        }

        let overall =
            per_domain.values().sum::<f64>() / Domain::SCORED.len() as f64;

        (
            ConfidenceScoreBreakdown {
                overall,
                per_domain,
                penalizing_alerts,
            },
            DataQualitySummary { domains: quality },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ValidationAlert;

    fn result(domain: Domain, score: f64) -> DomainResult {
        DomainResult {
            domain,
            quality: DomainQuality::new(score, 2, 0),
            alerts: Vec::new(),
            discrepancies: Vec::new(),
            discard_data: false,
        }
    }

    #[test]
    fn all_domains_clean_averages_to_overall() {
        let results = vec![
            result(Domain::Market, 100.0),
            result(Domain::Social, 100.0),
            result(Domain::OnChain, 100.0),
        ];
        let (breakdown, quality) = ConfidenceCalculator::calculate(&results);
        assert_eq!(breakdown.overall, 100.0);
        assert_eq!(quality.domains.len(), 3);
        assert!(breakdown.penalizing_alerts.is_empty());
    }

    #[test]
    fn missing_domains_contribute_zero_not_average() {
        let results = vec![result(Domain::Market, 90.0)];
        let (breakdown, quality) = ConfidenceCalculator::calculate(&results);

        assert_eq!(breakdown.overall, 30.0);
        assert_eq!(breakdown.per_domain[&Domain::Social], 0.0);
        assert_eq!(breakdown.per_domain[&Domain::OnChain], 0.0);
        // Present with an explicit zero, never absent/"unknown".
        assert_eq!(quality.score(Domain::Social), 0.0);
        assert_eq!(quality.domains[&Domain::Social].checks_passed, 0);
    }

    #[test]
    fn missing_domains_score_strictly_below_full_coverage() {
        let partial = vec![result(Domain::Market, 100.0)];
        let full = vec![
            result(Domain::Market, 100.0),
            result(Domain::Social, 100.0),
            result(Domain::OnChain, 100.0),
        ];
        let (partial_breakdown, _) = ConfidenceCalculator::calculate(&partial);
        let (full_breakdown, _) = ConfidenceCalculator::calculate(&full);
        assert!(partial_breakdown.overall < full_breakdown.overall);
    }

    #[test]
    fn penalizing_alerts_collect_warning_and_above() {
        let mut social = result(Domain::Social, 70.0);
        let warning = ValidationAlert::new(Severity::Warning, Domain::Social, "mismatch");
        let info = ValidationAlert::new(Severity::Info, Domain::Social, "fyi");
        social.alerts = vec![warning.clone(), info];

        let (breakdown, _) = ConfidenceCalculator::calculate(&[social]);
        assert_eq!(breakdown.penalizing_alerts, vec![warning.id]);
    }

    #[test]
    fn calculation_is_deterministic() {
        let results = vec![
            result(Domain::Market, 85.0),
            result(Domain::OnChain, 80.0),
        ];
        let (a, _) = ConfidenceCalculator::calculate(&results);
        let (b, _) = ConfidenceCalculator::calculate(&results);
        assert_eq!(a, b);
    }
}
