//! Operational rule evaluation
//!
//! Fixed thresholds over the recent metrics window. Breaches describe the
//! health of the validation layer itself, not any one symbol, and are routed
//! to the notifier as operational findings.

use chrono::{DateTime, Utc};
use common::{AggregatedMetrics, Severity};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Evaluation window in seconds
    pub window_secs: u64,
    /// Share of failed validations that degrades the service (0.0-1.0)
    pub max_error_rate: f64,
    /// Average confidence below this degrades the service
    pub min_avg_confidence: f64,
    /// Share of validations raising a fatal alert that degrades the
    /// service (0.0-1.0)
    pub max_fatal_rate: f64,
    /// Rules stay quiet until at least this many validations are in the
    /// window; a single early failure is not an outage
    pub min_sample: u64,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            window_secs: 3_600,
            max_error_rate: 0.05,
            min_avg_confidence: 70.0,
            max_fatal_rate: 0.01,
            min_sample: 20,
        }
    }
}

/// Coarse service health derived from rule breaches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// One breached rule, operational rather than per-symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorFinding {
    pub rule: String,
    pub severity: Severity,
    pub value: f64,
    pub threshold: f64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

pub struct RuleEngine {
    config: RuleConfig,
}

impl RuleEngine {
    pub fn new(config: RuleConfig) -> Self {
        Self { config }
    }

    pub fn window(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.config.window_secs)
    }

    /// Evaluate the fixed rule set against one aggregate
    pub fn evaluate(&self, metrics: &AggregatedMetrics) -> Vec<MonitorFinding> {
        if metrics.total_validations < self.config.min_sample {
            return Vec::new();
        }

        let mut findings = Vec::new();
        let now = Utc::now();

        if metrics.error_rate > self.config.max_error_rate {
            findings.push(MonitorFinding {
                rule: "error_rate".into(),
                severity: Severity::Error,
                value: metrics.error_rate,
                threshold: self.config.max_error_rate,
                message: format!(
                    "Validation error rate {:.1}% over the last hour (limit {:.1}%)",
                    metrics.error_rate * 100.0,
                    self.config.max_error_rate * 100.0
                ),
                timestamp: now,
            });
        }

        if metrics.avg_confidence < self.config.min_avg_confidence {
            findings.push(MonitorFinding {
                rule: "avg_confidence".into(),
                severity: Severity::Warning,
                value: metrics.avg_confidence,
                threshold: self.config.min_avg_confidence,
                message: format!(
                    "Average confidence {:.1} below the {:.0} floor",
                    metrics.avg_confidence, self.config.min_avg_confidence
                ),
                timestamp: now,
            });
        }

        if metrics.fatal_rate > self.config.max_fatal_rate {
            findings.push(MonitorFinding {
                rule: "fatal_rate".into(),
                severity: Severity::Error,
                value: metrics.fatal_rate,
                threshold: self.config.max_fatal_rate,
                message: format!(
                    "{:.1}% of validations raised fatal alerts (limit {:.1}%)",
                    metrics.fatal_rate * 100.0,
                    self.config.max_fatal_rate * 100.0
                ),
                timestamp: now,
            });
        }

        for finding in &findings {
            warn!("Monitoring rule breached: {}", finding.message);
        }

        findings
    }

    /// Collapse findings into one health status for dashboards
    pub fn health(&self, metrics: &AggregatedMetrics) -> HealthStatus {
        let findings = self.evaluate(metrics);
        let errors = findings
            .iter()
            .filter(|f| f.severity >= Severity::Error)
            .count();
        if errors >= 2 {
            HealthStatus::Unhealthy
        } else if !findings.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(total: u64, error_rate: f64, avg_confidence: f64, fatal_rate: f64) -> AggregatedMetrics {
        AggregatedMetrics {
            total_validations: total,
            success_rate: 1.0 - error_rate,
            avg_duration_ms: 50.0,
            avg_confidence,
            alert_count: 0,
            fatal_count: 0,
            error_rate,
            fatal_rate,
            window_start: None,
            window_end: None,
        }
    }

    #[test]
    fn quiet_until_minimum_sample() {
        let engine = RuleEngine::new(RuleConfig::default());
        // Terrible numbers, but only 3 validations seen.
        let findings = engine.evaluate(&metrics(3, 1.0, 10.0, 1.0));
        assert!(findings.is_empty());
        assert_eq!(engine.health(&metrics(3, 1.0, 10.0, 1.0)), HealthStatus::Healthy);
    }

    #[test]
    fn healthy_aggregate_breaches_nothing() {
        let engine = RuleEngine::new(RuleConfig::default());
        let findings = engine.evaluate(&metrics(100, 0.01, 85.0, 0.0));
        assert!(findings.is_empty());
    }

    #[test]
    fn each_rule_fires_independently() {
        let engine = RuleEngine::new(RuleConfig::default());

        let findings = engine.evaluate(&metrics(100, 0.10, 85.0, 0.0));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "error_rate");

        let findings = engine.evaluate(&metrics(100, 0.01, 60.0, 0.0));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "avg_confidence");

        let findings = engine.evaluate(&metrics(100, 0.01, 85.0, 0.05));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "fatal_rate");
    }

    #[test]
    fn health_escalates_with_error_findings() {
        let engine = RuleEngine::new(RuleConfig::default());
        assert_eq!(engine.health(&metrics(100, 0.01, 85.0, 0.0)), HealthStatus::Healthy);
        assert_eq!(engine.health(&metrics(100, 0.01, 60.0, 0.0)), HealthStatus::Degraded);
        assert_eq!(engine.health(&metrics(100, 0.10, 60.0, 0.05)), HealthStatus::Unhealthy);
    }
}
