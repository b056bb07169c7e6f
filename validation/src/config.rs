//! Validation engine configuration
//!
//! Every numeric threshold here is a tuning decision, not a protocol
//! invariant, so all of them are plain config with stated defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Top-level configuration for one validation engine instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Deployment-level kill switch. When false, `validate()` echoes the
    /// input back annotated as skipped, with zero behavioral change for
    /// callers.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    pub orchestrator: OrchestratorConfig,
    pub market: MarketValidatorConfig,
    pub social: SocialValidatorConfig,
    pub onchain: OnChainValidatorConfig,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            orchestrator: OrchestratorConfig::default(),
            market: MarketValidatorConfig::default(),
            social: SocialValidatorConfig::default(),
            onchain: OnChainValidatorConfig::default(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Orchestrator-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Per-domain time budget in milliseconds
    pub domain_timeout_ms: u64,
    /// Overall confidence below this marks the report as not valid
    pub min_valid_confidence: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            domain_timeout_ms: 5_000,
            min_valid_confidence: 30.0,
        }
    }
}

/// Market validator thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketValidatorConfig {
    /// Pairwise price divergence (%) between reliable sources that raises
    /// a warning
    pub divergence_warn_pct: f64,
    /// Divergence (%) beyond any realistic cross-exchange spread; raises
    /// an error as an arbitrage impossibility
    pub arbitrage_error_pct: f64,
    /// One exchange reporting more than this share of aggregate 24h volume
    /// is a flagged anomaly (0.0-1.0)
    pub volume_concentration_max: f64,
    /// Quality ceiling when only a single source responded
    pub single_source_quality_cap: f64,
    /// Quality penalty (points) per warning/error alert
    pub alert_penalty: f64,
    /// Trust-score step applied on agreement/disagreement with consensus
    pub reliability_step: f64,
    /// Sources below this trust weight are treated as unreliable and do not
    /// trigger divergence warnings on their own
    pub min_reliable_weight: f64,
}

impl Default for MarketValidatorConfig {
    fn default() -> Self {
        Self {
            divergence_warn_pct: 2.0,
            arbitrage_error_pct: 5.0,
            volume_concentration_max: 0.90,
            single_source_quality_cap: 60.0,
            alert_penalty: 15.0,
            reliability_step: 2.0,
            min_reliable_weight: 0.3,
        }
    }
}

/// Social validator thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialValidatorConfig {
    /// Divergence between the primary score and the independent re-score
    /// (points on the 0-100 scale) that raises a warning
    pub sentiment_mismatch_points: f64,
    /// Tolerance when checking that distribution components sum to <= 100
    pub distribution_sum_tolerance: f64,
    /// Quality penalty (points) per warning/error alert
    pub alert_penalty: f64,
    /// Quality deduction when the secondary rescorer is unavailable
    pub single_source_deduction: f64,
}

impl Default for SocialValidatorConfig {
    fn default() -> Self {
        Self {
            sentiment_mismatch_points: 30.0,
            distribution_sum_tolerance: 1.0,
            alert_penalty: 15.0,
            single_source_deduction: 20.0,
        }
    }
}

/// On-chain validator thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnChainValidatorConfig {
    /// Expected band for flow / reported volume (inclusive)
    pub expected_flow_ratio_min: f64,
    pub expected_flow_ratio_max: f64,
    /// Moderately-out-of-band edges; ratios between these and the expected
    /// band score ~80 instead of 100
    pub moderate_flow_ratio_min: f64,
    pub moderate_flow_ratio_max: f64,
    /// Flow-ratio score below this raises a warning
    pub warn_score_floor: f64,
    /// Reported volume (USD notional) above which zero categorized flow is
    /// a logical impossibility
    pub impossible_volume_floor: f64,
    /// Known exchange-custodied addresses; transfers not matching default
    /// to the peer/cold-wallet bucket
    #[serde(default)]
    pub known_exchange_addresses: HashSet<String>,
}

impl Default for OnChainValidatorConfig {
    fn default() -> Self {
        Self {
            expected_flow_ratio_min: 0.10,
            expected_flow_ratio_max: 0.30,
            moderate_flow_ratio_min: 0.05,
            moderate_flow_ratio_max: 0.50,
            warn_score_floor: 50.0,
            impossible_volume_floor: 20.0e9,
            known_exchange_addresses: HashSet::new(),
        }
    }
}
