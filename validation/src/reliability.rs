//! Source reliability tracking
//!
//! Maintains a per-provider trust score in [0, 100], adjusted by historical
//! agreement/disagreement with consensus. Adjustments are bounded to ±10
//! points per update so a single bad sample never swings a provider's
//! standing. No provider is ever blacklisted here; reliability only shifts
//! influence in divergence calculations.

use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::postgres::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Score assigned to a provider never seen before
pub const DEFAULT_TRUST_SCORE: f64 = 50.0;

/// Largest single-update adjustment, in points
pub const MAX_ADJUSTMENT_STEP: f64 = 10.0;

/// Weight floor so no source is zeroed out of divergence math entirely
const MIN_WEIGHT: f64 = 0.1;

/// Immutable per-call copy of trust scores.
///
/// Validators are pure functions of `(data, snapshot)`; they read weights
/// from here and queue adjustments back through the store after the fact.
#[derive(Debug, Clone, Default)]
pub struct TrustSnapshot {
    scores: HashMap<String, f64>,
}

impl TrustSnapshot {
    pub fn from_scores(scores: HashMap<String, f64>) -> Self {
        Self { scores }
    }

    pub fn score(&self, provider: &str) -> f64 {
        self.scores.get(provider).copied().unwrap_or(DEFAULT_TRUST_SCORE)
    }

    /// Normalized weight in [MIN_WEIGHT, 1.0]
    pub fn weight(&self, provider: &str) -> f64 {
        (self.score(provider) / 100.0).max(MIN_WEIGHT)
    }
}

/// Persisted per-provider trust scores
#[async_trait]
pub trait ReliabilityStore: Send + Sync {
    /// Bump a provider's score after it agreed with consensus
    async fn record_agreement(&self, provider: &str, delta: f64) -> Result<()>;

    /// Reduce a provider's score after it disagreed with consensus
    async fn record_disagreement(&self, provider: &str, delta: f64) -> Result<()>;

    /// Normalized weight in [MIN_WEIGHT, 1.0] for divergence math
    async fn weight(&self, provider: &str) -> Result<f64>;

    /// Point-in-time copy of all scores for one validation call
    async fn snapshot(&self) -> Result<TrustSnapshot>;
}

fn clamp_step(delta: f64) -> f64 {
    delta.abs().min(MAX_ADJUSTMENT_STEP)
}

/// In-memory store backed by a concurrent map. Used in tests and in
/// deployments without a database; scores live for the process lifetime.
#[derive(Default)]
pub struct InMemoryReliabilityStore {
    scores: DashMap<String, f64>,
}

impl InMemoryReliabilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a provider score, clamped into range. Test/bootstrap helper.
    pub fn seed(&self, provider: &str, score: f64) {
        self.scores.insert(provider.to_string(), score.clamp(0.0, 100.0));
    }

    fn adjust(&self, provider: &str, delta: f64) {
        let step = clamp_step(delta) * delta.signum();
        let mut entry = self
            .scores
            .entry(provider.to_string())
            .or_insert(DEFAULT_TRUST_SCORE);
        *entry = (*entry + step).clamp(0.0, 100.0);
        debug!("Adjusted trust for {}: {:+.1} -> {:.1}", provider, step, *entry);
    }
}

#[async_trait]
impl ReliabilityStore for InMemoryReliabilityStore {
    async fn record_agreement(&self, provider: &str, delta: f64) -> Result<()> {
        self.adjust(provider, delta.abs());
        Ok(())
    }

    async fn record_disagreement(&self, provider: &str, delta: f64) -> Result<()> {
        self.adjust(provider, -delta.abs());
        Ok(())
    }

    async fn weight(&self, provider: &str) -> Result<f64> {
        let score = self
            .scores
            .get(provider)
            .map(|s| *s)
            .unwrap_or(DEFAULT_TRUST_SCORE);
        Ok((score / 100.0).max(MIN_WEIGHT))
    }

    async fn snapshot(&self) -> Result<TrustSnapshot> {
        let scores = self
            .scores
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        Ok(TrustSnapshot::from_scores(scores))
    }
}

/// Postgres-backed store. One row per provider; updates apply the bounded
/// step inside the statement, so rare concurrent writes lose at most one
/// small increment — tolerable for a soft signal.
pub struct PgReliabilityStore {
    db_pool: Arc<PgPool>,
}

impl PgReliabilityStore {
    pub fn new(db_pool: Arc<PgPool>) -> Self {
        Self { db_pool }
    }

    /// Initialize reliability tables
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS source_reliability (
                provider TEXT PRIMARY KEY,
                score NUMERIC(5, 2) NOT NULL DEFAULT 50.0,
                updates BIGINT NOT NULL DEFAULT 0,
                updated_at TIMESTAMPTZ DEFAULT NOW()
            );
            "#,
        )
        .execute(self.db_pool.as_ref())
        .await
        .context("Failed to create source reliability table")?;

        info!("Source reliability table initialized");
        Ok(())
    }

    async fn adjust(&self, provider: &str, step: f64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO source_reliability (provider, score, updates, updated_at)
            VALUES ($1, LEAST(GREATEST($2 + $3, 0), 100), 1, NOW())
            ON CONFLICT (provider) DO UPDATE SET
                score = LEAST(GREATEST(source_reliability.score + $3, 0), 100),
                updates = source_reliability.updates + 1,
                updated_at = NOW()
            "#,
        )
        .bind(provider)
        .bind(DEFAULT_TRUST_SCORE)
        .bind(step)
        .execute(self.db_pool.as_ref())
        .await
        .context("Failed to adjust reliability score")?;

        Ok(())
    }
}

#[async_trait]
impl ReliabilityStore for PgReliabilityStore {
    async fn record_agreement(&self, provider: &str, delta: f64) -> Result<()> {
        self.adjust(provider, clamp_step(delta)).await
    }

    async fn record_disagreement(&self, provider: &str, delta: f64) -> Result<()> {
        self.adjust(provider, -clamp_step(delta)).await
    }

    async fn weight(&self, provider: &str) -> Result<f64> {
        let score: Option<(f64,)> =
            sqlx::query_as("SELECT score::FLOAT8 FROM source_reliability WHERE provider = $1")
                .bind(provider)
                .fetch_optional(self.db_pool.as_ref())
                .await
                .context("Failed to fetch reliability score")?;

        let score = score.map(|(s,)| s).unwrap_or(DEFAULT_TRUST_SCORE);
        Ok((score / 100.0).max(MIN_WEIGHT))
    }

    async fn snapshot(&self) -> Result<TrustSnapshot> {
        let rows: Vec<(String, f64)> =
            sqlx::query_as("SELECT provider, score::FLOAT8 FROM source_reliability")
                .fetch_all(self.db_pool.as_ref())
                .await
                .context("Failed to snapshot reliability scores")?;

        Ok(TrustSnapshot::from_scores(rows.into_iter().collect()))
    }
}
