//! Durable review workflow for fatal alerts
//!
//! Fatal alerts require a human decision, so they outlive the process:
//! each is persisted as a pending-review record and moves to the terminal
//! reviewed state from a dashboard (out of scope here). Persistence is
//! best-effort from the notifier's point of view; it never blocks the
//! validation path.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::ValidationAlert;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewStatus {
    PendingReview,
    /// Terminal state
    Reviewed,
}

impl ReviewStatus {
    fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::PendingReview => "pending-review",
            ReviewStatus::Reviewed => "reviewed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: Uuid,
    /// The fatal alert exactly as emitted; never rewritten
    pub alert: ValidationAlert,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait FatalAlertStore: Send + Sync {
    async fn persist(&self, alert: &ValidationAlert) -> Result<()>;
    async fn pending(&self) -> Result<Vec<ReviewRecord>>;
    async fn mark_reviewed(&self, alert_id: Uuid) -> Result<()>;
}

/// In-memory store for tests and database-less deployments
#[derive(Default)]
pub struct InMemoryFatalAlertStore {
    records: RwLock<Vec<ReviewRecord>>,
}

impl InMemoryFatalAlertStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FatalAlertStore for InMemoryFatalAlertStore {
    async fn persist(&self, alert: &ValidationAlert) -> Result<()> {
        self.records.write().await.push(ReviewRecord {
            id: alert.id,
            alert: alert.clone(),
            status: ReviewStatus::PendingReview,
            created_at: Utc::now(),
            reviewed_at: None,
        });
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<ReviewRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.status == ReviewStatus::PendingReview)
            .cloned()
            .collect())
    }

    async fn mark_reviewed(&self, alert_id: Uuid) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == alert_id && r.status == ReviewStatus::PendingReview)
            .ok_or_else(|| anyhow!("no pending review for alert {}", alert_id))?;
        record.status = ReviewStatus::Reviewed;
        record.reviewed_at = Some(Utc::now());
        Ok(())
    }
}

/// Postgres-backed store; the alert payload is stored as JSON so the
/// review dashboard sees it verbatim
pub struct PgFatalAlertStore {
    db_pool: Arc<PgPool>,
}

impl PgFatalAlertStore {
    pub fn new(db_pool: Arc<PgPool>) -> Self {
        Self { db_pool }
    }

    /// Initialize review tables
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fatal_alert_reviews (
                id UUID PRIMARY KEY,
                alert JSONB NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending-review',
                created_at TIMESTAMPTZ DEFAULT NOW(),
                reviewed_at TIMESTAMPTZ
            );

            CREATE INDEX IF NOT EXISTS idx_fatal_reviews_status ON fatal_alert_reviews(status);
            CREATE INDEX IF NOT EXISTS idx_fatal_reviews_time ON fatal_alert_reviews(created_at);
            "#,
        )
        .execute(self.db_pool.as_ref())
        .await
        .context("Failed to create fatal alert review table")?;

        info!("Fatal alert review table initialized");
        Ok(())
    }
}

#[async_trait]
impl FatalAlertStore for PgFatalAlertStore {
    async fn persist(&self, alert: &ValidationAlert) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fatal_alert_reviews (id, alert, status)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(alert.id)
        .bind(serde_json::to_value(alert).context("Failed to serialize alert")?)
        .bind(ReviewStatus::PendingReview.as_str())
        .execute(self.db_pool.as_ref())
        .await
        .context("Failed to persist fatal alert")?;

        Ok(())
    }

    async fn pending(&self) -> Result<Vec<ReviewRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, alert, created_at, reviewed_at
            FROM fatal_alert_reviews
            WHERE status = 'pending-review'
            ORDER BY created_at
            "#,
        )
        .fetch_all(self.db_pool.as_ref())
        .await
        .context("Failed to fetch pending reviews")?;

        rows.into_iter()
            .map(|row| {
                let alert: serde_json::Value = row.try_get("alert")?;
                Ok(ReviewRecord {
                    id: row.try_get("id")?,
                    alert: serde_json::from_value(alert)
                        .context("Stored alert payload was not deserializable")?,
                    status: ReviewStatus::PendingReview,
                    created_at: row.try_get("created_at")?,
                    reviewed_at: row.try_get("reviewed_at")?,
                })
            })
            .collect()
    }

    async fn mark_reviewed(&self, alert_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE fatal_alert_reviews
            SET status = 'reviewed', reviewed_at = NOW()
            WHERE id = $1 AND status = 'pending-review'
            "#,
        )
        .bind(alert_id)
        .execute(self.db_pool.as_ref())
        .await
        .context("Failed to mark alert reviewed")?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("no pending review for alert {}", alert_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Domain, Severity};

    fn fatal_alert() -> ValidationAlert {
        ValidationAlert::new(
            Severity::Fatal,
            Domain::OnChain,
            "$25.0B reported volume with zero categorized on-chain flow",
        )
    }

    #[tokio::test]
    async fn persisted_alert_is_pending_until_reviewed() {
        let store = InMemoryFatalAlertStore::new();
        let alert = fatal_alert();
        store.persist(&alert).await.unwrap();

        let pending = store.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, ReviewStatus::PendingReview);
        assert!(pending[0].reviewed_at.is_none());

        store.mark_reviewed(alert.id).await.unwrap();
        assert!(store.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reviewed_is_terminal() {
        let store = InMemoryFatalAlertStore::new();
        let alert = fatal_alert();
        store.persist(&alert).await.unwrap();
        store.mark_reviewed(alert.id).await.unwrap();

        // A second review of the same alert is a caller bug.
        assert!(store.mark_reviewed(alert.id).await.is_err());
    }

    #[tokio::test]
    async fn unknown_alert_cannot_be_reviewed() {
        let store = InMemoryFatalAlertStore::new();
        assert!(store.mark_reviewed(Uuid::new_v4()).await.is_err());
    }
}
