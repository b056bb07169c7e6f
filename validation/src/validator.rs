//! Common contract for domain validators

use crate::reliability::TrustSnapshot;
use common::{Domain, DomainDataset, DomainResult};
use anyhow::Result;
use async_trait::async_trait;

/// One validator per domain, invoked uniformly by the orchestrator.
///
/// Implementations must be pure functions of `(dataset, trust)` apart from
/// at most one secondary cross-check call; reliability adjustments are
/// returned to the orchestrator via the store, not applied mid-call.
#[async_trait]
pub trait DomainValidator: Send + Sync {
    fn domain(&self) -> Domain;

    /// Validate the applicable slice of the dataset. Returning `Err` is
    /// reserved for internal faults; the orchestrator maps those to a
    /// skipped domain, never to a failed call.
    async fn validate(
        &self,
        symbol: &str,
        dataset: &DomainDataset,
        trust: &TrustSnapshot,
    ) -> Result<DomainResult>;
}
