use crate::catalog::{AppId, ControlId, StandardId};
use crate::workflows::remediation::RemediationPlan;
use crate::workflows::scoring::domain::{ControlKey, ControlMapping, MappingUpdate};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Precomputed relevance of one ingested evidence chunk to one control.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkRelevance {
    pub chunk_id: i64,
    /// Relevance score in [0, 100], computed at ingestion time.
    pub relevance_score: f64,
    pub is_active: bool,
}

/// Errors raised by the persistence collaborators.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("mapping for control {0} not found")]
    MappingNotFound(ControlId),
    #[error("no active sources available for application {0}")]
    NoActiveSources(AppId),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),
}

/// Supplies the concatenated extracted text of an application's active
/// evidence sources. Callers truncate to their own character budget before
/// prompting.
#[async_trait]
pub trait SourceCorpusAccessor: Send + Sync {
    async fn fetch(&self, app: AppId) -> Result<String, StoreError>;
}

/// Read side of the ingestion-time relevance index.
#[async_trait]
pub trait RelevanceIndex: Send + Sync {
    async fn active_chunks(
        &self,
        app: AppId,
        control: ControlId,
    ) -> Result<Vec<ChunkRelevance>, StoreError>;
}

/// Transactional access to application/control mapping rows. A `commit`
/// applies every update for the standard or none of them; separate standards
/// are independent units of work.
#[async_trait]
pub trait MappingStore: Send + Sync {
    async fn mappings_for_standard(
        &self,
        app: AppId,
        standard: StandardId,
    ) -> Result<Vec<ControlMapping>, StoreError>;

    async fn commit(
        &self,
        app: AppId,
        standard: StandardId,
        updates: Vec<MappingUpdate>,
    ) -> Result<(), StoreError>;
}

/// Receiver for remediation plans generated after a scoring commit. Kept
/// separate from the mapping store so plan-generation failures cannot touch
/// scoring transactions.
#[async_trait]
pub trait PlanSink: Send + Sync {
    /// Whether a plan was already recorded for this control; used to keep
    /// re-runs idempotent.
    async fn has_plan(&self, key: ControlKey) -> Result<bool, StoreError>;

    async fn record(&self, key: ControlKey, plan: RemediationPlan) -> Result<(), StoreError>;
}
