//! Compliance scoring: deterministic instant scoring plus the model-assisted
//! refinement pipeline with its validation boundary.

pub mod domain;
pub mod instant;
pub mod orchestrator;
pub mod prompts;
pub mod store;
pub mod suggestions;
pub mod validator;

pub use domain::{
    ControlAnalysis, ControlKey, ControlMapping, ImplementationStatus, MappingUpdate,
    Recommendation, RecommendationPriority,
};
pub use instant::{InstantScorer, NO_CHUNKS_EXPLANATION};
pub use orchestrator::{BatchOrchestrator, RemediationRequest, ScoringLimits};
pub use store::{
    ChunkRelevance, MappingStore, PlanSink, RelevanceIndex, SourceCorpusAccessor, StoreError,
};
pub use suggestions::{
    EvidenceKind, EvidencePriority, EvidenceSuggestion, EvidenceSuggestionEngine,
};
pub use validator::{
    CorrectedAnalysis, OutputValidator, RawControlAnalysis, RawRecommendation, Severity,
    ValidationOutcome,
};

use crate::catalog::{AppId, CatalogError};
use crate::workflows::remediation::PlanError;

/// Caller-visible failures of the scoring entry points. Per-control and
/// per-model failures are absorbed inside the pipeline; only catalog-level
/// misconfiguration or a store outage surfaces here.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("no standards supplied for application {0}")]
    NoStandards(AppId),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Plan(#[from] PlanError),
}
