use crate::catalog::{AppId, StandardId};
use crate::workflows::scoring::domain::{ControlAnalysis, MappingUpdate};
use crate::workflows::scoring::store::{ChunkRelevance, MappingStore, RelevanceIndex, StoreError};
use crate::workflows::scoring::ScoringError;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

/// Fixed explanation for controls with no relevance-indexed evidence.
pub const NO_CHUNKS_EXPLANATION: &str = "No source chunks found for this control.";

/// Mean relevance over the chunks that actually count: active, score above
/// zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RelevanceSummary {
    pub count: usize,
    pub mean: f64,
}

pub(crate) fn summarize_relevance(chunks: &[ChunkRelevance]) -> Option<RelevanceSummary> {
    let scores: Vec<f64> = chunks
        .iter()
        .filter(|chunk| chunk.is_active && chunk.relevance_score > 0.0)
        .map(|chunk| chunk.relevance_score)
        .collect();
    if scores.is_empty() {
        return None;
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    Some(RelevanceSummary {
        count: scores.len(),
        mean,
    })
}

pub(crate) fn percentage_from_mean(mean: f64) -> u8 {
    mean.round().clamp(0.0, 100.0) as u8
}

/// Deterministic completion percentages from the precomputed relevance index.
/// No model calls; one read/aggregate/write transaction per standard, and
/// independent standards run fully in parallel.
pub struct InstantScorer<R, S> {
    relevance: Arc<R>,
    store: Arc<S>,
}

impl<R, S> InstantScorer<R, S>
where
    R: RelevanceIndex + 'static,
    S: MappingStore + 'static,
{
    pub fn new(relevance: Arc<R>, store: Arc<S>) -> Self {
        Self { relevance, store }
    }

    /// Recomputes every control's percentage for the given standards.
    /// Idempotent and safe to re-invoke; a failing standard never rolls back
    /// or blocks its siblings.
    pub async fn compute_instant_scores(
        &self,
        app: AppId,
        standards: &[StandardId],
    ) -> Result<(), ScoringError> {
        if standards.is_empty() {
            return Err(ScoringError::NoStandards(app));
        }

        let outcomes = join_all(
            standards
                .iter()
                .map(|&standard| self.score_standard(app, standard)),
        )
        .await;

        for (&standard, outcome) in standards.iter().zip(outcomes) {
            match outcome {
                Ok(updated) => {
                    info!(%app, %standard, updated, "instant scoring committed");
                }
                Err(err) => {
                    warn!(%app, %standard, "instant scoring failed for standard: {err}");
                }
            }
        }

        Ok(())
    }

    async fn score_standard(&self, app: AppId, standard: StandardId) -> Result<usize, StoreError> {
        let mappings = self.store.mappings_for_standard(app, standard).await?;
        let mut updates = Vec::with_capacity(mappings.len());

        for mapping in &mappings {
            let chunks = self.relevance.active_chunks(app, mapping.key.control).await?;

            let (percentage, explanation) = match summarize_relevance(&chunks) {
                Some(summary) => (
                    percentage_from_mean(summary.mean),
                    format!(
                        "Calculated from {} source chunk(s) with average relevance score of {:.2}.",
                        summary.count, summary.mean
                    ),
                ),
                None => (0, NO_CHUNKS_EXPLANATION.to_string()),
            };

            // User-authored explanation text survives; the percentage is
            // refreshed regardless.
            let analysis = if mapping.has_user_explanation() {
                None
            } else {
                Some(ControlAnalysis::summary_only(explanation))
            };

            updates.push(MappingUpdate {
                control: mapping.key.control,
                percentage_completion: percentage,
                status: None,
                analysis,
            });
        }

        let count = updates.len();
        self.store.commit(app, standard, updates).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(score: f64, active: bool) -> ChunkRelevance {
        ChunkRelevance {
            chunk_id: 1,
            relevance_score: score,
            is_active: active,
        }
    }

    #[test]
    fn summary_averages_active_positive_chunks() {
        let chunks = [chunk(80.0, true), chunk(90.0, true), chunk(70.0, true)];
        let summary = summarize_relevance(&chunks).expect("summary present");
        assert_eq!(summary.count, 3);
        assert_eq!(percentage_from_mean(summary.mean), 80);
    }

    #[test]
    fn inactive_and_zero_chunks_are_ignored() {
        let chunks = [chunk(90.0, false), chunk(0.0, true)];
        assert!(summarize_relevance(&chunks).is_none());
    }

    #[test]
    fn percentage_is_clamped_to_valid_band() {
        assert_eq!(percentage_from_mean(130.0), 100);
        assert_eq!(percentage_from_mean(-5.0), 0);
        assert_eq!(percentage_from_mean(79.5), 80);
    }
}
