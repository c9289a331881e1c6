use crate::catalog::{AppId, Control, ControlCatalog, ControlId, StandardId};
use crate::model::{ModelError, ModelInvoker, ModelOptions};
use crate::workflows::remediation::{PlanRequest, RemediationPlanner};
use crate::workflows::scoring::domain::{
    ControlAnalysis, ControlKey, ControlMapping, ImplementationStatus, MappingUpdate,
    Recommendation,
};
use crate::workflows::scoring::instant::{
    percentage_from_mean, summarize_relevance, NO_CHUNKS_EXPLANATION,
};
use crate::workflows::scoring::prompts::{analysis_focus, guidance_for_control};
use crate::workflows::scoring::store::{
    MappingStore, PlanSink, RelevanceIndex, SourceCorpusAccessor,
};
use crate::workflows::scoring::suggestions::{EvidenceSuggestion, EvidenceSuggestionEngine};
use crate::workflows::scoring::validator::{
    CorrectedAnalysis, OutputValidator, RawControlAnalysis,
};
use crate::workflows::scoring::ScoringError;
use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Throughput caps for the model-assisted refinement pass. Both concurrency
/// bounds exist to respect external model-API rate and token limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringLimits {
    /// Controls analyzed per model call.
    pub controls_per_model_call: usize,
    /// Model calls awaited concurrently; the next group starts only after the
    /// current one settles.
    pub concurrent_batches: usize,
    /// Character budget for the combined source text inside prompts.
    pub source_char_budget: usize,
    /// Character budget for one control's descriptive text inside a batch
    /// prompt.
    pub control_text_budget: usize,
    /// Plan-generation batch width for the post-commit remediation queue.
    pub remediation_batch_size: usize,
}

impl Default for ScoringLimits {
    fn default() -> Self {
        Self {
            controls_per_model_call: 20,
            concurrent_batches: 24,
            source_char_budget: 50_000,
            control_text_budget: 500,
            remediation_batch_size: 5,
        }
    }
}

/// One control queued for remediation-plan generation after the scoring
/// commit.
#[derive(Debug, Clone)]
pub struct RemediationRequest {
    pub key: ControlKey,
    pub control_name: String,
    pub status: ImplementationStatus,
    pub gaps: Vec<String>,
    pub recommendations: Vec<Recommendation>,
    pub evidence_needs: Vec<EvidenceSuggestion>,
}

#[derive(Clone)]
struct ControlTask {
    control: Control,
    mapping: ControlMapping,
}

struct ControlOutcome {
    control: Control,
    mapping: ControlMapping,
    corrected: CorrectedAnalysis,
    quality: u8,
}

const BATCH_SYSTEM_MESSAGE: &str = "You are an expert compliance analyst with specialized \
knowledge in security control families. Provide accurate, detailed analysis based on \
control-specific requirements. Analyze all controls in the batch.";

const RESPONSE_SCHEMA: &str = r#"[
  {
    "control_id": "<control name>",
    "implementation_status": "not_implemented|planned|partially_implemented|implemented|not_applicable",
    "percentage_completion": 0,
    "explanation": "<detailed explanation with specific evidence from source>",
    "evidence_found": ["Evidence item 1", "Evidence item 2"],
    "gaps": ["Gap 1", "Gap 2"],
    "recommendations": [
      { "priority": "high|medium|low", "action": "Specific actionable recommendation", "rationale": "Why this is needed" }
    ]
  }
]"#;

/// Partitions a standard's controls into bounded concurrent model batches,
/// validates every result, and falls back batch -> individual -> deterministic
/// so no model failure ever reaches the caller.
pub struct BatchOrchestrator {
    catalog: Arc<dyn ControlCatalog>,
    corpus: Arc<dyn SourceCorpusAccessor>,
    relevance: Arc<dyn RelevanceIndex>,
    store: Arc<dyn MappingStore>,
    model: Arc<dyn ModelInvoker>,
    plans: Arc<dyn PlanSink>,
    validator: OutputValidator,
    suggestions: EvidenceSuggestionEngine,
    planner: RemediationPlanner,
    limits: ScoringLimits,
}

impl BatchOrchestrator {
    pub fn new(
        catalog: Arc<dyn ControlCatalog>,
        corpus: Arc<dyn SourceCorpusAccessor>,
        relevance: Arc<dyn RelevanceIndex>,
        store: Arc<dyn MappingStore>,
        model: Arc<dyn ModelInvoker>,
        plans: Arc<dyn PlanSink>,
        limits: ScoringLimits,
    ) -> Self {
        Self {
            catalog,
            corpus,
            relevance,
            store,
            model,
            plans,
            validator: OutputValidator,
            suggestions: EvidenceSuggestionEngine,
            planner: RemediationPlanner,
            limits,
        }
    }

    /// Long-running model refinement over every control of the given
    /// standards. Intended for background execution; per-control and
    /// per-model failures are absorbed, and each standard commits
    /// independently.
    pub async fn refine_scores_with_model(
        &self,
        app: AppId,
        standards: &[StandardId],
    ) -> Result<(), ScoringError> {
        if standards.is_empty() {
            return Err(ScoringError::NoStandards(app));
        }

        let fetched = self.corpus.fetch(app).await?;
        let source_text = if fetched.trim().is_empty() {
            None
        } else {
            Some(truncate_chars(&fetched, self.limits.source_char_budget))
        };
        if let Some(text) = &source_text {
            info!(%app, chars = text.len(), "source text available for model analysis");
        } else {
            info!(%app, "no source text available, scoring deterministically");
        }

        let outcomes = join_all(standards.iter().map(|&standard| {
            self.refine_standard(app, standard, source_text.as_deref())
        }))
        .await;

        let mut queue = Vec::new();
        for (&standard, outcome) in standards.iter().zip(outcomes) {
            match outcome {
                Ok(mut requests) => queue.append(&mut requests),
                Err(err) => {
                    warn!(%app, %standard, "refinement failed for standard: {err}");
                }
            }
        }

        // Plan generation is decoupled from scoring: it runs after the
        // commits, in smaller batches, and its failures stay its own.
        self.drain_remediation_queue(queue).await;

        Ok(())
    }

    async fn refine_standard(
        &self,
        app: AppId,
        standard: StandardId,
        source_text: Option<&str>,
    ) -> Result<Vec<RemediationRequest>, ScoringError> {
        let controls = self.catalog.controls_for_standard(standard)?;
        let mappings = self.store.mappings_for_standard(app, standard).await?;
        let mut by_control: HashMap<ControlId, ControlMapping> = mappings
            .into_iter()
            .map(|mapping| (mapping.key.control, mapping))
            .collect();

        let mut tasks = Vec::new();
        for control in controls.into_iter().filter(|control| control.active) {
            match by_control.remove(&control.id) {
                Some(mapping) => tasks.push(ControlTask { control, mapping }),
                None => {
                    warn!(%app, %standard, control = %control.name, "mapping missing, skipping control");
                }
            }
        }

        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let batches: Vec<&[ControlTask]> =
            tasks.chunks(self.limits.controls_per_model_call).collect();
        info!(
            %app,
            %standard,
            controls = tasks.len(),
            batches = batches.len(),
            per_batch = self.limits.controls_per_model_call,
            "grouped controls into model batches"
        );

        let mut outcomes = Vec::with_capacity(tasks.len());
        for group in batches.chunks(self.limits.concurrent_batches) {
            let group_results = join_all(
                group
                    .iter()
                    .map(|batch| self.analyze_batch(app, batch, source_text)),
            )
            .await;
            for batch_outcomes in group_results {
                outcomes.extend(batch_outcomes);
            }
        }

        let mut updates = Vec::with_capacity(outcomes.len());
        let mut queue = Vec::new();

        for outcome in outcomes {
            let (status, percentage) = reconcile_status(&outcome.mapping, &outcome.corrected);

            let evidence_suggestions = self.suggestions.suggestions_for(
                &outcome.control.name,
                status,
                &outcome.corrected.gaps,
                &outcome.corrected.evidence_found,
            );

            let analysis = if outcome.mapping.has_user_explanation() {
                None
            } else {
                Some(ControlAnalysis {
                    summary: outcome.corrected.summary.clone(),
                    evidence_found: outcome.corrected.evidence_found.clone(),
                    gaps: outcome.corrected.gaps.clone(),
                    recommendations: outcome.corrected.recommendations.clone(),
                    quality_score: outcome.quality,
                    evidence_suggestions: evidence_suggestions.clone(),
                })
            };

            updates.push(MappingUpdate {
                control: outcome.control.id,
                percentage_completion: percentage,
                status: (status != outcome.mapping.implementation_status).then_some(status),
                analysis,
            });

            if status.requires_gap_analysis() && percentage < 100 {
                let key = outcome.mapping.key;
                match self.plans.has_plan(key).await {
                    Ok(true) => {}
                    Ok(false) => queue.push(RemediationRequest {
                        key,
                        control_name: outcome.control.name.clone(),
                        status,
                        gaps: outcome.corrected.gaps.clone(),
                        recommendations: outcome.corrected.recommendations.clone(),
                        evidence_needs: evidence_suggestions,
                    }),
                    Err(err) => {
                        warn!(control = %outcome.control.name, "plan lookup failed, skipping queue entry: {err}");
                    }
                }
            }
        }

        self.store.commit(app, standard, updates).await?;
        info!(%app, %standard, queued = queue.len(), "standard refinement committed");

        Ok(queue)
    }

    /// One model call for the whole batch; controls the response fails to
    /// cover fall back to individual calls, and individual failures fall back
    /// to the deterministic relevance average.
    async fn analyze_batch(
        &self,
        app: AppId,
        batch: &[ControlTask],
        source_text: Option<&str>,
    ) -> Vec<ControlOutcome> {
        let mut validated = HashMap::new();

        if let Some(source) = source_text {
            match self.invoke_batch_model(batch, source).await {
                Ok(entries) => {
                    for raw in entries {
                        let Some(task) = batch
                            .iter()
                            .find(|task| task.control.name == raw.control_id)
                        else {
                            debug!(
                                identifier = %raw.control_id,
                                "batch response entry matches no control in this batch"
                            );
                            continue;
                        };
                        let outcome = self.validator.validate(&raw, source, &task.control.name);
                        if !outcome.is_valid {
                            warn!(
                                control = %task.control.name,
                                "model analysis corrected by validation: {}",
                                outcome.summary_line()
                            );
                        }
                        validated.insert(task.control.id, outcome);
                    }
                    let scored: Vec<_> = validated.values().cloned().collect();
                    info!(
                        covered = validated.len(),
                        batch = batch.len(),
                        avg_quality = %format!("{:.1}", OutputValidator::batch_quality(&scored)),
                        "batch model analysis completed"
                    );
                }
                Err(err) => {
                    warn!("batch model analysis failed, falling back to per-control calls: {err}");
                }
            }
        }

        let mut outcomes = Vec::with_capacity(batch.len());
        for task in batch {
            let outcome = match validated.remove(&task.control.id) {
                Some(validation) => ControlOutcome {
                    control: task.control.clone(),
                    mapping: task.mapping.clone(),
                    corrected: validation.corrected,
                    quality: validation.quality_score,
                },
                None => self.analyze_individual(app, task, source_text).await,
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn analyze_individual(
        &self,
        app: AppId,
        task: &ControlTask,
        source_text: Option<&str>,
    ) -> ControlOutcome {
        if let Some(source) = source_text {
            match self.invoke_individual_model(task, source).await {
                Ok(mut raw) => {
                    raw.control_id = task.control.name.clone();
                    let outcome = self.validator.validate(&raw, source, &task.control.name);
                    if !outcome.is_valid {
                        warn!(
                            control = %task.control.name,
                            "individual analysis corrected by validation: {}",
                            outcome.summary_line()
                        );
                    }
                    return ControlOutcome {
                        control: task.control.clone(),
                        mapping: task.mapping.clone(),
                        corrected: outcome.corrected,
                        quality: outcome.quality_score,
                    };
                }
                Err(err) => {
                    warn!(
                        control = %task.control.name,
                        "individual model analysis failed, using deterministic score: {err}"
                    );
                }
            }
        }

        self.deterministic_outcome(app, task, source_text.unwrap_or("")).await
    }

    /// Last rung of the fallback chain: the relevance-index average, shaped
    /// so the range table holds by construction, then validated like any
    /// other result.
    async fn deterministic_outcome(
        &self,
        app: AppId,
        task: &ControlTask,
        source_text: &str,
    ) -> ControlOutcome {
        let chunks = match self
            .relevance
            .active_chunks(app, task.control.id)
            .await
        {
            Ok(chunks) => chunks,
            Err(err) => {
                warn!(control = %task.control.name, "relevance lookup failed: {err}");
                Vec::new()
            }
        };

        let (percentage, explanation) = match summarize_relevance(&chunks) {
            Some(summary) => (
                percentage_from_mean(summary.mean),
                format!(
                    "Calculated based on {} source chunk(s) with average relevance score of {:.2}.",
                    summary.count, summary.mean
                ),
            ),
            None => (0, NO_CHUNKS_EXPLANATION.to_string()),
        };

        let status = banded_status(percentage, task.mapping.implementation_status);
        let raw = RawControlAnalysis {
            control_id: task.control.name.clone(),
            implementation_status: status.token().to_string(),
            percentage_completion: status.clamp_percentage(percentage) as f64,
            explanation,
            evidence_found: Vec::new(),
            gaps: Vec::new(),
            recommendations: Vec::new(),
        };

        let outcome = self.validator.validate(&raw, source_text, &task.control.name);
        ControlOutcome {
            control: task.control.clone(),
            mapping: task.mapping.clone(),
            corrected: outcome.corrected,
            quality: outcome.quality_score,
        }
    }

    async fn invoke_batch_model(
        &self,
        batch: &[ControlTask],
        source_text: &str,
    ) -> Result<Vec<RawControlAnalysis>, ModelError> {
        let prompt = self.batch_prompt(batch, source_text);
        let response = self
            .model
            .analyze(&prompt, BATCH_SYSTEM_MESSAGE, ModelOptions::default())
            .await?;
        parse_batch_response(&response)
    }

    async fn invoke_individual_model(
        &self,
        task: &ControlTask,
        source_text: &str,
    ) -> Result<RawControlAnalysis, ModelError> {
        let guidance = guidance_for_control(&task.control.name);
        let prompt = self.individual_prompt(task, source_text);
        let response = self
            .model
            .analyze(&prompt, guidance.system_message, ModelOptions::default())
            .await?;
        parse_individual_response(&response)
    }

    fn batch_prompt(&self, batch: &[ControlTask], source_text: &str) -> String {
        let mut prompt = String::from(
            "You are an expert compliance analyst with specialized knowledge in multiple security control families.\n\n## Controls to Analyze\n",
        );

        for (index, task) in batch.iter().enumerate() {
            let control = &task.control;
            let guidance = guidance_for_control(&control.name);
            let text = if control.text.is_empty() {
                "N/A".to_string()
            } else {
                truncate_chars(&control.text, self.limits.control_text_budget)
            };
            prompt.push_str(&format!(
                "{}. Control ID: {}\n   Name: {}\n   Family: {}\n   Text: {}\n\n   Analysis Focus: {}\n\n",
                index + 1,
                control.name,
                if control.long_name.is_empty() {
                    &control.name
                } else {
                    &control.long_name
                },
                control.family_code(),
                text,
                analysis_focus(guidance, 3),
            ));
        }

        prompt.push_str("## Source Document\n");
        prompt.push_str(source_text);
        prompt.push_str(
            "\n\n## Instructions\nFor EACH control:\n\
1. Apply family-specific analysis\n\
2. Look for concrete evidence in the source document\n\
3. Match evidence to specific control requirements\n\
4. Identify gaps precisely\n\
5. Provide actionable recommendations\n\n## Required JSON Output\n",
        );
        prompt.push_str(RESPONSE_SCHEMA);
        prompt.push_str(
            "\n\nIMPORTANT:\n\
- Return one object per control, keyed by control_id\n\
- Only cite evidence that actually exists in the source\n\
- Be specific, not vague\n\
- Match percentage to status (not_implemented: 0-20%, planned: 10-30%, partially_implemented: 30-70%, implemented: 80-100%)\n\
- Recommendations must be actionable within weeks\n\n\
Respond ONLY with a valid JSON array.",
        );

        prompt
    }

    fn individual_prompt(&self, task: &ControlTask, source_text: &str) -> String {
        let control = &task.control;
        let text = if control.text.is_empty() {
            control.long_name.clone()
        } else {
            control.text.clone()
        };

        format!(
            "You are a compliance analyst. Analyze the provided source document against the \
following compliance control and report implementation status, completion percentage, \
evidence, gaps, and recommendations.\n\n\
Control ID: {}\nControl Name: {}\nControl Text: {}\n\n\
Source Document:\n{}\n\n\
Respond ONLY with one valid JSON object shaped like the entries of:\n{}",
            control.name, control.long_name, text, source_text, RESPONSE_SCHEMA
        )
    }

    async fn drain_remediation_queue(&self, requests: Vec<RemediationRequest>) {
        if requests.is_empty() {
            return;
        }
        info!(
            count = requests.len(),
            batch = self.limits.remediation_batch_size,
            "generating remediation plans"
        );

        let today = Utc::now().date_naive();
        for chunk in requests.chunks(self.limits.remediation_batch_size) {
            let results = join_all(
                chunk
                    .iter()
                    .map(|request| self.deliver_plan(request, today)),
            )
            .await;
            for (request, result) in chunk.iter().zip(results) {
                if let Err(err) = result {
                    warn!(
                        control = %request.control_name,
                        "remediation plan generation failed: {err}"
                    );
                }
            }
        }
    }

    async fn deliver_plan(
        &self,
        request: &RemediationRequest,
        today: NaiveDate,
    ) -> Result<(), ScoringError> {
        let plan = self.planner.generate_plan(
            PlanRequest {
                control: request.key.control,
                control_name: request.control_name.clone(),
                current_status: request.status,
                gaps: request.gaps.clone(),
                recommendations: request.recommendations.clone(),
                evidence_needs: request.evidence_needs.clone(),
            },
            today,
        )?;
        self.plans.record(request.key, plan).await?;
        Ok(())
    }
}

/// Applies the business rules that outrank model output: user overrides stop
/// automated status changes, the ladder never moves down, measured progress
/// advances not_implemented/planned to partially_implemented, and the
/// persisted percentage always lands inside the final status's band.
fn reconcile_status(
    mapping: &ControlMapping,
    corrected: &CorrectedAnalysis,
) -> (ImplementationStatus, u8) {
    let current = mapping.implementation_status;

    if mapping.user_status.is_some()
        || matches!(
            current,
            ImplementationStatus::NotApplicable | ImplementationStatus::Exception
        )
    {
        return (current, current.clamp_percentage(corrected.percentage));
    }

    let mut status = match corrected.status {
        ImplementationStatus::NotApplicable | ImplementationStatus::Exception => {
            // A not-applicable verdict only replaces states with no measured
            // progress.
            if matches!(
                current,
                ImplementationStatus::NotImplemented | ImplementationStatus::Planned
            ) {
                corrected.status
            } else {
                current
            }
        }
        candidate if candidate.ladder_rank() >= current.ladder_rank() => candidate,
        _ => current,
    };

    if matches!(
        status,
        ImplementationStatus::NotImplemented | ImplementationStatus::Planned
    ) && corrected.percentage > 0
    {
        status = ImplementationStatus::PartiallyImplemented;
    }

    (status, status.clamp_percentage(corrected.percentage))
}

/// Status implied by a deterministic relevance percentage, used only to shape
/// fallback results so they are range-consistent by construction.
fn banded_status(percentage: u8, current: ImplementationStatus) -> ImplementationStatus {
    match percentage {
        0 => current,
        1..=20 => ImplementationStatus::NotImplemented,
        21..=29 => ImplementationStatus::Planned,
        30..=79 => ImplementationStatus::PartiallyImplemented,
        _ => ImplementationStatus::Implemented,
    }
}

fn truncate_chars(text: &str, budget: usize) -> String {
    text.chars().take(budget).collect()
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|ch: char| ch.is_ascii_alphabetic());
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Parses a batch response at the trust boundary. Accepts a bare JSON array
/// or a `{"controls": [...]}` wrapper; entries that fail to deserialize are
/// skipped so their controls take the individual fallback instead of failing
/// the whole batch.
fn parse_batch_response(raw: &str) -> Result<Vec<RawControlAnalysis>, ModelError> {
    let value: Value = serde_json::from_str(strip_code_fences(raw))
        .map_err(|err| ModelError::MalformedOutput(err.to_string()))?;

    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut object) => match object.remove("controls") {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(ModelError::MalformedOutput(
                    "expected a JSON array of control analyses".to_string(),
                ))
            }
        },
        _ => {
            return Err(ModelError::MalformedOutput(
                "expected a JSON array of control analyses".to_string(),
            ))
        }
    };

    Ok(entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                debug!("skipping malformed batch entry: {err}");
                None
            }
        })
        .collect())
}

fn parse_individual_response(raw: &str) -> Result<RawControlAnalysis, ModelError> {
    serde_json::from_str(strip_code_fences(raw))
        .map_err(|err| ModelError::MalformedOutput(err.to_string()))
}
