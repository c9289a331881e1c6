use crate::workflows::scoring::domain::{
    ImplementationStatus, Recommendation, RecommendationPriority,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::debug;

/// Untrusted per-control analysis exactly as the model produced it. Every
/// field defaults so a partially-formed object still parses and gets scored
/// down by the checks instead of aborting the batch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawControlAnalysis {
    #[serde(default)]
    pub control_id: String,
    #[serde(default)]
    pub implementation_status: String,
    #[serde(default)]
    pub percentage_completion: f64,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub evidence_found: Vec<String>,
    #[serde(default)]
    pub gaps: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<RawRecommendation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecommendation {
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub rationale: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub const fn is_blocking(self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub field: &'static str,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationWarning {
    pub field: &'static str,
    pub message: String,
    pub suggestion: &'static str,
}

/// Business-rule-consistent version of a model analysis. This is the object
/// that gets persisted; validation is corrective, not just gatekeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectedAnalysis {
    pub status: ImplementationStatus,
    pub percentage: u8,
    pub summary: String,
    pub evidence_found: Vec<String>,
    pub gaps: Vec<String>,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    /// False only when a critical/high severity defect was found. The
    /// corrected data is persisted either way.
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationWarning>,
    pub corrected: CorrectedAnalysis,
    pub quality_score: u8,
}

impl ValidationOutcome {
    /// One-line digest for log output.
    pub fn summary_line(&self) -> String {
        let blocking = self
            .errors
            .iter()
            .filter(|error| error.severity.is_blocking())
            .count();
        format!(
            "quality {}/100, errors {} ({} blocking), warnings {}",
            self.quality_score,
            self.errors.len(),
            blocking,
            self.warnings.len()
        )
    }
}

const STATUS_MISMATCH_PENALTY: i32 = 15;
const EVIDENCE_PENALTY: i32 = 5;
const EXPLANATION_PENALTY: i32 = 10;
const VAGUE_RECOMMENDATION_PENALTY: i32 = 8;
const VAGUE_GAP_PENALTY: i32 = 5;
const MISSING_CONTENT_PENALTY: i32 = 20;

const VAGUE_RECOMMENDATION_NOTE: &str =
    " [Note: This recommendation needs more specific details about implementation]";
const VAGUE_GAP_NOTE: &str = " [Note: This gap needs more specific details]";

const STOP_WORDS: [&str; 50] = [
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
    "did", "will", "would", "should", "could", "may", "might", "must", "can", "this", "that",
    "these", "those", "it", "its", "they", "their", "them", "we", "our", "us", "you", "your",
];

const VAGUE_RECOMMENDATION_INDICATORS: [&str; 9] = [
    "implement security",
    "improve controls",
    "enhance protection",
    "add measures",
    "strengthen security",
    "increase compliance",
    "better documentation",
    "more security",
    "additional controls",
];

fn vague_explanation_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)implement.*security",
            r"(?i)improve.*controls",
            r"(?i)enhance.*protection",
            r"(?i)better.*compliance",
            r"(?i)more.*documentation",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("hardcoded pattern compiles"))
        .collect()
    })
}

fn vague_gap_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)lack.*documentation",
            r"(?i)missing.*controls",
            r"(?i)no.*evidence",
            r"(?i)insufficient.*security",
            r"(?i)inadequate.*protection",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("hardcoded pattern compiles"))
        .collect()
    })
}

/// Significant words of a phrase: lowercased, longer than three characters,
/// stop words removed, first ten kept.
pub(crate) fn significant_terms(text: &str) -> Vec<String> {
    let stop_words: HashSet<&str> = STOP_WORDS.iter().copied().collect();
    text.to_lowercase()
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| word.len() > 3 && !stop_words.contains(word))
        .take(10)
        .map(str::to_string)
        .collect()
}

/// Enforces consistency and grounding rules on one control's model output and
/// auto-corrects what it can. Stateless; safe to share across batches.
#[derive(Debug, Default, Clone)]
pub struct OutputValidator;

impl OutputValidator {
    pub fn validate(
        &self,
        raw: &RawControlAnalysis,
        source_text: &str,
        control_name: &str,
    ) -> ValidationOutcome {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut quality: i32 = 100;

        // 1. Status/percentage consistency against the fixed range table.
        let reported = percentage_from_raw(raw.percentage_completion);
        let (status, percentage) = match ImplementationStatus::parse(&raw.implementation_status) {
            Some(status) if status.accepts_percentage(reported) => (status, reported),
            Some(status) => {
                let corrected = status.typical_percentage();
                let (low, high) = status.percentage_range();
                errors.push(ValidationIssue {
                    field: "percentage_completion",
                    message: format!(
                        "percentage {reported}% does not match status \"{}\" (expected {low}-{high}%)",
                        status.label()
                    ),
                    severity: Severity::High,
                });
                quality -= STATUS_MISMATCH_PENALTY;
                debug!(
                    control = control_name,
                    reported, corrected, "auto-corrected out-of-band percentage"
                );
                (status, corrected)
            }
            None => {
                let fallback = ImplementationStatus::NotImplemented;
                errors.push(ValidationIssue {
                    field: "implementation_status",
                    message: format!(
                        "invalid implementation status: {:?}",
                        raw.implementation_status
                    ),
                    severity: Severity::Critical,
                });
                quality -= STATUS_MISMATCH_PENALTY;
                (fallback, fallback.typical_percentage())
            }
        };

        // 2. Evidence grounding: keep only items whose significant words are
        //    at least half present, verbatim, in the source text.
        let source_lower = source_text.to_lowercase();
        let mut evidence_found = Vec::with_capacity(raw.evidence_found.len());
        let mut rejected = 0usize;
        for evidence in &raw.evidence_found {
            if evidence.trim().is_empty() {
                rejected += 1;
                continue;
            }
            let terms = significant_terms(evidence);
            let matching = terms
                .iter()
                .filter(|term| source_lower.contains(term.as_str()))
                .count();
            if matching * 2 >= terms.len() {
                evidence_found.push(evidence.clone());
            } else {
                rejected += 1;
                let preview: String = evidence.chars().take(100).collect();
                debug!(
                    control = control_name,
                    evidence = %preview,
                    "evidence not grounded in source, dropping"
                );
            }
        }
        if rejected > 0 {
            warnings.push(ValidationWarning {
                field: "evidence_found",
                message: format!(
                    "{rejected}/{} evidence items could not be verified in source",
                    raw.evidence_found.len()
                ),
                suggestion: "Only include evidence that exists in the source document",
            });
            quality -= rejected as i32 * EVIDENCE_PENALTY;
        }

        // 3. Explanation quality.
        let explanation = raw.explanation.trim();
        if explanation.len() < 50 {
            errors.push(ValidationIssue {
                field: "explanation",
                message: "explanation is too short (minimum 50 characters)".to_string(),
                severity: Severity::Medium,
            });
            quality -= EXPLANATION_PENALTY;
        } else if vague_explanation_patterns()
            .iter()
            .any(|pattern| pattern.is_match(explanation))
        {
            errors.push(ValidationIssue {
                field: "explanation",
                message: "explanation contains vague phrases".to_string(),
                severity: Severity::Medium,
            });
            quality -= EXPLANATION_PENALTY;
        }

        // 4. Recommendation specificity: vague items are annotated, not
        //    dropped.
        let mut vague_recommendations = 0usize;
        let recommendations: Vec<Recommendation> = raw
            .recommendations
            .iter()
            .map(|recommendation| {
                let mut action = recommendation.action.clone();
                if is_vague_recommendation(&action) {
                    vague_recommendations += 1;
                    action.push_str(VAGUE_RECOMMENDATION_NOTE);
                }
                Recommendation {
                    priority: RecommendationPriority::parse(&recommendation.priority),
                    action,
                    rationale: recommendation.rationale.clone(),
                }
            })
            .collect();
        if vague_recommendations > 0 {
            warnings.push(ValidationWarning {
                field: "recommendations",
                message: format!(
                    "{vague_recommendations}/{} recommendations are too vague",
                    raw.recommendations.len()
                ),
                suggestion: "Provide specific, actionable recommendations with concrete tools/methods",
            });
            quality -= vague_recommendations as i32 * VAGUE_RECOMMENDATION_PENALTY;
        }

        // 5. Gap specificity.
        let mut vague_gaps = 0usize;
        let gaps: Vec<String> = raw
            .gaps
            .iter()
            .map(|gap| {
                if is_vague_gap(gap) {
                    vague_gaps += 1;
                    format!("{gap}{VAGUE_GAP_NOTE}")
                } else {
                    gap.clone()
                }
            })
            .collect();
        if vague_gaps > 0 {
            warnings.push(ValidationWarning {
                field: "gaps",
                message: format!("{vague_gaps}/{} gaps are too generic", raw.gaps.len()),
                suggestion: "Provide specific gaps with concrete details",
            });
            quality -= vague_gaps as i32 * VAGUE_GAP_PENALTY;
        }

        // 6. Minimum content: incomplete controls must explain what is missing
        //    and what to do about it.
        if status.requires_gap_analysis() && (gaps.is_empty() || recommendations.is_empty()) {
            errors.push(ValidationIssue {
                field: "content",
                message: format!(
                    "{} controls must identify at least one gap and one recommendation",
                    status.label()
                ),
                severity: Severity::High,
            });
            quality -= MISSING_CONTENT_PENALTY;
        }

        let is_valid = !errors.iter().any(|error| error.severity.is_blocking());

        ValidationOutcome {
            is_valid,
            errors,
            warnings,
            corrected: CorrectedAnalysis {
                status,
                percentage,
                summary: raw.explanation.clone(),
                evidence_found,
                gaps,
                recommendations,
            },
            quality_score: quality.max(0) as u8,
        }
    }

    /// Mean quality over a batch of validated controls, for log output.
    pub fn batch_quality(outcomes: &[ValidationOutcome]) -> f64 {
        if outcomes.is_empty() {
            return 0.0;
        }
        let total: u32 = outcomes
            .iter()
            .map(|outcome| outcome.quality_score as u32)
            .sum();
        total as f64 / outcomes.len() as f64
    }
}

fn percentage_from_raw(value: f64) -> u8 {
    if value.is_finite() {
        value.round().clamp(0.0, 100.0) as u8
    } else {
        0
    }
}

fn is_vague_recommendation(action: &str) -> bool {
    let lower = action.to_lowercase();
    lower.len() < 80
        && VAGUE_RECOMMENDATION_INDICATORS
            .iter()
            .any(|indicator| lower.contains(indicator))
}

fn is_vague_gap(gap: &str) -> bool {
    gap.len() < 40
        && vague_gap_patterns()
            .iter()
            .any(|pattern| pattern.is_match(gap))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(status: &str, percentage: f64) -> RawControlAnalysis {
        RawControlAnalysis {
            control_id: "AC-2".to_string(),
            implementation_status: status.to_string(),
            percentage_completion: percentage,
            explanation:
                "Account management is handled through the corporate identity provider with quarterly reviews."
                    .to_string(),
            evidence_found: Vec::new(),
            gaps: vec!["Quarterly access review evidence is not retained beyond one cycle".to_string()],
            recommendations: vec![RawRecommendation {
                priority: "high".to_string(),
                action: "Retain quarterly access review exports in the compliance archive".to_string(),
                rationale: "Auditors require a full year of review history".to_string(),
            }],
        }
    }

    #[test]
    fn consistent_analysis_passes_with_full_quality() {
        let outcome = OutputValidator.validate(
            &raw("partially_implemented", 55.0),
            "identity provider quarterly reviews account management",
            "AC-2",
        );
        assert!(outcome.is_valid);
        assert_eq!(outcome.quality_score, 100);
        assert_eq!(outcome.corrected.percentage, 55);
    }

    #[test]
    fn out_of_band_percentage_is_corrected_to_typical_value() {
        let mut input = raw("not_implemented", 95.0);
        input.gaps = vec!["The account lifecycle has no deprovisioning step for contractors".to_string()];
        let outcome = OutputValidator.validate(&input, "", "AC-2");

        assert!(!outcome.is_valid);
        assert_eq!(outcome.corrected.percentage, 0);
        assert_eq!(outcome.quality_score, 85);
        assert!(outcome
            .errors
            .iter()
            .any(|error| error.severity == Severity::High && error.field == "percentage_completion"));
    }

    #[test]
    fn unknown_status_is_a_critical_error() {
        let mut input = raw("mostly_done", 40.0);
        input.recommendations.clear();
        input.gaps.clear();
        let outcome = OutputValidator.validate(&input, "", "AC-2");

        assert!(!outcome.is_valid);
        assert_eq!(outcome.corrected.status, ImplementationStatus::NotImplemented);
        assert_eq!(outcome.corrected.percentage, 0);
        assert!(outcome
            .errors
            .iter()
            .any(|error| error.severity == Severity::Critical));
    }

    #[test]
    fn ungrounded_evidence_is_dropped_and_costs_five_points() {
        let mut input = raw("partially_implemented", 50.0);
        input.evidence_found = vec!["Uses AES-256 encryption at rest".to_string()];
        let outcome = OutputValidator.validate(
            &input,
            "Network diagrams and firewall rules are documented for the platform.",
            "SC-28",
        );

        assert!(outcome.corrected.evidence_found.is_empty());
        assert_eq!(outcome.quality_score, 95);
        assert!(outcome
            .warnings
            .iter()
            .any(|warning| warning.field == "evidence_found"));
    }

    #[test]
    fn grounded_evidence_survives() {
        let mut input = raw("partially_implemented", 50.0);
        input.evidence_found = vec!["Uses AES-256 encryption at rest".to_string()];
        let outcome = OutputValidator.validate(
            &input,
            "All volumes use AES-256 encryption at rest, managed through KMS.",
            "SC-28",
        );

        assert_eq!(outcome.corrected.evidence_found.len(), 1);
        assert_eq!(outcome.quality_score, 100);
    }

    #[test]
    fn short_explanations_are_flagged() {
        let mut input = raw("partially_implemented", 50.0);
        input.explanation = "Looks fine.".to_string();
        let outcome = OutputValidator.validate(&input, "", "AC-2");

        assert!(outcome.is_valid, "medium severity must not invalidate");
        assert_eq!(outcome.quality_score, 90);
    }

    #[test]
    fn vague_short_gaps_are_annotated_not_dropped() {
        let mut input = raw("partially_implemented", 50.0);
        input.gaps = vec!["Missing controls for logging".to_string()];
        let outcome = OutputValidator.validate(&input, "", "AU-2");

        assert_eq!(outcome.corrected.gaps.len(), 1);
        assert!(outcome.corrected.gaps[0].ends_with(VAGUE_GAP_NOTE));
        assert_eq!(outcome.quality_score, 95);
    }

    #[test]
    fn vague_recommendations_are_annotated() {
        let mut input = raw("partially_implemented", 50.0);
        input.recommendations = vec![RawRecommendation {
            priority: "medium".to_string(),
            action: "Implement security measures".to_string(),
            rationale: String::new(),
        }];
        let outcome = OutputValidator.validate(&input, "", "AC-2");

        assert!(outcome.corrected.recommendations[0]
            .action
            .ends_with(VAGUE_RECOMMENDATION_NOTE));
        assert_eq!(outcome.quality_score, 92);
    }

    #[test]
    fn incomplete_controls_without_gaps_lose_twenty_points() {
        let mut input = raw("not_implemented", 10.0);
        input.gaps.clear();
        let outcome = OutputValidator.validate(&input, "", "AC-2");

        assert!(!outcome.is_valid);
        assert_eq!(outcome.quality_score, 80);
    }

    #[test]
    fn quality_never_drops_below_zero() {
        let input = RawControlAnalysis {
            control_id: "AC-2".to_string(),
            implementation_status: "garbage".to_string(),
            percentage_completion: f64::NAN,
            explanation: "bad".to_string(),
            evidence_found: (0..20).map(|i| format!("fabricated item {i}")).collect(),
            gaps: Vec::new(),
            recommendations: Vec::new(),
        };
        let outcome = OutputValidator.validate(&input, "", "AC-2");
        assert_eq!(outcome.quality_score, 0);
    }

    #[test]
    fn significant_terms_filters_stop_words_and_short_tokens() {
        let terms = significant_terms("The system uses AES-256 encryption at rest");
        assert_eq!(terms, vec!["system", "uses", "encryption", "rest"]);
    }
}
