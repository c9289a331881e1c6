use crate::catalog::{AppId, ControlId, StandardId};
use crate::workflows::scoring::suggestions::EvidenceSuggestion;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Implementation posture of one control for one application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplementationStatus {
    NotImplemented,
    Planned,
    PartiallyImplemented,
    Implemented,
    NotApplicable,
    Exception,
}

impl ImplementationStatus {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::NotImplemented,
            Self::Planned,
            Self::PartiallyImplemented,
            Self::Implemented,
            Self::NotApplicable,
            Self::Exception,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::NotImplemented => "Not Implemented",
            Self::Planned => "Planned",
            Self::PartiallyImplemented => "Partially Implemented",
            Self::Implemented => "Implemented",
            Self::NotApplicable => "Not Applicable",
            Self::Exception => "Exception",
        }
    }

    /// Wire token, matching the serde snake_case form.
    pub const fn token(self) -> &'static str {
        match self {
            Self::NotImplemented => "not_implemented",
            Self::Planned => "planned",
            Self::PartiallyImplemented => "partially_implemented",
            Self::Implemented => "implemented",
            Self::NotApplicable => "not_applicable",
            Self::Exception => "exception",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "not_implemented" => Some(Self::NotImplemented),
            "planned" => Some(Self::Planned),
            "partially_implemented" => Some(Self::PartiallyImplemented),
            "implemented" => Some(Self::Implemented),
            "not_applicable" => Some(Self::NotApplicable),
            "exception" => Some(Self::Exception),
            _ => None,
        }
    }

    /// Inclusive completion-percentage band a status may legitimately carry.
    pub const fn percentage_range(self) -> (u8, u8) {
        match self {
            Self::NotImplemented => (0, 20),
            Self::Planned => (10, 30),
            Self::PartiallyImplemented => (30, 70),
            Self::Implemented => (80, 100),
            Self::NotApplicable | Self::Exception => (0, 0),
        }
    }

    /// Midpoint used when auto-correcting an out-of-band percentage.
    pub const fn typical_percentage(self) -> u8 {
        match self {
            Self::NotImplemented => 0,
            Self::Planned => 20,
            Self::PartiallyImplemented => 50,
            Self::Implemented => 95,
            Self::NotApplicable | Self::Exception => 0,
        }
    }

    pub fn accepts_percentage(self, percentage: u8) -> bool {
        let (low, high) = self.percentage_range();
        percentage >= low && percentage <= high
    }

    pub fn clamp_percentage(self, percentage: u8) -> u8 {
        let (low, high) = self.percentage_range();
        percentage.clamp(low, high)
    }

    /// Statuses that must document at least one gap and one recommendation.
    pub const fn requires_gap_analysis(self) -> bool {
        matches!(self, Self::NotImplemented | Self::PartiallyImplemented)
    }

    /// Position on the implementation ladder; used to forbid automated
    /// downgrades. Terminal states sit above the ladder.
    pub(crate) const fn ladder_rank(self) -> u8 {
        match self {
            Self::NotImplemented => 0,
            Self::Planned => 1,
            Self::PartiallyImplemented => 2,
            Self::Implemented => 3,
            Self::NotApplicable | Self::Exception => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationPriority {
    High,
    Medium,
    Low,
}

impl RecommendationPriority {
    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

/// Actionable recommendation attached to a control analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: RecommendationPriority,
    pub action: String,
    pub rationale: String,
}

/// Structured explanation persisted for one control: what was found, what is
/// missing, and what to do about it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlAnalysis {
    pub summary: String,
    pub evidence_found: Vec<String>,
    pub gaps: Vec<String>,
    pub recommendations: Vec<Recommendation>,
    pub quality_score: u8,
    pub evidence_suggestions: Vec<EvidenceSuggestion>,
}

impl ControlAnalysis {
    /// Explanation carrying only a summary line, used by the deterministic
    /// scoring paths.
    pub fn summary_only(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Self::default()
        }
    }
}

/// Composite key of one application/standard/control mapping row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlKey {
    pub app: AppId,
    pub standard: StandardId,
    pub control: ControlId,
}

/// Persisted compliance posture of one control for one application under one
/// standard. Created when the standard is attached, mutated by the scoring
/// passes and by user review, deleted only on detachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlMapping {
    pub key: ControlKey,
    pub implementation_status: ImplementationStatus,
    pub percentage_completion: u8,
    pub analysis: ControlAnalysis,
    /// User-set status; authoritative for display once present, and a hard
    /// stop for automated status changes.
    pub user_status: Option<ImplementationStatus>,
    /// User-set explanation; never overwritten by automated passes.
    pub user_explanation: Option<String>,
    pub risk_level: Option<String>,
    pub exception_reason: Option<String>,
    pub is_reviewed: bool,
    pub updated_at: DateTime<Utc>,
}

impl ControlMapping {
    pub fn new(key: ControlKey) -> Self {
        Self {
            key,
            implementation_status: ImplementationStatus::NotImplemented,
            percentage_completion: 0,
            analysis: ControlAnalysis::default(),
            user_status: None,
            user_explanation: None,
            risk_level: None,
            exception_reason: None,
            is_reviewed: false,
            updated_at: Utc::now(),
        }
    }

    /// Status shown to callers: the user override wins when present.
    pub fn effective_status(&self) -> ImplementationStatus {
        self.user_status.unwrap_or(self.implementation_status)
    }

    pub fn has_user_explanation(&self) -> bool {
        self.user_explanation
            .as_deref()
            .map(|text| !text.trim().is_empty())
            .unwrap_or(false)
    }
}

/// One mapping mutation inside a per-standard commit. `None` fields leave the
/// stored value untouched, which is how user-set explanation text survives
/// automated passes.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingUpdate {
    pub control: ControlId,
    pub percentage_completion: u8,
    pub status: Option<ImplementationStatus>,
    pub analysis: Option<ControlAnalysis>,
}
