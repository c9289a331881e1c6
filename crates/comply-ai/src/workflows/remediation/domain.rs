use crate::catalog::ControlId;
use crate::workflows::scoring::domain::ImplementationStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Category of work a remediation action represents. The category drives the
/// effort estimate, the assigned role, and the static dependency rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Documentation,
    Policy,
    Configuration,
    Process,
    Training,
    EvidenceCollection,
    Audit,
    Monitoring,
}

impl ActionType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Documentation => "Documentation",
            Self::Policy => "Policy",
            Self::Configuration => "Configuration",
            Self::Process => "Process",
            Self::Training => "Training",
            Self::EvidenceCollection => "Evidence Collection",
            Self::Audit => "Audit",
            Self::Monitoring => "Monitoring",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl ActionPriority {
    pub const fn rank(self) -> u8 {
        match self {
            Self::Critical => 1,
            Self::High => 2,
            Self::Medium => 3,
            Self::Low => 4,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

/// Coarse effort bucket backing the day estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffortTier {
    Minimal,
    Low,
    Medium,
    High,
    Extensive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Tool,
    Template,
    Guide,
    Service,
}

/// External resource (tool, template, service) supporting an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResource {
    pub kind: ResourceKind,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,
}

/// Identifier of one action, unique within its plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionId(pub String);

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One unit of remediation work. Dependencies reference other actions of the
/// same plan by id; the plan's action vector is the arena they resolve
/// against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationAction {
    pub id: ActionId,
    pub action_type: ActionType,
    pub title: String,
    pub description: String,
    pub priority: ActionPriority,
    pub effort: EffortTier,
    pub estimated_days: u32,
    pub assigned_role: String,
    pub dependencies: BTreeSet<ActionId>,
    pub acceptance_criteria: Vec<String>,
    pub resources: Vec<ActionResource>,
    pub automatable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automation_suggestion: Option<String>,
}

/// Checkpoint in a plan: a target date plus the action ids that must be done
/// by then.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub title: String,
    pub description: String,
    pub target_date: NaiveDate,
    pub completed_actions: Vec<ActionId>,
    pub percentage_of_plan: u8,
}

/// Dependency-ordered, milestone-scheduled remediation plan for one control.
/// Recomputed on demand; never the system of record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationPlan {
    pub control: ControlId,
    pub control_name: String,
    pub control_family: String,
    pub current_status: ImplementationStatus,
    pub target_status: ImplementationStatus,
    pub total_estimated_days: u32,
    pub total_actions: usize,
    pub critical_actions: usize,
    pub actions: Vec<RemediationAction>,
    pub estimated_completion_date: NaiveDate,
    pub milestones: Vec<Milestone>,
}

impl RemediationPlan {
    pub fn action_ids(&self) -> Vec<ActionId> {
        self.actions.iter().map(|action| action.id.clone()).collect()
    }

    pub fn actions_of_type(&self, action_type: ActionType) -> impl Iterator<Item = &RemediationAction> {
        self.actions
            .iter()
            .filter(move |action| action.action_type == action_type)
    }
}
