//! Remediation planning: gaps and recommendations become dependency-ordered
//! actions, scheduled into milestones and rolled up into POAM reports.

pub mod domain;
pub mod planner;
pub mod poam;

pub use domain::{
    ActionId, ActionPriority, ActionResource, ActionType, EffortTier, Milestone,
    RemediationAction, RemediationPlan, ResourceKind,
};
pub use planner::{PlanError, PlanRequest, RemediationPlanner};
pub use poam::{
    MilestoneState, PoamAssembler, PoamDocument, PoamError, PoamMetadata, PoamMilestone,
    PoamSummary, PoamWeakness, ReportMetadata, RiskLevel,
};
