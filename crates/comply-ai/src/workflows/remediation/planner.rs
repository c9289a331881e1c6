use crate::catalog::ControlId;
use crate::workflows::remediation::domain::{
    ActionId, ActionPriority, ActionResource, ActionType, EffortTier, Milestone, RemediationAction,
    RemediationPlan, ResourceKind,
};
use crate::workflows::scoring::domain::{ImplementationStatus, Recommendation, RecommendationPriority};
use crate::workflows::scoring::suggestions::{EvidencePriority, EvidenceSuggestion};
use chrono::{Duration, NaiveDate};
use std::collections::{BTreeSet, HashMap};
use tracing::info;

/// Everything the planner needs about one control to build its plan.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub control: ControlId,
    pub control_name: String,
    pub current_status: ImplementationStatus,
    pub gaps: Vec<String>,
    pub recommendations: Vec<Recommendation>,
    pub evidence_needs: Vec<EvidenceSuggestion>,
}

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("remediation action dependencies form a cycle")]
    DependencyCycle,
    #[error("action {0} depends on unknown action {1}")]
    UnknownDependency(ActionId, ActionId),
}

/// Converts gaps, recommendations, and evidence needs into a dependency-
/// ordered, milestone-scheduled remediation plan.
#[derive(Debug, Default, Clone)]
pub struct RemediationPlanner;

impl RemediationPlanner {
    pub fn generate_plan(
        &self,
        request: PlanRequest,
        today: NaiveDate,
    ) -> Result<RemediationPlan, PlanError> {
        let family: String = request
            .control_name
            .chars()
            .take(2)
            .collect::<String>()
            .to_ascii_uppercase();

        let mut actions = Vec::new();
        let mut counter = 1usize;
        let next_id = |counter: &mut usize| {
            let id = ActionId(format!("{}-{}", request.control_name, counter));
            *counter += 1;
            id
        };

        for gap in &request.gaps {
            actions.push(action_from_gap(next_id(&mut counter), gap, &family));
        }
        for recommendation in &request.recommendations {
            actions.push(action_from_recommendation(
                next_id(&mut counter),
                recommendation,
                &family,
            ));
        }
        for need in &request.evidence_needs {
            if matches!(
                need.priority,
                EvidencePriority::Required | EvidencePriority::Recommended
            ) {
                actions.push(action_from_evidence_need(next_id(&mut counter), need, &family));
            }
        }

        actions.sort_by_key(|action| action.priority.rank());
        apply_dependency_rules(&mut actions);
        ensure_acyclic(&actions)?;

        let total_estimated_days: u32 = actions.iter().map(|action| action.estimated_days).sum();
        let critical_actions = actions
            .iter()
            .filter(|action| action.priority == ActionPriority::Critical)
            .count();

        let milestones = build_milestones(&actions, &request.control_name, today);
        let target_status = target_status(request.current_status, actions.len());

        info!(
            control = %request.control_name,
            actions = actions.len(),
            critical = critical_actions,
            days = total_estimated_days,
            "generated remediation plan"
        );

        Ok(RemediationPlan {
            control: request.control,
            control_name: request.control_name,
            control_family: family,
            current_status: request.current_status,
            target_status,
            total_estimated_days,
            total_actions: actions.len(),
            critical_actions,
            estimated_completion_date: today + Duration::days(total_estimated_days as i64),
            actions,
            milestones,
        })
    }
}

fn action_from_gap(id: ActionId, gap: &str, family: &str) -> RemediationAction {
    let lower = gap.to_lowercase();

    let action_type = if lower.contains("documentation") || lower.contains("document") {
        ActionType::Documentation
    } else if lower.contains("policy") || lower.contains("procedure") {
        ActionType::Policy
    } else if lower.contains("training") || lower.contains("awareness") {
        ActionType::Training
    } else if lower.contains("log") || lower.contains("monitor") {
        ActionType::Monitoring
    } else if lower.contains("audit") || lower.contains("assessment") {
        ActionType::Audit
    } else if lower.contains("process") || lower.contains("workflow") {
        ActionType::Process
    } else {
        ActionType::Configuration
    };

    let padded = format!(" {lower} ");
    let priority = if lower.contains("critical") || lower.contains("missing") || padded.contains(" no ")
    {
        ActionPriority::High
    } else {
        ActionPriority::Medium
    };

    let (effort, days) = effort_for(action_type);
    let excerpt: String = gap.chars().take(80).collect();
    let ellipsis = if gap.chars().count() > 80 { "..." } else { "" };

    RemediationAction {
        id,
        action_type,
        title: format!("Address: {excerpt}{ellipsis}"),
        description: format!("Remediate identified gap: {gap}"),
        priority,
        effort,
        estimated_days: days,
        assigned_role: role_for(action_type).to_string(),
        dependencies: BTreeSet::new(),
        acceptance_criteria: acceptance_criteria(action_type),
        resources: resources_for(action_type),
        automatable: is_automatable(action_type),
        automation_suggestion: automation_suggestion(action_type),
    }
}

fn action_from_recommendation(
    id: ActionId,
    recommendation: &Recommendation,
    _family: &str,
) -> RemediationAction {
    let lower = recommendation.action.to_lowercase();

    let action_type = if lower.contains("document") {
        ActionType::Documentation
    } else if lower.contains("policy") {
        ActionType::Policy
    } else if lower.contains("training") {
        ActionType::Training
    } else if lower.contains("monitor") {
        ActionType::Monitoring
    } else if lower.contains("audit") || lower.contains("assess") {
        ActionType::Audit
    } else {
        ActionType::Configuration
    };

    let priority = match recommendation.priority {
        RecommendationPriority::High => ActionPriority::High,
        RecommendationPriority::Medium => ActionPriority::Medium,
        RecommendationPriority::Low => ActionPriority::Low,
    };

    let (effort, days) = effort_for(action_type);
    let title: String = recommendation.action.chars().take(100).collect();

    RemediationAction {
        id,
        action_type,
        title,
        description: format!(
            "{}\n\nRationale: {}",
            recommendation.action, recommendation.rationale
        ),
        priority,
        effort,
        estimated_days: days,
        assigned_role: role_for(action_type).to_string(),
        dependencies: BTreeSet::new(),
        acceptance_criteria: acceptance_criteria(action_type),
        resources: resources_for(action_type),
        automatable: is_automatable(action_type),
        automation_suggestion: automation_suggestion(action_type),
    }
}

fn action_from_evidence_need(
    id: ActionId,
    need: &EvidenceSuggestion,
    _family: &str,
) -> RemediationAction {
    let priority = if need.priority == EvidencePriority::Required {
        ActionPriority::High
    } else {
        ActionPriority::Medium
    };

    RemediationAction {
        id,
        action_type: ActionType::EvidenceCollection,
        title: format!("Collect Evidence: {}", need.kind.label()),
        description: need.description.clone(),
        priority,
        effort: EffortTier::Minimal,
        estimated_days: 2,
        assigned_role: role_for(ActionType::EvidenceCollection).to_string(),
        dependencies: BTreeSet::new(),
        acceptance_criteria: vec![
            format!("{} evidence collected and documented", need.kind.label()),
            "Evidence uploaded to compliance platform".to_string(),
            "Evidence reviewed and approved by compliance team".to_string(),
        ],
        resources: resources_for(ActionType::EvidenceCollection),
        automatable: false,
        automation_suggestion: None,
    }
}

const fn effort_for(action_type: ActionType) -> (EffortTier, u32) {
    match action_type {
        ActionType::Documentation => (EffortTier::Low, 3),
        ActionType::Policy => (EffortTier::Medium, 7),
        ActionType::Configuration => (EffortTier::Low, 2),
        ActionType::Process => (EffortTier::Medium, 10),
        ActionType::Training => (EffortTier::Medium, 14),
        ActionType::EvidenceCollection => (EffortTier::Minimal, 2),
        ActionType::Audit => (EffortTier::High, 14),
        ActionType::Monitoring => (EffortTier::Low, 5),
    }
}

const fn role_for(action_type: ActionType) -> &'static str {
    match action_type {
        ActionType::Documentation => "Technical Writer / Compliance Analyst",
        ActionType::Policy => "Compliance Manager / Legal",
        ActionType::Configuration => "DevOps Engineer / Security Engineer",
        ActionType::Process => "Process Owner / Compliance Manager",
        ActionType::Training => "Security Awareness Lead / HR",
        ActionType::EvidenceCollection => "Compliance Analyst",
        ActionType::Audit => "Internal Auditor / Compliance Manager",
        ActionType::Monitoring => "DevOps Engineer / Security Operations",
    }
}

const fn is_automatable(action_type: ActionType) -> bool {
    matches!(action_type, ActionType::Configuration | ActionType::Monitoring)
}

fn automation_suggestion(action_type: ActionType) -> Option<String> {
    match action_type {
        ActionType::Configuration => Some(
            "Use infrastructure as code (Terraform/CloudFormation) for repeatable configuration"
                .to_string(),
        ),
        ActionType::Monitoring => Some(
            "Implement automated monitoring with alerting (CloudWatch/Datadog/Prometheus)"
                .to_string(),
        ),
        _ => None,
    }
}

fn acceptance_criteria(action_type: ActionType) -> Vec<String> {
    let criteria: &[&str] = match action_type {
        ActionType::Documentation => &[
            "Documentation created and peer-reviewed",
            "Documentation uploaded to central repository",
            "Documentation accessible to relevant stakeholders",
        ],
        ActionType::Policy => &[
            "Policy drafted and reviewed by stakeholders",
            "Policy approved by management",
            "Policy published and communicated to organization",
            "Policy training completed for relevant staff",
        ],
        ActionType::Configuration => &[
            "Configuration implemented in development environment",
            "Configuration tested and validated",
            "Configuration deployed to production",
            "Configuration documented",
        ],
        ActionType::Process => &[
            "Process documented with clear steps",
            "Process approved by process owner",
            "Staff trained on new process",
            "Process implemented and monitored",
        ],
        ActionType::Training => &[
            "Training materials developed",
            "Training sessions scheduled and conducted",
            "Training attendance tracked (>90% completion)",
            "Training effectiveness assessed",
        ],
        ActionType::EvidenceCollection => &[
            "Evidence collected and documented",
            "Evidence uploaded to compliance platform",
            "Evidence reviewed and approved",
        ],
        ActionType::Audit => &[
            "Audit scope defined and approved",
            "Audit conducted and findings documented",
            "Audit report reviewed with stakeholders",
            "Remediation plan created for findings",
        ],
        ActionType::Monitoring => &[
            "Monitoring solution configured",
            "Alerts configured for critical events",
            "Monitoring tested and validated",
            "On-call procedures documented",
        ],
    };
    criteria.iter().map(|item| item.to_string()).collect()
}

fn resources_for(action_type: ActionType) -> Vec<ActionResource> {
    match action_type {
        ActionType::Configuration => vec![ActionResource {
            kind: ResourceKind::Tool,
            name: "Terraform".to_string(),
            description: "Infrastructure as code tool for automated configuration".to_string(),
            url: Some("https://www.terraform.io/".to_string()),
            cost: None,
        }],
        ActionType::Monitoring => vec![ActionResource {
            kind: ResourceKind::Service,
            name: "Datadog".to_string(),
            description: "Monitoring and observability platform".to_string(),
            url: Some("https://www.datadoghq.com/".to_string()),
            cost: Some("Paid".to_string()),
        }],
        ActionType::Documentation => vec![ActionResource {
            kind: ResourceKind::Template,
            name: "NIST Documentation Templates".to_string(),
            description: "Standard templates for compliance documentation".to_string(),
            url: Some("https://csrc.nist.gov/".to_string()),
            cost: None,
        }],
        ActionType::Policy => vec![ActionResource {
            kind: ResourceKind::Template,
            name: "SANS Policy Templates".to_string(),
            description: "Industry-standard security policy templates".to_string(),
            url: Some("https://www.sans.org/information-security-policy/".to_string()),
            cost: None,
        }],
        _ => Vec::new(),
    }
}

/// Static type-to-type ordering rules: processes depend on policies,
/// documentation depends on configuration, training depends on both policy
/// and documentation. Edges only point one way across the type ordering, so
/// the result is acyclic by construction.
fn apply_dependency_rules(actions: &mut [RemediationAction]) {
    let ids_of = |actions: &[RemediationAction], wanted: ActionType| -> Vec<ActionId> {
        actions
            .iter()
            .filter(|action| action.action_type == wanted)
            .map(|action| action.id.clone())
            .collect()
    };

    let policy_ids = ids_of(actions, ActionType::Policy);
    let configuration_ids = ids_of(actions, ActionType::Configuration);
    let documentation_ids = ids_of(actions, ActionType::Documentation);

    for action in actions.iter_mut() {
        match action.action_type {
            ActionType::Process => {
                action.dependencies.extend(policy_ids.iter().cloned());
            }
            ActionType::Documentation => {
                action.dependencies.extend(configuration_ids.iter().cloned());
            }
            ActionType::Training => {
                action.dependencies.extend(policy_ids.iter().cloned());
                action.dependencies.extend(documentation_ids.iter().cloned());
            }
            _ => {}
        }
    }
}

/// Defensive cycle check over the id arena (Kahn's algorithm). The current
/// rules cannot produce a cycle, but future rule additions could.
fn ensure_acyclic(actions: &[RemediationAction]) -> Result<(), PlanError> {
    let index_of: HashMap<&ActionId, usize> = actions
        .iter()
        .enumerate()
        .map(|(index, action)| (&action.id, index))
        .collect();

    let mut in_degree = vec![0usize; actions.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); actions.len()];

    for (index, action) in actions.iter().enumerate() {
        for dependency in &action.dependencies {
            let dep_index = *index_of.get(dependency).ok_or_else(|| {
                PlanError::UnknownDependency(action.id.clone(), dependency.clone())
            })?;
            in_degree[index] += 1;
            dependents[dep_index].push(index);
        }
    }

    let mut ready: Vec<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(index, _)| index)
        .collect();
    let mut visited = 0usize;

    while let Some(index) = ready.pop() {
        visited += 1;
        for &dependent in &dependents[index] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(dependent);
            }
        }
    }

    if visited == actions.len() {
        Ok(())
    } else {
        Err(PlanError::DependencyCycle)
    }
}

fn build_milestones(
    actions: &[RemediationAction],
    control_name: &str,
    today: NaiveDate,
) -> Vec<Milestone> {
    let mut milestones = Vec::new();
    let total = actions.len();

    let critical: Vec<&RemediationAction> = actions
        .iter()
        .filter(|action| action.priority == ActionPriority::Critical)
        .collect();
    if !critical.is_empty() {
        let days: u32 = critical.iter().map(|action| action.estimated_days).sum();
        milestones.push(Milestone {
            id: "m1".to_string(),
            title: "Critical Gaps Addressed".to_string(),
            description: format!("All critical priority actions completed for {control_name}"),
            target_date: today + Duration::days(days as i64),
            completed_actions: critical.iter().map(|action| action.id.clone()).collect(),
            percentage_of_plan: share_of_plan(critical.len(), total),
        });
    }

    let high_and_critical: Vec<&RemediationAction> = actions
        .iter()
        .filter(|action| {
            matches!(action.priority, ActionPriority::Critical | ActionPriority::High)
        })
        .collect();
    if !high_and_critical.is_empty() && high_and_critical.len() > critical.len() {
        let days: u32 = high_and_critical
            .iter()
            .map(|action| action.estimated_days)
            .sum();
        milestones.push(Milestone {
            id: "m2".to_string(),
            title: "High Priority Items Complete".to_string(),
            description: format!(
                "All critical and high priority actions completed for {control_name}"
            ),
            target_date: today + Duration::days(days as i64),
            completed_actions: high_and_critical
                .iter()
                .map(|action| action.id.clone())
                .collect(),
            percentage_of_plan: share_of_plan(high_and_critical.len(), total),
        });
    }

    let all_days: u32 = actions.iter().map(|action| action.estimated_days).sum();
    milestones.push(Milestone {
        id: "m3".to_string(),
        title: format!("{control_name} Fully Compliant"),
        description: "All remediation actions completed, control fully implemented".to_string(),
        target_date: today + Duration::days(all_days as i64),
        completed_actions: actions.iter().map(|action| action.id.clone()).collect(),
        percentage_of_plan: 100,
    });

    milestones
}

fn share_of_plan(count: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((count as f64 / total as f64) * 100.0).round() as u8
}

const fn target_status(current: ImplementationStatus, action_count: usize) -> ImplementationStatus {
    if action_count == 0 {
        return current;
    }
    match current {
        ImplementationStatus::NotImplemented => ImplementationStatus::PartiallyImplemented,
        _ => ImplementationStatus::Implemented,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 3).expect("valid date")
    }

    fn request(gaps: Vec<&str>, recommendations: Vec<(&str, RecommendationPriority)>) -> PlanRequest {
        PlanRequest {
            control: ControlId(7),
            control_name: "AC-2".to_string(),
            current_status: ImplementationStatus::PartiallyImplemented,
            gaps: gaps.into_iter().map(str::to_string).collect(),
            recommendations: recommendations
                .into_iter()
                .map(|(action, priority)| Recommendation {
                    priority,
                    action: action.to_string(),
                    rationale: "Required by the assessment".to_string(),
                })
                .collect(),
            evidence_needs: Vec::new(),
        }
    }

    #[test]
    fn gap_keywords_drive_action_type_and_priority() {
        let plan = RemediationPlanner
            .generate_plan(
                request(
                    vec![
                        "Missing policy for account reviews",
                        "Session timeout setting incomplete",
                    ],
                    vec![],
                ),
                date(),
            )
            .expect("plan generates");

        let policy = plan
            .actions
            .iter()
            .find(|action| action.action_type == ActionType::Policy)
            .expect("policy action exists");
        assert_eq!(policy.priority, ActionPriority::High);
        assert_eq!(policy.estimated_days, 7);

        let configuration = plan
            .actions
            .iter()
            .find(|action| action.action_type == ActionType::Configuration)
            .expect("configuration action exists");
        assert_eq!(configuration.priority, ActionPriority::Medium);
        assert_eq!(configuration.estimated_days, 2);
    }

    #[test]
    fn process_actions_depend_on_every_policy_action() {
        let plan = RemediationPlanner
            .generate_plan(
                request(
                    vec![
                        "Missing policy for vendor reviews",
                        "Account provisioning process is undefined",
                        "Offboarding workflow has never been documented as a procedure",
                    ],
                    vec![],
                ),
                date(),
            )
            .expect("plan generates");

        let policy_ids: Vec<ActionId> = plan
            .actions_of_type(ActionType::Policy)
            .map(|action| action.id.clone())
            .collect();
        assert!(!policy_ids.is_empty());

        for process in plan.actions_of_type(ActionType::Process) {
            for policy_id in &policy_ids {
                assert!(
                    process.dependencies.contains(policy_id),
                    "process {} missing dependency on {}",
                    process.id,
                    policy_id
                );
            }
        }
    }

    #[test]
    fn training_depends_on_policy_and_documentation() {
        let plan = RemediationPlanner
            .generate_plan(
                request(
                    vec![
                        "Missing policy for access management",
                        "Runbook documentation does not cover break-glass accounts",
                        "Staff training on access requests has lapsed",
                    ],
                    vec![],
                ),
                date(),
            )
            .expect("plan generates");

        let expected: BTreeSet<ActionId> = plan
            .actions
            .iter()
            .filter(|action| {
                matches!(
                    action.action_type,
                    ActionType::Policy | ActionType::Documentation
                )
            })
            .map(|action| action.id.clone())
            .collect();

        let training = plan
            .actions_of_type(ActionType::Training)
            .next()
            .expect("training action exists");
        assert!(training.dependencies.is_superset(&expected));
    }

    #[test]
    fn final_milestone_always_covers_whole_plan() {
        let plan = RemediationPlanner
            .generate_plan(
                request(
                    vec!["Missing policy for reviews"],
                    vec![("Enable session recording on bastion hosts", RecommendationPriority::Low)],
                ),
                date(),
            )
            .expect("plan generates");

        let full: Vec<&Milestone> = plan
            .milestones
            .iter()
            .filter(|milestone| milestone.percentage_of_plan == 100)
            .collect();
        assert_eq!(full.len(), 1);
        assert_eq!(full[0].completed_actions, plan.action_ids());
        assert_eq!(
            full[0].target_date,
            date() + Duration::days(plan.total_estimated_days as i64)
        );
    }

    #[test]
    fn actions_are_sorted_by_priority() {
        let plan = RemediationPlanner
            .generate_plan(
                request(
                    vec!["Session timeout setting incomplete"],
                    vec![
                        ("Tune monitor thresholds", RecommendationPriority::Low),
                        ("Rotate stale credentials", RecommendationPriority::High),
                    ],
                ),
                date(),
            )
            .expect("plan generates");

        let ranks: Vec<u8> = plan
            .actions
            .iter()
            .map(|action| action.priority.rank())
            .collect();
        let mut sorted = ranks.clone();
        sorted.sort_unstable();
        assert_eq!(ranks, sorted);
    }

    #[test]
    fn target_status_bumps_one_step() {
        assert_eq!(
            target_status(ImplementationStatus::NotImplemented, 3),
            ImplementationStatus::PartiallyImplemented
        );
        assert_eq!(
            target_status(ImplementationStatus::PartiallyImplemented, 3),
            ImplementationStatus::Implemented
        );
        assert_eq!(
            target_status(ImplementationStatus::NotImplemented, 0),
            ImplementationStatus::NotImplemented
        );
    }

    #[test]
    fn cycle_detector_rejects_manufactured_cycles() {
        let mut first = action_from_gap(ActionId("AC-2-1".to_string()), "Missing policy", "AC");
        let mut second = action_from_gap(ActionId("AC-2-2".to_string()), "Missing policy", "AC");
        first.dependencies.insert(second.id.clone());
        second.dependencies.insert(first.id.clone());

        let result = ensure_acyclic(&[first, second]);
        assert!(matches!(result, Err(PlanError::DependencyCycle)));
    }

    #[test]
    fn cycle_detector_accepts_rule_generated_plans() {
        let plan = RemediationPlanner
            .generate_plan(
                request(
                    vec![
                        "Missing policy for access",
                        "Configuration drift on bastion hosts",
                        "Documentation for the IAM baseline is stale",
                        "New-hire training does not mention least privilege",
                        "Approval process for elevated access is ad hoc",
                    ],
                    vec![],
                ),
                date(),
            )
            .expect("rule-generated dependencies are acyclic");
        assert!(ensure_acyclic(&plan.actions).is_ok());
    }

    #[test]
    fn empty_inputs_still_produce_the_completion_milestone() {
        let plan = RemediationPlanner
            .generate_plan(request(vec![], vec![]), date())
            .expect("plan generates");
        assert_eq!(plan.total_actions, 0);
        assert_eq!(plan.milestones.len(), 1);
        assert_eq!(plan.milestones[0].percentage_of_plan, 100);
        assert_eq!(plan.target_status, ImplementationStatus::PartiallyImplemented);
    }
}
