use crate::infra::{
    InMemoryCatalog, InMemoryCorpus, InMemoryMappingStore, InMemoryPlanSink,
    InMemoryRelevanceIndex, ScriptedModel,
};
use chrono::{Local, NaiveDate};
use clap::Args;
use comply_ai::catalog::{AppId, Control, ControlId, StandardId};
use comply_ai::error::AppError;
use comply_ai::workflows::remediation::{
    PlanRequest, PoamAssembler, RemediationPlanner, ReportMetadata,
};
use comply_ai::workflows::scoring::{
    BatchOrchestrator, ChunkRelevance, ControlKey, ControlMapping, EvidenceSuggestionEngine,
    ImplementationStatus, InstantScorer, Recommendation, RecommendationPriority, ScoringLimits,
};
use std::sync::Arc;

pub(crate) const DEMO_APP: AppId = AppId(1);
pub(crate) const DEMO_STANDARD: StandardId = StandardId(1);

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Report date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub(crate) struct PoamReportArgs {
    /// Report date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Output format for the report.
    #[arg(long, value_enum, default_value = "text")]
    pub(crate) format: PoamReportFormat,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub(crate) enum PoamReportFormat {
    Text,
    Json,
    Csv,
}

fn demo_control(id: i64, name: &str, long_name: &str, text: &str) -> Control {
    Control {
        id: ControlId(id),
        name: name.to_string(),
        long_name: long_name.to_string(),
        text: text.to_string(),
        parent: None,
        order_index: id as u32,
        active: true,
    }
}

/// Seeds one application with one attached standard, relevance-indexed
/// evidence chunks, and a combined source text.
pub(crate) fn seed_workspace(
    catalog: &InMemoryCatalog,
    corpus: &InMemoryCorpus,
    relevance: &InMemoryRelevanceIndex,
    store: &InMemoryMappingStore,
) {
    let controls = vec![
        demo_control(
            1,
            "AC-2",
            "Account Management",
            "Manage system accounts, including establishing, activating, modifying, reviewing, disabling, and removing accounts.",
        ),
        demo_control(
            2,
            "AU-2",
            "Audit Events",
            "Identify the events the system is capable of auditing and coordinate the audit function with other entities.",
        ),
        demo_control(
            3,
            "CM-6",
            "Configuration Settings",
            "Establish and document configuration settings that reflect the most restrictive mode consistent with operational requirements.",
        ),
        demo_control(
            4,
            "IR-4",
            "Incident Handling",
            "Implement an incident handling capability that includes preparation, detection, analysis, containment, eradication, and recovery.",
        ),
        demo_control(
            5,
            "SI-7",
            "Software Integrity",
            "Employ integrity verification tools to detect unauthorized changes to software, firmware, and information.",
        ),
    ];

    for control in &controls {
        store.seed(ControlMapping::new(ControlKey {
            app: DEMO_APP,
            standard: DEMO_STANDARD,
            control: control.id,
        }));
    }
    catalog.insert(DEMO_STANDARD, controls);

    let chunk = |id: i64, score: f64| ChunkRelevance {
        chunk_id: id,
        relevance_score: score,
        is_active: true,
    };
    relevance.insert(DEMO_APP, ControlId(1), vec![chunk(1, 85.0), chunk(2, 90.0)]);
    relevance.insert(DEMO_APP, ControlId(2), vec![chunk(3, 60.0), chunk(4, 50.0)]);
    relevance.insert(DEMO_APP, ControlId(3), vec![chunk(5, 45.0)]);
    relevance.insert(DEMO_APP, ControlId(4), vec![]);
    relevance.insert(DEMO_APP, ControlId(5), vec![chunk(6, 30.0)]);

    corpus.insert(
        DEMO_APP,
        "All user accounts are provisioned and deprovisioned through the corporate identity \
provider, with single sign-on and multi-factor authentication enforced for every login. \
Audit logging is enabled for authentication events and API calls, shipped to a central \
log platform. Infrastructure is defined with Terraform and configuration baselines are \
stored in version control. Patching runs on a monthly cadence. There is no written \
incident response plan; on-call engineers improvise during outages."
            .to_string(),
    );
}

fn scripted_batch_response() -> String {
    r#"[
  {
    "control_id": "AC-2",
    "implementation_status": "implemented",
    "percentage_completion": 90,
    "explanation": "Account lifecycle management is centralized: accounts are provisioned and deprovisioned through the corporate identity provider with SSO and MFA enforced for every login.",
    "evidence_found": ["Accounts provisioned and deprovisioned through the corporate identity provider", "Multi-factor authentication enforced for every login"],
    "gaps": [],
    "recommendations": []
  },
  {
    "control_id": "AU-2",
    "implementation_status": "partially_implemented",
    "percentage_completion": 55,
    "explanation": "Audit logging covers authentication events and API calls and is shipped centrally, but the source never defines retention periods or a review cadence for those logs.",
    "evidence_found": ["Audit logging is enabled for authentication events and API calls"],
    "gaps": ["Audit log retention period and review cadence are not defined in any document"],
    "recommendations": [
      {"priority": "high", "action": "Publish an audit logging policy defining a one-year retention period and quarterly reviews", "rationale": "Retention and review requirements are auditable obligations"}
    ]
  },
  {
    "control_id": "CM-6",
    "implementation_status": "partially_implemented",
    "percentage_completion": 45,
    "explanation": "Configuration baselines exist in version control via Terraform, but there is no documented hardening standard describing the required settings per component.",
    "evidence_found": ["Infrastructure is defined with Terraform and configuration baselines are stored in version control"],
    "gaps": ["No documented hardening standard lists the required configuration settings per component"],
    "recommendations": [
      {"priority": "medium", "action": "Document a hardening standard per component class and link it from the Terraform repositories", "rationale": "Baselines need a written reference to audit against"}
    ]
  },
  {
    "control_id": "IR-4",
    "implementation_status": "not_implemented",
    "percentage_completion": 5,
    "explanation": "The source states outright that there is no written incident response plan and that on-call engineers improvise during outages, so the capability is absent.",
    "evidence_found": [],
    "gaps": ["There is no written incident response plan covering detection, containment, and recovery"],
    "recommendations": [
      {"priority": "high", "action": "Author an incident response plan with severity classification, escalation paths, and containment playbooks", "rationale": "Improvised response does not satisfy incident handling requirements"}
    ]
  },
  {
    "control_id": "SI-7",
    "implementation_status": "planned",
    "percentage_completion": 20,
    "explanation": "Monthly patching provides some integrity hygiene, but no integrity verification tooling is mentioned anywhere in the provided source material.",
    "evidence_found": ["Patching runs on a monthly cadence"],
    "gaps": ["No file or software integrity verification tooling is described in the source"],
    "recommendations": [
      {"priority": "medium", "action": "Deploy file integrity monitoring on production hosts and alert on unexpected changes", "rationale": "Detects unauthorized modification between patch cycles"}
    ]
  }
]"#
    .to_string()
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());

    let catalog = Arc::new(InMemoryCatalog::default());
    let corpus = Arc::new(InMemoryCorpus::default());
    let relevance = Arc::new(InMemoryRelevanceIndex::default());
    let store = Arc::new(InMemoryMappingStore::default());
    let plans = Arc::new(InMemoryPlanSink::default());
    seed_workspace(&catalog, &corpus, &relevance, &store);

    println!("== Instant scoring (no model calls) ==");
    let scorer = InstantScorer::new(relevance.clone(), store.clone());
    scorer
        .compute_instant_scores(DEMO_APP, &[DEMO_STANDARD])
        .await?;
    print_snapshot(&store);

    println!();
    println!("== Model refinement (scripted model) ==");
    let model = Arc::new(ScriptedModel::with_responses(vec![scripted_batch_response()]));
    let orchestrator = BatchOrchestrator::new(
        catalog,
        corpus,
        relevance,
        store.clone(),
        model,
        plans.clone(),
        ScoringLimits::default(),
    );
    orchestrator
        .refine_scores_with_model(DEMO_APP, &[DEMO_STANDARD])
        .await?;
    print_snapshot(&store);

    println!();
    println!("== POAM report ==");
    let recorded = plans.plans();
    let document = PoamAssembler.assemble(
        &recorded,
        ReportMetadata {
            system_name: "Demo Payments Platform".to_string(),
            compliance_framework: "NIST 800-53".to_string(),
            prepared_by: "Compliance Automation".to_string(),
        },
        today,
    );
    println!("{}", document.to_text());

    Ok(())
}

fn print_snapshot(store: &InMemoryMappingStore) {
    for mapping in store.snapshot(DEMO_APP, DEMO_STANDARD) {
        println!(
            "  control {:<3} {:<24} {:>3}%  quality {:>3}  {}",
            mapping.key.control,
            mapping.effective_status().label(),
            mapping.percentage_completion,
            mapping.analysis.quality_score,
            mapping.analysis.summary,
        );
    }
}

/// Builds remediation plans for the demo gaps without any model involvement
/// and prints the assembled POAM in the requested format.
pub(crate) fn run_poam_report(args: PoamReportArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let planner = RemediationPlanner;
    let suggestions = EvidenceSuggestionEngine;

    let requests = vec![
        (
            ControlId(4),
            "IR-4",
            ImplementationStatus::NotImplemented,
            vec!["There is no written incident response plan covering detection and recovery".to_string()],
            vec![Recommendation {
                priority: RecommendationPriority::High,
                action: "Author an incident response plan with escalation paths".to_string(),
                rationale: "Improvised response does not satisfy incident handling requirements"
                    .to_string(),
            }],
        ),
        (
            ControlId(2),
            "AU-2",
            ImplementationStatus::PartiallyImplemented,
            vec!["Audit log retention period and review cadence are not defined in any document".to_string()],
            vec![Recommendation {
                priority: RecommendationPriority::High,
                action: "Publish an audit logging policy defining retention and review cadence"
                    .to_string(),
                rationale: "Retention and review requirements are auditable obligations".to_string(),
            }],
        ),
    ];

    let mut plans = Vec::new();
    for (control, name, status, gaps, recommendations) in requests {
        let evidence_needs = suggestions.suggestions_for(name, status, &gaps, &[]);
        plans.push(planner.generate_plan(
            PlanRequest {
                control,
                control_name: name.to_string(),
                current_status: status,
                gaps,
                recommendations,
                evidence_needs,
            },
            today,
        )?);
    }

    let document = PoamAssembler.assemble(
        &plans,
        ReportMetadata {
            system_name: "Demo Payments Platform".to_string(),
            compliance_framework: "NIST 800-53".to_string(),
            prepared_by: "Compliance Automation".to_string(),
        },
        today,
    );

    match args.format {
        PoamReportFormat::Text => println!("{}", document.to_text()),
        PoamReportFormat::Json => println!("{}", document.to_json()?),
        PoamReportFormat::Csv => println!("{}", document.to_csv()?),
    }

    Ok(())
}
