use crate::infra::{
    AppState, InMemoryMappingStore, InMemoryPlanSink, InMemoryRelevanceIndex,
};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json};
use chrono::{Local, NaiveDate};
use comply_ai::catalog::{AppId, ControlId, StandardId};
use comply_ai::error::AppError;
use comply_ai::workflows::remediation::{
    PlanRequest, PoamAssembler, RemediationPlan, RemediationPlanner, ReportMetadata,
};
use comply_ai::workflows::scoring::{
    BatchOrchestrator, EvidenceSuggestion, ImplementationStatus, InstantScorer, Recommendation,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// Shared pipeline handles for the HTTP surface.
#[derive(Clone)]
pub(crate) struct ApiContext {
    pub(crate) scorer: Arc<InstantScorer<InMemoryRelevanceIndex, InMemoryMappingStore>>,
    pub(crate) orchestrator: Arc<BatchOrchestrator>,
    pub(crate) store: Arc<InMemoryMappingStore>,
    pub(crate) plans: Arc<InMemoryPlanSink>,
}

pub(crate) fn api_router(context: ApiContext) -> axum::Router {
    axum::Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route(
            "/api/v1/compliance/instant-scores",
            post(instant_scores_endpoint),
        )
        .route("/api/v1/compliance/refine", post(refine_endpoint))
        .route("/api/v1/remediation/plan", post(plan_endpoint))
        .route("/api/v1/poam/report", post(poam_endpoint))
        .with_state(context)
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScoreRequest {
    pub(crate) app_id: i64,
    pub(crate) standard_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct MappingView {
    pub(crate) standard_id: i64,
    pub(crate) control_id: i64,
    pub(crate) status: &'static str,
    pub(crate) percentage_completion: u8,
    pub(crate) quality_score: u8,
    pub(crate) summary: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ScoreResponse {
    pub(crate) status: &'static str,
    pub(crate) mappings: Vec<MappingView>,
}

fn mapping_views(
    store: &InMemoryMappingStore,
    app: AppId,
    standards: &[StandardId],
) -> Vec<MappingView> {
    standards
        .iter()
        .flat_map(|&standard| {
            store.snapshot(app, standard).into_iter().map(move |mapping| MappingView {
                standard_id: standard.0,
                control_id: mapping.key.control.0,
                status: mapping.effective_status().label(),
                percentage_completion: mapping.percentage_completion,
                quality_score: mapping.analysis.quality_score,
                summary: mapping.analysis.summary,
            })
        })
        .collect()
}

pub(crate) async fn instant_scores_endpoint(
    State(context): State<ApiContext>,
    Json(payload): Json<ScoreRequest>,
) -> Result<Json<ScoreResponse>, AppError> {
    let app = AppId(payload.app_id);
    let standards: Vec<StandardId> = payload.standard_ids.iter().copied().map(StandardId).collect();

    context.scorer.compute_instant_scores(app, &standards).await?;

    Ok(Json(ScoreResponse {
        status: "completed",
        mappings: mapping_views(&context.store, app, &standards),
    }))
}

pub(crate) async fn refine_endpoint(
    State(context): State<ApiContext>,
    Json(payload): Json<ScoreRequest>,
) -> impl IntoResponse {
    let app = AppId(payload.app_id);
    let standards: Vec<StandardId> = payload.standard_ids.iter().copied().map(StandardId).collect();

    let orchestrator = context.orchestrator.clone();
    tokio::spawn(async move {
        if let Err(err) = orchestrator.refine_scores_with_model(app, &standards).await {
            warn!("background refinement failed: {err}");
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({ "status": "scheduled", "app_id": payload.app_id })),
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlanRequestBody {
    pub(crate) control_id: i64,
    pub(crate) control_name: String,
    pub(crate) current_status: ImplementationStatus,
    #[serde(default)]
    pub(crate) gaps: Vec<String>,
    #[serde(default)]
    pub(crate) recommendations: Vec<Recommendation>,
    #[serde(default)]
    pub(crate) evidence_needs: Vec<EvidenceSuggestion>,
    #[serde(default)]
    pub(crate) today: Option<NaiveDate>,
}

pub(crate) async fn plan_endpoint(
    Json(payload): Json<PlanRequestBody>,
) -> Result<Json<RemediationPlan>, AppError> {
    let today = payload.today.unwrap_or_else(|| Local::now().date_naive());
    let plan = RemediationPlanner.generate_plan(
        PlanRequest {
            control: ControlId(payload.control_id),
            control_name: payload.control_name,
            current_status: payload.current_status,
            gaps: payload.gaps,
            recommendations: payload.recommendations,
            evidence_needs: payload.evidence_needs,
        },
        today,
    )?;
    Ok(Json(plan))
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ReportFormat {
    #[default]
    Json,
    Text,
    Csv,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PoamRequestBody {
    pub(crate) plans: Vec<RemediationPlan>,
    pub(crate) metadata: ReportMetadata,
    #[serde(default)]
    pub(crate) format: ReportFormat,
    #[serde(default)]
    pub(crate) today: Option<NaiveDate>,
}

pub(crate) async fn poam_endpoint(
    Json(payload): Json<PoamRequestBody>,
) -> Result<axum::response::Response, AppError> {
    let today = payload.today.unwrap_or_else(|| Local::now().date_naive());
    let document = PoamAssembler.assemble(&payload.plans, payload.metadata, today);

    let response = match payload.format {
        ReportFormat::Json => Json(document).into_response(),
        ReportFormat::Text => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            document.to_text(),
        )
            .into_response(),
        ReportFormat::Csv => (
            [(header::CONTENT_TYPE, "text/csv")],
            document.to_csv()?,
        )
            .into_response(),
    };

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::seed_workspace;
    use crate::infra::{InMemoryCatalog, InMemoryCorpus, OfflineModel};
    use axum::body::Body;
    use axum::http::Request;
    use comply_ai::workflows::scoring::ScoringLimits;
    use tower::ServiceExt;

    fn context() -> ApiContext {
        let catalog = Arc::new(InMemoryCatalog::default());
        let corpus = Arc::new(InMemoryCorpus::default());
        let relevance = Arc::new(InMemoryRelevanceIndex::default());
        let store = Arc::new(InMemoryMappingStore::default());
        let plans = Arc::new(InMemoryPlanSink::default());
        seed_workspace(&catalog, &corpus, &relevance, &store);

        ApiContext {
            scorer: Arc::new(InstantScorer::new(relevance.clone(), store.clone())),
            orchestrator: Arc::new(BatchOrchestrator::new(
                catalog,
                corpus,
                relevance,
                store.clone(),
                Arc::new(OfflineModel),
                plans.clone(),
                ScoringLimits::default(),
            )),
            store,
            plans,
        }
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let router = api_router(context());
        let response = router
            .oneshot(
                Request::get("/health")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("request succeeds");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn instant_scores_return_mapping_views() {
        let router = api_router(context());
        let response = router
            .oneshot(
                Request::post("/api/v1/compliance/instant-scores")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&json!({ "app_id": 1, "standard_ids": [1] }))
                            .expect("payload serializes"),
                    ))
                    .expect("request builds"),
            )
            .await
            .expect("request succeeds");

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let parsed: serde_json::Value = serde_json::from_slice(&body).expect("body parses");
        assert_eq!(parsed["status"], "completed");
        assert!(!parsed["mappings"].as_array().expect("array").is_empty());
    }

    #[tokio::test]
    async fn plan_endpoint_generates_a_full_plan() {
        let router = api_router(context());
        let payload = json!({
            "control_id": 4,
            "control_name": "AU-2",
            "current_status": "partially_implemented",
            "gaps": ["Missing policy describing audit log retention"],
            "recommendations": [
                {"priority": "high", "action": "Enable centralized log shipping", "rationale": "Single audit trail"}
            ],
            "today": "2026-08-03"
        });

        let response = router
            .oneshot(
                Request::post("/api/v1/remediation/plan")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(serde_json::to_vec(&payload).expect("payload serializes")))
                    .expect("request builds"),
            )
            .await
            .expect("request succeeds");

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let plan: RemediationPlan = serde_json::from_slice(&body).expect("plan parses");
        assert_eq!(plan.control_name, "AU-2");
        assert_eq!(plan.total_actions, 2);
        assert!(plan
            .milestones
            .iter()
            .any(|milestone| milestone.percentage_of_plan == 100));
    }

    #[tokio::test]
    async fn poam_endpoint_renders_csv_when_asked() {
        let router = api_router(context());

        let plan_payload = json!({
            "control_id": 4,
            "control_name": "AU-2",
            "current_status": "not_implemented",
            "gaps": ["Missing policy describing audit log retention"],
            "today": "2026-08-03"
        });
        let plan_response = router
            .clone()
            .oneshot(
                Request::post("/api/v1/remediation/plan")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&plan_payload).expect("payload serializes"),
                    ))
                    .expect("request builds"),
            )
            .await
            .expect("request succeeds");
        let plan_body = axum::body::to_bytes(plan_response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let plan: serde_json::Value = serde_json::from_slice(&plan_body).expect("plan parses");

        let payload = json!({
            "plans": [plan],
            "metadata": {
                "system_name": "Demo System",
                "compliance_framework": "NIST 800-53",
                "prepared_by": "Compliance Automation"
            },
            "format": "csv",
            "today": "2026-08-03"
        });
        let response = router
            .oneshot(
                Request::post("/api/v1/poam/report")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(serde_json::to_vec(&payload).expect("payload serializes")))
                    .expect("request builds"),
            )
            .await
            .expect("request succeeds");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("text/csv")
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let csv = String::from_utf8(body.to_vec()).expect("csv is utf-8");
        assert!(csv.starts_with("Weakness ID,Control ID"));
        assert!(csv.contains("W-AU-2"));
    }
}
