use crate::cli::ServeArgs;
use crate::demo::seed_workspace;
use crate::infra::{
    AppState, InMemoryCatalog, InMemoryCorpus, InMemoryMappingStore, InMemoryPlanSink,
    InMemoryRelevanceIndex, OfflineModel,
};
use crate::routes::{api_router, ApiContext};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use comply_ai::config::AppConfig;
use comply_ai::error::AppError;
use comply_ai::telemetry;
use comply_ai::workflows::scoring::{BatchOrchestrator, InstantScorer};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let catalog = Arc::new(InMemoryCatalog::default());
    let corpus = Arc::new(InMemoryCorpus::default());
    let relevance = Arc::new(InMemoryRelevanceIndex::default());
    let store = Arc::new(InMemoryMappingStore::default());
    let plans = Arc::new(InMemoryPlanSink::default());
    seed_workspace(&catalog, &corpus, &relevance, &store);

    let context = ApiContext {
        scorer: Arc::new(InstantScorer::new(relevance.clone(), store.clone())),
        orchestrator: Arc::new(BatchOrchestrator::new(
            catalog,
            corpus,
            relevance,
            store.clone(),
            Arc::new(OfflineModel),
            plans.clone(),
            config.scoring,
        )),
        store,
        plans,
    };

    let app = api_router(context)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "compliance scoring service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
