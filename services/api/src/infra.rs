use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use comply_ai::catalog::{AppId, CatalogError, Control, ControlCatalog, ControlId, StandardId};
use comply_ai::model::{ModelError, ModelInvoker, ModelOptions};
use comply_ai::workflows::remediation::RemediationPlan;
use comply_ai::workflows::scoring::{
    ChunkRelevance, ControlKey, ControlMapping, MappingStore, MappingUpdate, PlanSink,
    RelevanceIndex, SourceCorpusAccessor, StoreError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
pub(crate) struct InMemoryCatalog {
    controls: Mutex<HashMap<StandardId, Vec<Control>>>,
}

impl InMemoryCatalog {
    pub(crate) fn insert(&self, standard: StandardId, controls: Vec<Control>) {
        self.controls
            .lock()
            .expect("catalog mutex poisoned")
            .insert(standard, controls);
    }
}

impl ControlCatalog for InMemoryCatalog {
    fn controls_for_standard(&self, standard: StandardId) -> Result<Vec<Control>, CatalogError> {
        self.controls
            .lock()
            .expect("catalog mutex poisoned")
            .get(&standard)
            .cloned()
            .ok_or(CatalogError::EmptyStandard(standard))
    }
}

#[derive(Default)]
pub(crate) struct InMemoryCorpus {
    texts: Mutex<HashMap<AppId, String>>,
}

impl InMemoryCorpus {
    pub(crate) fn insert(&self, app: AppId, text: String) {
        self.texts
            .lock()
            .expect("corpus mutex poisoned")
            .insert(app, text);
    }
}

#[async_trait]
impl SourceCorpusAccessor for InMemoryCorpus {
    async fn fetch(&self, app: AppId) -> Result<String, StoreError> {
        self.texts
            .lock()
            .expect("corpus mutex poisoned")
            .get(&app)
            .cloned()
            .ok_or(StoreError::NoActiveSources(app))
    }
}

#[derive(Default)]
pub(crate) struct InMemoryRelevanceIndex {
    chunks: Mutex<HashMap<(AppId, ControlId), Vec<ChunkRelevance>>>,
}

impl InMemoryRelevanceIndex {
    pub(crate) fn insert(&self, app: AppId, control: ControlId, chunks: Vec<ChunkRelevance>) {
        self.chunks
            .lock()
            .expect("relevance mutex poisoned")
            .insert((app, control), chunks);
    }
}

#[async_trait]
impl RelevanceIndex for InMemoryRelevanceIndex {
    async fn active_chunks(
        &self,
        app: AppId,
        control: ControlId,
    ) -> Result<Vec<ChunkRelevance>, StoreError> {
        Ok(self
            .chunks
            .lock()
            .expect("relevance mutex poisoned")
            .get(&(app, control))
            .cloned()
            .unwrap_or_default())
    }
}

/// Mapping rows behind a mutex with all-or-nothing commits per standard.
#[derive(Default)]
pub(crate) struct InMemoryMappingStore {
    rows: Mutex<HashMap<(AppId, StandardId), BTreeMap<ControlId, ControlMapping>>>,
}

impl InMemoryMappingStore {
    pub(crate) fn seed(&self, mapping: ControlMapping) {
        self.rows
            .lock()
            .expect("store mutex poisoned")
            .entry((mapping.key.app, mapping.key.standard))
            .or_default()
            .insert(mapping.key.control, mapping);
    }

    pub(crate) fn snapshot(&self, app: AppId, standard: StandardId) -> Vec<ControlMapping> {
        self.rows
            .lock()
            .expect("store mutex poisoned")
            .get(&(app, standard))
            .map(|mappings| mappings.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MappingStore for InMemoryMappingStore {
    async fn mappings_for_standard(
        &self,
        app: AppId,
        standard: StandardId,
    ) -> Result<Vec<ControlMapping>, StoreError> {
        Ok(self.snapshot(app, standard))
    }

    async fn commit(
        &self,
        app: AppId,
        standard: StandardId,
        updates: Vec<MappingUpdate>,
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().expect("store mutex poisoned");
        let mappings = rows
            .get_mut(&(app, standard))
            .ok_or(StoreError::Unavailable("unknown standard".to_string()))?;

        for update in &updates {
            if !mappings.contains_key(&update.control) {
                return Err(StoreError::MappingNotFound(update.control));
            }
        }

        for update in updates {
            let mapping = mappings
                .get_mut(&update.control)
                .expect("existence checked above");
            mapping.percentage_completion = update.percentage_completion;
            if let Some(status) = update.status {
                mapping.implementation_status = status;
            }
            if let Some(analysis) = update.analysis {
                mapping.analysis = analysis;
            }
            mapping.updated_at = Utc::now();
        }

        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryPlanSink {
    plans: Mutex<HashMap<ControlKey, RemediationPlan>>,
}

impl InMemoryPlanSink {
    pub(crate) fn plans(&self) -> Vec<RemediationPlan> {
        self.plans
            .lock()
            .expect("plan sink mutex poisoned")
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PlanSink for InMemoryPlanSink {
    async fn has_plan(&self, key: ControlKey) -> Result<bool, StoreError> {
        Ok(self
            .plans
            .lock()
            .expect("plan sink mutex poisoned")
            .contains_key(&key))
    }

    async fn record(&self, key: ControlKey, plan: RemediationPlan) -> Result<(), StoreError> {
        self.plans
            .lock()
            .expect("plan sink mutex poisoned")
            .insert(key, plan);
        Ok(())
    }
}

/// Stand-in for an unconfigured model endpoint: every call fails softly, so
/// scoring always takes the deterministic fallback.
#[derive(Default)]
pub(crate) struct OfflineModel;

#[async_trait]
impl ModelInvoker for OfflineModel {
    async fn analyze(
        &self,
        _prompt: &str,
        _system_message: &str,
        _options: ModelOptions,
    ) -> Result<String, ModelError> {
        Err(ModelError::Unavailable(
            "no model endpoint configured".to_string(),
        ))
    }
}

/// Replays canned responses in order; used by the CLI demo.
#[derive(Default)]
pub(crate) struct ScriptedModel {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedModel {
    pub(crate) fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl ModelInvoker for ScriptedModel {
    async fn analyze(
        &self,
        _prompt: &str,
        _system_message: &str,
        _options: ModelOptions,
    ) -> Result<String, ModelError> {
        self.responses
            .lock()
            .expect("model mutex poisoned")
            .pop_front()
            .ok_or_else(|| ModelError::Unavailable("no scripted response left".to_string()))
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
