#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use comply_ai::catalog::{AppId, CatalogError, Control, ControlCatalog, ControlId, StandardId};
use comply_ai::model::{ModelError, ModelInvoker, ModelOptions};
use comply_ai::workflows::remediation::RemediationPlan;
use comply_ai::workflows::scoring::{
    ChunkRelevance, ControlKey, ControlMapping, MappingStore, MappingUpdate, PlanSink,
    RelevanceIndex, SourceCorpusAccessor, StoreError,
};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Mutex;

pub fn control(id: i64, name: &str, long_name: &str) -> Control {
    Control {
        id: ControlId(id),
        name: name.to_string(),
        long_name: long_name.to_string(),
        text: format!("The organization {long_name}."),
        parent: None,
        order_index: id as u32,
        active: true,
    }
}

pub fn key(app: AppId, standard: StandardId, control: ControlId) -> ControlKey {
    ControlKey {
        app,
        standard,
        control,
    }
}

pub fn chunk(id: i64, score: f64) -> ChunkRelevance {
    ChunkRelevance {
        chunk_id: id,
        relevance_score: score,
        is_active: true,
    }
}

#[derive(Default)]
pub struct InMemoryCatalog {
    controls: HashMap<StandardId, Vec<Control>>,
}

impl InMemoryCatalog {
    pub fn with_standard(mut self, standard: StandardId, controls: Vec<Control>) -> Self {
        self.controls.insert(standard, controls);
        self
    }
}

impl ControlCatalog for InMemoryCatalog {
    fn controls_for_standard(&self, standard: StandardId) -> Result<Vec<Control>, CatalogError> {
        self.controls
            .get(&standard)
            .cloned()
            .ok_or(CatalogError::EmptyStandard(standard))
    }
}

pub struct StaticCorpus {
    text: String,
}

impl StaticCorpus {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

#[async_trait]
impl SourceCorpusAccessor for StaticCorpus {
    async fn fetch(&self, _app: AppId) -> Result<String, StoreError> {
        Ok(self.text.clone())
    }
}

#[derive(Default)]
pub struct InMemoryRelevance {
    chunks: HashMap<(AppId, ControlId), Vec<ChunkRelevance>>,
}

impl InMemoryRelevance {
    pub fn with_chunks(mut self, app: AppId, control: ControlId, chunks: Vec<ChunkRelevance>) -> Self {
        self.chunks.insert((app, control), chunks);
        self
    }
}

#[async_trait]
impl RelevanceIndex for InMemoryRelevance {
    async fn active_chunks(
        &self,
        app: AppId,
        control: ControlId,
    ) -> Result<Vec<ChunkRelevance>, StoreError> {
        Ok(self.chunks.get(&(app, control)).cloned().unwrap_or_default())
    }
}

/// Mutex-guarded mapping rows with all-or-nothing commits, mirroring the
/// one-transaction-per-standard contract.
#[derive(Default)]
pub struct InMemoryMappingStore {
    rows: Mutex<HashMap<(AppId, StandardId), BTreeMap<ControlId, ControlMapping>>>,
    failing_standards: Mutex<HashSet<StandardId>>,
    commits: Mutex<Vec<StandardId>>,
}

impl InMemoryMappingStore {
    pub fn seed(&self, mapping: ControlMapping) {
        let mut rows = self.rows.lock().expect("store mutex poisoned");
        rows.entry((mapping.key.app, mapping.key.standard))
            .or_default()
            .insert(mapping.key.control, mapping);
    }

    pub fn fail_standard(&self, standard: StandardId) {
        self.failing_standards
            .lock()
            .expect("store mutex poisoned")
            .insert(standard);
    }

    pub fn get(&self, app: AppId, standard: StandardId, control: ControlId) -> ControlMapping {
        let rows = self.rows.lock().expect("store mutex poisoned");
        rows.get(&(app, standard))
            .and_then(|mappings| mappings.get(&control))
            .cloned()
            .expect("mapping seeded")
    }

    pub fn committed_standards(&self) -> Vec<StandardId> {
        self.commits.lock().expect("store mutex poisoned").clone()
    }
}

#[async_trait]
impl MappingStore for InMemoryMappingStore {
    async fn mappings_for_standard(
        &self,
        app: AppId,
        standard: StandardId,
    ) -> Result<Vec<ControlMapping>, StoreError> {
        if self
            .failing_standards
            .lock()
            .expect("store mutex poisoned")
            .contains(&standard)
        {
            return Err(StoreError::Unavailable(format!(
                "standard {standard} is offline"
            )));
        }
        let rows = self.rows.lock().expect("store mutex poisoned");
        Ok(rows
            .get(&(app, standard))
            .map(|mappings| mappings.values().cloned().collect())
            .unwrap_or_default())
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

        // All-or-nothing: verify every row exists before touching any.
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

        self.commits
            .lock()
            .expect("store mutex poisoned")
            .push(standard);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPlanSink {
    plans: Mutex<HashMap<ControlKey, RemediationPlan>>,
    records: Mutex<usize>,
}

impl RecordingPlanSink {
    pub fn plans(&self) -> Vec<RemediationPlan> {
        self.plans
            .lock()
            .expect("sink mutex poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn record_count(&self) -> usize {
        *self.records.lock().expect("sink mutex poisoned")
    }

    pub fn plan_for(&self, key: ControlKey) -> Option<RemediationPlan> {
        self.plans.lock().expect("sink mutex poisoned").get(&key).cloned()
    }
}

#[async_trait]
impl PlanSink for RecordingPlanSink {
    async fn has_plan(&self, key: ControlKey) -> Result<bool, StoreError> {
        Ok(self.plans.lock().expect("sink mutex poisoned").contains_key(&key))
    }

    async fn record(&self, key: ControlKey, plan: RemediationPlan) -> Result<(), StoreError> {
        self.plans.lock().expect("sink mutex poisoned").insert(key, plan);
        *self.records.lock().expect("sink mutex poisoned") += 1;
        Ok(())
    }
}

/// Model stub that replays scripted responses in order and records every
/// prompt it was given.
#[derive(Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedModel {
    pub fn with_responses(responses: Vec<Result<&str, &str>>) -> Self {
        Self {
            responses: Mutex::new(
                responses
                    .into_iter()
                    .map(|response| match response {
                        Ok(body) => Ok(body.to_string()),
                        Err(message) => Err(message.to_string()),
                    })
                    .collect(),
            ),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("model mutex poisoned").len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("model mutex poisoned")
            .iter()
            .map(|(prompt, _)| prompt.clone())
            .collect()
    }
}

#[async_trait]
impl ModelInvoker for ScriptedModel {
    async fn analyze(
        &self,
        prompt: &str,
        system_message: &str,
        _options: ModelOptions,
    ) -> Result<String, ModelError> {
        self.calls
            .lock()
            .expect("model mutex poisoned")
            .push((prompt.to_string(), system_message.to_string()));

        match self
            .responses
            .lock()
            .expect("model mutex poisoned")
            .pop_front()
        {
            Some(Ok(body)) => Ok(body),
            Some(Err(message)) => Err(ModelError::Unavailable(message)),
            None => Err(ModelError::Unavailable("no scripted response left".to_string())),
        }
    }
}
