use anyhow::Result;
use async_trait::async_trait;
use kbc::config::StorePaths;
use kbc::errors::ProviderError;
use kbc::providers::ai::AiProvider;
use kbc::providers::batch::{BatchProvider, BatchSpec};
use kbc::providers::reference::{ClaimValue, Claims, ReferenceSource};
use kbc::providers::search::SearchProvider;
use kbc::store::FsJobStore;
use kbc::types::BatchStatus;
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// --- Test Setup ---

/// A sandboxed job store layout for each test.
pub struct TestSetup {
    /// Keeps the sandbox alive for the duration of the test.
    pub dir: TempDir,
    pub paths: StorePaths,
}

impl TestSetup {
    /// Creates a fresh temporary directory holding the job stores and a
    /// `triples/` output directory.
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let paths = StorePaths::under(dir.path().join("work"), dir.path().join("triples"));
        Ok(Self { dir, paths })
    }

    pub fn store(&self) -> FsJobStore {
        FsJobStore::new(self.paths.clone())
    }
}

// --- Fixtures ---

/// Builds one line of batch output in the provider's format.
///
/// `facts` is serialized as the model's answer under the `facts` key.
pub fn batch_output_line(custom_id: &str, finish_reason: &str, facts: serde_json::Value) -> String {
    let content = json!({ "facts": facts }).to_string();
    json!({
        "custom_id": custom_id,
        "response": {"body": {"choices": [{
            "finish_reason": finish_reason,
            "message": {"refusal": null, "content": content}
        }]}}
    })
    .to_string()
}

// --- Mock AI Provider ---

#[derive(Clone, Debug)]
pub struct MockAiProvider {
    responses: Arc<Mutex<Vec<(String, String)>>>,
    default_response: Arc<Mutex<Option<String>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockAiProvider {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            default_response: Arc::new(Mutex::new(None)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Pre-programs a response for any call whose system or user prompt
    /// contains `key`. Keys are tried in the order they were added.
    pub fn add_response(&self, key: &str, response: &str) {
        let mut responses = self.responses.lock().unwrap();
        responses.push((key.to_string(), response.to_string()));
    }

    /// The response used when no key matches.
    pub fn set_default_response(&self, response: &str) {
        *self.default_response.lock().unwrap() = Some(response.to_string());
    }

    /// Retrieves the recorded calls for assertion.
    pub fn get_calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockAiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));

        let responses = self.responses.lock().unwrap();
        for (key, response) in responses.iter() {
            if system_prompt.contains(key) || user_prompt.contains(key) {
                return Ok(response.clone());
            }
        }
        if let Some(response) = self.default_response.lock().unwrap().clone() {
            return Ok(response);
        }

        Err(ProviderError::Api {
            status: 500,
            body: format!("MockAiProvider: No response programmed. Got: '{user_prompt}'"),
        })
    }
}

// --- Mock Batch Provider ---

#[derive(Default)]
struct BatchState {
    uploads: Vec<(String, Vec<u8>)>,
    create_attempts: u32,
    rate_limited_creates: u32,
    fail_create_status: Option<u16>,
    created: Vec<String>,
    statuses: HashMap<String, VecDeque<BatchStatus>>,
    failing_status: HashSet<String>,
    results: HashMap<String, Vec<u8>>,
    fetches: Vec<String>,
}

/// An in-memory batch API with scripted behavior.
///
/// Batches are named `batch_1`, `batch_2`, ... in creation order. A batch
/// with no scripted status reports `in_progress`.
#[derive(Clone, Default)]
pub struct MockBatchProvider {
    state: Arc<Mutex<BatchState>>,
}

impl MockBatchProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` create calls fail with `RateLimited`.
    pub fn rate_limit_creates(&self, count: u32) {
        self.state.lock().unwrap().rate_limited_creates = count;
    }

    /// Every create call fails with a non-retryable API error.
    pub fn fail_creates_with(&self, status: u16) {
        self.state.lock().unwrap().fail_create_status = Some(status);
    }

    /// Scripts the statuses `batch_id` reports, one per call. The last one
    /// repeats.
    pub fn script_statuses(&self, batch_id: &str, statuses: &[BatchStatus]) {
        self.state
            .lock()
            .unwrap()
            .statuses
            .insert(batch_id.to_string(), statuses.iter().cloned().collect());
    }

    pub fn set_status(&self, batch_id: &str, status: BatchStatus) {
        self.script_statuses(batch_id, &[status]);
    }

    /// Status lookups for `batch_id` fail.
    pub fn fail_status(&self, batch_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_status
            .insert(batch_id.to_string());
    }

    pub fn set_result(&self, batch_id: &str, lines: &[String]) {
        let mut blob = lines.join("\n");
        blob.push('\n');
        self.state
            .lock()
            .unwrap()
            .results
            .insert(batch_id.to_string(), blob.into_bytes());
    }

    pub fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn create_attempts(&self) -> u32 {
        self.state.lock().unwrap().create_attempts
    }

    pub fn created(&self) -> Vec<String> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn fetches(&self) -> Vec<String> {
        self.state.lock().unwrap().fetches.clone()
    }
}

#[async_trait]
impl BatchProvider for MockBatchProvider {
    async fn upload_requests(
        &self,
        file_name: &str,
        payload: Vec<u8>,
    ) -> Result<String, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.uploads.push((file_name.to_string(), payload));
        Ok(format!("file_{}", state.uploads.len()))
    }

    async fn create_batch(
        &self,
        _input_file_id: &str,
        _spec: &BatchSpec,
    ) -> Result<String, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.create_attempts += 1;
        if let Some(status) = state.fail_create_status {
            return Err(ProviderError::Api {
                status,
                body: "MockBatchProvider: create failed".to_string(),
            });
        }
        if state.rate_limited_creates > 0 {
            state.rate_limited_creates -= 1;
            return Err(ProviderError::RateLimited(
                "MockBatchProvider: slow down".to_string(),
            ));
        }
        let batch_id = format!("batch_{}", state.created.len() + 1);
        state.created.push(batch_id.clone());
        Ok(batch_id)
    }

    async fn get_status(&self, batch_id: &str) -> Result<BatchStatus, ProviderError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_status.contains(batch_id) {
            return Err(ProviderError::Api {
                status: 503,
                body: format!("MockBatchProvider: status of {batch_id} unavailable"),
            });
        }
        let Some(queue) = state.statuses.get_mut(batch_id) else {
            return Ok(BatchStatus::InProgress);
        };
        let status = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(status.unwrap_or(BatchStatus::InProgress))
    }

    async fn fetch_result(&self, batch_id: &str) -> Result<Vec<u8>, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.fetches.push(batch_id.to_string());
        state.results.get(batch_id).cloned().ok_or_else(|| {
            ProviderError::MissingField(format!("output of batch {batch_id}"))
        })
    }
}

// --- Mock Search Provider ---

#[derive(Clone, Default)]
pub struct MockSearchProvider {
    results: Arc<Mutex<HashMap<String, Vec<String>>>>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl MockSearchProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Programs the snippets returned for an exact query. Unknown queries
    /// return no snippets.
    pub fn add_results(&self, query: &str, snippets: &[&str]) {
        self.results.lock().unwrap().insert(
            query.to_string(),
            snippets.iter().map(|s| s.to_string()).collect(),
        );
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<String>, ProviderError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self
            .results
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_default())
    }
}

// --- Mock Reference Source ---

#[derive(Clone, Default)]
pub struct MockReferenceSource {
    entities: Arc<Mutex<HashMap<String, String>>>,
    claims: Arc<Mutex<HashMap<String, Claims>>>,
    labels: Arc<Mutex<HashMap<String, String>>>,
    label_lookups: Arc<Mutex<Vec<String>>>,
}

impl MockReferenceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity with its entity-valued claims, given as
    /// `(property id, object id)` pairs.
    pub fn add_entity(&self, name: &str, id: &str, claims: &[(&str, &str)]) {
        self.entities
            .lock()
            .unwrap()
            .insert(name.to_string(), id.to_string());
        let mut by_property = Claims::new();
        for (property, object) in claims {
            by_property
                .entry(property.to_string())
                .or_default()
                .push(ClaimValue::Entity(object.to_string()));
        }
        self.claims.lock().unwrap().insert(id.to_string(), by_property);
    }

    /// Adds a literal-valued claim to an already registered entity.
    pub fn add_literal(&self, id: &str, property: &str, value: &str) {
        self.claims
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .entry(property.to_string())
            .or_default()
            .push(ClaimValue::Literal(value.to_string()));
    }

    pub fn add_label(&self, id: &str, label: &str) {
        self.labels
            .lock()
            .unwrap()
            .insert(id.to_string(), label.to_string());
    }

    pub fn label_lookups(&self) -> Vec<String> {
        self.label_lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReferenceSource for MockReferenceSource {
    async fn resolve_entity_id(&self, name: &str) -> Result<Option<String>, ProviderError> {
        Ok(self.entities.lock().unwrap().get(name).cloned())
    }

    async fn fetch_claims(&self, entity_id: &str) -> Result<Claims, ProviderError> {
        Ok(self
            .claims
            .lock()
            .unwrap()
            .get(entity_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn resolve_label(&self, id: &str) -> Result<Option<String>, ProviderError> {
        self.label_lookups.lock().unwrap().push(id.to_string());
        Ok(self.labels.lock().unwrap().get(id).cloned())
    }
}
