//! Shared fakes for integration tests.
//!
//! The fake backend labels every text with `<model dir name>:<text>`, so a
//! test can tell which model answered and in what order.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Condvar, Mutex};
use tempfile::TempDir;
use tokio::sync::Notify;

use inference_server::engine::{
    Device, InferenceError, LabelScore, ModelKwargs, Pipeline, PipelineFactory, PipelineSpec,
    Prediction, Task,
};
use inference_server::models::{
    HubClient, HubRequest, HubSnapshot, LoadError, ModelLoader, ModelManager, RegistryClient,
};

// ============================================================================
// Fake pipeline backend
// ============================================================================

/// Directory names containing this marker fail to build.
pub const BROKEN_MARKER: &str = "broken";

/// Pipelines built from directories containing this marker block inside
/// `predict` until the factory's gate is released.
pub const GATED_MARKER: &str = "gated";

/// Holds gated predictions inside the pipeline call.
#[derive(Default)]
pub struct PredictGate {
    entered: Notify,
    released: Mutex<bool>,
    cond: Condvar,
}

impl PredictGate {
    /// Resolves once a gated prediction is running.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        *self.released.lock() = true;
        self.cond.notify_all();
    }

    fn pass(&self) {
        self.entered.notify_one();
        let mut released = self.released.lock();
        while !*released {
            self.cond.wait(&mut released);
        }
    }
}

pub struct FakePipeline {
    tag: String,
    commit: Option<String>,
    calls: Arc<AtomicUsize>,
    gate: Option<Arc<PredictGate>>,
}

impl Pipeline for FakePipeline {
    fn task(&self) -> Task {
        Task::TextClassification
    }

    fn commit_hash(&self) -> Option<&str> {
        self.commit.as_deref()
    }

    fn predict(
        &self,
        texts: &[String],
        top_k: Option<usize>,
    ) -> Result<Vec<Prediction>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.pass();
        }
        Ok(texts
            .iter()
            .map(|text| {
                let best = LabelScore {
                    label: format!("{}:{}", self.tag, text),
                    score: 0.9,
                };
                match top_k {
                    None => Prediction::Top(best),
                    Some(k) => {
                        let mut ranked = vec![
                            best,
                            LabelScore {
                                label: "OTHER".to_string(),
                                score: 0.1,
                            },
                        ];
                        ranked.truncate(k);
                        Prediction::Ranked(ranked)
                    }
                }
            })
            .collect())
    }
}

#[derive(Default)]
pub struct FakeFactory {
    pub builds: AtomicUsize,
    pub predict_calls: Arc<AtomicUsize>,
    pub gate: Arc<PredictGate>,
}

impl FakeFactory {
    pub fn predict_count(&self) -> usize {
        self.predict_calls.load(Ordering::SeqCst)
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl PipelineFactory for FakeFactory {
    fn backend(&self) -> &'static str {
        "fake"
    }

    fn build(&self, spec: &PipelineSpec) -> Result<Box<dyn Pipeline>, LoadError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        let tag = dir_tag(spec.model.root());
        if tag.contains(BROKEN_MARKER) {
            return Err(LoadError::Pipeline(format!("cannot build {}", tag)));
        }
        let gate = tag.contains(GATED_MARKER).then(|| Arc::clone(&self.gate));
        Ok(Box::new(FakePipeline {
            tag,
            commit: spec.model.manifest().commit_hash.clone(),
            calls: Arc::clone(&self.predict_calls),
            gate,
        }))
    }
}

fn dir_tag(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ============================================================================
// Model directories
// ============================================================================

/// Write a minimal classification model into `parent/name`.
pub fn write_model_dir(parent: &Path, name: &str, commit: Option<&str>) -> PathBuf {
    let dir = parent.join(name);
    fs::create_dir_all(&dir).unwrap();
    let mut config = serde_json::json!({
        "architectures": ["DistilBertForSequenceClassification"],
        "model_type": "distilbert",
        "id2label": {"0": "NEGATIVE", "1": "POSITIVE"}
    });
    if let Some(hash) = commit {
        config["_commit_hash"] = serde_json::Value::from(hash);
    }
    fs::write(dir.join("config.json"), config.to_string()).unwrap();
    fs::write(dir.join("tokenizer.json"), "{}").unwrap();
    dir
}

pub fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn no_kwargs() -> ModelKwargs {
    ModelKwargs::new()
}

// ============================================================================
// Fake hub
// ============================================================================

/// Serves snapshots from directories under `root`, named after the model id
/// with `/` replaced by `--`.
pub struct FakeHub {
    pub root: PathBuf,
    pub reported_commit: Option<String>,
    pub fetches: AtomicUsize,
}

impl FakeHub {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            reported_commit: None,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn snapshot_dir(&self, model_id: &str) -> PathBuf {
        self.root.join(model_id.replace('/', "--"))
    }
}

#[async_trait]
impl HubClient for FakeHub {
    async fn fetch(&self, request: &HubRequest) -> Result<HubSnapshot, LoadError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let dir = self.snapshot_dir(&request.model_id);
        if !dir.is_dir() {
            return Err(LoadError::RemoteNotFound(request.model_id.clone()));
        }
        Ok(HubSnapshot {
            local_dir: dir,
            commit_hash: self.reported_commit.clone(),
        })
    }
}

// ============================================================================
// Scripted registry
// ============================================================================

/// Registry whose tiers succeed or fail as configured, recording call order.
pub struct ScriptedRegistry {
    pub flavored: Option<PathBuf>,
    pub artifacts: Option<PathBuf>,
    pub generic: Option<PathBuf>,
    pub loader: ModelLoader,
    pub calls: Mutex<Vec<&'static str>>,
}

impl ScriptedRegistry {
    pub fn new(loader: ModelLoader) -> Self {
        Self {
            flavored: None,
            artifacts: None,
            generic: None,
            loader,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl RegistryClient for ScriptedRegistry {
    async fn load_flavored(
        &self,
        uri: &str,
        task: Task,
        kwargs: &ModelKwargs,
    ) -> Result<Box<dyn Pipeline>, LoadError> {
        self.calls.lock().push("flavored");
        match &self.flavored {
            Some(dir) => self.loader.load_directory(dir, task, kwargs).await,
            None => Err(LoadError::InvalidFormat(format!(
                "{} has no transformers flavor",
                uri
            ))),
        }
    }

    async fn download_artifacts(&self, uri: &str) -> Result<PathBuf, LoadError> {
        self.calls.lock().push("download");
        self.artifacts
            .clone()
            .ok_or_else(|| LoadError::RemoteNotFound(uri.to_string()))
    }

    async fn load_generic(
        &self,
        uri: &str,
        task: Task,
        kwargs: &ModelKwargs,
    ) -> Result<Box<dyn Pipeline>, LoadError> {
        self.calls.lock().push("generic");
        match &self.generic {
            Some(dir) => self.loader.load_directory(dir, task, kwargs).await,
            None => Err(LoadError::InvalidFormat(format!(
                "{} is not a generic ONNX model",
                uri
            ))),
        }
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub tmp: TempDir,
    pub factory: Arc<FakeFactory>,
    pub hub: Arc<FakeHub>,
    pub registry: Arc<ScriptedRegistry>,
    pub manager: Arc<ModelManager>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(|_, _| {}, |_, _| {})
    }

    /// Build a harness, letting the caller configure the hub and registry
    /// before they are shared with the manager.
    pub fn with(
        hub_setup: impl FnOnce(&Path, &mut FakeHub),
        registry_setup: impl FnOnce(&Path, &mut ScriptedRegistry),
    ) -> Self {
        let tmp = TempDir::new().unwrap();
        let factory = Arc::new(FakeFactory::default());
        let loader = ModelLoader::new(factory.clone(), Device::Cpu);

        let hub_root = tmp.path().join("hub");
        fs::create_dir_all(&hub_root).unwrap();
        let mut hub = FakeHub::new(&hub_root);
        hub_setup(tmp.path(), &mut hub);

        let mut registry = ScriptedRegistry::new(loader.clone());
        registry_setup(tmp.path(), &mut registry);

        let hub = Arc::new(hub);
        let registry = Arc::new(registry);
        let manager = Arc::new(ModelManager::new(loader, hub.clone(), registry.clone()));
        Self {
            tmp,
            factory,
            hub,
            registry,
            manager,
        }
    }

    pub fn path(&self) -> &Path {
        self.tmp.path()
    }

    pub fn model(&self, name: &str) -> PathBuf {
        write_model_dir(self.tmp.path(), name, None)
    }
}
