//! Servicios de prueba para ensamblar los pipelines completos.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::Value;
use tab_adapters::services::{BatchPredictionRequest, BatchPredictionService, EvaluationJob, EvaluationMetrics,
                             ExportError, ExportJob, ExtractionJob, ExtractionRunner, FeatureTransformer,
                             ModelEvaluator, ModelRegistry, ModelTrainer, ModelUploadRequest, PredictionSink,
                             RegisteredModel, TrainingJob, TrainingReport, TransformJob};
use tab_adapters::{JobHandle, JobState, ServiceError};
use tab_core::{LocalObjectStore, ObjectStore};
use tab_domain::{DatasetCatalog, DatasetRecord, DomainError};
use tabflow::{PipelineConfig, PredictionServices, TrainingServices};

fn unavailable(e: impl ToString) -> ServiceError {
    ServiceError::Unavailable(e.to_string())
}

pub fn config(root: &str, extra: &[(&str, &str)]) -> PipelineConfig {
    let mut vars: HashMap<String, String> = HashMap::from([("PROJECT".to_string(), "proj".to_string()),
                                                           ("GCS_LOCATION".to_string(), root.to_string())]);
    vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    PipelineConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

#[derive(Debug, Default)]
pub struct StubCatalog {
    pub records: Vec<DatasetRecord>,
}

impl StubCatalog {
    pub fn with_table(uri: &str) -> Self {
        Self { records: vec![DatasetRecord { display_name: "chicago-taxi-tips".into(),
                                             resource_name: "datasets/1".into(),
                                             source_uri: uri.into(),
                                             update_time: Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap() }] }
    }
}

impl DatasetCatalog for StubCatalog {
    fn list(&self, display_name: &str) -> Result<Vec<DatasetRecord>, DomainError> {
        Ok(self.records.iter().filter(|r| r.display_name == display_name).cloned().collect())
    }
}

#[derive(Debug, Default)]
pub struct StubRunner {
    pub jobs: RefCell<Vec<ExtractionJob>>,
}

impl ExtractionRunner for StubRunner {
    fn run_extract(&self, job: &ExtractionJob) -> Result<JobHandle, ServiceError> {
        let store = LocalObjectStore::new();
        for i in 0..2 {
            store.write_string(&format!("{}{i:05}-of-00002.{}", job.output_prefix, job.output_format), "{}\n{}\n")
                 .map_err(unavailable)?;
        }
        self.jobs.borrow_mut().push(job.clone());
        Ok(JobHandle { resource_name: format!("jobs/{}", job.job_name),
                       display_name: job.job_name.clone() })
    }
}

#[derive(Debug, Default)]
pub struct StubBatch {
    pub submits: RefCell<Vec<BatchPredictionRequest>>,
    pub polls: Cell<u32>,
}

impl BatchPredictionService for StubBatch {
    fn find_job(&self, _display_name: &str) -> Result<Option<(JobHandle, JobState)>, ServiceError> {
        Ok(None)
    }

    fn submit(&self, request: &BatchPredictionRequest) -> Result<JobHandle, ServiceError> {
        let store = LocalObjectStore::new();
        for i in 0..3 {
            store.write_string(&format!("{}/prediction-job/prediction.results-{i:05}-of-00003",
                                        request.destination_prefix),
                               "{\"prediction\": 1}\n{\"prediction\": 0}\n")
                 .map_err(unavailable)?;
        }
        self.submits.borrow_mut().push(request.clone());
        Ok(JobHandle { resource_name: "batchPredictionJobs/9".into(),
                       display_name: request.job_name.clone() })
    }

    // primero Running, después Succeeded
    fn state(&self, _handle: &JobHandle) -> Result<JobState, ServiceError> {
        self.polls.set(self.polls.get() + 1);
        Ok(if self.polls.get() < 2 { JobState::Running } else { JobState::Succeeded })
    }
}

#[derive(Debug, Default)]
pub struct StubSink {
    pub writes: RefCell<Vec<(String, usize)>>,
}

impl PredictionSink for StubSink {
    fn write(&self, kind: &str, records: &[Value]) -> Result<(), ServiceError> {
        self.writes.borrow_mut().push((kind.to_string(), records.len()));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct StubTransformer;

impl FeatureTransformer for StubTransformer {
    fn transform(&self, job: &TransformJob) -> Result<(), ServiceError> {
        LocalObjectStore::new().write_string(&format!("{}/transform_fn/saved_model.pb", job.transform_graph_uri), "g")
                               .map_err(unavailable)
    }
}

#[derive(Debug, Default)]
pub struct StubTrainer {
    pub jobs: RefCell<Vec<TrainingJob>>,
    // export falla de forma transitoria
    pub degraded: Cell<bool>,
}

impl ModelTrainer for StubTrainer {
    fn train(&self, job: &TrainingJob) -> Result<TrainingReport, ServiceError> {
        self.jobs.borrow_mut().push(job.clone());
        Ok(TrainingReport { val_loss: 0.3,
                            val_accuracy: 0.9 })
    }

    fn export(&self, job: &ExportJob) -> Result<(), ExportError> {
        if self.degraded.get() {
            return Err(ExportError::Transient("signature export timed out".into()));
        }
        LocalObjectStore::new().write_string(&format!("{}/saved_model.pb", job.serving_model_dir), "m")
                               .map_err(|e| ExportError::Fatal(e.to_string()))
    }
}

#[derive(Debug)]
pub struct StubEvaluator(pub f64);

impl ModelEvaluator for StubEvaluator {
    fn evaluate(&self, _job: &EvaluationJob) -> Result<EvaluationMetrics, ServiceError> {
        Ok(EvaluationMetrics { accuracy: self.0,
                               loss: 0.3 })
    }
}

#[derive(Debug, Default)]
pub struct StubRegistry {
    pub uploads: RefCell<Vec<ModelUploadRequest>>,
}

impl ModelRegistry for StubRegistry {
    fn upload(&self, request: &ModelUploadRequest) -> Result<String, ServiceError> {
        self.uploads.borrow_mut().push(request.clone());
        Ok("projects/proj/locations/us-central1/models/7".into())
    }

    fn list(&self, _display_name: &str) -> Result<Vec<RegisteredModel>, ServiceError> {
        Ok(Vec::new())
    }
}

pub struct Training {
    pub services: TrainingServices,
    pub runner: Arc<StubRunner>,
    pub trainer: Arc<StubTrainer>,
    pub registry: Arc<StubRegistry>,
}

pub fn training_services(accuracy: f64, catalog: StubCatalog) -> Training {
    let runner = Arc::new(StubRunner::default());
    let trainer = Arc::new(StubTrainer::default());
    let registry = Arc::new(StubRegistry::default());
    let services = TrainingServices { store: Arc::new(LocalObjectStore::new()),
                                      catalog: Arc::new(catalog),
                                      extraction: runner.clone(),
                                      transformer: Arc::new(StubTransformer),
                                      trainer: trainer.clone(),
                                      evaluator: Arc::new(StubEvaluator(accuracy)),
                                      registry: registry.clone() };
    Training { services,
               runner,
               trainer,
               registry }
}

pub struct Prediction {
    pub services: PredictionServices,
    pub runner: Arc<StubRunner>,
    pub batch: Arc<StubBatch>,
    pub sink: Arc<StubSink>,
}

pub fn prediction_services() -> Prediction {
    let runner = Arc::new(StubRunner::default());
    let batch = Arc::new(StubBatch::default());
    let sink = Arc::new(StubSink::default());
    let services = PredictionServices { store: Arc::new(LocalObjectStore::new()),
                                        extraction: runner.clone(),
                                        batch: batch.clone(),
                                        sink: sink.clone(),
                                        poll_interval_secs: Some(0) };
    Prediction { services,
                 runner,
                 batch,
                 sink }
}
