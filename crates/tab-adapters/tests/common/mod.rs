//! Dobles de los servicios externos con contadores de llamadas.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use serde_json::Value;
use tab_adapters::services::{BatchPredictionRequest, BatchPredictionService, EvaluationJob, EvaluationMetrics,
                             ExportError, ExportJob, ExtractionJob, ExtractionRunner, FeatureTransformer,
                             ModelEvaluator, ModelRegistry, ModelTrainer, ModelUploadRequest, PredictionSink,
                             RegisteredModel, TrainingJob, TrainingReport, TransformJob};
use tab_adapters::{JobHandle, JobState, ServiceError};
use tab_core::{LocalObjectStore, ObjectStore};

/// Escribe `shards` ficheros JSONL bajo el prefijo de exportación.
#[derive(Debug, Default)]
pub struct StubRunner {
    pub shards: usize,
    pub jobs: RefCell<Vec<ExtractionJob>>,
}

impl ExtractionRunner for StubRunner {
    fn run_extract(&self, job: &ExtractionJob) -> Result<JobHandle, ServiceError> {
        let store = LocalObjectStore::new();
        for i in 0..self.shards {
            let path = format!("{}{i:05}-of-{:05}.{}", job.output_prefix, self.shards, job.output_format);
            store.write_string(&path, "{\"trip_miles\": 1.5}\n{\"trip_miles\": 3.0}\n")
                 .map_err(|e| ServiceError::Unavailable(e.to_string()))?;
        }
        self.jobs.borrow_mut().push(job.clone());
        Ok(JobHandle { resource_name: format!("dataflow/{}", job.job_name),
                       display_name: job.job_name.clone() })
    }
}

/// Servicio batch: `running_polls` consultas en `Running` antes de terminar
/// con `final_state`. Al enviar deja los shards de resultados.
#[derive(Debug)]
pub struct StubBatch {
    pub existing: RefCell<Option<(JobHandle, JobState)>>,
    pub running_polls: Cell<u32>,
    pub final_state: JobState,
    pub result_shards: usize,
    pub submits: RefCell<Vec<BatchPredictionRequest>>,
    pub polls: Cell<u32>,
}

impl StubBatch {
    pub fn succeeding(running_polls: u32, result_shards: usize) -> Self {
        Self { existing: RefCell::new(None),
               running_polls: Cell::new(running_polls),
               final_state: JobState::Succeeded,
               result_shards,
               submits: RefCell::new(Vec::new()),
               polls: Cell::new(0) }
    }
}

impl BatchPredictionService for StubBatch {
    fn find_job(&self, display_name: &str) -> Result<Option<(JobHandle, JobState)>, ServiceError> {
        Ok(self.existing
               .borrow()
               .clone()
               .filter(|(h, _)| h.display_name == display_name))
    }

    fn submit(&self, request: &BatchPredictionRequest) -> Result<JobHandle, ServiceError> {
        let store = LocalObjectStore::new();
        let dir = format!("{}/prediction-{}", request.destination_prefix, request.model_display_name);
        for i in 0..self.result_shards {
            let path = format!("{dir}/prediction.results-{i:05}-of-{:05}", self.result_shards);
            store.write_string(&path, "{\"prediction\": [0.2, 0.8]}\n")
                 .map_err(|e| ServiceError::Unavailable(e.to_string()))?;
        }
        self.submits.borrow_mut().push(request.clone());
        Ok(JobHandle { resource_name: format!("batchPredictionJobs/{}", self.submits.borrow().len()),
                       display_name: request.job_name.clone() })
    }

    fn state(&self, _handle: &JobHandle) -> Result<JobState, ServiceError> {
        self.polls.set(self.polls.get() + 1);
        let left = self.running_polls.get();
        if left > 0 {
            self.running_polls.set(left - 1);
            return Ok(JobState::Running);
        }
        Ok(self.final_state.clone())
    }
}

#[derive(Debug, Default)]
pub struct StubRegistry {
    pub uploads: RefCell<Vec<ModelUploadRequest>>,
}

impl ModelRegistry for StubRegistry {
    fn upload(&self, request: &ModelUploadRequest) -> Result<String, ServiceError> {
        self.uploads.borrow_mut().push(request.clone());
        Ok(format!("models/{}", self.uploads.borrow().len()))
    }

    fn list(&self, display_name: &str) -> Result<Vec<RegisteredModel>, ServiceError> {
        Ok(self.uploads
               .borrow()
               .iter()
               .enumerate()
               .filter(|(_, u)| u.display_name == display_name)
               .map(|(i, u)| RegisteredModel { resource_name: format!("models/{}", i + 1),
                                               display_name: u.display_name.clone(),
                                               artifact_uri: u.artifact_uri.clone() })
               .collect())
    }
}

#[derive(Debug, Default)]
pub struct StubSink {
    pub writes: RefCell<Vec<(String, Vec<Value>)>>,
}

impl PredictionSink for StubSink {
    fn write(&self, kind: &str, records: &[Value]) -> Result<(), ServiceError> {
        self.writes.borrow_mut().push((kind.to_string(), records.to_vec()));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct StubTransformer {
    pub calls: Rc<Cell<u32>>,
}

impl FeatureTransformer for StubTransformer {
    fn transform(&self, job: &TransformJob) -> Result<(), ServiceError> {
        self.calls.set(self.calls.get() + 1);
        LocalObjectStore::new().write_string(&format!("{}/transform_fn/saved_model.pb", job.transform_graph_uri), "graph")
                               .map_err(|e| ServiceError::Unavailable(e.to_string()))
    }
}

/// Entrena "escribiendo" el modelo; `export_results` se consume en orden.
#[derive(Debug, Default)]
pub struct StubTrainer {
    pub export_results: RefCell<VecDeque<Result<(), ExportError>>>,
    pub jobs: RefCell<Vec<TrainingJob>>,
}

impl ModelTrainer for StubTrainer {
    fn train(&self, job: &TrainingJob) -> Result<TrainingReport, ServiceError> {
        self.jobs.borrow_mut().push(job.clone());
        Ok(TrainingReport { val_loss: 0.35,
                            val_accuracy: 0.86 })
    }

    fn export(&self, job: &ExportJob) -> Result<(), ExportError> {
        let result = self.export_results.borrow_mut().pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            LocalObjectStore::new().write_string(&format!("{}/saved_model.pb", job.serving_model_dir), "model")
                                   .map_err(|e| ExportError::Fatal(e.to_string()))?;
        }
        result
    }
}

#[derive(Debug)]
pub struct StubEvaluator {
    pub accuracy: f64,
    pub calls: Cell<u32>,
    pub last_job: RefCell<Option<EvaluationJob>>,
}

impl StubEvaluator {
    pub fn with_accuracy(accuracy: f64) -> Self {
        Self { accuracy,
               calls: Cell::new(0),
               last_job: RefCell::new(None) }
    }
}

impl ModelEvaluator for StubEvaluator {
    fn evaluate(&self, job: &EvaluationJob) -> Result<EvaluationMetrics, ServiceError> {
        self.calls.set(self.calls.get() + 1);
        self.last_job.replace(Some(job.clone()));
        Ok(EvaluationMetrics { accuracy: self.accuracy,
                               loss: 0.4 })
    }
}
