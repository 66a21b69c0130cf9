//! Contratos de los servicios externos que invocan los componentes.
//!
//! Todas las llamadas son síncronas: un componente bloquea hasta que el
//! servicio responde o, para jobs largos, hasta que `wait_for_job` observa un
//! estado terminal. Los traits exigen `Debug`: los steps que los guardan
//! tienen que serlo.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tab_core::CoreEngineError;
use tab_domain::{ExplanationConfig, FeatureTransform, HyperParameters};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("job `{name}` failed: {message}")]
    JobFailed { name: String, message: String },
}

impl From<ServiceError> for CoreEngineError {
    fn from(e: ServiceError) -> Self {
        CoreEngineError::External(e.to_string())
    }
}

/// Referencia a un job remoto. Sólo vive mientras el componente espera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub resource_name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed(String),
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed(_) | JobState::Cancelled)
    }
}

// ---------------------------------------------------------------
// Extracción
// ---------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jsonl,
    Tfrecord,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jsonl => "jsonl",
            OutputFormat::Tfrecord => "tfrecord",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Opciones del job de extracción (runner y ubicaciones de trabajo).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionOptions {
    pub runner: String,
    pub project: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub temp_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionJob {
    pub job_name: String,
    pub query: String,
    /// Prefijo de los shards exportados (`<uri>/serving-data-`).
    pub output_prefix: String,
    pub output_format: OutputFormat,
    pub options: ExtractionOptions,
}

pub trait ExtractionRunner: fmt::Debug {
    /// Ejecuta la extracción hasta terminar.
    fn run_extract(&self, job: &ExtractionJob) -> Result<JobHandle, ServiceError>;
}

// ---------------------------------------------------------------
// Scoring batch
// ---------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResources {
    pub machine_type: String,
    pub starting_replica_count: u32,
    pub max_replica_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerator_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerator_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchPredictionRequest {
    pub job_name: String,
    pub project: String,
    pub region: String,
    pub model_display_name: String,
    pub source_uri_glob: String,
    pub destination_prefix: String,
    pub instances_format: String,
    pub predictions_format: String,
    pub resources: JobResources,
}

pub trait BatchPredictionService: fmt::Debug {
    /// Job existente con ese display name (el más reciente) y su estado.
    fn find_job(&self, display_name: &str) -> Result<Option<(JobHandle, JobState)>, ServiceError>;

    fn submit(&self, request: &BatchPredictionRequest) -> Result<JobHandle, ServiceError>;

    fn state(&self, handle: &JobHandle) -> Result<JobState, ServiceError>;
}

// ---------------------------------------------------------------
// Registry
// ---------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelUploadRequest {
    pub project: String,
    pub region: String,
    pub display_name: String,
    pub artifact_uri: String,
    pub serving_image_uri: String,
    pub explanation: Option<ExplanationConfig>,
    pub labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredModel {
    pub resource_name: String,
    pub display_name: String,
    /// Directorio del modelo registrado.
    pub artifact_uri: String,
}

pub trait ModelRegistry: fmt::Debug {
    /// Registra el modelo y devuelve su resource name.
    fn upload(&self, request: &ModelUploadRequest) -> Result<String, ServiceError>;

    /// Versiones registradas con ese display name, de la más antigua a la
    /// más reciente.
    fn list(&self, display_name: &str) -> Result<Vec<RegisteredModel>, ServiceError>;
}

// ---------------------------------------------------------------
// Sink operacional
// ---------------------------------------------------------------

pub trait PredictionSink: fmt::Debug {
    fn write(&self, kind: &str, records: &[Value]) -> Result<(), ServiceError>;
}

// ---------------------------------------------------------------
// Colaboradores de entrenamiento
// ---------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformJob {
    pub train_data_glob: String,
    pub eval_data_glob: String,
    pub plan: Vec<FeatureTransform>,
    pub target: String,
    pub transform_graph_uri: String,
    pub transformed_train_uri: String,
    pub transformed_eval_uri: String,
}

pub trait FeatureTransformer: fmt::Debug {
    fn transform(&self, job: &TransformJob) -> Result<(), ServiceError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingJob {
    pub train_uri: String,
    pub eval_uri: String,
    pub transform_graph_uri: String,
    pub hyperparameters: HyperParameters,
    pub model_dir: String,
    pub experiment_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub val_loss: f64,
    pub val_accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportJob {
    pub model_dir: String,
    pub transform_graph_uri: String,
    pub serving_model_dir: String,
}

/// Fallo al exportar el modelo de serving. `Transient` deja el step en
/// estado degradado (señal + propiedad); `Fatal` lo hace fallar.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExportError {
    #[error("transient export failure: {0}")]
    Transient(String),
    #[error("export failed: {0}")]
    Fatal(String),
}

pub trait ModelTrainer: fmt::Debug {
    fn train(&self, job: &TrainingJob) -> Result<TrainingReport, ServiceError>;

    fn export(&self, job: &ExportJob) -> Result<(), ExportError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationJob {
    pub model_uri: String,
    pub eval_uri: String,
    /// Columna objetivo y clases, en el orden de los índices que predice el modelo.
    pub label_key: String,
    pub class_labels: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    pub loss: f64,
}

pub trait ModelEvaluator: fmt::Debug {
    fn evaluate(&self, job: &EvaluationJob) -> Result<EvaluationMetrics, ServiceError>;
}
