//! tab-cli: valida la configuración y muestra el plan de un pipeline.
//!
//! Los backends reales (warehouse, batch, registry, sink) se conectan
//! usando `tabflow` como librería; este binario sólo resuelve la
//! configuración, ensambla la definición y la imprime con los parámetros
//! efectivos de cada step.
//!
//! Uso:
//!   tab-cli config
//!   tab-cli plan <training|prediction> [--param step.key=value]... [--source bq://p.d.t]

use std::fmt;
use std::process;
use std::sync::Arc;

use chrono::Utc;
use log::{error, info};
use serde_json::{json, Value};
use tab_adapters::services::{BatchPredictionRequest, BatchPredictionService, EvaluationJob, EvaluationMetrics,
                             ExportError, ExportJob, ExtractionJob, ExtractionRunner, FeatureTransformer,
                             ModelEvaluator, ModelRegistry, ModelTrainer, ModelUploadRequest, PredictionSink,
                             RegisteredModel, TrainingJob, TrainingReport, TransformJob};
use tab_adapters::{JobHandle, JobState, ServiceError};
use tab_core::{CompositeInjector, ExecutionContext, FlowDefinition, LocalObjectStore, ParamInjector,
               RuntimeParameters, StepDefinition};
use tab_domain::{DatasetCatalog, DatasetRecord, DomainError};
use tabflow::{prediction_pipeline, training_pipeline, PipelineConfig, PredictionServices, TrainingServices};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_USAGE: i32 = 2;
const EXIT_CONFIG: i32 = 3;
const EXIT_ASSEMBLY: i32 = 4;

/// Servicios sin backend: el plan nunca ejecuta steps, así que cualquier
/// llamada es un error de uso.
#[derive(Debug)]
struct Offline;

fn offline() -> ServiceError {
    ServiceError::Unavailable("no backend configured in tab-cli".into())
}

impl ExtractionRunner for Offline {
    fn run_extract(&self, _job: &ExtractionJob) -> Result<JobHandle, ServiceError> {
        Err(offline())
    }
}

impl BatchPredictionService for Offline {
    fn find_job(&self, _display_name: &str) -> Result<Option<(JobHandle, JobState)>, ServiceError> {
        Err(offline())
    }

    fn submit(&self, _request: &BatchPredictionRequest) -> Result<JobHandle, ServiceError> {
        Err(offline())
    }

    fn state(&self, _handle: &JobHandle) -> Result<JobState, ServiceError> {
        Err(offline())
    }
}

impl ModelRegistry for Offline {
    fn upload(&self, _request: &ModelUploadRequest) -> Result<String, ServiceError> {
        Err(offline())
    }

    fn list(&self, _display_name: &str) -> Result<Vec<RegisteredModel>, ServiceError> {
        Err(offline())
    }
}

impl PredictionSink for Offline {
    fn write(&self, _kind: &str, _records: &[Value]) -> Result<(), ServiceError> {
        Err(offline())
    }
}

impl FeatureTransformer for Offline {
    fn transform(&self, _job: &TransformJob) -> Result<(), ServiceError> {
        Err(offline())
    }
}

impl ModelTrainer for Offline {
    fn train(&self, _job: &TrainingJob) -> Result<TrainingReport, ServiceError> {
        Err(offline())
    }

    fn export(&self, _job: &ExportJob) -> Result<(), ExportError> {
        Err(ExportError::Fatal(offline().to_string()))
    }
}

impl ModelEvaluator for Offline {
    fn evaluate(&self, _job: &EvaluationJob) -> Result<EvaluationMetrics, ServiceError> {
        Err(offline())
    }
}

/// Catálogo de una sola tabla, dada por `--source`.
struct SingleTable {
    display_name: String,
    source_uri: String,
}

impl DatasetCatalog for SingleTable {
    fn list(&self, display_name: &str) -> Result<Vec<DatasetRecord>, DomainError> {
        if display_name != self.display_name {
            return Ok(Vec::new());
        }
        Ok(vec![DatasetRecord { display_name: self.display_name.clone(),
                                resource_name: format!("local/{}", self.display_name),
                                source_uri: self.source_uri.clone(),
                                update_time: Utc::now() }])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    Training,
    Prediction,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Training => write!(f, "training"),
            Variant::Prediction => write!(f, "prediction"),
        }
    }
}

struct PlanArgs {
    variant: Variant,
    overrides: RuntimeParameters,
    source: Option<String>,
}

fn usage() -> ! {
    eprintln!("uso: tab-cli config");
    eprintln!("     tab-cli plan <training|prediction> [--param step.key=value]... [--source bq://p.d.t]");
    process::exit(EXIT_USAGE);
}

fn parse_plan_args(args: &[String]) -> PlanArgs {
    let variant = match args.first().map(String::as_str) {
        Some("training") => Variant::Training,
        Some("prediction") => Variant::Prediction,
        _ => usage(),
    };
    let mut overrides = RuntimeParameters::new();
    let mut source = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--param" => {
                i += 1;
                let Some(raw) = args.get(i) else { usage() };
                if let Err(e) = overrides.parse_assignment(raw) {
                    eprintln!("[tab-cli] {e}");
                    process::exit(EXIT_USAGE);
                }
            }
            "--source" => {
                i += 1;
                source = Some(args.get(i).cloned().unwrap_or_else(|| usage()));
            }
            other => {
                eprintln!("[tab-cli] argumento desconocido: {other}");
                usage();
            }
        }
        i += 1;
    }
    PlanArgs { variant,
               overrides,
               source }
}

fn load_config() -> PipelineConfig {
    match PipelineConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("configuration error: {e}");
            eprintln!("[tab-cli] {e}");
            process::exit(EXIT_CONFIG);
        }
    }
}

fn assemble(cfg: &PipelineConfig, plan: &PlanArgs) -> FlowDefinition {
    let store = Arc::new(LocalObjectStore::new());
    let backend = Arc::new(Offline);
    let result = match plan.variant {
        Variant::Training => {
            let source = plan.source.clone().unwrap_or_else(|| {
                                                 format!("bq://{}.{}.{}",
                                                         cfg.project,
                                                         cfg.batch_prediction_dataset,
                                                         cfg.batch_prediction_table)
                                             });
            let catalog = SingleTable { display_name: cfg.dataset_display_name.clone(),
                                        source_uri: source };
            let services = TrainingServices { store,
                                              catalog: Arc::new(catalog),
                                              extraction: backend.clone(),
                                              transformer: backend.clone(),
                                              trainer: backend.clone(),
                                              evaluator: backend.clone(),
                                              registry: backend };
            training_pipeline(cfg, &services)
        }
        Variant::Prediction => {
            let services = PredictionServices { store,
                                                extraction: backend.clone(),
                                                batch: backend.clone(),
                                                sink: backend,
                                                poll_interval_secs: None };
            prediction_pipeline(cfg, &services)
        }
    };
    match result {
        Ok(definition) => definition,
        Err(e) => {
            error!("pipeline assembly failed: {e}");
            eprintln!("[tab-cli] {e}");
            process::exit(EXIT_ASSEMBLY);
        }
    }
}

/// Plan en JSON: por step su kind, de dónde viene cada input y los
/// parámetros efectivos tras aplicar los `--param`.
fn render_plan(variant: Variant, definition: &FlowDefinition, overrides: RuntimeParameters) -> Value {
    let injectors: Vec<Box<dyn ParamInjector>> = vec![Box::new(overrides)];
    let steps: Vec<Value> =
        definition.steps
                  .iter()
                  .enumerate()
                  .map(|(index, step)| {
                      let ctx = ExecutionContext::new("plan", step.id(), step.base_params());
                      let params = CompositeInjector::apply_injectors(&injectors, &ctx.params, &ctx);
                      let inputs: Vec<Value> =
                          definition.wiring[index].iter()
                                                  .map(|w| {
                                                      let producer = &definition.steps[w.producer_index];
                                                      let output = producer.outputs()
                                                                           .get(w.output_index)
                                                                           .map(|p| p.name.clone())
                                                                           .unwrap_or_default();
                                                      json!({ "input": w.input,
                                                              "from": format!("{}.{output}", producer.id()) })
                                                  })
                                                  .collect();
                      json!({
                          "id": step.id(),
                          "kind": step.kind(),
                          "inputs": inputs,
                          "outputs": step.outputs(),
                          "params": params,
                      })
                  })
                  .collect();
    json!({
        "pipeline": variant.to_string(),
        "definition_hash": definition.definition_hash,
        "steps": steps,
    })
}

fn main() {
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                                                                                               "info".into()
                                                                                           }))
                                  .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                                  .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("config") => {
            let cfg = load_config();
            println!("{cfg:#?}");
            println!("serving image: {}", cfg.serving_image_uri());
        }
        Some("plan") => {
            let plan = parse_plan_args(&args[1..]);
            let cfg = load_config();
            let definition = assemble(&cfg, &plan);
            info!("{} pipeline assembled: {} steps", plan.variant, definition.len());
            let rendered = render_plan(plan.variant, &definition, plan.overrides);
            match serde_json::to_string_pretty(&rendered) {
                Ok(text) => println!("{text}"),
                Err(e) => {
                    eprintln!("[tab-cli] {e}");
                    process::exit(1);
                }
            }
        }
        _ => usage(),
    }
}
