//! BatchPredictionStep (Transform)
//!
//! Envía el job de scoring batch sobre los shards de `serving_dataset` y
//! bloquea hasta su estado terminal. El nombre del job es determinista
//! (`<modelo>-serving-<run_id>`): si un reintento encuentra un job con ese
//! nombre en curso o terminado con éxito, lo reutiliza en vez de enviar otro.

use std::sync::Arc;
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};
use tab_core::{join_uri, ArtifactKind, CoreEngineError, ExecutionContext, PortSpec, StepKind, StepOutcome, TypedStep};

use crate::polling::{wait_for_job, PollPolicy};
use crate::services::{BatchPredictionRequest, BatchPredictionService, JobResources, JobState, ServiceError};
use crate::steps::extraction::EXPORT_FILE_PREFIX;

pub const STEP_ID: &str = "batch_prediction";
pub const INPUT_DATASET: &str = "serving_dataset";
pub const OUTPUT: &str = "prediction_results";
pub const JOB_PROPERTY: &str = "batch_prediction_job";

fn default_poll_interval() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPredictionParams {
    pub project: String,
    pub region: String,
    pub model_display_name: String,
    pub instances_format: String,
    pub predictions_format: String,
    pub job_resources: JobResources,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

#[derive(Debug)]
pub struct BatchPredictionStep {
    params: BatchPredictionParams,
    service: Arc<dyn BatchPredictionService>,
}

impl BatchPredictionStep {
    pub fn new(params: BatchPredictionParams, service: Arc<dyn BatchPredictionService>) -> Self {
        Self { params, service }
    }
}

impl TypedStep for BatchPredictionStep {
    type Params = BatchPredictionParams;

    fn id(&self) -> &str {
        STEP_ID
    }

    fn kind(&self) -> StepKind {
        StepKind::Transform
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(INPUT_DATASET, ArtifactKind::Dataset)]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(OUTPUT, ArtifactKind::PredictionResults)]
    }

    fn params(&self) -> &BatchPredictionParams {
        &self.params
    }

    fn run_typed(&self, ctx: &ExecutionContext, p: BatchPredictionParams) -> Result<StepOutcome, CoreEngineError> {
        let dataset = ctx.input(INPUT_DATASET)?;
        let mut out = ctx.output(OUTPUT)?;
        let job_name = ctx.job_name(&format!("{}-serving", p.model_display_name));

        let reusable = match self.service.find_job(&job_name)? {
            Some((handle, state)) if !matches!(state, JobState::Failed(_) | JobState::Cancelled) => Some(handle),
            _ => None,
        };
        let handle = match reusable {
            Some(handle) => {
                info!("Reusing batch prediction job {}", handle.resource_name);
                handle
            }
            None => {
                let request = BatchPredictionRequest {
                    job_name: job_name.clone(),
                    project: p.project,
                    region: p.region,
                    model_display_name: p.model_display_name,
                    source_uri_glob: format!("{}*.{}", join_uri(dataset.uri(), EXPORT_FILE_PREFIX), p.instances_format),
                    destination_prefix: out.uri().to_string(),
                    instances_format: p.instances_format,
                    predictions_format: p.predictions_format,
                    resources: p.job_resources,
                };
                info!("Submitting batch prediction job {job_name}...");
                self.service.submit(&request)?
            }
        };

        let policy = PollPolicy::every(Duration::from_secs(p.poll_interval_secs));
        match wait_for_job(self.service.as_ref(), &handle, &policy)? {
            JobState::Succeeded => {
                info!("Batch prediction job completed: {}", handle.resource_name);
                out.set_string_property(JOB_PROPERTY, handle.resource_name);
                Ok(StepOutcome::with_outputs(vec![out]))
            }
            JobState::Failed(message) => Err(ServiceError::JobFailed { name: handle.resource_name, message }.into()),
            other => Err(ServiceError::JobFailed { name: handle.resource_name,
                                                   message: format!("ended as {other:?}") }.into()),
        }
    }
}
