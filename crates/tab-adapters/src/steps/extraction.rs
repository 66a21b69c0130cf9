//! DataExtractionStep (Source)
//!
//! Lanza el job externo que ejecuta la query contra el warehouse y exporta
//! las filas como shards bajo `<uri>/serving-data-`. Se usa tanto para los
//! splits de entrenamiento como para los datos de scoring.

use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};
use tab_core::{join_uri, ArtifactKind, CoreEngineError, ExecutionContext, PortSpec, StepKind, StepOutcome, TypedStep};

use crate::services::{ExtractionJob, ExtractionOptions, ExtractionRunner, OutputFormat};

pub const OUTPUT: &str = "dataset";
/// Prefijo de los shards exportados.
pub const EXPORT_FILE_PREFIX: &str = "serving-data-";
pub const EXTRACTION_JOB_PROPERTY: &str = "extraction_job";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataExtractionParams {
    pub query: String,
    pub output_format: OutputFormat,
    pub options: ExtractionOptions,
}

#[derive(Debug)]
pub struct DataExtractionStep {
    id: String,
    params: DataExtractionParams,
    runner: Arc<dyn ExtractionRunner>,
}

impl DataExtractionStep {
    pub fn new(id: impl Into<String>, params: DataExtractionParams, runner: Arc<dyn ExtractionRunner>) -> Self {
        Self { id: id.into(),
               params,
               runner }
    }
}

impl TypedStep for DataExtractionStep {
    type Params = DataExtractionParams;

    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> StepKind {
        StepKind::Source
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(OUTPUT, ArtifactKind::Dataset)]
    }

    fn params(&self) -> &DataExtractionParams {
        &self.params
    }

    fn run_typed(&self, ctx: &ExecutionContext, p: DataExtractionParams) -> Result<StepOutcome, CoreEngineError> {
        let mut out = ctx.output(OUTPUT)?;
        let job = ExtractionJob { job_name: ctx.job_name(&self.id),
                                  query: p.query,
                                  output_prefix: join_uri(out.uri(), EXPORT_FILE_PREFIX),
                                  output_format: p.output_format,
                                  options: p.options };
        info!("Data extraction started ({}). Source query:\n{}", job.job_name, job.query);
        let handle = self.runner.run_extract(&job)?;
        info!("Data extraction completed: {}", handle.resource_name);
        out.set_string_property(EXTRACTION_JOB_PROPERTY, handle.resource_name);
        Ok(StepOutcome::with_outputs(vec![out]))
    }
}
