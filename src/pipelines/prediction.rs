//! Pipeline de predicción: `data_extraction` -> `batch_prediction` ->
//! `prediction_writer`.
use std::sync::Arc;

use log::info;
use tab_adapters::services::{BatchPredictionService, ExtractionRunner, OutputFormat, PredictionSink};
use tab_adapters::steps::{batch_prediction, extraction, prediction_writer, BatchPredictionParams,
                          BatchPredictionStep, DataExtractionParams, DataExtractionStep, PredictionWriterParams,
                          PredictionWriterStep};
use tab_core::{CoreEngineError, FlowDefinition, FlowDefinitionBuilder, ObjectStore};
use tab_domain::query::serving_source_query;

use crate::config::PipelineConfig;

pub const DATA_EXTRACTION: &str = "data_extraction";

const FORMAT: OutputFormat = OutputFormat::Jsonl;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

#[derive(Clone)]
pub struct PredictionServices {
    pub store: Arc<dyn ObjectStore>,
    pub extraction: Arc<dyn ExtractionRunner>,
    pub batch: Arc<dyn BatchPredictionService>,
    pub sink: Arc<dyn PredictionSink>,
    /// Segundos entre consultas del job batch; `None` usa el valor por defecto.
    pub poll_interval_secs: Option<u64>,
}

pub fn prediction_pipeline(config: &PipelineConfig,
                           services: &PredictionServices)
                           -> Result<FlowDefinition, CoreEngineError> {
    let query = serving_source_query(&config.batch_prediction_dataset,
                                     &config.batch_prediction_table,
                                     Some(config.serve_limit));
    let extraction_params = DataExtractionParams { query,
                                                   output_format: FORMAT,
                                                   options: config.extraction_options() };
    let batch_params = BatchPredictionParams { project: config.project.clone(),
                                               region: config.region.clone(),
                                               model_display_name: config.model_display_name.clone(),
                                               instances_format: FORMAT.to_string(),
                                               predictions_format: FORMAT.to_string(),
                                               job_resources: config.batch_job_resources.clone(),
                                               poll_interval_secs: services.poll_interval_secs
                                                                           .unwrap_or(DEFAULT_POLL_INTERVAL_SECS) };
    let writer_params = PredictionWriterParams { datastore_kind: config.datastore_kind.clone(),
                                                 predictions_format: FORMAT.to_string() };

    let definition =
        FlowDefinitionBuilder::new().step(DataExtractionStep::new(DATA_EXTRACTION,
                                                                  extraction_params,
                                                                  services.extraction.clone()))
                                    .step(BatchPredictionStep::new(batch_params, services.batch.clone()))
                                    .wire(batch_prediction::INPUT_DATASET, DATA_EXTRACTION, extraction::OUTPUT)
                                    .step(PredictionWriterStep::new(writer_params,
                                                                    services.store.clone(),
                                                                    services.sink.clone()))
                                    .wire(prediction_writer::INPUT_RESULTS,
                                          batch_prediction::STEP_ID,
                                          batch_prediction::OUTPUT)
                                    .build()?;
    info!("Pipeline components: {:?}", definition.step_ids());
    Ok(definition)
}
