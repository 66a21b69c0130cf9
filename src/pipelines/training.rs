//! Pipeline de entrenamiento.
//!
//! `train_data_gen` + `eval_data_gen` -> `hyperparameters_gen` -> `transform`
//! -> `trainer` -> `evaluator` -> `pusher` -> `model_publisher` (sólo con
//! `upload_model`).
use std::sync::Arc;

use log::info;
use serde_json::json;
use tab_adapters::services::{ExtractionRunner, FeatureTransformer, ModelEvaluator, ModelRegistry, ModelTrainer,
                             OutputFormat};
use tab_adapters::steps::{evaluator, extraction, hyperparameters, publisher, pusher, trainer, transform,
                          DataExtractionParams, DataExtractionStep, EvaluatorParams, EvaluatorStep,
                          HyperparametersGenStep, ModelPublisherParams, ModelPublisherStep, PusherParams, PusherStep,
                          TrainerParams, TrainerStep, TransformParams, TransformStep};
use tab_core::{CoreEngineError, FlowDefinition, FlowDefinitionBuilder, ObjectStore};
use tab_domain::features::generate_explanation_config;
use tab_domain::query::{training_source_query, ML_USE_TEST, ML_USE_TRAIN};
use tab_domain::DatasetCatalog;

use super::assembly_error;
use crate::config::PipelineConfig;

pub const TRAIN_DATA_GEN: &str = "train_data_gen";
pub const EVAL_DATA_GEN: &str = "eval_data_gen";

const DATA_FORMAT: OutputFormat = OutputFormat::Tfrecord;

/// Servicios externos que necesita el pipeline de entrenamiento.
#[derive(Clone)]
pub struct TrainingServices {
    pub store: Arc<dyn ObjectStore>,
    pub catalog: Arc<dyn DatasetCatalog>,
    pub extraction: Arc<dyn ExtractionRunner>,
    pub transformer: Arc<dyn FeatureTransformer>,
    pub trainer: Arc<dyn ModelTrainer>,
    pub evaluator: Arc<dyn ModelEvaluator>,
    pub registry: Arc<dyn ModelRegistry>,
}

fn data_gen(config: &PipelineConfig,
            services: &TrainingServices,
            id: &str,
            ml_use: &str,
            limit: u64)
            -> Result<DataExtractionStep, CoreEngineError> {
    let query = training_source_query(services.catalog.as_ref(), &config.dataset_display_name, ml_use, Some(limit))
        .map_err(assembly_error)?;
    let params = DataExtractionParams { query,
                                        output_format: DATA_FORMAT,
                                        options: config.extraction_options() };
    Ok(DataExtractionStep::new(id, params, services.extraction.clone()))
}

fn publisher_params(config: &PipelineConfig) -> ModelPublisherParams {
    ModelPublisherParams { project: config.project.clone(),
                           region: config.region.clone(),
                           model_display_name: config.model_display_name.clone(),
                           pushed_model_location: config.model_registry_uri.clone(),
                           serving_image_uri: config.serving_image_uri(),
                           explanation_config: generate_explanation_config().to_value().to_string(),
                           labels: json!({ "dataset": config.dataset_display_name }).to_string() }
}

pub fn training_pipeline(config: &PipelineConfig,
                         services: &TrainingServices)
                         -> Result<FlowDefinition, CoreEngineError> {
    let store = services.store.clone();
    let mut builder =
        FlowDefinitionBuilder::new()
            .step(data_gen(config, services, TRAIN_DATA_GEN, ML_USE_TRAIN, config.train_limit)?)
            .step(data_gen(config, services, EVAL_DATA_GEN, ML_USE_TEST, config.test_limit)?)
            .step(HyperparametersGenStep::new(config.hyperparameters.clone(), store.clone()))
            .step(TransformStep::new(TransformParams { data_format: DATA_FORMAT }, services.transformer.clone()))
            .wire(transform::INPUT_TRAIN, TRAIN_DATA_GEN, extraction::OUTPUT)
            .wire(transform::INPUT_EVAL, EVAL_DATA_GEN, extraction::OUTPUT)
            .step(TrainerStep::new(TrainerParams { experiment_name: Some(config.pipeline_name.clone()) },
                                   store.clone(),
                                   services.trainer.clone()))
            .wire(trainer::INPUT_TRAIN, transform::STEP_ID, transform::OUTPUT_TRAIN)
            .wire(trainer::INPUT_EVAL, transform::STEP_ID, transform::OUTPUT_EVAL)
            .wire(trainer::INPUT_GRAPH, transform::STEP_ID, transform::OUTPUT_GRAPH)
            .wire(trainer::INPUT_HYPERPARAMETERS, hyperparameters::STEP_ID, hyperparameters::OUTPUT)
            .step(EvaluatorStep::new(EvaluatorParams { accuracy_threshold: config.accuracy_threshold },
                                     store.clone(),
                                     services.evaluator.clone()))
            .wire(evaluator::INPUT_MODEL, trainer::STEP_ID, trainer::OUTPUT)
            .wire(evaluator::INPUT_EVAL, transform::STEP_ID, transform::OUTPUT_EVAL)
            .step(PusherStep::new(PusherParams { model_registry_uri: config.model_registry_uri.clone() },
                                  store.clone()))
            .wire(pusher::INPUT_MODEL, trainer::STEP_ID, trainer::OUTPUT)
            .wire(pusher::INPUT_BLESSING, evaluator::STEP_ID, evaluator::OUTPUT);

    if config.upload_model {
        builder = builder.step(ModelPublisherStep::new(publisher_params(config), store, services.registry.clone()))
                         .wire(publisher::INPUT_BLESSING, evaluator::STEP_ID, evaluator::OUTPUT);
    }
    let definition = builder.build()?;
    info!("Pipeline components: {:?}", definition.step_ids());
    Ok(definition)
}
