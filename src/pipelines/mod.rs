//! Ensamblado de los pipelines de entrenamiento y predicción.
//!
//! Cada variante instancia sus componentes con parámetros ya resueltos desde
//! `PipelineConfig` y los conecta por `(step productor, output)`. La
//! validación del wiring la hace `FlowDefinitionBuilder::build`.
pub mod prediction;
pub mod training;

pub use prediction::{prediction_pipeline, PredictionServices};
pub use training::{training_pipeline, TrainingServices};

use tab_core::{CoreEngineError, EngineBuilderInit, FlowEngine, InMemoryEventStore, InMemoryFlowRepository};
use tab_domain::DomainError;

use crate::config::PipelineConfig;

/// Builder de engine en memoria con la raíz de artifacts y la cache que
/// pide la configuración.
pub fn engine_for(config: &PipelineConfig) -> EngineBuilderInit<InMemoryEventStore, InMemoryFlowRepository> {
    FlowEngine::new().pipeline_root(config.artifact_store_uri.clone())
                     .enable_cache(config.enable_cache)
}

pub(crate) fn assembly_error(e: DomainError) -> CoreEngineError {
    CoreEngineError::Config(format!("pipeline assembly: {e}"))
}
