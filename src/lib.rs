//! tabflow: pipelines de entrenamiento y predicción de un clasificador
//! tabular.
//!
//! - `config`: configuración inmutable resuelta desde el entorno.
//! - `pipelines`: ensamblado de cada variante sobre los componentes de
//!   `tab-adapters`.
//! - `summary`: resumen de una ejecución a partir de sus eventos.

pub mod config;
pub mod pipelines;
pub mod summary;

pub use config::{ConfigError, PipelineConfig};
pub use pipelines::{engine_for, prediction_pipeline, training_pipeline, PredictionServices, TrainingServices};
pub use summary::{RunSummary, StepReport, StepState};
