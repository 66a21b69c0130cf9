//! Componentes del pipeline.
//!
//! Ids, nombres de puertos y propiedades son parte del contrato entre
//! componentes y del wiring que hace el ensamblador.

pub mod batch_prediction;
pub mod evaluator;
pub mod extraction;
pub mod hyperparameters;
pub mod prediction_writer;
pub mod publisher;
pub mod pusher;
pub mod trainer;
pub mod transform;

pub use batch_prediction::{BatchPredictionParams, BatchPredictionStep};
pub use evaluator::{EvaluatorParams, EvaluatorStep};
pub use extraction::{DataExtractionParams, DataExtractionStep};
pub use hyperparameters::{HyperparametersGenParams, HyperparametersGenStep};
pub use prediction_writer::{PredictionWriterParams, PredictionWriterStep};
pub use publisher::{ModelPublisherParams, ModelPublisherStep};
pub use pusher::{PusherParams, PusherStep};
pub use trainer::{TrainerParams, TrainerStep};
pub use transform::{TransformParams, TransformStep};
