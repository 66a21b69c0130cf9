// tab-domain: contrato de features, queries de origen e hiperparámetros.
pub mod errors;
pub mod features;
pub mod hyperparams;
pub mod query;

pub use errors::DomainError;
pub use features::{ColumnType, ExplanationConfig, FeatureRole, FeatureTransform, TransformOp};
pub use hyperparams::HyperParameters;
pub use query::{DatasetCatalog, DatasetRecord, SourceTable};
