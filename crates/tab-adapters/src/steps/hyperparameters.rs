//! HyperparametersGenStep (Source)
//!
//! Resuelve el conjunto de hiperparámetros a partir de sus params (con
//! defaults para lo ausente) y lo escribe como `hyperparameters.json` dentro
//! del artifact `HyperParameters`.

use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};
use tab_core::{ArtifactKind, ArtifactPayload, CoreEngineError, ExecutionContext, ObjectStore, PortSpec, StepKind,
               StepOutcome, TypedStep};
use tab_domain::hyperparams::{parse_hidden_units, PartialHyperParameters};
use tab_domain::HyperParameters;

use crate::artifacts::HyperParametersArtifact;

pub const STEP_ID: &str = "hyperparameters_gen";
pub const OUTPUT: &str = "hyperparameters";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HyperparametersGenParams {
    #[serde(default)]
    pub num_epochs: Option<u32>,
    #[serde(default)]
    pub batch_size: Option<u32>,
    #[serde(default)]
    pub learning_rate: Option<f64>,
    /// Lista separada por comas, p. ej. `"64,32"`.
    #[serde(default)]
    pub hidden_units: Option<String>,
}

impl HyperparametersGenParams {
    pub fn resolve(&self) -> Result<HyperParameters, CoreEngineError> {
        let hidden_units = self.hidden_units
                               .as_deref()
                               .map(parse_hidden_units)
                               .transpose()
                               .map_err(|e| CoreEngineError::Config(e.to_string()))?;
        let partial = PartialHyperParameters { num_epochs: self.num_epochs,
                                               batch_size: self.batch_size,
                                               learning_rate: self.learning_rate,
                                               hidden_units };
        HyperParameters::update_with_defaults(partial).map_err(|e| CoreEngineError::Config(e.to_string()))
    }
}

#[derive(Debug)]
pub struct HyperparametersGenStep {
    params: HyperparametersGenParams,
    store: Arc<dyn ObjectStore>,
}

impl HyperparametersGenStep {
    pub fn new(params: HyperparametersGenParams, store: Arc<dyn ObjectStore>) -> Self {
        Self { params, store }
    }
}

impl TypedStep for HyperparametersGenStep {
    type Params = HyperparametersGenParams;

    fn id(&self) -> &str {
        STEP_ID
    }

    fn kind(&self) -> StepKind {
        StepKind::Source
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(OUTPUT, ArtifactKind::HyperParameters)]
    }

    fn params(&self) -> &HyperparametersGenParams {
        &self.params
    }

    fn run_typed(&self, ctx: &ExecutionContext, p: HyperparametersGenParams) -> Result<StepOutcome, CoreEngineError> {
        let values = p.resolve()?;
        info!("Hyperparameters: {values:?}");
        let out = ctx.output(OUTPUT)?;
        let path = HyperParametersArtifact { values }.write_to(self.store.as_ref(), &out)?;
        info!("Hyperparameters are written to: {path}");
        Ok(StepOutcome::with_outputs(vec![out]))
    }
}
