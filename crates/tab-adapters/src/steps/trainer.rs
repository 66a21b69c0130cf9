//! TrainerStep (Transform)
//!
//! Entrena con el `ModelTrainer` externo y exporta el modelo de serving bajo
//! `<model>/serving_model_dir`. Un fallo transitorio al exportar no tumba el
//! step: queda `export_degraded = 1` y la señal `export_degraded`.

use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tab_core::{join_uri, ArtifactKind, ArtifactPayload, CoreEngineError, ExecutionContext, ObjectStore, PortSpec,
               StepKind, StepOutcome, StepSignal, TypedStep};

use crate::artifacts::HyperParametersArtifact;
use crate::services::{ExportError, ExportJob, ModelTrainer, TrainingJob};

pub const STEP_ID: &str = "trainer";
pub const INPUT_TRAIN: &str = "transformed_train";
pub const INPUT_EVAL: &str = "transformed_eval";
pub const INPUT_GRAPH: &str = "transform_graph";
pub const INPUT_HYPERPARAMETERS: &str = "hyperparameters";
pub const OUTPUT: &str = "model";
/// Subdirectorio del artifact `Model` con el modelo exportado.
pub const SERVING_MODEL_DIR: &str = "serving_model_dir";
pub const EXPORT_DEGRADED: &str = "export_degraded";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainerParams {
    #[serde(default)]
    pub experiment_name: Option<String>,
}

#[derive(Debug)]
pub struct TrainerStep {
    params: TrainerParams,
    store: Arc<dyn ObjectStore>,
    trainer: Arc<dyn ModelTrainer>,
}

impl TrainerStep {
    pub fn new(params: TrainerParams, store: Arc<dyn ObjectStore>, trainer: Arc<dyn ModelTrainer>) -> Self {
        Self { params,
               store,
               trainer }
    }
}

impl TypedStep for TrainerStep {
    type Params = TrainerParams;

    fn id(&self) -> &str {
        STEP_ID
    }

    fn kind(&self) -> StepKind {
        StepKind::Transform
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(INPUT_TRAIN, ArtifactKind::Dataset),
             PortSpec::new(INPUT_EVAL, ArtifactKind::Dataset),
             PortSpec::new(INPUT_GRAPH, ArtifactKind::TransformGraph),
             PortSpec::new(INPUT_HYPERPARAMETERS, ArtifactKind::HyperParameters)]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(OUTPUT, ArtifactKind::Model)]
    }

    fn params(&self) -> &TrainerParams {
        &self.params
    }

    fn run_typed(&self, ctx: &ExecutionContext, p: TrainerParams) -> Result<StepOutcome, CoreEngineError> {
        let graph = ctx.input(INPUT_GRAPH)?;
        let hyperparameters = HyperParametersArtifact::read_from(self.store.as_ref(), ctx.input(INPUT_HYPERPARAMETERS)?)?;
        let mut out = ctx.output(OUTPUT)?;

        let job = TrainingJob { train_uri: ctx.input(INPUT_TRAIN)?.uri().to_string(),
                                eval_uri: ctx.input(INPUT_EVAL)?.uri().to_string(),
                                transform_graph_uri: graph.uri().to_string(),
                                hyperparameters: hyperparameters.values,
                                model_dir: out.uri().to_string(),
                                experiment_name: p.experiment_name };
        info!("Model training started...");
        let report = self.trainer.train(&job)?;
        info!("Model training completed: val_loss={} val_accuracy={}", report.val_loss, report.val_accuracy);
        out.set_string_property("val_loss", report.val_loss.to_string());
        out.set_string_property("val_accuracy", report.val_accuracy.to_string());

        let export = ExportJob { model_dir: out.uri().to_string(),
                                 transform_graph_uri: graph.uri().to_string(),
                                 serving_model_dir: join_uri(out.uri(), SERVING_MODEL_DIR) };
        let mut outcome_signal = None;
        match self.trainer.export(&export) {
            Ok(()) => {
                out.set_int_property(EXPORT_DEGRADED, 0);
                info!("Serving model exported to {}", export.serving_model_dir);
            }
            Err(ExportError::Transient(msg)) => {
                warn!("serving model export degraded: {msg}");
                out.set_int_property(EXPORT_DEGRADED, 1);
                outcome_signal = Some(StepSignal::new(EXPORT_DEGRADED, json!({ "reason": msg })));
            }
            Err(e @ ExportError::Fatal(_)) => return Err(CoreEngineError::External(e.to_string())),
        }

        let outcome = StepOutcome::with_outputs(vec![out]);
        Ok(match outcome_signal {
            Some(signal) => outcome.signal(signal),
            None => outcome,
        })
    }
}
