//! EvaluatorStep (Check)
//!
//! Calcula métricas sobre el split de evaluación y decide el blessing:
//! `accuracy >= accuracy_threshold`. La decisión queda en la propiedad
//! `blessed` y en un fichero marcador (`BLESSED` / `NOT_BLESSED`).

use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};
use tab_core::{join_uri, ArtifactKind, CoreEngineError, ExecutionContext, ObjectStore, PortSpec, StepKind, StepOutcome,
               TypedStep};

use tab_domain::features::{TARGET_FEATURE_NAME, TARGET_LABELS};

use crate::artifacts::{BLESSED_MARKER, BLESSED_PROPERTY, NOT_BLESSED_MARKER};
use crate::services::{EvaluationJob, ModelEvaluator};

pub const STEP_ID: &str = "evaluator";
pub const INPUT_MODEL: &str = "model";
pub const INPUT_EVAL: &str = "transformed_eval";
pub const OUTPUT: &str = "model_blessing";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorParams {
    pub accuracy_threshold: f64,
}

impl Default for EvaluatorParams {
    fn default() -> Self {
        Self { accuracy_threshold: 0.8 }
    }
}

#[derive(Debug)]
pub struct EvaluatorStep {
    params: EvaluatorParams,
    store: Arc<dyn ObjectStore>,
    evaluator: Arc<dyn ModelEvaluator>,
}

impl EvaluatorStep {
    pub fn new(params: EvaluatorParams, store: Arc<dyn ObjectStore>, evaluator: Arc<dyn ModelEvaluator>) -> Self {
        Self { params,
               store,
               evaluator }
    }
}

impl TypedStep for EvaluatorStep {
    type Params = EvaluatorParams;

    fn id(&self) -> &str {
        STEP_ID
    }

    fn kind(&self) -> StepKind {
        StepKind::Check
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(INPUT_MODEL, ArtifactKind::Model), PortSpec::new(INPUT_EVAL, ArtifactKind::Dataset)]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(OUTPUT, ArtifactKind::ModelBlessing)]
    }

    fn params(&self) -> &EvaluatorParams {
        &self.params
    }

    fn run_typed(&self, ctx: &ExecutionContext, p: EvaluatorParams) -> Result<StepOutcome, CoreEngineError> {
        let job = EvaluationJob { model_uri: ctx.input(INPUT_MODEL)?.uri().to_string(),
                                  eval_uri: ctx.input(INPUT_EVAL)?.uri().to_string(),
                                  label_key: TARGET_FEATURE_NAME.to_string(),
                                  class_labels: TARGET_LABELS.iter().map(|l| l.to_string()).collect() };
        let metrics = self.evaluator.evaluate(&job)?;
        let blessed = metrics.accuracy >= p.accuracy_threshold;
        info!("Evaluation: accuracy={} threshold={} blessed={blessed}", metrics.accuracy, p.accuracy_threshold);

        let mut out = ctx.output(OUTPUT)?;
        let marker = if blessed { BLESSED_MARKER } else { NOT_BLESSED_MARKER };
        self.store.write_string(&join_uri(out.uri(), marker), "")?;
        out.set_int_property(BLESSED_PROPERTY, i64::from(blessed));
        out.set_string_property("accuracy", metrics.accuracy.to_string());
        out.set_string_property("loss", metrics.loss.to_string());
        Ok(StepOutcome::with_outputs(vec![out]))
    }
}
