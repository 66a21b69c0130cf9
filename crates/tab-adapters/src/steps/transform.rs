//! TransformStep (Transform)
//!
//! Delegates feature preprocessing to the external `FeatureTransformer`:
//! z-score for numeric columns and a vocabulary lookup for categoricals.
//! It produces the transform graph plus both transformed splits.

use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};
use tab_core::{join_uri, ArtifactKind, CoreEngineError, ExecutionContext, PortSpec, StepKind, StepOutcome, TypedStep};
use tab_domain::features::{transform_plan, TARGET_FEATURE_NAME};

use crate::services::{FeatureTransformer, OutputFormat, TransformJob};
use crate::steps::extraction::EXPORT_FILE_PREFIX;

pub const STEP_ID: &str = "transform";
pub const INPUT_TRAIN: &str = "train_dataset";
pub const INPUT_EVAL: &str = "eval_dataset";
pub const OUTPUT_GRAPH: &str = "transform_graph";
pub const OUTPUT_TRAIN: &str = "transformed_train";
pub const OUTPUT_EVAL: &str = "transformed_eval";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformParams {
    pub data_format: OutputFormat,
}

#[derive(Debug)]
pub struct TransformStep {
    params: TransformParams,
    transformer: Arc<dyn FeatureTransformer>,
}

impl TransformStep {
    pub fn new(params: TransformParams, transformer: Arc<dyn FeatureTransformer>) -> Self {
        Self { params, transformer }
    }
}

fn shard_glob(uri: &str, format: OutputFormat) -> String {
    format!("{}*.{}", join_uri(uri, EXPORT_FILE_PREFIX), format.extension())
}

impl TypedStep for TransformStep {
    type Params = TransformParams;

    fn id(&self) -> &str {
        STEP_ID
    }

    fn kind(&self) -> StepKind {
        StepKind::Transform
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(INPUT_TRAIN, ArtifactKind::Dataset), PortSpec::new(INPUT_EVAL, ArtifactKind::Dataset)]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(OUTPUT_GRAPH, ArtifactKind::TransformGraph),
             PortSpec::new(OUTPUT_TRAIN, ArtifactKind::Dataset),
             PortSpec::new(OUTPUT_EVAL, ArtifactKind::Dataset)]
    }

    fn params(&self) -> &TransformParams {
        &self.params
    }

    fn run_typed(&self, ctx: &ExecutionContext, p: TransformParams) -> Result<StepOutcome, CoreEngineError> {
        let train = ctx.input(INPUT_TRAIN)?;
        let eval = ctx.input(INPUT_EVAL)?;
        let graph = ctx.output(OUTPUT_GRAPH)?;
        let transformed_train = ctx.output(OUTPUT_TRAIN)?;
        let transformed_eval = ctx.output(OUTPUT_EVAL)?;

        let job = TransformJob { train_data_glob: shard_glob(train.uri(), p.data_format),
                                 eval_data_glob: shard_glob(eval.uri(), p.data_format),
                                 plan: transform_plan(),
                                 target: TARGET_FEATURE_NAME.to_string(),
                                 transform_graph_uri: graph.uri().to_string(),
                                 transformed_train_uri: transformed_train.uri().to_string(),
                                 transformed_eval_uri: transformed_eval.uri().to_string() };
        info!("Transform started: {} features", job.plan.len());
        self.transformer.transform(&job)?;
        info!("Transform graph written to {}", graph.uri());
        Ok(StepOutcome::with_outputs(vec![graph, transformed_train, transformed_eval]))
    }
}
