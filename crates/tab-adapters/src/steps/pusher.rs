//! PusherStep (Sink)
//!
//! Copia el modelo de serving a `<model_registry_uri>/<versión>` sólo si el
//! modelo está bendecido. La versión son los segundos unix del push.

use std::sync::Arc;

use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use tab_core::{join_uri, ArtifactKind, CoreEngineError, ExecutionContext, ObjectStore, PortSpec, StepKind, StepOutcome,
               TypedStep};

use crate::artifacts::is_blessed;
use crate::steps::trainer::{EXPORT_DEGRADED, SERVING_MODEL_DIR};

pub const STEP_ID: &str = "pusher";
pub const INPUT_MODEL: &str = "model";
pub const INPUT_BLESSING: &str = "model_blessing";
pub const OUTPUT: &str = "pushed_model";
pub const PUSHED_PROPERTY: &str = "pushed";
pub const PUSHED_DESTINATION_PROPERTY: &str = "pushed_destination";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PusherParams {
    pub model_registry_uri: String,
}

#[derive(Debug)]
pub struct PusherStep {
    params: PusherParams,
    store: Arc<dyn ObjectStore>,
}

impl PusherStep {
    pub fn new(params: PusherParams, store: Arc<dyn ObjectStore>) -> Self {
        Self { params, store }
    }
}

impl TypedStep for PusherStep {
    type Params = PusherParams;

    fn id(&self) -> &str {
        STEP_ID
    }

    fn kind(&self) -> StepKind {
        StepKind::Sink
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(INPUT_MODEL, ArtifactKind::Model),
             PortSpec::new(INPUT_BLESSING, ArtifactKind::ModelBlessing)]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(OUTPUT, ArtifactKind::PushedModel)]
    }

    fn params(&self) -> &PusherParams {
        &self.params
    }

    fn run_typed(&self, ctx: &ExecutionContext, p: PusherParams) -> Result<StepOutcome, CoreEngineError> {
        let model = ctx.input(INPUT_MODEL)?;
        let blessing = ctx.input(INPUT_BLESSING)?;
        let mut out = ctx.output(OUTPUT)?;

        if !is_blessed(blessing) {
            info!("Model not blessed; skipping push.");
            out.set_int_property(PUSHED_PROPERTY, 0);
            return Ok(StepOutcome::with_outputs(vec![out]));
        }

        // bendecido pero sin export de serving: nunca se empuja
        if model.int_property(EXPORT_DEGRADED) == Some(1) {
            return Err(CoreEngineError::External(format!("model is blessed but its serving export degraded; nothing to push from {}",
                                                         model.uri())));
        }

        let version = Utc::now().timestamp();
        let destination = join_uri(&p.model_registry_uri, &version.to_string());
        let files = self.store.copy_tree(&join_uri(model.uri(), SERVING_MODEL_DIR), &destination)?;
        info!("Model pushed to {destination} ({files} files)");
        out.set_int_property(PUSHED_PROPERTY, 1);
        out.set_string_property(PUSHED_DESTINATION_PROPERTY, destination);
        Ok(StepOutcome::with_outputs(vec![out]))
    }
}
