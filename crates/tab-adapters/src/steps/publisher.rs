//! ModelPublisherStep (Check)
//!
//! Puerta de calidad + publicación en el registry. Sólo un modelo con
//! blessing `true` llega al registry; en otro caso el output queda con
//! `uploaded = 0` y se emite la señal `model_not_blessed`.
//!
//! Si el registry ya tiene ese mismo directorio bajo el display name (un
//! reintento tras un fallo posterior a la subida), se reutiliza el recurso.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tab_core::{join_uri, ArtifactKind, CoreEngineError, ExecutionContext, ObjectStore, PortSpec, StepKind, StepOutcome,
               StepSignal, TypedStep};
use tab_domain::ExplanationConfig;

use crate::artifacts::is_blessed;
use crate::services::{ModelRegistry, ModelUploadRequest};

pub const STEP_ID: &str = "model_publisher";
pub const INPUT_BLESSING: &str = "model_blessing";
pub const OUTPUT: &str = "uploaded_model";
pub const UPLOADED_PROPERTY: &str = "uploaded";
pub const MODEL_URI_PROPERTY: &str = "model_uri";
pub const NOT_BLESSED_SIGNAL: &str = "model_not_blessed";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPublisherParams {
    pub project: String,
    pub region: String,
    pub model_display_name: String,
    pub pushed_model_location: String,
    pub serving_image_uri: String,
    /// Documento JSON con `inputs`, `outputs` y `params`.
    #[serde(default)]
    pub explanation_config: String,
    /// Objeto JSON string -> string.
    #[serde(default)]
    pub labels: String,
}

impl ModelPublisherParams {
    fn check(&self) -> Result<(), CoreEngineError> {
        let required = [("project", &self.project),
                        ("region", &self.region),
                        ("model_display_name", &self.model_display_name),
                        ("serving_image_uri", &self.serving_image_uri)];
        match required.iter().find(|(_, v)| v.trim().is_empty()) {
            Some((key, _)) => Err(CoreEngineError::Config(format!("{STEP_ID}: `{key}` must be set"))),
            None => Ok(()),
        }
    }
}

fn parse_explanation(raw: &str) -> Option<ExplanationConfig> {
    match ExplanationConfig::from_json(raw) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            warn!("explanation config ignored: {e}");
            None
        }
    }
}

fn parse_labels(raw: &str) -> Option<BTreeMap<String, String>> {
    match serde_json::from_str(raw) {
        Ok(labels) => Some(labels),
        Err(e) => {
            warn!("labels ignored: {e}");
            None
        }
    }
}

#[derive(Debug)]
pub struct ModelPublisherStep {
    params: ModelPublisherParams,
    store: Arc<dyn ObjectStore>,
    registry: Arc<dyn ModelRegistry>,
}

impl ModelPublisherStep {
    pub fn new(params: ModelPublisherParams, store: Arc<dyn ObjectStore>, registry: Arc<dyn ModelRegistry>) -> Self {
        Self { params,
               store,
               registry }
    }
}

impl TypedStep for ModelPublisherStep {
    type Params = ModelPublisherParams;

    fn id(&self) -> &str {
        STEP_ID
    }

    fn kind(&self) -> StepKind {
        StepKind::Check
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(INPUT_BLESSING, ArtifactKind::ModelBlessing)]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(OUTPUT, ArtifactKind::UploadedModel)]
    }

    fn params(&self) -> &ModelPublisherParams {
        &self.params
    }

    fn run_typed(&self, ctx: &ExecutionContext, p: ModelPublisherParams) -> Result<StepOutcome, CoreEngineError> {
        p.check()?;
        let blessing = ctx.input(INPUT_BLESSING)?;
        let mut out = ctx.output(OUTPUT)?;

        if !is_blessed(blessing) {
            info!("Model is not uploaded because it was not blessed by the evaluator.");
            out.set_int_property(UPLOADED_PROPERTY, 0);
            let signal = StepSignal::new(NOT_BLESSED_SIGNAL, json!({ "blessing": blessing.uri() }));
            return Ok(StepOutcome::with_outputs(vec![out]).signal(signal));
        }

        let latest = self.store
                         .list_subdirs(&p.pushed_model_location)?
                         .pop()
                         .ok_or_else(|| {
                             CoreEngineError::Storage(format!("no pushed model under {}", p.pushed_model_location))
                         })?;
        let model_dir = join_uri(&p.pushed_model_location, &latest);
        info!("Model registry location: {model_dir}");

        let existing = self.registry
                           .list(&p.model_display_name)?
                           .into_iter()
                           .rev()
                           .find(|m| m.artifact_uri == model_dir);
        if let Some(model) = existing {
            info!("Model already registered: {}", model.resource_name);
            out.set_string_property(MODEL_URI_PROPERTY, model.resource_name);
            out.set_int_property(UPLOADED_PROPERTY, 1);
            return Ok(StepOutcome::with_outputs(vec![out]));
        }

        let request = ModelUploadRequest { project: p.project,
                                           region: p.region,
                                           display_name: p.model_display_name,
                                           artifact_uri: model_dir,
                                           serving_image_uri: p.serving_image_uri,
                                           explanation: parse_explanation(&p.explanation_config),
                                           labels: parse_labels(&p.labels) };
        let model_uri = self.registry.upload(&request)?;
        info!("Model uploaded: {model_uri}");
        out.set_string_property(MODEL_URI_PROPERTY, model_uri);
        out.set_int_property(UPLOADED_PROPERTY, 1);
        Ok(StepOutcome::with_outputs(vec![out]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_names_the_missing_value() {
        let p = ModelPublisherParams { project: "p".into(),
                                       region: "r".into(),
                                       model_display_name: "m".into(),
                                       ..Default::default() };
        let err = p.check().unwrap_err();
        assert!(err.to_string().contains("serving_image_uri"));
    }

    #[test]
    fn labels_must_be_string_map() {
        assert_eq!(parse_labels(r#"{"team":"ml"}"#).unwrap()["team"], "ml");
        assert!(parse_labels(r#"{"n":1}"#).is_none());
        assert!(parse_labels("").is_none());
        assert!(parse_explanation("{oops").is_none());
    }
}
