use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Artifact, ArtifactKind, OutputArtifact};
use crate::errors::CoreEngineError;

/// Contexto de ejecución entregado a `StepDefinition::run`.
///
/// Contiene los inputs ya congelados (por nombre de input declarado), los
/// parámetros canónicos (base + inyectores) y las ubicaciones que el engine
/// reservó para cada output declarado.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub run_id: String,
    pub step_id: String,
    pub inputs: BTreeMap<String, Artifact>,
    pub params: Value,
    outputs: BTreeMap<String, (ArtifactKind, String)>,
}

impl ExecutionContext {
    pub fn new(run_id: impl Into<String>, step_id: impl Into<String>, params: Value) -> Self {
        Self { run_id: run_id.into(),
               step_id: step_id.into(),
               inputs: BTreeMap::new(),
               params,
               outputs: BTreeMap::new() }
    }

    pub fn with_input(mut self, name: impl Into<String>, artifact: Artifact) -> Self {
        self.inputs.insert(name.into(), artifact);
        self
    }

    /// Reserva la ubicación de un output declarado.
    pub fn with_output(mut self, name: impl Into<String>, kind: ArtifactKind, uri: impl Into<String>) -> Self {
        self.outputs.insert(name.into(), (kind, uri.into()));
        self
    }

    /// Input declarado; su ausencia es un error del wiring.
    pub fn input(&self, name: &str) -> Result<&Artifact, CoreEngineError> {
        self.inputs.get(name).ok_or_else(|| CoreEngineError::MissingInputs { step_id: self.step_id.clone(),
                                                                            input: name.to_string() })
    }

    /// Crea el artifact pendiente de un output declarado en la ubicación que
    /// el engine le asignó.
    pub fn output(&self, name: &str) -> Result<OutputArtifact, CoreEngineError> {
        let (kind, uri) = self.outputs.get(name).ok_or_else(|| {
                                                    CoreEngineError::Internal(format!("step `{}` has no output `{name}`",
                                                                                      self.step_id))
                                                })?;
        Ok(OutputArtifact::new(name, *kind, uri.clone()))
    }

    /// Decodifica los parámetros al struct tipado del step.
    pub fn params_as<T: DeserializeOwned>(&self) -> Result<T, CoreEngineError> {
        serde_json::from_value(self.params.clone()).map_err(|e| {
                                                        CoreEngineError::Config(format!("invalid params for step `{}`: {e}",
                                                                                        self.step_id))
                                                    })
    }

    /// Nombre determinista para jobs externos: mismo run + mismo sufijo
    /// produce siempre el mismo nombre, lo que permite reutilizar un job en
    /// vuelo tras un reintento.
    pub fn job_name(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_input_names_step_and_input() {
        let ctx = ExecutionContext::new("run-1", "writer", json!({}));
        let err = ctx.input("prediction_results").unwrap_err();
        assert_eq!(err,
                   CoreEngineError::MissingInputs { step_id: "writer".into(),
                                                    input: "prediction_results".into() });
    }

    #[test]
    fn output_uses_reserved_location() {
        let ctx = ExecutionContext::new("run-1", "gen", json!({})).with_output("out", ArtifactKind::Dataset, "/root/gen/out/1");
        let out = ctx.output("out").unwrap();
        assert_eq!(out.uri(), "/root/gen/out/1");
        assert_eq!(out.kind(), ArtifactKind::Dataset);
        assert!(ctx.output("other").is_err());
        assert_eq!(ctx.job_name("extract"), "extract-run-1");
    }
}
