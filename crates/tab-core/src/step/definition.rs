use serde::Serialize;
use serde_json::{json, Value};

use super::run_result::StepRunResult;
use crate::model::{ArtifactKind, ExecutionContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepKind {
    Source,
    Transform,
    Sink,
    Check,
}

/// Input u output declarado por un step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortSpec {
    pub name: String,
    pub kind: ArtifactKind,
}

impl PortSpec {
    pub fn new(name: impl Into<String>, kind: ArtifactKind) -> Self {
        Self { name: name.into(), kind }
    }
}

/// Trait que define un Step. Implementaciones deben ser puras respecto a
/// inputs + params; los efectos externos van por los servicios que el step
/// recibe en su constructor.
pub trait StepDefinition {
    /// Identificador estable y único dentro del Flow.
    fn id(&self) -> &str;

    /// Nombre opcional amigable.
    fn name(&self) -> &str {
        self.id()
    }

    /// Tipo general del step.
    fn kind(&self) -> StepKind;

    fn inputs(&self) -> Vec<PortSpec> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<PortSpec> {
        Vec::new()
    }

    /// Parámetros base deterministas, ya resueltos al construir el step.
    fn base_params(&self) -> Value;

    fn run(&self, ctx: &ExecutionContext) -> StepRunResult;

    /// Hash de la forma del step (id, kind, puertos y params base).
    fn definition_hash(&self) -> String {
        crate::hashing::hash_value(&json!({
            "id": self.id(),
            "kind": self.kind(),
            "inputs": self.inputs(),
            "outputs": self.outputs(),
            "base_params": self.base_params(),
        }))
    }
}
