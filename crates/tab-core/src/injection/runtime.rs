use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::ParamInjector;
use crate::errors::CoreEngineError;
use crate::model::ExecutionContext;

/// Overrides de parámetros por step fijados al lanzar una ejecución.
///
/// Las claves son `step_id` y los valores un objeto JSON que se mergea sobre
/// los params del step. Un override que no casa con el struct tipado del
/// componente hace fallar el step al decodificar sus params.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeParameters {
    overrides: BTreeMap<String, Map<String, Value>>,
}

impl RuntimeParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, step_id: impl Into<String>, key: impl Into<String>, value: Value) {
        self.overrides.entry(step_id.into()).or_default().insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    pub fn for_step(&self, step_id: &str) -> Option<&Map<String, Value>> {
        self.overrides.get(step_id)
    }

    /// Parsea una asignación `step.key=value`. El valor se interpreta como
    /// JSON si es válido (números, booleanos, objetos) y si no como string.
    pub fn parse_assignment(&mut self, raw: &str) -> Result<(), CoreEngineError> {
        let invalid = || CoreEngineError::Config(format!("expected `step.key=value`, got `{raw}`"));
        let (path, value) = raw.split_once('=').ok_or_else(invalid)?;
        let (step_id, key) = path.split_once('.').ok_or_else(invalid)?;
        if step_id.is_empty() || key.is_empty() {
            return Err(invalid());
        }
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        self.set(step_id, key, value);
        Ok(())
    }
}

impl ParamInjector for RuntimeParameters {
    fn inject(&self, _base: &Value, ctx: &ExecutionContext) -> Value {
        match self.overrides.get(&ctx.step_id) {
            Some(map) => Value::Object(map.clone()),
            None => Value::Null,
        }
    }
}
