use serde::{de::DeserializeOwned, Serialize};

use super::{PortSpec, StepKind, StepOutcome, StepRunResult};
use crate::errors::CoreEngineError;
use crate::model::ExecutionContext;

/// Interfaz de alto nivel para definir Steps con parámetros tipados.
///
/// Cada componente se construye con su struct de parámetros explícito; el
/// adaptador de abajo lo serializa como `base_params` y lo vuelve a
/// decodificar desde el contexto (que puede traer overrides de inyectores),
/// de modo que una combinación inválida falla antes de tocar servicios.
pub trait TypedStep {
    type Params: DeserializeOwned + Serialize + Clone;

    /// Identificador estable del step dentro del flow.
    fn id(&self) -> &str;

    /// Nombre amigable (por defecto usa el id).
    fn name(&self) -> &str {
        self.id()
    }

    fn kind(&self) -> StepKind;

    fn inputs(&self) -> Vec<PortSpec> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<PortSpec> {
        Vec::new()
    }

    /// Parámetros con los que se construyó el step.
    fn params(&self) -> &Self::Params;

    fn run_typed(&self, ctx: &ExecutionContext, params: Self::Params) -> Result<StepOutcome, CoreEngineError>;
}

// -------------------------------------------------------------
// Adaptador: cualquier `TypedStep` implementa `StepDefinition` neutro.
// -------------------------------------------------------------
impl<T> crate::step::StepDefinition for T where T: TypedStep + std::fmt::Debug
{
    fn id(&self) -> &str {
        <Self as TypedStep>::id(self)
    }

    fn name(&self) -> &str {
        <Self as TypedStep>::name(self)
    }

    fn kind(&self) -> StepKind {
        <Self as TypedStep>::kind(self)
    }

    fn inputs(&self) -> Vec<PortSpec> {
        <Self as TypedStep>::inputs(self)
    }

    fn outputs(&self) -> Vec<PortSpec> {
        <Self as TypedStep>::outputs(self)
    }

    fn base_params(&self) -> serde_json::Value {
        serde_json::to_value(self.params()).unwrap_or(serde_json::Value::Null)
    }

    fn run(&self, ctx: &ExecutionContext) -> StepRunResult {
        let params = match ctx.params_as::<T::Params>() {
            Ok(p) => p,
            Err(error) => return StepRunResult::Failure { error },
        };
        self.run_typed(ctx, params).into()
    }
}
