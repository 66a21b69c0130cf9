//! Composición ordenada de inyectores.

use serde_json::Value;

use super::merge::merge_json;
use super::param_injector::ParamInjector;
use crate::model::ExecutionContext;

/// Cadena de inyectores; cada uno ve los params ya acumulados por los
/// anteriores. También es un `ParamInjector`, así que una cadena se puede
/// registrar en el engine como un único inyector.
#[derive(Debug, Default)]
pub struct CompositeInjector {
    pub injectors: Vec<Box<dyn ParamInjector>>,
}

impl CompositeInjector {
    pub fn push(mut self, injector: Box<dyn ParamInjector>) -> Self {
        self.injectors.push(injector);
        self
    }

    /// Aplica `injectors` en orden sobre `base`.
    pub fn apply_injectors(injectors: &[Box<dyn ParamInjector>], base: &Value, ctx: &ExecutionContext) -> Value {
        injectors.iter()
                 .fold(base.clone(), |acc, inj| merge_json(&acc, &inj.inject(&acc, ctx)))
    }
}

impl ParamInjector for CompositeInjector {
    fn inject(&self, base: &Value, ctx: &ExecutionContext) -> Value {
        Self::apply_injectors(&self.injectors, base, ctx)
    }
}
