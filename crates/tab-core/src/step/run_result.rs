use serde_json::Value;

use crate::{errors::CoreEngineError, model::OutputArtifact};

/// Hito ligero emitido por un step (p. ej. `model_not_blessed`). No altera
/// el estado del flujo; queda registrado como evento `StepSignal`.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSignal {
    pub signal: String,
    pub data: Value,
}

impl StepSignal {
    pub fn new(signal: impl Into<String>, data: Value) -> Self {
        Self { signal: signal.into(), data }
    }
}

/// Resultado abstracto de ejecutar un step.
#[derive(Debug)]
pub enum StepRunResult {
    Success { outputs: Vec<OutputArtifact> },
    SuccessWithSignals { outputs: Vec<OutputArtifact>, signals: Vec<StepSignal> },
    Failure { error: CoreEngineError },
}

/// Salida exitosa de un `TypedStep`.
#[derive(Debug, Default)]
pub struct StepOutcome {
    pub outputs: Vec<OutputArtifact>,
    pub signals: Vec<StepSignal>,
}

impl StepOutcome {
    pub fn with_outputs(outputs: Vec<OutputArtifact>) -> Self {
        Self { outputs,
               signals: Vec::new() }
    }

    pub fn signal(mut self, signal: StepSignal) -> Self {
        self.signals.push(signal);
        self
    }
}

impl From<Result<StepOutcome, CoreEngineError>> for StepRunResult {
    fn from(res: Result<StepOutcome, CoreEngineError>) -> Self {
        match res {
            Ok(StepOutcome { outputs, signals }) if signals.is_empty() => StepRunResult::Success { outputs },
            Ok(StepOutcome { outputs, signals }) => StepRunResult::SuccessWithSignals { outputs, signals },
            Err(error) => StepRunResult::Failure { error },
        }
    }
}
