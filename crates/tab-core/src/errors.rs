//! Errores específicos del core.
//!
//! `CoreEngineError` es serializable porque viaja dentro de los eventos
//! `StepFailed` del `EventStore`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum CoreEngineError {
    #[error("flow already completed")]
    FlowCompleted,
    #[error("invalid step index")]
    InvalidStepIndex,
    #[error("step `{step_id}` is missing required input `{input}`")]
    MissingInputs { step_id: String, input: String },
    #[error("invalid flow definition: {0}")]
    InvalidDefinition(String),
    #[error("flow has failed previously (stop-on-failure invariant)")]
    FlowHasFailed,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("external service error: {0}")]
    External(String),
    #[error("artifact storage error: {0}")]
    Storage(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl From<std::io::Error> for CoreEngineError {
    fn from(e: std::io::Error) -> Self {
        CoreEngineError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for CoreEngineError {
    fn from(e: serde_json::Error) -> Self {
        CoreEngineError::Internal(format!("json: {e}"))
    }
}
