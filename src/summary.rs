//! Resumen de una ejecución a partir de sus eventos.
use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tab_core::{FlowEvent, FlowEventKind};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Running,
    Finished,
    Cached,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub state: StepState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalReport {
    pub step_id: String,
    pub signal: String,
    pub data: Value,
}

/// Estado por step (en orden de ejecución), señales emitidas y fingerprint
/// del flow si llegó a completarse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub flow_id: Uuid,
    pub steps: IndexMap<String, StepReport>,
    pub signals: Vec<SignalReport>,
    pub flow_fingerprint: Option<String>,
}

impl RunSummary {
    pub fn from_events(flow_id: Uuid, events: &[FlowEvent]) -> Self {
        let mut steps: IndexMap<String, StepReport> = IndexMap::new();
        let mut started: IndexMap<String, DateTime<Utc>> = IndexMap::new();
        let mut signals = Vec::new();
        let mut flow_fingerprint = None;

        for event in events.iter().filter(|e| e.flow_id == flow_id) {
            match &event.kind {
                FlowEventKind::StepStarted { step_id, .. } => {
                    started.insert(step_id.clone(), event.ts);
                    steps.insert(step_id.clone(),
                                 StepReport { state: StepState::Running,
                                              error: None,
                                              duration_ms: None });
                }
                FlowEventKind::StepFinished { step_id, cached, .. } => {
                    let state = if *cached { StepState::Cached } else { StepState::Finished };
                    let duration_ms = started.get(step_id).map(|t| (event.ts - *t).num_milliseconds());
                    steps.insert(step_id.clone(),
                                 StepReport { state,
                                              error: None,
                                              duration_ms });
                }
                FlowEventKind::StepFailed { step_id, error, .. } => {
                    let duration_ms = started.get(step_id).map(|t| (event.ts - *t).num_milliseconds());
                    steps.insert(step_id.clone(),
                                 StepReport { state: StepState::Failed,
                                              error: Some(error.to_string()),
                                              duration_ms });
                }
                FlowEventKind::StepSignal { step_id, signal, data, .. } => {
                    signals.push(SignalReport { step_id: step_id.clone(),
                                                signal: signal.clone(),
                                                data: data.clone() });
                }
                FlowEventKind::FlowCompleted { flow_fingerprint: fp } => flow_fingerprint = Some(fp.clone()),
                FlowEventKind::FlowInitialized { .. } => {}
            }
        }
        Self { flow_id,
               steps,
               signals,
               flow_fingerprint }
    }

    pub fn failed(&self) -> bool {
        self.steps.values().any(|s| s.state == StepState::Failed)
    }

    pub fn completed(&self) -> bool {
        self.flow_fingerprint.is_some()
    }

    pub fn has_signal(&self, signal: &str) -> bool {
        self.signals.iter().any(|s| s.signal == signal)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "flow {}", self.flow_id)?;
        for (step_id, report) in &self.steps {
            write!(f, "  {step_id:<22} {:?}", report.state)?;
            if let Some(ms) = report.duration_ms {
                write!(f, " ({ms} ms)")?;
            }
            if let Some(error) = &report.error {
                write!(f, " error: {error}")?;
            }
            writeln!(f)?;
        }
        for s in &self.signals {
            writeln!(f, "  signal {} from {}", s.signal, s.step_id)?;
        }
        match &self.flow_fingerprint {
            Some(fp) => write!(f, "  completed, fingerprint {fp}"),
            None => write!(f, "  not completed"),
        }
    }
}
