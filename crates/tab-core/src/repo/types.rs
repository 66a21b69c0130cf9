//! Tipos de repositorio: estado reconstruido (`FlowInstance`) y definición
//! (`FlowDefinition`).
//!
//! El repositorio aplica un replay lineal: consume eventos en orden y
//! actualiza un `FlowInstance`. No almacena artifacts completos (sólo
//! hashes); el engine guarda los artifacts congelados aparte.
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::errors::CoreEngineError;
use crate::event::{FlowEvent, FlowEventKind};
use crate::step::{StepDefinition, StepStatus};

pub struct FlowInstance {
    pub id: Uuid,
    pub steps: Vec<StepSlot>,
    pub cursor: usize,
    pub completed: bool,
    pub failed: bool,
}

/// Estado de un step en la instancia.
pub struct StepSlot {
    pub step_id: String,
    pub status: StepStatus,
    pub fingerprint: Option<String>,
    pub outputs: Vec<String>, // hashes en el orden de los outputs declarados
    pub cached: bool,
    pub started_at: Option<DateTime<Utc>>,
    /// `seq` del último `StepStarted`; fija las ubicaciones de sus outputs.
    pub started_seq: Option<u64>,
    pub finished_at: Option<DateTime<Utc>>,
    pub attempts: u32,
}

/// Trait para reconstruir (`replay`) estado de un flow a partir de eventos.
pub trait FlowRepository {
    fn load(&self, flow_id: Uuid, events: &[FlowEvent], definition: &FlowDefinition) -> FlowInstance;
}

/// Conexión de un input del step con el output de un step anterior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wire {
    pub input: String,
    pub producer_index: usize,
    pub output_index: usize,
}

/// Definición inmutable del Flow: steps en orden de ejecución más su wiring.
pub struct FlowDefinition {
    pub steps: Vec<Box<dyn StepDefinition>>,
    pub wiring: Vec<Vec<Wire>>,
    pub definition_hash: String,
}

impl FlowDefinition {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn index_of(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id() == step_id)
    }

    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id()).collect()
    }
}

impl std::fmt::Debug for FlowDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowDefinition")
         .field("steps", &self.step_ids())
         .field("definition_hash", &self.definition_hash)
         .finish()
    }
}

/// Builder de `FlowDefinition`. Los steps se añaden en orden de ejecución y
/// `wire` conecta un input del último step añadido con un output de un step
/// anterior. `build` valida el grafo completo antes de que corra nada.
///
/// ```ignore
/// let def = FlowDefinitionBuilder::new()
///     .step(extraction)
///     .step(batch_prediction)
///     .wire("serving_dataset", "data_extraction", "serving_dataset")
///     .build()?;
/// ```
#[derive(Default)]
pub struct FlowDefinitionBuilder {
    steps: Vec<Box<dyn StepDefinition>>,
    wires: Vec<Vec<(String, String, String)>>,
    errors: Vec<String>,
}

impl FlowDefinitionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step<S: StepDefinition + 'static>(self, step: S) -> Self {
        self.boxed_step(Box::new(step))
    }

    pub fn boxed_step(mut self, step: Box<dyn StepDefinition>) -> Self {
        self.steps.push(step);
        self.wires.push(Vec::new());
        self
    }

    /// Conecta `input` del último step con `output` de `producer`.
    pub fn wire(mut self, input: &str, producer: &str, output: &str) -> Self {
        match self.wires.last_mut() {
            Some(w) => w.push((input.to_string(), producer.to_string(), output.to_string())),
            None => self.errors.push(format!("wire `{input}` declared before any step")),
        }
        self
    }

    pub fn build(self) -> Result<FlowDefinition, CoreEngineError> {
        if let Some(e) = self.errors.first() {
            return Err(CoreEngineError::InvalidDefinition(e.clone()));
        }
        let mut seen = HashSet::new();
        for s in &self.steps {
            if !seen.insert(s.id().to_string()) {
                return Err(CoreEngineError::InvalidDefinition(format!("duplicate step id `{}`", s.id())));
            }
        }

        let mut wiring = Vec::with_capacity(self.steps.len());
        let mut hash_steps = Vec::with_capacity(self.steps.len());
        for (index, (step, wires)) in self.steps.iter().zip(self.wires.iter()).enumerate() {
            let declared = step.inputs();
            let mut resolved: Vec<Wire> = Vec::with_capacity(wires.len());
            for (input, producer, output) in wires {
                let invalid = |msg: String| CoreEngineError::InvalidDefinition(format!("step `{}`: {msg}", step.id()));
                let port = declared.iter()
                                   .find(|p| &p.name == input)
                                   .ok_or_else(|| invalid(format!("undeclared input `{input}`")))?;
                if resolved.iter().any(|w| &w.input == input) {
                    return Err(invalid(format!("input `{input}` wired twice")));
                }
                let producer_index = self.steps[..index].iter()
                                                        .position(|p| p.id() == producer)
                                                        .ok_or_else(|| invalid(format!("producer `{producer}` is unknown or runs later")))?;
                let producer_outputs = self.steps[producer_index].outputs();
                let output_index = producer_outputs.iter()
                                                   .position(|o| &o.name == output)
                                                   .ok_or_else(|| invalid(format!("`{producer}` has no output `{output}`")))?;
                let produced = producer_outputs[output_index].kind;
                if produced != port.kind {
                    return Err(invalid(format!("input `{input}` expects {} but `{producer}.{output}` is {produced}",
                                               port.kind)));
                }
                resolved.push(Wire { input: input.clone(),
                                     producer_index,
                                     output_index });
            }
            if let Some(missing) = declared.iter().find(|p| !resolved.iter().any(|w| w.input == p.name)) {
                return Err(CoreEngineError::InvalidDefinition(format!("step `{}`: input `{}` is not wired",
                                                                      step.id(),
                                                                      missing.name)));
            }
            hash_steps.push(json!({
                "id": step.id(),
                "definition_hash": step.definition_hash(),
                "wiring": wires,
            }));
            wiring.push(resolved);
        }

        let definition_hash = crate::hashing::hash_value(&json!({ "steps": hash_steps }));
        Ok(FlowDefinition { steps: self.steps,
                            wiring,
                            definition_hash })
    }
}

#[derive(Debug, Default)]
pub struct InMemoryFlowRepository;

impl InMemoryFlowRepository {
    pub fn new() -> Self {
        Self
    }
}

impl FlowRepository for InMemoryFlowRepository {
    fn load(&self, flow_id: Uuid, events: &[FlowEvent], definition: &FlowDefinition) -> FlowInstance {
        let mut steps: Vec<StepSlot> = definition.steps
                                                 .iter()
                                                 .map(|s| StepSlot { step_id: s.id().to_string(),
                                                                     status: StepStatus::Pending,
                                                                     fingerprint: None,
                                                                     outputs: vec![],
                                                                     cached: false,
                                                                     started_at: None,
                                                                     started_seq: None,
                                                                     finished_at: None,
                                                                     attempts: 0 })
                                                 .collect();
        let mut completed = false;
        let mut failed = false;
        for ev in events {
            match &ev.kind {
                FlowEventKind::FlowInitialized { .. } | FlowEventKind::StepSignal { .. } => {}
                FlowEventKind::StepStarted { step_index, .. } => {
                    if let Some(slot) = steps.get_mut(*step_index) {
                        slot.status = StepStatus::Running;
                        slot.started_at = Some(ev.ts);
                        slot.started_seq = Some(ev.seq);
                        slot.attempts += 1;
                    }
                }
                FlowEventKind::StepFinished { step_index,
                                              fingerprint,
                                              outputs,
                                              cached,
                                              .. } => {
                    if let Some(slot) = steps.get_mut(*step_index) {
                        slot.status = StepStatus::FinishedOk;
                        slot.fingerprint = Some(fingerprint.clone());
                        slot.outputs = outputs.clone();
                        slot.cached = *cached;
                        slot.finished_at = Some(ev.ts);
                    }
                }
                FlowEventKind::StepFailed { step_index, fingerprint, .. } => {
                    if let Some(slot) = steps.get_mut(*step_index) {
                        slot.status = StepStatus::Failed;
                        slot.fingerprint = Some(fingerprint.clone());
                        slot.finished_at = Some(ev.ts);
                    }
                    failed = true;
                }
                FlowEventKind::FlowCompleted { .. } => completed = true,
            }
        }
        // Un step `Running` sin evento terminal (proceso caído a mitad) se
        // reanuda en lugar de saltarse.
        let cursor = steps.iter()
                          .position(|s| matches!(s.status, StepStatus::Pending | StepStatus::Running))
                          .unwrap_or(steps.len());
        FlowInstance { id: flow_id,
                       steps,
                       cursor,
                       completed,
                       failed }
    }
}
