//! FlowEngine: ejecución determinista de un `FlowDefinition`.
//!
//! Cada llamada a `next_with` reconstruye el estado del flow desde el
//! `EventStore` (replay en el `FlowRepository`), ejecuta el step apuntado por
//! el cursor y añade los eventos resultantes. No hay estado mutable del flow
//! fuera de los eventos salvo el almacén de artifacts congelados (indexado
//! por hash) y la cache opcional.

use std::collections::{BTreeMap, HashMap};

use log::{debug, error, info};
use serde_json::json;
use uuid::Uuid;

use crate::constants::ENGINE_VERSION;
use crate::engine::EngineBuilderInit;
use crate::errors::CoreEngineError;
use crate::event::{EventStore, FlowEvent, FlowEventKind, InMemoryEventStore};
use crate::hashing::hash_value;
use crate::injection::{CompositeInjector, ParamInjector};
use crate::model::{Artifact, ExecutionContext, OutputArtifact, StepFingerprintInput};
use crate::repo::{FlowDefinition, FlowInstance, FlowRepository, InMemoryFlowRepository};
use crate::step::{PortSpec, StepDefinition, StepRunResult, StepSignal, StepStatus};
use crate::storage::join_uri;

/// Motor de ejecución de flujos deterministas.
///
/// Orquesta los steps en orden de definición, resuelve el wiring de inputs,
/// reserva la ubicación de cada output y garantiza stop-on-failure.
#[derive(Debug)]
pub struct FlowEngine<E, R>
    where E: EventStore,
          R: FlowRepository
{
    event_store: E,
    repository: R,
    artifact_store: HashMap<String, Artifact>,
    injectors: Vec<Box<dyn ParamInjector>>,
    pipeline_root: String,
    // clave de cache -> hashes de outputs
    cache: Option<HashMap<String, Vec<String>>>,
}

impl FlowEngine<InMemoryEventStore, InMemoryFlowRepository> {
    /// Builder con stores en memoria.
    #[inline]
    pub fn new() -> EngineBuilderInit<InMemoryEventStore, InMemoryFlowRepository> {
        EngineBuilderInit::new(InMemoryEventStore::default(), InMemoryFlowRepository::new())
    }
}

impl<E, R> FlowEngine<E, R>
    where E: EventStore,
          R: FlowRepository
{
    #[inline]
    pub fn builder(event_store: E, repository: R) -> EngineBuilderInit<E, R> {
        EngineBuilderInit::new(event_store, repository)
    }

    pub(crate) fn from_parts(event_store: E,
                             repository: R,
                             pipeline_root: String,
                             injectors: Vec<Box<dyn ParamInjector>>,
                             enable_cache: bool)
                             -> Self {
        Self { event_store,
               repository,
               artifact_store: HashMap::new(),
               injectors,
               pipeline_root,
               cache: enable_cache.then(HashMap::new) }
    }

    pub fn add_injector(&mut self, injector: Box<dyn ParamInjector>) {
        self.injectors.push(injector);
    }

    pub fn pipeline_root(&self) -> &str {
        &self.pipeline_root
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Artifact congelado por hash.
    pub fn artifact(&self, hash: &str) -> Option<&Artifact> {
        self.artifact_store.get(hash)
    }

    /// Eventos de un flow (orden ascendente).
    pub fn events_for(&self, flow_id: Uuid) -> Vec<FlowEvent> {
        self.event_store.list(flow_id)
    }

    /// Estado reconstruido del flow.
    pub fn instance(&self, flow_id: Uuid, definition: &FlowDefinition) -> FlowInstance {
        let events = self.event_store.list(flow_id);
        self.repository.load(flow_id, &events, definition)
    }

    /// Output `output` producido por `step_id` en el flow, si ya terminó.
    pub fn output_artifact(&self,
                           flow_id: Uuid,
                           definition: &FlowDefinition,
                           step_id: &str,
                           output: &str)
                           -> Option<&Artifact> {
        let index = definition.index_of(step_id)?;
        let position = definition.steps[index].outputs().iter().position(|p| p.name == output)?;
        let instance = self.instance(flow_id, definition);
        let hash = instance.steps.get(index)?.outputs.get(position)?;
        self.artifact_store.get(hash)
    }

    /// Ejecuta el flow hasta completarlo o hasta el primer fallo.
    pub fn run_flow(&mut self, flow_id: Uuid, definition: &FlowDefinition) -> Result<Uuid, CoreEngineError> {
        loop {
            match self.next_with(flow_id, definition) {
                Ok(()) => continue,
                Err(CoreEngineError::FlowCompleted) => return Ok(flow_id),
                Err(e) => return Err(e),
            }
        }
    }

    fn load_or_init(&mut self, flow_id: Uuid, definition: &FlowDefinition) -> Vec<FlowEvent> {
        let mut events = self.event_store.list(flow_id);
        let has_init = events.iter().any(|e| matches!(e.kind, FlowEventKind::FlowInitialized { .. }));
        if !has_init {
            debug!("initializing flow {flow_id} ({} steps)", definition.len());
            let ev = self.event_store
                         .append_kind(flow_id,
                                      FlowEventKind::FlowInitialized { definition_hash: definition.definition_hash.clone(),
                                                                       step_count: definition.len() });
            events.push(ev);
        }
        events
    }

    /// Ejecuta el siguiente step pendiente del flow.
    ///
    /// Devuelve `FlowCompleted` cuando no quedan steps y `FlowHasFailed` si
    /// un step anterior falló.
    pub fn next_with(&mut self, flow_id: Uuid, definition: &FlowDefinition) -> Result<(), CoreEngineError> {
        let events = self.load_or_init(flow_id, definition);
        let instance = self.repository.load(flow_id, &events, definition);

        if instance.failed {
            return Err(CoreEngineError::FlowHasFailed);
        }
        if instance.completed {
            return Err(CoreEngineError::FlowCompleted);
        }
        let cursor = instance.cursor;
        if cursor >= definition.len() {
            self.complete_flow(flow_id, definition);
            return Err(CoreEngineError::FlowCompleted);
        }

        let step_def = definition.steps[cursor].as_ref();
        let step_id = step_def.id().to_string();
        let run_id = flow_id.to_string();

        // Inputs: cada wire apunta a un output ya congelado de un step anterior.
        let mut ctx = ExecutionContext::new(run_id, step_id.clone(), step_def.base_params());
        for wire in definition.wiring.get(cursor).into_iter().flatten() {
            let artifact = instance.steps
                                   .get(wire.producer_index)
                                   .and_then(|slot| slot.outputs.get(wire.output_index))
                                   .and_then(|h| self.artifact_store.get(h))
                                   .cloned();
            match artifact {
                Some(a) => ctx.inputs.insert(wire.input.clone(), a),
                None => {
                    let error = CoreEngineError::MissingInputs { step_id: step_id.clone(),
                                                                 input: wire.input.clone() };
                    return self.handle_step_failure(flow_id, cursor, step_def, String::new(), error);
                }
            };
        }

        ctx.params = CompositeInjector::apply_injectors(&self.injectors, &ctx.params, &ctx);
        let mut input_hashes: Vec<String> = ctx.inputs.values().map(|a| a.hash().to_string()).collect();
        input_hashes.sort();
        let definition_hash = step_def.definition_hash();
        let fingerprint = StepFingerprintInput { engine_version: ENGINE_VERSION,
                                                 step_id: &step_id,
                                                 input_hashes: &input_hashes,
                                                 params: &ctx.params,
                                                 definition_hash: &definition_hash }.hash();

        if let Some(outputs) = self.cached_outputs(&fingerprint) {
            info!("step `{step_id}` served from cache");
            self.event_store.append_kind(flow_id,
                                         FlowEventKind::StepFinished { step_index: cursor,
                                                                       step_id,
                                                                       outputs,
                                                                       fingerprint,
                                                                       cached: true });
            if cursor + 1 == definition.len() {
                self.complete_flow(flow_id, definition);
            }
            return Ok(());
        }

        // Reanudar conserva el `seq` del arranque interrumpido: mismas
        // ubicaciones de outputs y mismos nombres de job externos.
        let resumed = instance.steps
                              .get(cursor)
                              .filter(|slot| matches!(slot.status, StepStatus::Running))
                              .and_then(|slot| slot.started_seq);
        let seq = match resumed {
            Some(seq) => {
                info!("resuming interrupted step `{step_id}` (started at seq {seq})");
                seq
            }
            None => {
                self.event_store
                    .append_kind(flow_id,
                                 FlowEventKind::StepStarted { step_index: cursor,
                                                              step_id: step_id.clone() })
                    .seq
            }
        };
        let declared = step_def.outputs();
        let mut allocated = BTreeMap::new();
        for port in &declared {
            let uri = self.allocate_uri(&step_id, &port.name, flow_id, seq);
            allocated.insert(port.name.clone(), uri.clone());
            ctx = ctx.with_output(port.name.clone(), port.kind, uri);
        }
        debug!("running step `{step_id}` (index {cursor})");

        let (outputs, signals) = match step_def.run(&ctx) {
            StepRunResult::Success { outputs } => (outputs, Vec::new()),
            StepRunResult::SuccessWithSignals { outputs, signals } => (outputs, signals),
            StepRunResult::Failure { error } => {
                return self.handle_step_failure(flow_id, cursor, step_def, fingerprint, error);
            }
        };
        match freeze_outputs(&step_id, &declared, &allocated, outputs) {
            Ok(frozen) => self.handle_step_success(flow_id, cursor, &step_id, frozen, signals, fingerprint, definition),
            Err(error) => self.handle_step_failure(flow_id, cursor, step_def, fingerprint, error),
        }
    }

    fn allocate_uri(&self, step_id: &str, output: &str, flow_id: Uuid, seq: u64) -> String {
        join_uri(&join_uri(&join_uri(&self.pipeline_root, step_id), output),
                 &format!("{flow_id}-{seq}"))
    }

    fn cached_outputs(&self, key: &str) -> Option<Vec<String>> {
        let hashes = self.cache.as_ref()?.get(key)?;
        // Sólo es un hit si los artifacts siguen disponibles.
        hashes.iter()
              .all(|h| self.artifact_store.contains_key(h))
              .then(|| hashes.clone())
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_step_success(&mut self,
                           flow_id: Uuid,
                           cursor: usize,
                           step_id: &str,
                           outputs: Vec<Artifact>,
                           signals: Vec<StepSignal>,
                           fingerprint: String,
                           definition: &FlowDefinition)
                           -> Result<(), CoreEngineError> {
        let mut hashes = Vec::with_capacity(outputs.len());
        for artifact in outputs {
            hashes.push(artifact.hash().to_string());
            self.artifact_store.insert(artifact.hash().to_string(), artifact);
        }
        for s in signals {
            info!("step `{step_id}` signal `{}`", s.signal);
            self.event_store.append_kind(flow_id,
                                         FlowEventKind::StepSignal { step_index: cursor,
                                                                     step_id: step_id.to_string(),
                                                                     signal: s.signal,
                                                                     data: s.data });
        }
        if let Some(cache) = self.cache.as_mut() {
            cache.insert(fingerprint.clone(), hashes.clone());
        }
        self.event_store.append_kind(flow_id,
                                     FlowEventKind::StepFinished { step_index: cursor,
                                                                   step_id: step_id.to_string(),
                                                                   outputs: hashes,
                                                                   fingerprint,
                                                                   cached: false });
        if cursor + 1 == definition.len() {
            self.complete_flow(flow_id, definition);
        }
        Ok(())
    }

    fn handle_step_failure(&mut self,
                           flow_id: Uuid,
                           cursor: usize,
                           step_def: &dyn StepDefinition,
                           fingerprint: String,
                           error: CoreEngineError)
                           -> Result<(), CoreEngineError> {
        error!("step `{}` failed: {error}", step_def.id());
        let fingerprint = if fingerprint.is_empty() {
            hash_value(&json!({
                "engine_version": ENGINE_VERSION,
                "definition_hash": step_def.definition_hash(),
                "step_index": cursor,
            }))
        } else {
            fingerprint
        };
        self.event_store.append_kind(flow_id,
                                     FlowEventKind::StepFailed { step_index: cursor,
                                                                 step_id: step_def.id().to_string(),
                                                                 error: error.clone(),
                                                                 fingerprint });
        Err(error)
    }

    fn complete_flow(&mut self, flow_id: Uuid, definition: &FlowDefinition) {
        let events = self.event_store.list(flow_id);
        let step_fps: Vec<String> = events.iter()
                                          .filter_map(|e| match &e.kind {
                                              FlowEventKind::StepFinished { fingerprint, .. } => Some(fingerprint.clone()),
                                              _ => None,
                                          })
                                          .collect();
        let flow_fp = hash_value(&json!({
                                     "engine_version": ENGINE_VERSION,
                                     "definition_hash": definition.definition_hash,
                                     "step_fingerprints": step_fps
                                 }));
        info!("flow {flow_id} completed");
        self.event_store
            .append_kind(flow_id, FlowEventKind::FlowCompleted { flow_fingerprint: flow_fp });
    }

    /// Variante compacta de los eventos de un flow (útil en tests).
    pub fn event_variants(&self, flow_id: Uuid) -> Vec<&'static str> {
        self.event_store
            .list(flow_id)
            .iter()
            .map(|e| match e.kind {
                FlowEventKind::FlowInitialized { .. } => "I",
                FlowEventKind::StepStarted { .. } => "S",
                FlowEventKind::StepFinished { .. } => "F",
                FlowEventKind::StepFailed { .. } => "X",
                FlowEventKind::StepSignal { .. } => "G",
                FlowEventKind::FlowCompleted { .. } => "C",
            })
            .collect()
    }

    pub fn flow_fingerprint(&self, flow_id: Uuid) -> Option<String> {
        self.event_store.list(flow_id).iter().rev().find_map(|e| match &e.kind {
                                                              FlowEventKind::FlowCompleted { flow_fingerprint } => {
                                                                  Some(flow_fingerprint.clone())
                                                              }
                                                              _ => None,
                                                          })
    }
}

/// Valida los outputs devueltos por un step contra los declarados y los
/// congela en orden de declaración.
fn freeze_outputs(step_id: &str,
                  declared: &[PortSpec],
                  allocated: &BTreeMap<String, String>,
                  mut outputs: Vec<OutputArtifact>)
                  -> Result<Vec<Artifact>, CoreEngineError> {
    let mut frozen = Vec::with_capacity(declared.len());
    for port in declared {
        let matching: Vec<usize> = outputs.iter()
                                          .enumerate()
                                          .filter(|(_, o)| o.name() == port.name)
                                          .map(|(i, _)| i)
                                          .collect();
        if matching.len() != 1 {
            return Err(CoreEngineError::Internal(format!("step `{step_id}` must produce output `{}` exactly once (got {})",
                                                         port.name,
                                                         matching.len())));
        }
        let out = outputs.remove(matching[0]);
        if out.kind() != port.kind {
            return Err(CoreEngineError::Internal(format!("step `{step_id}` output `{}` has kind {} (declared {})",
                                                         port.name,
                                                         out.kind(),
                                                         port.kind)));
        }
        if allocated.get(&port.name).map(String::as_str) != Some(out.uri()) {
            return Err(CoreEngineError::Internal(format!("step `{step_id}` output `{}` not at its allocated location",
                                                         port.name)));
        }
        frozen.push(out.finalize());
    }
    if let Some(extra) = outputs.first() {
        return Err(CoreEngineError::Internal(format!("step `{step_id}` produced undeclared output `{}`",
                                                     extra.name())));
    }
    Ok(frozen)
}
