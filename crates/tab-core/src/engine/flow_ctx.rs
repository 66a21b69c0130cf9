//! Avance manual de un flow concreto, un step cada vez.
//!
//! Útil para inspeccionar artifacts intermedios (p. ej. revisar el blessing
//! antes de dejar correr el publisher) sin reimplementar el bucle de
//! `run_flow`.

use uuid::Uuid;

use crate::engine::FlowEngine;
use crate::errors::CoreEngineError;
use crate::event::EventStore;
use crate::repo::{FlowDefinition, FlowRepository};
use crate::step::StepDefinition;

pub struct FlowCtx<'a, E: EventStore, R: FlowRepository> {
    pub engine: &'a mut FlowEngine<E, R>,
    pub flow_id: Uuid,
    pub definition: &'a FlowDefinition,
}

impl<'a, E: EventStore, R: FlowRepository> FlowCtx<'a, E, R> {
    pub fn new(engine: &'a mut FlowEngine<E, R>, flow_id: Uuid, definition: &'a FlowDefinition) -> Self {
        Self { engine,
               flow_id,
               definition }
    }

    /// Ejecuta el step del cursor y devuelve su id, o `None` si el flow ya
    /// estaba completo.
    pub fn step(&mut self) -> Result<Option<String>, CoreEngineError> {
        let cursor = self.engine.instance(self.flow_id, self.definition).cursor;
        match self.engine.next_with(self.flow_id, self.definition) {
            Ok(()) => Ok(self.definition.steps.get(cursor).map(|s| s.id().to_string())),
            Err(CoreEngineError::FlowCompleted) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Ejecuta hasta `n` steps; devuelve los ids en orden.
    pub fn run_n(&mut self, n: usize) -> Result<Vec<String>, CoreEngineError> {
        let mut ran = Vec::with_capacity(n);
        while ran.len() < n {
            match self.step()? {
                Some(step_id) => ran.push(step_id),
                None => break,
            }
        }
        Ok(ran)
    }

    /// Avanza hasta terminar `step_id` (incluido).
    pub fn run_until(&mut self, step_id: &str) -> Result<(), CoreEngineError> {
        let target = self.definition
                         .index_of(step_id)
                         .ok_or_else(|| CoreEngineError::InvalidDefinition(format!("unknown step `{step_id}`")))?;
        while self.engine.instance(self.flow_id, self.definition).cursor <= target {
            if self.step()?.is_none() {
                break;
            }
        }
        Ok(())
    }

    pub fn run_to_completion(&mut self) -> Result<(), CoreEngineError> {
        self.engine.run_flow(self.flow_id, self.definition).map(|_| ())
    }
}
