//! tab-core: motor determinista de pipelines y contratos de artifacts.
//!
//! Neutral respecto al dominio: sabe de steps con inputs/outputs declarados,
//! artifacts tipados congelados y eventos, no de modelos ni de queries.
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod injection;
pub mod model;
pub mod repo;
pub mod step;
pub mod storage;

pub use engine::{EngineBuilderInit, FlowCtx, FlowEngine};
pub use errors::CoreEngineError;
pub use event::{EventStore, FlowEvent, FlowEventKind, InMemoryEventStore};
pub use injection::{CompositeInjector, ParamInjector, RuntimeParameters};
pub use model::{Artifact, ArtifactKind, ArtifactPayload, ExecutionContext, OutputArtifact, PropertyValue};
pub use repo::{FlowDefinition, FlowDefinitionBuilder, FlowInstance, FlowRepository, InMemoryFlowRepository};
pub use step::{PortSpec, StepDefinition, StepKind, StepOutcome, StepRunResult, StepSignal, StepStatus, TypedStep};
pub use storage::{join_uri, LocalObjectStore, ObjectStore};
