pub mod types;

pub use types::{FlowDefinition, FlowDefinitionBuilder, FlowInstance, FlowRepository, InMemoryFlowRepository, StepSlot, Wire};
