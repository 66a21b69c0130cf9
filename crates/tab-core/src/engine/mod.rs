//! Engine: `FlowEngine`, su builder y `FlowCtx`.

pub mod builder;
pub mod core;
pub mod flow_ctx;

pub use builder::EngineBuilderInit;
pub use core::FlowEngine;
pub use flow_ctx::FlowCtx;
