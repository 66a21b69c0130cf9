//! tab-adapters: componentes del pipeline y servicios externos que usan.
//!
//! Cada componente es un `TypedStep` con su struct de parámetros y recibe
//! en el constructor el `ObjectStore` y los servicios (`Arc<dyn ...>`) que
//! necesita. Los servicios son traits estrechos; las implementaciones reales
//! (warehouse, registry, batch, sink) viven fuera de este workspace.

pub mod artifacts;
pub mod polling;
pub mod services;
pub mod steps;

pub use polling::{wait_for_job, PollPolicy};
pub use services::{JobHandle, JobState, ServiceError};
