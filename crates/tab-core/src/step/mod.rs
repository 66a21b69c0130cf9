//! Definiciones relacionadas a Steps (componentes).
//!
//! Un Step es una unidad ejecutable que transforma sus inputs declarados en
//! 0..n outputs declarados. Este módulo define:
//! - `StepDefinition`: interfaz neutral usada por el engine.
//! - `TypedStep`: interfaz de alto nivel con parámetros tipados.
//! - `StepRunResult`, `StepOutcome` y señales (`StepSignal`).

pub mod definition;
mod run_result;
mod status;
pub mod typed;

pub use definition::{PortSpec, StepDefinition, StepKind};
pub use run_result::{StepOutcome, StepRunResult, StepSignal};
pub use status::StepStatus;
pub use typed::TypedStep;
