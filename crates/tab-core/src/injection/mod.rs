//! Inyección de parámetros determinista.
//!
//! Orden de merge fijo: `base_params` del step -> inyectores del engine (en
//! orden de registro). `RuntimeParameters` es el inyector de overrides por
//! step que usa el CLI (`--param step.key=value`).

pub mod composite;
pub mod merge;
pub mod param_injector;
pub mod runtime;

pub use composite::CompositeInjector;
pub use merge::merge_json;
pub use param_injector::ParamInjector;
pub use runtime::RuntimeParameters;
