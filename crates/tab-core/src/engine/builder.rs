//! Builder para `FlowEngine`.
//!
//! El engine no conoce los steps: la definición (`FlowDefinition`) se pasa
//! en cada ejecución. El builder sólo fija las stores, la raíz donde se
//! reservan las ubicaciones de artifacts, los inyectores y la cache.
//!
//! ```ignore
//! let mut engine = FlowEngine::new()
//!     .pipeline_root("/tmp/pipeline-root")
//!     .enable_cache(true)
//!     .injector(Box::new(runtime_params))
//!     .build();
//! engine.run_flow(Uuid::new_v4(), &definition)?;
//! ```

use crate::engine::FlowEngine;
use crate::event::EventStore;
use crate::injection::ParamInjector;
use crate::repo::FlowRepository;

#[derive(Debug)]
pub struct EngineBuilderInit<E: EventStore, R: FlowRepository> {
    pub event_store: E,
    pub repository: R,
    pipeline_root: String,
    enable_cache: bool,
    injectors: Vec<Box<dyn ParamInjector>>,
}

impl<E: EventStore, R: FlowRepository> EngineBuilderInit<E, R> {
    pub fn new(event_store: E, repository: R) -> Self {
        Self { event_store,
               repository,
               pipeline_root: String::new(),
               enable_cache: false,
               injectors: Vec::new() }
    }

    /// Prefijo bajo el que se reservan las ubicaciones de outputs
    /// (`<root>/<step_id>/<output>/<flow_id>-<seq>`).
    pub fn pipeline_root(mut self, root: impl Into<String>) -> Self {
        self.pipeline_root = root.into();
        self
    }

    pub fn enable_cache(mut self, enabled: bool) -> Self {
        self.enable_cache = enabled;
        self
    }

    /// Añade un inyector; se aplican en orden de registro.
    pub fn injector(mut self, injector: Box<dyn ParamInjector>) -> Self {
        self.injectors.push(injector);
        self
    }

    #[inline]
    pub fn build(self) -> FlowEngine<E, R> {
        FlowEngine::from_parts(self.event_store,
                               self.repository,
                               self.pipeline_root,
                               self.injectors,
                               self.enable_cache)
    }
}
