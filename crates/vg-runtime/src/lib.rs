mod backend;
mod engine;
mod helpers;
mod resources;
mod rhai_backend;

pub use backend::{EngineBackend, RenderEngine};
pub use engine::{
    EngineGate, EngineInitListener, GateOptions, InitMode, InitState, DEFAULT_STARTUP_TIMEOUT,
};
pub use resources::{
    runtime_bundle_name, DirResources, EmbeddedResources, MapResources, ResourceLoader,
    DEFAULT_RUNTIME_VERSION,
};
pub use rhai_backend::RhaiVizBackend;

/// Gate over the rhai runtime backend.
pub type VizEngine = EngineGate<RhaiVizBackend>;
