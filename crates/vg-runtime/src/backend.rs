use vg_core::{EngineRequest, VizError};

/// Hooks a concrete rendering backend plugs into [`crate::EngineGate`].
pub trait EngineBackend: Send + Sync + 'static {
    /// One-time setup. May be slow; the gate calls it exactly once.
    fn do_init(&self) -> Result<(), VizError>;

    /// Runs a built invocation against the initialized runtime.
    fn do_execute(&self, call: &str) -> Result<String, VizError>;

    fn release(&self) {}
}

pub trait RenderEngine: Send + Sync {
    fn execute(&self, request: &EngineRequest) -> Result<String, VizError>;

    fn release(&self);
}
