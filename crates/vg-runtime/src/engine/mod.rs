mod gate;
mod init_state;
mod listener;

pub use gate::{EngineGate, GateOptions, InitMode, DEFAULT_STARTUP_TIMEOUT};
pub use init_state::InitState;
pub use listener::EngineInitListener;

#[cfg(test)]
mod gate_tests;
