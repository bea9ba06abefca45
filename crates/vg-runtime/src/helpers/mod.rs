pub(crate) mod invocation_decode;
pub(crate) mod rhai_bridge;
