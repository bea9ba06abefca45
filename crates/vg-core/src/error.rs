use std::sync::Arc;

use thiserror::Error;

pub const ENGINE_INIT_FAILED: &str = "ENGINE_INIT_FAILED";
pub const ENGINE_INIT_SPAWN: &str = "ENGINE_INIT_SPAWN";
pub const ENGINE_STARTUP_FAILED: &str = "ENGINE_STARTUP_FAILED";
pub const ENGINE_STARTUP_TIMEOUT: &str = "ENGINE_STARTUP_TIMEOUT";

#[derive(Debug, Error, Clone)]
#[error("{code}: {message}")]
pub struct VizError {
    pub code: String,
    pub message: String,
    #[source]
    pub cause: Option<Arc<VizError>>,
}

impl VizError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(
        code: impl Into<String>,
        message: impl Into<String>,
        cause: impl Into<Arc<VizError>>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            cause: Some(cause.into()),
        }
    }

    /// Fatal error raised by the gate when the engine never became ready.
    pub fn startup_failed(cause: impl Into<Arc<VizError>>) -> Self {
        Self::with_cause(
            ENGINE_STARTUP_FAILED,
            "Could not start graphviz engine",
            cause,
        )
    }

    pub fn startup_timeout() -> Self {
        Self::new(
            ENGINE_STARTUP_TIMEOUT,
            "Initializing graphviz engine took too long",
        )
    }

    pub fn is_startup(&self) -> bool {
        self.code == ENGINE_STARTUP_FAILED || self.code == ENGINE_STARTUP_TIMEOUT
    }

    /// Innermost error of the cause chain, `self` when there is no cause.
    pub fn root_cause(&self) -> &VizError {
        let mut current = self;
        while let Some(cause) = current.cause.as_deref() {
            current = cause;
        }
        current
    }
}
