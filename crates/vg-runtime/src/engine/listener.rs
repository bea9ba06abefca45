use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::warn;
use vg_core::VizError;

/// Observer told about a failed engine initialization. Called at most once per
/// gate, from the initializing thread.
pub trait EngineInitListener: Send + Sync {
    fn engine_init_failed(&self, cause: &VizError);
}

impl<F> EngineInitListener for F
where
    F: Fn(&VizError) + Send + Sync,
{
    fn engine_init_failed(&self, cause: &VizError) {
        self(cause)
    }
}

pub(crate) fn notify_init_failed(listener: &dyn EngineInitListener, cause: &VizError) {
    let notified = panic::catch_unwind(AssertUnwindSafe(|| listener.engine_init_failed(cause)));
    if let Err(payload) = notified {
        warn!(
            code = %cause.code,
            panic = %panic_message(payload.as_ref()),
            "engine init listener panicked"
        );
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "non-string panic payload".to_string()
}
