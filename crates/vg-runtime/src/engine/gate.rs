use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};
use vg_core::error::{ENGINE_INIT_FAILED, ENGINE_INIT_SPAWN};
use vg_core::{invocation_for, is_prebuilt_invocation, EngineRequest, VizError};

use super::init_state::{InitCell, InitState};
use super::listener::{notify_init_failed, panic_message, EngineInitListener};
use crate::backend::{EngineBackend, RenderEngine};

pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(60);

const INIT_THREAD_NAME: &str = "viz-engine-init";

/// Millisecond count for log fields, saturating at `u64::MAX`.
pub(super) fn timeout_millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

/// Where the one-time initialization runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InitMode {
    /// On the constructing thread, before the constructor returns.
    Synchronous,
    /// On a detached thread; construction returns immediately.
    #[default]
    Background,
}

impl InitMode {
    pub fn from_synchronous(synchronous: bool) -> Self {
        if synchronous {
            Self::Synchronous
        } else {
            Self::Background
        }
    }

    fn launch<B: EngineBackend>(self, job: InitJob<B>) {
        match self {
            Self::Synchronous => job.run(),
            Self::Background => {
                let fallback = job.clone();
                let spawned = thread::Builder::new()
                    .name(INIT_THREAD_NAME.to_string())
                    .spawn(move || job.run());
                if let Err(error) = spawned {
                    fallback.complete(Err(VizError::new(
                        ENGINE_INIT_SPAWN,
                        format!("Could not spawn engine init thread: {}", error),
                    )));
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct GateOptions {
    pub mode: InitMode,
    pub listener: Option<Arc<dyn EngineInitListener>>,
    pub startup_timeout: Duration,
}

impl Default for GateOptions {
    fn default() -> Self {
        Self {
            mode: InitMode::default(),
            listener: None,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }
}

impl GateOptions {
    pub fn synchronous() -> Self {
        Self {
            mode: InitMode::Synchronous,
            ..Self::default()
        }
    }

    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_listener(mut self, listener: Arc<dyn EngineInitListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_startup_timeout(mut self, startup_timeout: Duration) -> Self {
        self.startup_timeout = startup_timeout;
        self
    }
}

impl fmt::Debug for GateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateOptions")
            .field("mode", &self.mode)
            .field("listener", &self.listener.is_some())
            .field("startup_timeout", &self.startup_timeout)
            .finish()
    }
}

struct InitJob<B> {
    backend: Arc<B>,
    cell: Arc<InitCell>,
    listener: Option<Arc<dyn EngineInitListener>>,
    mode: InitMode,
}

impl<B> Clone for InitJob<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            cell: Arc::clone(&self.cell),
            listener: self.listener.clone(),
            mode: self.mode,
        }
    }
}

impl<B: EngineBackend> InitJob<B> {
    fn run(self) {
        debug!(mode = ?self.mode, "engine initialization started");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.backend.do_init()))
            .unwrap_or_else(|payload| {
                Err(VizError::new(
                    ENGINE_INIT_FAILED,
                    format!(
                        "Engine initialization panicked: {}",
                        panic_message(payload.as_ref())
                    ),
                ))
            });
        self.complete(outcome);
    }

    fn complete(self, outcome: Result<(), VizError>) {
        match outcome {
            Ok(()) => {
                self.cell.settle(Ok(()));
                debug!(mode = ?self.mode, "engine initialization finished");
            }
            Err(error) => {
                let cause = Arc::new(error);
                self.cell.settle(Err(Arc::clone(&cause)));
                warn!(
                    mode = ?self.mode,
                    code = %cause.code,
                    "engine initialization failed: {}",
                    cause.message
                );
                if let Some(listener) = &self.listener {
                    notify_init_failed(listener.as_ref(), &cause);
                }
            }
        }
    }
}

/// Runs a backend's one-time initialization and holds every execution until it
/// has settled.
pub struct EngineGate<B: EngineBackend> {
    backend: Arc<B>,
    cell: Arc<InitCell>,
    startup_timeout: Duration,
}

impl<B: EngineBackend> EngineGate<B> {
    pub fn new(
        backend: B,
        synchronous: bool,
        listener: Option<Arc<dyn EngineInitListener>>,
    ) -> Self {
        Self::with_options(
            backend,
            GateOptions {
                mode: InitMode::from_synchronous(synchronous),
                listener,
                startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            },
        )
    }

    pub fn with_options(backend: B, options: GateOptions) -> Self {
        let backend = Arc::new(backend);
        let cell = Arc::new(InitCell::new());
        let startup_timeout = options.startup_timeout;

        options.mode.launch(InitJob {
            backend: Arc::clone(&backend),
            cell: Arc::clone(&cell),
            listener: options.listener,
            mode: options.mode,
        });

        Self {
            backend,
            cell,
            startup_timeout,
        }
    }

    pub fn state(&self) -> InitState {
        self.cell.state()
    }

    pub fn startup_timeout(&self) -> Duration {
        self.startup_timeout
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn execute(&self, request: &EngineRequest) -> Result<String, VizError> {
        self.await_ready()?;

        let call = invocation_for(request);
        trace!(
            prebuilt = is_prebuilt_invocation(&request.src),
            len = call.len(),
            "delegating invocation to backend"
        );
        self.backend.do_execute(&call)
    }

    pub fn release(&self) {
        self.backend.release();
    }

    fn await_ready(&self) -> Result<(), VizError> {
        if let Some(Err(cause)) = self.cell.outcome() {
            return Err(VizError::startup_failed(Arc::clone(cause)));
        }

        let deadline = Instant::now().checked_add(self.startup_timeout);
        match self.cell.wait_until(deadline) {
            Some(Ok(())) => Ok(()),
            Some(Err(cause)) => Err(VizError::startup_failed(Arc::clone(cause))),
            None => {
                warn!(
                    timeout_ms = timeout_millis(self.startup_timeout),
                    "engine still initializing after startup timeout"
                );
                Err(VizError::startup_timeout())
            }
        }
    }
}

impl<B: EngineBackend> RenderEngine for EngineGate<B> {
    fn execute(&self, request: &EngineRequest) -> Result<String, VizError> {
        EngineGate::execute(self, request)
    }

    fn release(&self) {
        EngineGate::release(self)
    }
}

impl<B: EngineBackend> fmt::Debug for EngineGate<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineGate")
            .field("state", &self.cell.state())
            .field("startup_timeout", &self.startup_timeout)
            .finish_non_exhaustive()
    }
}
