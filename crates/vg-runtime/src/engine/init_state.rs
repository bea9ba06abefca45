use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};
use std::time::Instant;

use vg_core::VizError;

pub(crate) type InitOutcome = Result<(), Arc<VizError>>;

/// Observable initialization state of a gate.
#[derive(Debug, Clone)]
pub enum InitState {
    Pending,
    Ready,
    Failed(Arc<VizError>),
}

impl InitState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Write-once outcome with a broadcast for waiters. Reads after settlement
/// never touch the lock.
pub(crate) struct InitCell {
    outcome: OnceLock<InitOutcome>,
    lock: Mutex<()>,
    settled: Condvar,
}

impl InitCell {
    pub(crate) fn new() -> Self {
        Self {
            outcome: OnceLock::new(),
            lock: Mutex::new(()),
            settled: Condvar::new(),
        }
    }

    /// Records `outcome` unless one is already recorded; `false` when it was.
    pub(crate) fn settle(&self, outcome: InitOutcome) -> bool {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let first = self.outcome.set(outcome).is_ok();
        self.settled.notify_all();
        first
    }

    pub(crate) fn outcome(&self) -> Option<&InitOutcome> {
        self.outcome.get()
    }

    pub(crate) fn state(&self) -> InitState {
        match self.outcome.get() {
            None => InitState::Pending,
            Some(Ok(())) => InitState::Ready,
            Some(Err(cause)) => InitState::Failed(Arc::clone(cause)),
        }
    }

    /// Blocks until settled or `deadline` passes; `None` waits without bound.
    /// Wakeups that leave the cell unsettled go back to waiting on the time
    /// that remains.
    pub(crate) fn wait_until(&self, deadline: Option<Instant>) -> Option<&InitOutcome> {
        if let Some(outcome) = self.outcome.get() {
            return Some(outcome);
        }

        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(outcome) = self.outcome.get() {
                return Some(outcome);
            }
            guard = match deadline {
                None => self
                    .settled
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    self.settled
                        .wait_timeout(guard, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }
}
