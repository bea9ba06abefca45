use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use vg_core::error::{ENGINE_INIT_FAILED, ENGINE_STARTUP_FAILED, ENGINE_STARTUP_TIMEOUT};
use vg_core::{Engine, EngineRequest, Format, VizError, VizjsOptions};

use super::gate::timeout_millis;
use super::*;
use crate::backend::{EngineBackend, RenderEngine};

type InitSender = Sender<Result<(), VizError>>;

struct ScriptedBackend {
    init_outcome: Mutex<mpsc::Receiver<Result<(), VizError>>>,
    init_calls: AtomicUsize,
    calls: Mutex<Vec<String>>,
    execute_error: Option<VizError>,
    released: AtomicBool,
}

impl ScriptedBackend {
    fn new() -> (Self, InitSender) {
        let (sender, receiver) = mpsc::channel();
        let backend = Self {
            init_outcome: Mutex::new(receiver),
            init_calls: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            execute_error: None,
            released: AtomicBool::new(false),
        };
        (backend, sender)
    }

    fn settled_with(outcome: Result<(), VizError>) -> Self {
        let (backend, sender) = Self::new();
        sender.send(outcome).expect("init outcome should queue");
        backend
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl EngineBackend for ScriptedBackend {
    fn do_init(&self) -> Result<(), VizError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        self.init_outcome
            .lock()
            .expect("init receiver lock")
            .recv()
            .unwrap_or_else(|_| Err(VizError::new("TEST_INIT_ABANDONED", "sender dropped")))
    }

    fn do_execute(&self, call: &str) -> Result<String, VizError> {
        self.calls.lock().expect("calls lock").push(call.to_string());
        match &self.execute_error {
            Some(error) => Err(error.clone()),
            None => Ok(format!("rendered:{}", call)),
        }
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

struct PanickingBackend;

impl EngineBackend for PanickingBackend {
    fn do_init(&self) -> Result<(), VizError> {
        panic!("runtime bundle corrupted")
    }

    fn do_execute(&self, _call: &str) -> Result<String, VizError> {
        Ok(String::new())
    }
}

#[derive(Default)]
struct RecordingListener {
    failures: Mutex<Vec<String>>,
}

impl RecordingListener {
    fn failures(&self) -> Vec<String> {
        self.failures.lock().expect("failures lock").clone()
    }

    /// The listener runs after waiters are released, so callers may get here first.
    fn wait_for_failures(&self, count: usize) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let failures = self.failures();
            if failures.len() >= count || Instant::now() >= deadline {
                return failures;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl EngineInitListener for RecordingListener {
    fn engine_init_failed(&self, cause: &VizError) {
        self.failures
            .lock()
            .expect("failures lock")
            .push(cause.code.clone());
    }
}

fn request(src: &str) -> EngineRequest {
    EngineRequest::new(src, Engine::Dot, Format::Svg)
}

fn init_error() -> VizError {
    VizError::new(ENGINE_INIT_FAILED, "runtime bundle missing")
}

fn wait_for_settled<B: EngineBackend>(gate: &EngineGate<B>) -> InitState {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let state = gate.state();
        if state.is_settled() || Instant::now() >= deadline {
            return state;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn synchronous_success_delegates_escaped_invocation() {
    let gate = EngineGate::new(ScriptedBackend::settled_with(Ok(())), true, None);
    assert!(gate.state().is_ready());

    let output = gate.execute(&request("a'b\\c")).expect("execute should pass");
    assert_eq!(output, r"rendered:Viz('a\'b\\c',{format:'svg',engine:'dot'});");
    assert_eq!(
        gate.backend().calls(),
        vec![r"Viz('a\'b\\c',{format:'svg',engine:'dot'});".to_string()]
    );
}

#[test]
fn memory_limit_is_forwarded_in_the_invocation() {
    let gate = EngineGate::new(ScriptedBackend::settled_with(Ok(())), true, None);
    let limited = EngineRequest::new("graph {}", Engine::Osage, Format::Png)
        .with_options(VizjsOptions::with_total_memory(1 << 20));
    gate.execute(&limited).expect("execute should pass");
    assert_eq!(
        gate.backend().calls(),
        vec!["Viz('graph {}',{format:'png',engine:'osage',totalMemory:'1048576'});".to_string()]
    );
}

#[test]
fn synchronous_failure_is_stored_and_never_reaches_do_execute() {
    let gate = EngineGate::new(ScriptedBackend::settled_with(Err(init_error())), true, None);
    let InitState::Failed(cause) = gate.state() else {
        panic!("gate should be failed after synchronous init error");
    };
    assert_eq!(cause.code, ENGINE_INIT_FAILED);

    for _ in 0..3 {
        let error = gate.execute(&request("graph {}")).expect_err("startup failed");
        assert_eq!(error.code, ENGINE_STARTUP_FAILED);
        assert!(error.is_startup());
        assert!(Arc::ptr_eq(error.cause.as_ref().expect("cause"), &cause));
    }
    assert!(gate.backend().calls().is_empty());
}

#[test]
fn listener_hears_about_failure_exactly_once() {
    let listener = Arc::new(RecordingListener::default());
    let gate = EngineGate::new(
        ScriptedBackend::settled_with(Err(init_error())),
        true,
        Some(listener.clone() as Arc<dyn EngineInitListener>),
    );
    gate.execute(&request("graph {}")).expect_err("startup failed");
    gate.execute(&request("graph {}")).expect_err("startup failed");
    assert_eq!(listener.failures(), vec![ENGINE_INIT_FAILED.to_string()]);
}

#[test]
fn listener_is_silent_on_success() {
    let listener = Arc::new(RecordingListener::default());
    let gate = EngineGate::with_options(
        ScriptedBackend::settled_with(Ok(())),
        GateOptions::synchronous().with_listener(listener.clone()),
    );
    gate.execute(&request("graph {}")).expect("execute should pass");
    assert!(listener.failures().is_empty());
}

#[test]
fn background_construction_does_not_wait_for_init() {
    let (backend, init) = ScriptedBackend::new();
    let gate = EngineGate::new(backend, false, None);
    assert!(!gate.state().is_settled());

    init.send(Ok(())).expect("init outcome should send");
    let output = gate.execute(&request("graph {}")).expect("execute should pass");
    assert!(output.starts_with("rendered:Viz("));
    assert!(gate.state().is_ready());
}

#[test]
fn concurrent_callers_all_proceed_once_ready() {
    const CALLERS: usize = 8;
    let (backend, init) = ScriptedBackend::new();
    let gate = Arc::new(EngineGate::with_options(backend, GateOptions::background()));
    let barrier = Arc::new(Barrier::new(CALLERS + 1));

    let handles = (0..CALLERS)
        .map(|index| {
            let gate = Arc::clone(&gate);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                gate.execute(&request(&format!("graph g{} {{}}", index)))
            })
        })
        .collect::<Vec<_>>();

    barrier.wait();
    init.send(Ok(())).expect("init outcome should send");

    for handle in handles {
        let output = handle.join().expect("caller thread").expect("execute should pass");
        assert!(output.starts_with("rendered:"));
    }
    assert_eq!(gate.backend().calls().len(), CALLERS);
    assert_eq!(gate.backend().init_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn concurrent_callers_all_see_the_same_failure() {
    const CALLERS: usize = 6;
    let listener = Arc::new(RecordingListener::default());
    let (backend, init) = ScriptedBackend::new();
    let gate = Arc::new(EngineGate::with_options(
        backend,
        GateOptions::background().with_listener(listener.clone()),
    ));
    let barrier = Arc::new(Barrier::new(CALLERS + 1));

    let handles = (0..CALLERS)
        .map(|_| {
            let gate = Arc::clone(&gate);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                gate.execute(&request("graph {}"))
            })
        })
        .collect::<Vec<_>>();

    barrier.wait();
    init.send(Err(init_error())).expect("init outcome should send");

    let causes = handles
        .into_iter()
        .map(|handle| {
            let error = handle.join().expect("caller thread").expect_err("startup failed");
            assert_eq!(error.code, ENGINE_STARTUP_FAILED);
            error.cause.expect("startup error should carry the init cause")
        })
        .collect::<Vec<_>>();
    let late = gate.execute(&request("graph {}")).expect_err("still failed");

    let first = &causes[0];
    assert!(causes.iter().all(|cause| Arc::ptr_eq(cause, first)));
    assert!(Arc::ptr_eq(late.cause.as_ref().expect("cause"), first));
    assert!(gate.backend().calls().is_empty());
    assert_eq!(listener.wait_for_failures(1).len(), 1);
}

#[test]
fn timeout_fails_the_caller_but_not_the_initializer() {
    let (backend, init) = ScriptedBackend::new();
    let gate = EngineGate::with_options(
        backend,
        GateOptions::background().with_startup_timeout(Duration::from_millis(50)),
    );
    assert_eq!(gate.startup_timeout(), Duration::from_millis(50));

    let started = Instant::now();
    let error = gate.execute(&request("graph {}")).expect_err("init still pending");
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert_eq!(error.code, ENGINE_STARTUP_TIMEOUT);
    assert!(error.is_startup());
    assert!(!gate.state().is_settled());

    init.send(Ok(())).expect("init outcome should send");
    assert!(wait_for_settled(&gate).is_ready());
    gate.execute(&request("graph {}")).expect("execute should pass after late init");
}

#[test]
fn prebuilt_invocations_bypass_the_builder() {
    let gate = EngineGate::new(ScriptedBackend::settled_with(Ok(())), true, None);
    let prebuilt = "Viz('digraph { x }',{format:'json',engine:'twopi'});";
    gate.execute(&EngineRequest::new(prebuilt, Engine::Dot, Format::Svg))
        .expect("execute should pass");
    assert_eq!(gate.backend().calls(), vec![prebuilt.to_string()]);
}

#[test]
fn backend_errors_propagate_unwrapped() {
    let (mut backend, init) = ScriptedBackend::new();
    backend.execute_error = Some(VizError::new("BACKEND_EXECUTION", "syntax error in line 1"));
    init.send(Ok(())).expect("init outcome should send");
    let gate = EngineGate::new(backend, true, None);

    let error = gate.execute(&request("graph {")).expect_err("backend error");
    assert_eq!(error.code, "BACKEND_EXECUTION");
    assert!(!error.is_startup());
    assert!(error.cause.is_none());
}

#[test]
fn panicking_init_is_recorded_as_failure() {
    let listener = Arc::new(RecordingListener::default());
    let gate = EngineGate::with_options(
        PanickingBackend,
        GateOptions::synchronous().with_listener(listener.clone()),
    );
    let error = gate.execute(&request("graph {}")).expect_err("startup failed");
    assert_eq!(error.code, ENGINE_STARTUP_FAILED);
    let cause = error.root_cause();
    assert_eq!(cause.code, ENGINE_INIT_FAILED);
    assert!(cause.message.contains("runtime bundle corrupted"));
    assert_eq!(listener.failures().len(), 1);
}

#[test]
fn panicking_listener_leaves_state_intact() {
    let gate = EngineGate::with_options(
        ScriptedBackend::settled_with(Err(init_error())),
        GateOptions::background()
            .with_listener(Arc::new(|_: &VizError| panic!("listener exploded"))),
    );
    let InitState::Failed(cause) = wait_for_settled(&gate) else {
        panic!("gate should settle as failed");
    };
    assert_eq!(cause.code, ENGINE_INIT_FAILED);
    let error = gate.execute(&request("graph {}")).expect_err("startup failed");
    assert_eq!(error.code, ENGINE_STARTUP_FAILED);
}

#[test]
fn init_runs_once_for_many_executions() {
    let gate = EngineGate::new(ScriptedBackend::settled_with(Ok(())), false, None);
    for _ in 0..5 {
        gate.execute(&request("graph {}")).expect("execute should pass");
    }
    assert_eq!(gate.backend().init_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn release_forwards_through_the_render_engine_trait() {
    let gate: Box<dyn RenderEngine> = Box::new(EngineGate::new(
        ScriptedBackend::settled_with(Ok(())),
        true,
        None,
    ));
    gate.execute(&request("graph {}")).expect("execute should pass");
    gate.release();

    let gate = EngineGate::new(ScriptedBackend::settled_with(Ok(())), true, None);
    RenderEngine::release(&gate);
    assert!(gate.backend().released.load(Ordering::SeqCst));
}

#[test]
fn init_mode_follows_the_synchronous_flag() {
    assert_eq!(InitMode::from_synchronous(true), InitMode::Synchronous);
    assert_eq!(InitMode::from_synchronous(false), InitMode::Background);
    assert_eq!(GateOptions::default().mode, InitMode::Background);
    assert_eq!(GateOptions::default().startup_timeout, DEFAULT_STARTUP_TIMEOUT);
    assert_eq!(DEFAULT_STARTUP_TIMEOUT, Duration::from_secs(60));
}

#[test]
fn timeout_millis_saturates_instead_of_truncating() {
    assert_eq!(timeout_millis(Duration::from_millis(1500)), 1500);
    assert_eq!(timeout_millis(Duration::ZERO), 0);
    assert_eq!(timeout_millis(Duration::MAX), u64::MAX);
    assert_eq!(
        timeout_millis(Duration::from_secs(u64::MAX / 1000 + 1)),
        u64::MAX
    );
}
