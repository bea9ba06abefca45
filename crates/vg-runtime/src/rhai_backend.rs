use std::sync::{Arc, Mutex, PoisonError, RwLock};

use rhai::{Dynamic, Engine, Scope, AST};
use tracing::debug;
use vg_core::error::ENGINE_INIT_FAILED;
use vg_core::VizError;

use crate::backend::EngineBackend;
use crate::helpers::invocation_decode::decode_invocation;
use crate::helpers::rhai_bridge::{dynamic_to_text, eval_error_message, fields_to_map};
use crate::resources::{
    runtime_bundle_name, EmbeddedResources, ResourceLoader, DEFAULT_RUNTIME_VERSION,
};

const VIZ_ENTRY: &str = "Viz";

type PrintBuffer = Arc<Mutex<Vec<String>>>;

/// Backend that runs invocations through a rhai runtime bundle.
pub struct RhaiVizBackend {
    resources: Arc<dyn ResourceLoader>,
    version: String,
    runtime: RwLock<Option<Arc<AST>>>,
}

impl RhaiVizBackend {
    pub fn new(resources: Arc<dyn ResourceLoader>, version: impl Into<String>) -> Self {
        Self {
            resources,
            version: version.into(),
            runtime: RwLock::new(None),
        }
    }

    pub fn embedded() -> Self {
        Self::new(Arc::new(EmbeddedResources), DEFAULT_RUNTIME_VERSION)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is_loaded(&self) -> bool {
        self.runtime
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn load_runtime(&self) -> Result<AST, VizError> {
        let name = runtime_bundle_name(&self.version);
        let code = self.resources.read_text(&name)?;
        let ast = runtime_engine(None, PrintBuffer::default())
            .compile(&code)
            .map_err(|error| {
                VizError::new(
                    "RUNTIME_COMPILE",
                    format!("Runtime bundle \"{}\" failed to compile: {}", name, error),
                )
            })?;

        let has_entry = ast
            .iter_functions()
            .any(|function| function.name == VIZ_ENTRY && function.params.len() == 2);
        if !has_entry {
            return Err(VizError::new(
                "RUNTIME_ENTRY_MISSING",
                format!(
                    "Runtime bundle \"{}\" does not define {}(src, options).",
                    name, VIZ_ENTRY
                ),
            ));
        }
        Ok(ast)
    }
}

impl Default for RhaiVizBackend {
    fn default() -> Self {
        Self::embedded()
    }
}

impl EngineBackend for RhaiVizBackend {
    fn do_init(&self) -> Result<(), VizError> {
        let ast = self.load_runtime().map_err(|cause| {
            VizError::with_cause(
                ENGINE_INIT_FAILED,
                format!("Could not load viz runtime {}", self.version),
                cause,
            )
        })?;
        *self.runtime.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(ast));
        debug!(version = %self.version, "viz runtime compiled");
        Ok(())
    }

    fn do_execute(&self, call: &str) -> Result<String, VizError> {
        let ast = self
            .runtime
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| {
                VizError::new("BACKEND_NOT_INITIALIZED", "Viz runtime is not loaded.")
            })?;

        let invocation = decode_invocation(call)?;
        let prints = PrintBuffer::default();
        let engine = runtime_engine(invocation.total_memory()?, Arc::clone(&prints));
        let options = fields_to_map(&invocation.fields);

        let mut scope = Scope::new();
        match engine.call_fn::<Dynamic>(&mut scope, &ast, VIZ_ENTRY, (invocation.src, options)) {
            Ok(output) => dynamic_to_text(output),
            Err(error) => Err(execution_error(&eval_error_message(&error), &prints)),
        }
    }

    fn release(&self) {
        *self.runtime.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

fn runtime_engine(max_string_size: Option<usize>, prints: PrintBuffer) -> Engine {
    let mut engine = Engine::new();
    engine.set_strict_variables(true);
    if let Some(limit) = max_string_size {
        engine.set_max_string_size(limit);
    }
    engine.on_print(move |text| {
        prints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
    });
    engine
}

fn execution_error(message: &str, prints: &PrintBuffer) -> VizError {
    let printed = prints.lock().unwrap_or_else(PoisonError::into_inner);
    if printed.is_empty() {
        return VizError::new("BACKEND_EXECUTION", message);
    }
    VizError::new(
        "BACKEND_EXECUTION",
        format!("{}\n{}", message, printed.join("\n")),
    )
}
