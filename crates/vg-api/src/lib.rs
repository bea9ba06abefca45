use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use vg_core::{Engine, EngineRequest, Format, VizError, VizjsOptions};
use vg_runtime::{
    EmbeddedResources, EngineInitListener, GateOptions, InitMode, ResourceLoader,
    RhaiVizBackend, VizEngine, DEFAULT_RUNTIME_VERSION,
};

pub use vg_core;
pub use vg_runtime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct EngineConfig {
    pub synchronous: bool,
    pub startup_timeout_secs: u64,
    pub runtime_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_memory: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            synchronous: false,
            startup_timeout_secs: 60,
            runtime_version: DEFAULT_RUNTIME_VERSION.to_string(),
            total_memory: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json(raw: &str) -> Result<Self, VizError> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|error| VizError::new("CONFIG_INVALID", error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), VizError> {
        if self.runtime_version.trim().is_empty() {
            return Err(VizError::new(
                "CONFIG_INVALID",
                "runtimeVersion must not be empty.",
            ));
        }
        if self.runtime_version.contains(['/', '\\']) {
            return Err(VizError::new(
                "CONFIG_INVALID",
                format!(
                    "runtimeVersion \"{}\" must not contain path separators.",
                    self.runtime_version
                ),
            ));
        }
        Ok(())
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn gate_options(&self) -> GateOptions {
        GateOptions {
            mode: InitMode::from_synchronous(self.synchronous),
            listener: None,
            startup_timeout: self.startup_timeout(),
        }
    }

    /// Builds a request, filling in the configured memory limit.
    pub fn request(&self, src: impl Into<String>, engine: Engine, format: Format) -> EngineRequest {
        self.apply_defaults(EngineRequest::new(src, engine, format))
    }

    pub fn apply_defaults(&self, mut request: EngineRequest) -> EngineRequest {
        if let Some(total_memory) = self.total_memory {
            let options = request.options.get_or_insert_with(VizjsOptions::default);
            if options.total_memory.is_none() {
                options.total_memory = Some(total_memory);
            }
        }
        request
    }
}

#[derive(Clone, Default)]
pub struct CreateEngineOptions {
    pub config: EngineConfig,
    pub resources: Option<Arc<dyn ResourceLoader>>,
    pub listener: Option<Arc<dyn EngineInitListener>>,
}

pub fn create_engine(options: CreateEngineOptions) -> Result<VizEngine, VizError> {
    options.config.validate()?;

    let resources = options
        .resources
        .unwrap_or_else(|| Arc::new(EmbeddedResources) as Arc<dyn ResourceLoader>);
    let backend = RhaiVizBackend::new(resources, options.config.runtime_version.clone());
    let mut gate_options = options.config.gate_options();
    gate_options.listener = options.listener;

    debug!(
        synchronous = options.config.synchronous,
        version = %options.config.runtime_version,
        "creating viz engine"
    );
    Ok(VizEngine::with_options(backend, gate_options))
}

pub fn create_engine_from_json(raw: &str) -> Result<VizEngine, VizError> {
    create_engine(CreateEngineOptions {
        config: EngineConfig::from_json(raw)?,
        ..CreateEngineOptions::default()
    })
}

/// Renders one request on a throwaway engine initialized on this thread.
pub fn render(config: &EngineConfig, request: &EngineRequest) -> Result<String, VizError> {
    let engine = create_engine(CreateEngineOptions {
        config: EngineConfig {
            synchronous: true,
            ..config.clone()
        },
        ..CreateEngineOptions::default()
    })?;
    let output = engine.execute(&config.apply_defaults(request.clone()));
    engine.release();
    output
}
