use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use vg_core::VizError;

pub const DEFAULT_RUNTIME_VERSION: &str = "1.0";

const EMBEDDED_BUNDLES: &[(&str, &str)] =
    &[("viz-1.0.rhai", include_str!("../bundles/viz-1.0.rhai"))];

pub fn runtime_bundle_name(version: &str) -> String {
    format!("viz-{}.rhai", version)
}

pub trait ResourceLoader: Send + Sync {
    fn read_resource(&self, name: &str) -> Result<Vec<u8>, VizError>;

    fn read_text(&self, name: &str) -> Result<String, VizError> {
        let bytes = self.read_resource(name)?;
        String::from_utf8(bytes).map_err(|error| {
            VizError::new(
                "RESOURCE_ENCODING",
                format!("Resource \"{}\" is not valid UTF-8: {}", name, error),
            )
        })
    }
}

fn not_found(name: &str) -> VizError {
    VizError::new(
        "RESOURCE_NOT_FOUND",
        format!("Resource \"{}\" does not exist.", name),
    )
}

/// Bundles compiled into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedResources;

impl EmbeddedResources {
    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        EMBEDDED_BUNDLES.iter().map(|(name, _)| *name)
    }
}

impl ResourceLoader for EmbeddedResources {
    fn read_resource(&self, name: &str) -> Result<Vec<u8>, VizError> {
        EMBEDDED_BUNDLES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, content)| content.as_bytes().to_vec())
            .ok_or_else(|| not_found(name))
    }
}

#[derive(Debug, Default, Clone)]
pub struct MapResources {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MapResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(name, content);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.entries.insert(name.into(), content.into());
    }
}

impl ResourceLoader for MapResources {
    fn read_resource(&self, name: &str) -> Result<Vec<u8>, VizError> {
        self.entries.get(name).cloned().ok_or_else(|| not_found(name))
    }
}

/// Reads resources from files directly under `root`.
#[derive(Debug, Clone)]
pub struct DirResources {
    root: PathBuf,
}

impl DirResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ResourceLoader for DirResources {
    fn read_resource(&self, name: &str) -> Result<Vec<u8>, VizError> {
        let mut components = Path::new(name).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(VizError::new(
                "RESOURCE_NAME_INVALID",
                format!("Resource name \"{}\" must be a plain file name.", name),
            ));
        }

        fs::read(self.root.join(name)).map_err(|error| match error.kind() {
            io::ErrorKind::NotFound => not_found(name),
            _ => VizError::new(
                "RESOURCE_READ",
                format!("Resource \"{}\" could not be read: {}", name, error),
            ),
        })
    }
}
