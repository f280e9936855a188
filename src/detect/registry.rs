use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};

use crate::config::ModelSettings;

use super::backend::{DetectionCapability, DetectorBackend};
use super::backends::{CpuBackend, StubBackend};

/// Constructor for a backend from model settings.
pub type BackendFactory = fn(&ModelSettings) -> Result<Box<dyn DetectorBackend>>;

/// Registry of detector backends, keyed by name.
///
/// Backends are constructed on demand so that a failed model load never
/// leaves a half-initialised backend behind.
pub struct BackendRegistry {
    factories: BTreeMap<String, BackendFactory>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
            default_name: None,
        }
    }

    /// Registry with every backend compiled into this build.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("cpu", |_| Ok(Box::new(CpuBackend::new())));
        registry.register("stub", |_| Ok(Box::new(StubBackend::new())));
        #[cfg(feature = "backend-tract")]
        registry.register("tract", |settings| {
            let backend = super::backends::TractBackend::new(&settings.model_path, settings.input_size)?
                .with_iou_threshold(settings.iou_threshold);
            Ok(Box::new(backend))
        });
        registry
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register(&mut self, name: &str, factory: BackendFactory) {
        if self.default_name.is_none() {
            self.default_name = Some(name.to_string());
        }
        self.factories.insert(name.to_string(), factory);
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.factories.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    /// List registered backends.
    pub fn list(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Construct the backend named in `settings`, or the default when empty.
    pub fn load(&self, settings: &ModelSettings) -> Result<Box<dyn DetectorBackend>> {
        let name = if settings.backend.trim().is_empty() {
            self.default_name
                .as_deref()
                .ok_or_else(|| anyhow!("no detector backends registered"))?
        } else {
            settings.backend.trim()
        };
        let factory = self.factories.get(name).ok_or_else(|| {
            anyhow!(
                "backend '{}' not available in this build (available: {})",
                name,
                self.list().join(", ")
            )
        })?;
        let mut backend = factory(settings).with_context(|| {
            format!(
                "failed to load model {} with backend '{}'",
                settings.model_path.display(),
                name
            )
        })?;
        backend
            .warm_up()
            .with_context(|| format!("backend '{}' failed to warm up", name))?;
        if !backend.supports(DetectionCapability::ObjectDetection) {
            return Err(anyhow!("backend '{}' cannot detect objects", name));
        }
        log::info!(
            "loaded detector backend '{}' (segmentation={})",
            backend.name(),
            backend.supports(DetectionCapability::Segmentation)
        );
        Ok(backend)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Load the backend named by `settings` from the built-in registry.
pub fn load_backend(settings: &ModelSettings) -> Result<Box<dyn DetectorBackend>> {
    BackendRegistry::with_builtin().load(settings)
}
