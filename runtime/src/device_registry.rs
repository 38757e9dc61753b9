//! Device contexts created on demand and cached per device.
//!
//! Graphs that target the same device must share one [`DeviceContext`] so
//! their launches go through one queue and reuse compiled kernels. The
//! registry is an ordinary value; callers decide where it lives. Devices
//! themselves come from a [`DeviceRegistry`], so the built-in CPU factory
//! hands out one device per spec.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use snafu::ResultExt;
use tessera_device::{CpuCompiler, DeviceRegistry, DeviceSpecExt};
use tessera_dtype::DeviceSpec;
use tracing::debug;

use crate::error::{DeviceSnafu, Result, UnsupportedDeviceSnafu};
use crate::executor::DeviceContext;

/// Creates a context for a device spec.
pub type ContextFactory = Arc<dyn Fn(&DeviceSpec) -> Result<DeviceContext> + Send + Sync>;

pub struct DeviceContextRegistry {
    devices: Arc<DeviceRegistry>,
    contexts: RwLock<HashMap<DeviceSpec, Arc<DeviceContext>>>,
    /// Device kind (`CPU`, `CUDA`, ...) to factory.
    factories: RwLock<HashMap<String, ContextFactory>>,
}

impl DeviceContextRegistry {
    /// Registry with the CPU factory installed.
    pub fn new() -> Self {
        Self::with_devices(Arc::new(DeviceRegistry::new()))
    }

    /// Registry whose CPU factory takes devices from `devices`.
    pub fn with_devices(devices: Arc<DeviceRegistry>) -> Self {
        let registry = Self {
            devices: Arc::clone(&devices),
            contexts: RwLock::new(HashMap::new()),
            factories: RwLock::new(HashMap::new()),
        };
        registry.register_factory(
            "CPU",
            Arc::new(move |spec: &DeviceSpec| -> Result<DeviceContext> {
                let device = devices.get(spec).context(DeviceSnafu)?;
                Ok(DeviceContext::new(device, Arc::new(CpuCompiler)))
            }),
        );
        registry
    }

    pub fn devices(&self) -> &Arc<DeviceRegistry> {
        &self.devices
    }

    /// Install a factory for a device kind. Kinds are case-insensitive.
    pub fn register_factory(&self, kind: &str, factory: ContextFactory) {
        self.factories.write().insert(kind.to_uppercase(), factory);
    }

    /// Get or create the context for `spec`.
    pub fn get(&self, spec: &DeviceSpec) -> Result<Arc<DeviceContext>> {
        // Fast path: read lock
        if let Some(context) = self.contexts.read().get(spec) {
            return Ok(Arc::clone(context));
        }

        let mut contexts = self.contexts.write();
        if let Some(context) = contexts.get(spec) {
            return Ok(Arc::clone(context));
        }

        let factory = self
            .factories
            .read()
            .get(spec.kind())
            .cloned()
            .ok_or_else(|| UnsupportedDeviceSnafu { device: spec.canonicalize() }.build())?;

        let context = Arc::new(factory(spec)?);
        debug!(device = %spec, "created device context");
        contexts.insert(spec.clone(), Arc::clone(&context));
        Ok(context)
    }

    /// Get a context by parsing a device string such as `cpu` or `CUDA:1`.
    pub fn get_device(&self, device: &str) -> Result<Arc<DeviceContext>> {
        let spec = <DeviceSpec as DeviceSpecExt>::parse(device).context(DeviceSnafu)?;
        self.get(&spec)
    }
}

impl Default for DeviceContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DeviceContextRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContextRegistry")
            .field("devices", &self.devices)
            .field("contexts", &self.contexts.read().keys().collect::<Vec<_>>())
            .field("factories", &self.factories.read().keys().collect::<Vec<_>>())
            .finish()
    }
}
