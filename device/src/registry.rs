use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

pub use tessera_dtype::DeviceSpec;

use crate::cpu::CpuDevice;
use crate::device::Device;
use crate::error::{InvalidDeviceSnafu, Result, UnsupportedDeviceSnafu};

/// Parsing of device strings such as `cpu`, `CUDA:1` or `opencl:0`.
pub trait DeviceSpecExt {
    /// The ordinal defaults to 0 when omitted. Matching is case-insensitive.
    fn parse(s: &str) -> Result<DeviceSpec>;
}

impl DeviceSpecExt for DeviceSpec {
    fn parse(s: &str) -> Result<Self> {
        let upper = s.trim().to_uppercase();
        let (kind, ordinal) = match upper.split_once(':') {
            Some((kind, ordinal)) => (kind, Some(ordinal)),
            None => (upper.as_str(), None),
        };

        let device_id = match ordinal {
            Some(ordinal) => match ordinal.parse() {
                Ok(id) => id,
                Err(_) => return InvalidDeviceSnafu { device: s }.fail(),
            },
            None => 0,
        };

        match kind {
            "CPU" if ordinal.is_none() || device_id == 0 => Ok(DeviceSpec::Cpu),
            "CUDA" | "GPU" | "PTX" => Ok(DeviceSpec::Cuda { device_id }),
            "OPENCL" | "CL" => Ok(DeviceSpec::OpenCl { device_id }),
            "FPGA" => Ok(DeviceSpec::Fpga { device_id }),
            _ => InvalidDeviceSnafu { device: s }.fail(),
        }
    }
}

/// Creates and caches one device per spec.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<DeviceSpec, Arc<dyn Device>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the device for `spec`.
    pub fn get(&self, spec: &DeviceSpec) -> Result<Arc<dyn Device>> {
        // Fast path: read lock
        if let Some(device) = self.devices.read().get(spec) {
            return Ok(Arc::clone(device));
        }

        let mut devices = self.devices.write();
        if let Some(device) = devices.get(spec) {
            return Ok(Arc::clone(device));
        }

        let device = Self::create_device(spec)?;
        debug!(device = %spec, "created device");
        devices.insert(spec.clone(), Arc::clone(&device));
        Ok(device)
    }

    /// Get a device by parsing a device string.
    pub fn get_device(&self, device: &str) -> Result<Arc<dyn Device>> {
        let spec = <DeviceSpec as DeviceSpecExt>::parse(device)?;
        self.get(&spec)
    }

    /// Register an externally constructed device, replacing any cached one.
    pub fn insert(&self, device: Arc<dyn Device>) {
        self.devices.write().insert(device.spec().clone(), device);
    }

    fn create_device(spec: &DeviceSpec) -> Result<Arc<dyn Device>> {
        match spec {
            DeviceSpec::Cpu => Ok(Arc::new(CpuDevice::from_env())),
            DeviceSpec::Cuda { .. } | DeviceSpec::OpenCl { .. } | DeviceSpec::Fpga { .. } => {
                UnsupportedDeviceSnafu { device: spec.canonicalize() }.fail()
            }
        }
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry").field("devices", &self.devices.read().keys().collect::<Vec<_>>()).finish()
    }
}
