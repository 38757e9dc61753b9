use std::fmt;

/// Identifies an execution target.
///
/// Parsing from strings lives in the device crate (`DeviceSpecExt`) since it
/// reports device errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum DeviceSpec {
    /// Host CPU (reference backend).
    #[default]
    Cpu,
    /// NVIDIA GPU driven through the CUDA driver API.
    Cuda { device_id: usize },
    /// Any OpenCL device (GPU, multicore CPU, accelerator).
    OpenCl { device_id: usize },
    /// FPGA board exposed through a vendor runtime.
    Fpga { device_id: usize },
}

impl DeviceSpec {
    /// Canonical device string (`CPU`, `CUDA:0`, `OPENCL:1`, `FPGA:0`).
    pub fn canonicalize(&self) -> String {
        match self {
            Self::Cpu => "CPU".to_string(),
            Self::Cuda { device_id } => format!("CUDA:{device_id}"),
            Self::OpenCl { device_id } => format!("OPENCL:{device_id}"),
            Self::Fpga { device_id } => format!("FPGA:{device_id}"),
        }
    }

    /// Device type without the ordinal, used to pick a factory.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::Cuda { .. } => "CUDA",
            Self::OpenCl { .. } => "OPENCL",
            Self::Fpga { .. } => "FPGA",
        }
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonicalize())
    }
}
