//! Reference CPU backend.
//!
//! Kernels run on the calling thread, one work item at a time, with the
//! argument buffers locked for the duration of the launch. Device memory is
//! ordinary host memory behind a caching allocator, optionally capped to
//! emulate a device with little memory.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use bon::bon;
use snafu::ensure;
use tessera_dtype::DeviceSpec;
use tracing::{debug, trace};

use crate::allocator::{Allocator, CachingAllocator, CpuAllocator};
use crate::buffer::DeviceAllocation;
use crate::device::{Compiler, Device, Program};
use crate::error::{CompilationSnafu, LaunchSnafu, Result};
use crate::kernel::{Kernel, KernelArgs, LaunchArg, WorkItem};
use crate::launch::LaunchConfig;

#[derive(Debug)]
pub struct CpuDevice {
    spec: DeviceSpec,
    allocator: Arc<CachingAllocator<CpuAllocator>>,
}

#[bon]
impl CpuDevice {
    #[builder]
    pub fn new(
        // Emulated device memory in bytes; unlimited when unset.
        memory_limit: Option<usize>,
        #[builder(default = 32)] cached_blocks_per_size: usize,
    ) -> Self {
        let inner = match memory_limit {
            Some(limit) => CpuAllocator::with_capacity(limit),
            None => CpuAllocator::new(),
        };
        Self { spec: DeviceSpec::Cpu, allocator: Arc::new(CachingAllocator::with_capacity(inner, cached_blocks_per_size)) }
    }

    /// Reads `TESSERA_CPU_MEMORY_LIMIT` (bytes).
    pub fn from_env() -> Self {
        let memory_limit = std::env::var("TESSERA_CPU_MEMORY_LIMIT").ok().and_then(|s| s.parse().ok());
        Self::builder().maybe_memory_limit(memory_limit).build()
    }

    /// Bytes held by live and cached allocations.
    pub fn memory_used(&self) -> usize {
        self.allocator.inner().used()
    }

    /// Freed blocks kept for reuse.
    pub fn cached_blocks(&self) -> usize {
        self.allocator.cached()
    }
}

impl Default for CpuDevice {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Device for CpuDevice {
    fn spec(&self) -> &DeviceSpec {
        &self.spec
    }

    fn allocator(&self) -> Arc<dyn Allocator> {
        self.allocator.clone()
    }

    fn copy_host_to_device(&self, src: &[u8], dst: &DeviceAllocation) -> Result<()> {
        dst.copy_in(src)
    }

    fn copy_device_to_host(&self, src: &DeviceAllocation, dst: &mut [u8]) -> Result<()> {
        src.copy_out(dst)
    }

    fn launch(&self, program: &dyn Program, args: &[LaunchArg<'_>]) -> Result<LaunchConfig> {
        program.kernel().check_args(args)?;
        let config = program.launch_config(args)?;
        trace!(kernel.name = program.name(), global_size = ?config.global_size, "launching");
        program.execute(args, &config)?;
        Ok(config)
    }

    fn synchronize(&self) -> Result<()> {
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        debug!(device = %self.spec, cached = self.allocator.cached(), "resetting device");
        self.allocator.trim();
        Ok(())
    }
}

/// Validates kernels and wraps them for sequential execution.
#[derive(Debug, Default, Clone)]
pub struct CpuCompiler;

impl Compiler for CpuCompiler {
    fn compile(&self, kernel: &Arc<Kernel>, device: &DeviceSpec) -> Result<Arc<dyn Program>> {
        ensure!(
            *device == DeviceSpec::Cpu,
            CompilationSnafu { kernel: kernel.name(), reason: format!("CPU compiler cannot target {device}") }
        );
        if let Err(reason) = kernel.space().validate(kernel.params()) {
            return CompilationSnafu { kernel: kernel.name(), reason }.fail();
        }

        debug!(kernel.id = %kernel.id(), kernel.name = kernel.name(), "compiled kernel");
        Ok(Arc::new(CpuProgram { kernel: Arc::clone(kernel) }))
    }
}

#[derive(Debug)]
pub struct CpuProgram {
    kernel: Arc<Kernel>,
}

impl Program for CpuProgram {
    fn name(&self) -> &str {
        self.kernel.name()
    }

    fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }

    fn execute(&self, args: &[LaunchArg<'_>], config: &LaunchConfig) -> Result<()> {
        let mut kernel_args = KernelArgs::lock(&self.kernel, args)?;
        let [gx, gy, gz] = config.global_size;

        // Panics in the body surface as launch failures.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<()> {
            for z in 0..gz {
                for y in 0..gy {
                    for x in 0..gx {
                        let item = WorkItem { id: [x, y, z], global_size: config.global_size };
                        self.kernel.run(&item, &mut kernel_args)?;
                    }
                }
            }
            Ok(())
        }));

        match outcome {
            Ok(result) => result,
            Err(payload) => LaunchSnafu {
                kernel: self.kernel.name(),
                reason: format!("kernel body panicked: {}", panic_message(&*payload)),
            }
            .fail(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
