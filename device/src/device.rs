//! Device and compiler service boundaries.
//!
//! A [`Compiler`] turns a [`Kernel`] into an executable [`Program`] for one
//! device; a [`Device`] owns memory, moves bytes between host and device and
//! launches programs. Backends plug in by implementing both.

use std::fmt;
use std::sync::Arc;

use tessera_dtype::{DType, DeviceSpec};

use crate::allocator::Allocator;
use crate::buffer::DeviceAllocation;
use crate::error::Result;
use crate::kernel::{Kernel, LaunchArg};
use crate::launch::LaunchConfig;

/// A compiled, executable kernel.
pub trait Program: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn kernel(&self) -> &Arc<Kernel>;

    /// Launch geometry for the given arguments.
    fn launch_config(&self, args: &[LaunchArg<'_>]) -> Result<LaunchConfig> {
        let kernel = self.kernel();
        let global = kernel.space().resolve(kernel.name(), args)?;
        Ok(LaunchConfig::new_3d(global, [1, 1, 1]))
    }

    /// Run the program over `config`. Arguments were already checked.
    fn execute(&self, args: &[LaunchArg<'_>], config: &LaunchConfig) -> Result<()>;
}

pub trait Compiler: Send + Sync + fmt::Debug {
    fn compile(&self, kernel: &Arc<Kernel>, device: &DeviceSpec) -> Result<Arc<dyn Program>>;

    /// Distinguishes compiled artifacts of differently configured compilers
    /// for the same device.
    fn cache_key(&self) -> Option<&str> {
        None
    }
}

/// An execution target.
pub trait Device: Send + Sync + fmt::Debug {
    fn spec(&self) -> &DeviceSpec;

    fn allocator(&self) -> Arc<dyn Allocator>;

    fn allocate(&self, dtype: DType, len: usize) -> Result<DeviceAllocation> {
        DeviceAllocation::allocate(self.allocator(), dtype, len)
    }

    fn copy_host_to_device(&self, src: &[u8], dst: &DeviceAllocation) -> Result<()>;

    fn copy_device_to_host(&self, src: &DeviceAllocation, dst: &mut [u8]) -> Result<()>;

    /// Check the arguments, resolve the launch geometry and run the program
    /// to completion.
    fn launch(&self, program: &dyn Program, args: &[LaunchArg<'_>]) -> Result<LaunchConfig>;

    /// Wait for all submitted work.
    fn synchronize(&self) -> Result<()>;

    /// Drop cached device state such as pooled memory.
    fn reset(&self) -> Result<()>;
}
