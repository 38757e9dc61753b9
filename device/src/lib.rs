//! Device-side services: host buffers, device memory, kernels, and the
//! per-graph buffer manager.

pub mod allocator;
pub mod buffer;
pub mod cpu;
pub mod device;
pub mod error;
pub mod host;
pub mod kernel;
pub mod launch;
pub mod manager;
pub mod registry;


pub use allocator::{Allocator, BufferOptions, CachingAllocator, CpuAllocator, RawBuffer};
pub use buffer::DeviceAllocation;
pub use cpu::{CpuCompiler, CpuDevice, CpuProgram};
pub use device::{Compiler, Device, Program};
pub use error::{Error, Result};
pub use host::{AnyHostBuffer, AsHostBuffer, Element, HostBuffer, HostBufferId};
pub use kernel::{Access, Extent, IterationSpace, Kernel, KernelArgs, KernelFn, KernelId, LaunchArg, Param, WorkItem};
pub use launch::LaunchConfig;
pub use manager::{DeviceBufferManager, SlotId};
pub use registry::{DeviceRegistry, DeviceSpec, DeviceSpecExt};
