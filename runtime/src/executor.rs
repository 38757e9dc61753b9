//! Device contexts and the engine that walks a graph's nodes.
//!
//! A [`DeviceContext`] is shared by every graph that targets one device. It
//! owns the compiled-kernel cache and a queue lock: the engine holds the lock
//! for a whole run, so launches from different graphs never interleave and
//! each graph sees its nodes execute in declared order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};
use smallvec::SmallVec;
use tessera_device::{Compiler, CpuCompiler, CpuDevice, Device, DeviceBufferManager, Kernel, LaunchArg, Program};
use tessera_dtype::DeviceSpec;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::kernel_cache::KernelCache;
use crate::node::{NodeEntry, TaskArg, TaskNode};
use crate::profiler::{ProfileSample, Profiler};

/// Device, compiler and compiled programs shared by graphs on one device.
pub struct DeviceContext {
    device: Arc<dyn Device>,
    compiler: Arc<dyn Compiler>,
    cache: KernelCache,
    queue: Mutex<()>,
}

impl DeviceContext {
    pub fn new(device: Arc<dyn Device>, compiler: Arc<dyn Compiler>) -> Self {
        Self { device, compiler, cache: KernelCache::new(), queue: Mutex::new(()) }
    }

    /// Reference CPU device configured from the environment.
    pub fn cpu() -> Self {
        Self::new(Arc::new(CpuDevice::from_env()), Arc::new(CpuCompiler))
    }

    pub fn spec(&self) -> &DeviceSpec {
        self.device.spec()
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    pub fn compiler(&self) -> &Arc<dyn Compiler> {
        &self.compiler
    }

    pub fn cache(&self) -> &KernelCache {
        &self.cache
    }

    /// Compiled program for `kernel`, compiling on first use.
    pub fn compile(&self, kernel: &Arc<Kernel>) -> tessera_device::Result<Arc<dyn Program>> {
        let spec = self.device.spec();
        self.cache.get_or_compile(kernel.id(), spec, || self.compiler.compile(kernel, spec))
    }

    /// Exclusive access to the device queue.
    pub(crate) fn lock_queue(&self) -> MutexGuard<'_, ()> {
        self.queue.lock()
    }
}

impl std::fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field("device", self.device.spec())
            .field("compiler", &self.compiler)
            .field("cache", &self.cache)
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Transfer,
    Launch,
}

/// Map a device error to a runtime error naming `node`.
fn node_error(node: String, source: tessera_device::Error, stage: Stage) -> Error {
    match source {
        tessera_device::Error::OutOfMemory { .. } => Error::DeviceOutOfMemory { node, source },
        tessera_device::Error::Compilation { .. } => Error::Compilation { node, source },
        source => match stage {
            Stage::Transfer => Error::TransferFailure { node, source },
            Stage::Launch => Error::LaunchFailure { node, source },
        },
    }
}

/// Timing of one executed node.
struct NodeTiming {
    device_time: Duration,
    bytes: usize,
}

/// Runs one graph's nodes against a device context.
pub struct ExecutionEngine<'a> {
    context: &'a DeviceContext,
    graph: &'a str,
    manager: &'a mut DeviceBufferManager,
    profiler: &'a mut Profiler,
}

impl<'a> ExecutionEngine<'a> {
    pub fn new(
        context: &'a DeviceContext,
        graph: &'a str,
        manager: &'a mut DeviceBufferManager,
        profiler: &'a mut Profiler,
    ) -> Self {
        Self { context, graph, manager, profiler }
    }

    fn qualified(&self, entry: &NodeEntry) -> String {
        format!("{}.{}", self.graph, entry.name)
    }

    /// Allocate every buffer and compile every kernel without running
    /// anything. Records no profile samples.
    pub fn warmup(&mut self, nodes: &[NodeEntry]) -> Result<()> {
        let _queue = self.context.lock_queue();
        let start = Instant::now();

        for entry in nodes {
            for slot in entry.node.slots() {
                self.manager.ensure_allocated(slot).map_err(|e| node_error(self.qualified(entry), e, Stage::Transfer))?;
            }
            if let TaskNode::Task { kernel, .. } = &entry.node {
                self.context.compile(kernel).map_err(|e| node_error(self.qualified(entry), e, Stage::Launch))?;
            }
        }

        debug!(graph.name = self.graph, nodes = nodes.len(), elapsed = ?start.elapsed(), "warmed up graph");
        Ok(())
    }

    /// Execute `nodes` in order and wait for the device. Returns the
    /// wall-clock time of the run.
    pub fn run(&mut self, nodes: &[NodeEntry], run: u64) -> Result<Duration> {
        let _queue = self.context.lock_queue();
        let start = Instant::now();

        for (index, entry) in nodes.iter().enumerate() {
            let submit_offset = start.elapsed();
            let node_start = Instant::now();
            trace!(graph.name = self.graph, node.index = index, node.name = %entry.name, kind = %entry.node.kind(), "executing node");

            let timing = self.run_node(entry)?;
            let node = self.qualified(entry);
            self.profiler.record(ProfileSample {
                node,
                kind: entry.node.kind(),
                run,
                submit_offset,
                device_time: timing.device_time,
                total_time: node_start.elapsed(),
                bytes: timing.bytes,
            });
        }

        self.context
            .device()
            .synchronize()
            .map_err(|e| node_error(format!("{}.synchronize", self.graph), e, Stage::Launch))?;
        Ok(start.elapsed())
    }

    fn run_node(&mut self, entry: &NodeEntry) -> Result<NodeTiming> {
        match &entry.node {
            TaskNode::StreamIn { slots } => self.transfer_in(entry, slots, true),
            TaskNode::CopyIn { slots } => self.transfer_in(entry, slots, false),
            TaskNode::Task { kernel, args } => self.launch(entry, kernel, args),
            TaskNode::StreamOut { slots } => {
                let mut timing = NodeTiming { device_time: Duration::ZERO, bytes: 0 };
                for &slot in slots {
                    let copy_start = Instant::now();
                    self.manager.copy_out(slot).map_err(|e| node_error(self.qualified(entry), e, Stage::Transfer))?;
                    timing.device_time += copy_start.elapsed();
                    timing.bytes += self.manager.host(slot).byte_len();
                }
                Ok(timing)
            }
            TaskNode::Barrier => {
                let sync_start = Instant::now();
                self.context.device().synchronize().map_err(|e| node_error(self.qualified(entry), e, Stage::Launch))?;
                Ok(NodeTiming { device_time: sync_start.elapsed(), bytes: 0 })
            }
        }
    }

    /// Copy inputs to the device. With `always` unset only stale slots are
    /// copied.
    fn transfer_in(&mut self, entry: &NodeEntry, slots: &[tessera_device::SlotId], always: bool) -> Result<NodeTiming> {
        let mut timing = NodeTiming { device_time: Duration::ZERO, bytes: 0 };
        for &slot in slots {
            self.manager.ensure_allocated(slot).map_err(|e| node_error(self.qualified(entry), e, Stage::Transfer))?;
            if !always && !self.manager.needs_copy_in(slot) {
                trace!(graph.name = self.graph, %slot, "device copy is current, skipping transfer");
                continue;
            }

            let copy_start = Instant::now();
            self.manager.copy_in(slot).map_err(|e| node_error(self.qualified(entry), e, Stage::Transfer))?;
            timing.device_time += copy_start.elapsed();
            timing.bytes += self.manager.host(slot).byte_len();
        }
        Ok(timing)
    }

    fn launch(&mut self, entry: &NodeEntry, kernel: &Arc<Kernel>, args: &[TaskArg]) -> Result<NodeTiming> {
        for arg in args {
            if let TaskArg::Buffer(slot) = arg {
                self.manager.ensure_allocated(*slot).map_err(|e| node_error(self.qualified(entry), e, Stage::Launch))?;
            }
        }
        let program = self.context.compile(kernel).map_err(|e| node_error(self.qualified(entry), e, Stage::Launch))?;

        let manager = &*self.manager;
        let launch_args = args
            .iter()
            .map(|arg| match arg {
                TaskArg::Scalar(value) => Ok(LaunchArg::Scalar(*value)),
                TaskArg::Buffer(slot) => manager.launch_arg(*slot),
            })
            .collect::<tessera_device::Result<SmallVec<[LaunchArg<'_>; 8]>>>()
            .map_err(|e| node_error(format!("{}.{}", self.graph, entry.name), e, Stage::Launch))?;

        let launch_start = Instant::now();
        let config = self
            .context
            .device()
            .launch(&*program, &launch_args)
            .map_err(|e| node_error(format!("{}.{}", self.graph, entry.name), e, Stage::Launch))?;
        let device_time = launch_start.elapsed();

        trace!(graph.name = self.graph, node.name = %entry.name, kernel.name = kernel.name(), global_size = ?config.global_size, "launched kernel");
        Ok(NodeTiming { device_time, bytes: 0 })
    }
}
