//! Task graphs: named, ordered sequences of transfers and kernel launches.
//!
//! A graph is built once through the builder methods and executed any number
//! of times. Nodes run in the order they were added. Buffers are tracked by
//! slot, so [`TaskGraph::update_reference`] can swap the host array behind a
//! slot (even for one of a different length) without rebuilding the graph.
//!
//! ```ignore
//! let mut graph = TaskGraph::new("s0", context);
//! graph.stream_in(&[&a, &x])?.task("t0", &sgemv, args![m, n, &a, &x, &y])?.stream_out(&[&y])?;
//! graph.warmup()?;
//! let report = graph.execute()?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use smallvec::SmallVec;
use snafu::ensure;
use tessera_device::{AnyHostBuffer, AsHostBuffer, Device, DeviceBufferManager, Kernel, Param, SlotId};
use tracing::{debug, info};

use crate::error::{Error, GraphDisposedSnafu, InvalidTaskSnafu, Result, UnboundBufferSnafu};
use crate::executor::{DeviceContext, ExecutionEngine};
use crate::node::{Arg, NodeEntry, NodeKind, TaskArg, TaskNode};
use crate::profiler::{ProfileSample, Profiler};

/// Lifecycle of a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum GraphState {
    /// No nodes yet.
    Unbuilt,
    Built,
    /// Buffers allocated and kernels compiled.
    Warmed,
    Executing,
    /// At least one `execute` has returned, successfully or not.
    Idle,
    Disposed,
}

/// Outcome of one `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Execution number, starting at 1.
    pub run: u64,
    /// Wall-clock time from the first node to device completion.
    pub elapsed: Duration,
}

pub struct TaskGraph {
    name: String,
    context: Arc<DeviceContext>,
    manager: DeviceBufferManager,
    nodes: Vec<NodeEntry>,
    state: GraphState,
    profiler: Profiler,
    execution_count: u64,
    total_elapsed: Duration,
}

impl TaskGraph {
    pub fn new(name: impl Into<String>, context: Arc<DeviceContext>) -> Self {
        let name = name.into();
        debug!(graph.name = %name, device = %context.spec(), "created task graph");
        let manager = DeviceBufferManager::new(Arc::clone(context.device()));
        Self {
            name,
            context,
            manager,
            nodes: Vec::new(),
            state: GraphState::Unbuilt,
            profiler: Profiler::new(),
            execution_count: 0,
            total_elapsed: Duration::ZERO,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> GraphState {
        self.state
    }

    pub fn context(&self) -> &Arc<DeviceContext> {
        &self.context
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        self.context.device()
    }

    pub fn nodes(&self) -> &[NodeEntry] {
        &self.nodes
    }

    /// Number of successful `execute` calls. Warmup is not counted.
    pub fn execution_count(&self) -> u64 {
        self.execution_count
    }

    /// Sum of `RunReport::elapsed` over successful executions.
    pub fn total_elapsed(&self) -> Duration {
        self.total_elapsed
    }

    /// Copy `buffers` to the device on every execution.
    pub fn stream_in(&mut self, buffers: &[&dyn AsHostBuffer]) -> Result<&mut Self> {
        self.ensure_live()?;
        let slots = buffers.iter().map(|buffer| self.manager.bind(buffer.host_buffer())).collect();
        self.push(NodeKind::StreamIn, None, TaskNode::StreamIn { slots });
        Ok(self)
    }

    /// Copy `buffers` to the device only when the device copy is stale: on
    /// first use, after a rebind, or after the host content changed.
    pub fn copy_in(&mut self, buffers: &[&dyn AsHostBuffer]) -> Result<&mut Self> {
        self.ensure_live()?;
        let slots = buffers.iter().map(|buffer| self.manager.bind(buffer.host_buffer())).collect();
        self.push(NodeKind::CopyIn, None, TaskNode::CopyIn { slots });
        Ok(self)
    }

    /// Launch `kernel` with `args`.
    ///
    /// Arguments are checked against the kernel parameters here, before any
    /// device resource is touched. Buffers the kernel reads must already be
    /// available in the graph; buffers it only writes are bound implicitly.
    pub fn task(&mut self, name: &str, kernel: &Arc<Kernel>, args: impl IntoIterator<Item = Arg>) -> Result<&mut Self> {
        self.ensure_live()?;
        let node = format!("{}.{name}", self.name);
        let args: Vec<Arg> = args.into_iter().collect();
        let params = kernel.params();

        ensure!(
            args.len() == params.len(),
            InvalidTaskSnafu {
                node: &node,
                reason: format!("kernel '{}' takes {} arguments, got {}", kernel.name(), params.len(), args.len())
            }
        );

        for (index, (param, arg)) in params.iter().zip(&args).enumerate() {
            match (param, arg) {
                (Param::Scalar(expected), Arg::Scalar(value)) => ensure!(
                    *expected == value.dtype(),
                    InvalidTaskSnafu {
                        node: &node,
                        reason: format!("argument {index}: expected {} scalar, got {}", expected.name(), value.dtype().name())
                    }
                ),
                (Param::Buffer { dtype, access }, Arg::Buffer(host)) => {
                    ensure!(
                        *dtype == host.dtype(),
                        InvalidTaskSnafu {
                            node: &node,
                            reason: format!("argument {index}: expected {dtype} buffer, got {}", host.dtype())
                        }
                    );
                    if access.reads() {
                        ensure!(
                            self.manager.slot_of(host.id()).is_some(),
                            UnboundBufferSnafu { node: &node, buffer: host.id() }
                        );
                    }
                }
                _ => {
                    return InvalidTaskSnafu {
                        node: &node,
                        reason: format!("argument {index} does not match parameter {param}"),
                    }
                    .fail();
                }
            }
        }

        let args = args
            .into_iter()
            .map(|arg| match arg {
                Arg::Scalar(value) => TaskArg::Scalar(value),
                Arg::Buffer(host) => TaskArg::Buffer(self.manager.bind(host)),
            })
            .collect();
        self.push(NodeKind::Task, Some(name), TaskNode::Task { kernel: Arc::clone(kernel), args });
        Ok(self)
    }

    /// Copy `buffers` back to the host on every execution.
    pub fn stream_out(&mut self, buffers: &[&dyn AsHostBuffer]) -> Result<&mut Self> {
        self.ensure_live()?;
        let node = format!("{}.{}.{}", self.name, NodeKind::StreamOut, self.nodes.len());
        let slots = self.bound_slots(&node, buffers)?;
        self.push(NodeKind::StreamOut, None, TaskNode::StreamOut { slots });
        Ok(self)
    }

    /// Wait for all earlier device work before continuing.
    pub fn barrier(&mut self) -> Result<&mut Self> {
        self.ensure_live()?;
        self.push(NodeKind::Barrier, None, TaskNode::Barrier);
        Ok(self)
    }

    /// Allocate device memory and compile every kernel without executing.
    pub fn warmup(&mut self) -> Result<&mut Self> {
        self.ensure_live()?;
        let mut engine = ExecutionEngine::new(&self.context, &self.name, &mut self.manager, &mut self.profiler);
        engine.warmup(&self.nodes)?;
        if matches!(self.state, GraphState::Unbuilt | GraphState::Built) {
            self.state = GraphState::Warmed;
        }
        Ok(self)
    }

    /// Run every node in order and block until the device is done.
    ///
    /// A failure aborts the run at the failing node. The graph is left
    /// `Idle` and can be executed again.
    pub fn execute(&mut self) -> Result<RunReport> {
        self.ensure_live()?;
        self.state = GraphState::Executing;

        let run = self.execution_count + 1;
        let mut engine = ExecutionEngine::new(&self.context, &self.name, &mut self.manager, &mut self.profiler);
        let result = engine.run(&self.nodes, run);
        self.state = GraphState::Idle;

        let elapsed = result?;
        self.execution_count = run;
        self.total_elapsed += elapsed;
        debug!(graph.name = %self.name, run, ?elapsed, "executed graph");
        Ok(RunReport { run, elapsed })
    }

    /// Copy `buffers` from the device to the host now, outside any node.
    pub fn sync_objects(&mut self, buffers: &[&dyn AsHostBuffer]) -> Result<()> {
        self.ensure_live()?;
        let node = format!("{}.sync_objects", self.name);
        let slots = self.bound_slots(&node, buffers)?;

        let _queue = self.context.lock_queue();
        for slot in slots {
            if let Err(source) = self.manager.copy_out(slot) {
                return Err(Error::TransferFailure { node, source });
            }
        }
        Ok(())
    }

    /// Replace the host buffer bound in place of `old` with `new`.
    ///
    /// Every node that referred to `old` uses `new` from the next execution
    /// on. Device memory is reused when the byte size is unchanged and
    /// reallocated otherwise; in both cases the content of `new` is copied
    /// in by the next input transfer.
    pub fn update_reference(&mut self, old: &dyn AsHostBuffer, new: &dyn AsHostBuffer) -> Result<&mut Self> {
        self.ensure_live()?;
        let old = old.host_buffer();
        match self.manager.update_reference(old.id(), new.host_buffer()) {
            Ok(_) => Ok(self),
            Err(tessera_device::Error::UnboundBuffer { buffer }) => {
                UnboundBufferSnafu { node: format!("{}.update_reference", self.name), buffer }.fail()
            }
            Err(source) => Err(Error::IncompatibleReference { graph: self.name.clone(), source }),
        }
    }

    /// Render the accumulated profile samples and log them.
    pub fn dump_profiles(&self) -> Result<String> {
        self.ensure_live()?;
        let dump = self.profiler.dump(&self.name);
        info!(graph.name = %self.name, samples = self.profiler.samples().len(), "\n{dump}");
        Ok(dump)
    }

    pub fn clear_profiles(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.profiler.clear();
        Ok(())
    }

    pub fn profiles(&self) -> Result<&[ProfileSample]> {
        self.ensure_live()?;
        Ok(self.profiler.samples())
    }

    /// Release all device memory held by the graph. Further operations fail
    /// with `GraphDisposed`; disposing twice is a no-op.
    pub fn dispose(&mut self) {
        if self.state == GraphState::Disposed {
            return;
        }
        self.manager.release_all();
        self.state = GraphState::Disposed;
        debug!(graph.name = %self.name, runs = self.execution_count, "disposed task graph");
    }

    fn ensure_live(&self) -> Result<()> {
        ensure!(self.state != GraphState::Disposed, GraphDisposedSnafu { graph: &self.name });
        Ok(())
    }

    fn bound_slots(&self, node: &str, buffers: &[&dyn AsHostBuffer]) -> Result<SmallVec<[SlotId; 4]>> {
        buffers
            .iter()
            .map(|buffer| {
                let host: Arc<dyn AnyHostBuffer> = buffer.host_buffer();
                self.manager.slot_of(host.id()).ok_or_else(|| UnboundBufferSnafu { node, buffer: host.id() }.build())
            })
            .collect()
    }

    fn push(&mut self, kind: NodeKind, name: Option<&str>, node: TaskNode) {
        let name = match name {
            Some(name) => name.to_string(),
            None => format!("{kind}.{}", self.nodes.len()),
        };
        debug!(graph.name = %self.name, node.index = self.nodes.len(), node.name = %name, %kind, "added node");
        self.nodes.push(NodeEntry { name, node });
        if self.state == GraphState::Unbuilt {
            self.state = GraphState::Built;
        }
    }
}

impl std::fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGraph")
            .field("name", &self.name)
            .field("device", self.context.spec())
            .field("state", &self.state)
            .field("nodes", &self.nodes.len())
            .field("execution_count", &self.execution_count)
            .finish()
    }
}
