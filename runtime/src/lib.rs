//! Task-graph runtime.
//!
//! Callers build a [`TaskGraph`] of transfers and kernel launches against a
//! [`DeviceContext`], then execute it repeatedly. The runtime allocates device
//! memory lazily, skips redundant transfers, compiles each kernel once per
//! device and keeps a per-graph profile log.

pub mod device_registry;
pub mod error;
pub mod executor;
pub mod graph;
pub mod kernel_cache;
pub mod node;
pub mod profiler;

#[cfg(test)]
pub mod test;

pub use device_registry::{ContextFactory, DeviceContextRegistry};
pub use error::*;
pub use executor::{DeviceContext, ExecutionEngine};
pub use graph::{GraphState, RunReport, TaskGraph};
pub use kernel_cache::KernelCache;
pub use node::{Arg, NodeEntry, NodeKind, TaskArg, TaskNode};
pub use profiler::{ProfileSample, Profiler};
