//! Kernels: named parameter lists, an iteration space, and a per-work-item
//! body.
//!
//! The iteration space is declared up front instead of being discovered from
//! loop structure. Each dimension's extent is either a constant, the element
//! length of a buffer argument, or the value of an integer scalar argument,
//! and is resolved from the actual arguments at every launch.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytemuck::Pod;
use parking_lot::MutexGuard;
use smallvec::SmallVec;
use snafu::ensure;
use tessera_dtype::{DType, HasDType, ScalarDType, ScalarValue};

use crate::buffer::{DeviceAllocation, view, view_mut};
use crate::error::{Error, LaunchSnafu, Result, TypeMismatchSnafu};
use crate::host::Element;

/// Process-unique kernel identity, part of the compiled-program cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KernelId(u64);

impl KernelId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for KernelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "k{}", self.0)
    }
}

/// How a kernel uses a buffer argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    pub fn reads(&self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    pub fn writes(&self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

/// Declared kernel parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    /// Passed by value, captured when the task is added to a graph.
    Scalar(ScalarDType),
    /// Device buffer bound to a host buffer.
    Buffer { dtype: DType, access: Access },
}

impl Param {
    pub fn scalar<T: HasDType>() -> Self {
        Self::Scalar(T::DTYPE.base())
    }

    pub fn input<T: HasDType>() -> Self {
        Self::Buffer { dtype: T::DTYPE, access: Access::Read }
    }

    pub fn output<T: HasDType>() -> Self {
        Self::Buffer { dtype: T::DTYPE, access: Access::Write }
    }

    pub fn inout<T: HasDType>() -> Self {
        Self::Buffer { dtype: T::DTYPE, access: Access::ReadWrite }
    }

    pub fn is_buffer(&self) -> bool {
        matches!(self, Self::Buffer { .. })
    }

    pub fn access(&self) -> Option<Access> {
        match self {
            Self::Buffer { access, .. } => Some(*access),
            Self::Scalar(_) => None,
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(dtype) => f.write_str(dtype.name()),
            Self::Buffer { dtype, access } => write!(f, "{dtype}[{access:?}]"),
        }
    }
}

/// Extent of one iteration dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extent {
    Fixed(usize),
    /// Element length of the buffer argument at this index.
    Length(usize),
    /// Value of the integer scalar argument at this index.
    Scalar(usize),
}

/// Up to three independent dimensions; the first varies fastest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IterationSpace {
    dims: SmallVec<[Extent; 3]>,
}

impl IterationSpace {
    pub const MAX_DIMS: usize = 3;

    pub fn new_1d(x: Extent) -> Self {
        Self { dims: smallvec::smallvec![x] }
    }

    pub fn new_2d(x: Extent, y: Extent) -> Self {
        Self { dims: smallvec::smallvec![x, y] }
    }

    pub fn new_3d(x: Extent, y: Extent, z: Extent) -> Self {
        Self { dims: smallvec::smallvec![x, y, z] }
    }

    /// Arbitrary dimension list, checked when the kernel is compiled.
    pub fn from_dims(dims: impl IntoIterator<Item = Extent>) -> Self {
        Self { dims: dims.into_iter().collect() }
    }

    pub fn dims(&self) -> &[Extent] {
        &self.dims
    }

    /// Check the descriptor against a parameter list. Returns a description
    /// of the first problem found.
    pub fn validate(&self, params: &[Param]) -> std::result::Result<(), String> {
        if self.dims.is_empty() || self.dims.len() > Self::MAX_DIMS {
            return Err(format!("iteration space must have 1 to 3 dimensions, got {}", self.dims.len()));
        }

        for (dim, extent) in self.dims.iter().enumerate() {
            match *extent {
                Extent::Fixed(_) => {}
                Extent::Length(index) => match params.get(index) {
                    Some(Param::Buffer { .. }) => {}
                    Some(param) => return Err(format!("dimension {dim} takes its length from non-buffer {param}")),
                    None => return Err(format!("dimension {dim} refers to missing argument {index}")),
                },
                Extent::Scalar(index) => match params.get(index) {
                    Some(Param::Scalar(dtype)) if dtype.is_int() => {}
                    Some(param) => return Err(format!("dimension {dim} takes its extent from non-integer {param}")),
                    None => return Err(format!("dimension {dim} refers to missing argument {index}")),
                },
            }
        }
        Ok(())
    }

    /// Global size for the given arguments.
    pub fn resolve(&self, kernel: &str, args: &[LaunchArg<'_>]) -> Result<[usize; 3]> {
        let mut global = [1usize; 3];
        for (dim, extent) in self.dims.iter().enumerate() {
            global[dim] = match *extent {
                Extent::Fixed(n) => n,
                Extent::Length(index) => match args.get(index) {
                    Some(LaunchArg::Buffer(allocation)) => allocation.len(),
                    _ => return launch_error(kernel, format!("argument {index} is not a buffer")),
                },
                Extent::Scalar(index) => {
                    let value = match args.get(index) {
                        Some(LaunchArg::Scalar(value)) => value.as_i64(),
                        _ => None,
                    };
                    match value.map(usize::try_from) {
                        Some(Ok(n)) => n,
                        Some(Err(_)) => return launch_error(kernel, format!("argument {index} is a negative extent")),
                        None => return launch_error(kernel, format!("argument {index} is not an integer scalar")),
                    }
                }
            };
        }
        Ok(global)
    }
}

fn launch_error<T>(kernel: &str, reason: String) -> Result<T> {
    LaunchSnafu { kernel, reason }.fail()
}

/// Position of one work item in the launch grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkItem {
    pub id: [usize; 3],
    pub global_size: [usize; 3],
}

impl WorkItem {
    pub fn global_id(&self, dim: usize) -> usize {
        self.id[dim]
    }

    pub fn x(&self) -> usize {
        self.id[0]
    }

    pub fn y(&self) -> usize {
        self.id[1]
    }

    pub fn z(&self) -> usize {
        self.id[2]
    }

    /// Row-major linear index with `x` varying fastest.
    pub fn linear_id(&self) -> usize {
        self.id[0] + self.global_size[0] * (self.id[1] + self.global_size[1] * self.id[2])
    }
}

/// Actual argument passed to a launch.
#[derive(Debug, Clone, Copy)]
pub enum LaunchArg<'a> {
    Scalar(ScalarValue),
    Buffer(&'a DeviceAllocation),
}

pub type KernelFn = dyn Fn(&WorkItem, &mut KernelArgs<'_>) -> Result<()> + Send + Sync;

/// A callable unit of device work.
pub struct Kernel {
    id: KernelId,
    name: String,
    params: SmallVec<[Param; 8]>,
    space: IterationSpace,
    body: Box<KernelFn>,
}

impl Kernel {
    pub fn new<F>(name: impl Into<String>, params: impl IntoIterator<Item = Param>, space: IterationSpace, body: F) -> Arc<Self>
    where
        F: Fn(&WorkItem, &mut KernelArgs<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Arc::new(Self {
            id: KernelId::next(),
            name: name.into(),
            params: params.into_iter().collect(),
            space,
            body: Box::new(body),
        })
    }

    pub fn id(&self) -> KernelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn space(&self) -> &IterationSpace {
        &self.space
    }

    /// Check the actual arguments against the declared parameters.
    pub fn check_args(&self, args: &[LaunchArg<'_>]) -> Result<()> {
        if args.len() != self.params.len() {
            return launch_error(&self.name, format!("expected {} arguments, got {}", self.params.len(), args.len()));
        }

        for (index, (param, arg)) in self.params.iter().zip(args).enumerate() {
            match (param, arg) {
                (Param::Scalar(expected), LaunchArg::Scalar(value)) => ensure!(
                    *expected == value.dtype(),
                    TypeMismatchSnafu { expected: DType::Scalar(*expected), actual: DType::Scalar(value.dtype()) }
                ),
                (Param::Buffer { dtype, .. }, LaunchArg::Buffer(allocation)) => {
                    ensure!(*dtype == allocation.dtype(), TypeMismatchSnafu { expected: *dtype, actual: allocation.dtype() })
                }
                _ => return launch_error(&self.name, format!("argument {index} does not match parameter {param}")),
            }
        }
        Ok(())
    }

    pub(crate) fn run(&self, item: &WorkItem, args: &mut KernelArgs<'_>) -> Result<()> {
        (self.body)(item, args)
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("params", &self.params)
            .field("space", &self.space)
            .finish_non_exhaustive()
    }
}

/// Typed access to launch arguments from inside a kernel body.
///
/// Buffer memory is locked once for the whole launch. Arguments that alias
/// the same allocation share a lock.
pub struct KernelArgs<'a> {
    kernel: &'a str,
    params: &'a [Param],
    args: &'a [LaunchArg<'a>],
    locks: SmallVec<[Option<usize>; 8]>,
    guards: SmallVec<[MutexGuard<'a, Box<[u64]>>; 8]>,
}

impl<'a> KernelArgs<'a> {
    pub(crate) fn lock(kernel: &'a Kernel, args: &'a [LaunchArg<'a>]) -> Result<Self> {
        let mut locks = SmallVec::with_capacity(args.len());
        let mut guards: SmallVec<[MutexGuard<'a, Box<[u64]>>; 8]> = SmallVec::new();
        let mut addrs: SmallVec<[usize; 8]> = SmallVec::new();

        for arg in args {
            let LaunchArg::Buffer(allocation) = arg else {
                locks.push(None);
                continue;
            };
            let addr = allocation.raw_addr();
            if let Some(existing) = addrs.iter().position(|&a| a == addr) {
                locks.push(Some(existing));
                continue;
            }
            guards.push(allocation.lock()?);
            addrs.push(addr);
            locks.push(Some(guards.len() - 1));
        }

        Ok(Self { kernel: kernel.name(), params: kernel.params(), args, locks, guards })
    }

    /// Number of arguments.
    pub fn count(&self) -> usize {
        self.args.len()
    }

    /// Element length of the buffer argument at `index`.
    pub fn len(&self, index: usize) -> Result<usize> {
        match self.args.get(index) {
            Some(LaunchArg::Buffer(allocation)) => Ok(allocation.len()),
            _ => self.fail(format!("argument {index} is not a buffer")),
        }
    }

    pub fn scalar<T: HasDType + Pod>(&self, index: usize) -> Result<T> {
        let Some(LaunchArg::Scalar(value)) = self.args.get(index) else {
            return self.fail(format!("argument {index} is not a scalar"));
        };
        value.get::<T>().ok_or_else(|| Error::TypeMismatch { expected: DType::Scalar(value.dtype()), actual: T::DTYPE })
    }

    pub fn buffer<T: Element>(&self, index: usize) -> Result<&[T]> {
        let (lock, len) = self.buffer_slot::<T>(index, false)?;
        Ok(view(&self.guards[lock][..], len))
    }

    /// Mutable view of a buffer declared as written by the kernel.
    pub fn buffer_mut<T: Element>(&mut self, index: usize) -> Result<&mut [T]> {
        let (lock, len) = self.buffer_slot::<T>(index, true)?;
        Ok(view_mut(&mut self.guards[lock][..], len))
    }

    fn buffer_slot<T: Element>(&self, index: usize, write: bool) -> Result<(usize, usize)> {
        let (Some(Param::Buffer { dtype, access }), Some(LaunchArg::Buffer(allocation)), Some(Some(lock))) =
            (self.params.get(index), self.args.get(index), self.locks.get(index))
        else {
            return self.fail(format!("argument {index} is not a buffer"));
        };
        ensure!(T::DTYPE == *dtype, TypeMismatchSnafu { expected: *dtype, actual: T::DTYPE });
        if write && !access.writes() {
            return self.fail(format!("argument {index} is read-only"));
        }
        Ok((*lock, allocation.len()))
    }

    fn fail<T>(&self, reason: String) -> Result<T> {
        launch_error(self.kernel, reason)
    }
}
