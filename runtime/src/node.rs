use std::sync::Arc;

use smallvec::SmallVec;
use tessera_device::{AnyHostBuffer, Element, HostBuffer, Kernel, SlotId};
use tessera_dtype::ScalarValue;

/// Kind of graph node, as shown in profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum NodeKind {
    StreamIn,
    CopyIn,
    Task,
    StreamOut,
    Barrier,
}

/// Argument of a task once its buffers are bound to slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskArg {
    Scalar(ScalarValue),
    Buffer(SlotId),
}

/// One step of a task graph.
#[derive(Debug, Clone)]
pub enum TaskNode {
    /// Copy host to device on every execution.
    StreamIn { slots: SmallVec<[SlotId; 4]> },
    /// Copy host to device only when the device copy is stale.
    CopyIn { slots: SmallVec<[SlotId; 4]> },
    Task { kernel: Arc<Kernel>, args: SmallVec<[TaskArg; 8]> },
    /// Copy device to host on every execution.
    StreamOut { slots: SmallVec<[SlotId; 4]> },
    /// Wait for all previously submitted device work.
    Barrier,
}

impl TaskNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::StreamIn { .. } => NodeKind::StreamIn,
            Self::CopyIn { .. } => NodeKind::CopyIn,
            Self::Task { .. } => NodeKind::Task,
            Self::StreamOut { .. } => NodeKind::StreamOut,
            Self::Barrier => NodeKind::Barrier,
        }
    }

    /// Slots the node touches, in argument order.
    pub fn slots(&self) -> SmallVec<[SlotId; 8]> {
        match self {
            Self::StreamIn { slots } | Self::CopyIn { slots } | Self::StreamOut { slots } => {
                slots.iter().copied().collect()
            }
            Self::Task { args, .. } => args
                .iter()
                .filter_map(|arg| match arg {
                    TaskArg::Buffer(slot) => Some(*slot),
                    TaskArg::Scalar(_) => None,
                })
                .collect(),
            Self::Barrier => SmallVec::new(),
        }
    }
}

/// A node together with its name inside the graph.
#[derive(Debug, Clone)]
pub struct NodeEntry {
    pub name: String,
    pub node: TaskNode,
}

/// Task argument as supplied by the caller, before binding.
///
/// Scalars are captured by value here; buffers by identity.
#[derive(Debug, Clone)]
pub enum Arg {
    Scalar(ScalarValue),
    Buffer(Arc<dyn AnyHostBuffer>),
}

impl<T: Element> From<&HostBuffer<T>> for Arg {
    fn from(buffer: &HostBuffer<T>) -> Self {
        Self::Buffer(buffer.erase())
    }
}

impl From<ScalarValue> for Arg {
    fn from(value: ScalarValue) -> Self {
        Self::Scalar(value)
    }
}

macro_rules! impl_scalar_args {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Self::Scalar(ScalarValue::from(value))
                }
            }
        )*
    };
}

impl_scalar_args!(bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

/// Build a task argument list: `args![m, n, &a, &x, &y]`.
#[macro_export]
macro_rules! args {
    ($($arg:expr),* $(,)?) => {
        vec![$($crate::Arg::from($arg)),*]
    };
}
