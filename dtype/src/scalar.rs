//! Typed scalar values passed by value to kernels.

use std::fmt;

use bytemuck::Pod;

use crate::{DType, ScalarDType};

/// Maps a Rust primitive to its element type.
pub trait HasDType {
    const DTYPE: DType;
}

/// A scalar kernel argument: raw little-endian bytes tagged with their type.
///
/// Scalars are captured by value when a task is added to a graph, so a later
/// change to the Rust variable they came from is not observed by the graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScalarValue {
    dtype: ScalarDType,
    bytes: [u8; 8],
}

impl ScalarValue {
    pub fn new<T: HasDType + Pod>(value: T) -> Self {
        let mut bytes = [0u8; 8];
        let raw = bytemuck::bytes_of(&value);
        bytes[..raw.len()].copy_from_slice(raw);
        Self { dtype: T::DTYPE.base(), bytes }
    }

    pub fn dtype(&self) -> ScalarDType {
        self.dtype
    }

    /// Read the value back as `T`, or `None` if `T` is not the stored type.
    pub fn get<T: HasDType + Pod>(&self) -> Option<T> {
        if T::DTYPE != DType::Scalar(self.dtype) {
            return None;
        }
        Some(bytemuck::pod_read_unaligned(&self.bytes[..std::mem::size_of::<T>()]))
    }

    /// Widen an integer scalar to `i64` (used for iteration extents).
    pub fn as_i64(&self) -> Option<i64> {
        match self.dtype {
            ScalarDType::Int8 => self.get::<i8>().map(i64::from),
            ScalarDType::Int16 => self.get::<i16>().map(i64::from),
            ScalarDType::Int32 => self.get::<i32>().map(i64::from),
            ScalarDType::Int64 => self.get::<i64>(),
            ScalarDType::UInt8 => self.get::<u8>().map(i64::from),
            ScalarDType::UInt16 => self.get::<u16>().map(i64::from),
            ScalarDType::UInt32 => self.get::<u32>().map(i64::from),
            ScalarDType::UInt64 => self.get::<u64>().and_then(|v| i64::try_from(v).ok()),
            ScalarDType::Bool | ScalarDType::Float32 | ScalarDType::Float64 => None,
        }
    }

    /// The bytes that make up the value (length matches the dtype).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.dtype.bytes()]
    }
}

impl fmt::Debug for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self, self.dtype.name())
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dtype {
            ScalarDType::Bool => write!(f, "{}", self.bytes[0] != 0),
            ScalarDType::Float32 => write!(f, "{}", bytemuck::pod_read_unaligned::<f32>(&self.bytes[..4])),
            ScalarDType::Float64 => write!(f, "{}", bytemuck::pod_read_unaligned::<f64>(&self.bytes)),
            _ => match self.as_i64() {
                Some(v) => write!(f, "{v}"),
                None => write!(f, "{}", bytemuck::pod_read_unaligned::<u64>(&self.bytes)),
            },
        }
    }
}

macro_rules! impl_scalar_types {
    ($($ty:ty => $dtype:expr),* $(,)?) => {
        $(
            impl HasDType for $ty {
                const DTYPE: DType = $dtype;
            }

            impl From<$ty> for ScalarValue {
                fn from(value: $ty) -> Self {
                    Self::new(value)
                }
            }
        )*
    };
}

impl_scalar_types! {
    i8 => DType::Int8, i16 => DType::Int16, i32 => DType::Int32, i64 => DType::Int64,
    u8 => DType::UInt8, u16 => DType::UInt16, u32 => DType::UInt32, u64 => DType::UInt64,
    f32 => DType::Float32, f64 => DType::Float64,
}

impl HasDType for bool {
    const DTYPE: DType = DType::Bool;
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        let mut bytes = [0u8; 8];
        bytes[0] = value as u8;
        Self { dtype: ScalarDType::Bool, bytes }
    }
}
