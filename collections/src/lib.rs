//! Numeric containers used by kernels and by result validation.
//!
//! The containers are plain host data: flat row-major `f32` storage with
//! index arithmetic on top. They know nothing about devices; to move one onto
//! a device, hand its storage to a host buffer.
//!
//! Validation compares an accelerated result with a host reference using the
//! distance in units in the last place (see [`ulp`]).

pub mod error;
pub mod float4;
pub mod matrix;
pub mod matrix4x4;
pub mod storage;
pub mod ulp;
pub mod vector;


pub use error::{Error, Result};
pub use float4::Float4;
pub use matrix::MatrixFloat;
pub use matrix4x4::Matrix4x4Float;
pub use storage::PrimitiveStorage;
pub use ulp::{FloatingPointError, find_max_ulp, find_ulp_distance, ulp};
pub use vector::VectorFloat;
