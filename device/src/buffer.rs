use std::sync::Arc;

use bytemuck::Pod;
use parking_lot::MutexGuard;
use snafu::{OptionExt, ensure};
use tessera_dtype::DType;

use crate::allocator::{Allocator, BufferOptions, RawBuffer};
use crate::error::{NotAllocatedSnafu, Result, SizeMismatchSnafu, TypeMismatchSnafu};
use crate::host::Element;

/// Device-resident storage for one host buffer.
///
/// Memory goes back to the allocator on [`release`](Self::release) or drop,
/// whichever comes first.
#[derive(Debug)]
pub struct DeviceAllocation {
    raw: Option<RawBuffer>,
    allocator: Arc<dyn Allocator>,
    dtype: DType,
    len: usize,
}

impl DeviceAllocation {
    pub fn allocate(allocator: Arc<dyn Allocator>, dtype: DType, len: usize) -> Result<Self> {
        let raw = allocator.alloc(dtype.bytes() * len, &BufferOptions { zero_init: true })?;
        Ok(Self { raw: Some(raw), allocator, dtype, len })
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.dtype.bytes() * self.len
    }

    pub fn is_allocated(&self) -> bool {
        self.raw.is_some()
    }

    pub fn raw(&self) -> Result<&RawBuffer> {
        self.raw.as_ref().context(NotAllocatedSnafu)
    }

    /// Return the memory to the allocator. Calling it again is a no-op.
    pub fn release(&mut self) {
        if let Some(raw) = self.raw.take() {
            self.allocator.free(raw);
        }
    }

    /// Copy host bytes into the allocation.
    pub fn copy_in(&self, src: &[u8]) -> Result<()> {
        ensure!(src.len() == self.size(), SizeMismatchSnafu { expected: self.size(), actual: src.len() });

        match self.raw()? {
            RawBuffer::Cpu { data, size } => {
                let mut words = data.lock();
                bytemuck::cast_slice_mut::<u64, u8>(&mut words[..])[..*size].copy_from_slice(src);
            }
        }
        Ok(())
    }

    /// Copy the allocation into host bytes.
    pub fn copy_out(&self, dst: &mut [u8]) -> Result<()> {
        ensure!(dst.len() == self.size(), SizeMismatchSnafu { expected: self.size(), actual: dst.len() });

        match self.raw()? {
            RawBuffer::Cpu { data, size } => {
                let words = data.lock();
                dst.copy_from_slice(&bytemuck::cast_slice::<u64, u8>(&words[..])[..*size]);
            }
        }
        Ok(())
    }

    /// Read the contents as typed elements.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        ensure!(T::DTYPE == self.dtype, TypeMismatchSnafu { expected: self.dtype, actual: T::DTYPE });
        let mut out = vec![T::zeroed(); self.len];
        self.copy_out(bytemuck::cast_slice_mut(&mut out))?;
        Ok(out)
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Box<[u64]>>> {
        match self.raw()? {
            RawBuffer::Cpu { data, .. } => Ok(data.lock()),
        }
    }

    /// Identity of the underlying memory, used to detect aliasing arguments.
    pub(crate) fn raw_addr(&self) -> usize {
        self.raw.as_ref().map_or(0, |raw| raw as *const RawBuffer as usize)
    }
}

impl Drop for DeviceAllocation {
    fn drop(&mut self) {
        self.release();
    }
}

/// Typed view over locked CPU words.
pub(crate) fn view<T: Pod>(words: &[u64], len: usize) -> &[T] {
    let bytes = &bytemuck::cast_slice::<u64, u8>(words)[..len * std::mem::size_of::<T>()];
    bytemuck::cast_slice(bytes)
}

pub(crate) fn view_mut<T: Pod>(words: &mut [u64], len: usize) -> &mut [T] {
    let bytes = &mut bytemuck::cast_slice_mut::<u64, u8>(words)[..len * std::mem::size_of::<T>()];
    bytemuck::cast_slice_mut(bytes)
}
