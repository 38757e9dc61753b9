use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{OutOfMemorySnafu, Result};

/// Opaque handle to device memory.
#[derive(Debug)]
pub enum RawBuffer {
    /// Host memory standing in for device memory. Stored as `u64` words so
    /// typed views of any element up to 8 bytes are aligned.
    Cpu { data: Mutex<Box<[u64]>>, size: usize },
}

impl RawBuffer {
    /// Size of the buffer in bytes.
    pub fn size(&self) -> usize {
        match self {
            RawBuffer::Cpu { size, .. } => *size,
        }
    }
}

/// Options for buffer allocation.
#[derive(Debug, Clone, Default)]
pub struct BufferOptions {
    /// Whether to zero-initialize the buffer.
    pub zero_init: bool,
}

pub trait Allocator: Send + Sync + std::fmt::Debug {
    fn alloc(&self, size: usize, options: &BufferOptions) -> Result<RawBuffer>;

    fn free(&self, _buffer: RawBuffer) {}

    /// Drop cached blocks.
    fn trim(&self) {}

    fn name(&self) -> &str;
}

/// Allocator backed by system memory, optionally capped to emulate a device
/// with a fixed amount of memory.
#[derive(Debug, Default)]
pub struct CpuAllocator {
    capacity: Option<usize>,
    used: AtomicUsize,
}

impl CpuAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity: Some(capacity), used: AtomicUsize::new(0) }
    }

    /// Bytes currently handed out.
    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }
}

impl Allocator for CpuAllocator {
    fn alloc(&self, size: usize, _options: &BufferOptions) -> Result<RawBuffer> {
        if let Some(capacity) = self.capacity {
            let reserved = self.used.fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(size).filter(|&total| total <= capacity)
            });
            if let Err(used) = reserved {
                return OutOfMemorySnafu { requested: size, available: capacity.saturating_sub(used) }.fail();
            }
        } else {
            self.used.fetch_add(size, Ordering::AcqRel);
        }

        // Always zeroed: the words are fresh from the system allocator.
        let words = size.div_ceil(8);
        let data = vec![0u64; words].into_boxed_slice();
        Ok(RawBuffer::Cpu { data: Mutex::new(data), size })
    }

    fn free(&self, buffer: RawBuffer) {
        self.used.fetch_sub(buffer.size(), Ordering::AcqRel);
    }

    fn name(&self) -> &str {
        "CPU"
    }
}

/// Allocator that keeps freed blocks around for reuse by size.
///
/// When the inner allocator runs out of memory, the cache is released back to
/// it and the allocation is retried once.
#[derive(Debug)]
pub struct CachingAllocator<A: Allocator> {
    inner: A,
    cache: Mutex<HashMap<usize, Vec<RawBuffer>>>,
    max_buffers_per_size: usize,
}

impl<A: Allocator> CachingAllocator<A> {
    pub fn new(inner: A) -> Self {
        Self::with_capacity(inner, 32)
    }

    pub fn with_capacity(inner: A, max_buffers_per_size: usize) -> Self {
        Self { inner, cache: Mutex::new(HashMap::new()), max_buffers_per_size }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Number of blocks waiting for reuse.
    pub fn cached(&self) -> usize {
        self.cache.lock().values().map(Vec::len).sum()
    }

    fn zero(buffer: &RawBuffer) {
        match buffer {
            RawBuffer::Cpu { data, .. } => data.lock().fill(0),
        }
    }
}

impl<A: Allocator> Allocator for CachingAllocator<A> {
    fn alloc(&self, size: usize, options: &BufferOptions) -> Result<RawBuffer> {
        let cached = {
            let mut cache = self.cache.lock();
            let buffer = cache.get_mut(&size).and_then(Vec::pop);
            if cache.get(&size).is_some_and(Vec::is_empty) {
                cache.remove(&size);
            }
            buffer
        };
        if let Some(buffer) = cached {
            if options.zero_init {
                Self::zero(&buffer);
            }
            return Ok(buffer);
        }

        match self.inner.alloc(size, options) {
            Ok(buffer) => Ok(buffer),
            Err(e) => {
                debug!(allocator = self.inner.name(), size, "allocation failed, trimming cache and retrying");
                self.trim();
                self.inner.alloc(size, options).map_err(|_| e)
            }
        }
    }

    fn free(&self, buffer: RawBuffer) {
        let mut cache = self.cache.lock();
        let buffers = cache.entry(buffer.size()).or_default();
        if buffers.len() < self.max_buffers_per_size {
            buffers.push(buffer);
        } else {
            drop(cache);
            self.inner.free(buffer);
        }
    }

    fn trim(&self) {
        let drained: Vec<RawBuffer> = self.cache.lock().drain().flat_map(|(_, buffers)| buffers).collect();
        for buffer in drained {
            self.inner.free(buffer);
        }
        self.inner.trim();
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

impl<A: Allocator> Drop for CachingAllocator<A> {
    fn drop(&mut self) {
        self.trim();
    }
}
