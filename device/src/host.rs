//! Host-side arrays shared between the caller and task graphs.
//!
//! A [`HostBuffer`] is a reference-counted array with an identity. Cloning it
//! shares both the data and the identity, so a graph that was handed a clone
//! observes every write the caller makes through the original. Each write
//! access bumps a version counter, which is how the buffer manager decides
//! whether device memory is stale.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytemuck::Pod;
use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tessera_dtype::{DType, HasDType};

/// Element types that can live in a host buffer and be copied byte-wise to a
/// device.
pub trait Element: HasDType + Pod + Send + Sync + fmt::Debug {}

impl<T: HasDType + Pod + Send + Sync + fmt::Debug> Element for T {}

/// Process-unique identity of a host buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostBufferId(u64);

impl HostBufferId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HostBufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct HostData<T> {
    id: HostBufferId,
    data: RwLock<Box<[T]>>,
    version: AtomicU64,
}

/// Fixed-length host array with shared identity.
pub struct HostBuffer<T: Element> {
    inner: Arc<HostData<T>>,
}

impl<T: Element> HostBuffer<T> {
    pub fn new(data: Vec<T>) -> Self {
        let inner =
            HostData { id: HostBufferId::next(), data: RwLock::new(data.into_boxed_slice()), version: AtomicU64::new(0) };
        Self { inner: Arc::new(inner) }
    }

    pub fn zeroed(len: usize) -> Self {
        Self::new(vec![T::zeroed(); len])
    }

    pub fn filled(len: usize, value: T) -> Self {
        Self::new(vec![value; len])
    }

    pub fn id(&self) -> HostBufferId {
        self.inner.id
    }

    pub fn len(&self) -> usize {
        self.inner.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Content version, bumped on every write access.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    pub fn read(&self) -> MappedRwLockReadGuard<'_, [T]> {
        RwLockReadGuard::map(self.inner.data.read(), |data| &data[..])
    }

    /// Exclusive access to the elements. Marks the buffer as modified.
    pub fn write(&self) -> MappedRwLockWriteGuard<'_, [T]> {
        let guard = self.inner.data.write();
        self.inner.version.fetch_add(1, Ordering::AcqRel);
        RwLockWriteGuard::map(guard, |data| &mut data[..])
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.read().to_vec()
    }

    /// True if both handles refer to the same buffer.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Type-erased handle sharing this buffer's identity.
    pub fn erase(&self) -> Arc<dyn AnyHostBuffer> {
        self.inner.clone()
    }
}

impl<T: Element> Clone for HostBuffer<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T: Element> From<Vec<T>> for HostBuffer<T> {
    fn from(data: Vec<T>) -> Self {
        Self::new(data)
    }
}

impl<T: Element> fmt::Debug for HostBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBuffer")
            .field("id", &self.inner.id)
            .field("dtype", &T::DTYPE)
            .field("len", &self.len())
            .finish()
    }
}

/// Anything that can hand out a type-erased host buffer handle.
pub trait AsHostBuffer {
    fn host_buffer(&self) -> Arc<dyn AnyHostBuffer>;
}

impl<T: Element> AsHostBuffer for HostBuffer<T> {
    fn host_buffer(&self) -> Arc<dyn AnyHostBuffer> {
        self.erase()
    }
}

impl AsHostBuffer for Arc<dyn AnyHostBuffer> {
    fn host_buffer(&self) -> Arc<dyn AnyHostBuffer> {
        Arc::clone(self)
    }
}

/// Type-erased view of a host buffer used inside graphs.
pub trait AnyHostBuffer: Send + Sync + fmt::Debug {
    fn id(&self) -> HostBufferId;

    fn dtype(&self) -> DType;

    fn len(&self) -> usize;

    fn byte_len(&self) -> usize {
        self.len() * self.dtype().bytes()
    }

    fn version(&self) -> u64;

    /// Run `f` over the raw bytes under a shared lock.
    fn with_bytes(&self, f: &mut dyn FnMut(&[u8]));

    /// Run `f` over the raw bytes under an exclusive lock. Returns the version
    /// the buffer has after the write.
    fn with_bytes_mut(&self, f: &mut dyn FnMut(&mut [u8])) -> u64;
}

impl<T: Element> AnyHostBuffer for HostData<T> {
    fn id(&self) -> HostBufferId {
        self.id
    }

    fn dtype(&self) -> DType {
        T::DTYPE
    }

    fn len(&self) -> usize {
        self.data.read().len()
    }

    fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    fn with_bytes(&self, f: &mut dyn FnMut(&[u8])) {
        let data = self.data.read();
        f(bytemuck::cast_slice(&data[..]));
    }

    fn with_bytes_mut(&self, f: &mut dyn FnMut(&mut [u8])) -> u64 {
        let mut data = self.data.write();
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        f(bytemuck::cast_slice_mut(&mut data[..]));
        version
    }
}

impl<T: Element> fmt::Debug for HostData<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBuffer").field("id", &self.id).field("dtype", &T::DTYPE).finish()
    }
}
