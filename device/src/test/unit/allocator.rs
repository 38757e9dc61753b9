use crate::{Allocator, BufferOptions, CachingAllocator, CpuAllocator, Error};

#[test]
fn test_cpu_allocator_is_zeroed() {
    let allocator = CpuAllocator::new();
    let raw = allocator.alloc(13, &BufferOptions::default()).unwrap();
    assert_eq!(raw.size(), 13);
    assert_eq!(allocator.used(), 13);
    allocator.free(raw);
    assert_eq!(allocator.used(), 0);
}

#[test]
fn test_cpu_allocator_capacity() {
    let allocator = CpuAllocator::with_capacity(100);
    let first = allocator.alloc(60, &BufferOptions::default()).unwrap();

    let err = allocator.alloc(60, &BufferOptions::default()).unwrap_err();
    assert!(matches!(err, Error::OutOfMemory { requested: 60, available: 40 }), "{err}");

    allocator.free(first);
    assert!(allocator.alloc(60, &BufferOptions::default()).is_ok());
}

#[test]
fn test_caching_allocator_reuses_blocks() {
    let allocator = CachingAllocator::new(CpuAllocator::new());
    let raw = allocator.alloc(64, &BufferOptions::default()).unwrap();
    allocator.free(raw);
    assert_eq!(allocator.cached(), 1);
    assert_eq!(allocator.inner().used(), 64);

    let _reused = allocator.alloc(64, &BufferOptions::default()).unwrap();
    assert_eq!(allocator.cached(), 0);
    assert_eq!(allocator.inner().used(), 64);
}

#[test]
fn test_caching_allocator_trims_and_retries() {
    let allocator = CachingAllocator::new(CpuAllocator::with_capacity(100));
    let raw = allocator.alloc(80, &BufferOptions::default()).unwrap();
    allocator.free(raw);

    // 80 cached bytes leave no room for 50 until the cache is released.
    let raw = allocator.alloc(50, &BufferOptions::default()).unwrap();
    assert_eq!(raw.size(), 50);
    assert_eq!(allocator.cached(), 0);
    assert_eq!(allocator.inner().used(), 50);
}

#[test]
fn test_caching_allocator_reports_oom_after_retry() {
    let allocator = CachingAllocator::new(CpuAllocator::with_capacity(10));
    let err = allocator.alloc(11, &BufferOptions::default()).unwrap_err();
    assert!(matches!(err, Error::OutOfMemory { requested: 11, .. }));
}
