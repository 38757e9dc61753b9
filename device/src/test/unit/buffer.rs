use std::sync::Arc;

use crate::{Allocator, CpuAllocator, DeviceAllocation, Error};
use tessera_dtype::DType;

fn allocate(dtype: DType, len: usize) -> (Arc<CpuAllocator>, DeviceAllocation) {
    let allocator = Arc::new(CpuAllocator::new());
    let allocation = DeviceAllocation::allocate(allocator.clone(), dtype, len).unwrap();
    (allocator, allocation)
}

#[test]
fn test_copy_roundtrip() {
    let (_, allocation) = allocate(DType::Float32, 3);
    assert_eq!(allocation.size(), 12);
    assert_eq!(allocation.to_vec::<f32>().unwrap(), vec![0.0; 3]);

    allocation.copy_in(bytemuck::cast_slice(&[1.0f32, 2.0, 3.0])).unwrap();
    assert_eq!(allocation.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0]);
}

#[test]
fn test_copy_size_mismatch() {
    let (_, allocation) = allocate(DType::Int32, 4);
    let err = allocation.copy_in(&[0u8; 12]).unwrap_err();
    assert!(matches!(err, Error::SizeMismatch { expected: 16, actual: 12 }));

    let mut out = [0u8; 20];
    assert!(matches!(allocation.copy_out(&mut out), Err(Error::SizeMismatch { .. })));
}

#[test]
fn test_typed_read_checks_dtype() {
    let (_, allocation) = allocate(DType::Int32, 2);
    assert!(matches!(allocation.to_vec::<f32>(), Err(Error::TypeMismatch { .. })));
}

#[test]
fn test_release_is_idempotent() {
    let (allocator, mut allocation) = allocate(DType::Float64, 8);
    assert_eq!(allocator.used(), 64);

    allocation.release();
    allocation.release();
    assert!(!allocation.is_allocated());
    assert_eq!(allocator.used(), 0);
    assert!(matches!(allocation.copy_in(&[0u8; 64]), Err(Error::NotAllocated)));
    assert_eq!(allocator.name(), "CPU");
}

#[test]
fn test_drop_frees() {
    let (allocator, allocation) = allocate(DType::UInt8, 10);
    drop(allocation);
    assert_eq!(allocator.used(), 0);
}
