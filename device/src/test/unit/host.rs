use crate::{AnyHostBuffer, HostBuffer};
use tessera_dtype::DType;

#[test]
fn test_clone_shares_identity_and_data() {
    let a = HostBuffer::new(vec![1.0f32, 2.0, 3.0]);
    let b = a.clone();
    assert_eq!(a.id(), b.id());
    assert!(a.ptr_eq(&b));

    b.write()[1] = 5.0;
    assert_eq!(a.to_vec(), vec![1.0, 5.0, 3.0]);
}

#[test]
fn test_distinct_buffers_have_distinct_ids() {
    let a = HostBuffer::<f32>::zeroed(4);
    let b = HostBuffer::<f32>::zeroed(4);
    assert_ne!(a.id(), b.id());
    assert!(!a.ptr_eq(&b));
}

#[test]
fn test_write_bumps_version() {
    let buffer = HostBuffer::filled(8, 1i32);
    let before = buffer.version();
    let _ = buffer.read();
    assert_eq!(buffer.version(), before);

    buffer.write()[0] = 2;
    assert_eq!(buffer.version(), before + 1);
}

#[test]
fn test_erased_view() {
    let buffer = HostBuffer::new(vec![1.5f64, 2.5]);
    let erased = buffer.erase();
    assert_eq!(erased.id(), buffer.id());
    assert_eq!(erased.dtype(), DType::Float64);
    assert_eq!(erased.len(), 2);
    assert_eq!(erased.byte_len(), 16);

    let mut seen = Vec::new();
    erased.with_bytes(&mut |bytes: &[u8]| seen.extend_from_slice(bytes));
    assert_eq!(seen, bytemuck::cast_slice::<f64, u8>(&[1.5, 2.5]));

    let version = erased.with_bytes_mut(&mut |bytes: &mut [u8]| bytes.copy_from_slice(bytemuck::cast_slice(&[3.0f64, 4.0])));
    assert_eq!(version, buffer.version());
    assert_eq!(buffer.to_vec(), vec![3.0, 4.0]);
}
