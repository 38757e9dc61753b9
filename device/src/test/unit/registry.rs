use std::sync::Arc;

use test_case::test_case;

use crate::{DeviceRegistry, DeviceSpec, DeviceSpecExt, Error};

#[test_case("CPU", DeviceSpec::Cpu)]
#[test_case("cpu", DeviceSpec::Cpu)]
#[test_case("cuda", DeviceSpec::Cuda { device_id: 0 })]
#[test_case("CUDA:1", DeviceSpec::Cuda { device_id: 1 })]
#[test_case("opencl:0", DeviceSpec::OpenCl { device_id: 0 })]
#[test_case("fpga", DeviceSpec::Fpga { device_id: 0 })]
fn test_parse(input: &str, expected: DeviceSpec) {
    assert_eq!(<DeviceSpec as DeviceSpecExt>::parse(input).unwrap(), expected);
}

#[test_case("TPU")]
#[test_case("cuda:x")]
#[test_case("cpu:1")]
fn test_parse_invalid(input: &str) {
    assert!(matches!(<DeviceSpec as DeviceSpecExt>::parse(input), Err(Error::InvalidDevice { .. })));
}

#[test]
fn test_parse_canonical_roundtrip() {
    for spec in [DeviceSpec::Cpu, DeviceSpec::Cuda { device_id: 3 }, DeviceSpec::OpenCl { device_id: 1 }] {
        assert_eq!(<DeviceSpec as DeviceSpecExt>::parse(&spec.canonicalize()).unwrap(), spec);
    }
}

#[test]
fn test_registry_caches_cpu() {
    let registry = DeviceRegistry::new();
    let first = registry.get(&DeviceSpec::Cpu).unwrap();
    let second = registry.get_device("cpu").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.allocator().name(), "CPU");
}

#[test]
fn test_registry_unsupported_backends() {
    let registry = DeviceRegistry::new();
    let err = registry.get_device("opencl:0").unwrap_err();
    assert!(matches!(err, Error::UnsupportedDevice { ref device } if device == "OPENCL:0"));
}
