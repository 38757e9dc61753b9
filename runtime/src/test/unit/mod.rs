pub mod graph;
pub mod resize;

use std::sync::Arc;

use tessera_device::{CpuCompiler, CpuDevice, Extent, IterationSpace, Kernel, Param};

use crate::DeviceContext;

/// Context over a fresh CPU device, returning the concrete device too.
pub fn cpu_context() -> (Arc<CpuDevice>, Arc<DeviceContext>) {
    let device = Arc::new(CpuDevice::default());
    let context = Arc::new(DeviceContext::new(device.clone(), Arc::new(CpuCompiler)));
    (device, context)
}

/// `a[i] = 1`
pub fn fill_ones() -> Arc<Kernel> {
    Kernel::new("fill_ones", [Param::output::<f32>()], IterationSpace::new_1d(Extent::Length(0)), |item, args| {
        args.buffer_mut::<f32>(0)?[item.x()] = 1.0;
        Ok(())
    })
}

/// `b[i] = a[i] + c`
pub fn add_scalar() -> Arc<Kernel> {
    Kernel::new(
        "add_scalar",
        [Param::input::<f32>(), Param::output::<f32>(), Param::scalar::<f32>()],
        IterationSpace::new_1d(Extent::Length(0)),
        |item, args| {
            let value = args.buffer::<f32>(0)?[item.x()] + args.scalar::<f32>(2)?;
            args.buffer_mut::<f32>(1)?[item.x()] = value;
            Ok(())
        },
    )
}

/// `x[i] *= factor`
pub fn scale() -> Arc<Kernel> {
    Kernel::new(
        "scale",
        [Param::inout::<f32>(), Param::scalar::<f32>()],
        IterationSpace::new_1d(Extent::Length(0)),
        |item, args| {
            let factor = args.scalar::<f32>(1)?;
            args.buffer_mut::<f32>(0)?[item.x()] *= factor;
            Ok(())
        },
    )
}
