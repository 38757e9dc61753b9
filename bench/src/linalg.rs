//! Single-precision BLAS-style routines over row-major slices.
//!
//! Host versions serve as validation references; the `*_kernel` functions
//! build the equivalent device kernels, one work item per output element.

use std::sync::Arc;

use snafu::OptionExt;
use tessera_device::error::LaunchSnafu;
use tessera_device::{Extent, IterationSpace, Kernel, Param};

/// `y = A x` for an `m x n` matrix `a`.
pub fn sgemv(m: usize, n: usize, a: &[f32], x: &[f32], y: &mut [f32]) {
    for (i, out) in y.iter_mut().enumerate().take(m) {
        *out = a[i * n..(i + 1) * n].iter().zip(x).map(|(a, x)| a * x).sum();
    }
}

/// `y += alpha * x`
pub fn saxpy(alpha: f32, x: &[f32], y: &mut [f32]) {
    for (y, x) in y.iter_mut().zip(x) {
        *y += alpha * x;
    }
}

/// `C = A B` with `a` of `m x k`, `b` of `k x n` and `c` of `m x n`.
pub fn sgemm(m: usize, n: usize, k: usize, a: &[f32], b: &[f32], c: &mut [f32]) {
    for i in 0..m {
        for j in 0..n {
            c[i * n + j] = (0..k).map(|l| a[i * k + l] * b[l * n + j]).sum();
        }
    }
}

fn extent(value: i32) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// Device `sgemv(m, n, a, x, y)`, one work item per row.
pub fn sgemv_kernel() -> Arc<Kernel> {
    Kernel::new(
        "sgemv",
        [
            Param::scalar::<i32>(),
            Param::scalar::<i32>(),
            Param::input::<f32>(),
            Param::input::<f32>(),
            Param::output::<f32>(),
        ],
        IterationSpace::new_1d(Extent::Scalar(0)),
        |item, args| {
            let i = item.x();
            let n = extent(args.scalar::<i32>(1)?);
            let sum = {
                let (a, x) = (args.buffer::<f32>(2)?, args.buffer::<f32>(3)?);
                let row = a.get(i * n..(i + 1) * n).context(LaunchSnafu { kernel: "sgemv", reason: format!("row {i} out of bounds") })?;
                row.iter().zip(x).map(|(a, x)| a * x).sum::<f32>()
            };
            let y = args.buffer_mut::<f32>(4)?;
            *y.get_mut(i).context(LaunchSnafu { kernel: "sgemv", reason: format!("output {i} out of bounds") })? = sum;
            Ok(())
        },
    )
}

/// Device `saxpy(alpha, x, y)` over the length of `x`.
pub fn saxpy_kernel() -> Arc<Kernel> {
    Kernel::new(
        "saxpy",
        [Param::scalar::<f32>(), Param::input::<f32>(), Param::inout::<f32>()],
        IterationSpace::new_1d(Extent::Length(1)),
        |item, args| {
            let i = item.x();
            let value = args.scalar::<f32>(0)? * args.buffer::<f32>(1)?[i];
            let y = args.buffer_mut::<f32>(2)?;
            *y.get_mut(i).context(LaunchSnafu { kernel: "saxpy", reason: format!("output {i} out of bounds") })? += value;
            Ok(())
        },
    )
}

/// Device `sgemm(m, n, k, a, b, c)` over an `n x m` grid.
pub fn sgemm_kernel() -> Arc<Kernel> {
    Kernel::new(
        "sgemm",
        [
            Param::scalar::<i32>(),
            Param::scalar::<i32>(),
            Param::scalar::<i32>(),
            Param::input::<f32>(),
            Param::input::<f32>(),
            Param::output::<f32>(),
        ],
        IterationSpace::new_2d(Extent::Scalar(1), Extent::Scalar(0)),
        |item, args| {
            let (j, i) = (item.x(), item.y());
            let n = extent(args.scalar::<i32>(1)?);
            let k = extent(args.scalar::<i32>(2)?);
            let sum = {
                let (a, b) = (args.buffer::<f32>(3)?, args.buffer::<f32>(4)?);
                ensure_len(a.len(), (i + 1) * k, "a")?;
                ensure_len(b.len(), k * n, "b")?;
                (0..k).map(|l| a[i * k + l] * b[l * n + j]).sum::<f32>()
            };
            let c = args.buffer_mut::<f32>(5)?;
            *c.get_mut(i * n + j).context(LaunchSnafu { kernel: "sgemm", reason: format!("output ({i}, {j}) out of bounds") })? = sum;
            Ok(())
        },
    )
}

fn ensure_len(actual: usize, required: usize, name: &str) -> tessera_device::Result<()> {
    snafu::ensure!(
        actual >= required,
        LaunchSnafu { kernel: "sgemm", reason: format!("{name} has {actual} elements, needs {required}") }
    );
    Ok(())
}
