//! Matrix-vector benchmark: `y = A x` with an identity-biased `A`.

use std::sync::Arc;

use rand::Rng;
use snafu::{OptionExt, ResultExt};
use tessera_collections::find_ulp_distance;
use tessera_device::{HostBuffer, Kernel};
use tessera_runtime::{DeviceContext, DeviceContextRegistry, TaskGraph, args};
use tracing::debug;

use crate::config::BenchmarkConfig;
use crate::driver::BenchmarkDriver;
use crate::error::{InvalidPropertySnafu, NotSetUpSnafu, Result, RuntimeSnafu};
use crate::linalg;

struct SgemvData {
    a: HostBuffer<f32>,
    x: HostBuffer<f32>,
    y: HostBuffer<f32>,
    graph: TaskGraph,
}

pub struct Sgemv {
    config: BenchmarkConfig,
    context: Arc<DeviceContext>,
    kernel: Arc<Kernel>,
    data: Option<SgemvData>,
}

impl Sgemv {
    pub fn new(config: BenchmarkConfig, context: Arc<DeviceContext>) -> Self {
        Self { config, context, kernel: linalg::sgemv_kernel(), data: None }
    }

    /// Resolve the configured backend through `registry`.
    pub fn from_registry(config: BenchmarkConfig, registry: &DeviceContextRegistry) -> Result<Self> {
        let context = registry.get_device(&config.backend).context(RuntimeSnafu)?;
        Ok(Self::new(config, context))
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    pub fn graph(&self) -> Option<&TaskGraph> {
        self.data.as_ref().map(|data| &data.graph)
    }

    /// Current content of the output vector.
    pub fn output(&self) -> Option<Vec<f32>> {
        self.data.as_ref().map(|data| data.y.to_vec())
    }

    fn data(&mut self) -> Result<&mut SgemvData> {
        self.data.as_mut().context(NotSetUpSnafu { benchmark: "sgemv" })
    }

    fn build_graph(
        &self,
        (m, n): (i32, i32),
        a: &HostBuffer<f32>,
        x: &HostBuffer<f32>,
        y: &HostBuffer<f32>,
    ) -> tessera_runtime::Result<TaskGraph> {
        let mut graph = TaskGraph::new("benchmark", Arc::clone(&self.context));
        if self.config.stream_in {
            graph.stream_in(&[a, x])?;
        } else {
            graph.copy_in(&[a, x])?;
        }
        graph.task("sgemv", &self.kernel, args![m, n, a, x, y])?;
        if self.config.stream_out {
            graph.stream_out(&[y])?;
        }
        if self.config.warmup {
            graph.warmup()?;
        }
        Ok(graph)
    }
}

/// Problem dimension as the `i32` kernel scalar.
fn kernel_extent(key: &str, value: usize) -> Result<i32> {
    i32::try_from(value).ok().context(InvalidPropertySnafu { key, value: value.to_string() })
}

impl BenchmarkDriver for Sgemv {
    fn set_up(&mut self) -> Result<()> {
        let (m, n) = (self.config.m, self.config.n);
        let dims = (kernel_extent("benchmark.m", m)?, kernel_extent("benchmark.n", n)?);
        let mut a = vec![0.0f32; m * n];
        for i in 0..m.min(n) {
            a[i * (n + 1)] = 1.0;
        }
        let mut rng = rand::thread_rng();
        let x: Vec<f32> = (0..n).map(|_| rng.gen_range(0.0..1.0)).collect();

        let (a, x, y) = (HostBuffer::new(a), HostBuffer::new(x), HostBuffer::<f32>::zeroed(m));
        let graph = self.build_graph(dims, &a, &x, &y).context(RuntimeSnafu)?;
        debug!(m, n, stream_in = self.config.stream_in, stream_out = self.config.stream_out, "sgemv set up");
        self.data = Some(SgemvData { a, x, y, graph });
        Ok(())
    }

    fn code(&mut self) -> Result<()> {
        self.data()?.graph.execute().context(RuntimeSnafu)?;
        Ok(())
    }

    fn validate(&mut self) -> Result<bool> {
        let (m, n, max_ulp) = (self.config.m, self.config.n, self.config.max_ulp);
        let data = self.data()?;
        data.graph.execute().context(RuntimeSnafu)?;
        data.graph.sync_objects(&[&data.y]).context(RuntimeSnafu)?;
        data.graph.clear_profiles().context(RuntimeSnafu)?;

        let mut expected = vec![0.0f32; m];
        linalg::sgemv(m, n, &data.a.read(), &data.x.read(), &mut expected);
        let ulp = find_ulp_distance(&data.y.read(), &expected);
        debug!(ulp, max_ulp, "sgemv validated");
        Ok(ulp < max_ulp)
    }

    fn tear_down(&mut self) -> Result<()> {
        if let Some(mut data) = self.data.take() {
            data.graph.dump_profiles().context(RuntimeSnafu)?;
            data.graph.dispose();
        }
        self.context.device().reset().map_err(|source| tessera_runtime::Error::Device { source }).context(RuntimeSnafu)?;
        Ok(())
    }

    fn device_name(&self) -> String {
        self.config.device_name.clone().unwrap_or_else(|| self.context.spec().canonicalize())
    }
}
