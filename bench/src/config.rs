//! Benchmark configuration.
//!
//! Settings come from dotted properties (`benchmark.streamin=false`), given
//! either on the command line or through the environment, where a property
//! maps to its upper-cased, underscore-separated name (`BENCHMARK_STREAMIN`).

use std::collections::HashMap;
use std::str::FromStr;

use bon::bon;

use crate::error::{InvalidPropertySnafu, Result};

/// Largest accepted ULP distance between device and host results.
pub const MAX_ULP: f32 = 1000.0;

/// Property lookup: explicit entries first, then the environment.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    entries: HashMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect `-Dkey=value` and `key=value` arguments. Anything else is
    /// ignored.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut properties = Self::new();
        for arg in args {
            let arg = arg.as_ref();
            let arg = arg.strip_prefix("-D").unwrap_or(arg);
            if let Some((key, value)) = arg.split_once('=')
                && !key.is_empty()
            {
                properties.set(key, value);
            }
        }
        properties
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned().or_else(|| std::env::var(Self::env_name(key)).ok())
    }

    /// `true` only for a case-insensitive `"true"`.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).map_or(default, |value| value.trim().eq_ignore_ascii_case("true"))
    }

    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            Some(value) => match value.trim().parse() {
                Ok(parsed) => Ok(Some(parsed)),
                Err(_) => InvalidPropertySnafu { key, value }.fail(),
            },
            None => Ok(None),
        }
    }

    fn env_name(key: &str) -> String {
        key.replace('.', "_").to_uppercase()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkConfig {
    /// Transfer inputs on every run; when unset they are copied only when
    /// stale.
    pub stream_in: bool,
    /// Transfer the output after every run.
    pub stream_out: bool,
    /// Allocate and compile before the timed runs.
    pub warmup: bool,
    /// Device identity used in the summary line.
    pub device_name: Option<String>,
    /// Device to run on, e.g. `CPU` or `CUDA:0`.
    pub backend: String,
    pub iterations: usize,
    pub max_ulp: f32,
    pub m: usize,
    pub n: usize,
}

#[bon]
impl BenchmarkConfig {
    #[builder]
    pub fn new(
        #[builder(default = true)] stream_in: bool,
        #[builder(default = true)] stream_out: bool,
        #[builder(default = true)] warmup: bool,
        #[builder(into)] device_name: Option<String>,
        #[builder(into, default = String::from("CPU"))] backend: String,
        #[builder(default = 100)] iterations: usize,
        #[builder(default = MAX_ULP)] max_ulp: f32,
        #[builder(default = 64)] m: usize,
        #[builder(default = 64)] n: usize,
    ) -> Self {
        Self { stream_in, stream_out, warmup, device_name, backend, iterations, max_ulp, m, n }
    }

    /// Read every setting from `properties`, falling back to defaults.
    ///
    /// # Properties
    ///
    /// * `benchmark.streamin`, `benchmark.streamout`, `benchmark.warmup` (default: true)
    /// * `benchmark.device` - name printed in the summary
    /// * `benchmark.backend` - device to run on (default: CPU)
    /// * `benchmark.iterations` (default: 100)
    /// * `benchmark.maxulp` (default: 1000)
    /// * `benchmark.m`, `benchmark.n` - problem size (default: 64)
    pub fn from_properties(properties: &Properties) -> Result<Self> {
        Ok(Self::builder()
            .stream_in(properties.get_bool("benchmark.streamin", true))
            .stream_out(properties.get_bool("benchmark.streamout", true))
            .warmup(properties.get_bool("benchmark.warmup", true))
            .maybe_device_name(properties.get("benchmark.device"))
            .maybe_backend(properties.get("benchmark.backend"))
            .maybe_iterations(properties.get_parsed("benchmark.iterations")?)
            .maybe_max_ulp(properties.get_parsed("benchmark.maxulp")?)
            .maybe_m(properties.get_parsed("benchmark.m")?)
            .maybe_n(properties.get_parsed("benchmark.n")?)
            .build())
    }

    /// Configuration from environment variables only.
    pub fn from_env() -> Result<Self> {
        Self::from_properties(&Properties::new())
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
