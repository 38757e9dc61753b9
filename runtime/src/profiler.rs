//! Per-graph profiling log.
//!
//! Every executed node appends one sample. Samples accumulate across runs
//! until cleared, so a dump after N executions holds N samples per node.

use std::fmt::Write;
use std::time::Duration;

use crate::node::NodeKind;

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSample {
    /// Fully qualified node name, `<graph>.<node>`.
    pub node: String,
    pub kind: NodeKind,
    /// Execution this sample belongs to, starting at 1.
    pub run: u64,
    /// Time from the start of the run until the node was submitted.
    pub submit_offset: Duration,
    /// Time spent in the device call (transfer or launch).
    pub device_time: Duration,
    /// Node time including allocation and compilation.
    pub total_time: Duration,
    /// Bytes moved by transfer nodes.
    pub bytes: usize,
}

#[derive(Debug, Default)]
pub struct Profiler {
    samples: Vec<ProfileSample>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sample: ProfileSample) {
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[ProfileSample] {
        &self.samples
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Total device time per node kind.
    pub fn device_time(&self, kind: NodeKind) -> Duration {
        self.samples.iter().filter(|s| s.kind == kind).map(|s| s.device_time).sum()
    }

    /// Render samples as a table.
    pub fn dump(&self, graph: &str) -> String {
        let mut out = format!("profile for '{graph}' ({} samples)\n", self.samples.len());
        let _ = writeln!(out, "{:>4}  {:<32} {:<10} {:>12} {:>12} {:>12} {:>10}", "run", "node", "kind", "submit_us", "device_us", "total_us", "bytes");
        for s in &self.samples {
            let _ = writeln!(
                out,
                "{:>4}  {:<32} {:<10} {:>12.3} {:>12.3} {:>12.3} {:>10}",
                s.run,
                s.node,
                s.kind.as_ref(),
                s.submit_offset.as_secs_f64() * 1e6,
                s.device_time.as_secs_f64() * 1e6,
                s.total_time.as_secs_f64() * 1e6,
                s.bytes
            );
        }
        out
    }
}
