//! Benchmark driver protocol and runner.
//!
//! A run is `set_up`, then `validate`, then the timed iterations (only when
//! the result was valid), then `tear_down`. An invalid result is reported in
//! the summary rather than as an error so a batch of runs can continue.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::Result;

pub trait BenchmarkDriver {
    /// Allocate host data and build the graph.
    fn set_up(&mut self) -> Result<()>;

    /// One timed iteration.
    fn code(&mut self) -> Result<()>;

    /// Run once and compare against a host reference.
    fn validate(&mut self) -> Result<bool>;

    /// Flush profiles, release buffers and reset the device.
    fn tear_down(&mut self) -> Result<()>;

    /// Device identity for the summary line.
    fn device_name(&self) -> String;
}

#[derive(Debug, Clone, Copy)]
pub struct BenchmarkRunner {
    iterations: usize,
}

impl BenchmarkRunner {
    pub fn new(iterations: usize) -> Self {
        Self { iterations }
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn run(&self, driver: &mut dyn BenchmarkDriver) -> Result<BenchmarkSummary> {
        if let Err(error) = driver.set_up() {
            warn!(%error, "benchmark set up failed");
            if let Err(teardown) = driver.tear_down() {
                warn!(error = %teardown, "tear down after failed set up failed");
            }
            return Err(error);
        }

        let valid = match driver.validate() {
            Ok(valid) => valid,
            Err(error) => {
                warn!(%error, "validation failed");
                false
            }
        };

        let mut runs = Vec::new();
        if valid {
            runs.reserve(self.iterations);
            for iteration in 0..self.iterations {
                let start = Instant::now();
                if let Err(error) = driver.code() {
                    warn!(iteration, %error, "benchmark iteration failed");
                    driver.tear_down()?;
                    return Err(error);
                }
                runs.push(start.elapsed());
            }
            debug!(iterations = self.iterations, "timed iterations complete");
        } else {
            info!(device = %driver.device_name(), "skipping timed iterations after invalid result");
        }

        driver.tear_down()?;
        Ok(BenchmarkSummary { device: driver.device_name(), valid, runs })
    }
}

/// Outcome of one benchmark run.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkSummary {
    pub device: String,
    pub valid: bool,
    /// Duration of each timed iteration.
    pub runs: Vec<Duration>,
}

impl BenchmarkSummary {
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn elapsed(&self) -> Duration {
        self.runs.iter().sum()
    }

    pub fn elapsed_per_iteration(&self) -> Duration {
        match u32::try_from(self.runs.len()) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(count) => self.elapsed() / count,
        }
    }

    pub fn min(&self) -> Duration {
        self.runs.iter().copied().min().unwrap_or(Duration::ZERO)
    }
}

impl fmt::Display for BenchmarkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            write!(
                f,
                "id={}, elapsed={:.6}, per iteration={:.6}",
                self.device,
                self.elapsed().as_secs_f64(),
                self.elapsed_per_iteration().as_secs_f64()
            )
        } else {
            write!(f, "id={} produced invalid result", self.device)
        }
    }
}
