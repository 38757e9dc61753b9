//! Validation and benchmark harness.
//!
//! A [`BenchmarkDriver`] sets up host data and a task graph, validates one
//! device run against a host reference by ULP distance, and is then timed by
//! [`BenchmarkRunner`] for the configured number of iterations.

pub mod config;
pub mod driver;
pub mod error;
pub mod linalg;
pub mod sgemv;

#[cfg(test)]
pub mod test;

pub use config::{BenchmarkConfig, MAX_ULP, Properties};
pub use driver::{BenchmarkDriver, BenchmarkRunner, BenchmarkSummary};
pub use error::{Error, Result};
pub use sgemv::Sgemv;
