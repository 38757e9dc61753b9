//! `tessera-bench [-Dkey=value ...]`
//!
//! Runs the sgemv benchmark and prints its summary line.

use std::process::ExitCode;

use tessera_bench::{BenchmarkConfig, BenchmarkRunner, Properties, Sgemv};
use tessera_runtime::DeviceContextRegistry;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tessera=info,warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();
}

fn run() -> tessera_bench::Result<()> {
    let properties = Properties::from_args(std::env::args().skip(1));
    let config = BenchmarkConfig::from_properties(&properties)?;
    let registry = DeviceContextRegistry::new();

    let runner = BenchmarkRunner::new(config.iterations);
    let mut benchmark = Sgemv::from_registry(config, &registry)?;
    let summary = runner.run(&mut benchmark)?;
    println!("{summary}");
    Ok(())
}

fn main() -> ExitCode {
    setup_logging();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "benchmark failed");
            ExitCode::FAILURE
        }
    }
}
