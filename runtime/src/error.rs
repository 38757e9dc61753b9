//! Error types for graph construction and execution.
//!
//! Errors raised while running a node name it as `<graph>.<node>`.

use snafu::Snafu;
use tessera_device::HostBufferId;

/// Result type for runtime operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// A node reads a buffer that no earlier node made available.
    #[snafu(display("{node}: buffer {buffer} is not bound in this graph"))]
    UnboundBuffer { node: String, buffer: HostBufferId },

    /// Task arguments do not match the kernel parameters.
    #[snafu(display("{node}: {reason}"))]
    InvalidTask { node: String, reason: String },

    /// Replacement buffer rejected by `update_reference`.
    #[snafu(display("{graph}: {source}"))]
    IncompatibleReference { graph: String, source: tessera_device::Error },

    #[snafu(display("{node}: out of device memory: {source}"))]
    DeviceOutOfMemory { node: String, source: tessera_device::Error },

    #[snafu(display("{node}: compilation failed: {source}"))]
    Compilation { node: String, source: tessera_device::Error },

    #[snafu(display("{node}: launch failed: {source}"))]
    LaunchFailure { node: String, source: tessera_device::Error },

    #[snafu(display("{node}: transfer failed: {source}"))]
    TransferFailure { node: String, source: tessera_device::Error },

    /// Operation on a graph after `dispose`.
    #[snafu(display("graph '{graph}' has been disposed"))]
    GraphDisposed { graph: String },

    /// No context factory for the requested device.
    #[snafu(display("unsupported device: {device}"))]
    UnsupportedDevice { device: String },

    /// Device errors outside node execution.
    #[snafu(display("device error: {source}"))]
    Device { source: tessera_device::Error },
}
