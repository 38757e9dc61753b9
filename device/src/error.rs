use snafu::Snafu;
use tessera_dtype::DType;

use crate::host::HostBufferId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("size mismatch: expected {expected} bytes, got {actual}"))]
    SizeMismatch { expected: usize, actual: usize },

    /// Element type of an argument differs from the declared one.
    #[snafu(display("type mismatch: expected {expected}, got {actual}"))]
    TypeMismatch { expected: DType, actual: DType },

    /// Device memory is exhausted even after the allocation cache was trimmed.
    #[snafu(display("out of device memory: requested {requested} bytes, {available} available"))]
    OutOfMemory { requested: usize, available: usize },

    /// Failed to copy data between host and device.
    #[snafu(display("transfer failed: {reason}"))]
    Transfer { reason: String },

    /// Invalid device specification string.
    #[snafu(display("invalid device: {device}"))]
    InvalidDevice { device: String },

    /// Well-formed device specification without a backend in this build.
    #[snafu(display("unsupported device: {device}"))]
    UnsupportedDevice { device: String },

    /// Device memory was released or never allocated.
    #[snafu(display("buffer not allocated"))]
    NotAllocated,

    /// Host buffer is not bound to any slot.
    #[snafu(display("host buffer {buffer} is not bound"))]
    UnboundBuffer { buffer: HostBufferId },

    /// Replacement buffer cannot take the place of the bound one.
    #[snafu(display("incompatible reference: {reason}"))]
    IncompatibleReference { reason: String },

    /// Kernel could not be turned into an executable program.
    #[snafu(display("failed to compile kernel '{kernel}': {reason}"))]
    Compilation { kernel: String, reason: String },

    /// Kernel launch was rejected or the kernel body failed.
    #[snafu(display("failed to launch kernel '{kernel}': {reason}"))]
    Launch { kernel: String, reason: String },
}
