use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Source data does not fit the container.
    #[snafu(display("size mismatch: expected {expected} elements, got {actual}"))]
    SizeMismatch { expected: usize, actual: usize },

    /// Row or column index outside the container shape.
    #[snafu(display("index ({row}, {col}) out of bounds for {rows}x{cols} matrix"))]
    OutOfBounds { row: usize, col: usize, rows: usize, cols: usize },
}
