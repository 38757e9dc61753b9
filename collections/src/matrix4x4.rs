use std::fmt;

use snafu::ensure;

use crate::error::{Result, SizeMismatchSnafu};
use crate::{Float4, FloatingPointError, PrimitiveStorage};

/// Dense 4x4 `f32` matrix in row-major order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Matrix4x4Float {
    storage: [f32; 16],
}

impl Matrix4x4Float {
    pub const ROWS: usize = 4;
    pub const COLUMNS: usize = 4;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_array(storage: [f32; 16]) -> Self {
        Self { storage }
    }

    pub fn from_slice(data: &[f32]) -> Result<Self> {
        ensure!(data.len() == 16, SizeMismatchSnafu { expected: 16usize, actual: data.len() });
        let mut matrix = Self::new();
        matrix.storage.copy_from_slice(data);
        Ok(matrix)
    }

    pub fn identity() -> Self {
        let mut matrix = Self::new();
        for i in 0..Self::ROWS {
            matrix.set(i, i, 1.0);
        }
        matrix
    }

    pub fn rows(&self) -> usize {
        Self::ROWS
    }

    pub fn cols(&self) -> usize {
        Self::COLUMNS
    }

    const fn to_index(i: usize, j: usize) -> usize {
        j + i * Self::COLUMNS
    }

    /// Element at row `i`, column `j`. Panics outside `0..4`.
    pub fn get(&self, i: usize, j: usize) -> f32 {
        assert!(i < Self::ROWS && j < Self::COLUMNS, "index ({i}, {j}) out of bounds for 4x4 matrix");
        self.storage[Self::to_index(i, j)]
    }

    pub fn set(&mut self, i: usize, j: usize, value: f32) {
        assert!(i < Self::ROWS && j < Self::COLUMNS, "index ({i}, {j}) out of bounds for 4x4 matrix");
        self.storage[Self::to_index(i, j)] = value;
    }

    pub fn row(&self, i: usize) -> Float4 {
        Float4::load_from_slice(&self.storage, Self::to_index(i, 0))
    }

    pub fn set_row(&mut self, i: usize, row: Float4) {
        row.store_to_slice(&mut self.storage, Self::to_index(i, 0));
    }

    pub fn column(&self, j: usize) -> Float4 {
        Float4::new(self.get(0, j), self.get(1, j), self.get(2, j), self.get(3, j))
    }

    pub fn diag(&self) -> Float4 {
        Float4::new(self.get(0, 0), self.get(1, 1), self.get(2, 2), self.get(3, 3))
    }

    /// Independent copy of the matrix.
    pub fn duplicate(&self) -> Self {
        *self
    }

    /// Overwrite every element with the contents of `other`.
    pub fn set_from(&mut self, other: &Self) {
        self.storage = other.storage;
    }

    pub fn transpose(&self) -> Self {
        let mut out = Self::new();
        for i in 0..Self::ROWS {
            for j in 0..Self::COLUMNS {
                out.set(j, i, self.get(i, j));
            }
        }
        out
    }

    pub fn multiply(&self, other: &Self) -> Self {
        let mut out = Self::new();
        for i in 0..Self::ROWS {
            let row = self.row(i);
            for j in 0..Self::COLUMNS {
                out.set(i, j, row.dot(&other.column(j)));
            }
        }
        out
    }

    /// Element-wise ULP error of `self` against `reference`.
    pub fn calculate_ulp(&self, reference: &Self) -> FloatingPointError {
        FloatingPointError::compare(&self.storage, &reference.storage)
    }
}

impl PrimitiveStorage for Matrix4x4Float {
    fn size(&self) -> usize {
        self.storage.len()
    }

    fn as_slice(&self) -> &[f32] {
        &self.storage
    }

    fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.storage
    }
}

impl fmt::Display for Matrix4x4Float {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MatrixFloat <{} x {}>", Self::ROWS, Self::COLUMNS)?;
        for i in 0..Self::ROWS {
            let row = self.row(i);
            write!(f, "\n{:.3} {:.3} {:.3} {:.3}", row.x(), row.y(), row.z(), row.w())?;
        }
        Ok(())
    }
}
