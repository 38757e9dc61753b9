use std::fmt;

use snafu::ensure;

use crate::error::{OutOfBoundsSnafu, Result, SizeMismatchSnafu};
use crate::{FloatingPointError, PrimitiveStorage, VectorFloat};

/// Dense `rows x cols` matrix of `f32` in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixFloat {
    rows: usize,
    cols: usize,
    storage: Vec<f32>,
}

impl MatrixFloat {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols, storage: vec![0.0; rows * cols] }
    }

    pub fn from_vec(rows: usize, cols: usize, storage: Vec<f32>) -> Result<Self> {
        ensure!(storage.len() == rows * cols, SizeMismatchSnafu { expected: rows * cols, actual: storage.len() });
        Ok(Self { rows, cols, storage })
    }

    /// Square matrix with ones on the diagonal.
    pub fn identity(n: usize) -> Self {
        let mut matrix = Self::new(n, n);
        for i in 0..n {
            matrix.storage[i * (n + 1)] = 1.0;
        }
        matrix
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    fn to_index(&self, i: usize, j: usize) -> usize {
        j + i * self.cols
    }

    fn check(&self, i: usize, j: usize) -> Result<()> {
        ensure!(i < self.rows && j < self.cols, OutOfBoundsSnafu { row: i, col: j, rows: self.rows, cols: self.cols });
        Ok(())
    }

    pub fn get(&self, i: usize, j: usize) -> Result<f32> {
        self.check(i, j)?;
        Ok(self.storage[self.to_index(i, j)])
    }

    pub fn set(&mut self, i: usize, j: usize, value: f32) -> Result<()> {
        self.check(i, j)?;
        let index = self.to_index(i, j);
        self.storage[index] = value;
        Ok(())
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.storage[i * self.cols..(i + 1) * self.cols]
    }

    pub fn column(&self, j: usize) -> VectorFloat {
        (0..self.rows).map(|i| self.storage[self.to_index(i, j)]).collect::<Vec<_>>().into()
    }

    pub fn transpose(&self) -> Self {
        let mut out = Self::new(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                out.storage[i + j * self.rows] = self.storage[self.to_index(i, j)];
            }
        }
        out
    }

    /// `self * x` for a vector of length `cols`.
    pub fn multiply_vector(&self, x: &VectorFloat) -> Result<VectorFloat> {
        ensure!(x.len() == self.cols, SizeMismatchSnafu { expected: self.cols, actual: x.len() });
        let y: Vec<f32> =
            (0..self.rows).map(|i| self.row(i).iter().zip(x.as_slice()).map(|(a, b)| a * b).sum()).collect();
        Ok(y.into())
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.storage
    }

    /// Element-wise ULP error, or [`FloatingPointError::MISMATCH`] if the
    /// shapes differ.
    pub fn calculate_ulp(&self, reference: &Self) -> FloatingPointError {
        if self.rows != reference.rows || self.cols != reference.cols {
            return FloatingPointError::MISMATCH;
        }
        FloatingPointError::compare(&self.storage, &reference.storage)
    }
}

impl PrimitiveStorage for MatrixFloat {
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

impl fmt::Display for MatrixFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.rows {
            if i > 0 {
                writeln!(f)?;
            }
            for (j, v) in self.row(i).iter().enumerate() {
                if j > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{v:.3}")?;
            }
        }
        Ok(())
    }
}
