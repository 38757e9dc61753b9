use std::fmt;

use crate::{Float4, FloatingPointError, PrimitiveStorage};

/// Growable-at-construction vector of `f32`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VectorFloat {
    storage: Vec<f32>,
}

impl VectorFloat {
    pub fn new(len: usize) -> Self {
        Self { storage: vec![0.0; len] }
    }

    pub fn from_vec(storage: Vec<f32>) -> Self {
        Self { storage }
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn get(&self, i: usize) -> f32 {
        self.storage[i]
    }

    pub fn set(&mut self, i: usize, value: f32) {
        self.storage[i] = value;
    }

    /// Four elements starting at `4 * i`.
    pub fn get_float4(&self, i: usize) -> Float4 {
        Float4::load_from_slice(&self.storage, i * Float4::LANES)
    }

    pub fn sum(&self) -> f32 {
        self.storage.iter().sum()
    }

    pub fn dot(&self, other: &Self) -> f32 {
        self.storage.iter().zip(&other.storage).map(|(a, b)| a * b).sum()
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.storage
    }

    /// Element-wise ULP error, or [`FloatingPointError::MISMATCH`] if the
    /// lengths differ.
    pub fn calculate_ulp(&self, reference: &Self) -> FloatingPointError {
        FloatingPointError::compare(&self.storage, &reference.storage)
    }
}

impl From<Vec<f32>> for VectorFloat {
    fn from(storage: Vec<f32>) -> Self {
        Self { storage }
    }
}

impl PrimitiveStorage for VectorFloat {
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

impl fmt::Display for VectorFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, v) in self.storage.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v:.3}")?;
        }
        f.write_str("]")
    }
}
