use snafu::ensure;

use crate::error::{Result, SizeMismatchSnafu};

/// Flat `f32` storage shared by the containers.
///
/// Buffers move to and from devices through [`as_slice`](Self::as_slice) and
/// [`load_from_slice`](Self::load_from_slice), so the element order here is
/// the order a kernel sees.
pub trait PrimitiveStorage {
    fn size(&self) -> usize;

    fn as_slice(&self) -> &[f32];

    fn as_mut_slice(&mut self) -> &mut [f32];

    /// Overwrite every element from `data`, which must have exactly
    /// [`size`](Self::size) elements.
    fn load_from_slice(&mut self, data: &[f32]) -> Result<()> {
        ensure!(data.len() == self.size(), SizeMismatchSnafu { expected: self.size(), actual: data.len() });
        self.as_mut_slice().copy_from_slice(data);
        Ok(())
    }

    fn fill(&mut self, value: f32) {
        self.as_mut_slice().fill(value);
    }

    fn to_vec(&self) -> Vec<f32> {
        self.as_slice().to_vec()
    }
}
