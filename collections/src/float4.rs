use std::fmt;
use std::ops::{Add, Index, Mul, Sub};

use bytemuck::{Pod, Zeroable};
use tessera_dtype::{DType, HasDType, ScalarDType};

/// Four packed `f32` lanes, laid out like a device `float4`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Float4 {
    lanes: [f32; 4],
}

impl HasDType for Float4 {
    const DTYPE: DType = DType::Vector { scalar: ScalarDType::Float32, count: 4 };
}

impl Float4 {
    pub const LANES: usize = 4;

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { lanes: [x, y, z, w] }
    }

    pub const fn splat(value: f32) -> Self {
        Self { lanes: [value; 4] }
    }

    pub fn x(&self) -> f32 {
        self.lanes[0]
    }

    pub fn y(&self) -> f32 {
        self.lanes[1]
    }

    pub fn z(&self) -> f32 {
        self.lanes[2]
    }

    pub fn w(&self) -> f32 {
        self.lanes[3]
    }

    pub fn to_array(self) -> [f32; 4] {
        self.lanes
    }

    /// Read four consecutive elements starting at `offset`.
    ///
    /// Panics if `offset + 4` exceeds the slice.
    pub fn load_from_slice(data: &[f32], offset: usize) -> Self {
        let mut lanes = [0.0; 4];
        lanes.copy_from_slice(&data[offset..offset + Self::LANES]);
        Self { lanes }
    }

    /// Write the lanes into four consecutive elements starting at `offset`.
    pub fn store_to_slice(&self, data: &mut [f32], offset: usize) {
        data[offset..offset + Self::LANES].copy_from_slice(&self.lanes);
    }

    pub fn dot(&self, other: &Self) -> f32 {
        self.lanes.iter().zip(&other.lanes).map(|(a, b)| a * b).sum()
    }

    pub fn sum(&self) -> f32 {
        self.lanes.iter().sum()
    }

    fn zip_with(self, other: Self, f: impl Fn(f32, f32) -> f32) -> Self {
        let mut lanes = [0.0; 4];
        for (i, lane) in lanes.iter_mut().enumerate() {
            *lane = f(self.lanes[i], other.lanes[i]);
        }
        Self { lanes }
    }
}

impl From<[f32; 4]> for Float4 {
    fn from(lanes: [f32; 4]) -> Self {
        Self { lanes }
    }
}

impl Index<usize> for Float4 {
    type Output = f32;

    fn index(&self, lane: usize) -> &f32 {
        &self.lanes[lane]
    }
}

impl Add for Float4 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.zip_with(rhs, |a, b| a + b)
    }
}

impl Sub for Float4 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.zip_with(rhs, |a, b| a - b)
    }
}

impl Mul for Float4 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        self.zip_with(rhs, |a, b| a * b)
    }
}

impl fmt::Display for Float4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{:.3},{:.3},{:.3},{:.3}}}", self.lanes[0], self.lanes[1], self.lanes[2], self.lanes[3])
    }
}
