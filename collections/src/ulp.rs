//! Units-in-the-last-place comparison of floating point results.
//!
//! Device code is free to reorder and fuse floating point operations, so its
//! results rarely match a host computation bit for bit. Distances are measured
//! in multiples of the spacing between adjacent floats around the expected
//! value, which scales with magnitude.

use std::fmt;

/// Spacing between `x` and the next representable float of larger magnitude.
///
/// `ulp(0.0)` is the smallest subnormal. NaN stays NaN and infinities map to
/// infinity.
pub fn ulp(x: f32) -> f32 {
    if x.is_nan() {
        return f32::NAN;
    }

    let magnitude = x.abs();
    if magnitude.is_infinite() {
        return f32::INFINITY;
    }
    if magnitude == f32::MAX {
        return magnitude - f32::from_bits(magnitude.to_bits() - 1);
    }

    f32::from_bits(magnitude.to_bits() + 1) - magnitude
}

/// ULP distance of `value` from `expected`.
///
/// Returns `0.0` for identical values and `+inf` when either side is NaN or
/// exactly one side is infinite.
pub fn find_max_ulp(value: f32, expected: f32) -> f32 {
    if value == expected {
        return 0.0;
    }
    if value.is_nan() || expected.is_nan() || value.is_infinite() || expected.is_infinite() {
        return f32::INFINITY;
    }

    (value - expected).abs() / ulp(expected)
}

/// Largest ULP distance over paired elements.
///
/// Slices of different length can never validate, so they yield `+inf`.
pub fn find_ulp_distance(values: &[f32], expected: &[f32]) -> f32 {
    if values.len() != expected.len() {
        return f32::INFINITY;
    }

    values.iter().zip(expected).map(|(&v, &e)| find_max_ulp(v, e)).fold(0.0, f32::max)
}

/// Summary of an element-wise ULP comparison between two containers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatingPointError {
    pub average_ulp: f32,
    pub min_ulp: f32,
    pub max_ulp: f32,
    pub std_dev: f32,
}

impl FloatingPointError {
    /// Returned when the compared containers have different shapes.
    pub const MISMATCH: Self = Self { average_ulp: -1.0, min_ulp: 0.0, max_ulp: 0.0, std_dev: 0.0 };

    pub fn new(average_ulp: f32, min_ulp: f32, max_ulp: f32, std_dev: f32) -> Self {
        Self { average_ulp, min_ulp, max_ulp, std_dev }
    }

    /// Compare two equally shaped element sequences.
    ///
    /// Callers check shapes first; a length difference here yields
    /// [`FloatingPointError::MISMATCH`].
    pub fn compare(values: &[f32], reference: &[f32]) -> Self {
        if values.len() != reference.len() {
            return Self::MISMATCH;
        }
        if values.is_empty() {
            return Self::new(0.0, 0.0, 0.0, 0.0);
        }

        let distances: Vec<f32> = values.iter().zip(reference).map(|(&v, &r)| find_max_ulp(v, r)).collect();
        let count = distances.len() as f32;

        let mut min_ulp = f32::MAX;
        let mut max_ulp = 0.0f32;
        let mut sum = 0.0f32;
        for &d in &distances {
            min_ulp = min_ulp.min(d);
            max_ulp = max_ulp.max(d);
            sum += d;
        }

        let average_ulp = sum / count;
        let variance = distances.iter().map(|&d| (d - average_ulp) * (d - average_ulp)).sum::<f32>() / count;

        Self::new(average_ulp, min_ulp, max_ulp, variance.sqrt())
    }

    pub fn is_mismatch(&self) -> bool {
        self.average_ulp < 0.0
    }

    /// True when no element is further than `max_ulp` from its reference.
    pub fn within(&self, max_ulp: f32) -> bool {
        !self.is_mismatch() && self.max_ulp < max_ulp
    }
}

impl fmt::Display for FloatingPointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ulp: average={:.3}, min={:.3}, max={:.3}, std. dev={:.3}",
            self.average_ulp, self.min_ulp, self.max_ulp, self.std_dev
        )
    }
}
