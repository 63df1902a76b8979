//! Element-level kernels shared by the tensor operations.

use kiln_tensor::{DType, Element, Scalar};
use num_complex::{Complex32, Complex64};
use num_traits::Zero;

/// Elementwise absolute value.
///
/// Real types map to themselves; complex types map to their real counterpart holding
/// the magnitude.
pub trait Magnitude: Element {
    /// The element type of the result.
    type Output: Element;

    /// Returns the absolute value, or the magnitude for complex numbers.
    fn magnitude(self) -> Self::Output;
}

impl Magnitude for bool {
    type Output = bool;

    fn magnitude(self) -> bool {
        self
    }
}

impl Magnitude for u8 {
    type Output = u8;

    fn magnitude(self) -> u8 {
        self
    }
}

impl Magnitude for i32 {
    type Output = i32;

    // the minimum value has no positive counterpart and maps to itself
    fn magnitude(self) -> i32 {
        self.wrapping_abs()
    }
}

impl Magnitude for i64 {
    type Output = i64;

    fn magnitude(self) -> i64 {
        self.wrapping_abs()
    }
}

impl Magnitude for f32 {
    type Output = f32;

    fn magnitude(self) -> f32 {
        self.abs()
    }
}

impl Magnitude for f64 {
    type Output = f64;

    fn magnitude(self) -> f64 {
        self.abs()
    }
}

impl Magnitude for Complex32 {
    type Output = f32;

    fn magnitude(self) -> f32 {
        self.norm()
    }
}

impl Magnitude for Complex64 {
    type Output = f64;

    fn magnitude(self) -> f64 {
        self.norm()
    }
}

/// Applies [`Magnitude::magnitude`] to every element of a slice.
pub fn abs_kernel<T: Magnitude>(values: &[T]) -> Vec<T::Output> {
    values.iter().map(|&v| v.magnitude()).collect()
}

/// Running sum in the widest type of a dtype family.
///
/// Integral and boolean targets accumulate in `i64` with wrapping, real floating
/// targets in `f64`, complex targets in double precision complex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Accumulator {
    /// Integer accumulation.
    Int(i64),
    /// Real floating point accumulation.
    Float(f64),
    /// Complex accumulation.
    Complex(Complex64),
}

impl Accumulator {
    /// A zero accumulator suited to produce values of `dtype`.
    pub fn zero(dtype: DType) -> Self {
        if dtype.is_complex() {
            Accumulator::Complex(<Complex64 as Zero>::zero())
        } else if dtype.is_floating_point() {
            Accumulator::Float(0.0)
        } else {
            Accumulator::Int(0)
        }
    }

    /// Adds one value, converted to the accumulation type first.
    #[inline]
    pub fn add(&mut self, value: Scalar) {
        match self {
            Accumulator::Int(acc) => *acc = acc.wrapping_add(value.to_i64()),
            Accumulator::Float(acc) => *acc += value.to_f64(),
            Accumulator::Complex(acc) => *acc += value.to_complex(),
        }
    }

    /// The accumulated value.
    pub fn value(self) -> Scalar {
        match self {
            Accumulator::Int(v) => Scalar::Int(v),
            Accumulator::Float(v) => Scalar::Float(v),
            Accumulator::Complex(v) => Scalar::Complex(v),
        }
    }
}
