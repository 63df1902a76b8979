use num_complex::{Complex32, Complex64};
use num_traits::Zero;

use crate::dtype::DType;

/// A dtype-erased single value used for fill values, factory arguments and
/// element conversion between dtypes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    /// A boolean value.
    Bool(bool),
    /// An integer value.
    Int(i64),
    /// A real floating point value.
    Float(f64),
    /// A complex value.
    Complex(Complex64),
}

impl Scalar {
    /// The dtype a tensor built from this scalar alone would get.
    pub fn dtype(&self) -> DType {
        match self {
            Scalar::Bool(_) => DType::Bool,
            Scalar::Int(_) => DType::Int64,
            Scalar::Float(_) => DType::Float64,
            Scalar::Complex(_) => DType::Complex128,
        }
    }

    /// Returns true for boolean and integer scalars.
    pub fn is_integral(&self) -> bool {
        matches!(self, Scalar::Bool(_) | Scalar::Int(_))
    }

    /// Returns true for complex scalars.
    pub fn is_complex(&self) -> bool {
        matches!(self, Scalar::Complex(_))
    }

    /// The value as a double, dropping any imaginary part.
    pub fn to_f64(&self) -> f64 {
        match *self {
            Scalar::Bool(b) => f64::from(u8::from(b)),
            Scalar::Int(i) => i as f64,
            Scalar::Float(f) => f,
            Scalar::Complex(c) => c.re,
        }
    }

    /// The value as an integer, truncating floats toward zero.
    pub fn to_i64(&self) -> i64 {
        match *self {
            Scalar::Bool(b) => i64::from(b),
            Scalar::Int(i) => i,
            Scalar::Float(f) => f as i64,
            Scalar::Complex(c) => c.re as i64,
        }
    }

    /// The value as a boolean: anything non-zero is true.
    pub fn to_bool(&self) -> bool {
        match *self {
            Scalar::Bool(b) => b,
            Scalar::Int(i) => i != 0,
            Scalar::Float(f) => f != 0.0,
            Scalar::Complex(c) => !c.is_zero(),
        }
    }

    /// The value as a double precision complex number.
    pub fn to_complex(&self) -> Complex64 {
        match *self {
            Scalar::Complex(c) => c,
            other => Complex64::new(other.to_f64(), 0.0),
        }
    }
}

macro_rules! impl_scalar_from {
    ($($t:ty => $variant:ident as $target:ty),* $(,)?) => {
        $(
            impl From<$t> for Scalar {
                fn from(value: $t) -> Self {
                    Scalar::$variant(value as $target)
                }
            }
        )*
    };
}

impl_scalar_from!(
    u8 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    u32 => Int as i64,
    usize => Int as i64,
    f32 => Float as f64,
    f64 => Float as f64,
);

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<Complex32> for Scalar {
    fn from(value: Complex32) -> Self {
        Scalar::Complex(Complex64::new(f64::from(value.re), f64::from(value.im)))
    }
}

impl From<Complex64> for Scalar {
    fn from(value: Complex64) -> Self {
        Scalar::Complex(value)
    }
}

/// Binds a Rust type to the [`DType`] used to store it.
///
/// Typed accessors such as [`Tensor::as_slice`](crate::Tensor::as_slice) check
/// `T::DTYPE` against the tensor dtype before handing out data.
pub trait Element: Copy + Send + Sync + PartialEq + std::fmt::Debug + 'static {
    /// The dtype tag of this element type.
    const DTYPE: DType;

    /// Converts a scalar into this element type, following C-style casts.
    fn from_scalar(value: Scalar) -> Self;

    /// Converts this element into a scalar without loss.
    fn to_scalar(self) -> Scalar;

    /// The additive identity.
    fn zero() -> Self {
        Self::from_scalar(Scalar::Int(0))
    }

    /// The multiplicative identity.
    fn one() -> Self {
        Self::from_scalar(Scalar::Int(1))
    }

    /// Converts an element of another dtype into this one.
    fn cast_from<U: Element>(value: U) -> Self {
        Self::from_scalar(value.to_scalar())
    }
}

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn from_scalar(value: Scalar) -> Self {
        value.to_bool()
    }

    fn to_scalar(self) -> Scalar {
        Scalar::Bool(self)
    }
}

impl Element for u8 {
    const DTYPE: DType = DType::Byte;

    fn from_scalar(value: Scalar) -> Self {
        match value {
            Scalar::Float(f) => f as u8,
            other => other.to_i64() as u8,
        }
    }

    fn to_scalar(self) -> Scalar {
        Scalar::Int(i64::from(self))
    }
}

impl Element for i32 {
    const DTYPE: DType = DType::Int32;

    fn from_scalar(value: Scalar) -> Self {
        match value {
            Scalar::Float(f) => f as i32,
            other => other.to_i64() as i32,
        }
    }

    fn to_scalar(self) -> Scalar {
        Scalar::Int(i64::from(self))
    }
}

impl Element for i64 {
    const DTYPE: DType = DType::Int64;

    fn from_scalar(value: Scalar) -> Self {
        value.to_i64()
    }

    fn to_scalar(self) -> Scalar {
        Scalar::Int(self)
    }
}

impl Element for f32 {
    const DTYPE: DType = DType::Float32;

    fn from_scalar(value: Scalar) -> Self {
        value.to_f64() as f32
    }

    fn to_scalar(self) -> Scalar {
        Scalar::Float(f64::from(self))
    }
}

impl Element for f64 {
    const DTYPE: DType = DType::Float64;

    fn from_scalar(value: Scalar) -> Self {
        value.to_f64()
    }

    fn to_scalar(self) -> Scalar {
        Scalar::Float(self)
    }
}

impl Element for Complex32 {
    const DTYPE: DType = DType::Complex64;

    fn from_scalar(value: Scalar) -> Self {
        let c = value.to_complex();
        Complex32::new(c.re as f32, c.im as f32)
    }

    fn to_scalar(self) -> Scalar {
        Scalar::from(self)
    }
}

impl Element for Complex64 {
    const DTYPE: DType = DType::Complex128;

    fn from_scalar(value: Scalar) -> Self {
        value.to_complex()
    }

    fn to_scalar(self) -> Scalar {
        Scalar::Complex(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_dtype() {
        assert_eq!(Scalar::from(true).dtype(), DType::Bool);
        assert_eq!(Scalar::from(3_i32).dtype(), DType::Int64);
        assert_eq!(Scalar::from(2.5_f32).dtype(), DType::Float64);
        assert_eq!(Scalar::from(Complex32::new(1.0, 2.0)).dtype(), DType::Complex128);
    }

    #[test]
    fn test_element_casts() {
        assert_eq!(i32::from_scalar(Scalar::Float(-3.7)), -3);
        assert_eq!(u8::from_scalar(Scalar::Int(258)), 2);
        assert!(bool::from_scalar(Scalar::Float(0.5)));
        assert!(!bool::from_scalar(Scalar::Int(0)));
        assert_eq!(f32::from_scalar(Scalar::Bool(true)), 1.0);
        assert_eq!(
            Complex64::from_scalar(Scalar::Int(4)),
            Complex64::new(4.0, 0.0)
        );
        assert_eq!(f64::cast_from(Complex32::new(1.5, -2.0)), 1.5);
        assert_eq!(i64::cast_from(7_u8), 7);
    }

    #[test]
    fn test_element_identities() {
        assert_eq!(<f32 as Element>::zero(), 0.0);
        assert_eq!(<i64 as Element>::one(), 1);
        assert!(!<bool as Element>::zero());
        assert_eq!(<Complex32 as Element>::one(), Complex32::new(1.0, 0.0));
    }

    #[test]
    fn test_dtype_tags() {
        assert_eq!(<bool as Element>::DTYPE, DType::Bool);
        assert_eq!(<u8 as Element>::DTYPE, DType::Byte);
        assert_eq!(<i32 as Element>::DTYPE, DType::Int32);
        assert_eq!(<Complex64 as Element>::DTYPE, DType::Complex128);
        for dtype in DType::ALL {
            let size = crate::dispatch_dtype!(dtype, |T| std::mem::size_of::<T>());
            assert_eq!(size, dtype.itemsize());
        }
    }
}
