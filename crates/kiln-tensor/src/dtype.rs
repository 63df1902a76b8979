use std::fmt;
use std::str::FromStr;

use crate::error::TensorError;

/// Element scalar type tag carried by every tensor.
///
/// The declaration order is the promotion order: the common type of two dtypes is
/// the larger of the pair, with the one exception documented on [`promote_types`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DType {
    /// Boolean, stored as one byte holding 0 or 1.
    Bool,
    /// Unsigned 8-bit integer.
    Byte,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// IEEE 754 single precision float.
    Float32,
    /// IEEE 754 double precision float.
    Float64,
    /// Complex number made of two `Float32` parts.
    Complex64,
    /// Complex number made of two `Float64` parts.
    Complex128,
}

impl DType {
    /// Every dtype in promotion order.
    pub const ALL: [DType; 8] = [
        DType::Bool,
        DType::Byte,
        DType::Int32,
        DType::Int64,
        DType::Float32,
        DType::Float64,
        DType::Complex64,
        DType::Complex128,
    ];

    /// Size in bytes of a single element.
    pub const fn itemsize(self) -> usize {
        match self {
            DType::Bool | DType::Byte => 1,
            DType::Int32 | DType::Float32 => 4,
            DType::Int64 | DType::Float64 | DType::Complex64 => 8,
            DType::Complex128 => 16,
        }
    }

    /// Returns true for real floating point dtypes.
    pub const fn is_floating_point(self) -> bool {
        matches!(self, DType::Float32 | DType::Float64)
    }

    /// Returns true for complex dtypes.
    pub const fn is_complex(self) -> bool {
        matches!(self, DType::Complex64 | DType::Complex128)
    }

    /// Returns true if the dtype can hold negative values.
    pub const fn is_signed(self) -> bool {
        !matches!(self, DType::Bool | DType::Byte)
    }

    /// Returns true for boolean and integer dtypes.
    pub const fn is_integral(self) -> bool {
        matches!(self, DType::Bool | DType::Byte | DType::Int32 | DType::Int64)
    }

    /// The real dtype matching the precision of a complex dtype.
    ///
    /// Non-complex dtypes map to themselves.
    pub const fn to_real(self) -> DType {
        match self {
            DType::Complex64 => DType::Float32,
            DType::Complex128 => DType::Float64,
            other => other,
        }
    }

    /// The exact textual name of the dtype.
    pub const fn name(self) -> &'static str {
        match self {
            DType::Bool => "Bool",
            DType::Byte => "Byte",
            DType::Int32 => "Int32",
            DType::Int64 => "Int64",
            DType::Float32 => "Float32",
            DType::Float64 => "Float64",
            DType::Complex64 => "Complex64",
            DType::Complex128 => "Complex128",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DType {
    type Err = TensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DType::ALL
            .into_iter()
            .find(|dtype| dtype.name() == s)
            .ok_or_else(|| TensorError::invalid_argument(format!("unknown dtype name `{s}`")))
    }
}

/// Returns the smallest dtype able to represent values of both `a` and `b`.
///
/// This is the later of the two in declaration order, except that `Float64` with
/// `Complex64` needs double precision parts and promotes to `Complex128`.
///
/// # Errors
///
/// Returns [`TensorError::TypePromotion`] when the pair has no common dtype. Every pair
/// in the closed [`DType`] set has one, so this only fails for future extensions.
pub fn promote_types(a: DType, b: DType) -> Result<DType, TensorError> {
    let (narrow, wide) = if a <= b { (a, b) } else { (b, a) };
    if wide == DType::Complex64 && narrow == DType::Float64 {
        return Ok(DType::Complex128);
    }
    Ok(wide)
}

/// Folds [`promote_types`] over a non-empty list of dtypes.
///
/// # Errors
///
/// Returns [`TensorError::InvalidArgument`] for an empty list.
pub fn result_type(dtypes: &[DType]) -> Result<DType, TensorError> {
    let (first, rest) = dtypes
        .split_first()
        .ok_or_else(|| TensorError::invalid_argument("result_type needs at least one dtype"))?;
    rest.iter()
        .try_fold(*first, |acc, &dtype| promote_types(acc, dtype))
}

/// Runs `$body` with `$T` bound to the Rust element type matching a [`DType`].
///
/// The body is instantiated once per dtype, so it must type-check for every
/// [`Element`](crate::Element) type.
///
/// ```
/// use kiln_tensor::{dispatch_dtype, DType, Element};
///
/// let width = dispatch_dtype!(DType::Int32, |T| std::mem::size_of::<T>());
/// assert_eq!(width, 4);
/// assert_eq!(dispatch_dtype!(DType::Float64, |T| T::DTYPE), DType::Float64);
/// ```
#[macro_export]
macro_rules! dispatch_dtype {
    ($dtype:expr, |$T:ident| $body:expr) => {
        match $dtype {
            $crate::DType::Bool => {
                type $T = bool;
                $body
            }
            $crate::DType::Byte => {
                type $T = u8;
                $body
            }
            $crate::DType::Int32 => {
                type $T = i32;
                $body
            }
            $crate::DType::Int64 => {
                type $T = i64;
                $body
            }
            $crate::DType::Float32 => {
                type $T = f32;
                $body
            }
            $crate::DType::Float64 => {
                type $T = f64;
                $body
            }
            $crate::DType::Complex64 => {
                type $T = $crate::num_complex::Complex32;
                $body
            }
            $crate::DType::Complex128 => {
                type $T = $crate::num_complex::Complex64;
                $body
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_itemsize() {
        assert_eq!(DType::Bool.itemsize(), 1);
        assert_eq!(DType::Byte.itemsize(), 1);
        assert_eq!(DType::Int32.itemsize(), 4);
        assert_eq!(DType::Int64.itemsize(), 8);
        assert_eq!(DType::Float32.itemsize(), 4);
        assert_eq!(DType::Float64.itemsize(), 8);
        assert_eq!(DType::Complex64.itemsize(), 8);
        assert_eq!(DType::Complex128.itemsize(), 16);
    }

    #[test]
    fn test_flags() {
        assert!(DType::Float32.is_floating_point());
        assert!(!DType::Int64.is_floating_point());
        assert!(!DType::Complex64.is_floating_point());
        assert!(DType::Complex128.is_complex());
        assert!(!DType::Float64.is_complex());
        assert!(DType::Int32.is_signed());
        assert!(!DType::Byte.is_signed());
        assert!(!DType::Bool.is_signed());
        assert!(DType::Float32.is_signed());
    }

    #[test]
    fn test_names_round_trip() -> Result<(), TensorError> {
        for dtype in DType::ALL {
            assert_eq!(dtype.to_string(), dtype.name());
            assert_eq!(dtype.name().parse::<DType>()?, dtype);
        }
        assert_eq!(DType::Complex64.to_string(), "Complex64");
        assert!("Half".parse::<DType>().is_err());
        Ok(())
    }

    #[test]
    fn test_promotion() -> Result<(), TensorError> {
        assert_eq!(promote_types(DType::Int32, DType::Int32)?, DType::Int32);
        assert_eq!(promote_types(DType::Bool, DType::Byte)?, DType::Byte);
        assert_eq!(promote_types(DType::Int64, DType::Float32)?, DType::Float32);
        assert_eq!(promote_types(DType::Float32, DType::Complex64)?, DType::Complex64);
        assert_eq!(promote_types(DType::Float64, DType::Complex64)?, DType::Complex128);
        assert_eq!(promote_types(DType::Complex64, DType::Float64)?, DType::Complex128);
        assert_eq!(promote_types(DType::Int64, DType::Complex64)?, DType::Complex64);
        assert_eq!(
            result_type(&[DType::Byte, DType::Float64, DType::Int32])?,
            DType::Float64
        );
        assert_eq!(
            result_type(&[DType::Complex64, DType::Int32, DType::Float64])?,
            DType::Complex128
        );
        assert!(matches!(result_type(&[]), Err(TensorError::InvalidArgument(_))));
        Ok(())
    }

    #[test]
    fn test_to_real() {
        assert_eq!(DType::Complex64.to_real(), DType::Float32);
        assert_eq!(DType::Complex128.to_real(), DType::Float64);
        assert_eq!(DType::Int32.to_real(), DType::Int32);
    }
}
