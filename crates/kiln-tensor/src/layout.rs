use std::fmt;

use crate::error::TensorError;

/// Memory layout kind of a tensor.
///
/// Only [`Layout::Strided`] is executable; the sparse and opaque kinds are recognized
/// tags so they can be named in diagnostics and rejected by factories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i8)]
pub enum Layout {
    /// Dense buffer indexed through sizes, strides and an offset.
    #[default]
    Strided = 0,
    /// Coordinate-format sparse tensor.
    Sparse = 1,
    /// Compressed sparse rows.
    SparseCsr = 2,
    /// Opaque MKL-DNN blocked layout.
    Mkldnn = 3,
    /// Compressed sparse columns.
    SparseCsc = 4,
    /// Block compressed sparse rows.
    SparseBsr = 5,
    /// Block compressed sparse columns.
    SparseBsc = 6,
    /// Nested tensor with one ragged dimension.
    Jagged = 7,
}

/// Short alias for [`Layout::Strided`].
pub const K_STRIDED: Layout = Layout::Strided;
/// Short alias for [`Layout::Sparse`].
pub const K_SPARSE: Layout = Layout::Sparse;
/// Short alias for [`Layout::SparseCsr`].
pub const K_SPARSE_CSR: Layout = Layout::SparseCsr;
/// Short alias for [`Layout::SparseCsc`].
pub const K_SPARSE_CSC: Layout = Layout::SparseCsc;
/// Short alias for [`Layout::SparseBsr`].
pub const K_SPARSE_BSR: Layout = Layout::SparseBsr;
/// Short alias for [`Layout::SparseBsc`].
pub const K_SPARSE_BSC: Layout = Layout::SparseBsc;
/// Short alias for [`Layout::Mkldnn`].
pub const K_MKLDNN: Layout = Layout::Mkldnn;
/// Short alias for [`Layout::Jagged`].
pub const K_JAGGED: Layout = Layout::Jagged;

impl Layout {
    /// Number of layout kinds.
    pub const NUM_OPTIONS: i8 = 8;

    /// Every layout kind ordered by discriminant.
    pub const ALL: [Layout; 8] = [
        Layout::Strided,
        Layout::Sparse,
        Layout::SparseCsr,
        Layout::Mkldnn,
        Layout::SparseCsc,
        Layout::SparseBsr,
        Layout::SparseBsc,
        Layout::Jagged,
    ];

    /// The underlying discriminant.
    pub const fn as_i8(self) -> i8 {
        self as i8
    }

    /// The exact textual name of the layout kind.
    pub const fn name(self) -> &'static str {
        match self {
            Layout::Strided => "Strided",
            Layout::Sparse => "Sparse",
            Layout::SparseCsr => "SparseCsr",
            Layout::Mkldnn => "Mkldnn",
            Layout::SparseCsc => "SparseCsc",
            Layout::SparseBsr => "SparseBsr",
            Layout::SparseBsc => "SparseBsc",
            Layout::Jagged => "Jagged",
        }
    }

    /// Returns true for the sparse kinds.
    pub const fn is_sparse(self) -> bool {
        matches!(
            self,
            Layout::Sparse
                | Layout::SparseCsr
                | Layout::SparseCsc
                | Layout::SparseBsr
                | Layout::SparseBsc
        )
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i8> for Layout {
    type Error = TensorError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(|i| Layout::ALL.get(i).copied())
            .ok_or_else(|| TensorError::invalid_argument(format!("unknown layout value {value}")))
    }
}
