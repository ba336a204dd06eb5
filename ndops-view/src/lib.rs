//! Strided N-dimensional views over shared typed buffers.
//!
//! A [`StridedView`] describes a multidimensional array as a flat buffer plus
//! shape, per-axis stride and offset. Views derived from one another share the
//! same [`Buffer`], so a slice and its parent alias the same elements.
//!
//! # Core Types
//!
//! - [`StridedView`]: view over a shared (`Rc`) or borrowed buffer of [`Cell`]s
//! - [`Element`] / [`DType`]: the typed-array element kinds and their runtime tags
//! - [`AnyView`] / [`AnyCells`]: runtime-typed views and cell slices
//!
//! # Metadata Transformations
//!
//! These operate only on dims/strides/offset and never touch the data:
//! - `lo`, `hi`: shrink the window from below / cap it from above
//! - `step`: subsample (and reverse on negative steps)
//! - `transpose`: permute axes
//! - `pick`: fix axes to a coordinate, dropping them
//!
//! [`Cell`]: std::cell::Cell

mod any;
mod element;
pub mod view;

pub use any::{AnyCells, AnyView};
pub use element::{to_int32, to_uint32, DType, Element};
pub use view::{dims_from_signed, row_major_strides, view, Buffer, StridedView};

// ============================================================================
// Error types
// ============================================================================

/// Construction-time shape problems.
#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    /// A signed extent list contained a negative entry.
    #[error("negative extent {extent} on axis {axis}")]
    NegativeExtent { axis: usize, extent: i64 },

    /// Stride array length doesn't match dimensions.
    #[error("stride and dims length mismatch: {strides} strides for {dims} axes")]
    StrideLengthMismatch { dims: usize, strides: usize },

    /// The addressed window does not fit the buffer.
    #[error("view addresses [{min}, {max}] outside a buffer of length {len}")]
    OutOfBuffer { min: isize, max: isize, len: usize },

    /// Integer overflow while computing the view window.
    #[error("offset overflow while computing view window")]
    OffsetOverflow,
}

/// Axis bookkeeping problems raised by view transforms.
#[derive(Debug, thiserror::Error)]
pub enum DimensionError {
    /// Array ranks do not match.
    #[error("rank mismatch: {0} vs {1}")]
    RankMismatch(usize, usize),

    /// A transpose permutation that is not a bijection on the axes.
    #[error("{perm:?} is not a permutation of {rank} axes")]
    InvalidPermutation { perm: Vec<usize>, rank: usize },

    /// A zero step cannot subsample an axis.
    #[error("zero step on axis {axis}")]
    ZeroStep { axis: usize },
}

/// Errors that can occur while building or transforming views.
#[derive(Debug, thiserror::Error)]
pub enum StridedError {
    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Dimension(#[from] DimensionError),
}

/// Result type for view operations.
pub type Result<T> = std::result::Result<T, StridedError>;
