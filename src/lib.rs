//! Strided N-dimensional array views and a specializing loop compiler for
//! image statistics.
//!
//! This crate re-exports the two workspace members:
//!
//! - [`ndops_view`]: [`StridedView`] and its zero-copy transforms (`lo`, `hi`,
//!   `step`, `transpose`, `pick`), plus the runtime-typed [`AnyView`]
//! - [`ndops_kernel`]: [`Template`] parsing, per-signature specialization,
//!   the [`Ops`] operator catalogue and derived statistics
//!
//! # Example
//!
//! ```rust
//! use ndops::{view, BinaryOp, Ops};
//!
//! let ops = Ops::new();
//! let a = view(vec![1.0f64, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
//! let b = view(vec![5.0f64, 6.0, 7.0, 8.0], &[2, 2]).unwrap();
//!
//! let c = ops.binary_new(BinaryOp::Add, &a, &b).unwrap();
//! assert_eq!(c.to_vec(), vec![6.0, 8.0, 10.0, 12.0]);
//! assert_eq!(ops.sum(&c).unwrap(), 36.0);
//!
//! // views share their buffer: writing through a transpose updates `a`
//! let t = a.transpose(&[1, 0]).unwrap();
//! t.set(&[1, 0], 9.0);
//! assert_eq!(a.get(&[0, 1]), 9.0);
//! ```

pub use ndops_kernel::{
    ast, parse_section, Arg, Baked, BinaryOp, CachePolicy, CacheStats, Captures, Histogram,
    KernelError, OpKind, Operator, Ops, OpsConfig, ParamSig, Projection, Reduction,
    SignatureKey, Specialization, SpecializationCache, Template, UnaryOp, Value, Variant,
    LOOP_INDEX_NAMES, MAX_RANK, SECTION_MARKER,
};
pub use ndops_view::{
    dims_from_signed, row_major_strides, view, AnyCells, AnyView, Buffer, DType,
    DimensionError, Element, ShapeError, StridedError, StridedView,
};
