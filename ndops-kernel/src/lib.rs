//! Specializing loop compiler and operator library over strided views.
//!
//! A [`Template`] is a short scalar program over named parameters, split into
//! prep, body and post sections. The body is written for a single element:
//! `a[...]` stands for the current element of `a`, and the loop indices
//! `iX`, `iY`, ... (innermost first) name the current position.
//!
//! An [`Operator`] specializes its template for every distinct argument
//! signature (scalar or array, element type, strides, offset, captured
//! names) and caches the result, so repeated calls over differently sized
//! arrays of the same layout compile once.
//!
//! # Core Types
//!
//! - [`Template`]: parsed template text or an AST built in code
//! - [`Operator`] / [`Baked`]: a template plus its [`SpecializationCache`]
//! - [`Ops`]: the full catalogue of element-wise operators and reductions,
//!   with median, rms, histogram and projection on top
//!
//! # Example
//!
//! ```rust
//! use ndops_kernel::{Arg, CachePolicy, Operator, Template};
//! use ndops_view::view;
//!
//! let axpy = Template::parse("axpy", &["y", "alpha", "x"], "y[...] += alpha * x[...]").unwrap();
//! let op = Operator::new(axpy, CachePolicy::Unbounded);
//!
//! let x = view(vec![1.0f64, 2.0, 3.0], &[3]).unwrap();
//! let y = view(vec![10.0f64, 10.0, 10.0], &[3]).unwrap();
//! op.call(&[Arg::from(&y), Arg::from(2.0), Arg::from(&x)]).unwrap();
//! assert_eq!(y.to_vec(), vec![12.0, 14.0, 16.0]);
//! ```

pub mod ast;
mod cache;
mod catalogue;
mod compile;
mod config;
mod error;
mod operator;
mod ops;
mod parse;
mod signature;
mod specialize;
mod stats;
mod template;

pub use cache::{CachePolicy, CacheStats, SpecializationCache};
pub use catalogue::{BinaryOp, OpKind, Reduction, UnaryOp, Variant};
pub use config::OpsConfig;
pub use error::{KernelError, Result};
pub use operator::{Baked, Operator, Value};
pub use ops::Ops;
pub use parse::parse_section;
pub use signature::{Arg, Captures, ParamSig, SignatureKey};
pub use specialize::Specialization;
pub use stats::{Histogram, Projection};
pub use template::{Template, SECTION_MARKER};

/// Highest array rank a specialization accepts.
pub const MAX_RANK: usize = 6;

/// Loop index names, innermost first.
pub const LOOP_INDEX_NAMES: [&str; MAX_RANK] = ["iX", "iY", "iZ", "iU", "iV", "iW"];
