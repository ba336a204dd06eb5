//! Compiled specializations and the loop engine that runs them.
//!
//! A specialization is a tree of boxed closures produced by
//! [`crate::compile`]. Closures read loop indices, locals and buffers through
//! a per-call [`Frame`]. Loop level `k` drives the loop index at position
//! `k` (`iX` is level 0, innermost), following the kernel layout of the
//! strided iteration engine: dedicated 1D and 2D kernels plus a carry-style
//! N-dimensional fallback.

use std::cell::Cell;
use std::fmt;

use ndops_view::{AnyCells, AnyView, Element};

use crate::signature::{Arg, Captures, SignatureKey};
use crate::MAX_RANK;

pub(crate) type Eval = Box<dyn Fn(&Frame<'_>) -> f64>;
pub(crate) type Exec = Box<dyn Fn(&Frame<'_>) -> Flow>;

/// What a `return` produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Ret {
    Number(f64),
    /// The array passed in this parameter slot.
    Array(usize),
    Nothing,
}

pub(crate) enum Flow {
    Next,
    Return(Ret),
}

/// Per-call state shared by every closure of a specialization.
pub(crate) struct Frame<'f> {
    pub(crate) index: [Cell<isize>; MAX_RANK],
    pub(crate) locals: Box<[Cell<f64>]>,
    pub(crate) cells: Vec<Option<AnyCells<'f>>>,
    pub(crate) dims: Vec<&'f [usize]>,
    pub(crate) captures: Vec<f64>,
}

impl<'f> Frame<'f> {
    #[inline(always)]
    pub(crate) fn cells<T: Element>(&self, slot: usize) -> Option<&'f [Cell<T>]> {
        self.cells[slot].and_then(T::cells_of)
    }
}

/// Largest magnitude accepted for a computed index (2^53).
const MAX_COMPUTED_INDEX: f64 = 9_007_199_254_740_992.0;

/// A computed index must be a whole, finite number.
#[inline(always)]
fn whole_index(v: f64) -> Option<isize> {
    if v.fract() == 0.0 && v.abs() <= MAX_COMPUTED_INDEX {
        Some(v as isize)
    } else {
        None
    }
}

/// Flat buffer position of one array reference, with strides and offset
/// baked in from the signature.
pub(crate) struct FlatIndex {
    pub(crate) base: isize,
    /// `(stride, loop position)`
    pub(crate) loops: Vec<(isize, usize)>,
    /// `(stride, index expression)`
    pub(crate) computed: Vec<(isize, Eval)>,
}

impl FlatIndex {
    /// `None` when the position falls outside `0..` or an index is not a
    /// whole number; callers then read NaN and drop writes.
    #[inline(always)]
    pub(crate) fn resolve(&self, f: &Frame<'_>) -> Option<usize> {
        let mut flat = self.base;
        for &(stride, pos) in &self.loops {
            flat += stride * f.index[pos].get();
        }
        for (stride, e) in &self.computed {
            flat = flat.checked_add(stride.checked_mul(whole_index(e(f))?)?)?;
        }
        usize::try_from(flat).ok()
    }
}

#[inline]
pub(crate) fn run_block(block: &[Exec], f: &Frame<'_>) -> Flow {
    for stmt in block {
        if let Flow::Return(r) = stmt(f) {
            return Flow::Return(r);
        }
    }
    Flow::Next
}

/// A template compiled for one [`SignatureKey`].
pub struct Specialization {
    pub(crate) key: SignatureKey,
    /// Per loop level (innermost first): the `(param, axis)` pairs whose
    /// extents bound that level. The level runs to the largest of them, or
    /// once when nothing bounds it.
    pub(crate) extents: Vec<Vec<(usize, usize)>>,
    pub(crate) n_locals: usize,
    /// `(param, local slot)` for every scalar parameter.
    pub(crate) scalar_params: Vec<(usize, usize)>,
    pub(crate) prep: Vec<Exec>,
    pub(crate) body: Vec<Exec>,
    pub(crate) post: Vec<Exec>,
}

impl fmt::Debug for Specialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Specialization")
            .field("key", &self.key)
            .field("rank", &self.rank())
            .field("extents", &self.extents)
            .field("locals", &self.n_locals)
            .finish_non_exhaustive()
    }
}

impl Specialization {
    pub fn key(&self) -> &SignatureKey {
        &self.key
    }

    /// Number of loop levels wrapped around the body.
    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    /// Loop extents for a concrete argument list.
    pub fn shape(&self, args: &[Arg<'_>]) -> Vec<usize> {
        let dims: Vec<&[usize]> = args.iter().map(arg_dims).collect();
        self.loop_dims(&dims)
    }

    fn loop_dims(&self, dims: &[&[usize]]) -> Vec<usize> {
        self.extents
            .iter()
            .map(|bound| {
                bound
                    .iter()
                    .map(|&(param, axis)| dims[param].get(axis).copied().unwrap_or(0))
                    .max()
                    .unwrap_or(1)
            })
            .collect()
    }

    pub(crate) fn run(&self, args: &[Arg<'_>], captures: &Captures) -> Ret {
        let frame = Frame {
            index: Default::default(),
            locals: (0..self.n_locals).map(|_| Cell::new(f64::NAN)).collect(),
            cells: args.iter().map(|a| a.as_view().map(AnyView::cells)).collect(),
            dims: args.iter().map(arg_dims).collect(),
            captures: captures.values().collect(),
        };
        for &(param, slot) in &self.scalar_params {
            if let Some(v) = args[param].as_scalar() {
                frame.locals[slot].set(v);
            }
        }

        if let Flow::Return(r) = run_block(&self.prep, &frame) {
            return r;
        }
        let shape = self.loop_dims(&frame.dims);
        if shape.iter().all(|&d| d > 0) {
            let flow = match shape.len() {
                0 => run_block(&self.body, &frame),
                1 => kernel_1d(&shape, &self.body, &frame),
                2 => kernel_2d(&shape, &self.body, &frame),
                _ => kernel_nd(&shape, &self.body, &frame),
            };
            if let Flow::Return(r) = flow {
                return r;
            }
        }
        match run_block(&self.post, &frame) {
            Flow::Return(r) => r,
            Flow::Next => Ret::Nothing,
        }
    }
}

fn arg_dims<'f>(arg: &'f Arg<'_>) -> &'f [usize] {
    arg.as_view().map_or(&[][..], AnyView::dims)
}

// ============================================================================
// Loop kernels
// ============================================================================

#[inline]
fn kernel_1d(shape: &[usize], body: &[Exec], f: &Frame<'_>) -> Flow {
    let ix = &f.index[0];
    for i in 0..shape[0] {
        ix.set(i as isize);
        if let Flow::Return(r) = run_block(body, f) {
            return Flow::Return(r);
        }
    }
    Flow::Next
}

/// Outer loop over `iY`, inner over `iX`.
#[inline]
fn kernel_2d(shape: &[usize], body: &[Exec], f: &Frame<'_>) -> Flow {
    let (ix, iy) = (&f.index[0], &f.index[1]);
    for j in 0..shape[1] {
        iy.set(j as isize);
        for i in 0..shape[0] {
            ix.set(i as isize);
            if let Flow::Return(r) = run_block(body, f) {
                return Flow::Return(r);
            }
        }
    }
    Flow::Next
}

/// Innermost level runs as a plain loop; outer levels advance with a
/// carry-style increment.
fn kernel_nd(shape: &[usize], body: &[Exec], f: &Frame<'_>) -> Flow {
    let rank = shape.len();
    debug_assert!(rank >= 3);
    for level in 0..rank {
        f.index[level].set(0);
    }
    loop {
        if let Flow::Return(r) = kernel_1d(shape, body, f) {
            return Flow::Return(r);
        }
        let mut level = 1usize;
        loop {
            let cell = &f.index[level];
            cell.set(cell.get() + 1);
            if (cell.get() as usize) < shape[level] {
                break;
            }
            cell.set(0);
            level += 1;
            if level == rank {
                return Flow::Next;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(n_locals: usize) -> Frame<'static> {
        Frame {
            index: Default::default(),
            locals: (0..n_locals).map(|_| Cell::new(0.0)).collect(),
            cells: Vec::new(),
            dims: Vec::new(),
            captures: Vec::new(),
        }
    }

    /// Body that appends the flattened loop position to local 0 as digits.
    fn trace_body() -> Vec<Exec> {
        vec![Box::new(|f: &Frame<'_>| {
            let code = f.index[2].get() * 100 + f.index[1].get() * 10 + f.index[0].get();
            let acc = &f.locals[0];
            acc.set(acc.get() * 1000.0 + code as f64);
            Flow::Next
        })]
    }

    #[test]
    fn test_kernel_2d_row_major_order() {
        let f = frame(1);
        kernel_2d(&[2, 2], &trace_body(), &f);
        // (iY, iX): (0,0) (0,1) (1,0) (1,1)
        assert_eq!(f.locals[0].get(), 1_010_011.0);
    }

    #[test]
    fn test_kernel_nd_visits_every_position() {
        let f = frame(2);
        let body: Vec<Exec> = vec![Box::new(|f: &Frame<'_>| {
            let n = &f.locals[0];
            n.set(n.get() + 1.0);
            let last = f.index[2].get() * 100 + f.index[1].get() * 10 + f.index[0].get();
            f.locals[1].set(last as f64);
            Flow::Next
        })];
        kernel_nd(&[2, 3, 4], &body, &f);
        assert_eq!(f.locals[0].get(), 24.0);
        assert_eq!(f.locals[1].get(), 321.0);
    }

    #[test]
    fn test_kernel_stops_on_return() {
        let f = frame(1);
        let body: Vec<Exec> = vec![Box::new(|f: &Frame<'_>| {
            if f.index[0].get() == 3 {
                Flow::Return(Ret::Number(f.index[1].get() as f64))
            } else {
                Flow::Next
            }
        })];
        assert!(matches!(
            kernel_2d(&[5, 4], &body, &f),
            Flow::Return(Ret::Number(v)) if v == 0.0
        ));
    }

    #[test]
    fn test_whole_index() {
        assert_eq!(whole_index(3.0), Some(3));
        assert_eq!(whole_index(-2.0), Some(-2));
        assert_eq!(whole_index(1.5), None);
        assert_eq!(whole_index(f64::NAN), None);
        assert_eq!(whole_index(f64::INFINITY), None);
    }

    #[test]
    fn test_flat_index_resolve() {
        let f = frame(0);
        f.index[0].set(2);
        f.index[1].set(1);
        let three: Eval = Box::new(|_: &Frame<'_>| 3.0);
        let at = FlatIndex {
            base: 1,
            loops: vec![(1, 0), (10, 1)],
            computed: vec![(100, three)],
        };
        assert_eq!(at.resolve(&f), Some(313));
        let negative = FlatIndex {
            base: 0,
            loops: vec![(-1, 0)],
            computed: Vec::new(),
        };
        assert_eq!(negative.resolve(&f), None);
        let half: Eval = Box::new(|_: &Frame<'_>| 0.5);
        let fractional = FlatIndex {
            base: 0,
            loops: Vec::new(),
            computed: vec![(1, half)],
        };
        assert_eq!(fractional.resolve(&f), None);
    }
}
