//! Dynamic-rank strided views over shared buffers.
//!
//! - [`Buffer`]: the element storage, either reference counted or borrowed
//! - [`StridedView`]: dims/strides/offset over a [`Buffer`]
//!
//! Elements live in [`Cell`]s, so any number of views may alias one buffer and
//! still read and write through `&self`. Views are deliberately not `Send`.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::element::{DType, Element};
use crate::{DimensionError, Result, ShapeError};

// ============================================================================
// Validation helpers
// ============================================================================

/// Validate that all accessed offsets stay within `[0, len)`.
fn validate_bounds(len: usize, dims: &[usize], strides: &[isize], offset: isize) -> Result<()> {
    if dims.len() != strides.len() {
        return Err(ShapeError::StrideLengthMismatch {
            dims: dims.len(),
            strides: strides.len(),
        }
        .into());
    }
    // Empty array - no access needed
    if dims.iter().any(|&d| d == 0) {
        return Ok(());
    }
    let mut min_offset = offset;
    let mut max_offset = offset;
    for (&dim, &stride) in dims.iter().zip(strides.iter()) {
        if dim > 1 {
            let end = stride
                .checked_mul(dim as isize - 1)
                .ok_or(ShapeError::OffsetOverflow)?;
            if end >= 0 {
                max_offset = max_offset
                    .checked_add(end)
                    .ok_or(ShapeError::OffsetOverflow)?;
            } else {
                min_offset = min_offset
                    .checked_add(end)
                    .ok_or(ShapeError::OffsetOverflow)?;
            }
        }
    }
    if min_offset < 0 || max_offset < 0 || max_offset as usize >= len {
        return Err(ShapeError::OutOfBuffer {
            min: min_offset,
            max: max_offset,
            len,
        }
        .into());
    }
    Ok(())
}

/// Compute row-major strides (last index varies fastest).
pub fn row_major_strides(dims: &[usize]) -> Vec<isize> {
    let rank = dims.len();
    if rank == 0 {
        return vec![];
    }
    let mut strides = vec![1isize; rank];
    for i in (0..rank - 1).rev() {
        strides[i] = strides[i + 1] * dims[i + 1] as isize;
    }
    strides
}

/// Convert signed extents (as read from image headers) into a shape.
pub fn dims_from_signed(extents: &[i64]) -> Result<Vec<usize>> {
    extents
        .iter()
        .enumerate()
        .map(|(axis, &extent)| {
            usize::try_from(extent).map_err(|_| ShapeError::NegativeExtent { axis, extent }.into())
        })
        .collect()
}

/// Build a row-major view over `data`.
pub fn view<T: Element>(data: Vec<T>, dims: &[usize]) -> Result<StridedView<'static, T>> {
    StridedView::new(data, dims, None, None)
}

// ============================================================================
// Buffer
// ============================================================================

/// Element storage shared by every view derived from it.
pub enum Buffer<'a, T> {
    /// Reference-counted storage; lives as long as the longest-lived view.
    Shared(Rc<[Cell<T>]>),
    /// A caller-owned slice.
    Borrowed(&'a [Cell<T>]),
}

impl<T> Clone for Buffer<'_, T> {
    fn clone(&self) -> Self {
        match self {
            Buffer::Shared(rc) => Buffer::Shared(rc.clone()),
            Buffer::Borrowed(slice) => Buffer::Borrowed(*slice),
        }
    }
}

impl<T> Buffer<'_, T> {
    #[inline]
    pub fn cells(&self) -> &[Cell<T>] {
        match self {
            Buffer::Shared(rc) => &rc[..],
            Buffer::Borrowed(slice) => *slice,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells().is_empty()
    }

    /// Whether two buffers are the same storage.
    pub fn ptr_eq(&self, other: &Buffer<'_, T>) -> bool {
        std::ptr::eq(self.cells().as_ptr(), other.cells().as_ptr())
    }
}

impl<T> From<Vec<T>> for Buffer<'static, T> {
    fn from(data: Vec<T>) -> Self {
        let cells: Vec<Cell<T>> = data.into_iter().map(Cell::new).collect();
        Buffer::Shared(Rc::from(cells))
    }
}

impl<'a, T> From<&'a mut [T]> for Buffer<'a, T> {
    fn from(data: &'a mut [T]) -> Self {
        Buffer::Borrowed(Cell::from_mut(data).as_slice_of_cells())
    }
}

impl<'a, T> From<&'a [Cell<T>]> for Buffer<'a, T> {
    fn from(cells: &'a [Cell<T>]) -> Self {
        Buffer::Borrowed(cells)
    }
}

// ============================================================================
// StridedView
// ============================================================================

/// Dynamic-rank strided view.
///
/// The flat buffer index of `(i0, .., ik)` is `offset + Σ strides[a] * i[a]`.
/// Only construction validates the window; every transform is pure metadata
/// arithmetic and `get`/`set` do no per-axis checks.
pub struct StridedView<'a, T> {
    data: Buffer<'a, T>,
    dims: Rc<[usize]>,
    strides: Rc<[isize]>,
    offset: isize,
}

impl<T> Clone for StridedView<'_, T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
        }
    }
}

impl<T> fmt::Debug for StridedView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StridedView")
            .field("dims", &self.dims)
            .field("strides", &self.strides)
            .field("offset", &self.offset)
            .field("buffer_len", &self.data.len())
            .finish()
    }
}

impl<'a, T> StridedView<'a, T> {
    /// Create a view over `data`.
    ///
    /// Omitted `strides` default to row-major. An omitted `offset` defaults to
    /// 0 and is then shifted so that every axis with a negative stride starts
    /// at its last element, keeping `0..dims[a]` inside the buffer.
    pub fn new(
        data: impl Into<Buffer<'a, T>>,
        dims: &[usize],
        strides: Option<&[isize]>,
        offset: Option<isize>,
    ) -> Result<Self> {
        let data = data.into();
        let strides = match strides {
            Some(s) => s.to_vec(),
            None => row_major_strides(dims),
        };
        let offset = match offset {
            Some(o) => o,
            None => dims
                .iter()
                .zip(strides.iter())
                .filter(|&(&d, &s)| s < 0 && d > 0)
                .fold(0isize, |acc, (&d, &s)| acc - (d as isize - 1) * s),
        };
        validate_bounds(data.len(), dims, &strides, offset)?;
        Ok(Self::from_parts(data, dims.into(), strides.into(), offset))
    }

    /// Row-major view borrowing a caller-owned slice.
    pub fn from_slice(data: &'a mut [T], dims: &[usize]) -> Result<Self> {
        Self::new(data, dims, None, None)
    }

    fn from_parts(data: Buffer<'a, T>, dims: Rc<[usize]>, strides: Rc<[isize]>, offset: isize) -> Self {
        Self {
            data,
            dims,
            strides,
            offset,
        }
    }

    fn derive(&self, dims: Vec<usize>, strides: Vec<isize>, offset: isize) -> Self {
        Self::from_parts(self.data.clone(), dims.into(), strides.into(), offset)
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> isize {
        self.offset
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims.iter().any(|&d| d == 0)
    }

    #[inline]
    pub fn buffer(&self) -> &Buffer<'a, T> {
        &self.data
    }

    /// The whole underlying buffer, not just this view's window.
    #[inline]
    pub fn cells(&self) -> &[Cell<T>] {
        self.data.cells()
    }

    pub fn shares_buffer_with(&self, other: &StridedView<'_, T>) -> bool {
        self.data.ptr_eq(&other.data)
    }

    #[inline]
    fn flat_index(&self, indices: &[usize]) -> isize {
        indices
            .iter()
            .zip(self.strides.iter())
            .fold(self.offset, |acc, (&i, &s)| acc + i as isize * s)
    }

    #[inline]
    fn cell(&self, indices: &[usize]) -> &Cell<T> {
        self.cell_at(self.flat_index(indices))
    }

    /// Cell at a flat buffer position; panics outside the buffer.
    #[inline]
    fn cell_at(&self, flat: isize) -> &Cell<T> {
        let cells = self.data.cells();
        match usize::try_from(flat).ok().and_then(|i| cells.get(i)) {
            Some(cell) => cell,
            None => panic!(
                "flat index {} outside buffer of length {}",
                flat,
                cells.len()
            ),
        }
    }

    /// Shrink the window from below: each supplied bound advances the origin
    /// along its axis and shortens that axis by the same amount.
    pub fn lo(&self, bounds: &[Option<usize>]) -> Self {
        let mut dims = self.dims.to_vec();
        let mut offset = self.offset;
        for (axis, bound) in bounds.iter().enumerate().take(self.ndim()) {
            if let Some(b) = *bound {
                offset += self.strides[axis] * b as isize;
                dims[axis] = dims[axis].saturating_sub(b);
            }
        }
        self.derive(dims, self.strides.to_vec(), offset)
    }

    /// Cap the window from above: each supplied bound becomes the new extent.
    pub fn hi(&self, bounds: &[Option<usize>]) -> Self {
        let mut dims = self.dims.to_vec();
        for (axis, bound) in bounds.iter().enumerate().take(self.ndim()) {
            if let Some(b) = *bound {
                dims[axis] = b;
            }
        }
        self.derive(dims, self.strides.to_vec(), self.offset)
    }

    /// Subsample axes by integer steps; a negative step also reverses the axis.
    pub fn step(&self, steps: &[Option<isize>]) -> Result<Self> {
        let mut dims = self.dims.to_vec();
        let mut strides = self.strides.to_vec();
        let mut offset = self.offset;
        for (axis, step) in steps.iter().enumerate().take(self.ndim()) {
            let Some(s) = *step else { continue };
            if s == 0 {
                return Err(DimensionError::ZeroStep { axis }.into());
            }
            if s < 0 && dims[axis] > 0 {
                offset += strides[axis] * (dims[axis] as isize - 1);
            }
            let n = s.unsigned_abs();
            dims[axis] = (dims[axis] + n - 1) / n;
            strides[axis] *= s;
        }
        Ok(self.derive(dims, strides, offset))
    }

    /// Permute axes: axis `k` of the result is axis `perm[k]` of `self`.
    pub fn transpose(&self, perm: &[usize]) -> Result<Self> {
        let rank = self.ndim();
        if perm.len() != rank {
            return Err(DimensionError::RankMismatch(perm.len(), rank).into());
        }
        let mut seen = vec![false; rank];
        for &p in perm {
            if p >= rank || seen[p] {
                return Err(DimensionError::InvalidPermutation {
                    perm: perm.to_vec(),
                    rank,
                }
                .into());
            }
            seen[p] = true;
        }
        let dims = perm.iter().map(|&p| self.dims[p]).collect();
        let strides = perm.iter().map(|&p| self.strides[p]).collect();
        Ok(self.derive(dims, strides, self.offset))
    }

    /// Fix every supplied axis to a coordinate, dropping it from the view.
    pub fn pick(&self, coords: &[Option<usize>]) -> Self {
        let mut dims = Vec::with_capacity(self.ndim());
        let mut strides = Vec::with_capacity(self.ndim());
        let mut offset = self.offset;
        for axis in 0..self.ndim() {
            match coords.get(axis).copied().flatten() {
                Some(i) => offset += self.strides[axis] * i as isize,
                None => {
                    dims.push(self.dims[axis]);
                    strides.push(self.strides[axis]);
                }
            }
        }
        self.derive(dims, strides, offset)
    }
}

impl<T: Copy> StridedView<'_, T> {
    /// Read an element. Coordinates are not checked against `dims`; only a
    /// flat index outside the buffer panics.
    #[inline]
    pub fn get(&self, indices: &[usize]) -> T {
        self.cell(indices).get()
    }

    /// Write an element through a shared reference. Same checking as `get`.
    #[inline]
    pub fn set(&self, indices: &[usize], value: T) {
        self.cell(indices).set(value)
    }

    /// Visit every logical element in row-major order.
    pub fn for_each(&self, mut f: impl FnMut(&[usize], T)) {
        let rank = self.ndim();
        if self.is_empty() {
            return;
        }
        let mut idx = vec![0usize; rank];
        let mut flat = self.offset;
        loop {
            f(&idx, self.cell_at(flat).get());
            let mut d = rank;
            loop {
                if d == 0 {
                    return;
                }
                d -= 1;
                idx[d] += 1;
                flat += self.strides[d];
                if idx[d] < self.dims[d] {
                    break;
                }
                flat -= self.strides[d] * self.dims[d] as isize;
                idx[d] = 0;
            }
        }
    }

    /// Logical elements in row-major order.
    pub fn to_vec(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len());
        self.for_each(|_, v| out.push(v));
        out
    }

    /// A contiguous row-major copy with its own buffer.
    pub fn to_owned(&self) -> StridedView<'static, T> {
        StridedView::contiguous(self.to_vec(), self.dims())
    }
}

impl<T> StridedView<'static, T> {
    /// Row-major view over exactly `dims` elements; caller guarantees the length.
    fn contiguous(data: Vec<T>, dims: &[usize]) -> Self {
        let strides = row_major_strides(dims);
        StridedView::from_parts(data.into(), dims.into(), strides.into(), 0)
    }

    /// Create a row-major view from an owned vector.
    pub fn from_vec(data: Vec<T>, dims: &[usize]) -> Result<Self> {
        StridedView::new(data, dims, None, None)
    }

    /// Create a row-major view with values produced by a function.
    ///
    /// The function is called with indices in row-major iteration order.
    pub fn from_fn_row_major(dims: &[usize], mut f: impl FnMut(&[usize]) -> T) -> Self {
        let total: usize = dims.iter().product();
        let rank = dims.len();
        let mut data = Vec::with_capacity(total);
        let mut idx = vec![0usize; rank];
        for _ in 0..total {
            data.push(f(&idx));
            for d in (0..rank).rev() {
                idx[d] += 1;
                if idx[d] < dims[d] {
                    break;
                }
                idx[d] = 0;
            }
        }
        StridedView::contiguous(data, dims)
    }
}

impl<T: Element> StridedView<'static, T> {
    pub fn zeros(dims: &[usize]) -> Self {
        StridedView::contiguous(vec![T::zero(); dims.iter().product()], dims)
    }

    pub fn ones(dims: &[usize]) -> Self {
        StridedView::contiguous(vec![T::one(); dims.iter().product()], dims)
    }
}

impl<T: Element> StridedView<'_, T> {
    #[inline]
    pub fn dtype(&self) -> DType {
        T::DTYPE
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StridedError;

    fn iota(dims: &[usize]) -> StridedView<'static, f64> {
        let n: usize = dims.iter().product();
        view((0..n).map(|x| x as f64).collect(), dims).unwrap()
    }

    #[test]
    fn test_row_major_strides() {
        assert_eq!(row_major_strides(&[3, 4]), vec![4, 1]);
        assert_eq!(row_major_strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert!(row_major_strides(&[]).is_empty());
    }

    #[test]
    fn test_view_get() {
        let v = view(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        assert_eq!(v.ndim(), 2);
        assert_eq!(v.strides(), &[3, 1]);
        assert_eq!(v.len(), 6);
        assert_eq!(v.get(&[0, 0]), 1.0);
        assert_eq!(v.get(&[0, 2]), 3.0);
        assert_eq!(v.get(&[1, 2]), 6.0);
    }

    #[test]
    fn test_negative_stride_shifts_offset() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let v = StridedView::new(data, &[2, 3], Some(&[3, -1][..]), None).unwrap();
        assert_eq!(v.offset(), 2);
        assert_eq!(v.get(&[0, 0]), 3.0);
        assert_eq!(v.get(&[1, 2]), 4.0);
    }

    #[test]
    fn test_explicit_offset_kept() {
        let v = StridedView::new(vec![0u8, 1, 2, 3], &[2], Some(&[2][..]), Some(1)).unwrap();
        assert_eq!(v.to_vec(), vec![1, 3]);
    }

    #[test]
    fn test_validate_bounds() {
        assert!(validate_bounds(6, &[2, 3], &[3, 1], 0).is_ok());
        assert!(validate_bounds(5, &[2, 3], &[3, 1], 0).is_err());
        assert!(validate_bounds(0, &[0, 3], &[3, 1], 0).is_ok());
        assert!(validate_bounds(7, &[2, 3], &[3, 1], 1).is_ok());
        assert!(validate_bounds(6, &[2, 3], &[3, 1], 1).is_err());
    }

    #[test]
    fn test_construction_errors() {
        let err = StridedView::new(vec![0.0; 6], &[2, 3], Some(&[1][..]), None).unwrap_err();
        assert!(matches!(
            err,
            StridedError::Shape(ShapeError::StrideLengthMismatch { dims: 2, strides: 1 })
        ));
        let err = view(vec![0.0; 5], &[2, 3]).unwrap_err();
        assert!(matches!(err, StridedError::Shape(ShapeError::OutOfBuffer { .. })));
    }

    #[test]
    fn test_dims_from_signed() {
        assert_eq!(dims_from_signed(&[4, 0, 2]).unwrap(), vec![4, 0, 2]);
        let err = dims_from_signed(&[4, -1]).unwrap_err();
        assert!(matches!(
            err,
            StridedError::Shape(ShapeError::NegativeExtent { axis: 1, extent: -1 })
        ));
    }

    #[test]
    fn test_borrowed_buffer_writes_through() {
        let mut data = vec![0i32; 6];
        {
            let v = StridedView::new(&mut data[..], &[2, 3], None, None).unwrap();
            v.set(&[0, 0], 1);
            v.set(&[1, 2], 6);
        }
        assert_eq!(data, vec![1, 0, 0, 0, 0, 6]);
        {
            let t = StridedView::from_slice(&mut data[..], &[3, 2]).unwrap();
            assert_eq!(t.get(&[2, 1]), 6);
            t.set(&[0, 1], -1);
        }
        assert_eq!(data[1], -1);
        assert!(StridedView::from_slice(&mut data[..], &[4, 2]).is_err());
    }

    #[test]
    fn test_aliasing_views_share_buffer() {
        let a = iota(&[3, 3]);
        let inner = a.lo(&[Some(1), Some(1)]);
        inner.set(&[0, 0], 100.0);
        assert_eq!(a.get(&[1, 1]), 100.0);
        assert!(inner.shares_buffer_with(&a));
        assert!(!a.to_owned().shares_buffer_with(&a));
    }

    #[test]
    fn test_lo_hi() {
        let a = iota(&[4, 5]);
        let lo = a.lo(&[Some(1), Some(2)]);
        assert_eq!(lo.dims(), &[3, 3]);
        assert_eq!(lo.get(&[0, 0]), a.get(&[1, 2]));
        assert_eq!(lo.get(&[2, 2]), a.get(&[3, 4]));

        let hi = a.hi(&[None, Some(2)]);
        assert_eq!(hi.dims(), &[4, 2]);
        assert_eq!(hi.to_vec(), vec![0.0, 1.0, 5.0, 6.0, 10.0, 11.0, 15.0, 16.0]);

        let window = a.hi(&[Some(3), Some(4)]).lo(&[Some(1), Some(1)]);
        assert_eq!(window.dims(), &[2, 3]);
        assert_eq!(window.get(&[1, 2]), a.get(&[2, 3]));
    }

    #[test]
    fn test_lo_saturates() {
        let a = iota(&[3]);
        assert_eq!(a.lo(&[Some(5)]).dims(), &[0]);
        assert!(a.lo(&[Some(5)]).to_vec().is_empty());
    }

    #[test]
    fn test_step() {
        let a = iota(&[7]);
        assert_eq!(a.step(&[Some(2)]).unwrap().to_vec(), vec![0.0, 2.0, 4.0, 6.0]);
        assert_eq!(a.step(&[Some(3)]).unwrap().dims(), &[3]);
        assert_eq!(
            a.step(&[Some(-1)]).unwrap().to_vec(),
            vec![6.0, 5.0, 4.0, 3.0, 2.0, 1.0, 0.0]
        );
        assert_eq!(a.step(&[Some(-3)]).unwrap().to_vec(), vec![6.0, 3.0, 0.0]);
        assert!(matches!(
            a.step(&[Some(0)]),
            Err(StridedError::Dimension(DimensionError::ZeroStep { axis: 0 }))
        ));
    }

    #[test]
    fn test_step_2d_flip_rows() {
        let a = iota(&[2, 3]);
        let f = a.step(&[Some(-1), None]).unwrap();
        assert_eq!(f.to_vec(), vec![3.0, 4.0, 5.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_transpose() {
        let a = iota(&[2, 3]);
        let t = a.transpose(&[1, 0]).unwrap();
        assert_eq!(t.dims(), &[3, 2]);
        assert_eq!(t.strides(), &[1, 3]);
        assert_eq!(t.get(&[2, 1]), a.get(&[1, 2]));
        assert_eq!(t.to_vec(), vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn test_transpose_errors() {
        let a = iota(&[2, 3, 4]);
        assert!(matches!(
            a.transpose(&[0, 1]),
            Err(StridedError::Dimension(DimensionError::RankMismatch(2, 3)))
        ));
        assert!(matches!(
            a.transpose(&[0, 0, 1]),
            Err(StridedError::Dimension(DimensionError::InvalidPermutation { .. }))
        ));
        assert!(a.transpose(&[0, 1, 3]).is_err());
    }

    #[test]
    fn test_pick() {
        let a = iota(&[2, 3, 4]);
        let row = a.pick(&[Some(1), None, Some(2)]);
        assert_eq!(row.dims(), &[3]);
        assert_eq!(row.to_vec(), vec![14.0, 18.0, 22.0]);
        let plane = a.pick(&[None, Some(0)]);
        assert_eq!(plane.dims(), &[2, 4]);
        assert_eq!(plane.get(&[1, 3]), a.get(&[1, 0, 3]));
        let scalar = a.pick(&[Some(1), Some(2), Some(3)]);
        assert_eq!(scalar.ndim(), 0);
        assert_eq!(scalar.get(&[]), 23.0);
    }

    #[test]
    fn test_zeros_ones_from_fn() {
        let z = StridedView::<u16>::zeros(&[2, 2]);
        assert_eq!(z.to_vec(), vec![0; 4]);
        assert_eq!(z.dtype(), DType::U16);
        let o = StridedView::<f32>::ones(&[3]);
        assert_eq!(o.to_vec(), vec![1.0; 3]);
        let f = StridedView::from_fn_row_major(&[2, 3], |idx| (idx[0] * 10 + idx[1]) as i32);
        assert_eq!(f.to_vec(), vec![0, 1, 2, 10, 11, 12]);
    }

    #[test]
    fn test_for_each_visits_row_major() {
        let a = iota(&[2, 2]).transpose(&[1, 0]).unwrap();
        let mut seen = Vec::new();
        a.for_each(|idx, v| seen.push((idx.to_vec(), v)));
        assert_eq!(
            seen,
            vec![
                (vec![0, 0], 0.0),
                (vec![0, 1], 2.0),
                (vec![1, 0], 1.0),
                (vec![1, 1], 3.0)
            ]
        );
    }

    #[test]
    #[should_panic(expected = "outside buffer")]
    fn test_get_outside_buffer_panics() {
        let a = iota(&[2, 2]);
        a.get(&[5, 0]);
    }

    #[test]
    #[should_panic(expected = "outside buffer")]
    fn test_to_vec_past_buffer_panics() {
        let a = iota(&[3]);
        a.hi(&[Some(5)]).to_vec();
    }
}
