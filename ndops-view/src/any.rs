//! Runtime dispatch over the element types.

use std::cell::Cell;

use crate::element::{DType, Element};
use crate::view::StridedView;

/// Run `$body` with `$T` bound to the Rust type behind a [`DType`] tag.
///
/// ```
/// use ndops_view::{with_dtype, DType};
/// let bytes = with_dtype!(DType::U16, T => std::mem::size_of::<T>());
/// assert_eq!(bytes, 2);
/// ```
#[macro_export]
macro_rules! with_dtype {
    ($dtype:expr, $T:ident => $body:expr) => {
        match $dtype {
            $crate::DType::I8 => {
                type $T = i8;
                $body
            }
            $crate::DType::U8 => {
                type $T = u8;
                $body
            }
            $crate::DType::I16 => {
                type $T = i16;
                $body
            }
            $crate::DType::U16 => {
                type $T = u16;
                $body
            }
            $crate::DType::I32 => {
                type $T = i32;
                $body
            }
            $crate::DType::U32 => {
                type $T = u32;
                $body
            }
            $crate::DType::F32 => {
                type $T = f32;
                $body
            }
            $crate::DType::F64 => {
                type $T = f64;
                $body
            }
        }
    };
}

/// A borrowed cell slice tagged with its element type.
#[derive(Debug, Clone, Copy)]
pub enum AnyCells<'f> {
    I8(&'f [Cell<i8>]),
    U8(&'f [Cell<u8>]),
    I16(&'f [Cell<i16>]),
    U16(&'f [Cell<u16>]),
    I32(&'f [Cell<i32>]),
    U32(&'f [Cell<u32>]),
    F32(&'f [Cell<f32>]),
    F64(&'f [Cell<f64>]),
}

macro_rules! each_cells {
    ($cells:expr, $c:ident => $body:expr) => {
        match $cells {
            AnyCells::I8($c) => $body,
            AnyCells::U8($c) => $body,
            AnyCells::I16($c) => $body,
            AnyCells::U16($c) => $body,
            AnyCells::I32($c) => $body,
            AnyCells::U32($c) => $body,
            AnyCells::F32($c) => $body,
            AnyCells::F64($c) => $body,
        }
    };
}

impl AnyCells<'_> {
    pub fn dtype(&self) -> DType {
        match self {
            AnyCells::I8(_) => DType::I8,
            AnyCells::U8(_) => DType::U8,
            AnyCells::I16(_) => DType::I16,
            AnyCells::U16(_) => DType::U16,
            AnyCells::I32(_) => DType::I32,
            AnyCells::U32(_) => DType::U32,
            AnyCells::F32(_) => DType::F32,
            AnyCells::F64(_) => DType::F64,
        }
    }

    pub fn len(&self) -> usize {
        each_cells!(self, c => c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A strided view whose element type is only known at runtime.
#[derive(Debug, Clone)]
pub enum AnyView<'a> {
    I8(StridedView<'a, i8>),
    U8(StridedView<'a, u8>),
    I16(StridedView<'a, i16>),
    U16(StridedView<'a, u16>),
    I32(StridedView<'a, i32>),
    U32(StridedView<'a, u32>),
    F32(StridedView<'a, f32>),
    F64(StridedView<'a, f64>),
}

macro_rules! each_view {
    ($view:expr, $v:ident => $body:expr) => {
        match $view {
            AnyView::I8($v) => $body,
            AnyView::U8($v) => $body,
            AnyView::I16($v) => $body,
            AnyView::U16($v) => $body,
            AnyView::I32($v) => $body,
            AnyView::U32($v) => $body,
            AnyView::F32($v) => $body,
            AnyView::F64($v) => $body,
        }
    };
}

impl<'a> AnyView<'a> {
    /// Allocate a zero-filled row-major view of the given element type.
    pub fn zeros(dtype: DType, dims: &[usize]) -> AnyView<'static> {
        with_dtype!(dtype, T => AnyView::from(StridedView::<T>::zeros(dims)))
    }

    pub fn dtype(&self) -> DType {
        each_view!(self, v => v.dtype())
    }

    pub fn dims(&self) -> &[usize] {
        each_view!(self, v => v.dims())
    }

    pub fn strides(&self) -> &[isize] {
        each_view!(self, v => v.strides())
    }

    pub fn offset(&self) -> isize {
        each_view!(self, v => v.offset())
    }

    pub fn ndim(&self) -> usize {
        self.dims().len()
    }

    pub fn len(&self) -> usize {
        self.dims().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.dims().iter().any(|&d| d == 0)
    }

    /// The whole underlying buffer, tagged with its element type.
    pub fn cells(&self) -> AnyCells<'_> {
        each_view!(self, v => Element::erase(v.cells()))
    }

    /// Borrow as a typed view if the element type matches.
    pub fn downcast<T: Element>(&self) -> Option<&StridedView<'a, T>> {
        T::view_of(self)
    }

    /// Convert into a typed view if the element type matches.
    pub fn into_typed<T: Element>(self) -> Option<StridedView<'a, T>> {
        T::from_any(self)
    }

    /// Read one element widened to `f64`.
    pub fn get_f64(&self, indices: &[usize]) -> f64 {
        each_view!(self, v => v.get(indices).to_f64())
    }

    /// Logical elements in row-major order, widened to `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        each_view!(self, v => v.to_vec().into_iter().map(Element::to_f64).collect())
    }

    /// A contiguous row-major copy with its own buffer.
    pub fn to_owned(&self) -> AnyView<'static> {
        each_view!(self, v => AnyView::from(v.to_owned()))
    }

    /// See [`StridedView::pick`].
    pub fn pick(&self, coords: &[Option<usize>]) -> AnyView<'a> {
        each_view!(self, v => AnyView::from(v.pick(coords)))
    }

    /// See [`StridedView::transpose`].
    pub fn transpose(&self, perm: &[usize]) -> crate::Result<AnyView<'a>> {
        each_view!(self, v => Ok(AnyView::from(v.transpose(perm)?)))
    }
}

impl<'a, T: Element> From<StridedView<'a, T>> for AnyView<'a> {
    fn from(view: StridedView<'a, T>) -> Self {
        T::into_any(view)
    }
}

impl<'a, T: Element> From<&StridedView<'a, T>> for AnyView<'a> {
    fn from(view: &StridedView<'a, T>) -> Self {
        T::into_any(view.clone())
    }
}

impl<'a> From<&AnyView<'a>> for AnyView<'a> {
    fn from(view: &AnyView<'a>) -> Self {
        view.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::view;

    #[test]
    fn test_any_view_roundtrip() {
        let v = view(vec![1i32, 2, 3, 4], &[2, 2]).unwrap();
        let any = AnyView::from(v.clone());
        assert_eq!(any.dtype(), DType::I32);
        assert_eq!(any.dims(), &[2, 2]);
        assert_eq!(any.get_f64(&[1, 0]), 3.0);
        assert!(any.downcast::<f64>().is_none());
        let back = any.into_typed::<i32>().unwrap();
        assert!(back.shares_buffer_with(&v));
    }

    #[test]
    fn test_any_zeros() {
        let z = AnyView::zeros(DType::U8, &[3, 2]);
        assert_eq!(z.dtype(), DType::U8);
        assert_eq!(z.len(), 6);
        assert_eq!(z.cells().len(), 6);
        assert_eq!(z.cells().dtype(), DType::U8);
        assert_eq!(z.to_f64_vec(), vec![0.0; 6]);
    }

    #[test]
    fn test_any_pick_and_transpose() {
        let any = AnyView::from(view(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap());
        let row = any.pick(&[Some(1), None]);
        assert_eq!(row.dims(), &[3]);
        assert_eq!(row.to_f64_vec(), vec![4.0, 5.0, 6.0]);
        let t = any.transpose(&[1, 0]).unwrap();
        assert_eq!(t.dims(), &[3, 2]);
        assert_eq!(t.get_f64(&[2, 0]), 3.0);
        assert!(any.transpose(&[0, 0]).is_err());
    }

    #[test]
    fn test_with_dtype_dispatch() {
        for dtype in [DType::I8, DType::U32, DType::F64] {
            let size = with_dtype!(dtype, T => std::mem::size_of::<T>());
            assert_eq!(size, dtype.size_of());
        }
    }
}
