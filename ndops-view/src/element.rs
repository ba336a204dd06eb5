//! Element types storable in a view and their runtime tags.
//!
//! Every template computes in `f64`; elements are widened on load and narrowed
//! on store with typed-array semantics: integer stores truncate toward zero
//! and wrap modulo 2^bits (non-finite values store as 0), `f32` stores round.

use std::cell::Cell;
use std::fmt;

use num_traits::{AsPrimitive, One, Zero};

use crate::any::{AnyCells, AnyView};
use crate::view::StridedView;

/// Runtime tag for the element representation of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl DType {
    pub fn name(self) -> &'static str {
        match self {
            DType::I8 => "int8",
            DType::U8 => "uint8",
            DType::I16 => "int16",
            DType::U16 => "uint16",
            DType::I32 => "int32",
            DType::U32 => "uint32",
            DType::F32 => "float32",
            DType::F64 => "float64",
        }
    }

    /// Size of one element in bytes.
    pub fn size_of(self) -> usize {
        match self {
            DType::I8 | DType::U8 => 1,
            DType::I16 | DType::U16 => 2,
            DType::I32 | DType::U32 | DType::F32 => 4,
            DType::F64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// ECMAScript `ToUint32`: truncate, then wrap modulo 2^32.
#[inline]
pub fn to_uint32(v: f64) -> u32 {
    if !v.is_finite() {
        return 0;
    }
    v.trunc().rem_euclid(4_294_967_296.0) as u32
}

/// ECMAScript `ToInt32`: `ToUint32` reinterpreted as two's complement.
#[inline]
pub fn to_int32(v: f64) -> i32 {
    to_uint32(v) as i32
}

/// Numeric element storable in a [`StridedView`].
///
/// Implemented for the eight typed-array element kinds. The conversion hooks
/// let runtime-typed code ([`AnyView`], [`AnyCells`]) recover the concrete
/// type through a `match` on the [`DType`] tag.
pub trait Element:
    Copy + Default + PartialOrd + fmt::Debug + Zero + One + AsPrimitive<f64> + 'static
{
    const DTYPE: DType;

    /// Widen to the template value type.
    #[inline(always)]
    fn to_f64(self) -> f64 {
        self.as_()
    }

    /// Narrow from the template value type with typed-array store semantics.
    fn from_f64(v: f64) -> Self;

    fn cells_of(cells: AnyCells<'_>) -> Option<&[Cell<Self>]>;

    fn erase(cells: &[Cell<Self>]) -> AnyCells<'_>;

    fn into_any(view: StridedView<'_, Self>) -> AnyView<'_>;

    fn from_any(view: AnyView<'_>) -> Option<StridedView<'_, Self>>;

    fn view_of<'v, 'a>(view: &'v AnyView<'a>) -> Option<&'v StridedView<'a, Self>>;
}

macro_rules! impl_element {
    ($($t:ty => $tag:ident, $narrow:expr;)*) => {
        $(
            impl Element for $t {
                const DTYPE: DType = DType::$tag;

                #[inline(always)]
                fn from_f64(v: f64) -> Self {
                    ($narrow)(v)
                }

                #[inline(always)]
                fn cells_of(cells: AnyCells<'_>) -> Option<&[Cell<Self>]> {
                    match cells {
                        AnyCells::$tag(c) => Some(c),
                        _ => None,
                    }
                }

                #[inline(always)]
                fn erase(cells: &[Cell<Self>]) -> AnyCells<'_> {
                    AnyCells::$tag(cells)
                }

                fn into_any(view: StridedView<'_, Self>) -> AnyView<'_> {
                    AnyView::$tag(view)
                }

                fn from_any(view: AnyView<'_>) -> Option<StridedView<'_, Self>> {
                    match view {
                        AnyView::$tag(v) => Some(v),
                        _ => None,
                    }
                }

                fn view_of<'v, 'a>(view: &'v AnyView<'a>) -> Option<&'v StridedView<'a, Self>> {
                    match view {
                        AnyView::$tag(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_element! {
    i8 => I8, |v: f64| to_uint32(v) as i8;
    u8 => U8, |v: f64| to_uint32(v) as u8;
    i16 => I16, |v: f64| to_uint32(v) as i16;
    u16 => U16, |v: f64| to_uint32(v) as u16;
    i32 => I32, |v: f64| to_int32(v);
    u32 => U32, |v: f64| to_uint32(v);
    f32 => F32, |v: f64| v as f32;
    f64 => F64, |v: f64| v;
}
