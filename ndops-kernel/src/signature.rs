//! Call arguments and the signature keys that select a specialization.

use std::collections::BTreeMap;

use ndops_view::{AnyView, DType, Element, StridedView};

/// One argument of an operator call.
#[derive(Debug, Clone)]
pub enum Arg<'a> {
    Scalar(f64),
    Array(AnyView<'a>),
}

impl<'a> Arg<'a> {
    pub fn as_view(&self) -> Option<&AnyView<'a>> {
        match self {
            Arg::Array(v) => Some(v),
            Arg::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Arg::Scalar(v) => Some(*v),
            Arg::Array(_) => None,
        }
    }

    /// The part of this argument that goes into a [`SignatureKey`].
    pub fn signature(&self) -> ParamSig {
        match self {
            Arg::Scalar(_) => ParamSig::Scalar,
            Arg::Array(v) => ParamSig::Array {
                dtype: v.dtype(),
                strides: v.strides().into(),
                offset: v.offset(),
            },
        }
    }
}

impl From<f64> for Arg<'_> {
    fn from(v: f64) -> Self {
        Arg::Scalar(v)
    }
}

impl<'a> From<AnyView<'a>> for Arg<'a> {
    fn from(v: AnyView<'a>) -> Self {
        Arg::Array(v)
    }
}

impl<'a> From<&AnyView<'a>> for Arg<'a> {
    fn from(v: &AnyView<'a>) -> Self {
        Arg::Array(v.clone())
    }
}

impl<'a, T: Element> From<StridedView<'a, T>> for Arg<'a> {
    fn from(v: StridedView<'a, T>) -> Self {
        Arg::Array(v.into())
    }
}

impl<'a, T: Element> From<&StridedView<'a, T>> for Arg<'a> {
    fn from(v: &StridedView<'a, T>) -> Self {
        Arg::Array(v.clone().into())
    }
}

/// Per-parameter part of a signature. Extents are deliberately absent: a
/// specialization reads them from the arguments on every call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamSig {
    Scalar,
    Array {
        dtype: DType,
        strides: Box<[isize]>,
        offset: isize,
    },
}

impl ParamSig {
    /// Array rank, `None` for scalars.
    pub fn rank(&self) -> Option<usize> {
        match self {
            ParamSig::Scalar => None,
            ParamSig::Array { strides, .. } => Some(strides.len()),
        }
    }
}

/// Named free variables made visible to a template.
///
/// Kept sorted by name so that the same set of names always produces the
/// same signature and the same capture slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Captures {
    values: BTreeMap<String, f64>,
}

impl Captures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Captures::set`].
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Values in name order.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.values().copied()
    }
}

/// Cache key: everything about a call that changes the generated code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureKey {
    params: Box<[ParamSig]>,
    captures: Box<[String]>,
}

impl SignatureKey {
    pub fn of(args: &[Arg<'_>], captures: &Captures) -> Self {
        SignatureKey {
            params: args.iter().map(Arg::signature).collect(),
            captures: captures.names().map(str::to_string).collect(),
        }
    }

    pub fn params(&self) -> &[ParamSig] {
        &self.params
    }

    /// Capture names in slot order.
    pub fn captures(&self) -> &[String] {
        &self.captures
    }
}
