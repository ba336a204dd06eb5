//! Callable operators: a template plus its specialization cache.

use std::rc::Rc;

use ndops_view::AnyView;

use crate::cache::{CachePolicy, CacheStats, SpecializationCache};
use crate::compile::compile;
use crate::signature::{Arg, Captures, SignatureKey};
use crate::specialize::{Ret, Specialization};
use crate::template::Template;
use crate::KernelError;

/// Result of calling an operator.
#[derive(Debug, Clone)]
pub enum Value<'a> {
    Number(f64),
    /// One of the call's array arguments, sharing its buffer.
    Array(AnyView<'a>),
    /// The template returned nothing.
    None,
}

impl<'a> Value<'a> {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<AnyView<'a>> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    /// The numeric result, or [`KernelError::UnexpectedResult`].
    pub fn number(&self) -> crate::Result<f64> {
        self.as_number()
            .ok_or(KernelError::UnexpectedResult { expected: "a number" })
    }

    /// The array result, or [`KernelError::UnexpectedResult`].
    pub fn array(self) -> crate::Result<AnyView<'a>> {
        self.into_array()
            .ok_or(KernelError::UnexpectedResult { expected: "an array" })
    }
}

fn into_value<'a>(ret: Ret, args: &[Arg<'a>]) -> Value<'a> {
    match ret {
        Ret::Number(v) => Value::Number(v),
        Ret::Array(slot) => match args.get(slot).and_then(Arg::as_view) {
            Some(v) => Value::Array(v.clone()),
            None => Value::None,
        },
        Ret::Nothing => Value::None,
    }
}

fn check_arity(template: &Template, found: usize) -> crate::Result<()> {
    if found == template.arity() {
        Ok(())
    } else {
        Err(KernelError::ArityMismatch {
            template: template.name().to_string(),
            expected: template.arity(),
            found,
        })
    }
}

/// A template bound to its own specialization cache.
///
/// Calls with a new combination of argument kinds, element types, strides,
/// offsets and capture names compile a specialization once; later calls
/// with the same combination reuse it whatever the extents.
#[derive(Debug)]
pub struct Operator {
    template: Template,
    cache: SpecializationCache,
}

impl Operator {
    pub fn new(template: Template, policy: CachePolicy) -> Self {
        let cache = SpecializationCache::new(template.name(), policy);
        Operator { template, cache }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn name(&self) -> &str {
        self.template.name()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear()
    }

    pub fn call<'a>(&self, args: &[Arg<'a>]) -> crate::Result<Value<'a>> {
        self.call_with(&Captures::default(), args)
    }

    /// Call with named free variables visible to the template.
    pub fn call_with<'a>(&self, captures: &Captures, args: &[Arg<'a>]) -> crate::Result<Value<'a>> {
        let spec = self.specialize(captures, args)?;
        Ok(into_value(spec.run(args, captures), args))
    }

    /// Allocate the first argument, then call.
    ///
    /// The new array is zero-filled, takes the element type of the first
    /// array input and the shape of the largest array input (first wins on
    /// ties). `inputs` are the remaining arguments.
    pub fn call_alloc<'a>(&self, inputs: &[Arg<'a>]) -> crate::Result<AnyView<'static>> {
        let arrays = || inputs.iter().filter_map(Arg::as_view);
        let first = arrays().next().ok_or(KernelError::NoArrayArgument)?;
        let mut largest = first;
        for v in arrays() {
            if v.len() > largest.len() {
                largest = v;
            }
        }
        let dst = AnyView::zeros(first.dtype(), largest.dims());

        let mut args = Vec::with_capacity(inputs.len() + 1);
        args.push(Arg::Array(dst.clone()));
        args.extend(inputs.iter().cloned());
        self.call(&args)?;
        Ok(dst)
    }

    /// Resolve the specialization for these arguments once, for repeated
    /// calls that skip the cache lookup.
    pub fn bake(&self, args: &[Arg<'_>]) -> crate::Result<Baked> {
        self.bake_with(&Captures::default(), args)
    }

    pub fn bake_with(&self, captures: &Captures, args: &[Arg<'_>]) -> crate::Result<Baked> {
        Ok(Baked {
            spec: self.specialize(captures, args)?,
        })
    }

    fn specialize(&self, captures: &Captures, args: &[Arg<'_>]) -> crate::Result<Rc<Specialization>> {
        check_arity(&self.template, args.len())?;
        let key = SignatureKey::of(args, captures);
        self.cache
            .lookup_or_build(&key, || compile(&self.template, &key))
    }
}

/// A specialization pinned to one signature.
///
/// Callers must pass arguments with the same kinds, element types, strides,
/// offsets and capture names as the baking call; extents may differ. This
/// is only checked in debug builds.
#[derive(Debug, Clone)]
pub struct Baked {
    spec: Rc<Specialization>,
}

impl Baked {
    pub fn specialization(&self) -> &Specialization {
        &self.spec
    }

    pub fn call<'a>(&self, args: &[Arg<'a>]) -> crate::Result<Value<'a>> {
        self.call_with(&Captures::default(), args)
    }

    pub fn call_with<'a>(&self, captures: &Captures, args: &[Arg<'a>]) -> crate::Result<Value<'a>> {
        let expected = self.spec.key().params().len();
        if args.len() != expected {
            return Err(KernelError::ArityMismatch {
                template: "baked operator".to_string(),
                expected,
                found: args.len(),
            });
        }
        debug_assert_eq!(&SignatureKey::of(args, captures), self.spec.key());
        Ok(into_value(self.spec.run(args, captures), args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndops_view::{view, DType, StridedView};

    fn op(params: &[&str], src: &str) -> Operator {
        Operator::new(
            Template::parse("test", params, src).unwrap(),
            CachePolicy::Unbounded,
        )
    }

    #[test]
    fn test_default_post_returns_first_param() {
        let fill = op(&["a", "v"], "a[...] = v");
        let a = view(vec![0.0f64; 3], &[3]).unwrap();
        let out = fill.call(&[Arg::from(&a), Arg::from(2.5)]).unwrap();
        let out = out.array().unwrap();
        assert_eq!(out.to_f64_vec(), vec![2.5; 3]);
        assert_eq!(a.to_vec(), vec![2.5; 3]);
    }

    #[test]
    fn test_scalar_first_param_returns_number() {
        let id = op(&["x"], "");
        assert_eq!(id.call(&[Arg::from(4.0)]).unwrap().number().unwrap(), 4.0);
    }

    #[test]
    fn test_arity_mismatch() {
        let id = op(&["x", "y"], "");
        assert!(matches!(
            id.call(&[Arg::from(1.0)]),
            Err(KernelError::ArityMismatch { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn test_call_alloc_uses_larger_shape_and_first_dtype() {
        let add = op(&["dst", "a", "b"], "dst[...] = a[...] + b[...]");
        let a = view(vec![1u8, 2], &[2]).unwrap();
        let b = view(vec![10.0f64, 20.0, 30.0], &[3]).unwrap();
        let out = add.call_alloc(&[Arg::from(&a), Arg::from(&b)]).unwrap();
        assert_eq!(out.dtype(), DType::U8);
        assert_eq!(out.dims(), &[3]);
        // a holds two elements: a[2] reads NaN, which stores as 0 in uint8
        assert_eq!(out.to_f64_vec(), vec![11.0, 22.0, 0.0]);
        assert!(matches!(
            add.call_alloc(&[Arg::from(1.0), Arg::from(2.0)]),
            Err(KernelError::NoArrayArgument)
        ));
    }

    #[test]
    fn test_bake_skips_lookup() {
        let scale = op(&["a", "k"], "a[...] *= k");
        let a = StridedView::from_vec(vec![1.0f32, 2.0, 3.0], &[3]).unwrap();
        let baked = scale.bake(&[Arg::from(&a), Arg::from(2.0)]).unwrap();
        assert_eq!(scale.stats().builds, 1);
        baked.call(&[Arg::from(&a), Arg::from(3.0)]).unwrap();
        baked.call(&[Arg::from(&a), Arg::from(0.5)]).unwrap();
        assert_eq!(scale.stats().hits, 0);
        assert_eq!(a.to_vec(), vec![3.0, 6.0, 9.0]);
        assert_eq!(baked.specialization().rank(), 1);
    }

    #[test]
    fn test_constants_yield_to_parameters() {
        let pi = op(&["x"], "---\n---\nreturn PI + x");
        assert_relative_eq!(
            pi.call(&[Arg::from(1.0)]).unwrap().number().unwrap(),
            std::f64::consts::PI + 1.0
        );
        let shadowed = op(&["E"], "---\n---\nreturn E * 2");
        assert_eq!(shadowed.call(&[Arg::from(3.0)]).unwrap().number().unwrap(), 6.0);
    }

    #[test]
    fn test_captures() {
        let shift = op(&["a"], "a[...] = a[...] * scale + bias");
        let a = view(vec![1.0f64, 2.0], &[2]).unwrap();
        let captures = Captures::new().with("scale", 10.0).with("bias", 1.0);
        shift.call_with(&captures, &[Arg::from(&a)]).unwrap();
        assert_relative_eq!(a.get(&[1]), 21.0);
        assert!(matches!(
            shift.call(&[Arg::from(&a)]),
            Err(KernelError::UnboundIdentifier(name)) if name == "bias" || name == "scale"
        ));
    }
}
