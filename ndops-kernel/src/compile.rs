//! Specialize a [`Template`] for one [`SignatureKey`].
//!
//! The iteration shape comes from the body's indexed array references: every
//! axis indexed by a loop name (or `...`) bounds that loop level, while axes
//! with computed indices do not. Omitted trailing indices are right-aligned
//! to the loop names, so axis `j` of a rank-`r` array defaults to loop
//! position `r - 1 - j`. Bare array names in the body use the same defaults
//! but do not bound the loops. A level below the highest bound one that no
//! axis bounds runs once.
//!
//! Names resolve in this order: loop index (body only), parameter, `var`
//! local, capture, then the constants `PI` and `E`. Anything else is an
//! [`KernelError::UnboundIdentifier`].

use rustc_hash::FxHashMap;

use ndops_view::{with_dtype, DType, Element};

use crate::ast::{truthy, AssignOp, BinOp, Expr, Func, Place, Stmt, Subscript};
use crate::signature::{ParamSig, SignatureKey};
use crate::specialize::{run_block, Eval, Exec, FlatIndex, Flow, Frame, Ret, Specialization};
use crate::template::Template;
use crate::{KernelError, LOOP_INDEX_NAMES, MAX_RANK};

/// Loop position of a loop index name (`iX` is 0).
pub(crate) fn loop_position(name: &str) -> Option<usize> {
    LOOP_INDEX_NAMES.iter().position(|n| *n == name)
}

pub(crate) fn compile(template: &Template, key: &SignatureKey) -> crate::Result<Specialization> {
    if key.params().len() != template.arity() {
        return Err(KernelError::ArityMismatch {
            template: template.name().to_string(),
            expected: template.arity(),
            found: key.params().len(),
        });
    }
    for sig in key.params() {
        if let Some(rank) = sig.rank() {
            if rank > MAX_RANK {
                return Err(KernelError::RankLimit {
                    rank,
                    max: MAX_RANK,
                });
            }
        }
    }

    let mut scope = Scope::new(template, key);
    let extents = scope.loop_extents()?;

    let prep = scope.block(template.prep())?;
    scope.in_body = true;
    let body = scope.block(template.body())?;
    scope.in_body = false;
    let post = match template.post() {
        Some(post) => scope.block(post)?,
        None => match template.params().first() {
            Some(first) => scope.block(&[Stmt::ret(Expr::ident(first))])?,
            None => Vec::new(),
        },
    };

    Ok(Specialization {
        key: key.clone(),
        extents,
        n_locals: scope.n_locals,
        scalar_params: scope.scalar_params,
        prep,
        body,
        post,
    })
}

/// One axis of an array reference.
enum Axis<'e> {
    Loop(usize),
    Computed(&'e Expr),
}

struct ArrayParam<'k> {
    slot: usize,
    dtype: DType,
    strides: &'k [isize],
    offset: isize,
}

struct Scope<'t> {
    template: &'t Template,
    key: &'t SignatureKey,
    params: FxHashMap<&'t str, usize>,
    locals: FxHashMap<String, usize>,
    captures: FxHashMap<&'t str, usize>,
    scalar_params: Vec<(usize, usize)>,
    n_locals: usize,
    in_body: bool,
}

impl<'t> Scope<'t> {
    fn new(template: &'t Template, key: &'t SignatureKey) -> Self {
        let params = template
            .params()
            .iter()
            .enumerate()
            .map(|(i, p)| (p.as_str(), i))
            .collect();
        let captures = key
            .captures()
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let mut locals = FxHashMap::default();
        let mut scalar_params = Vec::new();
        for (i, sig) in key.params().iter().enumerate() {
            if *sig == ParamSig::Scalar {
                let slot = locals.len();
                locals.insert(template.params()[i].clone(), slot);
                scalar_params.push((i, slot));
            }
        }
        for name in template.locals() {
            let slot = locals.len();
            locals.entry(name).or_insert(slot);
        }
        let n_locals = locals.len();

        Scope {
            template,
            key,
            params,
            locals,
            captures,
            scalar_params,
            n_locals,
            in_body: false,
        }
    }

    fn array(&self, name: &str) -> Option<ArrayParam<'t>> {
        let slot = *self.params.get(name)?;
        match &self.key.params()[slot] {
            ParamSig::Array {
                dtype,
                strides,
                offset,
            } => Some(ArrayParam {
                slot,
                dtype: *dtype,
                strides,
                offset: *offset,
            }),
            ParamSig::Scalar => None,
        }
    }

    /// Bounds of each loop level, from the body's indexed references.
    fn loop_extents(&self) -> crate::Result<Vec<Vec<(usize, usize)>>> {
        let mut refs: Vec<(&'t str, Option<&'t Subscript>)> = Vec::new();
        visit_refs(self.template.body(), &mut |name, sub| refs.push((name, sub)));

        let mut bound: Vec<(usize, usize, usize)> = Vec::new(); // (pos, param, axis)
        for (name, sub) in refs {
            let Some(arr) = self.array(name) else { continue };
            let Some(sub) = sub else { continue };
            let rank = arr.strides.len();
            for (axis, a) in axes(name, rank, Some(sub), true)?.into_iter().enumerate() {
                if let Axis::Loop(pos) = a {
                    if !bound.contains(&(pos, arr.slot, axis)) {
                        bound.push((pos, arr.slot, axis));
                    }
                }
            }
        }

        let rank = bound.iter().map(|&(pos, ..)| pos + 1).max().unwrap_or(0);
        if rank > MAX_RANK {
            return Err(KernelError::RankLimit {
                rank,
                max: MAX_RANK,
            });
        }
        let mut extents = vec![Vec::new(); rank];
        for (pos, param, axis) in bound {
            extents[pos].push((param, axis));
        }
        Ok(extents)
    }

    fn flat_index(
        &self,
        arr: &ArrayParam<'_>,
        name: &str,
        sub: Option<&Subscript>,
    ) -> crate::Result<FlatIndex> {
        let mut at = FlatIndex {
            base: arr.offset,
            loops: Vec::new(),
            computed: Vec::new(),
        };
        let resolved = axes(name, arr.strides.len(), sub, self.in_body)?;
        for (axis, a) in resolved.into_iter().enumerate() {
            let stride = arr.strides[axis];
            match a {
                Axis::Loop(pos) => {
                    if stride != 0 {
                        at.loops.push((stride, pos));
                    }
                }
                Axis::Computed(e) => at.computed.push((stride, self.expr(e)?)),
            }
        }
        Ok(at)
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn block(&self, stmts: &[Stmt]) -> crate::Result<Vec<Exec>> {
        stmts.iter().map(|s| self.stmt(s)).collect()
    }

    fn stmt(&self, stmt: &Stmt) -> crate::Result<Exec> {
        Ok(match stmt {
            Stmt::Var(decls) => {
                let mut inits = Vec::new();
                for (name, init) in decls {
                    if let Some(e) = init {
                        inits.push(self.assign_local(name, AssignOp::Set, e)?);
                    }
                }
                Box::new(move |f: &Frame<'_>| run_block(&inits, f))
            }
            Stmt::Assign(place, op, value) => self.assign(place, *op, value)?,
            Stmt::If(cond, then, otherwise) => {
                let cond = self.expr(cond)?;
                let then = self.block(then)?;
                let otherwise = self.block(otherwise)?;
                Box::new(move |f: &Frame<'_>| {
                    if truthy(cond(f)) {
                        run_block(&then, f)
                    } else {
                        run_block(&otherwise, f)
                    }
                })
            }
            Stmt::Block(inner) => {
                let inner = self.block(inner)?;
                Box::new(move |f: &Frame<'_>| run_block(&inner, f))
            }
            Stmt::Return(None) => Box::new(|_: &Frame<'_>| Flow::Return(Ret::Nothing)),
            Stmt::Return(Some(Expr::Ident(name))) if self.array(name).is_some() => {
                let slot = self.params[name.as_str()];
                Box::new(move |_: &Frame<'_>| Flow::Return(Ret::Array(slot)))
            }
            Stmt::Return(Some(e)) => {
                let e = self.expr(e)?;
                Box::new(move |f: &Frame<'_>| Flow::Return(Ret::Number(e(f))))
            }
            Stmt::Expr(e) => {
                let e = self.expr(e)?;
                Box::new(move |f: &Frame<'_>| {
                    e(f);
                    Flow::Next
                })
            }
        })
    }

    fn assign(&self, place: &Place, op: AssignOp, value: &Expr) -> crate::Result<Exec> {
        let (name, sub) = match place {
            Place::Name(n) => (n, None),
            Place::Element(n, s) => (n, Some(s)),
        };
        if let Some(arr) = self.array(name) {
            if sub.is_none() && !self.in_body {
                return Err(KernelError::BareArray(name.clone()));
            }
            let at = self.flat_index(&arr, name, sub)?;
            let value = self.expr(value)?;
            return Ok(with_dtype!(arr.dtype, T => store::<T>(arr.slot, at, op, value)));
        }
        if sub.is_some() || !self.locals.contains_key(name.as_str()) {
            return Err(KernelError::NotAssignable(name.clone()));
        }
        self.assign_local(name, op, value)
    }

    fn assign_local(&self, name: &str, op: AssignOp, value: &Expr) -> crate::Result<Exec> {
        let slot = *self
            .locals
            .get(name)
            .ok_or_else(|| KernelError::NotAssignable(name.to_string()))?;
        let value = self.expr(value)?;
        Ok(Box::new(move |f: &Frame<'_>| {
            let v = value(f);
            let cell = &f.locals[slot];
            cell.set(op.apply(cell.get(), v));
            Flow::Next
        }))
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expr(&self, e: &Expr) -> crate::Result<Eval> {
        Ok(match e {
            Expr::Num(v) => {
                let v = *v;
                Box::new(move |_: &Frame<'_>| v)
            }
            Expr::Ident(name) => self.ident(name)?,
            Expr::Unary(op, inner) => {
                let g = op.eval_fn();
                let inner = self.expr(inner)?;
                Box::new(move |f: &Frame<'_>| g(inner(f)))
            }
            Expr::Binary(BinOp::And, l, r) => {
                let (l, r) = (self.expr(l)?, self.expr(r)?);
                Box::new(move |f: &Frame<'_>| {
                    let a = l(f);
                    if truthy(a) {
                        r(f)
                    } else {
                        a
                    }
                })
            }
            Expr::Binary(BinOp::Or, l, r) => {
                let (l, r) = (self.expr(l)?, self.expr(r)?);
                Box::new(move |f: &Frame<'_>| {
                    let a = l(f);
                    if truthy(a) {
                        a
                    } else {
                        r(f)
                    }
                })
            }
            Expr::Binary(op, l, r) => {
                let g = op.eval_fn();
                let (l, r) = (self.expr(l)?, self.expr(r)?);
                Box::new(move |f: &Frame<'_>| g(l(f), r(f)))
            }
            Expr::Cond(c, t, o) => {
                let (c, t, o) = (self.expr(c)?, self.expr(t)?, self.expr(o)?);
                Box::new(move |f: &Frame<'_>| if truthy(c(f)) { t(f) } else { o(f) })
            }
            Expr::Call(func, args) => self.call(*func, args)?,
            Expr::Element(name, sub) => self.load(name, Some(sub))?,
            Expr::Length(name) => match self.array(name) {
                Some(arr) => {
                    let slot = arr.slot;
                    Box::new(move |f: &Frame<'_>| f.dims[slot].iter().product::<usize>() as f64)
                }
                None => self.scalar_member(name)?,
            },
            Expr::Ndim(name) => match self.array(name) {
                Some(arr) => {
                    let rank = arr.strides.len() as f64;
                    Box::new(move |_: &Frame<'_>| rank)
                }
                None => self.scalar_member(name)?,
            },
            Expr::Extent(name, k) => match self.array(name) {
                Some(arr) => {
                    let slot = arr.slot;
                    let k = self.expr(k)?;
                    Box::new(move |f: &Frame<'_>| {
                        let k = k(f);
                        if k.fract() != 0.0 || k < 0.0 {
                            return f64::NAN;
                        }
                        f.dims[slot].get(k as usize).map_or(f64::NAN, |&d| d as f64)
                    })
                }
                None => self.scalar_member(name)?,
            },
        })
    }

    /// Members of a scalar read as NaN; unknown names are still errors.
    fn scalar_member(&self, name: &str) -> crate::Result<Eval> {
        self.ident(name)?;
        Ok(Box::new(|_: &Frame<'_>| f64::NAN))
    }

    fn ident(&self, name: &str) -> crate::Result<Eval> {
        if let Some(pos) = loop_position(name) {
            if !self.in_body {
                return Err(KernelError::UnboundIdentifier(name.to_string()));
            }
            return Ok(Box::new(move |f: &Frame<'_>| f.index[pos].get() as f64));
        }
        if self.array(name).is_some() {
            if !self.in_body {
                return Err(KernelError::BareArray(name.to_string()));
            }
            return self.load(name, None);
        }
        if let Some(&slot) = self.locals.get(name) {
            return Ok(Box::new(move |f: &Frame<'_>| f.locals[slot].get()));
        }
        if let Some(&slot) = self.captures.get(name) {
            return Ok(Box::new(move |f: &Frame<'_>| f.captures[slot]));
        }
        let constant = match name {
            "PI" => std::f64::consts::PI,
            "E" => std::f64::consts::E,
            _ => return Err(KernelError::UnboundIdentifier(name.to_string())),
        };
        Ok(Box::new(move |_: &Frame<'_>| constant))
    }

    /// Element read; a subscripted scalar parameter reads the scalar.
    fn load(&self, name: &str, sub: Option<&Subscript>) -> crate::Result<Eval> {
        match self.array(name) {
            Some(arr) => {
                let at = self.flat_index(&arr, name, sub)?;
                Ok(with_dtype!(arr.dtype, T => load::<T>(arr.slot, at)))
            }
            None => self.ident(name),
        }
    }

    fn call(&self, func: Func, args: &[Expr]) -> crate::Result<Eval> {
        let mut args = args
            .iter()
            .map(|a| self.expr(a))
            .collect::<crate::Result<Vec<_>>>()?;
        let (lo, hi) = func.arity();
        if args.len() < lo || args.len() > hi {
            return Err(KernelError::ArityMismatch {
                template: format!("{:?}", func),
                expected: lo,
                found: args.len(),
            });
        }
        Ok(match (func, args.len()) {
            (Func::Max | Func::Min, n) if n > 2 => {
                let g = func.eval2();
                Box::new(move |f: &Frame<'_>| {
                    let mut acc = args[0](f);
                    for a in &args[1..] {
                        acc = g(acc, a(f));
                    }
                    acc
                })
            }
            (_, 2) => {
                let g = func.eval2();
                let b = args.pop();
                let a = args.pop();
                match (a, b) {
                    (Some(a), Some(b)) => Box::new(move |f: &Frame<'_>| g(a(f), b(f))),
                    _ => Box::new(|_: &Frame<'_>| f64::NAN),
                }
            }
            _ => {
                let g = func.eval1();
                match args.pop() {
                    Some(a) => Box::new(move |f: &Frame<'_>| g(a(f))),
                    None => Box::new(|_: &Frame<'_>| f64::NAN),
                }
            }
        })
    }
}

/// Resolve every axis of a reference to `name` (rank `rank`).
fn axes<'e>(
    name: &str,
    rank: usize,
    sub: Option<&'e Subscript>,
    in_body: bool,
) -> crate::Result<Vec<Axis<'e>>> {
    let explicit: &'e [Expr] = match sub {
        Some(Subscript::At(indices)) => indices,
        Some(Subscript::All) | None => &[],
    };
    if explicit.len() > rank {
        return Err(KernelError::TooManyIndices {
            name: name.to_string(),
            count: explicit.len(),
            rank,
        });
    }
    let mut out = Vec::with_capacity(rank);
    for e in explicit {
        match e {
            Expr::Ident(n) => match loop_position(n) {
                Some(_) if !in_body => return Err(KernelError::UnboundIdentifier(n.clone())),
                Some(pos) => out.push(Axis::Loop(pos)),
                None => out.push(Axis::Computed(e)),
            },
            _ => out.push(Axis::Computed(e)),
        }
    }
    for j in explicit.len()..rank {
        out.push(Axis::Loop(rank - 1 - j));
    }
    Ok(out)
}

/// Visit every array-like reference in a block: `(name, subscript)`, where a
/// bare name has no subscript.
fn visit_refs<'t>(block: &'t [Stmt], cb: &mut impl FnMut(&'t str, Option<&'t Subscript>)) {
    for stmt in block {
        match stmt {
            Stmt::Var(decls) => {
                for (_, init) in decls {
                    if let Some(e) = init {
                        visit_expr(e, cb);
                    }
                }
            }
            Stmt::Assign(place, _, value) => {
                match place {
                    Place::Name(n) => cb(n, None),
                    Place::Element(n, sub) => {
                        cb(n, Some(sub));
                        visit_subscript(sub, cb);
                    }
                }
                visit_expr(value, cb);
            }
            Stmt::If(cond, then, otherwise) => {
                visit_expr(cond, cb);
                visit_refs(then, cb);
                visit_refs(otherwise, cb);
            }
            Stmt::Block(inner) => visit_refs(inner, cb),
            Stmt::Return(Some(e)) | Stmt::Expr(e) => visit_expr(e, cb),
            Stmt::Return(None) => {}
        }
    }
}

fn visit_subscript<'t>(sub: &'t Subscript, cb: &mut impl FnMut(&'t str, Option<&'t Subscript>)) {
    if let Subscript::At(indices) = sub {
        for e in indices {
            visit_expr(e, cb);
        }
    }
}

fn visit_expr<'t>(e: &'t Expr, cb: &mut impl FnMut(&'t str, Option<&'t Subscript>)) {
    match e {
        Expr::Num(_) | Expr::Length(_) | Expr::Ndim(_) => {}
        Expr::Ident(n) => cb(n, None),
        Expr::Unary(_, inner) => visit_expr(inner, cb),
        Expr::Binary(_, l, r) => {
            visit_expr(l, cb);
            visit_expr(r, cb);
        }
        Expr::Cond(c, t, o) => {
            visit_expr(c, cb);
            visit_expr(t, cb);
            visit_expr(o, cb);
        }
        Expr::Call(_, args) => {
            for a in args {
                visit_expr(a, cb);
            }
        }
        Expr::Element(n, sub) => {
            cb(n, Some(sub));
            visit_subscript(sub, cb);
        }
        Expr::Extent(_, k) => visit_expr(k, cb),
    }
}

// ============================================================================
// Typed element access
// ============================================================================

fn load<T: Element>(slot: usize, at: FlatIndex) -> Eval {
    Box::new(move |f: &Frame<'_>| {
        at.resolve(f)
            .and_then(|i| f.cells::<T>(slot)?.get(i))
            .map_or(f64::NAN, |c| c.get().to_f64())
    })
}

fn store<T: Element>(slot: usize, at: FlatIndex, op: AssignOp, value: Eval) -> Exec {
    Box::new(move |f: &Frame<'_>| {
        let cell = at.resolve(f).and_then(|i| f.cells::<T>(slot)?.get(i));
        let v = value(f);
        if let Some(cell) = cell {
            cell.set(T::from_f64(op.apply(cell.get().to_f64(), v)));
        }
        Flow::Next
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{Arg, Captures};
    use ndops_view::{view, StridedView};

    fn build(params: &[&str], src: &str, args: &[Arg<'_>]) -> crate::Result<Specialization> {
        let template = Template::parse("test", params, src)?;
        compile(&template, &SignatureKey::of(args, &Captures::new()))
    }

    fn run(params: &[&str], src: &str, args: &[Arg<'_>]) -> Ret {
        build(params, src, args).unwrap().run(args, &Captures::new())
    }

    #[test]
    fn test_partial_reference_fills_default_indices() {
        let a = StridedView::<i32>::zeros(&[2, 3]);
        let args = [Arg::from(&a)];
        let spec = build(&["a"], "a[iY] = iY * 10 + iX", &args).unwrap();
        assert_eq!(spec.rank(), 2);
        assert_eq!(spec.shape(&args), vec![3, 2]);
        spec.run(&args, &Captures::new());
        assert_eq!(a.to_vec(), vec![0, 1, 2, 10, 11, 12]);
    }

    #[test]
    fn test_loops_run_to_largest_extent() {
        let a = StridedView::<f64>::zeros(&[2, 3]);
        let b = StridedView::<f64>::zeros(&[4, 1]);
        let args = [Arg::from(&a), Arg::from(&b)];
        let src = "var n = 0\n---\nvar t = a[...] + b[...]\nn += 1\n---\nreturn n";
        let spec = build(&["a", "b"], src, &args).unwrap();
        assert_eq!(spec.shape(&args), vec![3, 4]);
        assert_eq!(spec.run(&args, &Captures::new()), Ret::Number(12.0));
    }

    #[test]
    fn test_computed_sibling_axis_still_bounds_loop() {
        let a = StridedView::<f64>::zeros(&[3, 2]);
        let args = [Arg::from(&a)];
        let spec = build(&["firstcol"], "firstcol[iY][0] = 1", &args).unwrap();
        assert_eq!(spec.shape(&args), vec![1, 3]);
        spec.run(&args, &Captures::new());
        assert_eq!(a.to_vec(), vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_unbound_level_runs_once() {
        let out = StridedView::<f64>::zeros(&[3]);
        let a = view(vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0], &[3, 2]).unwrap();
        run(&["out", "a"], "out[iY] = a[iY][0]", &[Arg::from(&out), Arg::from(&a)]);
        assert_eq!(out.to_vec(), vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn test_scatter_target_does_not_bound_loop() {
        let counts = StridedView::<i32>::zeros(&[4]);
        let data = view(vec![1u8, 3, 3, 0, 9], &[5]).unwrap();
        let args = [Arg::from(&counts), Arg::from(&data)];
        let spec = build(&["counts", "data"], "counts[data[...]] += 1", &args).unwrap();
        assert_eq!(spec.shape(&args), vec![5]);
        spec.run(&args, &Captures::new());
        // index 9 falls outside the buffer and is dropped
        assert_eq!(counts.to_vec(), vec![1, 1, 0, 2]);
    }

    #[test]
    fn test_bare_array_outside_body() {
        let a = StridedView::<f64>::zeros(&[2]);
        let args = [Arg::from(&a)];
        assert!(matches!(
            build(&["a"], "a = 1\n---\na[...] = 0", &args),
            Err(KernelError::BareArray(name)) if name == "a"
        ));
        assert!(matches!(
            build(&["a"], "---\n---\nreturn a * 2", &args),
            Err(KernelError::BareArray(name)) if name == "a"
        ));
        // returning the array itself is allowed
        assert_eq!(run(&["a"], "---\n---\nreturn a", &args), Ret::Array(0));
    }

    #[test]
    fn test_too_many_indices() {
        let a = StridedView::<f64>::zeros(&[2, 2]);
        assert!(matches!(
            build(&["a"], "a[iX][iY][iZ] = 1", &[Arg::from(&a)]),
            Err(KernelError::TooManyIndices { count: 3, rank: 2, .. })
        ));
    }

    #[test]
    fn test_not_assignable() {
        let a = StridedView::<f64>::zeros(&[2]);
        assert!(matches!(
            build(&["a"], "y = 1", &[Arg::from(&a)]),
            Err(KernelError::NotAssignable(name)) if name == "y"
        ));
        assert!(matches!(
            build(&["k"], "k[0] = 1", &[Arg::from(2.0)]),
            Err(KernelError::NotAssignable(name)) if name == "k"
        ));
        // scalar parameters are locals
        assert_eq!(
            run(&["k"], "---\nk *= 3\n---\nreturn k", &[Arg::from(2.0)]),
            Ret::Number(6.0)
        );
    }

    #[test]
    fn test_loop_index_outside_body() {
        let a = StridedView::<f64>::zeros(&[2]);
        let args = [Arg::from(&a)];
        assert!(matches!(
            build(&["a"], "var q = iX\n---\na[...] = q", &args),
            Err(KernelError::UnboundIdentifier(name)) if name == "iX"
        ));
        assert!(matches!(
            build(&["a"], "---\na[...] = 1\n---\nreturn iY", &args),
            Err(KernelError::UnboundIdentifier(name)) if name == "iY"
        ));
        assert!(matches!(
            build(&["a"], "a[...] = missing", &args),
            Err(KernelError::UnboundIdentifier(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_length_shape_and_ndim() {
        let a = StridedView::<u16>::zeros(&[2, 3]);
        let args = [Arg::from(&a)];
        let src = "---\n---\nreturn a.length * 1000 + a.shape[0] * 100 + a.shape[1] * 10 + a.ndim";
        assert_eq!(run(&["a"], src, &args), Ret::Number(6232.0));
        assert_eq!(
            run(&["a"], "---\n---\nreturn isNaN(a.shape[5]) && isNaN(a.shape[0.5])", &args),
            Ret::Number(1.0)
        );
        assert_eq!(
            run(&["x"], "---\n---\nreturn isNaN(x.length)", &[Arg::from(4.0)]),
            Ret::Number(1.0)
        );
    }

    #[test]
    fn test_rank_limit() {
        let deep = StridedView::<f64>::zeros(&[1; MAX_RANK + 1]);
        assert!(matches!(
            build(&["a"], "a[...] = 1", &[Arg::from(&deep)]),
            Err(KernelError::RankLimit { rank, max: MAX_RANK }) if rank == MAX_RANK + 1
        ));
    }
}
