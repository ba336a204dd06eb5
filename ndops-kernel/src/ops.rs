//! The operator table and its typed helpers.

use std::cell::OnceCell;

use rustc_hash::FxHashMap;

use ndops_view::{Element, StridedView};

use crate::catalogue::{BinaryOp, OpKind, Reduction, UnaryOp, Variant};
use crate::config::OpsConfig;
use crate::operator::{Operator, Value};
use crate::signature::Arg;
use crate::template::Template;
use crate::KernelError;

/// Every built-in operator, each with its own specialization cache.
///
/// Built once; helpers look operators up by `(kind, variant)`.
#[derive(Debug)]
pub struct Ops {
    config: OpsConfig,
    table: FxHashMap<(OpKind, Variant), Operator>,
    /// Parsed on first use.
    histogram: OnceCell<Operator>,
}

impl Default for Ops {
    fn default() -> Self {
        Self::new()
    }
}

impl Ops {
    pub fn new() -> Self {
        Self::with_config(OpsConfig::default())
    }

    pub fn with_config(config: OpsConfig) -> Self {
        let policy = config.cache_policy();
        let mut table = FxHashMap::default();
        for kind in OpKind::all() {
            for variant in Variant::ALL {
                // unsupported combinations are skipped
                if let Ok(template) = kind.template(variant) {
                    table.insert((kind, variant), Operator::new(template, policy));
                }
            }
        }
        tracing::debug!(operators = table.len(), ?policy, "built operator table");
        Ops {
            config,
            table,
            histogram: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &OpsConfig {
        &self.config
    }

    /// Number of catalogue operators in the table.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn get(&self, kind: OpKind, variant: Variant) -> crate::Result<&Operator> {
        self.table
            .get(&(kind, variant))
            .ok_or(KernelError::UnsupportedVariant {
                kind: kind.base_name(),
                variant: variant.name(),
            })
    }

    /// Wrap a user template in an operator with this table's cache policy.
    pub fn compile(&self, template: Template) -> Operator {
        Operator::new(template, self.config.cache_policy())
    }

    pub(crate) fn histogram_operator(&self) -> crate::Result<&Operator> {
        if let Some(op) = self.histogram.get() {
            return Ok(op);
        }
        let op = self.compile(crate::stats::histogram_template()?);
        Ok(self.histogram.get_or_init(|| op))
    }

    /// Iterate over every catalogue operator.
    pub fn operators(&self) -> impl Iterator<Item = (&(OpKind, Variant), &Operator)> {
        self.table.iter()
    }

    // ------------------------------------------------------------------
    // Element-wise helpers
    // ------------------------------------------------------------------

    /// `dst = a op b`
    pub fn binary<'a>(
        &self,
        op: BinaryOp,
        dst: impl Into<Arg<'a>>,
        a: impl Into<Arg<'a>>,
        b: impl Into<Arg<'a>>,
    ) -> crate::Result<Value<'a>> {
        self.get(OpKind::Binary(op), Variant::Plain)?
            .call(&[dst.into(), a.into(), b.into()])
    }

    /// `a op b` into a new array shaped like the larger input, typed like `a`.
    pub fn binary_new<'a, T: Element>(
        &self,
        op: BinaryOp,
        a: &StridedView<'a, T>,
        b: impl Into<Arg<'a>>,
    ) -> crate::Result<StridedView<'static, T>> {
        let out = self
            .get(OpKind::Binary(op), Variant::Plain)?
            .call_alloc(&[Arg::from(a), b.into()])?;
        out.into_typed()
            .ok_or(KernelError::UnexpectedResult { expected: "an array of the input type" })
    }

    /// `a = a op b`
    pub fn binary_eq<'a>(
        &self,
        op: BinaryOp,
        a: impl Into<Arg<'a>>,
        b: impl Into<Arg<'a>>,
    ) -> crate::Result<Value<'a>> {
        self.get(OpKind::Binary(op), Variant::InPlace)?
            .call(&[a.into(), b.into()])
    }

    /// `if (mask) dst = a op b`
    pub fn binary_mask<'a>(
        &self,
        op: BinaryOp,
        dst: impl Into<Arg<'a>>,
        a: impl Into<Arg<'a>>,
        b: impl Into<Arg<'a>>,
        mask: impl Into<Arg<'a>>,
    ) -> crate::Result<Value<'a>> {
        self.get(OpKind::Binary(op), Variant::Masked)?
            .call(&[dst.into(), a.into(), b.into(), mask.into()])
    }

    /// `if (mask) a = a op b`
    pub fn binary_eq_mask<'a>(
        &self,
        op: BinaryOp,
        a: impl Into<Arg<'a>>,
        b: impl Into<Arg<'a>>,
        mask: impl Into<Arg<'a>>,
    ) -> crate::Result<Value<'a>> {
        self.get(OpKind::Binary(op), Variant::MaskedInPlace)?
            .call(&[a.into(), b.into(), mask.into()])
    }

    /// `dst = op(a)`
    pub fn unary<'a>(
        &self,
        op: UnaryOp,
        dst: impl Into<Arg<'a>>,
        a: impl Into<Arg<'a>>,
    ) -> crate::Result<Value<'a>> {
        self.get(OpKind::Unary(op), Variant::Plain)?
            .call(&[dst.into(), a.into()])
    }

    /// `op(a)` into a new array shaped and typed like `a`.
    pub fn unary_new<'a, T: Element>(
        &self,
        op: UnaryOp,
        a: &StridedView<'a, T>,
    ) -> crate::Result<StridedView<'static, T>> {
        let out = self
            .get(OpKind::Unary(op), Variant::Plain)?
            .call_alloc(&[Arg::from(a)])?;
        out.into_typed()
            .ok_or(KernelError::UnexpectedResult { expected: "an array of the input type" })
    }

    /// `a = op(a)`
    pub fn unary_eq<'a>(&self, op: UnaryOp, a: impl Into<Arg<'a>>) -> crate::Result<Value<'a>> {
        self.get(OpKind::Unary(op), Variant::InPlace)?
            .call(&[a.into()])
    }

    /// `if (mask) dst = op(a)`
    pub fn unary_mask<'a>(
        &self,
        op: UnaryOp,
        dst: impl Into<Arg<'a>>,
        a: impl Into<Arg<'a>>,
        mask: impl Into<Arg<'a>>,
    ) -> crate::Result<Value<'a>> {
        self.get(OpKind::Unary(op), Variant::Masked)?
            .call(&[dst.into(), a.into(), mask.into()])
    }

    /// `if (mask) a = op(a)`
    pub fn unary_eq_mask<'a>(
        &self,
        op: UnaryOp,
        a: impl Into<Arg<'a>>,
        mask: impl Into<Arg<'a>>,
    ) -> crate::Result<Value<'a>> {
        self.get(OpKind::Unary(op), Variant::MaskedInPlace)?
            .call(&[a.into(), mask.into()])
    }

    // ------------------------------------------------------------------
    // Reductions
    // ------------------------------------------------------------------

    pub fn reduce<'a>(&self, r: Reduction, a: impl Into<Arg<'a>>) -> crate::Result<f64> {
        self.get(OpKind::Reduce(r), Variant::Plain)?
            .call(&[a.into()])?
            .number()
    }

    pub fn sum<'a>(&self, a: impl Into<Arg<'a>>) -> crate::Result<f64> {
        self.reduce(Reduction::Sum, a)
    }

    pub fn prod<'a>(&self, a: impl Into<Arg<'a>>) -> crate::Result<f64> {
        self.reduce(Reduction::Prod, a)
    }

    pub fn inf<'a>(&self, a: impl Into<Arg<'a>>) -> crate::Result<f64> {
        self.reduce(Reduction::Inf, a)
    }

    pub fn sup<'a>(&self, a: impl Into<Arg<'a>>) -> crate::Result<f64> {
        self.reduce(Reduction::Sup, a)
    }

    pub fn any<'a>(&self, a: impl Into<Arg<'a>>) -> crate::Result<bool> {
        Ok(self.reduce(Reduction::Any, a)? != 0.0)
    }

    pub fn all<'a>(&self, a: impl Into<Arg<'a>>) -> crate::Result<bool> {
        Ok(self.reduce(Reduction::All, a)? != 0.0)
    }

    pub fn norm2<'a>(&self, a: impl Into<Arg<'a>>) -> crate::Result<f64> {
        self.reduce(Reduction::Norm2, a)
    }
}
