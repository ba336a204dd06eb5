//! The built-in element-wise and reduction operators.
//!
//! Every operator is an ordinary [`Template`], built directly as a syntax
//! tree. Binary and unary operators come in four [`Variant`]s:
//!
//! | variant         | params                  | body                                  |
//! |-----------------|-------------------------|---------------------------------------|
//! | `Plain`         | `dst, a, b`             | `dst[...] = a[...] OP b[...]`          |
//! | `InPlace`       | `a, b`                  | `a[...] = a[...] OP b[...]`            |
//! | `Masked`        | `dst, a, b, mask`       | `if (mask[...]) dst[...] = ...`        |
//! | `MaskedInPlace` | `a, b, mask`            | `if (mask[...]) a[...] = ...`          |
//!
//! (unary operators drop `b`). Reductions only exist as `Plain`.

use crate::ast::{BinOp, Expr, Func, Stmt, UnOp};
use crate::template::Template;
use crate::KernelError;

/// Binary element-wise operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    ShrUnsigned,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    Max,
    Min,
    Atan2,
    Pow,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 23] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Mod,
        BinaryOp::BitAnd,
        BinaryOp::BitOr,
        BinaryOp::BitXor,
        BinaryOp::Shl,
        BinaryOp::Shr,
        BinaryOp::ShrUnsigned,
        BinaryOp::Eq,
        BinaryOp::Ne,
        BinaryOp::Lt,
        BinaryOp::Gt,
        BinaryOp::Le,
        BinaryOp::Ge,
        BinaryOp::And,
        BinaryOp::Or,
        BinaryOp::Max,
        BinaryOp::Min,
        BinaryOp::Atan2,
        BinaryOp::Pow,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::BitAnd => "band",
            BinaryOp::BitOr => "bor",
            BinaryOp::BitXor => "bxor",
            BinaryOp::Shl => "lshift",
            BinaryOp::Shr => "rshift",
            BinaryOp::ShrUnsigned => "rrshift",
            BinaryOp::Eq => "eq",
            BinaryOp::Ne => "neq",
            BinaryOp::Lt => "lt",
            BinaryOp::Gt => "gt",
            BinaryOp::Le => "leq",
            BinaryOp::Ge => "geq",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Max => "max",
            BinaryOp::Min => "min",
            BinaryOp::Atan2 => "atan2",
            BinaryOp::Pow => "pow",
        }
    }

    fn apply(self, a: Expr, b: Expr) -> Expr {
        let infix = match self {
            BinaryOp::Add => BinOp::Add,
            BinaryOp::Sub => BinOp::Sub,
            BinaryOp::Mul => BinOp::Mul,
            BinaryOp::Div => BinOp::Div,
            BinaryOp::Mod => BinOp::Rem,
            BinaryOp::BitAnd => BinOp::BitAnd,
            BinaryOp::BitOr => BinOp::BitOr,
            BinaryOp::BitXor => BinOp::BitXor,
            BinaryOp::Shl => BinOp::Shl,
            BinaryOp::Shr => BinOp::Shr,
            BinaryOp::ShrUnsigned => BinOp::ShrUnsigned,
            BinaryOp::Eq => BinOp::Eq,
            BinaryOp::Ne => BinOp::Ne,
            BinaryOp::Lt => BinOp::Lt,
            BinaryOp::Gt => BinOp::Gt,
            BinaryOp::Le => BinOp::Le,
            BinaryOp::Ge => BinOp::Ge,
            BinaryOp::And => BinOp::And,
            BinaryOp::Or => BinOp::Or,
            BinaryOp::Max => return Expr::call(Func::Max, vec![a, b]),
            BinaryOp::Min => return Expr::call(Func::Min, vec![a, b]),
            BinaryOp::Atan2 => return Expr::call(Func::Atan2, vec![a, b]),
            BinaryOp::Pow => return Expr::call(Func::Pow, vec![a, b]),
        };
        Expr::binary(infix, a, b)
    }
}

/// Unary element-wise operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    BitNot,
    Neg,
    Recip,
    /// Copy `a` into `dst`.
    Assign,
    Abs,
    Exp,
    Floor,
    Log,
    Round,
    Sqrt,
    Acos,
    Asin,
    Atan,
    Ceil,
    Cos,
    Sin,
    Tan,
    IsFinite,
    IsNaN,
}

impl UnaryOp {
    pub const ALL: [UnaryOp; 20] = [
        UnaryOp::Not,
        UnaryOp::BitNot,
        UnaryOp::Neg,
        UnaryOp::Recip,
        UnaryOp::Assign,
        UnaryOp::Abs,
        UnaryOp::Exp,
        UnaryOp::Floor,
        UnaryOp::Log,
        UnaryOp::Round,
        UnaryOp::Sqrt,
        UnaryOp::Acos,
        UnaryOp::Asin,
        UnaryOp::Atan,
        UnaryOp::Ceil,
        UnaryOp::Cos,
        UnaryOp::Sin,
        UnaryOp::Tan,
        UnaryOp::IsFinite,
        UnaryOp::IsNaN,
    ];

    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Not => "not",
            UnaryOp::BitNot => "bnot",
            UnaryOp::Neg => "neg",
            UnaryOp::Recip => "recip",
            UnaryOp::Assign => "assign",
            UnaryOp::Abs => "abs",
            UnaryOp::Exp => "exp",
            UnaryOp::Floor => "floor",
            UnaryOp::Log => "log",
            UnaryOp::Round => "round",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Acos => "acos",
            UnaryOp::Asin => "asin",
            UnaryOp::Atan => "atan",
            UnaryOp::Ceil => "ceil",
            UnaryOp::Cos => "cos",
            UnaryOp::Sin => "sin",
            UnaryOp::Tan => "tan",
            UnaryOp::IsFinite => "isfinite",
            UnaryOp::IsNaN => "isnan",
        }
    }

    fn apply(self, a: Expr) -> Expr {
        let func = match self {
            UnaryOp::Not => return Expr::unary(UnOp::Not, a),
            UnaryOp::BitNot => return Expr::unary(UnOp::BitNot, a),
            UnaryOp::Neg => return Expr::unary(UnOp::Neg, a),
            UnaryOp::Recip => return Expr::binary(BinOp::Div, Expr::num(1.0), a),
            UnaryOp::Assign => return a,
            UnaryOp::Abs => Func::Abs,
            UnaryOp::Exp => Func::Exp,
            UnaryOp::Floor => Func::Floor,
            UnaryOp::Log => Func::Log,
            UnaryOp::Round => Func::Round,
            UnaryOp::Sqrt => Func::Sqrt,
            UnaryOp::Acos => Func::Acos,
            UnaryOp::Asin => Func::Asin,
            UnaryOp::Atan => Func::Atan,
            UnaryOp::Ceil => Func::Ceil,
            UnaryOp::Cos => Func::Cos,
            UnaryOp::Sin => Func::Sin,
            UnaryOp::Tan => Func::Tan,
            UnaryOp::IsFinite => Func::IsFinite,
            UnaryOp::IsNaN => Func::IsNaN,
        };
        Expr::call(func, vec![a])
    }
}

/// Whole-array reductions to a single number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reduction {
    Sum,
    Prod,
    /// Minimum; NaN elements are skipped.
    Inf,
    /// Maximum; NaN elements are skipped.
    Sup,
    Any,
    All,
    Norm2,
}

impl Reduction {
    pub const ALL: [Reduction; 7] = [
        Reduction::Sum,
        Reduction::Prod,
        Reduction::Inf,
        Reduction::Sup,
        Reduction::Any,
        Reduction::All,
        Reduction::Norm2,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Reduction::Sum => "sum",
            Reduction::Prod => "prod",
            Reduction::Inf => "inf",
            Reduction::Sup => "sup",
            Reduction::Any => "any",
            Reduction::All => "all",
            Reduction::Norm2 => "norm2",
        }
    }

    /// Result for an empty array.
    pub fn identity(self) -> f64 {
        match self {
            Reduction::Sum | Reduction::Any | Reduction::Norm2 => 0.0,
            Reduction::Prod | Reduction::All => 1.0,
            Reduction::Inf => f64::INFINITY,
            Reduction::Sup => f64::NEG_INFINITY,
        }
    }

    fn template(self) -> crate::Result<Template> {
        let acc = || Expr::ident("acc");
        let x = || Expr::ident("x");
        let init = Stmt::var("acc", Expr::num(self.identity()));
        let load = Stmt::var("x", Expr::each("a"));
        let (prep, body, post) = match self {
            Reduction::Sum => (
                vec![init],
                vec![Stmt::set("acc", Expr::binary(BinOp::Add, acc(), Expr::each("a")))],
                vec![Stmt::ret(acc())],
            ),
            Reduction::Prod => (
                vec![init],
                vec![Stmt::set("acc", Expr::binary(BinOp::Mul, acc(), Expr::each("a")))],
                vec![Stmt::ret(acc())],
            ),
            Reduction::Inf | Reduction::Sup => {
                let cmp = if self == Reduction::Inf {
                    BinOp::Lt
                } else {
                    BinOp::Gt
                };
                (
                    vec![init],
                    vec![
                        load,
                        Stmt::when(Expr::binary(cmp, x(), acc()), Stmt::set("acc", x())),
                    ],
                    vec![Stmt::ret(acc())],
                )
            }
            Reduction::Any => (
                Vec::new(),
                vec![Stmt::when(Expr::each("a"), Stmt::ret(Expr::num(1.0)))],
                vec![Stmt::ret(Expr::num(0.0))],
            ),
            Reduction::All => (
                Vec::new(),
                vec![Stmt::when(
                    Expr::unary(UnOp::Not, Expr::each("a")),
                    Stmt::ret(Expr::num(0.0)),
                )],
                vec![Stmt::ret(Expr::num(1.0))],
            ),
            Reduction::Norm2 => (
                vec![init],
                vec![
                    load,
                    Stmt::set(
                        "acc",
                        Expr::binary(BinOp::Add, acc(), Expr::binary(BinOp::Mul, x(), x())),
                    ),
                ],
                vec![Stmt::ret(Expr::call(Func::Sqrt, vec![acc()]))],
            ),
        };
        Template::from_parts(self.name(), vec!["a".into()], prep, body, Some(post))
    }
}

/// Which inputs an element-wise operator writes and whether it is masked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Plain,
    InPlace,
    Masked,
    MaskedInPlace,
}

impl Variant {
    pub const ALL: [Variant; 4] = [
        Variant::Plain,
        Variant::InPlace,
        Variant::Masked,
        Variant::MaskedInPlace,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Variant::Plain => "plain",
            Variant::InPlace => "in-place",
            Variant::Masked => "masked",
            Variant::MaskedInPlace => "masked in-place",
        }
    }

    fn in_place(self) -> bool {
        matches!(self, Variant::InPlace | Variant::MaskedInPlace)
    }

    fn masked(self) -> bool {
        matches!(self, Variant::Masked | Variant::MaskedInPlace)
    }

    /// Suffix appended to the operator name: `addeq`, `add_mask`, ...
    fn suffix(self) -> &'static str {
        match self {
            Variant::Plain => "",
            Variant::InPlace => "eq",
            Variant::Masked => "_mask",
            Variant::MaskedInPlace => "eq_mask",
        }
    }
}

/// A catalogue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Binary(BinaryOp),
    Unary(UnaryOp),
    Reduce(Reduction),
}

impl OpKind {
    /// Every operator kind in catalogue order.
    pub fn all() -> impl Iterator<Item = OpKind> {
        BinaryOp::ALL
            .into_iter()
            .map(OpKind::Binary)
            .chain(UnaryOp::ALL.into_iter().map(OpKind::Unary))
            .chain(Reduction::ALL.into_iter().map(OpKind::Reduce))
    }

    pub fn base_name(self) -> &'static str {
        match self {
            OpKind::Binary(op) => op.name(),
            OpKind::Unary(op) => op.name(),
            OpKind::Reduce(r) => r.name(),
        }
    }

    pub fn supports(self, variant: Variant) -> bool {
        !matches!(self, OpKind::Reduce(_)) || variant == Variant::Plain
    }

    pub fn name(self, variant: Variant) -> String {
        format!("{}{}", self.base_name(), variant.suffix())
    }

    /// Build the template for one variant of this operator.
    pub fn template(self, variant: Variant) -> crate::Result<Template> {
        if !self.supports(variant) {
            return Err(KernelError::UnsupportedVariant {
                kind: self.base_name(),
                variant: variant.name(),
            });
        }
        let value = match self {
            OpKind::Reduce(r) => return r.template(),
            OpKind::Binary(op) => op.apply(Expr::each("a"), Expr::each("b")),
            OpKind::Unary(op) => op.apply(Expr::each("a")),
        };

        let mut params: Vec<String> = Vec::new();
        if !variant.in_place() {
            params.push("dst".into());
        }
        params.push("a".into());
        if matches!(self, OpKind::Binary(_)) {
            params.push("b".into());
        }
        let target = if variant.in_place() { "a" } else { "dst" };
        let mut store = Stmt::set_each(target, value);
        if variant.masked() {
            params.push("mask".into());
            store = Stmt::when(Expr::each("mask"), store);
        }
        Template::from_parts(&self.name(variant), params, Vec::new(), vec![store], None)
    }
}
