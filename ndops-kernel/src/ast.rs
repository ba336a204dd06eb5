//! Template syntax tree.
//!
//! Templates are untyped: every value is an `f64`, booleans are `1`/`0`.
//! The tree is produced either by [`crate::parse`] from source text or
//! directly by the operator catalogue.

use ndops_view::{to_int32, to_uint32};

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Not,
    BitNot,
    Neg,
    Plus,
}

/// Infix operators, in the usual C-family precedence classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
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
    /// Short-circuit; yields the deciding operand.
    And,
    /// Short-circuit; yields the deciding operand.
    Or,
}

/// Built-in math functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Func {
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
    Max,
    Min,
    Atan2,
    Pow,
}

/// Compound assignment operators (`Set` is plain `=`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Index suffix on an array reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Subscript {
    /// `a[...]`: every axis takes its default loop index.
    All,
    /// `a[i][j]` or `a[i, j]`; trailing axes take default loop indices.
    At(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Ident(String),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Cond(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
    Element(String, Subscript),
    /// `a.length`
    Length(String),
    /// `a.ndim`
    Ndim(String),
    /// `a.shape[k]`
    Extent(String, Box<Expr>),
}

/// Left-hand side of an assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Place {
    Name(String),
    Element(String, Subscript),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Var(Vec<(String, Option<Expr>)>),
    Assign(Place, AssignOp, Expr),
    If(Expr, Vec<Stmt>, Vec<Stmt>),
    Block(Vec<Stmt>),
    Return(Option<Expr>),
    Expr(Expr),
}

// ============================================================================
// Builders used by the operator catalogue
// ============================================================================

impl Expr {
    pub fn num(v: f64) -> Self {
        Expr::Num(v)
    }

    pub fn ident(name: &str) -> Self {
        Expr::Ident(name.to_string())
    }

    /// `name[...]`
    pub fn each(name: &str) -> Self {
        Expr::Element(name.to_string(), Subscript::All)
    }

    pub fn unary(op: UnOp, e: Expr) -> Self {
        Expr::Unary(op, Box::new(e))
    }

    pub fn binary(op: BinOp, l: Expr, r: Expr) -> Self {
        Expr::Binary(op, Box::new(l), Box::new(r))
    }

    pub fn call(func: Func, args: Vec<Expr>) -> Self {
        Expr::Call(func, args)
    }
}

impl Stmt {
    pub fn var(name: &str, init: Expr) -> Self {
        Stmt::Var(vec![(name.to_string(), Some(init))])
    }

    pub fn set(name: &str, e: Expr) -> Self {
        Stmt::Assign(Place::Name(name.to_string()), AssignOp::Set, e)
    }

    /// `name[...] = e`
    pub fn set_each(name: &str, e: Expr) -> Self {
        Stmt::Assign(
            Place::Element(name.to_string(), Subscript::All),
            AssignOp::Set,
            e,
        )
    }

    pub fn when(cond: Expr, then: Stmt) -> Self {
        Stmt::If(cond, vec![then], Vec::new())
    }

    pub fn ret(e: Expr) -> Self {
        Stmt::Return(Some(e))
    }
}

// ============================================================================
// Evaluation semantics
// ============================================================================

#[inline(always)]
pub(crate) fn truthy(v: f64) -> bool {
    v != 0.0 && !v.is_nan()
}

#[inline(always)]
fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}

fn nan_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.min(b)
    }
}

impl UnOp {
    pub(crate) fn eval_fn(self) -> fn(f64) -> f64 {
        match self {
            UnOp::Not => |x| flag(!truthy(x)),
            UnOp::BitNot => |x| f64::from(!to_int32(x)),
            UnOp::Neg => |x| -x,
            UnOp::Plus => |x| x,
        }
    }
}

impl BinOp {
    /// Strict (non short-circuit) evaluation; `And`/`Or` are handled by the
    /// compiler, which only falls back to this for constant folding.
    pub(crate) fn eval_fn(self) -> fn(f64, f64) -> f64 {
        match self {
            BinOp::Add => |a, b| a + b,
            BinOp::Sub => |a, b| a - b,
            BinOp::Mul => |a, b| a * b,
            BinOp::Div => |a, b| a / b,
            BinOp::Rem => |a, b| a % b,
            BinOp::BitAnd => |a, b| f64::from(to_int32(a) & to_int32(b)),
            BinOp::BitOr => |a, b| f64::from(to_int32(a) | to_int32(b)),
            BinOp::BitXor => |a, b| f64::from(to_int32(a) ^ to_int32(b)),
            BinOp::Shl => |a, b| f64::from(to_int32(a).wrapping_shl(to_uint32(b) & 31)),
            BinOp::Shr => |a, b| f64::from(to_int32(a).wrapping_shr(to_uint32(b) & 31)),
            BinOp::ShrUnsigned => |a, b| f64::from(to_uint32(a).wrapping_shr(to_uint32(b) & 31)),
            BinOp::Eq => |a, b| flag(a == b),
            BinOp::Ne => |a, b| flag(a != b),
            BinOp::Lt => |a, b| flag(a < b),
            BinOp::Gt => |a, b| flag(a > b),
            BinOp::Le => |a, b| flag(a <= b),
            BinOp::Ge => |a, b| flag(a >= b),
            BinOp::And => |a, b| if truthy(a) { b } else { a },
            BinOp::Or => |a, b| if truthy(a) { a } else { b },
        }
    }
}

impl Func {
    pub fn from_name(name: &str) -> Option<Func> {
        Some(match name {
            "abs" => Func::Abs,
            "exp" => Func::Exp,
            "floor" => Func::Floor,
            "log" => Func::Log,
            "round" => Func::Round,
            "sqrt" => Func::Sqrt,
            "acos" => Func::Acos,
            "asin" => Func::Asin,
            "atan" => Func::Atan,
            "ceil" => Func::Ceil,
            "cos" => Func::Cos,
            "sin" => Func::Sin,
            "tan" => Func::Tan,
            "isFinite" => Func::IsFinite,
            "isNaN" => Func::IsNaN,
            "max" => Func::Max,
            "min" => Func::Min,
            "atan2" => Func::Atan2,
            "pow" => Func::Pow,
            _ => return None,
        })
    }

    /// Accepted argument counts (inclusive).
    pub fn arity(self) -> (usize, usize) {
        match self {
            Func::Max | Func::Min => (1, usize::MAX),
            Func::Atan2 | Func::Pow => (2, 2),
            _ => (1, 1),
        }
    }

    pub(crate) fn eval1(self) -> fn(f64) -> f64 {
        match self {
            Func::Abs => f64::abs,
            Func::Exp => f64::exp,
            Func::Floor => f64::floor,
            Func::Log => f64::ln,
            // Halves round toward +Infinity.
            Func::Round => |x| (x + 0.5).floor(),
            Func::Sqrt => f64::sqrt,
            Func::Acos => f64::acos,
            Func::Asin => f64::asin,
            Func::Atan => f64::atan,
            Func::Ceil => f64::ceil,
            Func::Cos => f64::cos,
            Func::Sin => f64::sin,
            Func::Tan => f64::tan,
            Func::IsFinite => |x| flag(x.is_finite()),
            Func::IsNaN => |x| flag(x.is_nan()),
            Func::Max | Func::Min => |x| x,
            Func::Atan2 | Func::Pow => |_| f64::NAN,
        }
    }

    pub(crate) fn eval2(self) -> fn(f64, f64) -> f64 {
        match self {
            Func::Max => nan_max,
            Func::Min => nan_min,
            Func::Atan2 => f64::atan2,
            Func::Pow => f64::powf,
            _ => |_, _| f64::NAN,
        }
    }
}

impl AssignOp {
    #[inline(always)]
    pub(crate) fn apply(self, old: f64, v: f64) -> f64 {
        match self {
            AssignOp::Set => v,
            AssignOp::Add => old + v,
            AssignOp::Sub => old - v,
            AssignOp::Mul => old * v,
            AssignOp::Div => old / v,
            AssignOp::Rem => old % v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_ops_use_int32() {
        let and = BinOp::BitAnd.eval_fn();
        assert_eq!(and(7.9, 3.2), 3.0);
        let shr = BinOp::ShrUnsigned.eval_fn();
        assert_eq!(shr(-1.0, 28.0), 15.0);
        let sar = BinOp::Shr.eval_fn();
        assert_eq!(sar(-16.0, 2.0), -4.0);
        let shl = BinOp::Shl.eval_fn();
        assert_eq!(shl(1.0, 33.0), 2.0);
        assert_eq!(UnOp::BitNot.eval_fn()(0.0), -1.0);
    }

    #[test]
    fn test_logic_yields_operands() {
        assert_eq!(BinOp::And.eval_fn()(2.0, 5.0), 5.0);
        assert_eq!(BinOp::And.eval_fn()(0.0, 5.0), 0.0);
        assert_eq!(BinOp::Or.eval_fn()(0.0, 5.0), 5.0);
        assert_eq!(UnOp::Not.eval_fn()(f64::NAN), 1.0);
    }

    #[test]
    fn test_math_functions() {
        assert_eq!(Func::Round.eval1()(2.5), 3.0);
        assert_eq!(Func::Round.eval1()(-2.5), -2.0);
        assert!(Func::Max.eval2()(1.0, f64::NAN).is_nan());
        assert_eq!(Func::Min.eval2()(1.0, -3.0), -3.0);
        assert_eq!(Func::from_name("isNaN"), Some(Func::IsNaN));
        assert_eq!(Func::from_name("hypot"), None);
        assert_eq!(Func::Pow.arity(), (2, 2));
    }

    #[test]
    fn test_assign_ops() {
        assert_eq!(AssignOp::Add.apply(2.0, 3.0), 5.0);
        assert_eq!(AssignOp::Rem.apply(7.0, 4.0), 3.0);
        assert_eq!(AssignOp::Set.apply(7.0, 4.0), 4.0);
    }
}
