//! Tagged expression trees over named unknowns.
//!
//! An [`Expr`] is built from literals, unknown references, arithmetic, comparison relations,
//! intrinsic math functions and calls into opaque [`Surrogate`] models. Trees are evaluated by
//! walking them against a [`Bindings`] implementation that supplies a value for every unknown.

pub mod parse;
mod surrogate;

pub use surrogate::{FnSurrogate, NormalizedSurrogate, Surrogate, SurrogateRegistry};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::hash::BuildHasher;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;
use thiserror::Error;

const DIVISION_EPSILON: f64 = 1e-12;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("Unknown '{0}' has no assigned value")]
    UnboundUnknown(String),

    #[error("Division by near-zero value {0:e}")]
    DivisionByZero(f64),

    #[error("Argument {value} is outside the domain of '{function}'")]
    Domain { function: &'static str, value: f64 },

    #[error("Expression evaluated to a non-finite value")]
    NonFinite,

    #[error("Function '{name}' expects {expected} argument(s), got {actual}")]
    Arity {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Surrogate '{name}' failed: {message}")]
    Surrogate { name: String, message: String },
}

/// Supplies the numeric value of an unknown by name.
pub trait Bindings {
    fn value_of(&self, name: &str) -> Option<f64>;
}

impl<S: BuildHasher> Bindings for HashMap<String, f64, S> {
    fn value_of(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

impl Bindings for BTreeMap<String, f64> {
    fn value_of(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
        }
    }

    fn apply(self, lhs: f64, rhs: f64) -> Result<f64, EvalError> {
        match self {
            BinaryOp::Add => Ok(lhs + rhs),
            BinaryOp::Sub => Ok(lhs - rhs),
            BinaryOp::Mul => Ok(lhs * rhs),
            BinaryOp::Div => {
                if rhs.abs() < DIVISION_EPSILON {
                    Err(EvalError::DivisionByZero(rhs))
                } else {
                    Ok(lhs / rhs)
                }
            }
            BinaryOp::Pow => {
                if lhs < 0.0 && rhs.fract() != 0.0 {
                    return Err(EvalError::Domain {
                        function: "pow",
                        value: lhs,
                    });
                }
                if lhs.abs() < DIVISION_EPSILON && rhs < 0.0 {
                    return Err(EvalError::DivisionByZero(lhs));
                }
                Ok(lhs.powf(rhs))
            }
        }
    }
}

/// Comparison relation of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Le,
    Ge,
    Eq,
}

impl Relation {
    fn symbol(self) -> &'static str {
        match self {
            Relation::Le => "<=",
            Relation::Ge => ">=",
            Relation::Eq => "=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathFn {
    Sqrt,
    Exp,
    Ln,
    Sin,
    Cos,
    Tan,
    Abs,
}

impl MathFn {
    pub fn name(self) -> &'static str {
        match self {
            MathFn::Sqrt => "sqrt",
            MathFn::Exp => "exp",
            MathFn::Ln => "ln",
            MathFn::Sin => "sin",
            MathFn::Cos => "cos",
            MathFn::Tan => "tan",
            MathFn::Abs => "abs",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sqrt" => Some(MathFn::Sqrt),
            "exp" => Some(MathFn::Exp),
            "ln" | "log" => Some(MathFn::Ln),
            "sin" => Some(MathFn::Sin),
            "cos" => Some(MathFn::Cos),
            "tan" => Some(MathFn::Tan),
            "abs" => Some(MathFn::Abs),
            _ => None,
        }
    }

    fn apply(self, x: f64) -> Result<f64, EvalError> {
        let domain = |function: &'static str| -> Result<f64, EvalError> {
            Err(EvalError::Domain { function, value: x })
        };
        match self {
            MathFn::Sqrt if x < 0.0 => domain("sqrt"),
            MathFn::Sqrt => Ok(x.sqrt()),
            MathFn::Exp => Ok(x.exp()),
            MathFn::Ln if x <= 0.0 => domain("ln"),
            MathFn::Ln => Ok(x.ln()),
            MathFn::Sin => Ok(x.sin()),
            MathFn::Cos => Ok(x.cos()),
            MathFn::Tan if x.cos().abs() < DIVISION_EPSILON => domain("tan"),
            MathFn::Tan => Ok(x.tan()),
            MathFn::Abs => Ok(x.abs()),
        }
    }
}

/// A node of an expression tree.
#[derive(Clone)]
pub enum Expr {
    Literal(f64),
    Unknown(String),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Compare {
        rel: Relation,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Func {
        func: MathFn,
        arg: Box<Expr>,
    },
    Call {
        surrogate: Arc<dyn Surrogate>,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn literal(value: f64) -> Self {
        Expr::Literal(value)
    }

    pub fn unknown(name: impl Into<String>) -> Self {
        Expr::Unknown(name.into())
    }

    pub fn call(surrogate: Arc<dyn Surrogate>, args: Vec<Expr>) -> Self {
        Expr::Call { surrogate, args }
    }

    pub fn func(func: MathFn, arg: impl Into<Expr>) -> Self {
        Expr::Func {
            func,
            arg: Box::new(arg.into()),
        }
    }

    pub fn sqrt(self) -> Self {
        Expr::func(MathFn::Sqrt, self)
    }

    pub fn pow(self, exponent: impl Into<Expr>) -> Self {
        Expr::binary(BinaryOp::Pow, self, exponent.into())
    }

    pub fn le(self, rhs: impl Into<Expr>) -> Self {
        Expr::compare(Relation::Le, self, rhs.into())
    }

    pub fn ge(self, rhs: impl Into<Expr>) -> Self {
        Expr::compare(Relation::Ge, self, rhs.into())
    }

    pub fn eq_to(self, rhs: impl Into<Expr>) -> Self {
        Expr::compare(Relation::Eq, self, rhs.into())
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn compare(rel: Relation, lhs: Expr, rhs: Expr) -> Self {
        Expr::Compare {
            rel,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn is_relation(&self) -> bool {
        matches!(self, Expr::Compare { .. })
    }

    /// Evaluates the tree. A comparison node evaluates to its residual.
    pub fn eval(&self, bindings: &impl Bindings) -> Result<f64, EvalError> {
        let value = match self {
            Expr::Literal(v) => *v,
            Expr::Unknown(name) => bindings
                .value_of(name)
                .ok_or_else(|| EvalError::UnboundUnknown(name.clone()))?,
            Expr::Neg(inner) => -inner.eval(bindings)?,
            Expr::Binary { op, lhs, rhs } => op.apply(lhs.eval(bindings)?, rhs.eval(bindings)?)?,
            Expr::Compare { .. } => self.residual(bindings)?,
            Expr::Func { func, arg } => func.apply(arg.eval(bindings)?)?,
            Expr::Call { surrogate, args } => {
                if args.len() != surrogate.arity() {
                    return Err(EvalError::Arity {
                        name: surrogate.name().to_string(),
                        expected: surrogate.arity(),
                        actual: args.len(),
                    });
                }
                let inputs = args
                    .iter()
                    .map(|arg| arg.eval(bindings))
                    .collect::<Result<Vec<_>, _>>()?;
                surrogate.evaluate(&inputs)?
            }
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EvalError::NonFinite)
        }
    }

    /// How far the bindings are from satisfying this expression.
    ///
    /// Equalities yield `lhs - rhs`, `<=` yields `max(lhs - rhs, 0)` and `>=` yields
    /// `max(rhs - lhs, 0)`. Any other expression is treated as `expr = 0`.
    pub fn residual(&self, bindings: &impl Bindings) -> Result<f64, EvalError> {
        match self {
            Expr::Compare { rel, lhs, rhs } => {
                let l = lhs.eval(bindings)?;
                let r = rhs.eval(bindings)?;
                let residual = match rel {
                    Relation::Eq => l - r,
                    Relation::Le => (l - r).max(0.0),
                    Relation::Ge => (r - l).max(0.0),
                };
                if residual.is_finite() {
                    Ok(residual)
                } else {
                    Err(EvalError::NonFinite)
                }
            }
            _ => self.eval(bindings),
        }
    }

    /// Names of all unknowns referenced anywhere in the tree, sorted.
    pub fn unknowns(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_unknowns(&mut names);
        names
    }

    pub fn collect_unknowns(&self, names: &mut BTreeSet<String>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Unknown(name) => {
                names.insert(name.clone());
            }
            Expr::Neg(inner) => inner.collect_unknowns(names),
            Expr::Func { arg, .. } => arg.collect_unknowns(names),
            Expr::Binary { lhs, rhs, .. } | Expr::Compare { lhs, rhs, .. } => {
                lhs.collect_unknowns(names);
                rhs.collect_unknowns(names);
            }
            Expr::Call { args, .. } => args.iter().for_each(|arg| arg.collect_unknowns(names)),
        }
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Literal(value)
    }
}

impl From<&str> for Expr {
    fn from(name: &str) -> Self {
        Expr::Unknown(name.to_string())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::Unknown(name) => write!(f, "{}", name),
            Expr::Neg(inner) => write!(f, "-({})", inner),
            Expr::Binary { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
            Expr::Compare { rel, lhs, rhs } => write!(f, "{} {} {}", lhs, rel.symbol(), rhs),
            Expr::Func { func, arg } => write!(f, "{}({})", func.name(), arg),
            Expr::Call { surrogate, args } => {
                write!(f, "{}(", surrogate.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({})", self)
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Neg(Box::new(self))
    }
}

macro_rules! impl_arithmetic {
    ($trait:ident, $method:ident, $op:expr) => {
        impl $trait<Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, self, rhs)
            }
        }

        impl $trait<f64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                Expr::binary($op, self, Expr::Literal(rhs))
            }
        }

        impl $trait<Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, Expr::Literal(self), rhs)
            }
        }
    };
}

impl_arithmetic!(Add, add, BinaryOp::Add);
impl_arithmetic!(Sub, sub, BinaryOp::Sub);
impl_arithmetic!(Mul, mul, BinaryOp::Mul);
impl_arithmetic!(Div, div, BinaryOp::Div);

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn arithmetic_tree_evaluates_with_bindings() {
        let expr = (Expr::unknown("x") + 2.0) * Expr::unknown("y") - 1.0 / Expr::unknown("x");
        let value = expr.eval(&bindings(&[("x", 2.0), ("y", 3.0)])).unwrap();
        assert!((value - 11.5).abs() < 1e-12);
    }

    #[test]
    fn unbound_unknown_is_reported_by_name() {
        let expr = Expr::unknown("x") + Expr::unknown("missing");
        let err = expr.eval(&bindings(&[("x", 1.0)])).unwrap_err();
        assert_eq!(err, EvalError::UnboundUnknown("missing".to_string()));
    }

    #[test]
    fn division_by_near_zero_fails_instead_of_returning_infinity() {
        let expr = Expr::literal(1.0) / Expr::unknown("x");
        let err = expr.eval(&bindings(&[("x", 0.0)])).unwrap_err();
        assert!(matches!(err, EvalError::DivisionByZero(_)));
    }

    #[test]
    fn intrinsic_domain_errors_are_reported() {
        let expr = Expr::unknown("x").sqrt();
        let err = expr.eval(&bindings(&[("x", -4.0)])).unwrap_err();
        assert_eq!(
            err,
            EvalError::Domain {
                function: "sqrt",
                value: -4.0
            }
        );
        let ln = Expr::func(MathFn::Ln, Expr::unknown("x"));
        assert!(ln.eval(&bindings(&[("x", 0.0)])).is_err());
    }

    #[test]
    fn fractional_power_of_negative_base_is_a_domain_error() {
        let expr = Expr::unknown("x").pow(0.5);
        assert!(expr.eval(&bindings(&[("x", -1.0)])).is_err());
        let square = Expr::unknown("x").pow(2.0);
        assert_eq!(square.eval(&bindings(&[("x", -3.0)])).unwrap(), 9.0);
    }

    #[test]
    fn equality_residual_is_signed_difference() {
        let eq = (Expr::unknown("x") + Expr::unknown("y")).eq_to(10.0);
        let r = eq.residual(&bindings(&[("x", 4.0), ("y", 3.0)])).unwrap();
        assert_eq!(r, -3.0);
    }

    #[test]
    fn inequality_residual_is_zero_when_satisfied() {
        let le = Expr::unknown("x").le(5.0);
        assert_eq!(le.residual(&bindings(&[("x", 4.0)])).unwrap(), 0.0);
        assert_eq!(le.residual(&bindings(&[("x", 7.0)])).unwrap(), 2.0);

        let ge = Expr::unknown("x").ge(5.0);
        assert_eq!(ge.residual(&bindings(&[("x", 7.0)])).unwrap(), 0.0);
        assert_eq!(ge.residual(&bindings(&[("x", 4.5)])).unwrap(), 0.5);
    }

    #[test]
    fn plain_expression_residual_is_its_value() {
        let expr = Expr::unknown("x") - 3.0;
        assert_eq!(expr.residual(&bindings(&[("x", 5.0)])).unwrap(), 2.0);
    }

    #[test]
    fn unknowns_are_collected_across_all_node_kinds() {
        let surrogate: Arc<dyn Surrogate> =
            Arc::new(FnSurrogate::new("drag", 2, |v: &[f64]| v[0] * v[1]));
        let expr = Expr::call(
            surrogate,
            vec![Expr::unknown("speed"), -Expr::unknown("length")],
        )
        .le(Expr::unknown("thrust").sqrt());
        let names: Vec<_> = expr.unknowns().into_iter().collect();
        assert_eq!(names, vec!["length", "speed", "thrust"]);
    }

    #[test]
    fn surrogate_call_checks_arity() {
        let surrogate: Arc<dyn Surrogate> =
            Arc::new(FnSurrogate::new("drag", 2, |v: &[f64]| v[0] * v[1]));
        let expr = Expr::call(surrogate, vec![Expr::literal(1.0)]);
        let err = expr.eval(&bindings(&[])).unwrap_err();
        assert!(matches!(err, EvalError::Arity { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn display_renders_a_readable_form() {
        let expr = (Expr::unknown("x") + 1.0).le(Expr::unknown("y"));
        assert_eq!(expr.to_string(), "(x + 1) <= y");
    }
}
