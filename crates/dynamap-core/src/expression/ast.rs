//! Expression tree and fluent builder.
//!
//! Predicates and update actions are written against one item shape:
//!
//! ```
//! use dynamap_core::expression::{attr, remove, set};
//!
//! let condition = attr("age").ge(18) & attr("age").lt(65);
//! let update = set(attr("a"), 1) & set(attr("b"), 2) & remove(attr("c"));
//! # let _ = (condition, update);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::ops;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use uuid::Uuid;

use super::functions::Function;
use crate::codec::EnumType;
use crate::error::MapperResult;
use crate::value::{EnumValue, Value};

/// Expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// The item the expression is written against.
    Item,
    /// Member access: `parent.name`.
    Member {
        /// Owning expression.
        parent: Box<Expr>,
        /// Member name, as declared or as stored.
        name: String,
    },
    /// Indexed access: `parent[index]` on lists, `parent.key` on maps.
    Index {
        /// Indexed expression.
        parent: Box<Expr>,
        /// Index or map key.
        index: Box<Expr>,
    },
    /// Literal value.
    Constant(Value),
    /// Binary operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left-hand side.
        left: Box<Expr>,
        /// Right-hand side.
        right: Box<Expr>,
    },
    /// Unary operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// Store function or update action.
    Call {
        /// Function.
        function: Function,
        /// Arguments in template order.
        args: Vec<Expr>,
    },
    /// `if test { then } else { otherwise }`, folded when `test` is constant.
    Conditional {
        /// Condition.
        test: Box<Expr>,
        /// Taken when `test` is true.
        then: Box<Expr>,
        /// Taken when `test` is false.
        otherwise: Box<Expr>,
    },
    /// Prewritten expression text with its own bindings.
    Raw(RawExpression),
    /// Value computed when the expression is compiled.
    Deferred(Deferred),
    /// Explicit conversion of a number or name to an enum.
    EnumConvert {
        /// Converted expression.
        operand: Box<Expr>,
        /// Target enum.
        target: EnumTarget,
    },
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// Equal (`=`).
    Eq,
    /// Not equal (`<>`).
    Ne,
    /// Less than (`<`).
    Lt,
    /// Less than or equal (`<=`).
    Le,
    /// Greater than (`>`).
    Gt,
    /// Greater than or equal (`>=`).
    Ge,
    /// Logical AND.
    And,
    /// Logical OR.
    Or,
    /// Addition (`+`).
    Add,
    /// Subtraction (`-`).
    Sub,
    /// Multiplication; folded only.
    Mul,
    /// Division; folded only.
    Div,
}

impl BinaryOp {
    /// Whether this is a comparison.
    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
        )
    }

    /// Whether this is AND or OR.
    #[must_use]
    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        };
        f.write_str(text)
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Logical NOT.
    Not,
    /// Numeric negation; folded only.
    Neg,
}

/// Enum an [`Expr::EnumConvert`] converts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumTarget {
    /// Rust type name.
    pub type_name: &'static str,
    /// Variant table.
    pub variants: &'static [(&'static str, i64)],
}

impl EnumTarget {
    /// Target for `E`.
    #[must_use]
    pub fn of<E: EnumType>() -> Self {
        Self {
            type_name: std::any::type_name::<E>(),
            variants: E::VARIANTS,
        }
    }
}

/// Expression text with alias bindings, merged verbatim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawExpression {
    /// Expression text.
    pub text: String,
    /// `#alias` to attribute name.
    pub names: BTreeMap<String, String>,
    /// `:alias` to value.
    pub values: BTreeMap<String, Value>,
}

fn with_prefix(prefix: char, alias: impl Into<String>) -> String {
    let alias = alias.into();
    if alias.starts_with(prefix) {
        alias
    } else {
        format!("{prefix}{alias}")
    }
}

#[allow(clippy::return_self_not_must_use)]
impl RawExpression {
    /// Binds `#alias` to `name`.
    pub fn name(mut self, alias: impl Into<String>, name: impl Into<String>) -> Self {
        self.names.insert(with_prefix('#', alias), name.into());
        self
    }

    /// Binds `:alias` to `value`.
    pub fn value(mut self, alias: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(with_prefix(':', alias), value.into());
        self
    }
}

/// A closure evaluated once, at compile time.
#[derive(Clone)]
pub struct Deferred(Arc<dyn Fn() -> MapperResult<Value> + Send + Sync>);

impl Deferred {
    /// Runs the closure.
    pub fn evaluate(&self) -> MapperResult<Value> {
        (self.0)()
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deferred(..)")
    }
}

impl PartialEq for Deferred {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// The item itself.
#[must_use]
pub fn item() -> Expr {
    Expr::Item
}

/// Top-level member of the item.
#[must_use]
pub fn attr(name: impl Into<String>) -> Expr {
    Expr::Item.attr(name)
}

/// Literal value.
#[must_use]
pub fn val(value: impl Into<Value>) -> Expr {
    Expr::Constant(value.into())
}

/// Raw expression text; add bindings with [`RawExpression::name`] and
/// [`RawExpression::value`].
#[must_use]
pub fn raw(text: impl Into<String>) -> RawExpression {
    RawExpression {
        text: text.into(),
        ..RawExpression::default()
    }
}

/// Value produced by `f` at compile time.
pub fn deferred<V, F>(f: F) -> Expr
where
    V: Into<Value>,
    F: Fn() -> MapperResult<V> + Send + Sync + 'static,
{
    Expr::Deferred(Deferred(Arc::new(move || f().map(Into::into))))
}

/// `if test { then } else { otherwise }`.
pub fn cond(test: impl Into<Expr>, then: impl Into<Expr>, otherwise: impl Into<Expr>) -> Expr {
    Expr::Conditional {
        test: Box::new(test.into()),
        then: Box::new(then.into()),
        otherwise: Box::new(otherwise.into()),
    }
}

fn call(function: Function, args: Vec<Expr>) -> Expr {
    Expr::Call { function, args }
}

/// `SET path = value`.
pub fn set(path: Expr, value: impl Into<Expr>) -> Expr {
    call(Function::Set, vec![path, value.into()])
}

/// `REMOVE path`.
#[must_use]
pub fn remove(path: Expr) -> Expr {
    call(Function::Remove, vec![path])
}

/// `ADD path value`: numeric increment or set union.
pub fn add(path: Expr, value: impl Into<Expr>) -> Expr {
    call(Function::Add, vec![path, value.into()])
}

/// `DELETE path value`: set difference.
pub fn delete(path: Expr, value: impl Into<Expr>) -> Expr {
    call(Function::Delete, vec![path, value.into()])
}

/// `if_not_exists(path, value)`, for the right side of `SET`.
pub fn if_not_exists(path: Expr, value: impl Into<Expr>) -> Expr {
    call(Function::IfNotExists, vec![path, value.into()])
}

/// `list_append(list, other)`, for the right side of `SET`.
pub fn list_append(list: impl Into<Expr>, other: impl Into<Expr>) -> Expr {
    call(Function::ListAppend, vec![list.into(), other.into()])
}

#[allow(clippy::should_implement_trait, clippy::return_self_not_must_use)]
impl Expr {
    /// Short node name, for diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> String {
        match self {
            Self::Item => "item".to_owned(),
            Self::Member { name, .. } => format!("member '{name}'"),
            Self::Index { .. } => "index".to_owned(),
            Self::Constant(v) => format!("constant {}", v.kind_name()),
            Self::Binary { op, .. } => format!("binary '{op}'"),
            Self::Unary { op: UnaryOp::Not, .. } => "unary NOT".to_owned(),
            Self::Unary { op: UnaryOp::Neg, .. } => "unary negation".to_owned(),
            Self::Call { function, .. } => format!("call {function}"),
            Self::Conditional { .. } => "conditional".to_owned(),
            Self::Raw(_) => "raw expression".to_owned(),
            Self::Deferred(_) => "deferred value".to_owned(),
            Self::EnumConvert { target, .. } => format!("conversion to {}", target.type_name),
        }
    }

    fn binary(self, op: BinaryOp, rhs: impl Into<Expr>) -> Self {
        Self::Binary {
            op,
            left: Box::new(self),
            right: Box::new(rhs.into()),
        }
    }

    /// Nested member.
    pub fn attr(self, name: impl Into<String>) -> Self {
        Self::Member {
            parent: Box::new(self),
            name: name.into(),
        }
    }

    /// List element (integer) or map entry (string).
    pub fn at(self, index: impl Into<Expr>) -> Self {
        Self::Index {
            parent: Box::new(self),
            index: Box::new(index.into()),
        }
    }

    /// `self = rhs`.
    pub fn eq(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Eq, rhs)
    }

    /// `self <> rhs`.
    pub fn ne(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ne, rhs)
    }

    /// `self < rhs`.
    pub fn lt(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Lt, rhs)
    }

    /// `self <= rhs`.
    pub fn le(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Le, rhs)
    }

    /// `self > rhs`.
    pub fn gt(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Gt, rhs)
    }

    /// `self >= rhs`.
    pub fn ge(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ge, rhs)
    }

    /// `self AND rhs`.
    pub fn and(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::And, rhs)
    }

    /// `self OR rhs`.
    pub fn or(self, rhs: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Or, rhs)
    }

    /// `attribute_exists(self)`.
    pub fn exists(self) -> Self {
        call(Function::AttributeExists, vec![self])
    }

    /// `attribute_not_exists(self)`.
    pub fn not_exists(self) -> Self {
        call(Function::AttributeNotExists, vec![self])
    }

    /// `attribute_type(self, type_descriptor)`, e.g. `"SS"`.
    pub fn is_type(self, type_descriptor: &str) -> Self {
        call(Function::AttributeType, vec![self, val(type_descriptor)])
    }

    /// `begins_with(self, prefix)`.
    pub fn begins_with(self, prefix: impl Into<Expr>) -> Self {
        call(Function::BeginsWith, vec![self, prefix.into()])
    }

    /// `contains(self, operand)`.
    pub fn contains(self, operand: impl Into<Expr>) -> Self {
        call(Function::Contains, vec![self, operand.into()])
    }

    /// `size(self)`.
    pub fn size(self) -> Self {
        call(Function::Size, vec![self])
    }

    /// `self BETWEEN low AND high`.
    pub fn between(self, low: impl Into<Expr>, high: impl Into<Expr>) -> Self {
        call(Function::Between, vec![self, low.into(), high.into()])
    }

    /// `self IN (candidates...)`. A single list constant is spliced into
    /// individual candidates.
    pub fn is_in<I>(self, candidates: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Expr>,
    {
        let mut args = vec![self];
        args.extend(candidates.into_iter().map(Into::into));
        call(Function::In, args)
    }

    /// Treats `self` as enum `E`, so literals on the other side of a
    /// comparison are coerced to `E`.
    pub fn as_enum<E: EnumType>(self) -> Self {
        Self::EnumConvert {
            operand: Box::new(self),
            target: EnumTarget::of::<E>(),
        }
    }
}

impl<R: Into<Expr>> ops::BitAnd<R> for Expr {
    type Output = Expr;

    fn bitand(self, rhs: R) -> Expr {
        self.and(rhs)
    }
}

impl<R: Into<Expr>> ops::BitOr<R> for Expr {
    type Output = Expr;

    fn bitor(self, rhs: R) -> Expr {
        self.or(rhs)
    }
}

impl ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
        }
    }
}

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(self),
        }
    }
}

macro_rules! arithmetic_op {
    ($($trait:ident, $method:ident, $op:ident);+ $(;)?) => {
        $(
            impl<R: Into<Expr>> ops::$trait<R> for Expr {
                type Output = Expr;

                fn $method(self, rhs: R) -> Expr {
                    self.binary(BinaryOp::$op, rhs)
                }
            }
        )+
    };
}

arithmetic_op!(Add, add, Add; Sub, sub, Sub; Mul, mul, Mul; Div, div, Div);

macro_rules! expr_from_value {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Expr {
                fn from(value: $ty) -> Self {
                    Self::Constant(Value::from(value))
                }
            }
        )+
    };
}

expr_from_value!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char, &str,
    String, Bytes, EnumValue, Uuid, DateTime<Utc>, DateTime<FixedOffset>, NaiveDate,
    NaiveDateTime, NaiveTime, TimeDelta, std::time::Duration,
);

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Self::Constant(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Expr {
    fn from(value: Vec<T>) -> Self {
        Self::Constant(Value::from(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Expr {
    fn from(value: Option<T>) -> Self {
        Self::Constant(Value::from(value))
    }
}

impl From<RawExpression> for Expr {
    fn from(value: RawExpression) -> Self {
        Self::Raw(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_build_member_chains() {
        let e = attr("address").attr("lines").at(0);
        let Expr::Index { parent, index } = e else {
            panic!("expected index");
        };
        assert_eq!(*index, Expr::Constant(Value::Int(0)));
        let Expr::Member { parent, name } = *parent else {
            panic!("expected member");
        };
        assert_eq!(name, "lines");
        assert!(matches!(*parent, Expr::Member { ref name, .. } if name == "address"));
    }

    #[test]
    fn test_should_combine_with_operators() {
        let e = attr("a").eq(1) & !attr("b").exists() | attr("c").lt(val(2.5));
        let Expr::Binary { op: BinaryOp::Or, left, .. } = e else {
            panic!("expected OR at the root");
        };
        assert!(matches!(*left, Expr::Binary { op: BinaryOp::And, .. }));
    }

    #[test]
    fn test_should_bind_raw_aliases_with_prefixes() {
        let r = raw("#n = :v").name("n", "name").value(":v", 3);
        assert_eq!(r.names.get("#n").map(String::as_str), Some("name"));
        assert_eq!(r.values.get(":v"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_should_collect_in_candidates() {
        let e = attr("a").is_in(["x", "y"]);
        let Expr::Call { function, args } = e else {
            panic!("expected call");
        };
        assert_eq!(function, Function::In);
        assert_eq!(args.len(), 3);
    }
}
