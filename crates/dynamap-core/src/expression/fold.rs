//! Constant folding.
//!
//! Every subtree that neither touches the item nor carries raw text is
//! evaluated once and replaced by its value. Calls are never folded, only
//! their arguments.

use std::cmp::Ordering;

use dynamap_model::AttributeValue;

use super::ast::{BinaryOp, EnumTarget, Expr, UnaryOp};
use crate::codec::enums::variant_name;
use crate::error::{MapperError, MapperResult};
use crate::value::{EnumValue, Value};

/// Folds constant subtrees of `expr`.
pub fn fold(expr: Expr) -> MapperResult<Expr> {
    match expr {
        Expr::Item | Expr::Constant(_) | Expr::Raw(_) => Ok(expr),
        Expr::Deferred(deferred) => deferred.evaluate().map(Expr::Constant),
        Expr::Member { parent, name } => match fold(*parent)? {
            Expr::Constant(value) => member_of(value, &name).map(Expr::Constant),
            parent => Ok(Expr::Member {
                parent: Box::new(parent),
                name,
            }),
        },
        Expr::Index { parent, index } => match (fold(*parent)?, fold(*index)?) {
            (Expr::Constant(value), Expr::Constant(key)) => index_of(value, &key).map(Expr::Constant),
            (parent, index) => Ok(Expr::Index {
                parent: Box::new(parent),
                index: Box::new(index),
            }),
        },
        Expr::Binary { op, left, right } => fold_binary(op, fold(*left)?, fold(*right)?),
        Expr::Unary { op, operand } => match fold(*operand)? {
            Expr::Constant(value) => eval_unary(op, value).map(Expr::Constant),
            operand => Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            }),
        },
        Expr::Call { function, args } => Ok(Expr::Call {
            function,
            args: args.into_iter().map(fold).collect::<MapperResult<_>>()?,
        }),
        Expr::Conditional {
            test,
            then,
            otherwise,
        } => match fold(*test)? {
            Expr::Constant(value) => match value.as_bool() {
                Some(true) => fold(*then),
                Some(false) => fold(*otherwise),
                None => Err(MapperError::unsupported_expression(
                    "conditional",
                    format!("test folded to non-boolean {}", value.kind_name()),
                )),
            },
            test => Ok(Expr::Conditional {
                test: Box::new(test),
                then: Box::new(fold(*then)?),
                otherwise: Box::new(fold(*otherwise)?),
            }),
        },
        Expr::EnumConvert { operand, target } => match fold(*operand)? {
            Expr::Constant(value) => to_enum(value, target).map(Expr::Constant),
            operand => Ok(Expr::EnumConvert {
                operand: Box::new(operand),
                target,
            }),
        },
    }
}

fn fold_binary(op: BinaryOp, left: Expr, right: Expr) -> MapperResult<Expr> {
    match (left, right) {
        (Expr::Constant(l), Expr::Constant(r)) => eval_binary(op, &l, &r).map(Expr::Constant),
        (Expr::Constant(c), other) | (other, Expr::Constant(c)) if op.is_logical() => {
            let Some(b) = c.as_bool() else {
                return Err(MapperError::unsupported_expression(
                    format!("binary '{op}'"),
                    format!("operand folded to non-boolean {}", c.kind_name()),
                ));
            };
            Ok(match (op, b) {
                (BinaryOp::And, true) | (BinaryOp::Or, false) => other,
                _ => Expr::Constant(Value::Bool(b)),
            })
        }
        (left, right) => Ok(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }),
    }
}

fn member_of(value: Value, name: &str) -> MapperResult<Value> {
    match value {
        Value::Map(mut entries) => Ok(entries.remove(name).unwrap_or(Value::Null)),
        Value::Attribute(AttributeValue::M(mut entries)) => {
            Ok(entries.remove(name).map_or(Value::Null, Value::Attribute))
        }
        other => Err(MapperError::unsupported_expression(
            format!("member '{name}'"),
            format!("{} has no members", other.kind_name()),
        )),
    }
}

fn index_of(value: Value, key: &Value) -> MapperResult<Value> {
    match (value, key) {
        (Value::List(items) | Value::Set(items), Value::Int(i)) => usize::try_from(*i)
            .ok()
            .and_then(|i| items.into_iter().nth(i))
            .ok_or_else(|| MapperError::unsupported_expression("index", format!("index {i} out of range"))),
        (value, Value::String(name)) => member_of(value, name),
        (value, key) => Err(MapperError::unsupported_expression(
            "index",
            format!("cannot index {} with {}", value.kind_name(), key.kind_name()),
        )),
    }
}

pub(crate) fn to_enum(value: Value, target: EnumTarget) -> MapperResult<Value> {
    let discriminant = match &value {
        Value::Int(d) => Some(*d),
        Value::String(name) => target
            .variants
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, d)| *d),
        Value::Enum(e) => Some(e.discriminant),
        _ => None,
    };
    match discriminant {
        Some(d) if variant_name(target.variants, d).is_some() => Ok(Value::Enum(EnumValue {
            type_name: target.type_name,
            variants: target.variants,
            discriminant: d,
        })),
        _ => Err(MapperError::unsupported_expression(
            format!("conversion to {}", target.type_name),
            format!("{value} is not a variant"),
        )),
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        #[allow(clippy::cast_precision_loss)]
        Value::Int(i) => Some(*i as f64),
        Value::Float(x) => Some(*x),
        Value::Number(n) => n.trim().parse().ok(),
        Value::Enum(e) => {
            #[allow(clippy::cast_precision_loss)]
            let d = e.discriminant as f64;
            Some(d)
        }
        _ => None,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
        (Value::Binary(a), Value::Binary(b)) => Some(a.as_ref().cmp(b.as_ref())),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Enum(a), Value::Enum(b)) => Some(a.discriminant.cmp(&b.discriminant)),
        _ => as_f64(left)?.partial_cmp(&as_f64(right)?),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> MapperResult<Value> {
    let overflow = || MapperError::unsupported_expression(format!("binary '{op}'"), "integer overflow");
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        return match op {
            BinaryOp::Add => a.checked_add(*b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Sub => a.checked_sub(*b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Mul => a.checked_mul(*b).map(Value::Int).ok_or_else(overflow),
            _ if *b == 0 => Err(MapperError::unsupported_expression("binary '/'", "division by zero")),
            _ if a.checked_rem(*b) == Some(0) => a.checked_div(*b).map(Value::Int).ok_or_else(overflow),
            #[allow(clippy::cast_precision_loss)]
            _ => Ok(Value::Float(*a as f64 / *b as f64)),
        };
    }
    if let (BinaryOp::Add, Value::String(a), Value::String(b)) = (op, left, right) {
        return Ok(Value::String(format!("{a}{b}")));
    }
    let (Some(a), Some(b)) = (as_f64(left), as_f64(right)) else {
        return Err(MapperError::unsupported_expression(
            format!("binary '{op}'"),
            format!("cannot apply to {} and {}", left.kind_name(), right.kind_name()),
        ));
    };
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        _ => a / b,
    };
    if result.is_finite() {
        Ok(Value::Float(result))
    } else {
        Err(MapperError::unsupported_expression(
            format!("binary '{op}'"),
            "result is not finite",
        ))
    }
}

fn eval_binary(op: BinaryOp, left: &Value, right: &Value) -> MapperResult<Value> {
    match op {
        BinaryOp::And | BinaryOp::Or => match (left.as_bool(), right.as_bool()) {
            (Some(a), Some(b)) => Ok(Value::Bool(if op == BinaryOp::And { a && b } else { a || b })),
            _ => Err(MapperError::unsupported_expression(
                format!("binary '{op}'"),
                "operands are not boolean",
            )),
        },
        BinaryOp::Eq => Ok(Value::Bool(
            left == right || compare(left, right) == Some(Ordering::Equal),
        )),
        BinaryOp::Ne => Ok(Value::Bool(
            left != right && compare(left, right) != Some(Ordering::Equal),
        )),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(left, right).ok_or_else(|| {
                MapperError::unsupported_expression(
                    format!("binary '{op}'"),
                    format!("cannot order {} and {}", left.kind_name(), right.kind_name()),
                )
            })?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => arithmetic(op, left, right),
    }
}

fn eval_unary(op: UnaryOp, value: Value) -> MapperResult<Value> {
    match (op, value) {
        (UnaryOp::Not, value) => value.as_bool().map(|b| Value::Bool(!b)).ok_or_else(|| {
            MapperError::unsupported_expression("unary NOT", format!("{} is not boolean", value.kind_name()))
        }),
        (UnaryOp::Neg, Value::Int(i)) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| MapperError::unsupported_expression("unary negation", "integer overflow")),
        (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOp::Neg, value) => Err(MapperError::unsupported_expression(
            "unary negation",
            format!("{} is not numeric", value.kind_name()),
        )),
    }
}
