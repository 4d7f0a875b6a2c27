//! Expression tree to store expression text.
//!
//! The compiler folds constant subtrees first, then renders what remains:
//! member paths through the item metadata (aliasing names the grammar cannot
//! take bare), constants through the codec (aliased and de-duplicated), and
//! functions through their templates. Update actions are merged per verb into
//! a single clause each, in first-seen verb order.

use std::sync::Arc;

use dynamap_model::AttributeValue;
use tracing::trace;

use super::ast::{BinaryOp, EnumTarget, Expr, UnaryOp};
use super::context::ExpressionContext;
use super::fold::{fold, to_enum};
use super::functions::{Function, UpdateVerb, render};
use super::reserved::is_reserved;
use crate::codec::enums::read_enum;
use crate::codec::{TypeInfo, ValueKind, WriteFlags, encode_with};
use crate::document::SchemaInfo;
use crate::error::{MapperError, MapperResult};
use crate::table::TableDescriptor;
use crate::value::{EnumValue, Value};

/// Whether `name` must be replaced by a `#` alias.
#[must_use]
pub fn needs_alias(name: &str) -> bool {
    let Some(first) = name.chars().next() else {
        return true;
    };
    first.is_ascii_digit()
        || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        || is_reserved(name)
}

/// How a constant should be shaped before encoding, learned from the other
/// side of the operation.
#[derive(Debug, Clone, Copy)]
enum Hint {
    None,
    Enum(&'static str, &'static [(&'static str, i64)]),
    Set,
}

impl Hint {
    fn from_type(info: Option<&TypeInfo>) -> Self {
        match info {
            Some(t) if t.kind == ValueKind::Enum => t
                .enum_variants
                .map_or(Self::None, |variants| Self::Enum(t.name, variants)),
            Some(t) if t.kind == ValueKind::Set => Self::Set,
            _ => Self::None,
        }
    }
}

#[derive(Debug)]
struct PathInfo {
    text: String,
    value_type: Option<TypeInfo>,
    schema: Option<Arc<SchemaInfo>>,
}

/// Renders expressions into one [`ExpressionContext`].
#[derive(Debug)]
pub struct ExpressionCompiler<'c> {
    ctx: &'c mut ExpressionContext,
}

fn unsupported(node: impl Into<String>, reason: impl Into<String>) -> MapperError {
    MapperError::unsupported_expression(node, reason)
}

fn flatten_and<'e>(expr: &'e Expr, out: &mut Vec<&'e Expr>) {
    match expr {
        Expr::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => {
            flatten_and(left, out);
            flatten_and(right, out);
        }
        other => out.push(other),
    }
}

fn is_path(expr: &Expr) -> bool {
    matches!(expr, Expr::Member { .. } | Expr::Index { .. })
}

impl<'c> ExpressionCompiler<'c> {
    /// Compiler writing into `ctx`.
    pub fn new(ctx: &'c mut ExpressionContext) -> Self {
        Self { ctx }
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Condition or filter text.
    pub fn condition(&mut self, expr: &Expr) -> MapperResult<String> {
        let folded = fold(expr.clone())?;
        self.root_predicate(&folded)
    }

    fn root_predicate(&mut self, expr: &Expr) -> MapperResult<String> {
        if let Expr::Constant(value) = expr {
            return Err(unsupported(
                expr.kind_name(),
                format!("condition folds to the constant {value}"),
            ));
        }
        self.predicate(expr)
    }

    /// Update text with one clause per verb.
    pub fn update(&mut self, expr: &Expr) -> MapperResult<String> {
        let folded = fold(expr.clone())?;
        let mut actions = Vec::new();
        flatten_and(&folded, &mut actions);
        let mut clauses = UpdateClauses::default();
        for action in actions {
            match action {
                Expr::Call { function, args } if function.verb().is_some() => {
                    function.check_arity(args.len())?;
                    let text = self.update_action(*function, args)?;
                    if let Some(verb) = function.verb() {
                        clauses.push(verb, &text);
                    }
                }
                Expr::Raw(raw) => {
                    self.ctx.merge_raw(raw)?;
                    for (verb, body) in split_update_text(&raw.text)? {
                        clauses.push(verb, body);
                    }
                }
                other => return Err(unsupported(other.kind_name(), "not an update action")),
            }
        }
        if clauses.text.is_empty() {
            return Err(unsupported("update", "no actions"));
        }
        Ok(clauses.text)
    }

    /// Key condition text and the index it addresses.
    pub fn key_condition(&mut self, expr: &Expr) -> MapperResult<(String, Option<String>)> {
        let folded = fold(expr.clone())?;
        let mut conjuncts = Vec::new();
        flatten_and(&folded, &mut conjuncts);
        let mut members: Vec<(String, bool)> = Vec::new();
        for conjunct in conjuncts {
            let found = match conjunct {
                Expr::Binary { op, left, right } if op.is_comparison() => self
                    .key_member(left)
                    .or_else(|| self.key_member(right))
                    .map(|m| (m, *op == BinaryOp::Eq)),
                Expr::Call {
                    function: Function::Between | Function::BeginsWith,
                    args,
                } => args.first().and_then(|a| self.key_member(a)).map(|m| (m, false)),
                Expr::Raw(_) => None,
                other => {
                    return Err(unsupported(other.kind_name(), "not valid in a key condition"));
                }
            };
            if let Some((member, is_eq)) = found {
                match members.iter_mut().find(|(m, _)| *m == member) {
                    Some(existing) => existing.1 |= is_eq,
                    None => members.push((member, is_eq)),
                }
            }
        }
        let text = self.root_predicate(&folded)?;
        trace!(?members, "key condition members");
        let index_name = self.select_index(&members)?;
        Ok((text, index_name))
    }

    /// Comma-separated projection of member paths.
    pub fn projection(&mut self, paths: &[Expr]) -> MapperResult<String> {
        let mut rendered = Vec::with_capacity(paths.len());
        for path in paths {
            let folded = fold(path.clone())?;
            rendered.push(self.path(&folded)?.text);
        }
        if rendered.is_empty() {
            return Err(unsupported("projection", "no paths"));
        }
        Ok(rendered.join(", "))
    }

    // -----------------------------------------------------------------------
    // Predicates
    // -----------------------------------------------------------------------

    fn predicate(&mut self, expr: &Expr) -> MapperResult<String> {
        match expr {
            Expr::Binary { op, left, right } if op.is_logical() => {
                let l = self.logical_child(*op, left)?;
                let r = self.logical_child(*op, right)?;
                Ok(format!("{l} {op} {r}"))
            }
            Expr::Binary { op, left, right } if op.is_comparison() => {
                let left_hint = self.hint_of(right);
                let right_hint = self.hint_of(left);
                let l = self.operand(left, left_hint)?;
                let r = self.operand(right, right_hint)?;
                Ok(format!("{l} {op} {r}"))
            }
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => {
                let inner = self.predicate(operand)?;
                let grouped = matches!(**operand, Expr::Raw(_))
                    || matches!(**operand, Expr::Binary { op, .. } if op.is_logical());
                Ok(if grouped {
                    format!("NOT ({inner})")
                } else {
                    format!("NOT {inner}")
                })
            }
            Expr::Call { function, args } if function.is_predicate() => self.call(*function, args),
            Expr::Member { .. } | Expr::Index { .. } => {
                let path = self.path(expr)?;
                if let Some(kind) = path.value_type.map(|t| t.kind) {
                    if !matches!(kind, ValueKind::Bool | ValueKind::Dynamic) {
                        return Err(unsupported(expr.kind_name(), "not a boolean member"));
                    }
                }
                let truth = self.ctx.value_alias(AttributeValue::Bool(true));
                Ok(format!("{} = {truth}", path.text))
            }
            Expr::Raw(raw) => {
                self.ctx.merge_raw(raw)?;
                Ok(raw.text.clone())
            }
            other => Err(unsupported(other.kind_name(), "not a condition")),
        }
    }

    fn logical_child(&mut self, parent: BinaryOp, child: &Expr) -> MapperResult<String> {
        let text = self.predicate(child)?;
        let grouped = match child {
            Expr::Binary { op, .. } => op.is_logical() && *op != parent,
            Expr::Raw(_) => true,
            _ => false,
        };
        Ok(if grouped { format!("({text})") } else { text })
    }

    fn call(&mut self, function: Function, args: &[Expr]) -> MapperResult<String> {
        let spliced;
        let args = match (function.is_variadic(), args) {
            (true, [first, Expr::Constant(Value::List(items) | Value::Set(items))]) => {
                spliced = std::iter::once(first.clone())
                    .chain(items.iter().cloned().map(Expr::Constant))
                    .collect::<Vec<_>>();
                spliced.as_slice()
            }
            _ => args,
        };
        function.check_arity(args.len())?;
        let path_first = !matches!(function, Function::Between | Function::In);
        if path_first && !is_path(&args[0]) {
            return Err(unsupported(
                format!("call {function}"),
                format!("first argument must be a member, not {}", args[0].kind_name()),
            ));
        }
        let subject_hint = match function {
            Function::AttributeType | Function::Contains => Hint::None,
            _ => self.hint_of(&args[0]),
        };
        let mut rendered = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let hint = match (i, args.get(1)) {
                (0, Some(next)) if !path_first => self.hint_of(next),
                (0, _) => Hint::None,
                _ => subject_hint,
            };
            rendered.push(self.operand(arg, hint)?);
        }
        render(function.template(), &rendered)
    }

    // -----------------------------------------------------------------------
    // Operands
    // -----------------------------------------------------------------------

    fn operand(&mut self, expr: &Expr, hint: Hint) -> MapperResult<String> {
        match expr {
            Expr::Member { .. } | Expr::Index { .. } => Ok(self.path(expr)?.text),
            Expr::Constant(value) => self.constant(value, hint),
            Expr::EnumConvert { operand, target } => {
                self.operand(operand, Hint::Enum(target.type_name, target.variants))
            }
            Expr::Call {
                function: Function::Size,
                args,
            } => self.call(Function::Size, args),
            Expr::Raw(raw) => {
                self.ctx.merge_raw(raw)?;
                Ok(raw.text.clone())
            }
            other => Err(unsupported(other.kind_name(), "not an operand")),
        }
    }

    fn constant(&mut self, value: &Value, hint: Hint) -> MapperResult<String> {
        let shaped = match (hint, value) {
            (Hint::Enum(type_name, variants), Value::Int(_)) => {
                to_enum(value.clone(), EnumTarget { type_name, variants })?
            }
            (Hint::Enum(type_name, variants), Value::String(name)) => {
                let codec = self.ctx.codec();
                let discriminant = read_enum(variants, type_name, &AttributeValue::S(name.clone()), codec)?;
                Value::Enum(EnumValue {
                    type_name,
                    variants,
                    discriminant,
                })
            }
            (Hint::Set, Value::List(items)) => Value::Set(items.clone()),
            _ => value.clone(),
        };
        let encoded = encode_with(&shaped, self.ctx.codec(), WriteFlags::persist_all())?
            .unwrap_or_else(AttributeValue::null);
        Ok(self.ctx.value_alias(encoded))
    }

    fn escape(&mut self, name: &str) -> String {
        if needs_alias(name) {
            self.ctx.name_alias(name)
        } else {
            name.to_owned()
        }
    }

    fn path(&mut self, expr: &Expr) -> MapperResult<PathInfo> {
        match expr {
            Expr::Member { parent, name } => {
                let (prefix, schema) = match parent.as_ref() {
                    Expr::Item => (None, self.ctx.schema().cloned()),
                    other => {
                        let p = self.path(other)?;
                        (Some(p.text), p.schema)
                    }
                };
                let (stored, value_type) = match &schema {
                    Some(schema) => {
                        let options = self.ctx.codec().options();
                        let (_, member) = schema.lookup(name, options).ok_or_else(|| {
                            MapperError::UnknownMember {
                                type_name: schema.type_name.to_owned(),
                                member: name.clone(),
                            }
                        })?;
                        (
                            member.attribute.resolved_name(options),
                            Some(member.attribute.value_type),
                        )
                    }
                    None => (name.clone(), None),
                };
                let segment = self.escape(&stored);
                let text = match prefix {
                    Some(prefix) => format!("{prefix}.{segment}"),
                    None => segment,
                };
                Ok(PathInfo {
                    text,
                    schema: value_type.as_ref().and_then(TypeInfo::schema),
                    value_type,
                })
            }
            Expr::Index { parent, index } => {
                if matches!(**parent, Expr::Item) {
                    return Err(unsupported("index", "the item itself cannot be indexed"));
                }
                match index.as_ref() {
                    Expr::Constant(Value::Int(i)) if *i >= 0 => {
                        let p = self.path(parent)?;
                        Ok(PathInfo {
                            text: format!("{}[{i}]", p.text),
                            value_type: None,
                            schema: p.schema,
                        })
                    }
                    Expr::Constant(Value::String(key)) => {
                        let p = self.path(parent)?;
                        let segment = self.escape(key);
                        Ok(PathInfo {
                            text: format!("{}.{segment}", p.text),
                            value_type: None,
                            schema: None,
                        })
                    }
                    other => Err(unsupported(
                        "index",
                        format!("{} is not a list index or map key", other.kind_name()),
                    )),
                }
            }
            other => Err(unsupported(other.kind_name(), "not an attribute path")),
        }
    }

    fn schema_for(&self, expr: &Expr) -> Option<Arc<SchemaInfo>> {
        match expr {
            Expr::Item => self.ctx.schema().cloned(),
            Expr::Member { .. } => self.type_of(expr)?.schema(),
            Expr::Index { parent, index } if matches!(**index, Expr::Constant(Value::Int(_))) => {
                self.schema_for(parent)
            }
            _ => None,
        }
    }

    fn type_of(&self, expr: &Expr) -> Option<TypeInfo> {
        let Expr::Member { parent, name } = expr else {
            return None;
        };
        let schema = self.schema_for(parent)?;
        schema
            .lookup(name, self.ctx.codec().options())
            .map(|(_, member)| member.attribute.value_type)
    }

    fn hint_of(&self, expr: &Expr) -> Hint {
        match expr {
            Expr::EnumConvert { target, .. } => Hint::Enum(target.type_name, target.variants),
            other => Hint::from_type(self.type_of(other).as_ref()),
        }
    }

    // -----------------------------------------------------------------------
    // Updates
    // -----------------------------------------------------------------------

    fn update_action(&mut self, function: Function, args: &[Expr]) -> MapperResult<String> {
        if !is_path(&args[0]) {
            return Err(unsupported(
                format!("call {function}"),
                format!("target must be a member, not {}", args[0].kind_name()),
            ));
        }
        let path = self.path(&args[0])?;
        let member_hint = Hint::from_type(path.value_type.as_ref());
        let mut rendered = vec![path.text];
        match function {
            Function::Set => rendered.push(self.set_value(&args[1], member_hint)?),
            Function::Add | Function::Delete => {
                let hint = match member_hint {
                    Hint::None => Hint::Set,
                    other => other,
                };
                rendered.push(self.operand(&args[1], hint)?);
            }
            _ => {}
        }
        render(function.template(), &rendered)
    }

    fn set_value(&mut self, expr: &Expr, hint: Hint) -> MapperResult<String> {
        match expr {
            Expr::Binary {
                op: op @ (BinaryOp::Add | BinaryOp::Sub),
                left,
                right,
            } => {
                let l = self.set_value(left, hint)?;
                let r = self.set_value(right, hint)?;
                Ok(format!("{l} {op} {r}"))
            }
            Expr::Call {
                function: function @ Function::IfNotExists,
                args,
            } => {
                function.check_arity(args.len())?;
                if !is_path(&args[0]) {
                    return Err(unsupported("call if_not_exists", "first argument must be a member"));
                }
                let path = self.path(&args[0])?;
                let value_hint = Hint::from_type(path.value_type.as_ref());
                let value = self.set_value(&args[1], value_hint)?;
                render(function.template(), &[path.text, value])
            }
            Expr::Call {
                function: function @ Function::ListAppend,
                args,
            } => {
                function.check_arity(args.len())?;
                let list = self.set_value(&args[0], Hint::None)?;
                let other = self.set_value(&args[1], Hint::None)?;
                render(function.template(), &[list, other])
            }
            other => self.operand(other, hint),
        }
    }

    // -----------------------------------------------------------------------
    // Key conditions
    // -----------------------------------------------------------------------

    fn key_member(&self, expr: &Expr) -> Option<String> {
        let Expr::Member { parent, name } = expr else {
            return None;
        };
        if !matches!(**parent, Expr::Item) {
            return None;
        }
        let declared = self
            .ctx
            .schema()
            .and_then(|s| s.lookup(name, self.ctx.codec().options()))
            .map(|(_, member)| member.name().to_owned());
        Some(declared.unwrap_or_else(|| name.clone()))
    }

    fn select_index(&self, members: &[(String, bool)]) -> MapperResult<Option<String>> {
        let Some(schema) = self.ctx.schema() else {
            return Ok(None);
        };
        let descriptor = TableDescriptor::for_schema(schema)?;
        let partition = members
            .iter()
            .position(|(_, is_eq)| *is_eq)
            .or(if members.is_empty() { None } else { Some(0) });
        let Some(partition) = partition else {
            return Err(unsupported("key condition", "no key member referenced"));
        };
        if members.len() > 2 {
            return Err(unsupported(
                "key condition",
                format!("references {} members; at most a partition and a sort key", members.len()),
            ));
        }
        let sort = members
            .iter()
            .enumerate()
            .find(|(i, _)| *i != partition)
            .map(|(_, (name, _))| name.as_str());
        descriptor.resolve_index_name(&members[partition].0, sort)
    }
}

// ---------------------------------------------------------------------------
// Update clause merging
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct UpdateClauses {
    text: String,
}

impl UpdateClauses {
    /// Splices `arg` into the clause for `verb`, or opens that clause.
    fn push(&mut self, verb: UpdateVerb, arg: &str) {
        let sections = verb_positions(&self.text);
        match sections.iter().position(|(_, _, v)| *v == verb) {
            Some(i) => {
                let end = sections
                    .get(i + 1)
                    .map_or(self.text.len(), |(start, _, _)| self.text[..*start].trim_end().len());
                self.text.insert_str(end, &format!(", {arg}"));
            }
            None => {
                if !self.text.is_empty() {
                    self.text.push(' ');
                }
                self.text.push_str(verb.keyword());
                self.text.push(' ');
                self.text.push_str(arg);
            }
        }
    }
}

fn words(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                out.push((s, &text[s..i]));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        out.push((s, &text[s..]));
    }
    out
}

/// `(start, end, verb)` of every top-level verb keyword in `text`.
fn verb_positions(text: &str) -> Vec<(usize, usize, UpdateVerb)> {
    let mut out = Vec::new();
    let mut depth: i64 = 0;
    for (start, word) in words(text) {
        if depth == 0 {
            if let Some(verb) = UpdateVerb::from_keyword(word) {
                out.push((start, start + word.len(), verb));
                continue;
            }
        }
        for c in word.chars() {
            match c {
                '(' | '[' => depth += 1,
                ')' | ']' => depth -= 1,
                _ => {}
            }
        }
    }
    out
}

fn split_update_text(text: &str) -> MapperResult<Vec<(UpdateVerb, &str)>> {
    let positions = verb_positions(text);
    let leading = positions.first().map_or(text, |(start, _, _)| &text[..*start]);
    if positions.is_empty() || !leading.trim().is_empty() {
        return Err(unsupported(
            "raw expression",
            "update text must start with SET, REMOVE, ADD or DELETE",
        ));
    }
    let mut sections = Vec::with_capacity(positions.len());
    for (i, (_, end, verb)) in positions.iter().enumerate() {
        let stop = positions.get(i + 1).map_or(text.len(), |(start, _, _)| *start);
        let body = text[*end..stop].trim();
        if body.is_empty() {
            return Err(unsupported("raw expression", format!("empty {verb} clause")));
        }
        sections.push((*verb, body));
    }
    Ok(sections)
}
