//! Store functions and update verbs, each driven by a positional template.
//!
//! `{N}` is replaced by the N-th rendered argument. `{*}` is replaced by every
//! argument after the last numbered placeholder, comma-joined; it is how
//! variable-arity functions such as `IN` receive their spliced list.

use std::fmt;

use crate::error::{MapperError, MapperResult};

/// Update clause keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateVerb {
    /// `SET path = value`.
    Set,
    /// `REMOVE path`.
    Remove,
    /// `ADD path value`.
    Add,
    /// `DELETE path value`.
    Delete,
}

impl UpdateVerb {
    /// All verbs.
    pub const ALL: [Self; 4] = [Self::Set, Self::Remove, Self::Add, Self::Delete];

    /// Clause keyword.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Set => "SET",
            Self::Remove => "REMOVE",
            Self::Add => "ADD",
            Self::Delete => "DELETE",
        }
    }

    /// Verb named by `word`, ignoring case.
    #[must_use]
    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|verb| verb.keyword().eq_ignore_ascii_case(word))
    }
}

impl fmt::Display for UpdateVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Functions and update actions the compiler knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    /// `attribute_exists(path)`.
    AttributeExists,
    /// `attribute_not_exists(path)`.
    AttributeNotExists,
    /// `attribute_type(path, type)`.
    AttributeType,
    /// `begins_with(path, prefix)`.
    BeginsWith,
    /// `contains(path, operand)`.
    Contains,
    /// `size(path)`; an operand, not a condition.
    Size,
    /// `operand BETWEEN low AND high`.
    Between,
    /// `operand IN (candidates...)`.
    In,
    /// `SET path = value`.
    Set,
    /// `REMOVE path`.
    Remove,
    /// `ADD path value`.
    Add,
    /// `DELETE path value`.
    Delete,
    /// `if_not_exists(path, value)`; only inside `SET`.
    IfNotExists,
    /// `list_append(list, list)`; only inside `SET`.
    ListAppend,
}

impl Function {
    /// Argument template.
    #[must_use]
    pub fn template(self) -> &'static str {
        match self {
            Self::AttributeExists => "attribute_exists({0})",
            Self::AttributeNotExists => "attribute_not_exists({0})",
            Self::AttributeType => "attribute_type({0}, {1})",
            Self::BeginsWith => "begins_with({0}, {1})",
            Self::Contains => "contains({0}, {1})",
            Self::Size => "size({0})",
            Self::Between => "{0} BETWEEN {1} AND {2}",
            Self::In => "{0} IN ({*})",
            Self::Set => "{0} = {1}",
            Self::Remove => "{0}",
            Self::Add | Self::Delete => "{0} {1}",
            Self::IfNotExists => "if_not_exists({0}, {1})",
            Self::ListAppend => "list_append({0}, {1})",
        }
    }

    /// Fixed argument count, or the minimum for variable-arity functions.
    #[must_use]
    pub fn arity(self) -> usize {
        match self {
            Self::AttributeExists | Self::AttributeNotExists | Self::Size | Self::Remove => 1,
            Self::Between => 3,
            _ => 2,
        }
    }

    /// Whether extra arguments are spliced into `{*}`.
    #[must_use]
    pub fn is_variadic(self) -> bool {
        matches!(self, Self::In)
    }

    /// The clause this action belongs to, for update verbs.
    #[must_use]
    pub fn verb(self) -> Option<UpdateVerb> {
        match self {
            Self::Set => Some(UpdateVerb::Set),
            Self::Remove => Some(UpdateVerb::Remove),
            Self::Add => Some(UpdateVerb::Add),
            Self::Delete => Some(UpdateVerb::Delete),
            _ => None,
        }
    }

    /// Whether the function yields a boolean.
    #[must_use]
    pub fn is_predicate(self) -> bool {
        matches!(
            self,
            Self::AttributeExists
                | Self::AttributeNotExists
                | Self::AttributeType
                | Self::BeginsWith
                | Self::Contains
                | Self::Between
                | Self::In
        )
    }

    /// Whether the function is only valid on the right of `SET`.
    #[must_use]
    pub fn is_set_operand(self) -> bool {
        matches!(self, Self::IfNotExists | Self::ListAppend)
    }

    /// Checks the argument count.
    pub fn check_arity(self, count: usize) -> MapperResult<()> {
        let ok = if self.is_variadic() {
            count >= self.arity()
        } else {
            count == self.arity()
        };
        if ok {
            Ok(())
        } else {
            Err(MapperError::unsupported_expression(
                format!("call {self}"),
                format!("expected {} argument(s), got {count}", self.arity()),
            ))
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AttributeExists => "attribute_exists",
            Self::AttributeNotExists => "attribute_not_exists",
            Self::AttributeType => "attribute_type",
            Self::BeginsWith => "begins_with",
            Self::Contains => "contains",
            Self::Size => "size",
            Self::Between => "between",
            Self::In => "in",
            Self::Set => "set",
            Self::Remove => "remove",
            Self::Add => "add",
            Self::Delete => "delete",
            Self::IfNotExists => "if_not_exists",
            Self::ListAppend => "list_append",
        };
        f.write_str(name)
    }
}

/// Substitutes rendered arguments into `template`.
pub fn render(template: &str, args: &[String]) -> MapperResult<String> {
    let mut out = String::with_capacity(template.len() + args.iter().map(String::len).sum::<usize>());
    let mut highest = 0;
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            return Err(MapperError::unsupported_expression(
                "template",
                format!("unterminated placeholder in '{template}'"),
            ));
        };
        let placeholder = &after[..close];
        if placeholder == "*" {
            out.push_str(&args.get(highest..).unwrap_or_default().join(", "));
        } else {
            let position: usize = placeholder.parse().map_err(|_| {
                MapperError::unsupported_expression("template", format!("bad placeholder '{{{placeholder}}}'"))
            })?;
            let arg = args.get(position).ok_or_else(|| {
                MapperError::unsupported_expression(
                    "template",
                    format!("placeholder {{{position}}} has no argument"),
                )
            })?;
            out.push_str(arg);
            highest = highest.max(position + 1);
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_should_render_positional_templates() {
        assert_eq!(
            render(Function::Between.template(), &args(&["a", ":v0", ":v1"])).unwrap(),
            "a BETWEEN :v0 AND :v1"
        );
        assert_eq!(
            render(Function::BeginsWith.template(), &args(&["#p0", ":v0"])).unwrap(),
            "begins_with(#p0, :v0)"
        );
    }

    #[test]
    fn test_should_splice_variadic_arguments() {
        assert_eq!(
            render(Function::In.template(), &args(&["a", ":v0", ":v1", ":v2"])).unwrap(),
            "a IN (:v0, :v1, :v2)"
        );
    }

    #[test]
    fn test_should_reject_missing_arguments() {
        assert!(render(Function::Contains.template(), &args(&["a"])).is_err());
        assert!(Function::In.check_arity(1).is_err());
        assert!(Function::In.check_arity(4).is_ok());
        assert!(Function::Size.check_arity(2).is_err());
    }

    #[test]
    fn test_should_parse_verbs_case_insensitively() {
        assert_eq!(UpdateVerb::from_keyword("remove"), Some(UpdateVerb::Remove));
        assert_eq!(UpdateVerb::from_keyword("Set"), Some(UpdateVerb::Set));
        assert_eq!(UpdateVerb::from_keyword("put"), None);
        assert_eq!(Function::Delete.verb(), Some(UpdateVerb::Delete));
    }
}
