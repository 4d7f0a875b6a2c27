//! Error type shared by the codec, descriptor and expression compiler.
//!
//! Every failure is deterministic and local. Decode failures pick up a path
//! prefix as they propagate out of nested values, so the rendered error names
//! the exact attribute chain (`$.address.lines[2]`) that failed.

use std::fmt;

use dynamap_model::AttributeValue;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type MapperResult<T> = Result<T, MapperError>;

/// One step of an attribute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Map member or document field.
    Field(String),
    /// List element.
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) if is_plain_identifier(name) => write!(f, ".{name}"),
            Self::Field(name) => write!(f, "[{name:?}]"),
            Self::Index(i) => write!(f, "[{i}]"),
        }
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn render_path(path: &[PathSegment]) -> String {
    let mut out = String::from("$");
    for segment in path {
        out.push_str(&segment.to_string());
    }
    out
}

/// Errors raised by mapping, key handling and expression compilation.
#[derive(Debug, Error)]
pub enum MapperError {
    /// A type has no applicable converter, or a numeric target is unsupported.
    #[error("unsupported type {type_name}: {reason}")]
    UnsupportedType {
        /// Rust type name.
        type_name: String,
        /// What was attempted.
        reason: String,
    },
    /// An expression node has no translation rule.
    #[error("unsupported expression {node}: {reason}")]
    UnsupportedExpression {
        /// Offending node kind.
        node: String,
        /// Why it cannot be translated.
        reason: String,
    },
    /// A required attribute (typically a key component) is absent.
    #[error("missing required attribute '{attribute}'")]
    MissingRequiredAttribute {
        /// Attribute name.
        attribute: String,
    },
    /// A set contained mixed element families or a null element.
    #[error("invalid set contents: {message}")]
    InvalidSetContents {
        /// Explanation.
        message: String,
    },
    /// An index slot was declared twice.
    #[error("ambiguous index declaration on {type_name}: {message}")]
    AmbiguousIndex {
        /// Declaring type.
        type_name: String,
        /// Explanation.
        message: String,
    },
    /// A partition/sort member pair does not share any key or index.
    #[error("'{partition}' and '{sort}' are not part of the same key/index")]
    KeyIndexMismatch {
        /// Partition member.
        partition: String,
        /// Sort member.
        sort: String,
    },
    /// Primary-key text could not be parsed.
    #[error("malformed key text '{text}': {reason}")]
    MalformedKeyText {
        /// Input text.
        text: String,
        /// What was wrong.
        reason: String,
    },
    /// The attribute variant cannot be converted to the requested type.
    #[error("cannot convert {actual} to {expected}")]
    TypeMismatch {
        /// Requested type.
        expected: String,
        /// Wire type descriptor found.
        actual: String,
    },
    /// Number text does not fit the requested numeric kind.
    #[error("invalid number '{text}' for {target}")]
    InvalidNumber {
        /// Number text.
        text: String,
        /// Requested numeric type.
        target: String,
    },
    /// Declared metadata is inconsistent.
    #[error("invalid metadata on {type_name}: {message}")]
    InvalidMetadata {
        /// Declaring type.
        type_name: String,
        /// Explanation.
        message: String,
    },
    /// An expression references a member the document does not declare.
    #[error("{type_name} has no member '{member}'")]
    UnknownMember {
        /// Document type.
        type_name: String,
        /// Member name.
        member: String,
    },
    /// A raw expression binding collides with an existing alias.
    #[error("alias '{alias}' is already bound to a different value")]
    AliasConflict {
        /// Conflicting alias.
        alias: String,
    },
    /// The attribute writer was driven with unbalanced calls.
    #[error("writer error: {message}")]
    Writer {
        /// Explanation.
        message: String,
    },
    /// Failure raised by a user-supplied converter or interceptor.
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
    /// A nested failure with the attribute path that led to it.
    #[error("at {}: {source}", render_path(.path))]
    AtPath {
        /// Path from the outermost value, outermost segment first.
        path: Vec<PathSegment>,
        /// Underlying failure.
        source: Box<MapperError>,
    },
}

impl MapperError {
    /// Shorthand for [`MapperError::UnsupportedType`].
    #[must_use]
    pub fn unsupported_type(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`MapperError::UnsupportedExpression`].
    #[must_use]
    pub fn unsupported_expression(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedExpression {
            node: node.into(),
            reason: reason.into(),
        }
    }

    /// Type mismatch between `expected` and the variant of `actual`.
    #[must_use]
    pub fn type_mismatch(expected: impl Into<String>, actual: &AttributeValue) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.type_descriptor().to_owned(),
        }
    }

    /// Shorthand for [`MapperError::Writer`].
    #[must_use]
    pub fn writer(message: impl Into<String>) -> Self {
        Self::Writer {
            message: message.into(),
        }
    }

    /// Prefixes `segment` to the error's path.
    #[must_use]
    pub fn at(self, segment: PathSegment) -> Self {
        match self {
            Self::AtPath { mut path, source } => {
                path.insert(0, segment);
                Self::AtPath { path, source }
            }
            other => Self::AtPath {
                path: vec![segment],
                source: Box::new(other),
            },
        }
    }

    /// Renders the accumulated path, `$` when the error is not nested.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::AtPath { path, .. } => render_path(path),
            _ => "$".to_owned(),
        }
    }

    /// The failure underneath any path wrapping.
    #[must_use]
    pub fn root_cause(&self) -> &MapperError {
        match self {
            Self::AtPath { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
