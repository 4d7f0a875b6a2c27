//! Typed expressions compiled to the store's expression language.
//!
//! The pipeline is:
//!
//! 1. **Building**: the fluent API in [`ast`] produces an [`Expr`] tree.
//! 2. **Folding**: [`fold`] evaluates every subtree that does not touch the item.
//! 3. **Compiling**: [`ExpressionCompiler`] renders the rest into text, filling
//!    the name and value alias tables of an [`ExpressionContext`].

pub mod ast;
pub mod compiler;
pub mod context;
pub mod fold;
pub mod functions;
pub mod reserved;

pub use ast::{
    BinaryOp, Deferred, EnumTarget, Expr, RawExpression, UnaryOp, add, attr, cond, deferred,
    delete, if_not_exists, item, list_append, raw, remove, set, val,
};
pub use compiler::ExpressionCompiler;
pub use context::{CompiledExpression, ExpressionContext};
pub use functions::{Function, UpdateVerb};
pub use reserved::is_reserved;
