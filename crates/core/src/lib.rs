#![allow(clippy::result_large_err)]
//! dynq-core: compiles string expressions into typed lambda trees.
//!
//! Expression text is tokenized, parsed by recursive descent against the
//! parameter types, and every operator, member access and call is resolved
//! statically. The result is a [`Lambda`] whose body is a typed [`Expr`]
//! tree; `dynq-eval` runs it over rows of [`Value`]s.
//!
//! # Public API
//!
//! - [`compile_predicate()`], [`compile_projection()`], [`compile_ordering()`]
//!   and [`compile_lambda()`] -- compile entry points
//! - [`CompileContext`] -- resolves custom type names for one compilation
//! - [`Type`], [`ClassType`], [`EnumType`] -- the static type model
//! - [`ParseError`] -- the single compile failure type

pub mod builtins;
pub mod compile;
pub mod config;
pub mod context;
pub mod error;
pub mod expr;
pub mod lexer;
mod parser;
pub mod promote;
pub mod resolve;
pub mod shape;
pub mod types;
pub mod value;

// ── Convenience re-exports: model ────────────────────────────────────

pub use context::{CompileContext, CustomTypeProvider, StaticTypeProvider};
pub use error::{ErrorKind, ParseError};
pub use expr::{AggregateOp, BinaryOp, Expr, ExprKind, Lambda, Ordering, Param, UnaryOp};
pub use types::{ClassKind, ClassType, EnumType, FieldDescriptor, Type};
pub use value::{Group, Object, Value};

// ── Convenience re-exports: entry points ─────────────────────────────

pub use compile::{
    compile_lambda, compile_ordering, compile_predicate, compile_projection, Argument, ParamDecl,
};
pub use config::set_default_provider;
