//! Compile entry points: expression text plus parameters in, typed lambda out.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::context::CompileContext;
use crate::error::ParseError;
use crate::expr::{Lambda, Ordering};
use crate::parser::Parser;
use crate::types::Type;
use crate::value::Value;

/// A lambda parameter before it is bound to a slot.
#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: Option<String>,
    pub ty: Type,
}

impl ParamDecl {
    /// The implicit parameter, referred to as `it`.
    pub fn it(ty: Type) -> Self {
        ParamDecl { name: None, ty }
    }

    pub fn named(name: impl Into<String>, ty: Type) -> Self {
        ParamDecl {
            name: Some(name.into()),
            ty,
        }
    }
}

/// A value supplied alongside the expression text.
///
/// Positional arguments are addressed as `@0`, `@1`, ... in the text. A
/// trailing `Named` map makes each of its entries addressable by name.
#[derive(Debug, Clone)]
pub enum Argument {
    /// Typed by the value itself. `Null` is typed `Object`.
    Value(Value),
    /// A value with an explicit static type, e.g. a null `Int32?`.
    Typed(Value, Type),
    Lambda(Arc<Lambda>),
    Named(BTreeMap<String, Value>),
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::Value(value)
    }
}

pub fn compile_lambda(
    ctx: &CompileContext,
    params: &[ParamDecl],
    result: Option<&Type>,
    text: &str,
    args: &[Argument],
) -> Result<Lambda, ParseError> {
    let mut parser = Parser::new(ctx, text);
    let params = parser.declare_parameters(params)?;
    parser.declare_arguments(args)?;
    parser.start()?;
    let body = parser.parse(result)?;
    debug!(expression = text, ty = %body.ty, "compiled lambda");
    Ok(Lambda {
        params,
        body,
        slots: parser.slot_count(),
    })
}

/// Compiles a `Boolean` filter over `element`.
pub fn compile_predicate(
    ctx: &CompileContext,
    element: &Type,
    text: &str,
    args: &[Argument],
) -> Result<Lambda, ParseError> {
    compile_lambda(
        ctx,
        &[ParamDecl::it(element.clone())],
        Some(&Type::Boolean),
        text,
        args,
    )
}

/// Compiles a selector over `element`; the result type is whatever the
/// expression yields.
pub fn compile_projection(
    ctx: &CompileContext,
    element: &Type,
    text: &str,
    args: &[Argument],
) -> Result<Lambda, ParseError> {
    compile_lambda(ctx, &[ParamDecl::it(element.clone())], None, text, args)
}

/// Compiles `key [asc|desc], ...` into one selector per key.
pub fn compile_ordering(
    ctx: &CompileContext,
    element: &Type,
    text: &str,
    args: &[Argument],
) -> Result<Vec<Ordering>, ParseError> {
    let mut parser = Parser::new(ctx, text);
    let params = parser.declare_parameters(&[ParamDecl::it(element.clone())])?;
    parser.declare_arguments(args)?;
    parser.start()?;
    let keys = parser.parse_ordering()?;
    let slots = parser.slot_count();
    debug!(expression = text, keys = keys.len(), "compiled ordering");
    Ok(keys
        .into_iter()
        .map(|(body, ascending)| Ordering {
            selector: Lambda {
                params: params.clone(),
                body,
                slots,
            },
            ascending,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::ClassType;

    fn person() -> Type {
        Type::Class(
            ClassType::builder("Person")
                .field("Name", Type::String)
                .field("Age", Type::Int32)
                .build(),
        )
    }

    #[test]
    fn predicate_is_boolean() {
        let ctx = CompileContext::empty();
        let lambda = compile_predicate(&ctx, &person(), "Age > 30", &[]).unwrap();
        assert_eq!(lambda.return_type(), &Type::Boolean);
        assert_eq!(lambda.params.len(), 1);
        assert!(lambda.params[0].name.is_none());
    }

    #[test]
    fn predicate_must_be_boolean() {
        let ctx = CompileContext::empty();
        let err = compile_predicate(&ctx, &person(), "Age + 1", &[]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ExpressionTypeMismatch("Boolean".into()));
        assert_eq!(err.position, 0);
    }

    #[test]
    fn ordering_yields_one_selector_per_key() {
        let ctx = CompileContext::empty();
        let keys = compile_ordering(&ctx, &person(), "Age DESC, Name", &[]).unwrap();
        assert_eq!(keys.len(), 2);
        assert!(!keys[0].ascending);
        assert!(keys[1].ascending);
        assert_eq!(keys[0].selector.return_type(), &Type::Int32);
        assert_eq!(keys[1].selector.return_type(), &Type::String);
    }

    #[test]
    fn named_parameters_are_symbols() {
        let ctx = CompileContext::empty();
        let params = [
            ParamDecl::named("x", Type::Int32),
            ParamDecl::named("y", Type::Int32),
        ];
        let lambda = compile_lambda(&ctx, &params, None, "x * y", &[]).unwrap();
        assert_eq!(lambda.return_type(), &Type::Int32);
        assert_eq!(lambda.slots, 2);
    }

    #[test]
    fn positional_and_named_arguments() {
        let ctx = CompileContext::empty();
        let named = BTreeMap::from([("limit".to_owned(), Value::Int32(40))]);
        let args = [Argument::Value(Value::from("a")), Argument::Named(named)];
        let lambda =
            compile_predicate(&ctx, &person(), "Name != @0 && Age < limit", &args).unwrap();
        assert_eq!(lambda.return_type(), &Type::Boolean);
    }

    #[test]
    fn named_map_must_come_last() {
        let ctx = CompileContext::empty();
        let args = [
            Argument::Named(BTreeMap::new()),
            Argument::Value(Value::Int32(1)),
        ];
        let err = compile_predicate(&ctx, &person(), "Age > @1", &args).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NamedValuesNotLast);
    }

    #[test]
    fn lambda_argument_can_be_invoked() {
        let ctx = CompileContext::empty();
        let double = compile_lambda(
            &ctx,
            &[ParamDecl::named("n", Type::Int32)],
            None,
            "n * 2",
            &[],
        )
        .unwrap();
        let args = [Argument::Lambda(Arc::new(double))];
        let lambda = compile_predicate(&ctx, &person(), "@0(Age) > 60", &args).unwrap();
        assert_eq!(lambda.return_type(), &Type::Boolean);

        let err = compile_predicate(&ctx, &person(), "@0(Name) > 60", &args).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArgsIncompatibleWithLambda);
    }
}
