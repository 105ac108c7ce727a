//! Public compile API, exercised the way a host application would.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use dynq_core::{
    compile_lambda, compile_ordering, compile_predicate, compile_projection, Argument,
    ClassType, CompileContext, EnumType, ErrorKind, ParamDecl, StaticTypeProvider, Type, Value,
};
use pretty_assertions::assert_eq;

fn customer() -> (Type, CompileContext) {
    let tier = EnumType::with_names("Tier", ["Basic", "Gold"]);
    let customer = ClassType::builder("Customer")
        .field("Name", Type::String)
        .field("Visits", Type::Int32)
        .field("Level", Type::Enum(tier.clone()))
        .field("Spent", Type::Decimal)
        .build();
    let ctx = CompileContext::new(&StaticTypeProvider::new([
        Type::Enum(tier),
        Type::Class(customer.clone()),
    ]));
    (Type::Class(customer), ctx)
}

#[test]
fn context_lookup_is_case_insensitive() {
    let (_, ctx) = customer();
    assert_eq!(ctx.len(), 2);
    assert!(ctx.lookup("tier").is_some());
    assert!(ctx.lookup("CUSTOMER").is_some());
    assert!(ctx.lookup("Order").is_none());
}

#[test]
fn ordering_keys_carry_direction_and_type() {
    let (element, ctx) = customer();
    let keys =
        compile_ordering(&ctx, &element, "Level desc, Name ascending, Visits", &[]).unwrap();
    let summary: Vec<(String, bool)> = keys
        .iter()
        .map(|k| (k.selector.return_type().to_string(), k.ascending))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Tier".to_owned(), false),
            ("String".to_owned(), true),
            ("Int32".to_owned(), true),
        ]
    );
}

#[test]
fn named_arguments_are_addressable_by_name() {
    let (element, ctx) = customer();
    let mut named = BTreeMap::new();
    named.insert("threshold".to_owned(), Value::Int32(3));
    let args = [Argument::Value(Value::from("a")), Argument::Named(named)];
    let lambda = compile_predicate(
        &ctx,
        &element,
        "Visits >= THRESHOLD && Name.StartsWith(@0)",
        &args,
    )
    .unwrap();
    assert_eq!(lambda.return_type(), &Type::Boolean);
}

#[test]
fn named_arguments_must_come_last() {
    let (element, ctx) = customer();
    let args = [
        Argument::Named(BTreeMap::new()),
        Argument::Value(Value::Int32(1)),
    ];
    let err = compile_predicate(&ctx, &element, "Visits > @1", &args).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NamedValuesNotLast);
    assert_eq!(err.position, 0);
}

#[test]
fn explicit_parameters_replace_it() {
    let (element, ctx) = customer();
    let params = [
        ParamDecl::named("c", element.clone()),
        ParamDecl::named("bonus", Type::Decimal),
    ];
    let lambda = compile_lambda(
        &ctx,
        &params,
        Some(&Type::Decimal),
        "c.Spent + bonus",
        &[],
    )
    .unwrap();
    assert_eq!(lambda.param_types(), vec![element.clone(), Type::Decimal]);

    let err = compile_lambda(&ctx, &params, None, "Spent", &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownIdentifier("Spent".into()));
}

#[test]
fn result_type_is_enforced() {
    let (element, ctx) = customer();
    let err = compile_predicate(&ctx, &element, "Visits + 1", &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ExpressionTypeMismatch("Boolean".into()));
}

#[test]
fn projections_share_shapes_across_threads() {
    let (element, ctx) = customer();
    let ctx = Arc::new(ctx);
    let handles: Vec<_> = (0..6)
        .map(|_| {
            let (ctx, element) = (ctx.clone(), element.clone());
            thread::spawn(move || {
                compile_projection(&ctx, &element, "new (Name, Spent * 2 as Doubled)", &[])
                    .unwrap()
                    .return_type()
                    .clone()
            })
        })
        .collect();
    let types: Vec<Type> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(types.windows(2).all(|w| w[0] == w[1]));
    match &types[0] {
        Type::Class(shape) => {
            let names: Vec<&str> = shape.fields().iter().map(|f| f.name.as_str()).collect();
            assert_eq!(names, vec!["Name", "Doubled"]);
        }
        other => panic!("expected a shape, got {}", other),
    }
}
