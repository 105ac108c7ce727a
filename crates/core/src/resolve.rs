//! Overload resolution.
//!
//! Candidates are filtered to those every argument can be promoted to,
//! then narrowed to the ones better than all other applicable candidates.

use std::cmp::Ordering;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::expr::{AggregateOp, Expr};
use crate::promote::{is_compatible_with, promote};
use crate::types::{Method, Type};

/// Anything with a parameter list that can take part in resolution.
pub trait Signature {
    fn params(&self) -> &[Type];
}

impl Signature for Vec<Type> {
    fn params(&self) -> &[Type] {
        self
    }
}

impl Signature for Arc<Method> {
    fn params(&self) -> &[Type] {
        &self.params
    }
}

#[derive(Debug, Clone)]
pub enum Resolution {
    NoMatch,
    /// The winning candidate and the arguments promoted to its parameters.
    Found { index: usize, args: Vec<Expr> },
    /// Number of equally good candidates.
    Ambiguous(usize),
}

struct Applicable {
    index: usize,
    args: Vec<Expr>,
}

/// Ordering of two parameter types as targets for an argument of type
/// `source`. `Greater` means `t1` is the better conversion.
pub fn compare_conversions(source: &Type, t1: &Type, t2: &Type) -> Ordering {
    if t1 == t2 {
        return Ordering::Equal;
    }
    if source == t1 {
        return Ordering::Greater;
    }
    if source == t2 {
        return Ordering::Less;
    }
    let t1_to_t2 = is_compatible_with(t1, t2);
    let t2_to_t1 = is_compatible_with(t2, t1);
    if t1_to_t2 && !t2_to_t1 {
        return Ordering::Greater;
    }
    if t2_to_t1 && !t1_to_t2 {
        return Ordering::Less;
    }
    if t1.is_signed_integral() && t2.is_unsigned_integral() {
        return Ordering::Greater;
    }
    if t2.is_signed_integral() && t1.is_unsigned_integral() {
        return Ordering::Less;
    }
    Ordering::Equal
}

fn is_better_than(args: &[Expr], m1: &[Type], m2: &[Type]) -> bool {
    let mut better = false;
    for ((arg, p1), p2) in args.iter().zip(m1).zip(m2) {
        match compare_conversions(&arg.ty, p1, p2) {
            Ordering::Less => return false,
            Ordering::Greater => better = true,
            Ordering::Equal => {}
        }
    }
    better
}

fn applicable<S: Signature>(candidate: &S, args: &[Expr]) -> Option<Vec<Expr>> {
    let params = candidate.params();
    if params.len() != args.len() {
        return None;
    }
    args.iter()
        .zip(params)
        .map(|(arg, param)| promote(arg, param, false))
        .collect()
}

/// Picks the best candidate for `args`.
pub fn find_best<S: Signature>(candidates: &[S], args: &[Expr]) -> Resolution {
    let found: Vec<Applicable> = candidates
        .iter()
        .enumerate()
        .filter_map(|(index, c)| applicable(c, args).map(|args| Applicable { index, args }))
        .collect();

    let best: Vec<&Applicable> = if found.len() > 1 {
        found
            .iter()
            .filter(|m| {
                found.iter().all(|n| {
                    m.index == n.index
                        || is_better_than(
                            args,
                            candidates[m.index].params(),
                            candidates[n.index].params(),
                        )
                })
            })
            .collect()
    } else {
        found.iter().collect()
    };

    match best.as_slice() {
        [] if found.is_empty() => Resolution::NoMatch,
        [] => Resolution::Ambiguous(found.len()),
        [one] => Resolution::Found {
            index: one.index,
            args: one.args.clone(),
        },
        many => Resolution::Ambiguous(many.len()),
    }
}

// ──────────────────────────────────────────────
// Operator signature tables
// ──────────────────────────────────────────────

fn unary(types: &[Type]) -> Vec<Vec<Type>> {
    types.iter().map(|t| vec![t.clone()]).collect()
}

fn binary(types: &[Type]) -> Vec<Vec<Type>> {
    types.iter().map(|t| vec![t.clone(), t.clone()]).collect()
}

fn with_nullables(types: &[Type]) -> Vec<Type> {
    let mut all = types.to_vec();
    all.extend(types.iter().map(|t| Type::nullable(t.clone())));
    all
}

fn arithmetic_types() -> Vec<Type> {
    with_nullables(&[
        Type::Int32,
        Type::UInt32,
        Type::Int64,
        Type::UInt64,
        Type::Single,
        Type::Double,
        Type::Decimal,
    ])
}

fn relational_types() -> Vec<Type> {
    let mut types = arithmetic_types();
    types.push(Type::String);
    types.extend(with_nullables(&[Type::Char, Type::DateTime, Type::TimeSpan]));
    types
}

/// `&&` and `||`.
pub static LOGICAL: Lazy<Vec<Vec<Type>>> =
    Lazy::new(|| binary(&with_nullables(&[Type::Boolean])));

/// `*`, `/` and `%`.
pub static ARITHMETIC: Lazy<Vec<Vec<Type>>> = Lazy::new(|| binary(&arithmetic_types()));

pub static RELATIONAL: Lazy<Vec<Vec<Type>>> = Lazy::new(|| binary(&relational_types()));

pub static EQUALITY: Lazy<Vec<Vec<Type>>> = Lazy::new(|| {
    let mut types = relational_types();
    types.extend(with_nullables(&[Type::Boolean]));
    binary(&types)
});

fn date_arithmetic() -> Vec<Vec<Type>> {
    vec![
        vec![Type::DateTime, Type::TimeSpan],
        vec![Type::nullable(Type::DateTime), Type::nullable(Type::TimeSpan)],
        vec![Type::TimeSpan, Type::TimeSpan],
        vec![Type::nullable(Type::TimeSpan), Type::nullable(Type::TimeSpan)],
    ]
}

pub static ADD: Lazy<Vec<Vec<Type>>> = Lazy::new(|| {
    let mut sigs = binary(&arithmetic_types());
    sigs.extend(date_arithmetic());
    sigs
});

pub static SUBTRACT: Lazy<Vec<Vec<Type>>> = Lazy::new(|| {
    let mut sigs = ADD.clone();
    sigs.push(vec![Type::DateTime, Type::DateTime]);
    sigs.push(vec![
        Type::nullable(Type::DateTime),
        Type::nullable(Type::DateTime),
    ]);
    sigs
});

pub static NEGATION: Lazy<Vec<Vec<Type>>> = Lazy::new(|| {
    unary(&with_nullables(&[
        Type::Int32,
        Type::Int64,
        Type::Single,
        Type::Double,
        Type::Decimal,
    ]))
});

pub static NOT: Lazy<Vec<Vec<Type>>> = Lazy::new(|| unary(&with_nullables(&[Type::Boolean])));

// ──────────────────────────────────────────────
// Aggregates
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AggregateSignature {
    pub op: AggregateOp,
    pub params: Vec<Type>,
}

impl Signature for AggregateSignature {
    fn params(&self) -> &[Type] {
        &self.params
    }
}

pub static AGGREGATES: Lazy<Vec<AggregateSignature>> = Lazy::new(|| {
    use AggregateOp::*;
    let sig = |op, params: Vec<Type>| AggregateSignature { op, params };
    let mut sigs = vec![
        sig(Where, vec![Type::Boolean]),
        sig(Any, vec![]),
        sig(Any, vec![Type::Boolean]),
        sig(All, vec![Type::Boolean]),
        sig(Count, vec![]),
        sig(Count, vec![Type::Boolean]),
        sig(Min, vec![Type::Object]),
        sig(Max, vec![Type::Object]),
    ];
    let summable = with_nullables(&[
        Type::Int32,
        Type::Int64,
        Type::Single,
        Type::Double,
        Type::Decimal,
    ]);
    for op in [Sum, Average] {
        sigs.extend(summable.iter().map(|t| sig(op, vec![t.clone()])));
    }
    sigs
});

/// Aggregate overloads named `name`, ignoring case.
pub fn aggregates_named(name: &str) -> Vec<AggregateSignature> {
    AGGREGATES
        .iter()
        .filter(|s| s.op.name().eq_ignore_ascii_case(name))
        .cloned()
        .collect()
}

/// Result type of an aggregate whose selector argument has type `arg`.
pub fn aggregate_result(op: AggregateOp, source: &Type, arg: Option<&Type>) -> Type {
    match (op, arg) {
        (AggregateOp::Where, _) => Type::list(source.element_type().unwrap_or(Type::Object)),
        (AggregateOp::Any | AggregateOp::All, _) => Type::Boolean,
        (AggregateOp::Count, _) => Type::Int32,
        (AggregateOp::Average, Some(t)) => {
            let inner = match t.non_nullable() {
                Type::Int32 | Type::Int64 => Type::Double,
                other => other.clone(),
            };
            if t.is_nullable() {
                Type::nullable(inner)
            } else {
                inner
            }
        }
        (_, Some(t)) => t.clone(),
        (_, None) => Type::Object,
    }
}
