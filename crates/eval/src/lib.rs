//! dynq evaluator -- runs lambdas compiled by `dynq-core` over rows of
//! runtime values.
//!
//! The evaluator walks the typed expression tree directly. Member access
//! dispatches on the getter or callable recorded at compile time, so no
//! name lookup happens per row. [`DynamicQuery`] layers where/select/
//! order/group operators over an in-memory sequence.

pub mod aggregate;
pub mod builtins;
pub mod compare;
pub mod error;
pub mod eval;
pub mod numeric;
pub mod query;

pub use compare::{compare_values, values_equal};
pub use error::EvalError;
pub use eval::{eval_lambda, eval_predicate, Evaluator};
pub use query::{DynamicQuery, QueryError};

/// Compiles `predicate` over `element` and keeps the matching rows.
///
/// Convenience for one-off filters; use [`DynamicQuery`] to chain
/// operators.
pub fn filter(
    element: &dynq_core::Type,
    rows: &[dynq_core::Value],
    predicate: &str,
    args: &[dynq_core::Argument],
) -> Result<Vec<dynq_core::Value>, QueryError> {
    let query = DynamicQuery::new(element.clone(), rows.to_vec());
    Ok(query.where_(predicate, args)?.into_rows())
}
