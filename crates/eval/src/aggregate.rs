//! Sequence aggregates: `Where`, `Any`, `All`, `Count`, `Min`, `Max`,
//! `Sum` and `Average`.
//!
//! `Min`, `Max`, `Sum` and `Average` skip null selector results. Over no
//! remaining items `Sum` yields zero, while the others yield null when the
//! result type admits it and fail otherwise.

use dynq_core::{AggregateOp, Type, Value};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::compare::compare_values;
use crate::error::EvalError;
use crate::numeric::{self, as_number, Number};

fn truth(value: Value, op: AggregateOp) -> Result<bool, EvalError> {
    match value {
        Value::Boolean(b) => Ok(b),
        Value::Null => Ok(false),
        other => Err(EvalError::type_error(format!(
            "{} expects a Boolean condition, got {}",
            op,
            other.type_name()
        ))),
    }
}

/// Applies `op` to `items`. `select` evaluates the aggregate's argument
/// for one item, or returns the item itself when there is no argument.
pub fn apply<F>(
    op: AggregateOp,
    items: &[Value],
    body: Option<&Type>,
    result: &Type,
    mut select: F,
) -> Result<Value, EvalError>
where
    F: FnMut(&Value) -> Result<Value, EvalError>,
{
    match op {
        AggregateOp::Where => {
            let mut kept = Vec::new();
            for item in items {
                if truth(select(item)?, op)? {
                    kept.push(item.clone());
                }
            }
            Ok(Value::list(kept))
        }
        AggregateOp::Any => {
            if body.is_none() {
                return Ok(Value::Boolean(!items.is_empty()));
            }
            for item in items {
                if truth(select(item)?, op)? {
                    return Ok(Value::Boolean(true));
                }
            }
            Ok(Value::Boolean(false))
        }
        AggregateOp::All => {
            for item in items {
                if !truth(select(item)?, op)? {
                    return Ok(Value::Boolean(false));
                }
            }
            Ok(Value::Boolean(true))
        }
        AggregateOp::Count => {
            let count = match body {
                None => items.len(),
                Some(_) => {
                    let mut n = 0usize;
                    for item in items {
                        if truth(select(item)?, op)? {
                            n += 1;
                        }
                    }
                    n
                }
            };
            i32::try_from(count)
                .map(Value::Int32)
                .map_err(|_| EvalError::overflow("Count exceeds Int32"))
        }
        AggregateOp::Min | AggregateOp::Max => {
            let mut best: Option<Value> = None;
            for item in items {
                let v = select(item)?;
                if v.is_null() {
                    continue;
                }
                best = Some(match best {
                    None => v,
                    Some(b) => {
                        let ordering = compare_values(&v, &b)?;
                        let replace = if op == AggregateOp::Min {
                            ordering.is_lt()
                        } else {
                            ordering.is_gt()
                        };
                        if replace {
                            v
                        } else {
                            b
                        }
                    }
                });
            }
            best.map_or_else(|| empty(result), Ok)
        }
        AggregateOp::Sum => {
            let ty = body.unwrap_or(result);
            let mut total = numeric::zero(ty);
            for item in items {
                let v = select(item)?;
                if !v.is_null() {
                    total = checked_add(&total, &v)?;
                }
            }
            Ok(total)
        }
        AggregateOp::Average => {
            let mut values = Vec::new();
            for item in items {
                let v = select(item)?;
                if !v.is_null() {
                    values.push(v);
                }
            }
            if values.is_empty() {
                return empty(result);
            }
            average(&values, result)
        }
    }
}

fn empty(result: &Type) -> Result<Value, EvalError> {
    if result.is_nullable() || !result.is_value_type() {
        Ok(Value::Null)
    } else {
        Err(EvalError::EmptySequence)
    }
}

fn checked_add(total: &Value, v: &Value) -> Result<Value, EvalError> {
    let sum = match (total, v) {
        (Value::Int32(a), Value::Int32(b)) => a.checked_add(*b).map(Value::Int32),
        (Value::Int64(a), Value::Int64(b)) => a.checked_add(*b).map(Value::Int64),
        (Value::Single(a), Value::Single(b)) => Some(Value::Single(a + b)),
        (Value::Double(a), Value::Double(b)) => Some(Value::Double(a + b)),
        (Value::Decimal(a), Value::Decimal(b)) => a.checked_add(*b).map(Value::Decimal),
        _ => {
            return Err(EvalError::type_error(format!(
                "Sum is not defined for {}",
                v.type_name()
            )))
        }
    };
    sum.ok_or_else(|| EvalError::overflow("Sum overflow"))
}

fn average(values: &[Value], result: &Type) -> Result<Value, EvalError> {
    let count = values.len();
    match result.non_nullable() {
        Type::Decimal => {
            let mut total = Decimal::ZERO;
            for v in values {
                if let Value::Decimal(d) = v {
                    total = total
                        .checked_add(*d)
                        .ok_or_else(|| EvalError::overflow("Average overflow"))?;
                }
            }
            let n = Decimal::from_usize(count).ok_or_else(|| EvalError::overflow("Average"))?;
            total
                .checked_div(n)
                .map(Value::Decimal)
                .ok_or_else(|| EvalError::overflow("Average overflow"))
        }
        Type::Single => {
            let total: f64 = values.iter().map(float).sum();
            Ok(Value::Single((total / count as f64) as f32))
        }
        _ => {
            let total: f64 = values.iter().map(float).sum();
            Ok(Value::Double(total / count as f64))
        }
    }
}

fn float(value: &Value) -> f64 {
    match as_number(value) {
        Some(Number::Int(i)) => i as f64,
        Some(Number::Float(f)) => f,
        Some(Number::Decimal(d)) => d.to_f64().unwrap_or_default(),
        None => 0.0,
    }
}
