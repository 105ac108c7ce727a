//! Ordering and equality of runtime values.

use std::cmp::Ordering;

use dynq_core::Value;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::error::EvalError;
use crate::numeric::{as_number, Number};

fn not_comparable(left: &Value, right: &Value) -> EvalError {
    EvalError::NotComparable {
        left: left.type_name().to_owned(),
        right: right.type_name().to_owned(),
    }
}

fn compare_numbers(l: Number, r: Number) -> Option<Ordering> {
    match (l, r) {
        (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
        (Number::Decimal(a), Number::Decimal(b)) => Some(a.cmp(&b)),
        (Number::Float(a), Number::Float(b)) => Some(a.total_cmp(&b)),
        (Number::Int(a), Number::Decimal(b)) => Decimal::from_i128(a).map(|a| a.cmp(&b)),
        (Number::Decimal(a), Number::Int(b)) => Decimal::from_i128(b).map(|b| a.cmp(&b)),
        (a, b) => {
            let f = |n: Number| match n {
                Number::Int(i) => i as f64,
                Number::Float(f) => f,
                Number::Decimal(d) => d.to_f64().unwrap_or_default(),
            };
            Some(f(a).total_cmp(&f(b)))
        }
    }
}

/// Total order used by sorting, `Min` and `Max`. Nulls sort first,
/// strings compare ordinally.
pub fn compare_values(left: &Value, right: &Value) -> Result<Ordering, EvalError> {
    let ordering = match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::String(l), Value::String(r)) => l.cmp(r),
        (Value::Boolean(l), Value::Boolean(r)) => l.cmp(r),
        (Value::DateTime(l), Value::DateTime(r)) => l.cmp(r),
        (Value::TimeSpan(l), Value::TimeSpan(r)) => l.cmp(r),
        _ => match (as_number(left), as_number(right)) {
            (Some(l), Some(r)) => {
                compare_numbers(l, r).ok_or_else(|| not_comparable(left, right))?
            }
            _ => return Err(not_comparable(left, right)),
        },
    };
    Ok(ordering)
}

/// Equality as the `==` operator sees it: null equals only null, numbers
/// and enums compare by value, objects structurally.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        // NaN is unequal to everything, itself included.
        (Value::Single(_) | Value::Double(_), Value::Single(_) | Value::Double(_)) => {
            match (as_number(left), as_number(right)) {
                (Some(Number::Float(a)), Some(Number::Float(b))) => a == b,
                _ => false,
            }
        }
        _ => match (as_number(left), as_number(right)) {
            (Some(l), Some(r)) => compare_numbers(l, r) == Some(Ordering::Equal),
            _ => left == right,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynq_core::EnumType;

    #[test]
    fn nulls_sort_first() {
        assert_eq!(
            compare_values(&Value::Null, &Value::Int32(1)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            compare_values(&Value::from("a"), &Value::Null).unwrap(),
            Ordering::Greater
        );
    }

    #[test]
    fn strings_compare_ordinally() {
        assert_eq!(
            compare_values(&Value::from("B"), &Value::from("a")).unwrap(),
            Ordering::Less
        );
    }

    #[test]
    fn mixed_numbers_compare_by_value() {
        assert_eq!(
            compare_values(&Value::Int32(2), &Value::Decimal(Decimal::new(25, 1))).unwrap(),
            Ordering::Less
        );
        assert!(values_equal(&Value::Int64(3), &Value::Double(3.0)));
    }

    #[test]
    fn enums_compare_by_value() {
        let color = EnumType::with_names("Color", ["Red", "Green"]);
        let red = Value::Enum(color.clone(), 0);
        let green = Value::Enum(color, 1);
        assert_eq!(compare_values(&red, &green).unwrap(), Ordering::Less);
        assert!(!values_equal(&red, &green));
    }

    #[test]
    fn unrelated_values_are_not_comparable() {
        let err = compare_values(&Value::from("a"), &Value::Boolean(true)).unwrap_err();
        assert!(matches!(err, EvalError::NotComparable { .. }));
    }

    #[test]
    fn null_equals_only_null() {
        assert!(values_equal(&Value::Null, &Value::Null));
        assert!(!values_equal(&Value::Null, &Value::Int32(0)));
    }
}
