//! Arithmetic and conversions over runtime values.
//!
//! Integer `+`, `-` and `*` wrap on overflow; division and remainder are
//! checked. `Decimal` arithmetic is always checked. Conversions marked
//! `checked` fail with [`EvalError::Overflow`] when the value does not fit
//! the target; unchecked ones truncate.

use dynq_core::{BinaryOp, Type, Value};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::error::EvalError;

/// A numeric value widened to one of three representations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i128),
    Float(f64),
    Decimal(Decimal),
}

/// Reads any numeric, char or enum value as a [`Number`].
pub fn as_number(value: &Value) -> Option<Number> {
    let n = match value {
        Value::SByte(v) => Number::Int(i128::from(*v)),
        Value::Byte(v) => Number::Int(i128::from(*v)),
        Value::Int16(v) => Number::Int(i128::from(*v)),
        Value::UInt16(v) => Number::Int(i128::from(*v)),
        Value::Int32(v) => Number::Int(i128::from(*v)),
        Value::UInt32(v) => Number::Int(i128::from(*v)),
        Value::Int64(v) => Number::Int(i128::from(*v)),
        Value::UInt64(v) => Number::Int(i128::from(*v)),
        Value::Char(c) => Number::Int(i128::from(u32::from(*c))),
        Value::Enum(_, v) => Number::Int(i128::from(*v)),
        Value::Single(v) => Number::Float(f64::from(*v)),
        Value::Double(v) => Number::Float(*v),
        Value::Decimal(d) => Number::Decimal(*d),
        _ => return None,
    };
    Some(n)
}

fn mismatch(op: BinaryOp, left: &Value, right: &Value) -> EvalError {
    EvalError::type_error(format!(
        "operator {:?} is not defined for {} and {}",
        op,
        left.type_name(),
        right.type_name()
    ))
}

macro_rules! int_arith {
    ($op:expr, $l:expr, $r:expr, $variant:ident) => {{
        let (l, r) = ($l, $r);
        let v = match $op {
            BinaryOp::Add => l.wrapping_add(r),
            BinaryOp::Subtract => l.wrapping_sub(r),
            BinaryOp::Multiply => l.wrapping_mul(r),
            BinaryOp::Divide | BinaryOp::Modulo if r == 0 => {
                return Err(EvalError::DivideByZero)
            }
            BinaryOp::Divide => l
                .checked_div(r)
                .ok_or_else(|| EvalError::overflow("integer division overflow"))?,
            BinaryOp::Modulo => l
                .checked_rem(r)
                .ok_or_else(|| EvalError::overflow("integer remainder overflow"))?,
            other => {
                return Err(EvalError::type_error(format!(
                    "{:?} is not an arithmetic operator",
                    other
                )))
            }
        };
        Value::$variant(v)
    }};
}

macro_rules! float_arith {
    ($op:expr, $l:expr, $r:expr, $variant:ident) => {{
        let (l, r) = ($l, $r);
        let v = match $op {
            BinaryOp::Add => l + r,
            BinaryOp::Subtract => l - r,
            BinaryOp::Multiply => l * r,
            BinaryOp::Divide => l / r,
            BinaryOp::Modulo => l % r,
            other => {
                return Err(EvalError::type_error(format!(
                    "{:?} is not an arithmetic operator",
                    other
                )))
            }
        };
        Value::$variant(v)
    }};
}

/// Applies an arithmetic operator. A null operand yields null.
pub fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let value = match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Value::Null,
        (Value::Int32(l), Value::Int32(r)) => int_arith!(op, *l, *r, Int32),
        (Value::UInt32(l), Value::UInt32(r)) => int_arith!(op, *l, *r, UInt32),
        (Value::Int64(l), Value::Int64(r)) => int_arith!(op, *l, *r, Int64),
        (Value::UInt64(l), Value::UInt64(r)) => int_arith!(op, *l, *r, UInt64),
        (Value::Single(l), Value::Single(r)) => float_arith!(op, *l, *r, Single),
        (Value::Double(l), Value::Double(r)) => float_arith!(op, *l, *r, Double),
        (Value::Decimal(l), Value::Decimal(r)) => Value::Decimal(decimal_arith(op, *l, *r)?),
        (Value::DateTime(l), Value::TimeSpan(r)) => {
            let v = match op {
                BinaryOp::Add => l.checked_add(*r),
                BinaryOp::Subtract => l.checked_sub(*r),
                _ => return Err(mismatch(op, left, right)),
            };
            Value::DateTime(v.ok_or_else(|| EvalError::overflow("DateTime out of range"))?)
        }
        (Value::DateTime(l), Value::DateTime(r)) if op == BinaryOp::Subtract => {
            Value::TimeSpan(*l - *r)
        }
        (Value::TimeSpan(l), Value::TimeSpan(r)) => {
            let v = match op {
                BinaryOp::Add => l.checked_add(*r),
                BinaryOp::Subtract => l.checked_sub(*r),
                _ => return Err(mismatch(op, left, right)),
            };
            Value::TimeSpan(v.ok_or_else(|| EvalError::overflow("TimeSpan out of range"))?)
        }
        _ => return Err(mismatch(op, left, right)),
    };
    Ok(value)
}

fn decimal_arith(op: BinaryOp, l: Decimal, r: Decimal) -> Result<Decimal, EvalError> {
    if matches!(op, BinaryOp::Divide | BinaryOp::Modulo) && r.is_zero() {
        return Err(EvalError::DivideByZero);
    }
    let v = match op {
        BinaryOp::Add => l.checked_add(r),
        BinaryOp::Subtract => l.checked_sub(r),
        BinaryOp::Multiply => l.checked_mul(r),
        BinaryOp::Divide => l.checked_div(r),
        BinaryOp::Modulo => l.checked_rem(r),
        other => {
            return Err(EvalError::type_error(format!(
                "{:?} is not an arithmetic operator",
                other
            )))
        }
    };
    v.ok_or_else(|| EvalError::overflow(format!("Decimal {:?} overflow", op)))
}

pub fn negate(value: &Value) -> Result<Value, EvalError> {
    let v = match value {
        Value::Null => Value::Null,
        Value::Int32(v) => Value::Int32(v.wrapping_neg()),
        Value::Int64(v) => Value::Int64(v.wrapping_neg()),
        Value::Single(v) => Value::Single(-v),
        Value::Double(v) => Value::Double(-v),
        Value::Decimal(d) => Value::Decimal(-*d),
        other => {
            return Err(EvalError::type_error(format!(
                "cannot negate {}",
                other.type_name()
            )))
        }
    };
    Ok(v)
}

/// The additive identity of a numeric type, looking through nullability.
pub fn zero(ty: &Type) -> Value {
    match ty.non_nullable() {
        Type::Int64 => Value::Int64(0),
        Type::Single => Value::Single(0.0),
        Type::Double => Value::Double(0.0),
        Type::Decimal => Value::Decimal(Decimal::ZERO),
        _ => Value::Int32(0),
    }
}

// ──────────────────────────────────────────────
// Conversions
// ──────────────────────────────────────────────

fn out_of_range(value: impl std::fmt::Display, target: &Type) -> EvalError {
    EvalError::overflow(format!("value {} is out of range for {}", value, target))
}

fn invalid_cast(value: &Value, target: &Type) -> EvalError {
    EvalError::InvalidCast {
        value: value.type_name().to_owned(),
        target: target.to_string(),
    }
}

fn from_int(v: i128, target: &Type, checked: bool) -> Result<Value, EvalError> {
    macro_rules! fit {
        ($t:ty, $variant:ident) => {{
            let n = if checked {
                <$t>::try_from(v).map_err(|_| out_of_range(v, target))?
            } else {
                v as $t
            };
            Value::$variant(n)
        }};
    }
    let value = match target {
        Type::SByte => fit!(i8, SByte),
        Type::Byte => fit!(u8, Byte),
        Type::Int16 => fit!(i16, Int16),
        Type::UInt16 => fit!(u16, UInt16),
        Type::Int32 => fit!(i32, Int32),
        Type::UInt32 => fit!(u32, UInt32),
        Type::Int64 => fit!(i64, Int64),
        Type::UInt64 => fit!(u64, UInt64),
        Type::Single => Value::Single(v as f32),
        Type::Double => Value::Double(v as f64),
        Type::Decimal => Value::Decimal(
            Decimal::from_i128(v).ok_or_else(|| out_of_range(v, target))?,
        ),
        Type::Char => Value::Char(
            u32::try_from(v)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| out_of_range(v, target))?,
        ),
        Type::Enum(e) => Value::Enum(
            e.clone(),
            i64::try_from(v).map_err(|_| out_of_range(v, target))?,
        ),
        _ => return Err(invalid_cast(&Value::Int64(v as i64), target)),
    };
    Ok(value)
}

fn from_float(v: f64, target: &Type, checked: bool) -> Result<Value, EvalError> {
    match target {
        Type::Single => Ok(Value::Single(v as f32)),
        Type::Double => Ok(Value::Double(v)),
        Type::Decimal => Decimal::from_f64(v)
            .map(Value::Decimal)
            .ok_or_else(|| out_of_range(v, target)),
        _ => {
            let t = v.trunc();
            if checked && (t.is_nan() || t < i128::MIN as f64 || t > i128::MAX as f64) {
                return Err(out_of_range(v, target));
            }
            // `as` saturates; NaN becomes zero.
            from_int(t as i128, target, checked)
        }
    }
}

fn from_decimal(d: Decimal, target: &Type) -> Result<Value, EvalError> {
    match target {
        Type::Single => Ok(Value::Single(d.to_f32().unwrap_or_default())),
        Type::Double => Ok(Value::Double(d.to_f64().unwrap_or_default())),
        Type::Decimal => Ok(Value::Decimal(d)),
        _ => {
            // Decimal to integral conversions always check the range.
            let i = d.trunc().to_i128().ok_or_else(|| out_of_range(d, target))?;
            from_int(i, target, true)
        }
    }
}

/// Converts `value`, statically typed `from`, to `to`.
pub fn convert(value: &Value, from: &Type, to: &Type, checked: bool) -> Result<Value, EvalError> {
    if value.is_null() {
        return if to.is_value_type() && !to.is_nullable() {
            Err(EvalError::NullableNoValue)
        } else {
            Ok(Value::Null)
        };
    }
    let target = to.non_nullable();
    if from.non_nullable() == target {
        return Ok(value.clone());
    }
    match target {
        Type::Object => return Ok(value.clone()),
        Type::String => {
            return match value {
                Value::String(_) => Ok(value.clone()),
                other => Err(invalid_cast(other, target)),
            }
        }
        Type::Class(class) => {
            return match value {
                Value::Object(o) if o.class().is_subclass_of(class) => Ok(value.clone()),
                other => Err(invalid_cast(other, target)),
            }
        }
        Type::List(_) | Type::Grouping { .. } => {
            return match value.items() {
                Some(_) => Ok(value.clone()),
                None => Err(invalid_cast(value, target)),
            }
        }
        _ => {}
    }
    match as_number(value) {
        Some(Number::Int(i)) => from_int(i, target, checked),
        Some(Number::Float(f)) => from_float(f, target, checked),
        Some(Number::Decimal(d)) => from_decimal(d, target),
        None => Err(invalid_cast(value, target)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_addition_wraps() {
        let v = arithmetic(BinaryOp::Add, &Value::Int32(i32::MAX), &Value::Int32(1)).unwrap();
        assert_eq!(v, Value::Int32(i32::MIN));
    }

    #[test]
    fn integer_division_by_zero() {
        let err = arithmetic(BinaryOp::Divide, &Value::Int32(1), &Value::Int32(0)).unwrap_err();
        assert_eq!(err, EvalError::DivideByZero);
        let err =
            arithmetic(BinaryOp::Modulo, &Value::Int64(1), &Value::Int64(0)).unwrap_err();
        assert_eq!(err, EvalError::DivideByZero);
    }

    #[test]
    fn min_divided_by_minus_one_overflows() {
        let err =
            arithmetic(BinaryOp::Divide, &Value::Int32(i32::MIN), &Value::Int32(-1)).unwrap_err();
        assert!(matches!(err, EvalError::Overflow { .. }));
    }

    #[test]
    fn float_division_by_zero_is_infinite() {
        let v = arithmetic(BinaryOp::Divide, &Value::Double(1.0), &Value::Double(0.0)).unwrap();
        assert_eq!(v, Value::Double(f64::INFINITY));
    }

    #[test]
    fn decimal_arithmetic_is_exact() {
        let a = Value::Decimal(Decimal::new(1, 1));
        let b = Value::Decimal(Decimal::new(2, 1));
        let v = arithmetic(BinaryOp::Add, &a, &b).unwrap();
        assert_eq!(v, Value::Decimal(Decimal::new(3, 1)));
    }

    #[test]
    fn null_operand_lifts_to_null() {
        let v = arithmetic(BinaryOp::Add, &Value::Null, &Value::Int32(1)).unwrap();
        assert_eq!(v, Value::Null);
    }

    #[test]
    fn checked_conversion_overflows() {
        let err = convert(&Value::Int32(300), &Type::Int32, &Type::Byte, true).unwrap_err();
        assert!(matches!(err, EvalError::Overflow { .. }));
        let v = convert(&Value::Int32(300), &Type::Int32, &Type::Byte, false).unwrap();
        assert_eq!(v, Value::Byte(44));
    }

    #[test]
    fn float_to_int_truncates() {
        let v = convert(&Value::Double(-2.7), &Type::Double, &Type::Int32, true).unwrap();
        assert_eq!(v, Value::Int32(-2));
    }

    #[test]
    fn null_to_value_type_fails() {
        let from = Type::nullable(Type::Int32);
        assert_eq!(
            convert(&Value::Null, &from, &Type::Int32, false),
            Err(EvalError::NullableNoValue)
        );
        assert_eq!(
            convert(&Value::Null, &from, &Type::nullable(Type::Int64), false),
            Ok(Value::Null)
        );
    }

    #[test]
    fn widening_into_nullable() {
        let v = convert(
            &Value::Int32(7),
            &Type::Int32,
            &Type::nullable(Type::Int64),
            false,
        )
        .unwrap();
        assert_eq!(v, Value::Int64(7));
    }
}
