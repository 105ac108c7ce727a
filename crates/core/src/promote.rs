//! Implicit conversions between types, and literal reinterpretation.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::expr::{Expr, ExprKind};
use crate::types::Type;
use crate::value::Value;

/// Whether a value of `source` may be used where `target` is expected
/// without an explicit conversion.
pub fn is_compatible_with(source: &Type, target: &Type) -> bool {
    if source == target {
        return true;
    }
    if !target.is_value_type() {
        return target.is_assignable_from(source);
    }
    // Nullable never narrows to its underlying type.
    if source.is_nullable() && !target.is_nullable() {
        return false;
    }
    use Type::*;
    let (s, t) = (source.non_nullable(), target.non_nullable());
    match s {
        SByte => matches!(t, SByte | Int16 | Int32 | Int64 | Single | Double | Decimal),
        Byte => matches!(
            t,
            Byte | Int16 | UInt16 | Int32 | UInt32 | Int64 | UInt64 | Single | Double | Decimal
        ),
        Int16 => matches!(t, Int16 | Int32 | Int64 | Single | Double | Decimal),
        UInt16 => matches!(
            t,
            UInt16 | Int32 | UInt32 | Int64 | UInt64 | Single | Double | Decimal
        ),
        Int32 => matches!(t, Int32 | Int64 | Single | Double | Decimal),
        UInt32 => matches!(t, UInt32 | Int64 | UInt64 | Single | Double | Decimal),
        Int64 => matches!(t, Int64 | Single | Double | Decimal),
        UInt64 => matches!(t, UInt64 | Single | Double | Decimal),
        Single => matches!(t, Single | Double),
        _ => s == t,
    }
}

/// Re-reads numeric literal text as a value of `target`.
pub fn parse_number(text: &str, target: &Type) -> Option<Value> {
    let value = match target {
        Type::SByte => Value::SByte(text.parse().ok()?),
        Type::Byte => Value::Byte(text.parse().ok()?),
        Type::Int16 => Value::Int16(text.parse().ok()?),
        Type::UInt16 => Value::UInt16(text.parse().ok()?),
        Type::Int32 => Value::Int32(text.parse().ok()?),
        Type::UInt32 => Value::UInt32(text.parse().ok()?),
        Type::Int64 => Value::Int64(text.parse().ok()?),
        Type::UInt64 => Value::UInt64(text.parse().ok()?),
        Type::Single => Value::Single(text.parse().ok()?),
        Type::Double => Value::Double(text.parse().ok()?),
        Type::Decimal => Value::Decimal(parse_decimal(text)?),
        _ => return None,
    };
    Some(value)
}

pub fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// Re-reads string literal text as a member of an enum `target`.
/// Only member names match, case-insensitively.
pub fn parse_enum(text: &str, target: &Type) -> Option<Value> {
    let Type::Enum(e) = target else {
        return None;
    };
    e.value_of(text.trim()).map(|v| Value::Enum(e.clone(), v))
}

/// Re-reads a literal against `target`, looking through nullability.
///
/// Integer literals become any numeric type that can hold them, real
/// literals may become `Decimal`, and string literals may name an enum
/// member.
pub fn reinterpret_literal(expr: &Expr, target: &Type) -> Option<Value> {
    let ExprKind::Literal { value, text } = &expr.kind else {
        return None;
    };
    if value.is_null() {
        return None;
    }
    let t = target.non_nullable();
    match &expr.ty {
        Type::Int32 | Type::UInt32 | Type::Int64 | Type::UInt64 => parse_number(text, t),
        Type::Double if *t == Type::Decimal => parse_number(text, t),
        Type::String => parse_enum(text, t),
        _ => None,
    }
}

/// Converts `expr` to `target` if an implicit conversion exists.
///
/// With `exact`, reference conversions are made explicit so the result is
/// typed exactly `target`; otherwise a reference-compatible expression is
/// returned unchanged.
pub fn promote(expr: &Expr, target: &Type, exact: bool) -> Option<Expr> {
    if expr.ty == *target {
        return Some(expr.clone());
    }
    if expr.is_null_literal() {
        if !target.is_value_type() || target.is_nullable() {
            return Some(Expr::constant(Value::Null, target.clone()));
        }
    } else if let Some(value) = reinterpret_literal(expr, target) {
        return Some(Expr::constant(value, target.clone()));
    }
    if is_compatible_with(&expr.ty, target) {
        if target.is_value_type() || exact {
            return Some(Expr::convert(expr.clone(), target.clone(), false));
        }
        return Some(expr.clone());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassType, EnumType};

    #[test]
    fn widening_lattice() {
        assert!(is_compatible_with(&Type::Byte, &Type::UInt64));
        assert!(is_compatible_with(&Type::Int32, &Type::Double));
        assert!(is_compatible_with(&Type::Single, &Type::Double));
        assert!(!is_compatible_with(&Type::Single, &Type::Decimal));
        assert!(!is_compatible_with(&Type::Int32, &Type::UInt32));
        assert!(!is_compatible_with(&Type::Int64, &Type::Int32));
        assert!(!is_compatible_with(&Type::SByte, &Type::Byte));
    }

    #[test]
    fn nullable_widening_is_one_way() {
        let ni = Type::nullable(Type::Int32);
        assert!(is_compatible_with(&Type::Int32, &ni));
        assert!(is_compatible_with(&Type::Byte, &Type::nullable(Type::Int64)));
        assert!(!is_compatible_with(&ni, &Type::Int32));
    }

    #[test]
    fn reference_compatibility() {
        let base = ClassType::builder("Base").build();
        let derived = ClassType::builder("Derived").extends(&base).build();
        assert!(is_compatible_with(&Type::Class(derived.clone()), &Type::Class(base.clone())));
        assert!(!is_compatible_with(&Type::Class(base), &Type::Class(derived)));
        assert!(is_compatible_with(&Type::String, &Type::Object));
        assert!(is_compatible_with(&Type::Int32, &Type::Object));
    }

    #[test]
    fn integer_literal_reparses_against_byte() {
        let lit = Expr::literal(Value::Int32(200), "200", Type::Int32);
        let promoted = promote(&lit, &Type::Byte, true).unwrap();
        assert!(matches!(promoted.kind, ExprKind::Constant(Value::Byte(200))));
        let lit = Expr::literal(Value::Int32(300), "300", Type::Int32);
        assert!(promote(&lit, &Type::Byte, true).is_none());
    }

    #[test]
    fn real_literal_only_reparses_as_decimal() {
        let lit = Expr::literal(Value::Double(1.25), "1.25", Type::Double);
        let d = promote(&lit, &Type::Decimal, true).unwrap();
        assert!(matches!(d.kind, ExprKind::Constant(Value::Decimal(_))));
        assert!(promote(&lit, &Type::Single, true).is_none());
    }

    #[test]
    fn string_literal_names_enum_member() {
        let color = EnumType::with_names("Color", ["Red", "Green"]);
        let ty = Type::Enum(color);
        let lit = Expr::literal(Value::from("green"), "green", Type::String);
        let v = promote(&lit, &ty, true).unwrap();
        assert!(matches!(v.kind, ExprKind::Constant(Value::Enum(_, 1))));
        let nullable = Type::nullable(ty.clone());
        assert!(promote(&lit, &nullable, true).is_some());

        let numeric = Expr::literal(Value::from("1"), "1", Type::String);
        assert!(promote(&numeric, &ty, true).is_none());
        assert!(parse_enum("Purple", &ty).is_none());
    }

    #[test]
    fn null_literal_targets_references_and_nullables() {
        let null = Expr::null_literal();
        assert!(promote(&null, &Type::String, true).is_some());
        assert!(promote(&null, &Type::nullable(Type::Int32), true).is_some());
        assert!(promote(&null, &Type::Int32, true).is_none());
    }

    #[test]
    fn non_exact_reference_promotion_keeps_expression() {
        let e = Expr::parameter(0, Type::String);
        let p = promote(&e, &Type::Object, false).unwrap();
        assert_eq!(p.ty, Type::String);
        let p = promote(&e, &Type::Object, true).unwrap();
        assert_eq!(p.ty, Type::Object);
    }

    #[test]
    fn decimal_literal_with_exponent() {
        assert_eq!(parse_decimal("1e3"), Decimal::from_str("1000").ok());
    }
}
