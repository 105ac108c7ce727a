//! Members of the predefined types.
//!
//! Predefined types expose a fixed set of properties, methods and
//! constructors. Each is identified by a [`Builtin`] id; the evaluator
//! supplies the behaviour.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use rust_decimal::Decimal;

use crate::types::{Callable, ClassType, Getter, Members, Method, Property, Type};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    ToString,
    // String
    StringLength,
    StringChars,
    StringContains,
    StringStartsWith,
    StringEndsWith,
    StringIndexOf,
    StringToUpper,
    StringToLower,
    StringTrim,
    StringSubstring,
    StringReplace,
    StringConcat,
    StringCompare,
    StringIsNullOrEmpty,
    // DateTime
    DateTimeNew,
    DateTimeYear,
    DateTimeMonth,
    DateTimeDay,
    DateTimeHour,
    DateTimeMinute,
    DateTimeSecond,
    DateTimeDate,
    // TimeSpan
    TimeSpanNew,
    TimeSpanDays,
    TimeSpanHours,
    TimeSpanMinutes,
    TimeSpanSeconds,
    TimeSpanTotalDays,
    TimeSpanTotalHours,
    TimeSpanTotalMinutes,
    TimeSpanTotalSeconds,
    // Generic wrappers
    NullableHasValue,
    NullableValue,
    ListCount,
    GroupingKey,
    // Math
    MathAbs,
    MathMin,
    MathMax,
    MathRound,
    MathFloor,
    MathCeiling,
    MathPow,
    MathSqrt,
    /// `Convert.ToXxx`; the target is the method's return type.
    ConvertTo,
    DecimalNew,
    /// Field-wise construction of a class instance.
    ObjectNew,
}

fn property(name: &str, ty: Type, builtin: Builtin) -> Arc<Property> {
    Arc::new(Property {
        name: name.to_owned(),
        ty,
        is_static: false,
        getter: Getter::Builtin(builtin),
    })
}

fn constant(name: &str, ty: Type, value: Value) -> Arc<Property> {
    Arc::new(Property {
        name: name.to_owned(),
        ty,
        is_static: true,
        getter: Getter::Constant(value),
    })
}

fn method(name: &str, params: Vec<Type>, ret: Type, builtin: Builtin) -> Arc<Method> {
    Arc::new(Method {
        name: name.to_owned(),
        params,
        ret,
        is_static: false,
        body: Callable::Builtin(builtin),
    })
}

fn static_method(name: &str, params: Vec<Type>, ret: Type, builtin: Builtin) -> Method {
    Method {
        name: name.to_owned(),
        params,
        ret,
        is_static: true,
        body: Callable::Builtin(builtin),
    }
}

fn constructor(params: Vec<Type>, builtin: Builtin) -> Arc<Method> {
    Arc::new(Method {
        name: ".ctor".to_owned(),
        params,
        ret: Type::Object,
        is_static: true,
        body: Callable::Builtin(builtin),
    })
}

static OBJECT_MEMBERS: Lazy<Arc<Members>> = Lazy::new(|| {
    Arc::new(Members {
        methods: vec![method("ToString", vec![], Type::String, Builtin::ToString)],
        ..Members::default()
    })
});

fn string_members() -> Members {
    use Builtin::*;
    let s = || Type::String;
    Members {
        properties: vec![property("Length", Type::Int32, StringLength)],
        methods: vec![
            method("Contains", vec![s()], Type::Boolean, StringContains),
            method("StartsWith", vec![s()], Type::Boolean, StringStartsWith),
            method("EndsWith", vec![s()], Type::Boolean, StringEndsWith),
            method("IndexOf", vec![s()], Type::Int32, StringIndexOf),
            method("ToUpper", vec![], s(), StringToUpper),
            method("ToLower", vec![], s(), StringToLower),
            method("Trim", vec![], s(), StringTrim),
            method("Substring", vec![Type::Int32], s(), StringSubstring),
            method("Substring", vec![Type::Int32, Type::Int32], s(), StringSubstring),
            method("Replace", vec![s(), s()], s(), StringReplace),
            Arc::new(static_method(
                "Concat",
                vec![Type::Object, Type::Object],
                s(),
                StringConcat,
            )),
            Arc::new(static_method("Compare", vec![s(), s()], Type::Int32, StringCompare)),
            Arc::new(static_method(
                "IsNullOrEmpty",
                vec![s()],
                Type::Boolean,
                StringIsNullOrEmpty,
            )),
        ],
        constructors: vec![],
        indexers: vec![method("Chars", vec![Type::Int32], Type::Char, StringChars)],
    }
}

fn date_time_members() -> Members {
    use Builtin::*;
    let i = || Type::Int32;
    Members {
        properties: vec![
            property("Year", i(), DateTimeYear),
            property("Month", i(), DateTimeMonth),
            property("Day", i(), DateTimeDay),
            property("Hour", i(), DateTimeHour),
            property("Minute", i(), DateTimeMinute),
            property("Second", i(), DateTimeSecond),
            property("Date", Type::DateTime, DateTimeDate),
        ],
        constructors: vec![
            constructor(vec![i(), i(), i()], DateTimeNew),
            constructor(vec![i(), i(), i(), i(), i(), i()], DateTimeNew),
        ],
        ..Members::default()
    }
}

fn time_span_members() -> Members {
    use Builtin::*;
    let i = || Type::Int32;
    let d = || Type::Double;
    Members {
        properties: vec![
            property("Days", i(), TimeSpanDays),
            property("Hours", i(), TimeSpanHours),
            property("Minutes", i(), TimeSpanMinutes),
            property("Seconds", i(), TimeSpanSeconds),
            property("TotalDays", d(), TimeSpanTotalDays),
            property("TotalHours", d(), TimeSpanTotalHours),
            property("TotalMinutes", d(), TimeSpanTotalMinutes),
            property("TotalSeconds", d(), TimeSpanTotalSeconds),
        ],
        constructors: vec![constructor(vec![i(), i(), i()], TimeSpanNew)],
        ..Members::default()
    }
}

fn numeric_members(ty: Type, min: Value, max: Value) -> Members {
    let mut members = Members {
        properties: vec![
            constant("MinValue", ty.clone(), min),
            constant("MaxValue", ty.clone(), max),
        ],
        ..Members::default()
    };
    if ty == Type::Decimal {
        members.constructors = [
            Type::Int32,
            Type::UInt32,
            Type::Int64,
            Type::UInt64,
            Type::Single,
            Type::Double,
        ]
        .into_iter()
        .map(|p| constructor(vec![p], Builtin::DecimalNew))
        .collect();
    }
    members
}

static PREDEFINED: Lazy<HashMap<Type, Arc<Members>>> = Lazy::new(|| {
    let numerics = [
        (Type::SByte, Value::SByte(i8::MIN), Value::SByte(i8::MAX)),
        (Type::Byte, Value::Byte(u8::MIN), Value::Byte(u8::MAX)),
        (Type::Int16, Value::Int16(i16::MIN), Value::Int16(i16::MAX)),
        (Type::UInt16, Value::UInt16(u16::MIN), Value::UInt16(u16::MAX)),
        (Type::Int32, Value::Int32(i32::MIN), Value::Int32(i32::MAX)),
        (Type::UInt32, Value::UInt32(u32::MIN), Value::UInt32(u32::MAX)),
        (Type::Int64, Value::Int64(i64::MIN), Value::Int64(i64::MAX)),
        (Type::UInt64, Value::UInt64(u64::MIN), Value::UInt64(u64::MAX)),
        (Type::Single, Value::Single(f32::MIN), Value::Single(f32::MAX)),
        (Type::Double, Value::Double(f64::MIN), Value::Double(f64::MAX)),
        (Type::Decimal, Value::Decimal(Decimal::MIN), Value::Decimal(Decimal::MAX)),
    ];
    let mut map: HashMap<Type, Arc<Members>> = numerics
        .into_iter()
        .map(|(ty, min, max)| (ty.clone(), Arc::new(numeric_members(ty, min, max))))
        .collect();
    map.insert(Type::String, Arc::new(string_members()));
    map.insert(Type::DateTime, Arc::new(date_time_members()));
    map.insert(Type::TimeSpan, Arc::new(time_span_members()));
    map
});

/// Static `Math` class.
pub static MATH: Lazy<Arc<ClassType>> = Lazy::new(|| {
    use Builtin::*;
    let d = || Type::Double;
    let mut builder = ClassType::static_builder("Math")
        .constant("PI", d(), Value::Double(std::f64::consts::PI))
        .constant("E", d(), Value::Double(std::f64::consts::E));
    for ty in [Type::Int32, Type::Int64, Type::Single, Type::Double, Type::Decimal] {
        builder = builder.builtin_method(static_method("Abs", vec![ty.clone()], ty, MathAbs));
    }
    for ty in [
        Type::Int32,
        Type::UInt32,
        Type::Int64,
        Type::UInt64,
        Type::Single,
        Type::Double,
        Type::Decimal,
    ] {
        builder = builder
            .builtin_method(static_method("Min", vec![ty.clone(), ty.clone()], ty.clone(), MathMin))
            .builtin_method(static_method("Max", vec![ty.clone(), ty.clone()], ty, MathMax));
    }
    for ty in [Type::Double, Type::Decimal] {
        builder = builder
            .builtin_method(static_method("Round", vec![ty.clone()], ty.clone(), MathRound))
            .builtin_method(static_method(
                "Round",
                vec![ty.clone(), Type::Int32],
                ty.clone(),
                MathRound,
            ))
            .builtin_method(static_method("Floor", vec![ty.clone()], ty.clone(), MathFloor))
            .builtin_method(static_method("Ceiling", vec![ty.clone()], ty, MathCeiling));
    }
    builder
        .builtin_method(static_method("Pow", vec![d(), d()], d(), MathPow))
        .builtin_method(static_method("Sqrt", vec![d()], d(), MathSqrt))
        .build()
});

/// Static `Convert` class.
pub static CONVERT: Lazy<Arc<ClassType>> = Lazy::new(|| {
    let sources = [
        Type::Boolean,
        Type::Char,
        Type::SByte,
        Type::Byte,
        Type::Int16,
        Type::UInt16,
        Type::Int32,
        Type::UInt32,
        Type::Int64,
        Type::UInt64,
        Type::Single,
        Type::Double,
        Type::Decimal,
        Type::String,
    ];
    let targets = [
        ("ToInt32", Type::Int32),
        ("ToInt64", Type::Int64),
        ("ToDouble", Type::Double),
        ("ToDecimal", Type::Decimal),
    ];
    let mut builder = ClassType::static_builder("Convert");
    for (name, target) in targets {
        for source in &sources {
            builder = builder.builtin_method(static_method(
                name,
                vec![source.clone()],
                target.clone(),
                Builtin::ConvertTo,
            ));
        }
    }
    builder
        .builtin_method(static_method(
            "ToString",
            vec![Type::Object],
            Type::String,
            Builtin::ConvertTo,
        ))
        .build()
});

/// Resolves a predefined type name, ignoring case.
pub fn predefined_type(name: &str) -> Option<Type> {
    let ty = match name.to_ascii_lowercase().as_str() {
        "object" => Type::Object,
        "boolean" => Type::Boolean,
        "char" => Type::Char,
        "string" => Type::String,
        "sbyte" => Type::SByte,
        "byte" => Type::Byte,
        "int16" => Type::Int16,
        "uint16" => Type::UInt16,
        "int32" => Type::Int32,
        "uint32" => Type::UInt32,
        "int64" => Type::Int64,
        "uint64" => Type::UInt64,
        "single" => Type::Single,
        "double" => Type::Double,
        "decimal" => Type::Decimal,
        "datetime" => Type::DateTime,
        "timespan" => Type::TimeSpan,
        "math" => Type::Class(MATH.clone()),
        "convert" => Type::Class(CONVERT.clone()),
        _ => return None,
    };
    Some(ty)
}

fn wrapper_members(ty: &Type) -> Option<Members> {
    let members = match ty {
        Type::Nullable(inner) => Members {
            properties: vec![
                property("HasValue", Type::Boolean, Builtin::NullableHasValue),
                property("Value", (**inner).clone(), Builtin::NullableValue),
            ],
            ..Members::default()
        },
        Type::List(_) => Members {
            properties: vec![property("Count", Type::Int32, Builtin::ListCount)],
            ..Members::default()
        },
        Type::Grouping { key, .. } => Members {
            properties: vec![property("Key", (**key).clone(), Builtin::GroupingKey)],
            ..Members::default()
        },
        Type::Enum(e) => Members {
            properties: e
                .members()
                .iter()
                .map(|(name, v)| constant(name, ty.clone(), Value::Enum(e.clone(), *v)))
                .collect(),
            ..Members::default()
        },
        _ => return None,
    };
    Some(members)
}

/// Member tables to search for `ty`, most derived first, ending with the
/// members every type shares.
pub fn member_chain(ty: &Type) -> Vec<Arc<Members>> {
    let mut chain = Vec::new();
    match ty {
        Type::Class(class) => {
            let mut current = Some(class);
            while let Some(c) = current {
                chain.push(c.members().clone());
                current = c.base();
            }
        }
        other => {
            if let Some(members) = PREDEFINED.get(other) {
                chain.push(members.clone());
            } else if let Some(members) = wrapper_members(other) {
                chain.push(Arc::new(members));
            }
        }
    }
    chain.push(OBJECT_MEMBERS.clone());
    chain
}

/// First property or field named `name` along the member chain.
pub fn find_property(ty: &Type, name: &str, is_static: bool) -> Option<Arc<Property>> {
    member_chain(ty)
        .iter()
        .find_map(|m| m.property(name, is_static).cloned())
}

/// First static method named `name` declared for `ty`.
pub fn find_static_method(ty: &Type, name: &str) -> Option<Arc<Method>> {
    member_chain(ty)
        .iter()
        .find_map(|m| m.methods_named(name, true).next().cloned())
}

/// Constructors declared by `ty` itself.
pub fn constructors(ty: &Type) -> Vec<Arc<Method>> {
    member_chain(ty)
        .first()
        .map(|m| m.constructors.clone())
        .unwrap_or_default()
}

/// True when `ty` itself declares a method named `name`.
///
/// Members shared by every type are not counted, so aggregate sugar still
/// applies to `Count()` on a plain list.
pub fn declares_method(ty: &Type, name: &str) -> bool {
    let chain = member_chain(ty);
    let declared = &chain[..chain.len().saturating_sub(1)];
    declared
        .iter()
        .any(|m| m.methods.iter().any(|x| x.name.eq_ignore_ascii_case(name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_members_are_case_insensitive() {
        let p = find_property(&Type::String, "length", false).unwrap();
        assert_eq!(p.ty, Type::Int32);
        assert!(find_property(&Type::String, "Nope", false).is_none());
    }

    #[test]
    fn nullable_exposes_value_of_inner_type() {
        let ty = Type::nullable(Type::Int32);
        let value = find_property(&ty, "Value", false).unwrap();
        assert_eq!(value.ty, Type::Int32);
        assert!(find_property(&ty, "HasValue", false).is_some());
    }

    #[test]
    fn enum_members_are_static_constants() {
        let e = crate::types::EnumType::with_names("Color", ["Red", "Green"]);
        let ty = Type::Enum(e.clone());
        let green = find_property(&ty, "GREEN", true).unwrap();
        match &green.getter {
            Getter::Constant(Value::Enum(_, v)) => assert_eq!(*v, 1),
            other => panic!("unexpected getter {:?}", other),
        }
    }

    #[test]
    fn every_chain_ends_with_to_string() {
        for ty in [Type::Int32, Type::String, Type::list(Type::Int32)] {
            let chain = member_chain(&ty);
            assert!(chain
                .last()
                .unwrap()
                .methods
                .iter()
                .any(|m| m.name == "ToString"));
        }
    }

    #[test]
    fn predefined_names() {
        assert_eq!(predefined_type("int32"), Some(Type::Int32));
        assert!(matches!(predefined_type("Math"), Some(Type::Class(_))));
        assert_eq!(predefined_type("Widget"), None);
    }

    #[test]
    fn declared_methods_exclude_shared_members() {
        assert!(declares_method(&Type::String, "contains"));
        assert!(!declares_method(&Type::list(Type::Int32), "ToString"));
        assert!(!declares_method(&Type::list(Type::Int32), "Count"));
    }
}
