//! Row schemas for the `dynq` binary.
//!
//! A schema is a TOML document naming the element type of the rows and
//! declaring the enums and classes it uses:
//!
//! ```toml
//! element = "Order"
//!
//! [[enums]]
//! name = "Status"
//! members = ["Open", "Shipped"]
//!
//! [[classes]]
//! name = "Order"
//! fields = [
//!     { name = "Id", type = "Int32" },
//!     { name = "Status", type = "Status" },
//!     { name = "Tags", type = "List<String>" },
//!     { name = "Discount", type = "Decimal?" },
//! ]
//! ```
//!
//! Classes may refer to enums and to classes declared before them. Rows are
//! read from JSON; `DateTime` values are ISO-8601 strings and `TimeSpan`
//! values are seconds.

use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use dynq_core::builtins::predefined_type;
use dynq_core::{ClassKind, ClassType, CompileContext, EnumType, Type, Value};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Map, Number};
use time::macros::format_description;
use time::{Duration, PrimitiveDateTime};

#[derive(Debug, thiserror::Error)]
pub(crate) enum SchemaError {
    #[error("error reading '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid schema: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid JSON in '{path}': {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("unknown type '{0}'")]
    UnknownType(String),
    #[error("type '{0}' is declared more than once")]
    DuplicateType(String),
    #[error("{path}: expected {expected}, found {found}")]
    InvalidValue {
        path: String,
        expected: String,
        found: String,
    },
}

#[derive(Debug, Deserialize)]
struct SchemaFile {
    element: String,
    #[serde(default)]
    enums: Vec<EnumDecl>,
    #[serde(default)]
    classes: Vec<ClassDecl>,
}

#[derive(Debug, Deserialize)]
struct EnumDecl {
    name: String,
    members: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClassDecl {
    name: String,
    #[serde(default)]
    fields: Vec<FieldDecl>,
}

#[derive(Debug, Deserialize)]
struct FieldDecl {
    name: String,
    #[serde(rename = "type")]
    ty: String,
}

/// A loaded schema: the element type plus every declared type.
#[derive(Debug)]
pub(crate) struct Schema {
    pub element: Type,
    pub types: Vec<Type>,
}

impl Schema {
    pub fn load(path: &Path) -> Result<Schema, SchemaError> {
        let text = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Schema::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Schema, SchemaError> {
        let file: SchemaFile = toml::from_str(text)?;
        let mut declared: HashSet<String> = HashSet::new();
        let mut types = Vec::new();
        let mut declare = |name: &str, ty: Type, types: &mut Vec<Type>| {
            let key = name.to_ascii_lowercase();
            if predefined_type(name).is_some() || !declared.insert(key) {
                return Err(SchemaError::DuplicateType(name.to_owned()));
            }
            types.push(ty);
            Ok(())
        };

        for decl in &file.enums {
            let ty = Type::Enum(EnumType::with_names(&decl.name, &decl.members));
            declare(&decl.name, ty, &mut types)?;
        }
        for decl in &file.classes {
            let mut builder = ClassType::builder(&decl.name);
            for field in &decl.fields {
                let ty = resolve_type(&field.ty, &|n| lookup(&types, n))?;
                builder = builder.field(&field.name, ty);
            }
            let ty = Type::Class(builder.field_constructor().build());
            declare(&decl.name, ty, &mut types)?;
        }

        let element = resolve_type(&file.element, &|n| lookup(&types, n))?;
        Ok(Schema { element, types })
    }

    pub fn context(&self) -> CompileContext {
        CompileContext::with_types(self.types.iter().cloned())
    }
}

fn lookup(types: &[Type], name: &str) -> Option<Type> {
    types
        .iter()
        .find(|t| match t {
            Type::Enum(e) => e.name().eq_ignore_ascii_case(name),
            Type::Class(c) => c.name().eq_ignore_ascii_case(name),
            _ => false,
        })
        .cloned()
}

/// Parses `T`, `T?` and `List<T>` type names.
fn resolve_type(text: &str, custom: &dyn Fn(&str) -> Option<Type>) -> Result<Type, SchemaError> {
    let text = text.trim();
    if let Some(inner) = text.strip_suffix('?') {
        let inner = resolve_type(inner, custom)?;
        if !inner.is_value_type() || inner.is_nullable() {
            return Err(SchemaError::UnknownType(text.to_owned()));
        }
        return Ok(Type::nullable(inner));
    }
    if let Some(element) = text
        .strip_prefix("List<")
        .and_then(|rest| rest.strip_suffix('>'))
    {
        return Ok(Type::list(resolve_type(element, custom)?));
    }
    match predefined_type(text) {
        Some(Type::Class(c)) if c.kind() == ClassKind::Static => {
            Err(SchemaError::UnknownType(text.to_owned()))
        }
        Some(ty) => Ok(ty),
        None => custom(text).ok_or_else(|| SchemaError::UnknownType(text.to_owned())),
    }
}

// ── JSON to values ───────────────────────────────────────────────────

pub(crate) fn read_rows(path: &Path, element: &Type) -> Result<Vec<Value>, SchemaError> {
    let text = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let json: serde_json::Value =
        serde_json::from_str(&text).map_err(|source| SchemaError::Json {
            path: path.display().to_string(),
            source,
        })?;
    let rows = match &json {
        serde_json::Value::Array(rows) => rows,
        other => return Err(invalid("$", "an array of rows", other)),
    };
    rows.iter()
        .enumerate()
        .map(|(i, row)| to_value(row, element, &format!("$[{}]", i)))
        .collect()
}

fn invalid(path: &str, expected: &str, found: &serde_json::Value) -> SchemaError {
    let found = match found {
        serde_json::Value::Null => "null".to_owned(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => format!("\"{}\"", s),
        serde_json::Value::Array(_) => "an array".to_owned(),
        serde_json::Value::Object(_) => "an object".to_owned(),
    };
    SchemaError::InvalidValue {
        path: path.to_owned(),
        expected: expected.to_owned(),
        found,
    }
}

fn parse_date_time(text: &str) -> Option<PrimitiveDateTime> {
    let full = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    let spaced = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let date = format_description!("[year]-[month]-[day]");
    PrimitiveDateTime::parse(text, full)
        .or_else(|_| PrimitiveDateTime::parse(text, spaced))
        .ok()
        .or_else(|| time::Date::parse(text, date).ok().map(|d| d.midnight()))
}

/// Converts a JSON value to a runtime value of type `ty`.
pub(crate) fn to_value(
    json: &serde_json::Value,
    ty: &Type,
    path: &str,
) -> Result<Value, SchemaError> {
    use serde_json::Value as J;

    if json.is_null() {
        return if ty.is_value_type() && !ty.is_nullable() {
            Err(invalid(path, &ty.to_string(), json))
        } else {
            Ok(Value::Null)
        };
    }
    let fail = || invalid(path, &ty.to_string(), json);
    macro_rules! int {
        ($variant:ident) => {
            json.as_i64()
                .map(i128::from)
                .or_else(|| json.as_u64().map(i128::from))
                .and_then(|v| v.try_into().ok())
                .map(Value::$variant)
                .ok_or_else(fail)
        };
    }

    match ty {
        Type::Nullable(inner) => to_value(json, inner, path),
        Type::Object => Ok(infer_value(json)),
        Type::Boolean => json.as_bool().map(Value::Boolean).ok_or_else(fail),
        Type::String => json
            .as_str()
            .map(|s| Value::String(s.to_owned()))
            .ok_or_else(fail),
        Type::Char => {
            let s = json.as_str().ok_or_else(fail)?;
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c)),
                _ => Err(fail()),
            }
        }
        Type::SByte => int!(SByte),
        Type::Byte => int!(Byte),
        Type::Int16 => int!(Int16),
        Type::UInt16 => int!(UInt16),
        Type::Int32 => int!(Int32),
        Type::UInt32 => int!(UInt32),
        Type::Int64 => int!(Int64),
        Type::UInt64 => int!(UInt64),
        Type::Single => json
            .as_f64()
            .map(|v| Value::Single(v as f32))
            .ok_or_else(fail),
        Type::Double => json.as_f64().map(Value::Double).ok_or_else(fail),
        Type::Decimal => {
            let text = match json {
                J::String(s) => s.clone(),
                J::Number(n) => n.to_string(),
                _ => return Err(fail()),
            };
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map(Value::Decimal)
                .map_err(|_| fail())
        }
        Type::DateTime => json
            .as_str()
            .and_then(parse_date_time)
            .map(Value::DateTime)
            .ok_or_else(fail),
        Type::TimeSpan => json
            .as_f64()
            .and_then(Duration::checked_seconds_f64)
            .map(Value::TimeSpan)
            .ok_or_else(fail),
        Type::Enum(e) => match json {
            J::String(s) => e.value(s).ok_or_else(fail),
            J::Number(n) => n
                .as_i64()
                .map(|v| Value::Enum(e.clone(), v))
                .ok_or_else(fail),
            _ => Err(fail()),
        },
        Type::List(element) => {
            let items = json.as_array().ok_or_else(fail)?;
            let values = items
                .iter()
                .enumerate()
                .map(|(i, item)| to_value(item, element, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::list(values))
        }
        Type::Class(class) => {
            let object = json.as_object().ok_or_else(fail)?;
            let fields = class
                .fields()
                .iter()
                .map(|f| {
                    let field_path = format!("{}.{}", path, f.name);
                    match object.get(&f.name) {
                        Some(v) => to_value(v, &f.ty, &field_path),
                        None => to_value(&J::Null, &f.ty, &field_path),
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(class.instantiate(fields))
        }
        Type::Grouping { .. } => Err(fail()),
    }
}

/// Types a JSON value by its own shape. Used for `--arg` values and
/// `Object` fields.
pub(crate) fn infer_value(json: &serde_json::Value) -> Value {
    use serde_json::Value as J;
    match json {
        J::Null => Value::Null,
        J::Bool(b) => Value::Boolean(*b),
        J::Number(n) => match n.as_i64() {
            Some(i) => i32::try_from(i).map_or(Value::Int64(i), Value::Int32),
            None => n
                .as_u64()
                .map(Value::UInt64)
                .or_else(|| n.as_f64().map(Value::Double))
                .unwrap_or(Value::Null),
        },
        J::String(s) => Value::String(s.clone()),
        J::Array(items) => Value::list(items.iter().map(infer_value).collect()),
        J::Object(_) => Value::String(json.to_string()),
    }
}

// ── values to JSON ───────────────────────────────────────────────────

pub(crate) fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => json!(b),
        Value::Char(c) => json!(c.to_string()),
        Value::String(s) => json!(s),
        Value::SByte(v) => json!(v),
        Value::Byte(v) => json!(v),
        Value::Int16(v) => json!(v),
        Value::UInt16(v) => json!(v),
        Value::Int32(v) => json!(v),
        Value::UInt32(v) => json!(v),
        Value::Int64(v) => json!(v),
        Value::UInt64(v) => json!(v),
        Value::Single(v) => float(f64::from(*v)),
        Value::Double(v) => float(*v),
        Value::Decimal(d) => json!(d.to_string()),
        Value::DateTime(dt) => {
            let format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
            dt.format(format)
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null)
        }
        Value::TimeSpan(d) => float(d.as_seconds_f64()),
        Value::Enum(..) => json!(value.to_string()),
        Value::Object(o) => {
            let map: Map<String, serde_json::Value> = o
                .class()
                .fields()
                .iter()
                .zip(o.fields())
                .map(|(f, v)| (f.name.clone(), to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
        Value::List(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::Group(g) => json!({
            "key": to_json(&g.key),
            "items": g.items.iter().map(to_json).collect::<Vec<_>>(),
        }),
    }
}

fn float(v: f64) -> serde_json::Value {
    Number::from_f64(v)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDERS: &str = r#"
element = "Order"

[[enums]]
name = "Status"
members = ["Open", "Shipped"]

[[classes]]
name = "Line"
fields = [{ name = "Qty", type = "Int32" }]

[[classes]]
name = "Order"
fields = [
    { name = "Id", type = "Int32" },
    { name = "Status", type = "Status" },
    { name = "Lines", type = "List<Line>" },
    { name = "Discount", type = "Decimal?" },
    { name = "Placed", type = "DateTime" },
]
"#;

    #[test]
    fn parses_nested_types() {
        let schema = Schema::parse(ORDERS).unwrap();
        let Type::Class(order) = &schema.element else {
            panic!("element is {}", schema.element);
        };
        let types: Vec<String> = order.fields().iter().map(|f| f.ty.to_string()).collect();
        assert_eq!(
            types,
            vec!["Int32", "Status", "List<Line>", "Decimal?", "DateTime"]
        );
        assert_eq!(schema.context().len(), 3);
    }

    #[test]
    fn unknown_and_duplicate_types_fail() {
        let err = Schema::parse("element = \"Missing\"").unwrap_err();
        assert!(matches!(err, SchemaError::UnknownType(name) if name == "Missing"));
        let dup = "element = \"A\"\n[[classes]]\nname = \"A\"\n[[classes]]\nname = \"a\"\n";
        assert!(matches!(
            Schema::parse(dup).unwrap_err(),
            SchemaError::DuplicateType(_)
        ));
    }

    #[test]
    fn converts_rows_both_ways() {
        let schema = Schema::parse(ORDERS).unwrap();
        let row = json!({
            "Id": 7,
            "Status": "shipped",
            "Lines": [{ "Qty": 2 }],
            "Placed": "2024-03-01T10:30:00",
        });
        let value = to_value(&row, &schema.element, "$").unwrap();
        let back = to_json(&value);
        assert_eq!(back["Id"], json!(7));
        assert_eq!(back["Status"], json!("Shipped"));
        assert_eq!(back["Lines"][0]["Qty"], json!(2));
        assert_eq!(back["Discount"], serde_json::Value::Null);
        assert_eq!(back["Placed"], json!("2024-03-01T10:30:00"));
    }

    #[test]
    fn reports_the_failing_path() {
        let schema = Schema::parse(ORDERS).unwrap();
        let row = json!({ "Id": "seven", "Status": "Open", "Lines": [], "Placed": "2024-01-01" });
        let err = to_value(&row, &schema.element, "$[0]").unwrap_err();
        assert_eq!(
            err.to_string(),
            "$[0].Id: expected Int32, found \"seven\""
        );
    }

    #[test]
    fn infers_argument_types() {
        assert_eq!(infer_value(&json!(5)), Value::Int32(5));
        assert_eq!(infer_value(&json!(5_000_000_000i64)), Value::Int64(5_000_000_000));
        assert_eq!(infer_value(&json!(1.5)), Value::Double(1.5));
        assert_eq!(infer_value(&json!("x")), Value::from("x"));
    }
}
