//! Runtime values flowing through compiled expressions.

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use time::{Duration, PrimitiveDateTime};

use crate::types::{ClassType, EnumType, Type};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent reference or nullable value.
    Null,
    Boolean(bool),
    Char(char),
    String(String),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Single(f32),
    Double(f64),
    Decimal(Decimal),
    DateTime(PrimitiveDateTime),
    TimeSpan(Duration),
    Enum(Arc<EnumType>, i64),
    Object(Arc<Object>),
    List(Arc<Vec<Value>>),
    Group(Arc<Group>),
}

/// An instance of a class: positional fields and, for enumerable
/// classes, the items it yields.
#[derive(Debug, PartialEq)]
pub struct Object {
    class: Arc<ClassType>,
    fields: Vec<Value>,
    items: Vec<Value>,
}

impl Object {
    pub fn new(class: Arc<ClassType>, fields: Vec<Value>, items: Vec<Value>) -> Self {
        Object {
            class,
            fields,
            items,
        }
    }

    pub fn class(&self) -> &Arc<ClassType> {
        &self.class
    }

    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }

    /// Field by its declared name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.class.field_index(name).and_then(|i| self.fields.get(i))
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }
}

/// One group produced by a group-by: its key and member elements.
#[derive(Debug, PartialEq)]
pub struct Group {
    pub key: Value,
    pub items: Vec<Value>,
}

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Arc::new(items))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<Object>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Items of a sequence value: lists, groups and enumerable objects.
    pub fn items(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            Value::Group(g) => Some(&g.items),
            Value::Object(o) if o.class.element_type().is_some() => Some(&o.items),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Char(_) => "Char",
            Value::String(_) => "String",
            Value::SByte(_) => "SByte",
            Value::Byte(_) => "Byte",
            Value::Int16(_) => "Int16",
            Value::UInt16(_) => "UInt16",
            Value::Int32(_) => "Int32",
            Value::UInt32(_) => "UInt32",
            Value::Int64(_) => "Int64",
            Value::UInt64(_) => "UInt64",
            Value::Single(_) => "Single",
            Value::Double(_) => "Double",
            Value::Decimal(_) => "Decimal",
            Value::DateTime(_) => "DateTime",
            Value::TimeSpan(_) => "TimeSpan",
            Value::Enum(..) => "Enum",
            Value::Object(_) => "Object",
            Value::List(_) => "List",
            Value::Group(_) => "Grouping",
        }
    }

    /// The static type an argument value gets when no type is supplied.
    ///
    /// Lists take their element type from the first item; empty lists and
    /// `Null` are typed as `Object`.
    pub fn natural_type(&self) -> Type {
        match self {
            Value::Null => Type::Object,
            Value::Boolean(_) => Type::Boolean,
            Value::Char(_) => Type::Char,
            Value::String(_) => Type::String,
            Value::SByte(_) => Type::SByte,
            Value::Byte(_) => Type::Byte,
            Value::Int16(_) => Type::Int16,
            Value::UInt16(_) => Type::UInt16,
            Value::Int32(_) => Type::Int32,
            Value::UInt32(_) => Type::UInt32,
            Value::Int64(_) => Type::Int64,
            Value::UInt64(_) => Type::UInt64,
            Value::Single(_) => Type::Single,
            Value::Double(_) => Type::Double,
            Value::Decimal(_) => Type::Decimal,
            Value::DateTime(_) => Type::DateTime,
            Value::TimeSpan(_) => Type::TimeSpan,
            Value::Enum(e, _) => Type::Enum(e.clone()),
            Value::Object(o) => Type::Class(o.class.clone()),
            Value::List(items) => Type::list(
                items
                    .first()
                    .map(Value::natural_type)
                    .unwrap_or(Type::Object),
            ),
            Value::Group(g) => Type::grouping(
                g.key.natural_type(),
                g.items
                    .first()
                    .map(Value::natural_type)
                    .unwrap_or(Type::Object),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// Formats a time span as `[-][d.]hh:mm:ss[.fffffff]`.
fn fmt_time_span(d: &Duration, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if d.is_negative() {
        f.write_str("-")?;
    }
    let d = d.abs();
    let days = d.whole_days();
    if days != 0 {
        write!(f, "{}.", days)?;
    }
    write!(
        f,
        "{:02}:{:02}:{:02}",
        d.whole_hours() % 24,
        d.whole_minutes() % 60,
        d.whole_seconds() % 60
    )?;
    let ticks = d.subsec_nanoseconds() / 100;
    if ticks != 0 {
        write!(f, ".{:07}", ticks)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(true) => f.write_str("True"),
            Value::Boolean(false) => f.write_str("False"),
            Value::Char(c) => write!(f, "{}", c),
            Value::String(s) => f.write_str(s),
            Value::SByte(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::UInt16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
            Value::Single(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::DateTime(dt) => write!(
                f,
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                dt.year(),
                u8::from(dt.month()),
                dt.day(),
                dt.hour(),
                dt.minute(),
                dt.second()
            ),
            Value::TimeSpan(d) => fmt_time_span(d, f),
            Value::Enum(e, v) => match e.name_of(*v) {
                Some(name) => f.write_str(name),
                None => write!(f, "{}", v),
            },
            Value::Object(o) if o.class.is_shape() => {
                f.write_str("{")?;
                for (i, (desc, value)) in o.class.fields().iter().zip(&o.fields).enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", desc.name, value)?;
                }
                f.write_str("}")
            }
            Value::Object(o) => f.write_str(o.class.name()),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Group(g) => write!(f, "{} ({})", g.key, g.items.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldDescriptor;
    use time::macros::datetime;

    #[test]
    fn shape_display_lists_fields() {
        let class = ClassType::shape(
            900,
            &[
                FieldDescriptor::new("A", Type::Int32),
                FieldDescriptor::new("B", Type::String),
            ],
        );
        let v = class.instantiate(vec![Value::Int32(1), Value::from("x")]);
        assert_eq!(v.to_string(), "{A=1, B=x}");
    }

    #[test]
    fn objects_compare_structurally_within_a_class() {
        let class = ClassType::builder("P").field("X", Type::Int32).build();
        let a = class.instantiate(vec![Value::Int32(1)]);
        let b = class.instantiate(vec![Value::Int32(1)]);
        let c = class.instantiate(vec![Value::Int32(2)]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_object().and_then(|o| o.get("X")), Some(&Value::Int32(1)));
    }

    #[test]
    fn scalar_display() {
        assert_eq!(Value::Boolean(true).to_string(), "True");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(
            Value::DateTime(datetime!(2020-01-02 03:04:05)).to_string(),
            "2020-01-02 03:04:05"
        );
        assert_eq!(
            Value::TimeSpan(Duration::hours(26) + Duration::seconds(5)).to_string(),
            "1.02:00:05"
        );
    }

    #[test]
    fn natural_type_of_lists() {
        let v = Value::list(vec![Value::Int32(1)]);
        assert_eq!(v.natural_type(), Type::list(Type::Int32));
        assert_eq!(Value::list(vec![]).natural_type(), Type::list(Type::Object));
    }
}
