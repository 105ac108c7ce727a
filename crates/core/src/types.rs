//! Runtime type model.
//!
//! Element types are not known when the host program is compiled, so every
//! type the compiler can reason about is described by a [`Type`] value.
//! Primitive types are plain variants; enums and classes are nominal and
//! carry a shared descriptor that lists their members.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::builtins::Builtin;
use crate::value::{Object, Value};

#[derive(Debug, Clone)]
pub enum Type {
    Object,
    Boolean,
    Char,
    String,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    Decimal,
    DateTime,
    TimeSpan,
    Nullable(Box<Type>),
    Enum(Arc<EnumType>),
    Class(Arc<ClassType>),
    List(Box<Type>),
    Grouping { key: Box<Type>, element: Box<Type> },
}

/// Coarse numeric classification used by conversions and betterness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    /// `Char`, `Single`, `Double`, `Decimal`.
    Other,
    Signed,
    Unsigned,
}

impl Type {
    pub fn nullable(inner: Type) -> Type {
        Type::Nullable(Box::new(inner))
    }

    pub fn list(element: Type) -> Type {
        Type::List(Box::new(element))
    }

    pub fn grouping(key: Type, element: Type) -> Type {
        Type::Grouping {
            key: Box::new(key),
            element: Box::new(element),
        }
    }

    pub fn is_value_type(&self) -> bool {
        !matches!(
            self,
            Type::Object | Type::String | Type::Class(_) | Type::List(_) | Type::Grouping { .. }
        )
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, Type::Nullable(_))
    }

    /// The underlying type of a nullable, or the type itself.
    pub fn non_nullable(&self) -> &Type {
        match self {
            Type::Nullable(inner) => inner,
            other => other,
        }
    }

    pub fn numeric_kind(&self) -> Option<NumericKind> {
        match self.non_nullable() {
            Type::Char | Type::Single | Type::Double | Type::Decimal => Some(NumericKind::Other),
            Type::SByte | Type::Int16 | Type::Int32 | Type::Int64 => Some(NumericKind::Signed),
            Type::Byte | Type::UInt16 | Type::UInt32 | Type::UInt64 => Some(NumericKind::Unsigned),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric_kind().is_some()
    }

    pub fn is_signed_integral(&self) -> bool {
        self.numeric_kind() == Some(NumericKind::Signed)
    }

    pub fn is_unsigned_integral(&self) -> bool {
        self.numeric_kind() == Some(NumericKind::Unsigned)
    }

    pub fn is_integral(&self) -> bool {
        self.is_signed_integral() || self.is_unsigned_integral()
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.non_nullable(), Type::Enum(_))
    }

    /// Element type when values of this type can be iterated by aggregates.
    pub fn element_type(&self) -> Option<Type> {
        match self {
            Type::List(element) | Type::Grouping { element, .. } => Some((**element).clone()),
            Type::Class(class) => class.element_type().cloned(),
            _ => None,
        }
    }

    /// Reference assignability: `self` is the target, `source` the value's type.
    pub fn is_assignable_from(&self, source: &Type) -> bool {
        match (self, source) {
            (Type::Object, _) => true,
            (Type::Class(target), Type::Class(src)) => src.is_subclass_of(target),
            _ => self == source,
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Nullable(a), Type::Nullable(b)) => a == b,
            (Type::List(a), Type::List(b)) => a == b,
            (Type::Enum(a), Type::Enum(b)) => Arc::ptr_eq(a, b),
            (Type::Class(a), Type::Class(b)) => Arc::ptr_eq(a, b),
            (
                Type::Grouping { key: k1, element: e1 },
                Type::Grouping { key: k2, element: e2 },
            ) => k1 == k2 && e1 == e2,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Type::Nullable(inner) | Type::List(inner) => inner.hash(state),
            Type::Enum(e) => Arc::as_ptr(e).hash(state),
            Type::Class(c) => Arc::as_ptr(c).hash(state),
            Type::Grouping { key, element } => {
                key.hash(state);
                element.hash(state);
            }
            _ => {}
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let simple = match self {
            Type::Object => "Object",
            Type::Boolean => "Boolean",
            Type::Char => "Char",
            Type::String => "String",
            Type::SByte => "SByte",
            Type::Byte => "Byte",
            Type::Int16 => "Int16",
            Type::UInt16 => "UInt16",
            Type::Int32 => "Int32",
            Type::UInt32 => "UInt32",
            Type::Int64 => "Int64",
            Type::UInt64 => "UInt64",
            Type::Single => "Single",
            Type::Double => "Double",
            Type::Decimal => "Decimal",
            Type::DateTime => "DateTime",
            Type::TimeSpan => "TimeSpan",
            Type::Nullable(inner) => return write!(f, "{}?", inner),
            Type::Enum(e) => return f.write_str(e.name()),
            Type::Class(c) => return f.write_str(c.name()),
            Type::List(element) => return write!(f, "List<{}>", element),
            Type::Grouping { key, element } => {
                return write!(f, "IGrouping<{}, {}>", key, element)
            }
        };
        f.write_str(simple)
    }
}

// ──────────────────────────────────────────────
// Enums
// ──────────────────────────────────────────────

#[derive(Debug)]
pub struct EnumType {
    name: String,
    members: Vec<(String, i64)>,
}

impl EnumType {
    pub fn new<N: Into<String>>(
        name: impl Into<String>,
        members: impl IntoIterator<Item = (N, i64)>,
    ) -> Arc<Self> {
        Arc::new(EnumType {
            name: name.into(),
            members: members.into_iter().map(|(n, v)| (n.into(), v)).collect(),
        })
    }

    /// Members numbered from zero in declaration order.
    pub fn with_names<N: Into<String>>(
        name: impl Into<String>,
        names: impl IntoIterator<Item = N>,
    ) -> Arc<Self> {
        EnumType::new(name, names.into_iter().zip(0i64..))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[(String, i64)] {
        &self.members
    }

    /// Case-insensitive member lookup.
    pub fn value_of(&self, member: &str) -> Option<i64> {
        self.members
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(member))
            .map(|(_, v)| *v)
    }

    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }

    pub fn value(self: &Arc<Self>, member: &str) -> Option<Value> {
        self.value_of(member).map(|v| Value::Enum(self.clone(), v))
    }
}

impl PartialEq for EnumType {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

// ──────────────────────────────────────────────
// Members
// ──────────────────────────────────────────────

pub type NativeFn = Arc<dyn Fn(Option<&Value>, &[Value]) -> Result<Value, String> + Send + Sync>;
pub type NativeGetter = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

/// How a property value is obtained.
#[derive(Clone)]
pub enum Getter {
    /// Positional field of an object instance.
    Field(usize),
    Constant(Value),
    Builtin(Builtin),
    Native(NativeGetter),
}

impl fmt::Debug for Getter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Getter::Field(i) => write!(f, "Field({})", i),
            Getter::Constant(v) => write!(f, "Constant({:?})", v),
            Getter::Builtin(b) => write!(f, "Builtin({:?})", b),
            Getter::Native(_) => f.write_str("Native"),
        }
    }
}

#[derive(Clone)]
pub enum Callable {
    Builtin(Builtin),
    Native(NativeFn),
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Builtin(b) => write!(f, "Builtin({:?})", b),
            Callable::Native(_) => f.write_str("Native"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub ty: Type,
    pub is_static: bool,
    pub getter: Getter,
}

/// A method, constructor or indexer. Constructors leave `ret` as `Object`;
/// the constructed type is carried by the expression that invokes them.
#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub params: Vec<Type>,
    pub ret: Type,
    pub is_static: bool,
    pub body: Callable,
}

/// Members declared at one level of a type hierarchy.
#[derive(Debug, Default)]
pub struct Members {
    pub properties: Vec<Arc<Property>>,
    pub methods: Vec<Arc<Method>>,
    pub constructors: Vec<Arc<Method>>,
    pub indexers: Vec<Arc<Method>>,
}

impl Members {
    pub fn property(&self, name: &str, is_static: bool) -> Option<&Arc<Property>> {
        self.properties
            .iter()
            .find(|p| p.is_static == is_static && p.name.eq_ignore_ascii_case(name))
    }

    pub fn methods_named<'a>(
        &'a self,
        name: &'a str,
        is_static: bool,
    ) -> impl Iterator<Item = &'a Arc<Method>> + 'a {
        self.methods
            .iter()
            .filter(move |m| m.is_static == is_static && m.name.eq_ignore_ascii_case(name))
    }
}

// ──────────────────────────────────────────────
// Classes
// ──────────────────────────────────────────────

/// A named field in an object layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: Type,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        FieldDescriptor {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    /// Declared by the host and made visible through a type provider.
    Registered,
    /// Holder of static members only, such as `Math`.
    Static,
    /// Created by the shape factory for a `new (...)` projection.
    Shape(usize),
}

/// Descriptor of a class: its object layout and the members it declares.
pub struct ClassType {
    name: String,
    kind: ClassKind,
    base: Option<Arc<ClassType>>,
    /// Full layout; inherited fields come first.
    fields: Vec<FieldDescriptor>,
    members: Arc<Members>,
    element: Option<Type>,
}

impl fmt::Debug for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassType")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl PartialEq for ClassType {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl ClassType {
    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder::new(name.into(), ClassKind::Registered)
    }

    pub(crate) fn static_builder(name: &str) -> ClassBuilder {
        ClassBuilder::new(name.to_owned(), ClassKind::Static)
    }

    pub(crate) fn shape(id: usize, fields: &[FieldDescriptor]) -> Arc<ClassType> {
        let mut builder = ClassBuilder::new(format!("DynamicClass{}", id), ClassKind::Shape(id));
        for f in fields {
            builder = builder.field(f.name.clone(), f.ty.clone());
        }
        builder.field_constructor().build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    pub fn is_shape(&self) -> bool {
        matches!(self.kind, ClassKind::Shape(_))
    }

    pub fn base(&self) -> Option<&Arc<ClassType>> {
        self.base.as_ref()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Members declared by this class itself, not its bases.
    pub fn members(&self) -> &Arc<Members> {
        &self.members
    }

    pub fn element_type(&self) -> Option<&Type> {
        self.element.as_ref()
    }

    pub fn is_subclass_of(&self, other: &ClassType) -> bool {
        let mut current = Some(self);
        while let Some(c) = current {
            if std::ptr::eq(c, other) {
                return true;
            }
            current = c.base.as_deref();
        }
        false
    }

    /// Builds an instance from positional field values.
    pub fn instantiate(self: &Arc<Self>, fields: Vec<Value>) -> Value {
        Value::Object(Arc::new(Object::new(self.clone(), fields, Vec::new())))
    }

    /// Builds an instance of an enumerable class.
    pub fn instantiate_with_items(
        self: &Arc<Self>,
        fields: Vec<Value>,
        items: Vec<Value>,
    ) -> Value {
        Value::Object(Arc::new(Object::new(self.clone(), fields, items)))
    }
}

/// Incremental construction of a [`ClassType`].
pub struct ClassBuilder {
    name: String,
    kind: ClassKind,
    base: Option<Arc<ClassType>>,
    own_fields: Vec<FieldDescriptor>,
    members: Members,
    element: Option<Type>,
}

impl ClassBuilder {
    fn new(name: String, kind: ClassKind) -> Self {
        ClassBuilder {
            name,
            kind,
            base: None,
            own_fields: Vec::new(),
            members: Members::default(),
            element: None,
        }
    }

    pub fn extends(mut self, base: &Arc<ClassType>) -> Self {
        self.base = Some(base.clone());
        self
    }

    pub fn field(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.own_fields.push(FieldDescriptor::new(name, ty));
        self
    }

    pub fn property<F>(mut self, name: impl Into<String>, ty: Type, getter: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.members.properties.push(Arc::new(Property {
            name: name.into(),
            ty,
            is_static: false,
            getter: Getter::Native(Arc::new(getter)),
        }));
        self
    }

    pub fn constant(mut self, name: impl Into<String>, ty: Type, value: Value) -> Self {
        self.members.properties.push(Arc::new(Property {
            name: name.into(),
            ty,
            is_static: true,
            getter: Getter::Constant(value),
        }));
        self
    }

    /// Instance method; the closure receives the receiver and the arguments.
    pub fn method<F>(
        mut self,
        name: impl Into<String>,
        params: Vec<Type>,
        ret: Type,
        body: F,
    ) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        let name = name.into();
        let missing = format!("'{}' requires an instance", name);
        let body: NativeFn = Arc::new(move |this: Option<&Value>, args: &[Value]| match this {
            Some(this) => body(this, args),
            None => Err(missing.clone()),
        });
        self.members.methods.push(Arc::new(Method {
            name,
            params,
            ret,
            is_static: false,
            body: Callable::Native(body),
        }));
        self
    }

    pub fn static_method<F>(
        mut self,
        name: impl Into<String>,
        params: Vec<Type>,
        ret: Type,
        body: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.members.methods.push(Arc::new(Method {
            name: name.into(),
            params,
            ret,
            is_static: true,
            body: Callable::Native(Arc::new(move |_: Option<&Value>, args: &[Value]| body(args))),
        }));
        self
    }

    pub(crate) fn builtin_method(mut self, method: Method) -> Self {
        self.members.methods.push(Arc::new(method));
        self
    }

    pub fn constructor<F>(mut self, params: Vec<Type>, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.members.constructors.push(Arc::new(Method {
            name: ".ctor".to_owned(),
            params,
            ret: Type::Object,
            is_static: true,
            body: Callable::Native(Arc::new(move |_: Option<&Value>, args: &[Value]| body(args))),
        }));
        self
    }

    /// Constructor taking every field of the full layout, in order.
    pub fn field_constructor(mut self) -> Self {
        let mut params: Vec<Type> = self
            .base
            .as_ref()
            .map(|b| b.fields.iter().map(|f| f.ty.clone()).collect())
            .unwrap_or_default();
        params.extend(self.own_fields.iter().map(|f| f.ty.clone()));
        self.members.constructors.push(Arc::new(Method {
            name: ".ctor".to_owned(),
            params,
            ret: Type::Object,
            is_static: true,
            body: Callable::Builtin(Builtin::ObjectNew),
        }));
        self
    }

    pub fn indexer<F>(mut self, params: Vec<Type>, ret: Type, body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        let body: NativeFn = Arc::new(move |this: Option<&Value>, args: &[Value]| match this {
            Some(this) => body(this, args),
            None => Err("indexer requires an instance".to_owned()),
        });
        self.members.indexers.push(Arc::new(Method {
            name: "Item".to_owned(),
            params,
            ret,
            is_static: false,
            body: Callable::Native(body),
        }));
        self
    }

    /// Makes instances iterable by aggregates; items are supplied per instance.
    pub fn enumerable(mut self, element: Type) -> Self {
        self.element = Some(element);
        self
    }

    pub fn build(self) -> Arc<ClassType> {
        let mut fields = self
            .base
            .as_ref()
            .map(|b| b.fields.clone())
            .unwrap_or_default();
        let offset = fields.len();
        let mut members = self.members;
        let field_props: Vec<Arc<Property>> = self
            .own_fields
            .iter()
            .enumerate()
            .map(|(i, f)| {
                Arc::new(Property {
                    name: f.name.clone(),
                    ty: f.ty.clone(),
                    is_static: false,
                    getter: Getter::Field(offset + i),
                })
            })
            .collect();
        members.properties.splice(0..0, field_props);
        fields.extend(self.own_fields);
        let element = self
            .element
            .or_else(|| self.base.as_ref().and_then(|b| b.element.clone()));
        Arc::new(ClassType {
            name: self.name,
            kind: self.kind,
            base: self.base,
            fields,
            members: Arc::new(members),
            element,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nominal_equality_for_classes() {
        let a = ClassType::builder("A").field("X", Type::Int32).build();
        let b = ClassType::builder("A").field("X", Type::Int32).build();
        assert_eq!(Type::Class(a.clone()), Type::Class(a.clone()));
        assert_ne!(Type::Class(a), Type::Class(b));
    }

    #[test]
    fn structural_equality_for_wrappers() {
        assert_eq!(Type::nullable(Type::Int32), Type::nullable(Type::Int32));
        assert_ne!(Type::nullable(Type::Int32), Type::Int32);
        assert_eq!(Type::list(Type::String), Type::list(Type::String));
        assert_ne!(Type::list(Type::String), Type::list(Type::Int32));
    }

    #[test]
    fn inherited_fields_come_first() {
        let base = ClassType::builder("Entity").field("Id", Type::Int32).build();
        let derived = ClassType::builder("User")
            .extends(&base)
            .field("Name", Type::String)
            .build();
        let names: Vec<_> = derived.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Id", "Name"]);
        assert!(derived.is_subclass_of(&base));
        assert!(!base.is_subclass_of(&derived));
        assert!(Type::Class(base.clone()).is_assignable_from(&Type::Class(derived.clone())));
        let name = derived.members().property("name", false).unwrap();
        assert!(matches!(name.getter, Getter::Field(1)));
    }

    #[test]
    fn value_type_classification() {
        assert!(Type::Int32.is_value_type());
        assert!(Type::nullable(Type::DateTime).is_value_type());
        assert!(!Type::String.is_value_type());
        assert!(!Type::Object.is_value_type());
        assert!(Type::Byte.is_unsigned_integral());
        assert!(Type::nullable(Type::Int64).is_signed_integral());
        assert_eq!(Type::Char.numeric_kind(), Some(NumericKind::Other));
    }

    #[test]
    fn enum_lookup_ignores_case() {
        let color = EnumType::with_names("Color", ["Red", "Green"]);
        assert_eq!(color.value_of("green"), Some(1));
        assert_eq!(color.name_of(0), Some("Red"));
        assert_eq!(color.value_of("Blue"), None);
    }

    #[test]
    fn display_names() {
        assert_eq!(Type::nullable(Type::Int32).to_string(), "Int32?");
        assert_eq!(Type::list(Type::String).to_string(), "List<String>");
    }
}
