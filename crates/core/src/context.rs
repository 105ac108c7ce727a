//! Custom types visible to the compiler.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::config;
use crate::types::Type;

/// Supplies the enum and class types expressions may name.
pub trait CustomTypeProvider: Send + Sync {
    fn custom_types(&self) -> Vec<Type>;
}

/// A provider over a fixed list of types.
#[derive(Debug, Clone, Default)]
pub struct StaticTypeProvider {
    types: Vec<Type>,
}

impl StaticTypeProvider {
    pub fn new(types: impl IntoIterator<Item = Type>) -> Self {
        StaticTypeProvider {
            types: types.into_iter().collect(),
        }
    }
}

impl CustomTypeProvider for StaticTypeProvider {
    fn custom_types(&self) -> Vec<Type> {
        self.types.clone()
    }
}

/// Compile-time environment: the custom type catalog, keyed by lowercase
/// name. Built once from a provider; use a new context to pick up a
/// different provider.
#[derive(Clone)]
pub struct CompileContext {
    catalog: HashMap<String, Type>,
}

impl fmt::Debug for CompileContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.catalog.keys().collect();
        names.sort();
        f.debug_struct("CompileContext")
            .field("types", &names)
            .finish()
    }
}

fn type_name(ty: &Type) -> Option<&str> {
    match ty {
        Type::Enum(e) => Some(e.name()),
        Type::Class(c) => Some(c.name()),
        _ => None,
    }
}

impl CompileContext {
    pub fn new(provider: &dyn CustomTypeProvider) -> Self {
        CompileContext::with_types(provider.custom_types())
    }

    pub fn with_types(types: impl IntoIterator<Item = Type>) -> Self {
        let mut catalog = HashMap::new();
        for ty in types {
            let Some(name) = type_name(&ty) else {
                warn!(%ty, "ignoring unnamed custom type");
                continue;
            };
            let key = name.to_ascii_lowercase();
            if catalog.contains_key(&key) {
                warn!(name, "custom type registered more than once; keeping the first");
                continue;
            }
            catalog.insert(key, ty);
        }
        CompileContext { catalog }
    }

    /// A context with no custom types.
    pub fn empty() -> Self {
        CompileContext {
            catalog: HashMap::new(),
        }
    }

    /// Case-insensitive lookup of a custom type.
    pub fn lookup(&self, name: &str) -> Option<&Type> {
        self.catalog.get(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }
}

impl Default for CompileContext {
    /// Built from the process default provider, if one was installed.
    fn default() -> Self {
        match config::default_provider() {
            Some(provider) => CompileContext::new(provider.as_ref()),
            None => CompileContext::empty(),
        }
    }
}

impl<P: CustomTypeProvider> From<Arc<P>> for CompileContext {
    fn from(provider: Arc<P>) -> Self {
        CompileContext::new(provider.as_ref())
    }
}
