//! Record types for `new (...)` projections.
//!
//! A shape is a class whose layout is exactly the projected fields. Shapes
//! are cached by their field list so equal projections share one type for
//! the life of the process.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::types::{ClassType, FieldDescriptor};

pub struct ShapeFactory {
    shapes: RwLock<HashMap<Vec<FieldDescriptor>, Arc<ClassType>>>,
}

static FACTORY: Lazy<ShapeFactory> = Lazy::new(ShapeFactory::new);

/// The process-wide factory used by the compiler.
pub fn factory() -> &'static ShapeFactory {
    &FACTORY
}

impl ShapeFactory {
    pub fn new() -> Self {
        ShapeFactory {
            shapes: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the shape for `fields`, creating it on first request.
    pub fn get_or_create(&self, fields: &[FieldDescriptor]) -> Arc<ClassType> {
        if let Some(shape) = self.shapes.read().get(fields) {
            trace!(shape = shape.name(), "shape cache hit");
            return shape.clone();
        }
        let mut shapes = self.shapes.write();
        // Another thread may have created it between the two locks.
        if let Some(shape) = shapes.get(fields) {
            return shape.clone();
        }
        let shape = ClassType::shape(shapes.len() + 1, fields);
        debug!(
            shape = shape.name(),
            fields = fields.len(),
            "created projection shape"
        );
        shapes.insert(fields.to_vec(), shape.clone());
        shape
    }

    pub fn len(&self) -> usize {
        self.shapes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ShapeFactory {
    fn default() -> Self {
        ShapeFactory::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassKind, Type};
    use std::thread;

    fn descriptors() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("A", Type::Int32),
            FieldDescriptor::new("C", Type::String),
        ]
    }

    #[test]
    fn equal_field_lists_share_a_shape() {
        let factory = ShapeFactory::new();
        let a = factory.get_or_create(&descriptors());
        let b = factory.get_or_create(&descriptors());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.len(), 1);
        assert_eq!(a.kind(), ClassKind::Shape(1));
        assert_eq!(a.name(), "DynamicClass1");
    }

    #[test]
    fn field_order_and_names_are_part_of_the_key() {
        let factory = ShapeFactory::new();
        let mut reversed = descriptors();
        reversed.reverse();
        let a = factory.get_or_create(&descriptors());
        let b = factory.get_or_create(&reversed);
        let c = factory.get_or_create(&[FieldDescriptor::new("a", Type::Int32)]);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(c.fields()[0].name, "a");
        assert_eq!(factory.len(), 3);
    }

    #[test]
    fn concurrent_requests_settle_on_one_shape() {
        let factory = Arc::new(ShapeFactory::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let factory = factory.clone();
                thread::spawn(move || factory.get_or_create(&descriptors()))
            })
            .collect();
        let shapes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(shapes.iter().all(|s| Arc::ptr_eq(s, &shapes[0])));
        let after = factory.get_or_create(&descriptors());
        assert!(Arc::ptr_eq(&after, &shapes[0]));
        assert_eq!(factory.len(), 1);
    }

    #[test]
    fn shapes_have_a_field_constructor() {
        let factory = ShapeFactory::new();
        let shape = factory.get_or_create(&descriptors());
        let ctor = &shape.members().constructors[0];
        assert_eq!(ctor.params, vec![Type::Int32, Type::String]);
    }
}
