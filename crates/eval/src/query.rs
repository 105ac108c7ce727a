//! In-memory dynamic query surface.
//!
//! [`DynamicQuery`] holds a materialized sequence and its element type.
//! Every operator compiles its expression text against the current element
//! type and returns a new query, so operators chain the way LINQ-style
//! query methods do.

use std::cmp::Ordering;
use std::sync::Arc;

use dynq_core::{
    compile_ordering, compile_predicate, compile_projection, Argument, CompileContext, Group,
    ParseError, Type, Value,
};
use tracing::debug;

use crate::compare::{compare_values, values_equal};
use crate::error::EvalError;
use crate::eval::{eval_lambda, eval_predicate};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

fn require_text<'a>(text: &'a str, what: &str) -> Result<&'a str, QueryError> {
    if text.trim().is_empty() {
        return Err(QueryError::InvalidArgument {
            message: format!("{} expression must not be empty", what),
        });
    }
    Ok(text)
}

#[derive(Debug, Clone)]
pub struct DynamicQuery {
    element: Type,
    rows: Vec<Value>,
    ctx: Arc<CompileContext>,
}

impl DynamicQuery {
    /// A query over `rows` using the default compile context.
    pub fn new(element: Type, rows: Vec<Value>) -> Self {
        DynamicQuery::with_context(Arc::new(CompileContext::default()), element, rows)
    }

    pub fn with_context(ctx: Arc<CompileContext>, element: Type, rows: Vec<Value>) -> Self {
        DynamicQuery { element, rows, ctx }
    }

    pub fn element_type(&self) -> &Type {
        &self.element
    }

    pub fn rows(&self) -> &[Value] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Value> {
        self.rows
    }

    fn derive(&self, element: Type, rows: Vec<Value>) -> Self {
        DynamicQuery {
            element,
            rows,
            ctx: self.ctx.clone(),
        }
    }

    /// Keeps the rows for which `predicate` is true.
    pub fn where_(&self, predicate: &str, args: &[Argument]) -> Result<Self, QueryError> {
        let text = require_text(predicate, "predicate")?;
        let lambda = compile_predicate(&self.ctx, &self.element, text, args)?;
        let mut kept = Vec::new();
        for row in &self.rows {
            if eval_predicate(&lambda, std::slice::from_ref(row))? {
                kept.push(row.clone());
            }
        }
        debug!(predicate = text, input = self.rows.len(), kept = kept.len(), "where");
        Ok(self.derive(self.element.clone(), kept))
    }

    /// Maps each row through `selector`; the element type becomes the
    /// selector's result type.
    pub fn select(&self, selector: &str, args: &[Argument]) -> Result<Self, QueryError> {
        let text = require_text(selector, "selector")?;
        let lambda = compile_projection(&self.ctx, &self.element, text, args)?;
        let rows = self
            .rows
            .iter()
            .map(|row| eval_lambda(&lambda, std::slice::from_ref(row)))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(selector = text, ty = %lambda.return_type(), "select");
        Ok(self.derive(lambda.return_type().clone(), rows))
    }

    /// Stable sort by `key [asc|desc], ...`.
    pub fn order_by(&self, ordering: &str, args: &[Argument]) -> Result<Self, QueryError> {
        let text = require_text(ordering, "ordering")?;
        let keys = compile_ordering(&self.ctx, &self.element, text, args)?;
        let mut keyed = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let values = keys
                .iter()
                .map(|k| eval_lambda(&k.selector, std::slice::from_ref(row)))
                .collect::<Result<Vec<_>, _>>()?;
            keyed.push((values, row.clone()));
        }

        // Comparison errors cannot escape `sort_by`; record the first one.
        let mut failure = None;
        keyed.sort_by(|(a, _), (b, _)| {
            for ((x, y), key) in a.iter().zip(b).zip(&keys) {
                let ordering = match compare_values(x, y) {
                    Ok(o) => o,
                    Err(e) => {
                        failure.get_or_insert(e);
                        Ordering::Equal
                    }
                };
                let ordering = if key.ascending {
                    ordering
                } else {
                    ordering.reverse()
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        if let Some(e) = failure {
            return Err(e.into());
        }
        debug!(ordering = text, keys = keys.len(), "order_by");
        let rows = keyed.into_iter().map(|(_, row)| row).collect();
        Ok(self.derive(self.element.clone(), rows))
    }

    /// Groups rows by `key`, in order of first appearance. Each group holds
    /// the rows themselves, or the result of `element` for each row.
    pub fn group_by(
        &self,
        key: &str,
        element: Option<&str>,
        args: &[Argument],
    ) -> Result<Self, QueryError> {
        let key_text = require_text(key, "key")?;
        let key_lambda = compile_projection(&self.ctx, &self.element, key_text, args)?;
        let element_lambda = match element {
            Some(text) => {
                let text = require_text(text, "element")?;
                Some(compile_projection(&self.ctx, &self.element, text, args)?)
            }
            None => None,
        };
        let element_ty = element_lambda
            .as_ref()
            .map_or_else(|| self.element.clone(), |l| l.return_type().clone());

        let mut groups: Vec<(Value, Vec<Value>)> = Vec::new();
        for row in &self.rows {
            let row_arg = std::slice::from_ref(row);
            let k = eval_lambda(&key_lambda, row_arg)?;
            let item = match &element_lambda {
                Some(l) => eval_lambda(l, row_arg)?,
                None => row.clone(),
            };
            match groups.iter_mut().find(|(g, _)| values_equal(g, &k)) {
                Some((_, items)) => items.push(item),
                None => groups.push((k, vec![item])),
            }
        }
        debug!(key = key_text, groups = groups.len(), "group_by");
        let ty = Type::grouping(key_lambda.return_type().clone(), element_ty);
        let rows = groups
            .into_iter()
            .map(|(key, items)| Value::Group(Arc::new(Group { key, items })))
            .collect();
        Ok(self.derive(ty, rows))
    }

    pub fn take(&self, n: usize) -> Self {
        self.derive(
            self.element.clone(),
            self.rows.iter().take(n).cloned().collect(),
        )
    }

    pub fn skip(&self, n: usize) -> Self {
        self.derive(
            self.element.clone(),
            self.rows.iter().skip(n).cloned().collect(),
        )
    }

    /// Whether any row satisfies `predicate`; with `None`, whether there
    /// are any rows.
    pub fn any(&self, predicate: Option<&str>, args: &[Argument]) -> Result<bool, QueryError> {
        match predicate {
            None => Ok(!self.rows.is_empty()),
            Some(p) => Ok(!self.where_(p, args)?.rows.is_empty()),
        }
    }

    pub fn count(&self, predicate: Option<&str>, args: &[Argument]) -> Result<usize, QueryError> {
        match predicate {
            None => Ok(self.rows.len()),
            Some(p) => Ok(self.where_(p, args)?.rows.len()),
        }
    }

    pub fn first(&self) -> Option<&Value> {
        self.rows.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynq_core::ClassType;

    fn people() -> DynamicQuery {
        let person = ClassType::builder("Person")
            .field("Name", Type::String)
            .field("Age", Type::Int32)
            .build();
        let rows = [("ann", 30), ("bob", 4), ("cat", 30)]
            .into_iter()
            .map(|(n, a)| person.instantiate(vec![Value::from(n), Value::Int32(a)]))
            .collect();
        DynamicQuery::with_context(
            Arc::new(CompileContext::empty()),
            Type::Class(person),
            rows,
        )
    }

    #[test]
    fn blank_text_is_rejected() {
        let err = people().where_("   ", &[]).unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument { .. }));
    }

    #[test]
    fn where_then_count() {
        let q = people();
        assert_eq!(q.count(Some("Age > 5"), &[]).unwrap(), 2);
        assert!(q.any(None, &[]).unwrap());
        assert!(!q.any(Some("Age > 100"), &[]).unwrap());
    }

    #[test]
    fn select_changes_element_type() {
        let q = people().select("Name.ToUpper()", &[]).unwrap();
        assert_eq!(q.element_type(), &Type::String);
        assert_eq!(q.first(), Some(&Value::from("ANN")));
    }

    #[test]
    fn skip_and_take() {
        let q = people().skip(1).take(1);
        assert_eq!(q.rows().len(), 1);
        let name = q.first().and_then(Value::as_object).and_then(|o| o.get("Name"));
        assert_eq!(name, Some(&Value::from("bob")));
    }

    #[test]
    fn compile_errors_surface() {
        let err = people().where_("Height > 1", &[]).unwrap_err();
        assert!(matches!(err, QueryError::Parse(_)));
    }
}
