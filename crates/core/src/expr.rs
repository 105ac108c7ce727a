//! Typed expression trees produced by the compiler.

use std::fmt;
use std::sync::Arc;

use crate::types::{ClassType, Method, Property, Type};
use crate::value::Value;

/// A compiled node and its statically known type.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// A literal as written; `text` is kept so the literal can be
    /// re-read against another type. The `null` literal is a `Null` value
    /// typed `Object`.
    Literal { value: Value, text: String },
    Constant(Value),
    /// Reads an environment slot (lambda parameter or aggregate variable).
    Parameter(usize),
    Property {
        instance: Option<Box<Expr>>,
        property: Arc<Property>,
    },
    Call {
        instance: Option<Box<Expr>>,
        method: Arc<Method>,
        args: Vec<Expr>,
    },
    /// Sequence aggregate; `body` is evaluated with each item in `slot`.
    Aggregate {
        source: Box<Expr>,
        op: AggregateOp,
        slot: usize,
        body: Option<Box<Expr>>,
    },
    ArrayIndex {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
    /// Conversion to `ty`; `checked` conversions fail on overflow.
    Convert {
        operand: Box<Expr>,
        checked: bool,
    },
    New {
        constructor: Arc<Method>,
        args: Vec<Expr>,
    },
    /// Builds an instance of a shape from one value per field.
    MemberInit {
        class: Arc<ClassType>,
        values: Vec<Expr>,
    },
    Invoke {
        lambda: Arc<Lambda>,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    OrElse,
    AndAlso,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Where,
    Any,
    All,
    Count,
    Min,
    Max,
    Sum,
    Average,
}

impl AggregateOp {
    pub fn name(self) -> &'static str {
        match self {
            AggregateOp::Where => "Where",
            AggregateOp::Any => "Any",
            AggregateOp::All => "All",
            AggregateOp::Count => "Count",
            AggregateOp::Min => "Min",
            AggregateOp::Max => "Max",
            AggregateOp::Sum => "Sum",
            AggregateOp::Average => "Average",
        }
    }
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type) -> Self {
        Expr { kind, ty }
    }

    pub fn constant(value: Value, ty: Type) -> Self {
        Expr::new(ExprKind::Constant(value), ty)
    }

    pub fn literal(value: Value, text: impl Into<String>, ty: Type) -> Self {
        Expr::new(
            ExprKind::Literal {
                value,
                text: text.into(),
            },
            ty,
        )
    }

    pub fn null_literal() -> Self {
        Expr::literal(Value::Null, "null", Type::Object)
    }

    pub fn parameter(slot: usize, ty: Type) -> Self {
        Expr::new(ExprKind::Parameter(slot), ty)
    }

    pub fn convert(operand: Expr, ty: Type, checked: bool) -> Self {
        Expr::new(
            ExprKind::Convert {
                operand: Box::new(operand),
                checked,
            },
            ty,
        )
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr, ty: Type) -> Self {
        Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ty,
        )
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(
            &self.kind,
            ExprKind::Literal {
                value: Value::Null,
                ..
            }
        )
    }

    /// Source text of a non-null literal.
    pub fn literal_text(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Literal { value, text } if !value.is_null() => Some(text),
            _ => None,
        }
    }
}

/// A lambda parameter bound to an environment slot.
#[derive(Debug, Clone)]
pub struct Param {
    /// `None` for the implicit `it` parameter.
    pub name: Option<String>,
    pub ty: Type,
    pub slot: usize,
}

/// A compiled lambda: parameters, body and the number of environment slots
/// the body needs.
#[derive(Debug, Clone)]
pub struct Lambda {
    pub params: Vec<Param>,
    pub body: Expr,
    pub slots: usize,
}

impl Lambda {
    pub fn return_type(&self) -> &Type {
        &self.body.ty
    }

    pub fn param_types(&self) -> Vec<Type> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }
}

/// One key of an ordering clause.
#[derive(Debug, Clone)]
pub struct Ordering {
    pub selector: Lambda,
    pub ascending: bool,
}
