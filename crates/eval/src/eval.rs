//! Tree-walking evaluation of compiled expressions.
//!
//! An [`Evaluator`] owns the environment slots of one lambda invocation.
//! Parameters and aggregate variables are read from and written to those
//! slots by index; the compiler assigns the indices.

use std::sync::Arc;

use dynq_core::builtins::Builtin;
use dynq_core::types::{Callable, Getter, Method, Property};
use dynq_core::{BinaryOp, Expr, ExprKind, Lambda, UnaryOp, Value};

use crate::aggregate;
use crate::builtins;
use crate::compare::{compare_values, values_equal};
use crate::error::EvalError;
use crate::numeric;

/// Evaluates `lambda` with positional `args` bound to its parameters.
pub fn eval_lambda(lambda: &Lambda, args: &[Value]) -> Result<Value, EvalError> {
    if args.len() != lambda.params.len() {
        return Err(EvalError::Arity {
            expected: lambda.params.len(),
            actual: args.len(),
        });
    }
    let mut evaluator = Evaluator::new(lambda.slots);
    for (param, arg) in lambda.params.iter().zip(args) {
        evaluator.bind(param.slot, arg.clone());
    }
    evaluator.eval(&lambda.body)
}

/// Evaluates a Boolean lambda; a null result counts as false.
pub fn eval_predicate(lambda: &Lambda, args: &[Value]) -> Result<bool, EvalError> {
    match eval_lambda(lambda, args)? {
        Value::Boolean(b) => Ok(b),
        Value::Null => Ok(false),
        other => Err(EvalError::type_error(format!(
            "predicate produced {}",
            other.type_name()
        ))),
    }
}

pub struct Evaluator {
    slots: Vec<Value>,
}

impl Evaluator {
    pub fn new(slots: usize) -> Self {
        Evaluator {
            slots: vec![Value::Null; slots],
        }
    }

    pub fn bind(&mut self, slot: usize, value: Value) {
        if slot >= self.slots.len() {
            self.slots.resize(slot + 1, Value::Null);
        }
        self.slots[slot] = value;
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match &expr.kind {
            ExprKind::Literal { value, .. } | ExprKind::Constant(value) => Ok(value.clone()),

            ExprKind::Parameter(slot) => self
                .slots
                .get(*slot)
                .cloned()
                .ok_or_else(|| EvalError::type_error(format!("unbound slot {}", slot))),

            ExprKind::Property { instance, property } => {
                let this = self.receiver(instance.as_deref(), &property.name)?;
                read_property(property, this.as_ref())
            }

            ExprKind::Call {
                instance,
                method,
                args,
            } => {
                let this = self.receiver(instance.as_deref(), &method.name)?;
                let args = self.eval_all(args)?;
                invoke(method, this.as_ref(), &args)
            }

            ExprKind::Aggregate {
                source,
                op,
                slot,
                body,
            } => {
                let source = self.eval(source)?;
                if source.is_null() {
                    return Err(EvalError::NullReference {
                        member: op.name().to_owned(),
                    });
                }
                let items = source
                    .items()
                    .ok_or_else(|| EvalError::type_error(format!("{} expects a sequence", op)))?;
                let body_ty = body.as_ref().map(|b| b.ty.clone());
                aggregate::apply(*op, items, body_ty.as_ref(), &expr.ty, |item| {
                    match body {
                        Some(body) => {
                            self.bind(*slot, item.clone());
                            self.eval(body)
                        }
                        None => Ok(item.clone()),
                    }
                })
            }

            ExprKind::ArrayIndex { array, index } => {
                let array = self.eval(array)?;
                let index = self.eval(index)?;
                let items = match &array {
                    Value::Null => {
                        return Err(EvalError::NullReference {
                            member: "[]".to_owned(),
                        })
                    }
                    other => other
                        .items()
                        .ok_or_else(|| EvalError::type_error("indexing expects a list"))?,
                };
                let Value::Int32(i) = index else {
                    return Err(EvalError::type_error("list index must be an Int32"));
                };
                usize::try_from(i)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .ok_or(EvalError::IndexOutOfRange {
                        index: i64::from(i),
                        len: items.len(),
                    })
            }

            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Negate => numeric::negate(&value),
                    UnaryOp::Not => match value {
                        Value::Null => Ok(Value::Null),
                        Value::Boolean(b) => Ok(Value::Boolean(!b)),
                        other => Err(EvalError::type_error(format!(
                            "cannot apply ! to {}",
                            other.type_name()
                        ))),
                    },
                }
            }

            ExprKind::Binary { op, left, right } => self.eval_binary(*op, left, right),

            ExprKind::Conditional {
                test,
                if_true,
                if_false,
            } => match self.eval(test)? {
                Value::Boolean(true) => self.eval(if_true),
                Value::Boolean(false) | Value::Null => self.eval(if_false),
                other => Err(EvalError::type_error(format!(
                    "condition produced {}",
                    other.type_name()
                ))),
            },

            ExprKind::Convert { operand, checked } => {
                let value = self.eval(operand)?;
                numeric::convert(&value, &operand.ty, &expr.ty, *checked)
            }

            ExprKind::New { constructor, args } => {
                let args = self.eval_all(args)?;
                match &constructor.body {
                    Callable::Builtin(b) => builtins::construct(*b, &expr.ty, &args),
                    Callable::Native(f) => f(None, &args).map_err(native),
                }
            }

            ExprKind::MemberInit { class, values } => {
                let values = self.eval_all(values)?;
                Ok(class.instantiate(values))
            }

            ExprKind::Invoke { lambda, args } => {
                let args = self.eval_all(args)?;
                eval_lambda(lambda, &args)
            }
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, EvalError> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    /// Evaluates a member's receiver. Null is only allowed where the
    /// receiver is itself nullable, so `HasValue` can observe it.
    fn receiver(
        &mut self,
        instance: Option<&Expr>,
        member: &str,
    ) -> Result<Option<Value>, EvalError> {
        let Some(instance) = instance else {
            return Ok(None);
        };
        let value = self.eval(instance)?;
        if value.is_null() && !instance.ty.is_nullable() {
            return Err(EvalError::NullReference {
                member: member.to_owned(),
            });
        }
        Ok(Some(value))
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> Result<Value, EvalError> {
        match op {
            // Three-valued logic: a known operand may decide the result
            // even when the other one is null.
            BinaryOp::AndAlso => match self.eval(left)? {
                Value::Boolean(false) => Ok(Value::Boolean(false)),
                l => match (l, self.eval(right)?) {
                    (_, Value::Boolean(false)) => Ok(Value::Boolean(false)),
                    (Value::Boolean(true), Value::Boolean(true)) => Ok(Value::Boolean(true)),
                    _ => Ok(Value::Null),
                },
            },
            BinaryOp::OrElse => match self.eval(left)? {
                Value::Boolean(true) => Ok(Value::Boolean(true)),
                l => match (l, self.eval(right)?) {
                    (_, Value::Boolean(true)) => Ok(Value::Boolean(true)),
                    (Value::Boolean(false), Value::Boolean(false)) => Ok(Value::Boolean(false)),
                    _ => Ok(Value::Null),
                },
            },
            BinaryOp::Equal => {
                let (l, r) = (self.eval(left)?, self.eval(right)?);
                Ok(Value::Boolean(values_equal(&l, &r)))
            }
            BinaryOp::NotEqual => {
                let (l, r) = (self.eval(left)?, self.eval(right)?);
                Ok(Value::Boolean(!values_equal(&l, &r)))
            }
            BinaryOp::LessThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual => {
                let (l, r) = (self.eval(left)?, self.eval(right)?);
                if l.is_null() || r.is_null() {
                    return Ok(Value::Boolean(false));
                }
                if is_nan(&l) || is_nan(&r) {
                    return Ok(Value::Boolean(false));
                }
                let ordering = compare_values(&l, &r)?;
                Ok(Value::Boolean(match op {
                    BinaryOp::LessThan => ordering.is_lt(),
                    BinaryOp::LessThanOrEqual => ordering.is_le(),
                    BinaryOp::GreaterThan => ordering.is_gt(),
                    _ => ordering.is_ge(),
                }))
            }
            BinaryOp::Add
            | BinaryOp::Subtract
            | BinaryOp::Multiply
            | BinaryOp::Divide
            | BinaryOp::Modulo => {
                let (l, r) = (self.eval(left)?, self.eval(right)?);
                numeric::arithmetic(op, &l, &r)
            }
        }
    }
}

fn is_nan(value: &Value) -> bool {
    match value {
        Value::Single(v) => v.is_nan(),
        Value::Double(v) => v.is_nan(),
        _ => false,
    }
}

fn native(message: String) -> EvalError {
    EvalError::Native { message }
}

fn read_property(property: &Arc<Property>, this: Option<&Value>) -> Result<Value, EvalError> {
    match &property.getter {
        Getter::Field(i) => {
            let object = this.and_then(Value::as_object).ok_or_else(|| {
                EvalError::type_error(format!("'{}' expects an object", property.name))
            })?;
            object.field(*i).cloned().ok_or(EvalError::IndexOutOfRange {
                index: *i as i64,
                len: object.fields().len(),
            })
        }
        Getter::Constant(value) => Ok(value.clone()),
        Getter::Builtin(builtin) => match this {
            Some(this) => builtins::get_property(*builtin, this),
            None => Err(EvalError::type_error(format!(
                "'{}' needs an instance",
                property.name
            ))),
        },
        Getter::Native(f) => f(this.unwrap_or(&Value::Null)).map_err(native),
    }
}

fn invoke(method: &Arc<Method>, this: Option<&Value>, args: &[Value]) -> Result<Value, EvalError> {
    match &method.body {
        Callable::Builtin(Builtin::ObjectNew) => Err(EvalError::type_error(format!(
            "'{}' is a constructor",
            method.name
        ))),
        Callable::Builtin(builtin) => builtins::call(*builtin, method, this, args),
        Callable::Native(f) => f(this, args).map_err(native),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynq_core::{compile_lambda, compile_predicate, CompileContext, ParamDecl, Type};
    use pretty_assertions::assert_eq;

    fn run(params: &[ParamDecl], text: &str, args: &[Value]) -> Result<Value, EvalError> {
        let ctx = CompileContext::default();
        let lambda = compile_lambda(&ctx, params, None, text, &[]).unwrap();
        eval_lambda(&lambda, args)
    }

    fn scalar(text: &str) -> Value {
        run(&[], text, &[]).unwrap()
    }

    #[test]
    fn arithmetic_follows_precedence() {
        assert_eq!(scalar("1 + 2 * 3"), Value::Int32(7));
        assert_eq!(scalar("(1 + 2) * 3"), Value::Int32(9));
        assert_eq!(scalar("7 % 4 - 1"), Value::Int32(2));
        assert_eq!(scalar("1.5 + 1"), Value::Double(2.5));
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(scalar("\"a\" + 1"), Value::from("a1"));
    }

    #[test]
    fn integer_division_by_zero_fails() {
        assert_eq!(run(&[], "1 / 0", &[]), Err(EvalError::DivideByZero));
        assert_eq!(scalar("1.0 / 0"), Value::Double(f64::INFINITY));
    }

    #[test]
    fn ternary_and_iif() {
        assert_eq!(scalar("1 < 2 ? \"yes\" : \"no\""), Value::from("yes"));
        assert_eq!(scalar("iif(1 > 2, 10, 20)"), Value::Int32(20));
    }

    #[test]
    fn lifted_comparisons_with_null() {
        let params = [ParamDecl::named("x", Type::nullable(Type::Int32))];
        assert_eq!(run(&params, "x > 1", &[Value::Null]).unwrap(), Value::Boolean(false));
        assert_eq!(run(&params, "x == null", &[Value::Null]).unwrap(), Value::Boolean(true));
        assert_eq!(run(&params, "x + 1", &[Value::Null]).unwrap(), Value::Null);
        assert_eq!(run(&params, "x + 1", &[Value::Int32(4)]).unwrap(), Value::Int32(5));
        assert_eq!(
            run(&params, "x.HasValue", &[Value::Null]).unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(run(&params, "x.Value", &[Value::Null]), Err(EvalError::NullableNoValue));
    }

    #[test]
    fn and_short_circuits() {
        let params = [ParamDecl::named("s", Type::String)];
        let text = "s != null && s.Length > 2";
        assert_eq!(run(&params, text, &[Value::Null]).unwrap(), Value::Boolean(false));
        assert_eq!(
            run(&params, text, &[Value::from("abc")]).unwrap(),
            Value::Boolean(true)
        );
    }

    #[test]
    fn member_on_null_is_a_null_reference() {
        let params = [ParamDecl::named("s", Type::String)];
        let err = run(&params, "s.Length", &[Value::Null]).unwrap_err();
        assert_eq!(
            err,
            EvalError::NullReference {
                member: "Length".to_owned()
            }
        );
    }

    #[test]
    fn arity_is_checked() {
        let ctx = CompileContext::default();
        let lambda = compile_predicate(&ctx, &Type::Int32, "it > 1", &[]).unwrap();
        assert_eq!(
            eval_lambda(&lambda, &[]),
            Err(EvalError::Arity {
                expected: 1,
                actual: 0
            })
        );
        assert!(eval_predicate(&lambda, &[Value::Int32(2)]).unwrap());
    }

    #[test]
    fn checked_conversion_overflows() {
        assert!(matches!(
            run(&[], "Byte(300)", &[]),
            Err(EvalError::Overflow { .. })
        ));
        assert_eq!(scalar("Int32(2.9)"), Value::Int32(2));
    }

    #[test]
    fn list_indexing_is_bounds_checked() {
        let params = [ParamDecl::named("xs", Type::list(Type::Int32))];
        let xs = Value::list(vec![Value::Int32(5), Value::Int32(6)]);
        assert_eq!(run(&params, "xs[1]", &[xs.clone()]).unwrap(), Value::Int32(6));
        assert_eq!(
            run(&params, "xs[2]", &[xs]),
            Err(EvalError::IndexOutOfRange { index: 2, len: 2 })
        );
    }
}
